//! Process-wide driver registration and the [`Driver`] wrapper.
//!
//! GDAL's driver registry and error callback are process-global state.
//! Both are initialized exactly once, behind [`register_drivers`], before
//! any session touches a native handle.

use std::ffi::CString;
use std::path::Path;
use std::ptr::null_mut;
use std::sync::Once;

use gdal_sys::{CPLErr, GDALDataType, GDALDriverH};

use crate::errors::*;
use crate::utils::{_last_cpl_err, _last_null_pointer_err, _path_to_c_string, _string};
use crate::DatasetHandle;

static START: Once = Once::new();

/// Registers all configured GDAL drivers and installs the quiet error
/// handler, exactly once per process.
///
/// Errors are consumed through `CPLGetLastErrorMsg` by the callers in this
/// crate; the quiet handler keeps GDAL from also printing them to stderr.
pub fn register_drivers() -> Result<()> {
    unsafe {
        START.call_once(|| {
            gdal_sys::CPLSetErrorHandler(Some(gdal_sys::CPLQuietErrorHandler));
            gdal_sys::GDALAllRegister();
        });
    }
    if unsafe { gdal_sys::GDALGetDriverCount() } == 0 {
        return Err(Error::DriverRegistrationFailure);
    }
    Ok(())
}

/// A format driver from the GDAL registry.
///
/// Non-owning: driver handles belong to the driver manager and are never
/// released here.
#[allow(missing_copy_implementations)]
pub struct Driver {
    c_driver: GDALDriverH,
}

impl Driver {
    /// Looks up a registered driver by its short name (e.g. `"GeoJSON"`,
    /// `"ESRI Shapefile"`, `"GPKG"`).
    pub fn get(name: &str) -> Result<Driver> {
        register_drivers()?;
        let c_name = CString::new(name)?;
        let c_driver = unsafe { gdal_sys::GDALGetDriverByName(c_name.as_ptr()) };
        if c_driver.is_null() {
            return Err(_last_null_pointer_err("GDALGetDriverByName"));
        }
        Ok(Driver { c_driver })
    }

    /// Wraps a driver handle obtained from an open dataset.
    ///
    /// # Safety
    /// `c_driver` must be a valid driver handle.
    pub(crate) unsafe fn from_c_driver(c_driver: GDALDriverH) -> Driver {
        Driver { c_driver }
    }

    pub fn short_name(&self) -> String {
        let rv = unsafe { gdal_sys::GDALGetDriverShortName(self.c_driver) };
        _string(rv)
    }

    /// Creates an empty vector datasource at `path` (a 0x0x0-band
    /// `GDALCreate`).
    pub(crate) fn create_vector_only(&self, path: &Path) -> Result<DatasetHandle> {
        let c_filename = _path_to_c_string(path)?;
        let c_dataset = unsafe {
            gdal_sys::GDALCreate(
                self.c_driver,
                c_filename.as_ptr(),
                0,
                0,
                0,
                GDALDataType::GDT_Unknown,
                null_mut(),
            )
        };
        if c_dataset.is_null() {
            return Err(_last_null_pointer_err("GDALCreate"));
        }
        Ok(unsafe { DatasetHandle::from_c_dataset(c_dataset) })
    }

    /// Deletes the dataset at `path` through this driver, removing every
    /// file belonging to it.
    pub(crate) fn delete(&self, path: &Path) -> Result<()> {
        let c_filename = _path_to_c_string(path)?;
        let rv = unsafe { gdal_sys::GDALDeleteDataset(self.c_driver, c_filename.as_ptr()) };
        if rv != CPLErr::CE_None {
            return Err(_last_cpl_err(rv));
        }
        Ok(())
    }
}

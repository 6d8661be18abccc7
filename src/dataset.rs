use std::ptr::null_mut;

use gdal_sys::GDALDatasetH;

/// Owning wrapper around a native datasource handle.
///
/// Exactly one `DatasetHandle` owns a given `GDALDatasetH`; the handle is
/// closed on [`close`](DatasetHandle::close) or on drop, whichever comes
/// first, and never twice.
#[derive(Debug)]
pub(crate) struct DatasetHandle {
    c_dataset: GDALDatasetH,
}

// GDAL datasets may move between threads as long as only one thread accesses
// them at a time. See: https://gdal.org/api/raster_c_api.html
unsafe impl Send for DatasetHandle {}

impl DatasetHandle {
    /// Takes ownership of a native datasource handle.
    ///
    /// # Safety
    /// `c_dataset` must be a valid, open dataset handle with no other owner.
    pub(crate) unsafe fn from_c_dataset(c_dataset: GDALDatasetH) -> DatasetHandle {
        DatasetHandle { c_dataset }
    }

    pub(crate) fn c_dataset(&self) -> GDALDatasetH {
        self.c_dataset
    }

    pub(crate) fn is_open(&self) -> bool {
        !self.c_dataset.is_null()
    }

    /// Closes the datasource, flushing pending writes. Idempotent.
    pub(crate) fn close(&mut self) {
        if !self.c_dataset.is_null() {
            unsafe {
                gdal_sys::GDALClose(self.c_dataset);
            }
            self.c_dataset = null_mut();
        }
    }
}

impl Drop for DatasetHandle {
    fn drop(&mut self) {
        self.close();
    }
}

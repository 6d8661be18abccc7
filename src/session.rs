//! Read and write sessions: owners of one native datasource/layer handle
//! pair, and the single-pass feature cursor over a read session.
//!
//! A session moves through `{Closed, Open-Read, Open-Write}`. Opening
//! acquires the datasource and resolves the layer; [`ReadSession::stop`] /
//! [`WriteSession::stop`] release both and are idempotent; drop stops the
//! session if the caller has not. A failed open or create leaves nothing
//! behind to release twice: partial construction is unwound by the handle
//! wrappers before the error propagates.

use std::ffi::{c_char, CString, NulError};
use std::path::Path;
use std::ptr::{self, null_mut};

use gdal_sys::{OGRErr, OGRLayerH};

use crate::crs::{self, Crs};
use crate::dataset::DatasetHandle;
use crate::driver::{self, Driver};
use crate::errors::*;
use crate::feature::{feature_from_gdal, feature_to_gdal, Feature, FeatureHandle};
use crate::options::GdalOpenFlags;
use crate::schema::{self, Schema};
use crate::utils::{_last_null_pointer_err, _path_to_c_string, _string};

/// Which layer of a datasource a session binds to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayerSelector<'a> {
    /// Zero-based index in driver order.
    Index(usize),
    Name(&'a str),
}

impl Default for LayerSelector<'_> {
    fn default() -> Self {
        LayerSelector::Index(0)
    }
}

/// A rectangular spatial filter: `(min_x, min_y, max_x, max_y)`.
pub type BoundingBox = (f64, f64, f64, f64);

fn open_dataset(
    path: &Path,
    flags: GdalOpenFlags,
    allowed_drivers: Option<&[&str]>,
) -> Result<DatasetHandle> {
    driver::register_drivers()?;
    let c_filename = _path_to_c_string(path)?;

    // The CStrings and the pointer array must outlive the GDALOpenEx call.
    let c_allowed: Vec<CString> = allowed_drivers
        .unwrap_or(&[])
        .iter()
        .map(|&s| CString::new(s))
        .collect::<std::result::Result<_, NulError>>()?;
    let mut c_allowed_ptrs: Vec<*const c_char> = c_allowed.iter().map(|s| s.as_ptr()).collect();
    c_allowed_ptrs.push(ptr::null());
    let c_allowed_ptr = if allowed_drivers.is_some() {
        c_allowed_ptrs.as_ptr()
    } else {
        ptr::null()
    };

    let c_dataset = unsafe {
        gdal_sys::GDALOpenEx(
            c_filename.as_ptr(),
            flags.bits(),
            c_allowed_ptr,
            ptr::null(),
            ptr::null(),
        )
    };
    if c_dataset.is_null() {
        let msg = _string(unsafe { gdal_sys::CPLGetLastErrorMsg() });
        unsafe { gdal_sys::CPLErrorReset() };
        return Err(Error::DatasetNotFound {
            path: path.to_path_buf(),
            msg,
        });
    }
    Ok(unsafe { DatasetHandle::from_c_dataset(c_dataset) })
}

fn resolve_layer(dataset: &DatasetHandle, selector: LayerSelector<'_>) -> Result<OGRLayerH> {
    let c_layer = match selector {
        LayerSelector::Index(index) => unsafe {
            gdal_sys::GDALDatasetGetLayer(dataset.c_dataset(), index as std::ffi::c_int)
        },
        LayerSelector::Name(name) => {
            let c_name = CString::new(name)?;
            unsafe { gdal_sys::GDALDatasetGetLayerByName(dataset.c_dataset(), c_name.as_ptr()) }
        }
    };
    if c_layer.is_null() {
        let description = match selector {
            LayerSelector::Index(index) => format!("index {index}"),
            LayerSelector::Name(name) => name.to_string(),
        };
        return Err(Error::LayerNotFound(description));
    }
    Ok(c_layer)
}

/// Deletes the dataset at `path` through whichever driver recognizes it.
fn delete_existing_dataset(path: &Path) -> Result<()> {
    let dataset = open_dataset(path, GdalOpenFlags::default(), None)?;
    let c_driver = unsafe { gdal_sys::GDALGetDatasetDriver(dataset.c_dataset()) };
    if c_driver.is_null() {
        return Err(_last_null_pointer_err("GDALGetDatasetDriver"));
    }
    let driver = unsafe { Driver::from_c_driver(c_driver) };
    // The datasource must be closed before its files are deleted.
    drop(dataset);
    driver.delete(path)
}

/// A session over one datasource opened read-only.
///
/// Owns the datasource handle and a non-owning reference to one layer.
#[derive(Debug)]
pub struct ReadSession {
    dataset: DatasetHandle,
    c_layer: OGRLayerH,
    schema: Schema,
}

// The layer handle is only reachable through the owning session, which is
// itself single-threaded; see `DatasetHandle`.
unsafe impl Send for ReadSession {}

impl ReadSession {
    /// Opens the first layer of the datasource at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<ReadSession> {
        Self::open_ex(path, LayerSelector::default(), None)
    }

    /// Opens a specific layer, optionally restricting the set of drivers
    /// GDAL may try.
    pub fn open_ex(
        path: impl AsRef<Path>,
        layer: LayerSelector<'_>,
        allowed_drivers: Option<&[&str]>,
    ) -> Result<ReadSession> {
        let path = path.as_ref();
        let dataset = open_dataset(
            path,
            GdalOpenFlags::GDAL_OF_READONLY | GdalOpenFlags::GDAL_OF_VECTOR,
            allowed_drivers,
        )?;
        let c_layer = resolve_layer(&dataset, layer)?;
        let schema = schema::schema_from_layer(c_layer)?;
        Ok(ReadSession {
            dataset,
            c_layer,
            schema,
        })
    }

    pub fn is_open(&self) -> bool {
        self.dataset.is_open()
    }

    /// Releases the layer reference and closes the datasource. Idempotent.
    pub fn stop(&mut self) {
        self.c_layer = null_mut();
        self.dataset.close();
    }

    /// The number of features in the layer, forcing a count when the driver
    /// does not know it cheaply.
    ///
    /// `None` when the driver cannot determine the count even when forced;
    /// that is not the same as an empty layer.
    pub fn feature_count(&self) -> Result<Option<u64>> {
        if !self.is_open() {
            return Err(Error::SessionClosed);
        }
        let count = unsafe { gdal_sys::OGR_L_GetFeatureCount(self.c_layer, 1) };
        Ok((count >= 0).then_some(count as u64))
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The layer's spatial reference as a neutral parameter mapping; empty
    /// if the layer carries none.
    pub fn crs(&self) -> Result<Crs> {
        if !self.is_open() {
            return Err(Error::SessionClosed);
        }
        let c_srs = unsafe { gdal_sys::OGR_L_GetSpatialRef(self.c_layer) };
        crs::crs_from_c_srs(c_srs)
    }

    /// A single-pass cursor over all features, resetting the native cursor
    /// first. Re-iteration requires constructing a new cursor.
    pub fn features(&mut self) -> Result<FeatureIterator<'_>> {
        self.features_impl(None)
    }

    /// Like [`features`](ReadSession::features), but with a rectangular
    /// spatial filter installed before the first read.
    pub fn features_within(&mut self, bbox: BoundingBox) -> Result<FeatureIterator<'_>> {
        self.features_impl(Some(bbox))
    }

    fn features_impl(&mut self, bbox: Option<BoundingBox>) -> Result<FeatureIterator<'_>> {
        if !self.is_open() {
            return Err(Error::SessionClosed);
        }
        unsafe {
            match bbox {
                Some((min_x, min_y, max_x, max_y)) => {
                    gdal_sys::OGR_L_SetSpatialFilterRect(self.c_layer, min_x, min_y, max_x, max_y)
                }
                // Clear any filter a previous cursor installed.
                None => gdal_sys::OGR_L_SetSpatialFilter(self.c_layer, null_mut()),
            }
            gdal_sys::OGR_L_ResetReading(self.c_layer);
        }
        Ok(FeatureIterator { session: self })
    }
}

impl Drop for ReadSession {
    fn drop(&mut self) {
        self.stop();
    }
}

/// A single-pass, non-restartable cursor over a read session's layer.
///
/// Each advance fetches one native feature, marshals it, and releases the
/// native handle before the value is returned; no feature data is buffered
/// beyond the one record in flight. The driver's end-of-data signal ends
/// the sequence; a marshalling failure propagates and leaves the native
/// cursor advanced past the failed record.
pub struct FeatureIterator<'a> {
    session: &'a mut ReadSession,
}

impl Iterator for FeatureIterator<'_> {
    type Item = Result<Feature>;

    fn next(&mut self) -> Option<Self::Item> {
        let c_feature = unsafe { gdal_sys::OGR_L_GetNextFeature(self.session.c_layer) };
        if c_feature.is_null() {
            return None;
        }
        let handle = unsafe { FeatureHandle::from_c_feature(c_feature) };
        Some(feature_from_gdal(handle.c_feature(), &self.session.schema))
    }
}

/// A session over one datasource opened for writing.
///
/// [`create`](WriteSession::create) destructively replaces whatever dataset
/// exists at the path; [`append`](WriteSession::append) adds features to an
/// existing layer, whose definition is authoritative.
#[derive(Debug)]
pub struct WriteSession {
    dataset: DatasetHandle,
    c_layer: OGRLayerH,
    schema: Schema,
}

// See `ReadSession`.
unsafe impl Send for WriteSession {}

impl WriteSession {
    /// Creates a fresh datasource and layer at `path` with the given schema
    /// and CRS, deleting any dataset already there through its own driver.
    pub fn create(
        path: impl AsRef<Path>,
        driver_name: &str,
        layer_name: &str,
        schema: Schema,
        crs: &Crs,
    ) -> Result<WriteSession> {
        let path = path.as_ref();
        driver::register_drivers()?;
        if path.exists() {
            delete_existing_dataset(path)?;
        }
        let driver = Driver::get(driver_name)?;
        let dataset = driver.create_vector_only(path)?;

        let srs = crs::crs_to_c_srs(crs)?;
        let c_srs = srs.as_ref().map_or(null_mut(), |handle| handle.c_srs());
        let c_layer_name = CString::new(layer_name)?;
        let c_layer = unsafe {
            gdal_sys::GDALDatasetCreateLayer(
                dataset.c_dataset(),
                c_layer_name.as_ptr(),
                c_srs,
                schema.geometry_type().to_wkb_type(),
                null_mut(),
            )
        };
        if c_layer.is_null() {
            return Err(_last_null_pointer_err("GDALDatasetCreateLayer"));
        }
        schema::create_fields(c_layer, &schema)?;
        Ok(WriteSession {
            dataset,
            c_layer,
            schema,
        })
    }

    /// Opens an existing datasource in update mode and binds to one of its
    /// layers; the layer's existing schema and CRS are authoritative.
    pub fn append(path: impl AsRef<Path>, layer: LayerSelector<'_>) -> Result<WriteSession> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::PathNotFound(path.to_path_buf()));
        }
        let dataset = open_dataset(
            path,
            GdalOpenFlags::GDAL_OF_UPDATE | GdalOpenFlags::GDAL_OF_VECTOR,
            None,
        )?;
        let c_layer = resolve_layer(&dataset, layer)?;
        let schema = schema::schema_from_layer(c_layer)?;
        Ok(WriteSession {
            dataset,
            c_layer,
            schema,
        })
    }

    pub fn is_open(&self) -> bool {
        self.dataset.is_open()
    }

    /// Releases the layer reference and closes the datasource, flushing
    /// pending writes. Idempotent.
    pub fn stop(&mut self) {
        self.c_layer = null_mut();
        self.dataset.close();
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn crs(&self) -> Result<Crs> {
        if !self.is_open() {
            return Err(Error::SessionClosed);
        }
        let c_srs = unsafe { gdal_sys::OGR_L_GetSpatialRef(self.c_layer) };
        crs::crs_from_c_srs(c_srs)
    }

    /// Validates and writes one feature.
    ///
    /// Every property key and the geometry tag are checked against the
    /// session's schema before any native allocation; a mismatch is
    /// [`Error::SchemaMismatch`] with nothing to clean up. The native
    /// feature built on the success path is released unconditionally,
    /// whether submission succeeds or fails.
    pub fn write(&mut self, feature: &Feature) -> Result<()> {
        if !self.is_open() {
            return Err(Error::SessionClosed);
        }
        if let Some(geometry) = &feature.geometry {
            if geometry.geometry_type() != self.schema.geometry_type() {
                return Err(Error::SchemaMismatch(format!(
                    "geometry is '{}', schema declares '{}'",
                    geometry.geometry_type(),
                    self.schema.geometry_type()
                )));
            }
        }
        for (name, value) in &feature.properties {
            match self.schema.field(name) {
                None => {
                    return Err(Error::SchemaMismatch(format!(
                        "property '{name}' is not declared in the schema"
                    )))
                }
                Some((_, declared)) if value.field_type() != declared => {
                    return Err(Error::SchemaMismatch(format!(
                        "property '{name}' is '{}', schema declares '{declared}'",
                        value.field_type()
                    )))
                }
                Some(_) => {}
            }
        }

        let c_defn = unsafe { gdal_sys::OGR_L_GetLayerDefn(self.c_layer) };
        if c_defn.is_null() {
            return Err(_last_null_pointer_err("OGR_L_GetLayerDefn"));
        }
        let handle = feature_to_gdal(feature, &self.schema, c_defn)?;
        let rv = unsafe { gdal_sys::OGR_L_CreateFeature(self.c_layer, handle.c_feature()) };
        if rv != OGRErr::OGRERR_NONE {
            return Err(Error::WriteFailure {
                err: rv,
                method_name: "OGR_L_CreateFeature",
            });
        }
        Ok(())
    }
}

impl Drop for WriteSession {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::FieldValue;
    use crate::geometry::{Coord, Geometry};
    use crate::schema::FieldType;
    use std::path::PathBuf;

    const DRIVER: &str = "GeoJSON";

    struct Fixture {
        _dir: tempfile::TempDir,
        path: PathBuf,
    }

    fn scratch(name: &str) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(name);
        Fixture { _dir: dir, path }
    }

    fn point_schema() -> Schema {
        Schema::new(crate::GeometryType::Point, [("name", FieldType::Str)]).unwrap()
    }

    fn point(x: f64, y: f64, name: &str) -> Feature {
        Feature::new(Some(Geometry::Point(Coord::Xy(x, y)))).with_property("name", name)
    }

    #[test]
    fn write_then_read_round_trip() {
        let fixture = scratch("points.geojson");
        let mut session =
            WriteSession::create(&fixture.path, DRIVER, "points", point_schema(), &Crs::new())
                .unwrap();
        session.write(&point(0.0, 0.0, "origin")).unwrap();
        session.stop();

        let mut session = ReadSession::open(&fixture.path).unwrap();
        assert_eq!(session.feature_count().unwrap(), Some(1));
        assert_eq!(session.schema().geometry_type(), crate::GeometryType::Point);
        assert_eq!(session.schema().field("name"), Some((0, FieldType::Str)));

        let features: Vec<Feature> = session
            .features()
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].id, "0");
        assert_eq!(
            features[0].geometry,
            Some(Geometry::Point(Coord::Xy(0.0, 0.0)))
        );
        assert_eq!(
            features[0].property("name"),
            Some(&FieldValue::StringValue("origin".to_string()))
        );
    }

    #[test]
    fn undeclared_property_is_rejected_without_allocation() {
        let fixture = scratch("strict.geojson");
        let mut session =
            WriteSession::create(&fixture.path, DRIVER, "strict", point_schema(), &Crs::new())
                .unwrap();
        let bad = point(1.0, 1.0, "x").with_property("elevation", 12.5);
        assert!(matches!(
            session.write(&bad),
            Err(Error::SchemaMismatch(_))
        ));
        session.stop();

        let session = ReadSession::open(&fixture.path).unwrap();
        assert_eq!(session.feature_count().unwrap(), Some(0));
    }

    #[test]
    fn wrong_value_type_is_rejected() {
        let fixture = scratch("typed.geojson");
        let schema = Schema::new(
            crate::GeometryType::Point,
            [("name", FieldType::Str), ("rank", FieldType::Int)],
        )
        .unwrap();
        let mut session =
            WriteSession::create(&fixture.path, DRIVER, "typed", schema, &Crs::new()).unwrap();
        let bad = point(0.0, 0.0, "a").with_property("rank", 1.5);
        assert!(matches!(
            session.write(&bad),
            Err(Error::SchemaMismatch(_))
        ));
        let good = point(0.0, 0.0, "a").with_property("rank", 4i64);
        session.write(&good).unwrap();
    }

    #[test]
    fn geometry_tag_mismatch_is_rejected() {
        let fixture = scratch("tags.geojson");
        let mut session =
            WriteSession::create(&fixture.path, DRIVER, "tags", point_schema(), &Crs::new())
                .unwrap();
        let line = Feature::new(Some(Geometry::LineString(vec![
            Coord::Xy(0.0, 0.0),
            Coord::Xy(1.0, 1.0),
        ])));
        assert!(matches!(
            session.write(&line),
            Err(Error::SchemaMismatch(_))
        ));
    }

    #[test]
    fn bounding_box_yields_intersecting_subset() {
        let fixture = scratch("filter.geojson");
        let mut session =
            WriteSession::create(&fixture.path, DRIVER, "filter", point_schema(), &Crs::new())
                .unwrap();
        session.write(&point(0.0, 0.0, "inside")).unwrap();
        session.write(&point(0.5, 0.5, "inside-too")).unwrap();
        session.write(&point(10.0, 10.0, "outside")).unwrap();
        session.stop();

        let mut session = ReadSession::open(&fixture.path).unwrap();
        let all: Vec<Feature> = session
            .features()
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(all.len(), 3);

        let bbox = (-1.0, -1.0, 1.0, 1.0);
        let filtered: Vec<Feature> = session
            .features_within(bbox)
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(filtered.len(), 2);
        for feature in &filtered {
            let coord = match feature.geometry.as_ref().unwrap() {
                Geometry::Point(coord) => *coord,
                other => panic!("unexpected geometry: {other:?}"),
            };
            assert!(coord.x() >= bbox.0 && coord.x() <= bbox.2);
            assert!(coord.y() >= bbox.1 && coord.y() <= bbox.3);
            assert!(all.contains(feature));
        }

        // A fresh unfiltered cursor sees everything again.
        let again: Vec<Feature> = session
            .features()
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(again.len(), 3);
    }

    #[test]
    fn append_extends_existing_layer() {
        let fixture = scratch("append.geojson");
        let mut session =
            WriteSession::create(&fixture.path, DRIVER, "append", point_schema(), &Crs::new())
                .unwrap();
        session.write(&point(1.0, 1.0, "first")).unwrap();
        session.stop();

        let mut session = WriteSession::append(&fixture.path, LayerSelector::Index(0)).unwrap();
        assert_eq!(session.schema().field("name"), Some((0, FieldType::Str)));
        session.write(&point(2.0, 2.0, "second")).unwrap();
        session.stop();

        let session = ReadSession::open(&fixture.path).unwrap();
        assert_eq!(session.feature_count().unwrap(), Some(2));
    }

    #[test]
    fn append_requires_existing_path() {
        let fixture = scratch("missing.geojson");
        assert!(matches!(
            WriteSession::append(&fixture.path, LayerSelector::default()),
            Err(Error::PathNotFound(_))
        ));
    }

    #[test]
    fn create_overwrites_existing_dataset() {
        let fixture = scratch("overwrite.geojson");
        let mut session =
            WriteSession::create(&fixture.path, DRIVER, "old", point_schema(), &Crs::new())
                .unwrap();
        session.write(&point(1.0, 1.0, "stale")).unwrap();
        session.stop();

        let mut session =
            WriteSession::create(&fixture.path, DRIVER, "new", point_schema(), &Crs::new())
                .unwrap();
        session.write(&point(2.0, 2.0, "fresh")).unwrap();
        session.stop();

        let mut session = ReadSession::open(&fixture.path).unwrap();
        assert_eq!(session.feature_count().unwrap(), Some(1));
        let features: Vec<Feature> = session
            .features()
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(
            features[0].property("name"),
            Some(&FieldValue::StringValue("fresh".to_string()))
        );
    }

    #[test]
    fn stop_is_idempotent() {
        let fixture = scratch("stop.geojson");
        let mut session =
            WriteSession::create(&fixture.path, DRIVER, "stop", point_schema(), &Crs::new())
                .unwrap();
        session.stop();
        session.stop();
        assert!(!session.is_open());
        assert!(matches!(
            session.write(&point(0.0, 0.0, "late")),
            Err(Error::SessionClosed)
        ));

        let mut session = ReadSession::open(&fixture.path).unwrap();
        session.stop();
        session.stop();
        assert!(!session.is_open());
        assert!(matches!(session.feature_count(), Err(Error::SessionClosed)));
    }

    #[test]
    fn missing_dataset_and_layer_are_reported() {
        let fixture = scratch("nothing.geojson");
        assert!(matches!(
            ReadSession::open(&fixture.path),
            Err(Error::DatasetNotFound { .. })
        ));

        let fixture = scratch("one-layer.geojson");
        let mut session =
            WriteSession::create(&fixture.path, DRIVER, "layer", point_schema(), &Crs::new())
                .unwrap();
        session.stop();
        assert!(matches!(
            ReadSession::open_ex(&fixture.path, LayerSelector::Name("absent"), None),
            Err(Error::LayerNotFound(_))
        ));
    }

    #[test]
    fn restricted_driver_list_is_honored() {
        let fixture = scratch("restricted.geojson");
        let mut session =
            WriteSession::create(&fixture.path, DRIVER, "r", point_schema(), &Crs::new()).unwrap();
        session.write(&point(0.0, 0.0, "x")).unwrap();
        session.stop();

        assert!(ReadSession::open_ex(
            &fixture.path,
            LayerSelector::default(),
            Some(&["GeoJSON"])
        )
        .is_ok());
        assert!(matches!(
            ReadSession::open_ex(
                &fixture.path,
                LayerSelector::default(),
                Some(&["ESRI Shapefile"])
            ),
            Err(Error::DatasetNotFound { .. })
        ));
    }
}

//! The neutral feature record and its marshalling against native OGR
//! feature handles.

use std::ffi::{c_int, CString};

use gdal_sys::{OGRErr, OGRFeatureDefnH, OGRFeatureH};

use crate::errors::*;
use crate::geometry::Geometry;
use crate::schema::{FieldType, Schema};
use crate::utils::{_last_null_pointer_err, _string};

/// One attribute value.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    IntegerValue(i64),
    RealValue(f64),
    StringValue(String),
}

impl FieldValue {
    pub fn field_type(&self) -> FieldType {
        match self {
            FieldValue::IntegerValue(_) => FieldType::Int,
            FieldValue::RealValue(_) => FieldType::Float,
            FieldValue::StringValue(_) => FieldType::Str,
        }
    }

    pub fn into_int(self) -> Option<i64> {
        match self {
            FieldValue::IntegerValue(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_real(self) -> Option<f64> {
        match self {
            FieldValue::RealValue(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_string(self) -> Option<String> {
        match self {
            FieldValue::StringValue(v) => Some(v),
            _ => None,
        }
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> FieldValue {
        FieldValue::IntegerValue(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> FieldValue {
        FieldValue::RealValue(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> FieldValue {
        FieldValue::StringValue(v.to_string())
    }
}

/// One georeferenced record: identifier, optional geometry, and ordered
/// named attribute values.
///
/// `id` is the decimal rendering of the native feature identifier on read;
/// on write the driver assigns identifiers and the field is ignored.
/// A property that is unset in the native feature is absent from
/// `properties` rather than carrying a sentinel value.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Feature {
    pub id: String,
    pub geometry: Option<Geometry>,
    pub properties: Vec<(String, FieldValue)>,
}

impl Feature {
    pub fn new(geometry: Option<Geometry>) -> Feature {
        Feature {
            id: String::new(),
            geometry,
            properties: Vec::new(),
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Feature {
        self.properties.push((name.into(), value.into()));
        self
    }

    pub fn property(&self, name: &str) -> Option<&FieldValue> {
        self.properties
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }
}

/// Reads a native feature into a neutral record.
///
/// Fields are read in the schema's declared order with the accessor matching
/// each field's recorded type; a field whose driver-reported type no longer
/// matches the schema fails with [`Error::InvalidFieldType`]. An unset
/// geometry yields `None`. Read-only: the handle keeps its current owner.
pub(crate) fn feature_from_gdal(c_feature: OGRFeatureH, schema: &Schema) -> Result<Feature> {
    let fid = unsafe { gdal_sys::OGR_F_GetFID(c_feature) };
    let mut properties = Vec::with_capacity(schema.len());
    for (index, (name, declared)) in schema.fields().enumerate() {
        let index = index as c_int;
        let c_field_defn = unsafe { gdal_sys::OGR_F_GetFieldDefnRef(c_feature, index) };
        if c_field_defn.is_null() {
            return Err(_last_null_pointer_err("OGR_F_GetFieldDefnRef"));
        }
        let native_type = unsafe { gdal_sys::OGR_Fld_GetType(c_field_defn) };
        if FieldType::from_ogr(native_type) != Some(declared) {
            return Err(Error::InvalidFieldType {
                field_name: name.to_string(),
                expected: declared,
                found: native_type,
            });
        }
        if unsafe { gdal_sys::OGR_F_IsFieldSetAndNotNull(c_feature, index) } == 0 {
            continue;
        }
        let value = match declared {
            FieldType::Int => FieldValue::IntegerValue(unsafe {
                gdal_sys::OGR_F_GetFieldAsInteger64(c_feature, index)
            }),
            FieldType::Float => {
                FieldValue::RealValue(unsafe { gdal_sys::OGR_F_GetFieldAsDouble(c_feature, index) })
            }
            FieldType::Str => FieldValue::StringValue(_string(unsafe {
                gdal_sys::OGR_F_GetFieldAsString(c_feature, index)
            })),
        };
        properties.push((name.to_string(), value));
    }
    let c_geom = unsafe { gdal_sys::OGR_F_GetGeometryRef(c_feature) };
    let geometry = if c_geom.is_null() {
        None
    } else {
        Some(Geometry::from_gdal(c_geom)?)
    };
    Ok(Feature {
        id: fid.to_string(),
        geometry,
        properties,
    })
}

/// Builds an owning native feature from a neutral record.
///
/// Every property is validated against the schema before any native field
/// is set; an undeclared key or a value whose type differs from the
/// declaration is [`Error::SchemaMismatch`]. Geometry ownership transfers
/// into the feature. The caller releases the returned handle after use; on
/// any failure the partially built feature is released before the error
/// propagates.
pub(crate) fn feature_to_gdal(
    feature: &Feature,
    schema: &Schema,
    c_defn: OGRFeatureDefnH,
) -> Result<FeatureHandle> {
    let mut indices = Vec::with_capacity(feature.properties.len());
    for (name, value) in &feature.properties {
        let (index, declared) = schema.field(name).ok_or_else(|| {
            Error::SchemaMismatch(format!("property '{name}' is not declared in the schema"))
        })?;
        if value.field_type() != declared {
            return Err(Error::SchemaMismatch(format!(
                "property '{name}' is '{}', schema declares '{declared}'",
                value.field_type()
            )));
        }
        indices.push(index as c_int);
    }

    let handle = FeatureHandle::create(c_defn)?;
    if let Some(geometry) = &feature.geometry {
        let c_geometry = geometry.to_gdal()?.into_c_geometry();
        // Ownership of the geometry passes into the feature even on failure.
        let rv = unsafe { gdal_sys::OGR_F_SetGeometryDirectly(handle.c_feature(), c_geometry) };
        if rv != OGRErr::OGRERR_NONE {
            return Err(Error::OgrError {
                err: rv,
                method_name: "OGR_F_SetGeometryDirectly",
            });
        }
    }
    for ((_, value), index) in feature.properties.iter().zip(indices) {
        match value {
            FieldValue::IntegerValue(v) => unsafe {
                gdal_sys::OGR_F_SetFieldInteger64(handle.c_feature(), index, *v)
            },
            FieldValue::RealValue(v) => unsafe {
                gdal_sys::OGR_F_SetFieldDouble(handle.c_feature(), index, *v)
            },
            FieldValue::StringValue(v) => {
                let c_value = CString::new(v.as_str())?;
                unsafe {
                    gdal_sys::OGR_F_SetFieldString(handle.c_feature(), index, c_value.as_ptr())
                }
            }
        }
    }
    Ok(handle)
}

/// Owning wrapper around a native feature handle, released on drop.
pub(crate) struct FeatureHandle {
    c_feature: OGRFeatureH,
}

impl FeatureHandle {
    fn create(c_defn: OGRFeatureDefnH) -> Result<FeatureHandle> {
        let c_feature = unsafe { gdal_sys::OGR_F_Create(c_defn) };
        if c_feature.is_null() {
            return Err(_last_null_pointer_err("OGR_F_Create"));
        }
        Ok(FeatureHandle { c_feature })
    }

    /// Takes ownership of a native feature handle.
    ///
    /// # Safety
    /// `c_feature` must be a valid feature handle with no other owner.
    pub(crate) unsafe fn from_c_feature(c_feature: OGRFeatureH) -> FeatureHandle {
        FeatureHandle { c_feature }
    }

    pub(crate) fn c_feature(&self) -> OGRFeatureH {
        self.c_feature
    }
}

impl Drop for FeatureHandle {
    fn drop(&mut self) {
        unsafe { gdal_sys::OGR_F_Destroy(self.c_feature) };
    }
}

//! The neutral layer schema and its resolution against native layer
//! definitions.

use std::ffi::CString;

use gdal_sys::{OGRErr, OGRFieldDefnH, OGRFieldType, OGRLayerH};

use crate::errors::*;
use crate::geometry::GeometryType;
use crate::utils::{_last_null_pointer_err, _string};

/// The closed set of attribute value types supported by the neutral model.
///
/// `Int` covers both 32- and 64-bit native integer fields; values travel as
/// `i64` in either case. Date, time, binary and list field types have no
/// mapping and fail schema resolution rather than being silently dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldType {
    Int,
    Float,
    Str,
}

impl FieldType {
    pub(crate) fn from_ogr(field_type: OGRFieldType::Type) -> Option<FieldType> {
        match field_type {
            OGRFieldType::OFTInteger | OGRFieldType::OFTInteger64 => Some(FieldType::Int),
            OGRFieldType::OFTReal => Some(FieldType::Float),
            OGRFieldType::OFTString => Some(FieldType::Str),
            _ => None,
        }
    }

    pub(crate) fn to_ogr(self) -> OGRFieldType::Type {
        match self {
            FieldType::Int => OGRFieldType::OFTInteger64,
            FieldType::Float => OGRFieldType::OFTReal,
            FieldType::Str => OGRFieldType::OFTString,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FieldType::Int => "int",
            FieldType::Float => "float",
            FieldType::Str => "str",
        }
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The declared geometry type and ordered attribute fields of one layer.
///
/// Immutable once constructed; a write session keeps the schema it was
/// opened with for the whole session.
#[derive(Clone, Debug, PartialEq)]
pub struct Schema {
    geometry_type: GeometryType,
    fields: Vec<(String, FieldType)>,
}

impl Schema {
    /// Builds a schema from a geometry tag and ordered `(name, type)`
    /// fields. Duplicate field names are rejected.
    pub fn new<N: Into<String>>(
        geometry_type: GeometryType,
        fields: impl IntoIterator<Item = (N, FieldType)>,
    ) -> Result<Schema> {
        let fields: Vec<(String, FieldType)> = fields
            .into_iter()
            .map(|(name, field_type)| (name.into(), field_type))
            .collect();
        for (i, (name, _)) in fields.iter().enumerate() {
            if fields[..i].iter().any(|(seen, _)| seen == name) {
                return Err(Error::SchemaMismatch(format!(
                    "duplicate field name '{name}'"
                )));
            }
        }
        Ok(Schema {
            geometry_type,
            fields,
        })
    }

    pub fn geometry_type(&self) -> GeometryType {
        self.geometry_type
    }

    /// The fields in declared order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, FieldType)> {
        self.fields
            .iter()
            .map(|(name, field_type)| (name.as_str(), *field_type))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Index and declared type of a field, by name.
    pub(crate) fn field(&self, name: &str) -> Option<(usize, FieldType)> {
        self.fields
            .iter()
            .position(|(field_name, _)| field_name == name)
            .map(|i| (i, self.fields[i].1))
    }
}

/// Derives the neutral schema of a native layer.
///
/// Field definitions are enumerated in driver order; any field whose native
/// type falls outside the fixed mapping fails with
/// [`Error::UnsupportedFieldType`]. The layer's declared geometry type goes
/// through the same table as geometry marshalling.
pub(crate) fn schema_from_layer(c_layer: OGRLayerH) -> Result<Schema> {
    let c_defn = unsafe { gdal_sys::OGR_L_GetLayerDefn(c_layer) };
    if c_defn.is_null() {
        return Err(_last_null_pointer_err("OGR_L_GetLayerDefn"));
    }
    let geometry_type = GeometryType::from_wkb_type(unsafe { gdal_sys::OGR_FD_GetGeomType(c_defn) })?;
    let field_count = unsafe { gdal_sys::OGR_FD_GetFieldCount(c_defn) };
    let mut fields = Vec::with_capacity(field_count as usize);
    for i in 0..field_count {
        let c_field_defn = unsafe { gdal_sys::OGR_FD_GetFieldDefn(c_defn, i) };
        if c_field_defn.is_null() {
            return Err(_last_null_pointer_err("OGR_FD_GetFieldDefn"));
        }
        let name = _string(unsafe { gdal_sys::OGR_Fld_GetNameRef(c_field_defn) });
        let native_type = unsafe { gdal_sys::OGR_Fld_GetType(c_field_defn) };
        let field_type =
            FieldType::from_ogr(native_type).ok_or_else(|| Error::UnsupportedFieldType {
                field_name: name.clone(),
                field_type: native_type,
            })?;
        fields.push((name, field_type));
    }
    Schema::new(geometry_type, fields)
}

/// Registers the schema's fields on a freshly created native layer, in
/// declared order. Each intermediate field definition is released right
/// after registration.
pub(crate) fn create_fields(c_layer: OGRLayerH, schema: &Schema) -> Result<()> {
    for (name, field_type) in schema.fields() {
        let c_name = CString::new(name)?;
        let field_defn = FieldDefnHandle::create(&c_name, field_type.to_ogr())?;
        let rv = unsafe { gdal_sys::OGR_L_CreateField(c_layer, field_defn.c_field_defn(), 1) };
        if rv != OGRErr::OGRERR_NONE {
            return Err(Error::OgrError {
                err: rv,
                method_name: "OGR_L_CreateField",
            });
        }
    }
    Ok(())
}

/// Owning wrapper around a native field definition, released on drop.
struct FieldDefnHandle {
    c_field_defn: OGRFieldDefnH,
}

impl FieldDefnHandle {
    fn create(c_name: &CString, field_type: OGRFieldType::Type) -> Result<FieldDefnHandle> {
        let c_field_defn = unsafe { gdal_sys::OGR_Fld_Create(c_name.as_ptr(), field_type) };
        if c_field_defn.is_null() {
            return Err(_last_null_pointer_err("OGR_Fld_Create"));
        }
        Ok(FieldDefnHandle { c_field_defn })
    }

    fn c_field_defn(&self) -> OGRFieldDefnH {
        self.c_field_defn
    }
}

impl Drop for FieldDefnHandle {
    fn drop(&mut self) {
        unsafe { gdal_sys::OGR_Fld_Destroy(self.c_field_defn) };
    }
}

use std::ffi::c_int;
use std::path::PathBuf;

use gdal_sys::{CPLErr, OGRErr, OGRFieldType, OGRwkbGeometryType};
use thiserror::Error;

use crate::schema::FieldType;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Clone, PartialEq, Debug, Error)]
pub enum Error {
    #[error("FfiNulError")]
    FfiNulError(#[from] std::ffi::NulError),
    #[error("Utf8Error")]
    Utf8Error(#[from] std::str::Utf8Error),
    #[error("CPL error class: '{class:?}', error number: '{number}', error msg: '{msg}'")]
    CplError {
        class: CPLErr::Type,
        number: c_int,
        msg: String,
    },
    #[error("GDAL method '{method_name}' returned a NULL pointer. Error msg: '{msg}'")]
    NullPointer {
        method_name: &'static str,
        msg: String,
    },
    #[error("OGR method '{method_name}' returned error: '{err:?}'")]
    OgrError {
        err: OGRErr::Type,
        method_name: &'static str,
    },
    #[error("OGR geometry type code '{wkb_type}' has no neutral representation")]
    UnsupportedGeometryType { wkb_type: OGRwkbGeometryType::Type },
    #[error("malformed coordinates: {0}")]
    MalformedCoordinates(String),
    #[error("field '{field_name}' has unsupported OGR field type code '{field_type}'")]
    UnsupportedFieldType {
        field_name: String,
        field_type: OGRFieldType::Type,
    },
    #[error("field '{field_name}': schema declares '{expected}', driver reports type code '{found}'")]
    InvalidFieldType {
        field_name: String,
        expected: FieldType,
        found: OGRFieldType::Type,
    },
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),
    #[error("no dataset found at '{}': '{msg}'", .path.display())]
    DatasetNotFound { path: PathBuf, msg: String },
    #[error("layer '{0}' not found")]
    LayerNotFound(String),
    #[error("path '{}' does not exist", .0.display())]
    PathNotFound(PathBuf),
    #[error("feature write via '{method_name}' failed with OGR error '{err}'")]
    WriteFailure {
        err: OGRErr::Type,
        method_name: &'static str,
    },
    #[error("GDAL driver registration failed")]
    DriverRegistrationFailure,
    #[error("session is closed")]
    SessionClosed,
}

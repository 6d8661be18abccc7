//! Coordinate reference systems as ordered parameter mappings.
//!
//! The neutral representation is the PROJ parameter list: an ordered,
//! key-unique mapping in which `+proj=utm +zone=34 +no_defs` becomes
//! `{proj: "utm", zone: 34, no_defs: true}`. Tokenizing and rendering are
//! pure; only [`crs_from_c_srs`] and [`crs_to_c_srs`] touch the native
//! spatial-reference machinery.

use std::ffi::{c_char, c_void, CString};
use std::ptr::null_mut;

use gdal_sys::{OGRErr, OGRSpatialReferenceH};

use crate::errors::*;
use crate::utils::{_last_null_pointer_err, _string};

/// One projection parameter value.
#[derive(Clone, Debug, PartialEq)]
pub enum CrsValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl std::fmt::Display for CrsValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CrsValue::Bool(v) => write!(f, "{v}"),
            CrsValue::Int(v) => write!(f, "{v}"),
            // A whole-valued float keeps a fractional part so the rendered
            // token does not re-tokenize as an integer.
            CrsValue::Float(v) if v.fract() == 0.0 && v.is_finite() => write!(f, "{v:.1}"),
            CrsValue::Float(v) => write!(f, "{v}"),
            CrsValue::Str(v) => f.write_str(v),
        }
    }
}

/// An ordered, key-unique mapping of projection parameters.
///
/// May be empty: a layer without a spatial reference decodes to an empty
/// mapping, and an empty mapping encodes to no spatial reference at all.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Crs {
    entries: Vec<(String, CrsValue)>,
}

impl Crs {
    pub fn new() -> Crs {
        Crs::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, key: &str) -> Option<&CrsValue> {
        self.entries
            .iter()
            .find(|(entry_key, _)| entry_key == key)
            .map(|(_, value)| value)
    }

    /// Inserts or replaces a parameter, preserving first-insertion order.
    pub fn set(&mut self, key: impl Into<String>, value: CrsValue) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CrsValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Tokenizes a PROJ parameter string.
    ///
    /// Each whitespace-separated `+key[=value]` token contributes one entry:
    /// a bare flag maps to `Bool(true)`; a value parses as integer first,
    /// then float, and otherwise stays a string.
    pub fn from_proj4(definition: &str) -> Crs {
        let mut crs = Crs::new();
        for token in definition.split_whitespace() {
            let token = token.strip_prefix('+').unwrap_or(token);
            match token.split_once('=') {
                None => crs.set(token, CrsValue::Bool(true)),
                Some((key, value)) => {
                    let value = if let Ok(int) = value.parse::<i64>() {
                        CrsValue::Int(int)
                    } else if let Ok(float) = value.parse::<f64>() {
                        CrsValue::Float(float)
                    } else {
                        CrsValue::Str(value.to_string())
                    };
                    crs.set(key, value);
                }
            }
        }
        crs
    }

    /// Renders the mapping back into a PROJ parameter string.
    ///
    /// `Bool(true)` entries and the literal `no_defs` key render as bare
    /// `+key`; everything else renders as `+key=value`.
    pub fn to_proj4(&self) -> String {
        let parts: Vec<String> = self
            .entries
            .iter()
            .map(|(key, value)| match value {
                CrsValue::Bool(true) => format!("+{key}"),
                _ if key == "no_defs" => format!("+{key}"),
                value => format!("+{key}={value}"),
            })
            .collect();
        parts.join(" ")
    }
}

impl<K: Into<String>> FromIterator<(K, CrsValue)> for Crs {
    fn from_iter<T: IntoIterator<Item = (K, CrsValue)>>(iter: T) -> Crs {
        let mut crs = Crs::new();
        for (key, value) in iter {
            crs.set(key, value);
        }
        crs
    }
}

/// Owning wrapper around a native spatial reference, released on drop.
pub(crate) struct SpatialRefHandle {
    c_srs: OGRSpatialReferenceH,
}

impl SpatialRefHandle {
    pub(crate) fn c_srs(&self) -> OGRSpatialReferenceH {
        self.c_srs
    }
}

impl Drop for SpatialRefHandle {
    fn drop(&mut self) {
        unsafe { gdal_sys::OSRRelease(self.c_srs) };
    }
}

/// Decodes a native spatial reference into the neutral mapping.
///
/// A null handle, or a reference PROJ cannot express as a parameter string,
/// decodes to the empty mapping; neither is an error.
pub(crate) fn crs_from_c_srs(c_srs: OGRSpatialReferenceH) -> Result<Crs> {
    if c_srs.is_null() {
        return Ok(Crs::new());
    }
    let mut c_proj4: *mut c_char = null_mut();
    let rv = unsafe { gdal_sys::OSRExportToProj4(c_srs, &mut c_proj4) };
    if rv != OGRErr::OGRERR_NONE {
        unsafe { gdal_sys::CPLErrorReset() };
        return Ok(Crs::new());
    }
    let proj4 = _string(c_proj4);
    unsafe { gdal_sys::VSIFree(c_proj4 as *mut c_void) };
    Ok(Crs::from_proj4(&proj4))
}

/// Encodes the neutral mapping into a new native spatial reference.
///
/// An empty mapping yields `None`: the layer is created without a spatial
/// reference.
pub(crate) fn crs_to_c_srs(crs: &Crs) -> Result<Option<SpatialRefHandle>> {
    if crs.is_empty() {
        return Ok(None);
    }
    let c_srs = unsafe { gdal_sys::OSRNewSpatialReference(std::ptr::null()) };
    if c_srs.is_null() {
        return Err(_last_null_pointer_err("OSRNewSpatialReference"));
    }
    let handle = SpatialRefHandle { c_srs };
    let c_proj4 = CString::new(crs.to_proj4())?;
    let rv = unsafe { gdal_sys::OSRImportFromProj4(handle.c_srs(), c_proj4.as_ptr()) };
    if rv != OGRErr::OGRERR_NONE {
        return Err(Error::OgrError {
            err: rv,
            method_name: "OSRImportFromProj4",
        });
    }
    Ok(Some(handle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_classifies_values() {
        let crs = Crs::from_proj4("+proj=utm +zone=34 +k_0=0.9996 +datum=WGS84 +no_defs");
        assert_eq!(crs.get("proj"), Some(&CrsValue::Str("utm".to_string())));
        assert_eq!(crs.get("zone"), Some(&CrsValue::Int(34)));
        assert_eq!(crs.get("k_0"), Some(&CrsValue::Float(0.9996)));
        assert_eq!(crs.get("datum"), Some(&CrsValue::Str("WGS84".to_string())));
        assert_eq!(crs.get("no_defs"), Some(&CrsValue::Bool(true)));
        assert_eq!(crs.len(), 5);
    }

    #[test]
    fn render_round_trip() {
        // One flag, one integer, one float, one string.
        let crs: Crs = [
            ("proj", CrsValue::Str("utm".to_string())),
            ("zone", CrsValue::Int(34)),
            ("k_0", CrsValue::Float(0.9996)),
            ("no_defs", CrsValue::Bool(true)),
        ]
        .into_iter()
        .collect();
        assert_eq!(crs.to_proj4(), "+proj=utm +zone=34 +k_0=0.9996 +no_defs");
        assert_eq!(Crs::from_proj4(&crs.to_proj4()), crs);
    }

    #[test]
    fn whole_valued_floats_stay_floats() {
        let crs: Crs = [
            ("k_0", CrsValue::Float(2.0)),
            ("x_0", CrsValue::Float(500000.0)),
        ]
        .into_iter()
        .collect();
        assert_eq!(crs.to_proj4(), "+k_0=2.0 +x_0=500000.0");
        assert_eq!(Crs::from_proj4(&crs.to_proj4()), crs);
    }

    #[test]
    fn no_defs_renders_bare_regardless_of_value() {
        let crs: Crs = [("no_defs", CrsValue::Str("yes".to_string()))]
            .into_iter()
            .collect();
        assert_eq!(crs.to_proj4(), "+no_defs");
    }

    #[test]
    fn empty_mapping_round_trips() {
        assert!(Crs::from_proj4("").is_empty());
        assert_eq!(Crs::new().to_proj4(), "");
    }

    #[test]
    fn set_replaces_in_place() {
        let mut crs = Crs::new();
        crs.set("zone", CrsValue::Int(1));
        crs.set("south", CrsValue::Bool(true));
        crs.set("zone", CrsValue::Int(2));
        assert_eq!(crs.len(), 2);
        assert_eq!(crs.get("zone"), Some(&CrsValue::Int(2)));
        let keys: Vec<&str> = crs.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["zone", "south"]);
    }

    #[test]
    fn native_round_trip_preserves_parameters() {
        let crs = Crs::from_proj4("+proj=longlat +datum=WGS84 +no_defs");
        let handle = crs_to_c_srs(&crs).unwrap().expect("non-empty CRS");
        let decoded = crs_from_c_srs(handle.c_srs()).unwrap();
        assert_eq!(
            decoded.get("proj"),
            Some(&CrsValue::Str("longlat".to_string()))
        );
        assert_eq!(
            decoded.get("datum"),
            Some(&CrsValue::Str("WGS84".to_string()))
        );
        assert_eq!(decoded.get("no_defs"), Some(&CrsValue::Bool(true)));
    }

    #[test]
    fn empty_crs_encodes_to_no_reference() {
        assert!(crs_to_c_srs(&Crs::new()).unwrap().is_none());
    }
}

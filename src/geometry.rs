//! The neutral geometry model and its marshalling against native OGR
//! geometry handles.
//!
//! Conversion is bidirectional and total over the closed eight-tag set:
//! reading walks the native tree in driver order without taking ownership,
//! writing allocates a fresh native tree behind a scope-bound
//! [`GeometryHandle`] so that every exit path, including marshalling
//! failures, releases what was already built.

use std::ffi::{c_int, c_void};
use std::ptr::null_mut;

use gdal_sys::{OGRErr, OGRGeometryH, OGRwkbByteOrder, OGRwkbGeometryType};

use crate::errors::*;
use crate::utils::_last_null_pointer_err;

/// One coordinate tuple: `(x, y)` or `(x, y, z)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Coord {
    Xy(f64, f64),
    Xyz(f64, f64, f64),
}

impl Coord {
    pub fn x(&self) -> f64 {
        match *self {
            Coord::Xy(x, _) | Coord::Xyz(x, _, _) => x,
        }
    }

    pub fn y(&self) -> f64 {
        match *self {
            Coord::Xy(_, y) | Coord::Xyz(_, y, _) => y,
        }
    }

    pub fn z(&self) -> Option<f64> {
        match *self {
            Coord::Xy(_, _) => None,
            Coord::Xyz(_, _, z) => Some(z),
        }
    }

    /// Coordinate dimensionality: 2 or 3.
    pub fn dim(&self) -> usize {
        match self {
            Coord::Xy(_, _) => 2,
            Coord::Xyz(_, _, _) => 3,
        }
    }

    pub fn is_finite(&self) -> bool {
        match *self {
            Coord::Xy(x, y) => x.is_finite() && y.is_finite(),
            Coord::Xyz(x, y, z) => x.is_finite() && y.is_finite() && z.is_finite(),
        }
    }
}

impl TryFrom<&[f64]> for Coord {
    type Error = Error;

    fn try_from(ordinates: &[f64]) -> Result<Coord> {
        match *ordinates {
            [x, y] => Ok(Coord::Xy(x, y)),
            [x, y, z] => Ok(Coord::Xyz(x, y, z)),
            _ => Err(Error::MalformedCoordinates(format!(
                "expected 2 or 3 ordinates, got {}",
                ordinates.len()
            ))),
        }
    }
}

impl From<(f64, f64)> for Coord {
    fn from((x, y): (f64, f64)) -> Coord {
        Coord::Xy(x, y)
    }
}

impl From<(f64, f64, f64)> for Coord {
    fn from((x, y, z): (f64, f64, f64)) -> Coord {
        Coord::Xyz(x, y, z)
    }
}

/// The closed set of geometry tags supported by the neutral model.
///
/// Curve, surface and measured types have no mapping and fail with
/// [`Error::UnsupportedGeometryType`] when a driver reports them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GeometryType {
    Point,
    LineString,
    LinearRing,
    Polygon,
    MultiPoint,
    MultiLineString,
    MultiPolygon,
    GeometryCollection,
}

impl GeometryType {
    /// Maps a driver-reported type code into the closed tag set, ignoring
    /// the Z flag (dimensionality travels with the coordinates instead).
    pub(crate) fn from_wkb_type(wkb_type: OGRwkbGeometryType::Type) -> Result<GeometryType> {
        let flat = unsafe { gdal_sys::OGR_GT_Flatten(wkb_type) };
        match flat {
            OGRwkbGeometryType::wkbPoint => Ok(GeometryType::Point),
            OGRwkbGeometryType::wkbLineString => Ok(GeometryType::LineString),
            OGRwkbGeometryType::wkbLinearRing => Ok(GeometryType::LinearRing),
            OGRwkbGeometryType::wkbPolygon => Ok(GeometryType::Polygon),
            OGRwkbGeometryType::wkbMultiPoint => Ok(GeometryType::MultiPoint),
            OGRwkbGeometryType::wkbMultiLineString => Ok(GeometryType::MultiLineString),
            OGRwkbGeometryType::wkbMultiPolygon => Ok(GeometryType::MultiPolygon),
            OGRwkbGeometryType::wkbGeometryCollection => Ok(GeometryType::GeometryCollection),
            _ => Err(Error::UnsupportedGeometryType { wkb_type }),
        }
    }

    pub(crate) fn to_wkb_type(self) -> OGRwkbGeometryType::Type {
        match self {
            GeometryType::Point => OGRwkbGeometryType::wkbPoint,
            GeometryType::LineString => OGRwkbGeometryType::wkbLineString,
            GeometryType::LinearRing => OGRwkbGeometryType::wkbLinearRing,
            GeometryType::Polygon => OGRwkbGeometryType::wkbPolygon,
            GeometryType::MultiPoint => OGRwkbGeometryType::wkbMultiPoint,
            GeometryType::MultiLineString => OGRwkbGeometryType::wkbMultiLineString,
            GeometryType::MultiPolygon => OGRwkbGeometryType::wkbMultiPolygon,
            GeometryType::GeometryCollection => OGRwkbGeometryType::wkbGeometryCollection,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            GeometryType::Point => "Point",
            GeometryType::LineString => "LineString",
            GeometryType::LinearRing => "LinearRing",
            GeometryType::Polygon => "Polygon",
            GeometryType::MultiPoint => "MultiPoint",
            GeometryType::MultiLineString => "MultiLineString",
            GeometryType::MultiPolygon => "MultiPolygon",
            GeometryType::GeometryCollection => "GeometryCollection",
        }
    }
}

impl std::fmt::Display for GeometryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A neutral, owned geometry value.
///
/// Leaf variants carry coordinate sequences; `Polygon` and the `Multi*`
/// variants carry their parts in driver ordinal order; a collection nests
/// arbitrary geometries. Rings are stored closed (first coordinate equals
/// last); [`Geometry::to_gdal`] force-closes any ring that is not.
#[derive(Clone, Debug, PartialEq)]
pub enum Geometry {
    Point(Coord),
    LineString(Vec<Coord>),
    LinearRing(Vec<Coord>),
    Polygon(Vec<Vec<Coord>>),
    MultiPoint(Vec<Coord>),
    MultiLineString(Vec<Vec<Coord>>),
    MultiPolygon(Vec<Vec<Vec<Coord>>>),
    GeometryCollection(Vec<Geometry>),
}

impl Geometry {
    pub fn geometry_type(&self) -> GeometryType {
        match self {
            Geometry::Point(_) => GeometryType::Point,
            Geometry::LineString(_) => GeometryType::LineString,
            Geometry::LinearRing(_) => GeometryType::LinearRing,
            Geometry::Polygon(_) => GeometryType::Polygon,
            Geometry::MultiPoint(_) => GeometryType::MultiPoint,
            Geometry::MultiLineString(_) => GeometryType::MultiLineString,
            Geometry::MultiPolygon(_) => GeometryType::MultiPolygon,
            Geometry::GeometryCollection(_) => GeometryType::GeometryCollection,
        }
    }

    /// The first coordinate in driver order, if the geometry is not empty.
    ///
    /// Its arity fixes the dimensionality of the whole tree when marshalling
    /// to a native handle.
    pub fn first_coord(&self) -> Option<Coord> {
        match self {
            Geometry::Point(c) => Some(*c),
            Geometry::LineString(cs) | Geometry::LinearRing(cs) | Geometry::MultiPoint(cs) => {
                cs.first().copied()
            }
            Geometry::Polygon(parts) | Geometry::MultiLineString(parts) => {
                parts.iter().find_map(|p| p.first().copied())
            }
            Geometry::MultiPolygon(polys) => polys
                .iter()
                .flat_map(|rings| rings.iter())
                .find_map(|r| r.first().copied()),
            Geometry::GeometryCollection(geoms) => geoms.iter().find_map(|g| g.first_coord()),
        }
    }

    /// Decodes a Well-Known Binary buffer into a neutral geometry.
    ///
    /// The temporary native geometry is released on every exit path.
    pub fn from_wkb(wkb: &[u8]) -> Result<Geometry> {
        let mut c_geom = null_mut();
        let rv = unsafe {
            gdal_sys::OGR_G_CreateFromWkb(
                wkb.as_ptr() as *const c_void,
                null_mut(),
                &mut c_geom,
                wkb.len() as c_int,
            )
        };
        if rv != OGRErr::OGRERR_NONE {
            return Err(Error::OgrError {
                err: rv,
                method_name: "OGR_G_CreateFromWkb",
            });
        }
        let tmp = unsafe { GeometryHandle::from_c_geometry(c_geom) };
        Geometry::from_gdal(tmp.c_geometry())
    }

    /// Encodes the geometry as little-endian Well-Known Binary.
    ///
    /// WKB has no standalone ring type; a `LinearRing` encodes as its
    /// closed `LineString` equivalent, matching what a ring reads back as
    /// from a native handle. The temporary native geometry is released on
    /// every exit path.
    pub fn to_wkb(&self) -> Result<Vec<u8>> {
        if let Geometry::LinearRing(coords) = self {
            let mut closed = coords.clone();
            if let (Some(&first), Some(&last)) = (closed.first(), closed.last()) {
                if first != last {
                    closed.push(first);
                }
            }
            return Geometry::LineString(closed).to_wkb();
        }
        let tmp = self.to_gdal()?;
        let wkb_size = unsafe { gdal_sys::OGR_G_WkbSize(tmp.c_geometry()) } as usize;
        let mut wkb = vec![0u8; wkb_size];
        let rv = unsafe {
            gdal_sys::OGR_G_ExportToWkb(
                tmp.c_geometry(),
                OGRwkbByteOrder::wkbNDR,
                wkb.as_mut_ptr(),
            )
        };
        if rv != OGRErr::OGRERR_NONE {
            return Err(Error::OgrError {
                err: rv,
                method_name: "OGR_G_ExportToWkb",
            });
        }
        Ok(wkb)
    }

    /// Reads a native geometry into a neutral value.
    ///
    /// Read-only: the input handle keeps its current owner and is not
    /// released here. Container types are walked recursively in the
    /// driver's ordinal order.
    pub(crate) fn from_gdal(c_geom: OGRGeometryH) -> Result<Geometry> {
        let wkb_type = unsafe { gdal_sys::OGR_G_GetGeometryType(c_geom) };
        match GeometryType::from_wkb_type(wkb_type)? {
            GeometryType::Point => Ok(Geometry::Point(read_single_coord(c_geom)?)),
            GeometryType::LineString => Ok(Geometry::LineString(read_coords(c_geom))),
            GeometryType::LinearRing => Ok(Geometry::LinearRing(read_coords(c_geom))),
            GeometryType::Polygon => Ok(Geometry::Polygon(read_rings(c_geom))),
            GeometryType::MultiPoint => {
                let coords = sub_geometries(c_geom)
                    .map(read_single_coord)
                    .collect::<Result<Vec<_>>>()?;
                Ok(Geometry::MultiPoint(coords))
            }
            GeometryType::MultiLineString => Ok(Geometry::MultiLineString(
                sub_geometries(c_geom).map(read_coords).collect(),
            )),
            GeometryType::MultiPolygon => Ok(Geometry::MultiPolygon(
                sub_geometries(c_geom).map(read_rings).collect(),
            )),
            GeometryType::GeometryCollection => {
                let geoms = sub_geometries(c_geom)
                    .map(Geometry::from_gdal)
                    .collect::<Result<Vec<_>>>()?;
                Ok(Geometry::GeometryCollection(geoms))
            }
        }
    }

    /// Builds an owning native geometry from this value.
    ///
    /// The first coordinate encountered fixes the dimensionality of the
    /// created geometry; a later coordinate of the other arity, or a
    /// non-finite ordinate, is [`Error::MalformedCoordinates`]. Rings are
    /// force-closed after their points are appended.
    pub(crate) fn to_gdal(&self) -> Result<GeometryHandle> {
        let dim = self.first_coord().map(|c| c.dim()).unwrap_or(2);
        build_geometry(self, dim)
    }
}

/// Owning wrapper around a native geometry handle.
///
/// Releases the geometry on drop unless ownership was transferred out via
/// [`into_c_geometry`](GeometryHandle::into_c_geometry).
pub(crate) struct GeometryHandle {
    c_geometry: OGRGeometryH,
}

impl GeometryHandle {
    fn create(wkb_type: OGRwkbGeometryType::Type) -> Result<GeometryHandle> {
        let c_geometry = unsafe { gdal_sys::OGR_G_CreateGeometry(wkb_type) };
        if c_geometry.is_null() {
            return Err(_last_null_pointer_err("OGR_G_CreateGeometry"));
        }
        Ok(GeometryHandle { c_geometry })
    }

    /// Takes ownership of a native geometry handle.
    ///
    /// # Safety
    /// `c_geometry` must be a valid geometry handle with no other owner.
    pub(crate) unsafe fn from_c_geometry(c_geometry: OGRGeometryH) -> GeometryHandle {
        GeometryHandle { c_geometry }
    }

    pub(crate) fn c_geometry(&self) -> OGRGeometryH {
        self.c_geometry
    }

    /// Relinquishes ownership, e.g. before attaching the geometry to a
    /// native feature.
    pub(crate) fn into_c_geometry(self) -> OGRGeometryH {
        let c_geometry = self.c_geometry;
        std::mem::forget(self);
        c_geometry
    }
}

impl Drop for GeometryHandle {
    fn drop(&mut self) {
        unsafe { gdal_sys::OGR_G_DestroyGeometry(self.c_geometry) };
    }
}

fn read_point_at(c_geom: OGRGeometryH, index: c_int, dim: c_int) -> Coord {
    let mut x = 0.0;
    let mut y = 0.0;
    let mut z = 0.0;
    unsafe { gdal_sys::OGR_G_GetPoint(c_geom, index, &mut x, &mut y, &mut z) };
    if dim >= 3 {
        Coord::Xyz(x, y, z)
    } else {
        Coord::Xy(x, y)
    }
}

fn read_single_coord(c_geom: OGRGeometryH) -> Result<Coord> {
    if unsafe { gdal_sys::OGR_G_GetPointCount(c_geom) } < 1 {
        return Err(Error::MalformedCoordinates(
            "point geometry carries no coordinates".to_string(),
        ));
    }
    let dim = unsafe { gdal_sys::OGR_G_GetCoordinateDimension(c_geom) };
    Ok(read_point_at(c_geom, 0, dim))
}

fn read_coords(c_geom: OGRGeometryH) -> Vec<Coord> {
    let dim = unsafe { gdal_sys::OGR_G_GetCoordinateDimension(c_geom) };
    let count = unsafe { gdal_sys::OGR_G_GetPointCount(c_geom) };
    (0..count).map(|i| read_point_at(c_geom, i, dim)).collect()
}

fn read_rings(c_geom: OGRGeometryH) -> Vec<Vec<Coord>> {
    sub_geometries(c_geom).map(read_coords).collect()
}

/// Non-owning references to the sub-geometries, in ordinal order.
fn sub_geometries(c_geom: OGRGeometryH) -> impl Iterator<Item = OGRGeometryH> {
    let count = unsafe { gdal_sys::OGR_G_GetGeometryCount(c_geom) };
    (0..count).map(move |i| unsafe { gdal_sys::OGR_G_GetGeometryRef(c_geom, i) })
}

fn append_coord(handle: &GeometryHandle, coord: Coord, dim: usize) -> Result<()> {
    if !coord.is_finite() {
        return Err(Error::MalformedCoordinates(format!(
            "non-finite ordinate in {coord:?}"
        )));
    }
    match (dim, coord) {
        (2, Coord::Xy(x, y)) => unsafe {
            gdal_sys::OGR_G_AddPoint_2D(handle.c_geometry(), x, y)
        },
        (3, Coord::Xyz(x, y, z)) => unsafe {
            gdal_sys::OGR_G_AddPoint(handle.c_geometry(), x, y, z)
        },
        _ => {
            return Err(Error::MalformedCoordinates(format!(
                "mixed dimensionality: expected {dim}-dimensional coordinates, got {coord:?}"
            )))
        }
    }
    Ok(())
}

fn append_sub(parent: &GeometryHandle, sub: GeometryHandle) -> Result<()> {
    // Ownership of `sub` passes to the parent even if the call fails.
    let rv =
        unsafe { gdal_sys::OGR_G_AddGeometryDirectly(parent.c_geometry(), sub.into_c_geometry()) };
    if rv != OGRErr::OGRERR_NONE {
        return Err(Error::OgrError {
            err: rv,
            method_name: "OGR_G_AddGeometryDirectly",
        });
    }
    Ok(())
}

fn build_line(
    wkb_type: OGRwkbGeometryType::Type,
    coords: &[Coord],
    dim: usize,
) -> Result<GeometryHandle> {
    let handle = GeometryHandle::create(wkb_type)?;
    for coord in coords {
        append_coord(&handle, *coord, dim)?;
    }
    Ok(handle)
}

fn build_ring(coords: &[Coord], dim: usize) -> Result<GeometryHandle> {
    let handle = build_line(OGRwkbGeometryType::wkbLinearRing, coords, dim)?;
    // Force-close: append the first coordinate again unless it already
    // equals the last.
    if let (Some(first), Some(last)) = (coords.first(), coords.last()) {
        if first != last {
            append_coord(&handle, *first, dim)?;
        }
    }
    Ok(handle)
}

fn build_polygon(rings: &[Vec<Coord>], dim: usize) -> Result<GeometryHandle> {
    let handle = GeometryHandle::create(OGRwkbGeometryType::wkbPolygon)?;
    for ring in rings {
        append_sub(&handle, build_ring(ring, dim)?)?;
    }
    Ok(handle)
}

fn build_geometry(geometry: &Geometry, dim: usize) -> Result<GeometryHandle> {
    match geometry {
        Geometry::Point(coord) => {
            let handle = GeometryHandle::create(OGRwkbGeometryType::wkbPoint)?;
            append_coord(&handle, *coord, dim)?;
            Ok(handle)
        }
        Geometry::LineString(coords) => {
            build_line(OGRwkbGeometryType::wkbLineString, coords, dim)
        }
        Geometry::LinearRing(coords) => build_ring(coords, dim),
        Geometry::Polygon(rings) => build_polygon(rings, dim),
        Geometry::MultiPoint(coords) => {
            let handle = GeometryHandle::create(OGRwkbGeometryType::wkbMultiPoint)?;
            for coord in coords {
                let point = GeometryHandle::create(OGRwkbGeometryType::wkbPoint)?;
                append_coord(&point, *coord, dim)?;
                append_sub(&handle, point)?;
            }
            Ok(handle)
        }
        Geometry::MultiLineString(lines) => {
            let handle = GeometryHandle::create(OGRwkbGeometryType::wkbMultiLineString)?;
            for line in lines {
                append_sub(
                    &handle,
                    build_line(OGRwkbGeometryType::wkbLineString, line, dim)?,
                )?;
            }
            Ok(handle)
        }
        Geometry::MultiPolygon(polygons) => {
            let handle = GeometryHandle::create(OGRwkbGeometryType::wkbMultiPolygon)?;
            for rings in polygons {
                append_sub(&handle, build_polygon(rings, dim)?)?;
            }
            Ok(handle)
        }
        Geometry::GeometryCollection(geometries) => {
            let handle = GeometryHandle::create(OGRwkbGeometryType::wkbGeometryCollection)?;
            for sub in geometries {
                append_sub(&handle, build_geometry(sub, dim)?)?;
            }
            Ok(handle)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xy(x: f64, y: f64) -> Coord {
        Coord::Xy(x, y)
    }

    fn xyz(x: f64, y: f64, z: f64) -> Coord {
        Coord::Xyz(x, y, z)
    }

    fn sample_2d() -> Vec<Geometry> {
        vec![
            Geometry::Point(xy(1.0, 2.0)),
            Geometry::LineString(vec![xy(0.0, 0.0), xy(1.0, 1.0), xy(2.0, 0.5)]),
            Geometry::Polygon(vec![vec![
                xy(0.0, 0.0),
                xy(4.0, 0.0),
                xy(4.0, 4.0),
                xy(0.0, 4.0),
                xy(0.0, 0.0),
            ]]),
            Geometry::MultiPoint(vec![xy(0.0, 0.0), xy(5.0, 5.0)]),
            Geometry::MultiLineString(vec![
                vec![xy(0.0, 0.0), xy(1.0, 0.0)],
                vec![xy(0.0, 1.0), xy(1.0, 1.0)],
            ]),
            Geometry::MultiPolygon(vec![vec![vec![
                xy(0.0, 0.0),
                xy(1.0, 0.0),
                xy(1.0, 1.0),
                xy(0.0, 0.0),
            ]]]),
            Geometry::GeometryCollection(vec![
                Geometry::Point(xy(3.0, 4.0)),
                Geometry::LineString(vec![xy(0.0, 0.0), xy(1.0, 1.0)]),
            ]),
        ]
    }

    fn sample_3d() -> Vec<Geometry> {
        vec![
            Geometry::Point(xyz(1.0, 2.0, 3.0)),
            Geometry::LineString(vec![xyz(0.0, 0.0, 1.0), xyz(1.0, 1.0, 2.0)]),
            Geometry::Polygon(vec![vec![
                xyz(0.0, 0.0, 1.0),
                xyz(4.0, 0.0, 1.0),
                xyz(4.0, 4.0, 1.0),
                xyz(0.0, 0.0, 1.0),
            ]]),
            Geometry::MultiPoint(vec![xyz(0.0, 0.0, 0.5), xyz(5.0, 5.0, 1.5)]),
            Geometry::MultiLineString(vec![vec![xyz(0.0, 0.0, 0.0), xyz(1.0, 0.0, 1.0)]]),
            Geometry::MultiPolygon(vec![vec![vec![
                xyz(0.0, 0.0, 2.0),
                xyz(1.0, 0.0, 2.0),
                xyz(1.0, 1.0, 2.0),
                xyz(0.0, 0.0, 2.0),
            ]]]),
            Geometry::GeometryCollection(vec![Geometry::Point(xyz(3.0, 4.0, 5.0))]),
        ]
    }

    #[test]
    fn coord_from_slice() {
        assert_eq!(Coord::try_from([1.0, 2.0].as_slice()).unwrap(), xy(1.0, 2.0));
        assert_eq!(
            Coord::try_from([1.0, 2.0, 3.0].as_slice()).unwrap(),
            xyz(1.0, 2.0, 3.0)
        );
        assert!(matches!(
            Coord::try_from([1.0].as_slice()),
            Err(Error::MalformedCoordinates(_))
        ));
        assert!(matches!(
            Coord::try_from([1.0, 2.0, 3.0, 4.0].as_slice()),
            Err(Error::MalformedCoordinates(_))
        ));
    }

    #[test]
    fn native_round_trip_2d() {
        for geometry in sample_2d() {
            let handle = geometry.to_gdal().unwrap();
            let back = Geometry::from_gdal(handle.c_geometry()).unwrap();
            assert_eq!(back, geometry);
        }
    }

    #[test]
    fn native_round_trip_3d() {
        for geometry in sample_3d() {
            let handle = geometry.to_gdal().unwrap();
            let back = Geometry::from_gdal(handle.c_geometry()).unwrap();
            assert_eq!(back, geometry);
        }
    }

    #[test]
    fn wkb_round_trip() {
        for geometry in sample_2d().into_iter().chain(sample_3d()) {
            let wkb = geometry.to_wkb().unwrap();
            assert_eq!(Geometry::from_wkb(&wkb).unwrap(), geometry);
        }
    }

    #[test]
    fn ring_closure_is_idempotent() {
        // Unclosed input ring comes back closed; marshalling the closed
        // result again is a fixed point.
        let unclosed = Geometry::Polygon(vec![vec![
            xy(0.0, 0.0),
            xy(2.0, 0.0),
            xy(2.0, 2.0),
            xy(0.0, 2.0),
        ]]);
        let handle = unclosed.to_gdal().unwrap();
        let closed = Geometry::from_gdal(handle.c_geometry()).unwrap();
        let expected = Geometry::Polygon(vec![vec![
            xy(0.0, 0.0),
            xy(2.0, 0.0),
            xy(2.0, 2.0),
            xy(0.0, 2.0),
            xy(0.0, 0.0),
        ]]);
        assert_eq!(closed, expected);

        let handle = closed.to_gdal().unwrap();
        assert_eq!(Geometry::from_gdal(handle.c_geometry()).unwrap(), closed);
    }

    #[test]
    fn linear_ring_reads_back_as_closed_line() {
        // WKB and the OGR type code have no standalone ring type; a ring
        // written on its own comes back as a closed LineString.
        let ring = Geometry::LinearRing(vec![xy(0.0, 0.0), xy(1.0, 0.0), xy(1.0, 1.0)]);
        let handle = ring.to_gdal().unwrap();
        let back = Geometry::from_gdal(handle.c_geometry()).unwrap();
        let coords = match back {
            Geometry::LineString(coords) | Geometry::LinearRing(coords) => coords,
            other => panic!("unexpected geometry: {other:?}"),
        };
        assert_eq!(coords.first(), coords.last());
        assert_eq!(coords.len(), 4);
    }

    #[test]
    fn ring_wkb_encodes_as_closed_line() {
        // Same shape as the native read-back: the ring tag itself does not
        // survive WKB, the closed coordinate sequence does.
        let ring = Geometry::LinearRing(vec![xy(0.0, 0.0), xy(1.0, 0.0), xy(1.0, 1.0)]);
        let wkb = ring.to_wkb().unwrap();
        assert_eq!(
            Geometry::from_wkb(&wkb).unwrap(),
            Geometry::LineString(vec![
                xy(0.0, 0.0),
                xy(1.0, 0.0),
                xy(1.0, 1.0),
                xy(0.0, 0.0),
            ])
        );

        let already_closed =
            Geometry::LinearRing(vec![xy(0.0, 0.0), xy(2.0, 0.0), xy(2.0, 2.0), xy(0.0, 0.0)]);
        let wkb = already_closed.to_wkb().unwrap();
        assert_eq!(
            Geometry::from_wkb(&wkb).unwrap(),
            Geometry::LineString(vec![
                xy(0.0, 0.0),
                xy(2.0, 0.0),
                xy(2.0, 2.0),
                xy(0.0, 0.0),
            ])
        );
    }

    #[test]
    fn mixed_dimensionality_is_rejected() {
        let mixed = Geometry::LineString(vec![xy(0.0, 0.0), xyz(1.0, 1.0, 1.0)]);
        assert!(matches!(
            mixed.to_gdal(),
            Err(Error::MalformedCoordinates(_))
        ));
    }

    #[test]
    fn non_finite_ordinates_are_rejected() {
        let bad = Geometry::Point(xy(f64::NAN, 0.0));
        assert!(matches!(bad.to_gdal(), Err(Error::MalformedCoordinates(_))));
    }

    #[test]
    fn empty_geometry_defaults_to_2d() {
        let empty = Geometry::LineString(vec![]);
        let handle = empty.to_gdal().unwrap();
        assert_eq!(Geometry::from_gdal(handle.c_geometry()).unwrap(), empty);
    }
}

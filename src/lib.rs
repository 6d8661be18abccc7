//! Streaming access to vector geospatial datasets through [GDAL/OGR],
//! with a neutral, owned feature model.
//!
//! Format I/O is delegated to the native library; this crate is the
//! marshalling and session layer on top of it: native geometry, feature,
//! schema and spatial-reference handles convert to and from plain Rust
//! values, and sessions own the native datasource/layer handles across
//! read, create and append modes so that nothing leaks or is released
//! twice on any path.
//!
//! ## Reading
//!
//! ```no_run
//! use ogrstream::ReadSession;
//!
//! # fn main() -> ogrstream::errors::Result<()> {
//! let mut session = ReadSession::open("roads.geojson")?;
//! if let Some(count) = session.feature_count()? {
//!     println!("{count} features");
//! }
//! for feature in session.features()? {
//!     let feature = feature?;
//!     println!("{}: {:?}", feature.id, feature.property("highway"));
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Writing
//!
//! ```no_run
//! use ogrstream::{
//!     Coord, Crs, Feature, FieldType, Geometry, GeometryType, Schema, WriteSession,
//! };
//!
//! # fn main() -> ogrstream::errors::Result<()> {
//! let schema = Schema::new(GeometryType::Point, [("name", FieldType::Str)])?;
//! let mut session =
//!     WriteSession::create("cities.geojson", "GeoJSON", "cities", schema, &Crs::new())?;
//! let city = Feature::new(Some(Geometry::Point(Coord::Xy(30.5, 50.4))))
//!     .with_property("name", "Kyiv");
//! session.write(&city)?;
//! session.stop();
//! # Ok(())
//! # }
//! ```
//!
//! [GDAL/OGR]: https://gdal.org/

pub mod errors;
pub mod utils;

mod crs;
mod dataset;
mod driver;
mod feature;
mod geometry;
mod options;
mod schema;
mod session;

pub use crs::{Crs, CrsValue};
pub use driver::{register_drivers, Driver};
pub use errors::{Error, Result};
pub use feature::{Feature, FieldValue};
pub use geometry::{Coord, Geometry, GeometryType};
pub use options::GdalOpenFlags;
pub use schema::{FieldType, Schema};
pub use session::{BoundingBox, FeatureIterator, LayerSelector, ReadSession, WriteSession};

pub(crate) use dataset::DatasetHandle;

use std::ffi::c_uint;

use bitflags::bitflags;

bitflags! {
    /// Extended open flags passed in the `nOpenFlags` argument of
    /// [`GDALOpenEx`].
    ///
    /// Note that `GDAL_OF_SHARED` is deliberately absent: shared handles
    /// would subvert the one-owner-per-datasource rule the session layer
    /// is built on.
    ///
    /// [`GDALOpenEx`]: https://gdal.org/doxygen/gdal_8h.html#a9cb8585d0b3c16726b08e25bcc94274a
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct GdalOpenFlags: c_uint {
        /// Open in read-only mode (default).
        const GDAL_OF_READONLY = 0x00;
        /// Open in update mode.
        const GDAL_OF_UPDATE = 0x01;
        /// Allow vector drivers to be used.
        const GDAL_OF_VECTOR = 0x04;
        /// Emit an error message in case of a failed open.
        const GDAL_OF_VERBOSE_ERROR = 0x40;
    }
}

impl Default for GdalOpenFlags {
    fn default() -> GdalOpenFlags {
        GdalOpenFlags::GDAL_OF_READONLY | GdalOpenFlags::GDAL_OF_VECTOR
    }
}

//! Gravitational-wave sky localization maps.
//!
//! A sky map is a HEALPix probability map, optionally with the per-pixel
//! distance ansatz (`DISTMU`, `DISTSIGMA`, `DISTNORM`). This module decodes
//! maps from FITS (flat or multi-order, optionally gzip-compressed) and
//! exposes pixel geometry for the region extractor.

pub mod fits;
pub mod healpix;
pub mod loader;
pub mod map;

pub use healpix::Ordering;
pub use loader::{fetch_skymap, load_from_bytes, load_from_path, LoadOptions};
pub use map::{DirectionLookup, DistanceMap, ProbabilityMap, SkyMap, SkyMapMeta};

/// Result type for sky-map operations
pub type SkyMapResult<T> = Result<T, SkyMapError>;

/// Error type for sky-map decoding and download
#[derive(Debug, thiserror::Error)]
pub enum SkyMapError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Download of {url} failed: {message}")]
    Download { url: String, message: String },

    #[error("Malformed FITS: {0}")]
    Format(String),

    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Pixel count {0} is not 12·nside² for any positive nside")]
    InvalidResolution(usize),

    #[error("Unsupported pixel ordering: {0}")]
    UnsupportedOrdering(String),

    #[error("Invalid map value at pixel {index}: {value}")]
    InvalidValue { index: usize, value: f64 },
}

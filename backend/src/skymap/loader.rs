//! Sky-map loading from bytes, local files, or a remote URL.

use std::io::Read;
use std::path::Path;
use std::time::Duration;

use flate2::read::GzDecoder;
use sha2::{Digest, Sha256};

use super::fits::BinTable;
use super::map::SkyMap;
use super::{SkyMapError, SkyMapResult};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Finest multi-order level decoded by default (nside 512).
pub const DEFAULT_MAX_ORDER: u32 = 9;

/// Decoding options.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Multi-order maps are flattened to at most this order.
    pub max_order: u32,
    /// Timeout for remote downloads.
    pub timeout: Duration,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            max_order: DEFAULT_MAX_ORDER,
            timeout: Duration::from_secs(120),
        }
    }
}

/// Decode a map from raw FITS bytes, gzip-compressed or not.
pub fn load_from_bytes(bytes: &[u8], options: &LoadOptions) -> SkyMapResult<SkyMap> {
    let checksum = hex::encode(Sha256::digest(bytes));

    let decompressed;
    let fits = if bytes.starts_with(&GZIP_MAGIC) {
        let mut buf = Vec::new();
        GzDecoder::new(bytes).read_to_end(&mut buf)?;
        log::debug!("Decompressed sky map: {} -> {} bytes", bytes.len(), buf.len());
        decompressed = buf;
        &decompressed[..]
    } else {
        bytes
    };

    let mut table = BinTable::from_bytes(fits)?;
    let mut map = SkyMap::from_bintable(&mut table, options.max_order)?;
    map.meta.checksum = Some(checksum);

    log::info!(
        "Loaded sky map: nside={} ordering={:?} pixels={} distance={}",
        map.probability.nside(),
        map.probability.ordering(),
        map.probability.len(),
        map.distance.is_some()
    );
    Ok(map)
}

pub fn load_from_path<P: AsRef<Path>>(path: P, options: &LoadOptions) -> SkyMapResult<SkyMap> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    let mut map = load_from_bytes(&bytes, options)?;
    map.meta.source = Some(path.display().to_string());
    Ok(map)
}

/// Download a map over HTTP(S).
pub async fn download(url: &str, options: &LoadOptions) -> SkyMapResult<SkyMap> {
    let download_error = |message: String| SkyMapError::Download {
        url: url.to_string(),
        message,
    };

    let client = reqwest::Client::builder()
        .timeout(options.timeout)
        .build()
        .map_err(|e| download_error(format!("failed to build HTTP client: {}", e)))?;

    log::debug!("GET {}", url);
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| download_error(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(download_error(format!("HTTP {}", status)));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| download_error(e.to_string()))?;

    let mut map = load_from_bytes(&bytes, options)?;
    map.meta.source = Some(url.to_string());
    Ok(map)
}

/// Load a map from either an `http(s)://` URL or a filesystem path.
pub async fn fetch_skymap(source: &str, options: &LoadOptions) -> SkyMapResult<SkyMap> {
    if source.starts_with("http://") || source.starts_with("https://") {
        download(source, options).await
    } else {
        let path = source.strip_prefix("file://").unwrap_or(source);
        load_from_path(path, options)
    }
}

//! Remote collaborators: the alert broker and the catalog cross-match service.
//!
//! The pipeline only sees the [`AlertBroker`] and [`CatalogService`] traits,
//! so the HTTP clients can be swapped for the in-memory doubles in
//! [`local`] in tests and offline runs.
//!
//! ```text
//! ┌──────────────────────────────┐
//! │  services::pipeline          │
//! └──────────────┬───────────────┘
//!                │  &dyn AlertBroker / &dyn CatalogService
//!     ┌──────────┴──────────┬─────────────────────┐
//!     │ AlerceClient (HTTP) │ CatshtmClient (HTTP)│ LocalBroker / LocalCatalog
//!     └─────────────────────┴─────────────────────┘
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod alerce;
pub mod catshtm;
pub mod error;
pub mod local;

pub use alerce::AlerceClient;
pub use catshtm::CatshtmClient;
pub use error::{BrokerError, BrokerResult, ErrorContext};
pub use local::{LocalBroker, LocalCatalog};

use crate::models::{CandidateRecord, CatalogMatch, LightCurve, ObjectId, SkyDirection, StampKind, TimeWindow};

/// Cone + first-detection window search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConeQuery {
    pub center: SkyDirection,
    pub radius_arcsec: f64,
    /// Window on the first-detection epoch, both ends inclusive.
    pub window: TimeWindow,
    pub min_detections: u32,
}

impl ConeQuery {
    /// Whether a record satisfies every constraint of this query.
    pub fn matches(&self, record: &CandidateRecord) -> bool {
        record.ndet >= self.min_detections
            && self.window.contains(record.firstmjd)
            && self.center.separation_arcsec(&record.position()) <= self.radius_arcsec
    }
}

/// Alert-stream broker.
///
/// # Thread Safety
/// Implementations must be `Send + Sync` so the pipeline can run on a
/// multi-threaded runtime.
#[async_trait]
pub trait AlertBroker: Send + Sync {
    /// Objects inside the cone whose first detection falls in the window and
    /// that have at least `min_detections` detections.
    ///
    /// A single attempt; failures propagate to the caller.
    async fn query_objects(&self, query: &ConeQuery) -> BrokerResult<Vec<CandidateRecord>>;

    async fn light_curve(&self, oid: &ObjectId) -> BrokerResult<LightCurve>;

    /// Raw image bytes (PNG) of one cutout.
    async fn stamp(&self, oid: &ObjectId, candid: &str, kind: StampKind) -> BrokerResult<Vec<u8>>;
}

/// Positional cross-match against an external catalog.
#[async_trait]
pub trait CatalogService: Send + Sync {
    /// Nearest catalog source within `radius_arcsec` of `position`, if any.
    async fn nearest(
        &self,
        position: &SkyDirection,
        radius_arcsec: f64,
        catalog: &str,
    ) -> BrokerResult<Option<CatalogMatch>>;
}

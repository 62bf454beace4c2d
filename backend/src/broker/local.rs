//! In-memory broker and catalog implementations.
//!
//! Both doubles answer from data seeded up front and apply the same
//! constraints the remote services do, so pipeline tests run offline and
//! deterministically. Individual objects can be marked as failing to
//! exercise the skip-and-warn paths.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::error::{BrokerError, BrokerResult, ErrorContext};
use super::{AlertBroker, CatalogService, ConeQuery};
use crate::models::{CandidateRecord, CatalogMatch, LightCurve, ObjectId, SkyDirection, StampKind};

#[derive(Default)]
struct BrokerData {
    records: Vec<CandidateRecord>,
    light_curves: HashMap<ObjectId, LightCurve>,
    stamps: HashMap<(ObjectId, String, &'static str), Vec<u8>>,
    failing: HashSet<ObjectId>,
    unavailable: bool,
}

/// In-memory alert broker.
#[derive(Clone, Default)]
pub struct LocalBroker {
    data: Arc<RwLock<BrokerData>>,
    queries: Arc<AtomicUsize>,
}

impl LocalBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<CandidateRecord>) -> Self {
        let broker = Self::new();
        broker.data.write().records = records;
        broker
    }

    pub fn add_light_curve(&self, oid: ObjectId, curve: LightCurve) {
        self.data.write().light_curves.insert(oid, curve);
    }

    pub fn add_stamp(&self, oid: ObjectId, candid: &str, kind: StampKind, bytes: Vec<u8>) {
        self.data
            .write()
            .stamps
            .insert((oid, candid.to_string(), kind.as_str()), bytes);
    }

    /// Per-object calls for `oid` fail with a retryable connection error.
    pub fn fail_object(&self, oid: ObjectId) {
        self.data.write().failing.insert(oid);
    }

    /// Every object search fails.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.data.write().unavailable = unavailable;
    }

    /// Number of object searches served so far.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    fn check_object(&self, operation: &str, oid: &ObjectId) -> BrokerResult<()> {
        if self.data.read().failing.contains(oid) {
            return Err(BrokerError::connection(
                "simulated failure",
                ErrorContext::new(operation).with_entity("object").with_entity_id(oid),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl AlertBroker for LocalBroker {
    async fn query_objects(&self, query: &ConeQuery) -> BrokerResult<Vec<CandidateRecord>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        let data = self.data.read();
        if data.unavailable {
            return Err(BrokerError::connection(
                "broker unavailable",
                ErrorContext::new("query_objects"),
            ));
        }
        Ok(data.records.iter().filter(|r| query.matches(r)).cloned().collect())
    }

    async fn light_curve(&self, oid: &ObjectId) -> BrokerResult<LightCurve> {
        self.check_object("light_curve", oid)?;
        self.data
            .read()
            .light_curves
            .get(oid)
            .cloned()
            .map(LightCurve::sorted)
            .ok_or_else(|| {
                BrokerError::not_found(
                    "no light curve",
                    ErrorContext::new("light_curve").with_entity("object").with_entity_id(oid),
                )
            })
    }

    async fn stamp(&self, oid: &ObjectId, candid: &str, kind: StampKind) -> BrokerResult<Vec<u8>> {
        self.check_object("stamp", oid)?;
        self.data
            .read()
            .stamps
            .get(&(oid.clone(), candid.to_string(), kind.as_str()))
            .cloned()
            .ok_or_else(|| {
                BrokerError::not_found(
                    "stamp not available",
                    ErrorContext::new("stamp")
                        .with_entity(kind.as_str())
                        .with_entity_id(format!("{}/{}", oid, candid)),
                )
            })
    }
}

/// Radius around a failing position within which lookups error.
const FAIL_RADIUS_ARCSEC: f64 = 1.0;

#[derive(Default)]
struct CatalogData {
    sources: Vec<(SkyDirection, CatalogMatch)>,
    failing: Vec<SkyDirection>,
}

/// In-memory cross-match catalog.
#[derive(Clone, Default)]
pub struct LocalCatalog {
    data: Arc<RwLock<CatalogData>>,
}

impl LocalCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source; `entry.catalog` selects which catalog it belongs to.
    pub fn add_source(&self, position: SkyDirection, entry: CatalogMatch) {
        self.data.write().sources.push((position, entry));
    }

    /// Lookups centred near `position` fail.
    pub fn fail_near(&self, position: SkyDirection) {
        self.data.write().failing.push(position);
    }
}

#[async_trait]
impl CatalogService for LocalCatalog {
    async fn nearest(
        &self,
        position: &SkyDirection,
        radius_arcsec: f64,
        catalog: &str,
    ) -> BrokerResult<Option<CatalogMatch>> {
        let data = self.data.read();
        if data
            .failing
            .iter()
            .any(|p| p.separation_arcsec(position) <= FAIL_RADIUS_ARCSEC)
        {
            return Err(BrokerError::connection(
                "simulated failure",
                ErrorContext::new("crossmatch").with_entity(catalog).with_entity_id(position),
            ));
        }

        let best = data
            .sources
            .iter()
            .filter(|(_, m)| m.catalog.eq_ignore_ascii_case(catalog))
            .map(|(p, m)| (p.separation_arcsec(position), m))
            .filter(|(sep, _)| *sep <= radius_arcsec)
            .min_by(|a, b| a.0.total_cmp(&b.0));

        Ok(best.map(|(sep, m)| CatalogMatch {
            separation_arcsec: Some(sep),
            ..m.clone()
        }))
    }
}

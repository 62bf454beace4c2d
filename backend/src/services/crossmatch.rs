//! Catalog cross-matching of surviving candidates.

use std::collections::BTreeMap;

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};

use crate::broker::CatalogService;
use crate::models::{CandidateRecord, CatalogMatch, ObjectId};

/// Outcome of a cross-match pass.
///
/// Objects with no association are simply absent from `matches`; objects
/// whose lookup failed are listed in `failures` and also absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrossmatchOutcome {
    pub matches: BTreeMap<ObjectId, CatalogMatch>,
    pub failures: Vec<ObjectId>,
    pub warnings: Vec<String>,
}

/// Look up the nearest `catalog` source within `radius_arcsec` of each record.
///
/// With `concurrency` > 1 up to that many lookups are in flight at once.
/// Results are keyed by object id, so the outcome does not depend on
/// completion order.
pub async fn crossmatch(
    records: &[CandidateRecord],
    service: &dyn CatalogService,
    catalog: &str,
    radius_arcsec: f64,
    concurrency: usize,
) -> CrossmatchOutcome {
    let lookups = records.iter().map(|record| async move {
        let result = service.nearest(&record.position(), radius_arcsec, catalog).await;
        (record.oid.clone(), result)
    });
    let results: Vec<_> = stream::iter(lookups)
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let mut outcome = CrossmatchOutcome::default();
    for (oid, result) in results {
        match result {
            Ok(Some(found)) => {
                log::debug!("{} -> {} {}", oid, found.catalog, found.name);
                outcome.matches.insert(oid, found);
            }
            Ok(None) => log::debug!("{}: no {} source within {}\"", oid, catalog, radius_arcsec),
            Err(e) => {
                log::warn!("Cross-match failed for {}: {}", oid, e);
                outcome.warnings.push(format!("crossmatch {}: {}", oid, e));
                outcome.failures.push(oid);
            }
        }
    }
    outcome.failures.sort();
    outcome.warnings.sort();

    log::info!(
        "Cross-match against {}: {} of {} candidates associated ({} failed)",
        catalog,
        outcome.matches.len(),
        records.len(),
        outcome.failures.len()
    );
    outcome
}

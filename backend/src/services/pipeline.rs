//! End-to-end counterpart search.
//!
//! ```text
//! SkyMap ─► CredibleRegion(s) ─► hemisphere mask ─► ConeApproximation
//!        ─► broker query ─► in-region ─► prior-history ─► non-stellar
//!        ─► cross-match ─► distance window
//! ```
//!
//! Each candidate stage is a subset of the one before it. Only the sky-map
//! load and the broker query are fatal; per-object failures are recorded as
//! warnings in the report.

use serde::{Deserialize, Serialize};

use super::cosmology::Cosmology;
use super::crossmatch::crossmatch;
use super::filters::{
    annotate, filter_by_distance, filter_by_pixel_distance, filter_prior_history, filter_stellar, DistanceWindow,
};
use super::region::{fit_cone, filter_in_region, restrict_to_hemisphere, ConeApproximation, CredibleRegion, RegionError};
use crate::broker::{AlertBroker, AlerceClient, BrokerError, CatalogService, CatshtmClient, ConeQuery};
use crate::config::{ConfigError, PipelineConfig};
use crate::models::{AnnotatedCandidate, CandidateRecord, ModifiedJulianDate, TimeWindow};
use crate::skymap::{fetch_skymap, LoadOptions, SkyMap, SkyMapError, SkyMapMeta};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Sky map error: {0}")]
    SkyMap(#[from] SkyMapError),

    #[error("Region error: {0}")]
    Region(#[from] RegionError),

    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("No sky map configured (set event.skymap or GW_SKYMAP_URL)")]
    MissingSkymap,

    #[error("No trigger time: set event.trigger_mjd or provide MJD-OBS in the map header")]
    MissingTrigger,
}

/// Size and extent of one credible region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionSummary {
    pub mass: f64,
    pub threshold: f64,
    pub cells: usize,
    pub area_deg2: f64,
    pub probability: f64,
}

/// Everything the pipeline derived, stage by stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub event: Option<String>,
    pub skymap: SkyMapMeta,
    pub trigger: ModifiedJulianDate,
    pub regions: Vec<RegionSummary>,
    pub query_region: RegionSummary,
    /// Cells of the query region left after the hemisphere mask.
    pub masked_cells: usize,
    pub cone: ConeApproximation,
    pub window: TimeWindow,
    /// Whether the extended window had to be used.
    pub requeried: bool,
    pub raw_candidates: Vec<CandidateRecord>,
    pub in_region: Vec<CandidateRecord>,
    pub temporally_valid: Vec<CandidateRecord>,
    pub non_stellar: Vec<CandidateRecord>,
    pub crossmatched: Vec<AnnotatedCandidate>,
    pub cosmology: Cosmology,
    pub distance_window: Option<DistanceWindow>,
    /// Whether candidates were checked against their own pixel's distance.
    pub per_pixel_distance: bool,
    pub distance_filtered: Vec<AnnotatedCandidate>,
    pub warnings: Vec<String>,
}

impl PipelineReport {
    /// Final candidates: distance-filtered when a window was available.
    pub fn final_candidates(&self) -> &[AnnotatedCandidate] {
        &self.distance_filtered
    }
}

fn summarize(region: &CredibleRegion, map: &SkyMap) -> RegionSummary {
    RegionSummary {
        mass: region.mass,
        threshold: region.threshold,
        cells: region.len(),
        area_deg2: region.area_deg2(&map.probability),
        probability: region.probability,
    }
}

/// Load the configured event map (URL or path).
pub async fn load_event_map(config: &PipelineConfig) -> Result<SkyMap, PipelineError> {
    let source = config.event.skymap.as_deref().ok_or(PipelineError::MissingSkymap)?;
    let options = LoadOptions {
        max_order: config.skymap.max_order,
        timeout: std::time::Duration::from_secs(config.skymap.timeout_secs),
    };
    log::info!("Fetching sky map from {}", source);
    Ok(fetch_skymap(source, &options).await?)
}

/// HTTP clients for the configured broker and cross-match endpoints.
pub fn build_clients(config: &PipelineConfig) -> Result<(AlerceClient, CatshtmClient), PipelineError> {
    let broker = AlerceClient::new(
        config.broker.alerce_url.clone(),
        config.broker.stamps_url.clone(),
        config.broker.timeout(),
        config.broker.page_size,
    )?
    .with_max_pages(config.broker.max_pages);
    let catalog = CatshtmClient::new(
        config.broker.catshtm_url.clone(),
        config.broker.timeout(),
        config.crossmatch.columns(),
    )?;
    Ok((broker, catalog))
}

/// Run every stage against an already loaded map.
pub async fn run_pipeline(
    map: &SkyMap,
    broker: &dyn AlertBroker,
    catalog: &dyn CatalogService,
    config: &PipelineConfig,
) -> Result<PipelineReport, PipelineError> {
    config.validate()?;
    let mut warnings = Vec::new();

    let trigger = config
        .event
        .trigger_mjd
        .map(ModifiedJulianDate::new)
        .or(map.meta.trigger)
        .ok_or(PipelineError::MissingTrigger)?;
    log::info!("Trigger time {}", trigger);

    // Regions
    let mut regions = Vec::with_capacity(config.region.masses.len());
    for &mass in &config.region.masses {
        let region = CredibleRegion::from_map(&map.probability, mass)?;
        log::info!(
            "{:.0}% credible region: {} cells, {:.1} deg²",
            mass * 100.0,
            region.len(),
            region.area_deg2(&map.probability)
        );
        regions.push(summarize(&region, map));
    }
    let query_region = CredibleRegion::from_map(&map.probability, config.region.query_mass)?;

    // Cone
    let mask = config.region.hemisphere;
    let masked = restrict_to_hemisphere(&query_region.indices, &map.probability, |d| mask.accepts(d));
    if masked.len() < query_region.len() {
        log::info!(
            "Hemisphere mask {:?} kept {} of {} cells",
            mask,
            masked.len(),
            query_region.len()
        );
    }
    let cone = fit_cone(&masked, &map.probability)?;
    log::info!(
        "Search cone: centre {} radius {:.2}°",
        cone.center,
        cone.radius_deg()
    );

    // Query
    let mut window = TimeWindow::around(
        trigger,
        config.window.start_offset_days,
        config.window.end_offset_days,
    );
    let mut query = ConeQuery {
        center: cone.center,
        radius_arcsec: cone.radius_arcsec(),
        window,
        min_detections: config.query.min_detections,
    };
    let mut raw_candidates = broker.query_objects(&query).await?;
    let mut requeried = false;
    if raw_candidates.is_empty() {
        if let Some(extended) = config.window.extended_end_offset_days {
            window = TimeWindow::around(trigger, config.window.start_offset_days, extended);
            query.window = window;
            log::info!("No candidates; re-querying up to {}", window.end);
            raw_candidates = broker.query_objects(&query).await?;
            requeried = true;
        }
    }
    log::info!("Raw candidates: {}", raw_candidates.len());

    // Local filters
    let in_region = if config.region.require_in_region {
        filter_in_region(&raw_candidates, &map.probability, &query_region)
    } else {
        raw_candidates.clone()
    };
    let temporally_valid = filter_prior_history(&in_region, trigger);
    let non_stellar = filter_stellar(&temporally_valid, config.stellar.sgscore_threshold);
    log::info!(
        "Candidates: {} in region, {} temporally valid, {} non-stellar",
        in_region.len(),
        temporally_valid.len(),
        non_stellar.len()
    );

    // Enrichment
    let outcome = crossmatch(
        &non_stellar,
        catalog,
        &config.crossmatch.catalog,
        config.crossmatch.radius_arcsec,
        config.crossmatch.concurrency,
    )
    .await;
    warnings.extend(outcome.warnings);
    let crossmatched = annotate(&non_stellar, &outcome.matches, &config.cosmology);

    let distance_window = DistanceWindow::resolve(
        config.distance.low_mpc,
        config.distance.high_mpc,
        config.distance.n_sigma,
        map.distance.as_ref(),
    );
    let explicit_bounds = config.distance.low_mpc.is_some() && config.distance.high_mpc.is_some();
    let pixel_distance = if config.distance.per_pixel && !explicit_bounds {
        if map.distance.is_none() {
            let msg = "per-pixel distance requested but the map has no distance layer";
            log::warn!("{}", msg);
            warnings.push(msg.to_string());
        }
        map.distance.as_ref()
    } else {
        None
    };
    let per_pixel_distance = pixel_distance.is_some();
    let distance_filtered = match (pixel_distance, distance_window) {
        (Some(distance), fallback) => filter_by_pixel_distance(
            &crossmatched,
            &config.cosmology,
            &map.probability,
            distance,
            config.distance.n_sigma,
            fallback,
        ),
        (None, Some(w)) => filter_by_distance(&crossmatched, &config.cosmology, w.low_mpc, w.high_mpc),
        (None, None) => {
            let msg = "no distance window (no explicit bounds and no DISTMEAN/DISTSTD); distance filter skipped";
            log::warn!("{}", msg);
            warnings.push(msg.to_string());
            crossmatched.clone()
        }
    };
    log::info!(
        "Candidates: {} cross-matched, {} within distance window",
        crossmatched.len(),
        distance_filtered.len()
    );

    Ok(PipelineReport {
        event: config.event.name.clone().or_else(|| map.meta.object.clone()),
        skymap: map.meta.clone(),
        trigger,
        regions,
        query_region: summarize(&query_region, map),
        masked_cells: masked.len(),
        cone,
        window,
        requeried,
        raw_candidates,
        in_region,
        temporally_valid,
        non_stellar,
        crossmatched,
        cosmology: config.cosmology,
        distance_window,
        per_pixel_distance,
        distance_filtered,
        warnings,
    })
}

//! GW Follow-up command-line runner
//!
//! Loads the configuration, fetches the event sky map, runs the counterpart
//! search against the live broker and cross-match services, and prints the
//! report as JSON.
//!
//! # Usage
//!
//! ```bash
//! # Configuration from ./gw-followup.toml
//! cargo run --bin gw-followup
//!
//! # Ad-hoc run without a config file
//! GW_SKYMAP_URL=https://example.org/bayestar.fits.gz GW_TRIGGER_MJD=57982.5285 \
//!   cargo run --bin gw-followup
//! ```
//!
//! # Environment Variables
//!
//! - `GW_FOLLOWUP_CONFIG`: Path to the TOML configuration
//! - `GW_SKYMAP_URL`: Sky-map URL or path (overrides `event.skymap`)
//! - `GW_TRIGGER_MJD`: Merger epoch in MJD (overrides `event.trigger_mjd`)
//! - `ALERCE_API_URL`, `CATSHTM_API_URL`: Service endpoints
//! - `GW_FOLLOWUP_OUTPUT`: Write the JSON report to this file instead of stdout
//! - `GW_FOLLOWUP_STAMPS_DIR`: Save cutouts of the final candidates here
//! - `RUST_LOG`: Log level (default: info)

use std::env;
use std::path::PathBuf;

use anyhow::Context;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use gw_followup::api::{FollowupOutput, LightCurveSummary};
use gw_followup::config::PipelineConfig;
use gw_followup::models::CandidateRecord;
use gw_followup::services::{build_clients, fetch_light_curves, fetch_stamps, load_event_map, run_pipeline};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    FmtSubscriber::builder()
        .with_max_level(
            env::var("RUST_LOG")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(Level::INFO),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    info!("Starting GW follow-up");

    let config = PipelineConfig::load().context("Failed to load configuration")?;
    let map = load_event_map(&config).await.context("Failed to load sky map")?;
    let (broker, catalog) = build_clients(&config)?;

    let report = run_pipeline(&map, &broker, &catalog, &config).await?;
    for w in &report.warnings {
        warn!("{}", w);
    }

    let finals: Vec<CandidateRecord> = report
        .final_candidates()
        .iter()
        .map(|c| c.record.clone())
        .collect();
    let curves = fetch_light_curves(&broker, &finals).await;
    let light_curves: Vec<LightCurveSummary> = curves
        .curves
        .iter()
        .map(|(oid, curve)| LightCurveSummary::from_curve(oid.clone(), curve))
        .collect();

    if let Ok(dir) = env::var("GW_FOLLOWUP_STAMPS_DIR") {
        let dir = PathBuf::from(dir);
        std::fs::create_dir_all(&dir).with_context(|| format!("Cannot create {}", dir.display()))?;
        for (oid, curve) in &curves.curves {
            let Some(candid) = curve.first_detection().and_then(|d| d.candid.clone()) else {
                continue;
            };
            let stamps = fetch_stamps(&broker, oid, &candid).await;
            for (kind, bytes) in &stamps.images {
                let path = dir.join(format!("{}_{}_{}.png", oid, candid, kind.as_str()));
                std::fs::write(&path, bytes).with_context(|| format!("Cannot write {}", path.display()))?;
            }
        }
    }

    info!(
        "Done: {} raw candidates, {} final",
        report.raw_candidates.len(),
        report.final_candidates().len()
    );

    let output = FollowupOutput { report, light_curves };
    let json = serde_json::to_string_pretty(&output)?;
    match env::var("GW_FOLLOWUP_OUTPUT") {
        Ok(path) => {
            std::fs::write(&path, json).with_context(|| format!("Cannot write {}", path))?;
            info!("Report written to {}", path);
        }
        Err(_) => println!("{}", json),
    }

    Ok(())
}

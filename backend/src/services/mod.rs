//! Service layer: the reductions that turn a sky map into a candidate list.
//!
//! These functions sit between the remote collaborators in [`crate::broker`]
//! and the command-line runner. Everything except [`pipeline`] and the
//! per-object fetchers is synchronous and free of I/O.

pub mod cosmology;
pub mod crossmatch;
pub mod filters;
pub mod lightcurve;
pub mod pipeline;
pub mod region;

pub use cosmology::Cosmology;
pub use crossmatch::{crossmatch, CrossmatchOutcome};
pub use filters::{annotate, filter_by_distance, filter_prior_history, filter_stellar, DistanceWindow};
pub use lightcurve::{fetch_light_curves, fetch_stamps, LightCurveSet, StampSet};
pub use pipeline::{build_clients, load_event_map, run_pipeline, PipelineError, PipelineReport, RegionSummary};
pub use region::{
    compute_threshold, filter_in_region, fit_cone, restrict_to_hemisphere, select_region, ConeApproximation,
    CredibleRegion, HemisphereMask, RegionError,
};

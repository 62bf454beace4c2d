//! # GW Follow-up
//!
//! Electromagnetic counterpart search for gravitational-wave events.
//!
//! This crate cross-references a gravitational-wave sky localization map
//! against an astronomical alert stream. It extracts credible regions from the
//! map, approximates the search area with a cone, queries an alert broker for
//! objects first detected after the merger, and narrows them down by position,
//! detection history, stellarity, host-galaxy cross-match and luminosity
//! distance.
//!
//! ## Features
//!
//! - **Sky maps**: HEALPix flat and multi-order FITS maps, optionally gzip-compressed
//! - **Credible regions**: threshold and cell selection for any probability mass
//! - **Cone search**: circular approximation of a region for broker queries
//! - **Filters**: prior history, star/galaxy separation, luminosity-distance window
//! - **Enrichment**: catalog cross-match, light curves and image cutouts
//!
//! ## Architecture
//!
//! The crate is organized into several logical modules:
//!
//! - [`api`]: Data Transfer Objects (DTOs) for output
//! - [`config`]: TOML configuration and environment overrides
//! - [`models`]: Time, sky-position and candidate types
//! - [`skymap`]: HEALPix geometry, FITS decoding and map loading
//! - [`broker`]: Alert-broker and catalog traits, HTTP clients and in-memory doubles
//! - [`services`]: Region extraction, filters, cross-match and the pipeline
//!

// Allow large error types - BrokerError carries rich context for debugging
#![allow(clippy::result_large_err)]

pub mod api;
pub mod broker;
pub mod config;
pub mod models;
pub mod services;
pub mod skymap;

pub use config::PipelineConfig;
pub use services::pipeline::{run_pipeline, PipelineError, PipelineReport};
pub use skymap::SkyMap;

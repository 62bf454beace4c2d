//! Public API surface.
//!
//! This file consolidates the data types a caller exchanges with the
//! pipeline. All types derive Serialize/Deserialize for JSON output.

pub use crate::broker::ConeQuery;
pub use crate::models::AnnotatedCandidate;
pub use crate::models::CandidateRecord;
pub use crate::models::CatalogMatch;
pub use crate::models::Detection;
pub use crate::models::FilterId;
pub use crate::models::LightCurve;
pub use crate::models::ModifiedJulianDate;
pub use crate::models::NonDetection;
pub use crate::models::ObjectId;
pub use crate::models::SkyDirection;
pub use crate::models::StampKind;
pub use crate::models::TimeWindow;
pub use crate::services::cosmology::Cosmology;
pub use crate::services::crossmatch::CrossmatchOutcome;
pub use crate::services::filters::DistanceWindow;
pub use crate::services::pipeline::PipelineReport;
pub use crate::services::pipeline::RegionSummary;
pub use crate::services::region::ConeApproximation;
pub use crate::services::region::CredibleRegion;
pub use crate::services::region::HemisphereMask;
pub use crate::skymap::SkyMapMeta;

use serde::{Deserialize, Serialize};

/// Condensed per-object photometry for the output file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightCurveSummary {
    pub oid: ObjectId,
    pub detections: usize,
    pub non_detections: usize,
    pub first_mjd: Option<f64>,
    pub peak_mag: Option<f64>,
    pub peak_band: Option<String>,
    pub bands: Vec<String>,
}

impl LightCurveSummary {
    pub fn from_curve(oid: ObjectId, curve: &LightCurve) -> Self {
        let peak = curve.peak();
        Self {
            oid,
            detections: curve.detections.len(),
            non_detections: curve.non_detections.len(),
            first_mjd: curve.first_detection().map(|d| d.mjd),
            peak_mag: peak.map(|d| d.magpsf),
            peak_band: peak.map(|d| d.fid.band_name().to_string()),
            bands: curve.bands().iter().map(|b| b.band_name().to_string()).collect(),
        }
    }
}

/// Everything the command-line runner writes out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowupOutput {
    pub report: PipelineReport,
    pub light_curves: Vec<LightCurveSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_light_curve_summary() {
        let curve = LightCurve {
            detections: vec![
                Detection {
                    candid: None,
                    mjd: 101.0,
                    fid: FilterId(1),
                    magpsf: 18.2,
                    sigmapsf: 0.1,
                },
                Detection {
                    candid: None,
                    mjd: 100.0,
                    fid: FilterId(2),
                    magpsf: 18.9,
                    sigmapsf: 0.1,
                },
            ],
            non_detections: vec![],
        };
        let summary = LightCurveSummary::from_curve(ObjectId::new("ZTF1"), &curve);

        assert_eq!(summary.detections, 2);
        assert_eq!(summary.first_mjd, Some(100.0));
        assert_eq!(summary.peak_mag, Some(18.2));
        assert_eq!(summary.peak_band.as_deref(), Some("g"));
        assert_eq!(summary.bands, vec!["g", "r"]);
    }

    #[test]
    fn test_object_id_serializes_transparently() {
        let json = serde_json::to_string(&ObjectId::new("ZTF19aarykkb")).unwrap();
        assert_eq!(json, "\"ZTF19aarykkb\"");
    }
}

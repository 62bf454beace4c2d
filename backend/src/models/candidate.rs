//! Alert-stream candidates and their enrichment annotations.

use serde::{Deserialize, Deserializer, Serialize};

use super::sky::SkyDirection;

/// Alert-stream object identifier (e.g. `ZTF19aarykkb`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(pub String);

impl ObjectId {
    pub fn new(value: impl Into<String>) -> Self {
        ObjectId(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ObjectId {
    fn from(s: &str) -> Self {
        ObjectId(s.to_string())
    }
}

/// One alert-stream object as returned by the broker's object search.
///
/// Field names follow the broker's JSON so rows deserialize directly.
/// Everything the broker may omit is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub oid: ObjectId,
    pub meanra: f64,
    pub meandec: f64,
    pub ndet: u32,
    pub firstmjd: f64,
    pub lastmjd: f64,
    /// Start of the detection history, which may predate the public alert archive.
    #[serde(default)]
    pub mjdstarthist: Option<f64>,
    #[serde(default)]
    pub mjdendhist: Option<f64>,
    /// Star/galaxy separator verdict.
    #[serde(default)]
    pub stellar: Option<bool>,
    /// Point-source score in `[0, 1]`; 1 is star-like.
    #[serde(default, alias = "sgscore1")]
    pub sgscore: Option<f64>,
    #[serde(default, alias = "class_name")]
    pub class: Option<String>,
    #[serde(default)]
    pub probability: Option<f64>,
}

impl CandidateRecord {
    pub fn position(&self) -> SkyDirection {
        SkyDirection::new(self.meanra, self.meandec)
    }

    /// Earliest known detection epoch, falling back to `firstmjd` when the
    /// broker does not report the history start.
    pub fn history_start(&self) -> f64 {
        self.mjdstarthist.unwrap_or(self.firstmjd)
    }

    /// Whether the star/galaxy separator marks this object as a point source.
    pub fn is_stellar(&self, sgscore_threshold: f64) -> bool {
        self.stellar == Some(true) || self.sgscore.is_some_and(|s| s > sgscore_threshold)
    }
}

/// Best external-catalog association for a candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogMatch {
    pub catalog: String,
    pub name: String,
    pub redshift: Option<f64>,
    pub separation_arcsec: Option<f64>,
}

/// Candidate carrying its cross-match and derived distance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedCandidate {
    pub record: CandidateRecord,
    pub crossmatch: CatalogMatch,
    pub luminosity_distance_mpc: Option<f64>,
}

/// ZTF filter band identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterId(pub u8);

impl FilterId {
    pub fn band_name(&self) -> &'static str {
        match self.0 {
            1 => "g",
            2 => "r",
            3 => "i",
            _ => "?",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    #[serde(default, deserialize_with = "deserialize_candid")]
    pub candid: Option<String>,
    pub mjd: f64,
    pub fid: FilterId,
    pub magpsf: f64,
    pub sigmapsf: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NonDetection {
    pub mjd: f64,
    pub fid: FilterId,
    pub diffmaglim: f64,
}

/// Time-ordered photometry of one object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LightCurve {
    #[serde(default)]
    pub detections: Vec<Detection>,
    #[serde(default)]
    pub non_detections: Vec<NonDetection>,
}

impl LightCurve {
    /// Sort both series by epoch.
    pub fn sorted(mut self) -> Self {
        self.detections.sort_by(|a, b| a.mjd.total_cmp(&b.mjd));
        self.non_detections.sort_by(|a, b| a.mjd.total_cmp(&b.mjd));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    pub fn first_detection(&self) -> Option<&Detection> {
        self.detections.iter().min_by(|a, b| a.mjd.total_cmp(&b.mjd))
    }

    /// Brightest (lowest magnitude) detection.
    pub fn peak(&self) -> Option<&Detection> {
        self.detections.iter().min_by(|a, b| a.magpsf.total_cmp(&b.magpsf))
    }

    pub fn bands(&self) -> Vec<FilterId> {
        let mut bands: Vec<FilterId> = self.detections.iter().map(|d| d.fid).collect();
        bands.sort();
        bands.dedup();
        bands
    }
}

/// Image cutout flavour attached to each detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StampKind {
    Science,
    Template,
    Difference,
}

impl StampKind {
    pub const ALL: [StampKind; 3] = [StampKind::Science, StampKind::Template, StampKind::Difference];

    pub fn as_str(&self) -> &'static str {
        match self {
            StampKind::Science => "science",
            StampKind::Template => "template",
            StampKind::Difference => "difference",
        }
    }
}

// Brokers emit `candid` either as a JSON number or a string.
fn deserialize_candid<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

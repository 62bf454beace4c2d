//! Credible-region extraction and cone approximation.
//!
//! A credible region at mass `m` is the smallest set of cells whose summed
//! probability reaches `m`. It is found by sorting the defined, positive
//! cell values in descending order and walking the running sum; the value
//! at which the sum first reaches `m` is the threshold, and the region is
//! every cell whose value is at least that threshold (ties included).

use serde::{Deserialize, Serialize};

use crate::models::{CandidateRecord, SkyDirection};
use crate::skymap::{DirectionLookup, ProbabilityMap};

/// Separations below this are treated as zero when checking containment.
pub const CONE_EPSILON_DEG: f64 = 1e-9;

/// Result type for region operations
pub type RegionResult<T> = Result<T, RegionError>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RegionError {
    #[error("Credible mass must lie in (0, 1], got {0}")]
    InvalidMass(f64),

    #[error("Probability map has no positive cells")]
    EmptyMap,

    #[error("Cannot fit a cone to an empty region")]
    EmptyRegion,

    #[error("Region is degenerate: unit vectors cancel out (|mean| = {0:e})")]
    DegenerateRegion(f64),
}

/// Probability value at which the descending cumulative sum first reaches
/// `target_mass`.
///
/// When the map never accumulates `target_mass` (a map normalised to less
/// than one, or with undefined cells) the smallest positive value is
/// returned, i.e. the whole positive support.
pub fn compute_threshold(map: &ProbabilityMap, target_mass: f64) -> RegionResult<f64> {
    if !(target_mass > 0.0 && target_mass <= 1.0) {
        return Err(RegionError::InvalidMass(target_mass));
    }

    let mut sorted: Vec<f64> = map
        .values()
        .iter()
        .copied()
        .filter(|v| v.is_finite() && *v > 0.0)
        .collect();
    if sorted.is_empty() {
        return Err(RegionError::EmptyMap);
    }
    sorted.sort_by(|a, b| b.total_cmp(a));

    let mut cumulative = 0.0;
    for value in &sorted {
        cumulative += value;
        if cumulative >= target_mass {
            return Ok(*value);
        }
    }

    let floor = sorted[sorted.len() - 1];
    log::warn!(
        "Map sums to {:.6} < requested mass {}; using the full positive support",
        cumulative,
        target_mass
    );
    Ok(floor)
}

/// Indices (ascending) of every cell whose value is at least `threshold`.
pub fn select_region(map: &ProbabilityMap, threshold: f64) -> Vec<usize> {
    map.values()
        .iter()
        .enumerate()
        .filter(|(_, v)| !v.is_nan() && **v >= threshold)
        .map(|(i, _)| i)
        .collect()
}

/// Immutable credible region at a fixed mass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredibleRegion {
    pub mass: f64,
    pub threshold: f64,
    pub indices: Vec<usize>,
    /// Probability actually enclosed (≥ `mass` unless the map is deficient).
    pub probability: f64,
}

impl CredibleRegion {
    pub fn from_map(map: &ProbabilityMap, mass: f64) -> RegionResult<Self> {
        let threshold = compute_threshold(map, mass)?;
        let indices = select_region(map, threshold);
        let probability = indices.iter().filter_map(|&i| map.get(i)).sum();

        log::debug!(
            "Credible region {:.0}%: {} cells, threshold {:.3e}, enclosed {:.4}",
            mass * 100.0,
            indices.len(),
            threshold,
            probability
        );

        Ok(Self {
            mass,
            threshold,
            indices,
            probability,
        })
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn contains(&self, index: usize) -> bool {
        self.indices.binary_search(&index).is_ok()
    }

    /// Solid angle covered, in square degrees.
    pub fn area_deg2(&self, map: &ProbabilityMap) -> f64 {
        self.indices.len() as f64 * map.pixel_area_deg2()
    }
}

/// Sky-footprint restriction applied to a region before fitting a cone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HemisphereMask {
    North,
    South,
    #[default]
    Full,
    /// Declination band `(min_deg, max_deg]`.
    DeclinationBand { min_deg: f64, max_deg: f64 },
}

impl HemisphereMask {
    pub fn accepts(&self, direction: &SkyDirection) -> bool {
        let dec = direction.dec_deg();
        match self {
            HemisphereMask::North => dec > 0.0,
            HemisphereMask::South => dec < 0.0,
            HemisphereMask::Full => true,
            HemisphereMask::DeclinationBand { min_deg, max_deg } => dec > *min_deg && dec <= *max_deg,
        }
    }
}

/// Keep only the indices whose direction satisfies `predicate`.
pub fn restrict_to_hemisphere<L, P>(indices: &[usize], lookup: &L, predicate: P) -> Vec<usize>
where
    L: DirectionLookup + ?Sized,
    P: Fn(&SkyDirection) -> bool,
{
    indices
        .iter()
        .copied()
        .filter(|&i| predicate(&lookup.direction(i)))
        .collect()
}

/// Circular approximation of a region.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConeApproximation {
    pub center: SkyDirection,
    pub radius: qtty::Degrees,
}

impl ConeApproximation {
    pub fn radius_deg(&self) -> f64 {
        self.radius.value()
    }

    pub fn radius_arcsec(&self) -> f64 {
        crate::models::deg_to_arcsec(self.radius.value())
    }

    pub fn contains(&self, direction: &SkyDirection) -> bool {
        self.center.separation_deg(direction) <= self.radius.value() + CONE_EPSILON_DEG
    }
}

/// Fit a cone to the cell centres of `indices`.
///
/// The centre is the renormalised mean of the unit vectors and the radius the
/// largest separation from it. For elongated or multi-lobed regions the mean
/// drifts away from the probability mass and the radius grows accordingly;
/// the cone always covers every cell centre but may be much larger than the
/// region itself.
pub fn fit_cone<L>(indices: &[usize], lookup: &L) -> RegionResult<ConeApproximation>
where
    L: DirectionLookup + ?Sized,
{
    if indices.is_empty() {
        return Err(RegionError::EmptyRegion);
    }

    let directions: Vec<SkyDirection> = indices.iter().map(|&i| lookup.direction(i)).collect();

    let mut sum = [0.0f64; 3];
    for d in &directions {
        let v = d.to_unit_vector();
        sum[0] += v[0];
        sum[1] += v[1];
        sum[2] += v[2];
    }
    let n = directions.len() as f64;
    let mean = [sum[0] / n, sum[1] / n, sum[2] / n];
    let norm = (mean[0] * mean[0] + mean[1] * mean[1] + mean[2] * mean[2]).sqrt();

    let center = match SkyDirection::from_vector(mean) {
        Some(center) if norm > 1e-10 => center,
        _ => return Err(RegionError::DegenerateRegion(norm)),
    };

    let radius = directions
        .iter()
        .map(|d| center.separation_deg(d))
        .fold(0.0f64, f64::max);

    Ok(ConeApproximation {
        center,
        radius: qtty::Degrees::new(radius),
    })
}

/// Keep records whose mean position falls in a cell of `region`.
pub fn filter_in_region(
    records: &[CandidateRecord],
    map: &ProbabilityMap,
    region: &CredibleRegion,
) -> Vec<CandidateRecord> {
    records
        .iter()
        .filter(|r| region.contains(map.pixel_of(&r.position())))
        .cloned()
        .collect()
}

#[cfg(test)]
#[path = "region_tests.rs"]
mod region_tests;

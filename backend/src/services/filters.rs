//! Row-level candidate predicates.
//!
//! Every filter here is a pure reduction: it never reorders survivors and
//! applying it twice yields the same set as applying it once.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::cosmology::Cosmology;
use crate::models::{AnnotatedCandidate, CandidateRecord, CatalogMatch, ModifiedJulianDate, ObjectId};
use crate::skymap::{DistanceMap, ProbabilityMap};

/// Drop records whose detection history starts before `trigger`.
///
/// An object detected before the merger cannot be its counterpart.
pub fn filter_prior_history(records: &[CandidateRecord], trigger: ModifiedJulianDate) -> Vec<CandidateRecord> {
    let trigger = trigger.value();
    let kept: Vec<CandidateRecord> = records
        .iter()
        .filter(|r| r.history_start() >= trigger)
        .cloned()
        .collect();
    log::debug!(
        "Prior-history filter: {} -> {} candidates",
        records.len(),
        kept.len()
    );
    kept
}

/// Drop records the star/galaxy separator flags as point sources.
pub fn filter_stellar(records: &[CandidateRecord], sgscore_threshold: f64) -> Vec<CandidateRecord> {
    let kept: Vec<CandidateRecord> = records
        .iter()
        .filter(|r| !r.is_stellar(sgscore_threshold))
        .cloned()
        .collect();
    log::debug!("Stellar filter: {} -> {} candidates", records.len(), kept.len());
    kept
}

/// Pair each record with its cross-match; records without one are dropped.
pub fn annotate(
    records: &[CandidateRecord],
    matches: &BTreeMap<ObjectId, CatalogMatch>,
    cosmology: &Cosmology,
) -> Vec<AnnotatedCandidate> {
    records
        .iter()
        .filter_map(|r| {
            let crossmatch = matches.get(&r.oid)?.clone();
            let luminosity_distance_mpc = crossmatch
                .redshift
                .map(|z| cosmology.luminosity_distance_mpc(z));
            Some(AnnotatedCandidate {
                record: r.clone(),
                crossmatch,
                luminosity_distance_mpc,
            })
        })
        .collect()
}

/// Keep candidates whose host luminosity distance lies in `[low_mpc, high_mpc]`.
///
/// The distance is recomputed from the matched redshift under `cosmology`;
/// candidates without a redshift are dropped.
pub fn filter_by_distance(
    candidates: &[AnnotatedCandidate],
    cosmology: &Cosmology,
    low_mpc: f64,
    high_mpc: f64,
) -> Vec<AnnotatedCandidate> {
    let kept: Vec<AnnotatedCandidate> = candidates
        .iter()
        .filter_map(|c| {
            let z = c.crossmatch.redshift?;
            let distance = cosmology.luminosity_distance_mpc(z);
            (low_mpc <= distance && distance <= high_mpc).then(|| AnnotatedCandidate {
                luminosity_distance_mpc: Some(distance),
                ..c.clone()
            })
        })
        .collect();
    log::debug!(
        "Distance filter [{:.1}, {:.1}] Mpc: {} -> {} candidates",
        low_mpc,
        high_mpc,
        candidates.len(),
        kept.len()
    );
    kept
}

/// Keep candidates whose host distance lies in the window of the map pixel
/// containing them (see [`DistanceWindow::at_pixel`]).
///
/// Pixels without a usable ansatz fall back to `fallback`; without one those
/// candidates are dropped.
pub fn filter_by_pixel_distance(
    candidates: &[AnnotatedCandidate],
    cosmology: &Cosmology,
    probability: &ProbabilityMap,
    distance: &DistanceMap,
    n_sigma: f64,
    fallback: Option<DistanceWindow>,
) -> Vec<AnnotatedCandidate> {
    let kept: Vec<AnnotatedCandidate> = candidates
        .iter()
        .filter_map(|c| {
            let z = c.crossmatch.redshift?;
            let pixel = probability.pixel_of(&c.record.position());
            let window = DistanceWindow::at_pixel(distance, pixel, n_sigma).or(fallback)?;
            let d = cosmology.luminosity_distance_mpc(z);
            window.contains(d).then(|| AnnotatedCandidate {
                luminosity_distance_mpc: Some(d),
                ..c.clone()
            })
        })
        .collect();
    log::debug!(
        "Per-pixel distance filter ({}σ): {} -> {} candidates",
        n_sigma,
        candidates.len(),
        kept.len()
    );
    kept
}

/// Luminosity-distance bounds for the final filter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistanceWindow {
    pub low_mpc: f64,
    pub high_mpc: f64,
}

impl DistanceWindow {
    pub fn new(low_mpc: f64, high_mpc: f64) -> Self {
        Self { low_mpc, high_mpc }
    }

    /// Explicit bounds win. Otherwise the window is `mean ± n_sigma·std` from
    /// the map's distance summary, with the lower bound clamped at zero.
    pub fn resolve(
        low_mpc: Option<f64>,
        high_mpc: Option<f64>,
        n_sigma: f64,
        distance: Option<&DistanceMap>,
    ) -> Option<Self> {
        if let (Some(low), Some(high)) = (low_mpc, high_mpc) {
            return Some(Self::new(low, high));
        }
        let distance = distance?;
        let (mean, std) = (distance.mean?, distance.std?);
        let low = low_mpc.unwrap_or((mean - n_sigma * std).max(0.0));
        let high = high_mpc.unwrap_or(mean + n_sigma * std);
        Some(Self::new(low, high))
    }

    /// `distmu ± n_sigma·distsigma` at one map pixel, lower bound clamped at
    /// zero. `None` where the ansatz is not finite or `distsigma` is not positive.
    pub fn at_pixel(distance: &DistanceMap, pixel: usize, n_sigma: f64) -> Option<Self> {
        let (mu, sigma) = distance.at(pixel)?;
        if sigma <= 0.0 {
            return None;
        }
        Some(Self::new((mu - n_sigma * sigma).max(0.0), mu + n_sigma * sigma))
    }

    pub fn contains(&self, distance_mpc: f64) -> bool {
        self.low_mpc <= distance_mpc && distance_mpc <= self.high_mpc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skymap::Ordering;

    fn record(oid: &str, firstmjd: f64, mjdstarthist: Option<f64>) -> CandidateRecord {
        CandidateRecord {
            oid: oid.into(),
            meanra: 197.4,
            meandec: -23.4,
            ndet: 2,
            firstmjd,
            lastmjd: firstmjd + 1.0,
            mjdstarthist,
            mjdendhist: None,
            stellar: None,
            sgscore: None,
            class: None,
            probability: None,
        }
    }

    fn annotated(oid: &str, z: Option<f64>) -> AnnotatedCandidate {
        AnnotatedCandidate {
            record: record(oid, 58600.0, None),
            crossmatch: CatalogMatch {
                catalog: "GWGC".to_string(),
                name: format!("host-{}", oid),
                redshift: z,
                separation_arcsec: Some(2.0),
            },
            luminosity_distance_mpc: None,
        }
    }

    #[test]
    fn test_prior_history_drops_pre_trigger() {
        let trigger = ModifiedJulianDate::new(58598.0);
        let records = vec![
            record("a", 58598.5, Some(58590.0)),
            record("b", 58598.5, Some(58598.5)),
            record("c", 58599.0, None),
            record("d", 58597.0, None),
            record("e", 58598.0, Some(58598.0)),
        ];

        let kept = filter_prior_history(&records, trigger);
        let ids: Vec<&str> = kept.iter().map(|r| r.oid.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "e"]);
        assert_eq!(filter_prior_history(&kept, trigger), kept);
    }

    #[test]
    fn test_stellar_filter() {
        let mut star = record("star", 58600.0, None);
        star.sgscore = Some(0.99);
        let mut flagged = record("flagged", 58600.0, None);
        flagged.stellar = Some(true);
        let mut galaxy = record("galaxy", 58600.0, None);
        galaxy.sgscore = Some(0.1);
        galaxy.stellar = Some(false);
        let unknown = record("unknown", 58600.0, None);

        let kept = filter_stellar(&[star, flagged, galaxy, unknown], 0.5);
        let ids: Vec<&str> = kept.iter().map(|r| r.oid.as_str()).collect();
        assert_eq!(ids, vec!["galaxy", "unknown"]);
        assert_eq!(filter_stellar(&kept, 0.5), kept);
    }

    #[test]
    fn test_annotate_skips_unmatched() {
        let cosmo = Cosmology::default();
        let records = vec![record("a", 58600.0, None), record("b", 58600.0, None)];
        let mut matches = BTreeMap::new();
        matches.insert(
            ObjectId::new("b"),
            CatalogMatch {
                catalog: "GWGC".to_string(),
                name: "NGC 4993".to_string(),
                redshift: Some(0.0098),
                separation_arcsec: Some(10.0),
            },
        );

        let annotated = annotate(&records, &matches, &cosmo);
        assert_eq!(annotated.len(), 1);
        assert_eq!(annotated[0].record.oid.as_str(), "b");
        let d = annotated[0].luminosity_distance_mpc.unwrap();
        assert!((d - 42.3).abs() < 1.0, "got {}", d);
    }

    #[test]
    fn test_distance_bounds_are_inclusive() {
        let cosmo = Cosmology::default();
        let z = 0.02;
        let d = cosmo.luminosity_distance_mpc(z);
        let candidates = vec![annotated("edge", Some(z))];

        assert_eq!(filter_by_distance(&candidates, &cosmo, d, d + 10.0).len(), 1);
        assert_eq!(filter_by_distance(&candidates, &cosmo, d - 10.0, d).len(), 1);
        let above = d + d * f64::EPSILON * 4.0;
        assert!(filter_by_distance(&candidates, &cosmo, above, d + 10.0).is_empty());
    }

    #[test]
    fn test_redshift_at_lower_bound_is_kept() {
        let cosmo = Cosmology::default();
        for low in [40.0, 42.0, 100.0, 123.4, 250.0, 777.7] {
            let z = cosmo.redshift_at_distance(low).unwrap();
            let just_below = f64::from_bits(z.to_bits() - 1);
            let candidates = vec![annotated("at", Some(z)), annotated("under", Some(just_below))];

            let kept = filter_by_distance(&candidates, &cosmo, low, low + 100.0);
            assert_eq!(kept.len(), 1, "low={}", low);
            assert_eq!(kept[0].record.oid.as_str(), "at");
        }
    }

    #[test]
    fn test_distance_filter_drops_missing_redshift() {
        let cosmo = Cosmology::default();
        let candidates = vec![annotated("a", None), annotated("b", Some(0.01))];
        let kept = filter_by_distance(&candidates, &cosmo, 0.0, 1000.0);

        assert_eq!(kept.len(), 1);
        assert!(kept[0].luminosity_distance_mpc.is_some());
        assert_eq!(filter_by_distance(&kept, &cosmo, 0.0, 1000.0), kept);
    }

    #[test]
    fn test_window_resolution() {
        let mut distance = DistanceMap::new(vec![40.0; 12], vec![8.0; 12], vec![1e-3; 12]).unwrap();
        distance.mean = Some(40.0);
        distance.std = Some(8.0);

        let explicit = DistanceWindow::resolve(Some(10.0), Some(60.0), 2.0, Some(&distance));
        assert_eq!(explicit, Some(DistanceWindow::new(10.0, 60.0)));

        let derived = DistanceWindow::resolve(None, None, 2.0, Some(&distance)).unwrap();
        assert_eq!(derived, DistanceWindow::new(24.0, 56.0));

        let clamped = DistanceWindow::resolve(None, None, 10.0, Some(&distance)).unwrap();
        assert_eq!(clamped.low_mpc, 0.0);
        assert!(clamped.contains(0.0));

        assert!(DistanceWindow::resolve(None, None, 2.0, None).is_none());
    }

    fn uniform_sky() -> ProbabilityMap {
        ProbabilityMap::new(vec![1.0 / 12.0; 12], Ordering::Ring).unwrap()
    }

    fn kept_oids(candidates: &[AnnotatedCandidate]) -> Vec<&str> {
        candidates.iter().map(|c| c.record.oid.as_str()).collect()
    }

    #[test]
    fn test_pixel_window() {
        let distance = DistanceMap::new(
            vec![40.0, f64::INFINITY, 5.0, 40.0],
            vec![5.0, 1.0, 4.0, 0.0],
            vec![1e-3; 4],
        )
        .unwrap();

        assert_eq!(DistanceWindow::at_pixel(&distance, 0, 2.0), Some(DistanceWindow::new(30.0, 50.0)));
        assert_eq!(DistanceWindow::at_pixel(&distance, 1, 2.0), None);
        assert_eq!(DistanceWindow::at_pixel(&distance, 2, 2.0), Some(DistanceWindow::new(0.0, 13.0)));
        assert_eq!(DistanceWindow::at_pixel(&distance, 3, 2.0), None);
        assert_eq!(DistanceWindow::at_pixel(&distance, 9, 2.0), None);
    }

    #[test]
    fn test_pixel_distance_filter() {
        let cosmo = Cosmology::default();
        let sky = uniform_sky();
        let pixel = sky.pixel_of(&annotated("x", None).record.position());
        let mut mu = vec![200.0; 12];
        let mut sigma = vec![10.0; 12];
        mu[pixel] = 40.0;
        sigma[pixel] = 5.0;
        let distance = DistanceMap::new(mu, sigma, vec![1e-3; 12]).unwrap();

        let near = cosmo.redshift_at_distance(42.0).unwrap();
        let far = cosmo.redshift_at_distance(200.0).unwrap();
        let candidates = vec![
            annotated("near", Some(near)),
            annotated("far", Some(far)),
            annotated("unknown", None),
        ];

        let kept = filter_by_pixel_distance(&candidates, &cosmo, &sky, &distance, 2.0, None);
        assert_eq!(kept_oids(&kept), vec!["near"]);
        let d = kept[0].luminosity_distance_mpc.unwrap();
        assert!((d - 42.0).abs() < 1e-6, "got {}", d);
    }

    #[test]
    fn test_pixel_without_ansatz_uses_fallback() {
        let cosmo = Cosmology::default();
        let sky = uniform_sky();
        let distance = DistanceMap::new(vec![f64::INFINITY; 12], vec![1.0; 12], vec![0.0; 12]).unwrap();
        let far = cosmo.redshift_at_distance(200.0).unwrap();
        let candidates = vec![annotated("far", Some(far))];

        assert!(filter_by_pixel_distance(&candidates, &cosmo, &sky, &distance, 2.0, None).is_empty());
        let fallback = Some(DistanceWindow::new(190.0, 210.0));
        let kept = filter_by_pixel_distance(&candidates, &cosmo, &sky, &distance, 2.0, fallback);
        assert_eq!(kept_oids(&kept), vec!["far"]);
    }
}

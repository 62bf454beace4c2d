//! In-memory sky-map representation.

use serde::{Deserialize, Serialize};

use super::fits::BinTable;
use super::healpix::{self, Ordering};
use super::{SkyMapError, SkyMapResult};
use crate::models::{ModifiedJulianDate, SkyDirection};

/// HEALPix "undefined pixel" sentinel.
pub const UNSEEN: f64 = -1.6375e30;

/// Decodes a pixel index into its sky direction.
pub trait DirectionLookup {
    fn direction(&self, index: usize) -> SkyDirection;
}

impl<F> DirectionLookup for F
where
    F: Fn(usize) -> SkyDirection,
{
    fn direction(&self, index: usize) -> SkyDirection {
        self(index)
    }
}

/// Per-pixel probability, one value per equal-area HEALPix cell.
///
/// Undefined cells are stored as NaN and never contribute to sums.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilityMap {
    values: Vec<f64>,
    nside: u32,
    ordering: Ordering,
}

impl ProbabilityMap {
    /// Build a map, validating the resolution and mapping the UNSEEN sentinel
    /// (and any non-finite value) to "undefined".
    pub fn new(values: Vec<f64>, ordering: Ordering) -> SkyMapResult<Self> {
        let nside = healpix::nside_from_npix(values.len())?;
        healpix::validate_nside(nside, ordering)?;

        let mut values = values;
        for (index, v) in values.iter_mut().enumerate() {
            if !v.is_finite() || *v == UNSEEN {
                *v = f64::NAN;
            } else if *v < 0.0 {
                return Err(SkyMapError::InvalidValue { index, value: *v });
            }
        }

        Ok(Self {
            values,
            nside,
            ordering,
        })
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn nside(&self) -> u32 {
        self.nside
    }

    pub fn ordering(&self) -> Ordering {
        self.ordering
    }

    /// Probability of a cell; `None` when undefined or out of range.
    pub fn get(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied().filter(|v| !v.is_nan())
    }

    /// Sum over defined cells.
    pub fn total(&self) -> f64 {
        self.values.iter().filter(|v| !v.is_nan()).sum()
    }

    /// Index of the most probable cell.
    pub fn argmax(&self) -> Option<usize> {
        self.values
            .iter()
            .enumerate()
            .filter(|(_, v)| !v.is_nan())
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
    }

    pub fn pixel_of(&self, direction: &SkyDirection) -> usize {
        healpix::ang2pix(self.nside, self.ordering, direction)
    }

    pub fn pixel_area_deg2(&self) -> f64 {
        healpix::pixel_area_sr(self.nside) * (180.0 / std::f64::consts::PI).powi(2)
    }
}

impl DirectionLookup for ProbabilityMap {
    fn direction(&self, index: usize) -> SkyDirection {
        healpix::pix2ang(self.nside, self.ordering, index)
    }
}

/// Per-pixel distance ansatz parallel to a [`ProbabilityMap`].
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceMap {
    pub distmu: Vec<f64>,
    pub distsigma: Vec<f64>,
    pub distnorm: Vec<f64>,
    /// Header summary `DISTMEAN` (Mpc), when present.
    pub mean: Option<f64>,
    /// Header summary `DISTSTD` (Mpc), when present.
    pub std: Option<f64>,
}

impl DistanceMap {
    pub fn new(distmu: Vec<f64>, distsigma: Vec<f64>, distnorm: Vec<f64>) -> SkyMapResult<Self> {
        if distmu.len() != distsigma.len() || distmu.len() != distnorm.len() {
            return Err(SkyMapError::Format(format!(
                "distance columns differ in length ({}, {}, {})",
                distmu.len(),
                distsigma.len(),
                distnorm.len()
            )));
        }
        Ok(Self {
            distmu,
            distsigma,
            distnorm,
            mean: None,
            std: None,
        })
    }

    /// `(mu, sigma)` of the distance ansatz at a pixel, if finite.
    pub fn at(&self, index: usize) -> Option<(f64, f64)> {
        let mu = *self.distmu.get(index)?;
        let sigma = *self.distsigma.get(index)?;
        (mu.is_finite() && sigma.is_finite()).then_some((mu, sigma))
    }
}

/// Descriptive header metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkyMapMeta {
    pub object: Option<String>,
    pub trigger: Option<ModifiedJulianDate>,
    /// SHA-256 of the bytes the map was decoded from.
    pub checksum: Option<String>,
    pub source: Option<String>,
}

/// Probability map plus optional distance layer.
#[derive(Debug, Clone)]
pub struct SkyMap {
    pub probability: ProbabilityMap,
    pub distance: Option<DistanceMap>,
    pub meta: SkyMapMeta,
}

impl SkyMap {
    pub fn new(probability: ProbabilityMap) -> Self {
        Self {
            probability,
            distance: None,
            meta: SkyMapMeta::default(),
        }
    }

    pub fn with_distance(mut self, distance: DistanceMap) -> SkyMapResult<Self> {
        if distance.distmu.len() != self.probability.len() {
            return Err(SkyMapError::Format(format!(
                "distance layer has {} pixels, probability layer {}",
                distance.distmu.len(),
                self.probability.len()
            )));
        }
        self.distance = Some(distance);
        Ok(self)
    }

    /// Decode a map from the first BINTABLE of a FITS file.
    ///
    /// Multi-order tables (`UNIQ` column) are flattened to NESTED ordering at
    /// the finest order present, capped at `max_order`.
    pub fn from_bintable(table: &mut BinTable, max_order: u32) -> SkyMapResult<Self> {
        let mut map = if table.has_column("UNIQ") {
            decode_multiorder(table, max_order)?
        } else {
            decode_flat(table)?
        };

        if map.distance.is_some() {
            let mean = table.key_f64("DISTMEAN");
            let std = table.key_f64("DISTSTD");
            if let Some(distance) = map.distance.as_mut() {
                distance.mean = mean;
                distance.std = std;
            }
        }
        map.meta.object = table
            .key_str("OBJECT")
            .or_else(|| table.primary_key_str("OBJECT"));
        map.meta.trigger = table
            .key_f64("MJD-OBS")
            .map(ModifiedJulianDate::new)
            .or_else(|| table.key_str("DATE-OBS").and_then(|s| ModifiedJulianDate::parse_iso(&s)));
        Ok(map)
    }
}

fn read_ordering(table: &mut BinTable) -> SkyMapResult<Ordering> {
    match table.key_str("ORDERING") {
        Some(value) => value.parse(),
        None => {
            log::warn!("ORDERING card missing, assuming RING");
            Ok(Ordering::Ring)
        }
    }
}

fn decode_flat(table: &mut BinTable) -> SkyMapResult<SkyMap> {
    let ordering = read_ordering(table)?;
    let prob = table.column_f64("PROB")?;
    let npix = prob.len();

    if let Some(nside) = table.key_i64("NSIDE") {
        let expected = healpix::npix(nside as u32);
        if expected != npix {
            return Err(SkyMapError::Format(format!(
                "NSIDE={} implies {} pixels but PROB has {}",
                nside, expected, npix
            )));
        }
    }

    let map = SkyMap::new(ProbabilityMap::new(prob, ordering)?);
    if table.has_column("DISTMU") {
        let distance = DistanceMap::new(
            table.column_f64("DISTMU")?,
            table.column_f64("DISTSIGMA")?,
            table.column_f64("DISTNORM")?,
        )?;
        return map.with_distance(distance);
    }
    Ok(map)
}

/// Split a NUNIQ index into `(order, nested pixel)`.
pub fn uniq_to_order_pixel(uniq: i64) -> SkyMapResult<(u32, u64)> {
    if uniq < 4 {
        return Err(SkyMapError::Format(format!("invalid UNIQ index {}", uniq)));
    }
    let uniq = uniq as u64;
    let order = (63 - uniq.leading_zeros()) / 2 - 1;
    let ipix = uniq - (4u64 << (2 * order));
    Ok((order, ipix))
}

fn decode_multiorder(table: &mut BinTable, max_order: u32) -> SkyMapResult<SkyMap> {
    let uniq = table.column_i64("UNIQ")?;
    let density = table.column_f64("PROBDENSITY")?;
    let has_distance = table.has_column("DISTMU");
    let (mu, sigma, norm) = if has_distance {
        (
            table.column_f64("DISTMU")?,
            table.column_f64("DISTSIGMA")?,
            table.column_f64("DISTNORM")?,
        )
    } else {
        (Vec::new(), Vec::new(), Vec::new())
    };

    let mut finest = 0;
    let mut cells = Vec::with_capacity(uniq.len());
    for &u in &uniq {
        let (order, ipix) = uniq_to_order_pixel(u)?;
        finest = finest.max(order);
        cells.push((order, ipix));
    }
    let target = finest.min(max_order);
    let nside = 1u32 << target;
    let npix = healpix::npix(nside);
    let area = healpix::pixel_area_sr(nside);

    let mut prob = vec![f64::NAN; npix];
    let mut dist = [vec![f64::NAN; npix], vec![f64::NAN; npix], vec![f64::NAN; npix]];
    // Cells finer than the target order are merged into their parent with
    // probability-weighted distance parameters.
    let mut weights = vec![0.0; npix];

    for (row, &(order, ipix)) in cells.iter().enumerate() {
        let d = density[row];
        if order <= target {
            let shift = 2 * (target - order);
            let start = (ipix << shift) as usize;
            let end = start + (1usize << shift);
            if end > npix {
                return Err(SkyMapError::Format(format!("UNIQ {} outside the sky", uniq[row])));
            }
            for p in start..end {
                prob[p] = d * area;
                if has_distance {
                    dist[0][p] = mu[row];
                    dist[1][p] = sigma[row];
                    dist[2][p] = norm[row];
                }
            }
        } else {
            let parent = (ipix >> (2 * (order - target))) as usize;
            if parent >= npix {
                return Err(SkyMapError::Format(format!("UNIQ {} outside the sky", uniq[row])));
            }
            let p = d * healpix::pixel_area_sr(1u32 << order);
            prob[parent] = if prob[parent].is_nan() { p } else { prob[parent] + p };
            if has_distance && p > 0.0 {
                for (k, column) in [&mu, &sigma, &norm].iter().enumerate() {
                    let acc = if weights[parent] > 0.0 { dist[k][parent] } else { 0.0 };
                    dist[k][parent] = acc + p * column[row];
                }
                weights[parent] += p;
            }
        }
    }

    if has_distance {
        for (p, w) in weights.iter().enumerate() {
            if *w > 0.0 {
                for layer in dist.iter_mut() {
                    layer[p] /= w;
                }
            }
        }
    }

    let map = SkyMap::new(ProbabilityMap::new(prob, Ordering::Nested)?);
    if has_distance {
        let [distmu, distsigma, distnorm] = dist;
        return map.with_distance(DistanceMap::new(distmu, distsigma, distnorm)?);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_bad_pixel_count() {
        assert!(matches!(
            ProbabilityMap::new(vec![0.1; 13], Ordering::Ring),
            Err(SkyMapError::InvalidResolution(13))
        ));
    }

    #[test]
    fn test_rejects_negative_probability() {
        let mut values = vec![1.0 / 12.0; 12];
        values[3] = -0.5;
        assert!(matches!(
            ProbabilityMap::new(values, Ordering::Ring),
            Err(SkyMapError::InvalidValue { index: 3, .. })
        ));
    }

    #[test]
    fn test_unseen_cells_are_undefined() {
        let mut values = vec![0.1; 12];
        values[0] = UNSEEN;
        values[1] = f64::INFINITY;
        let map = ProbabilityMap::new(values, Ordering::Ring).unwrap();

        assert!(map.get(0).is_none());
        assert!(map.get(1).is_none());
        assert_eq!(map.get(2), Some(0.1));
        assert!((map.total() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_argmax_and_lookup() {
        let mut values = vec![0.3 / 11.0; 12];
        values[5] = 0.7;
        let map = ProbabilityMap::new(values, Ordering::Nested).unwrap();

        assert_eq!(map.argmax(), Some(5));
        let centre = map.direction(5);
        assert_eq!(map.pixel_of(&centre), 5);
        assert!((map.pixel_area_deg2() * 12.0 - 41252.96).abs() < 0.01);
    }

    #[test]
    fn test_uniq_decoding() {
        assert_eq!(uniq_to_order_pixel(4).unwrap(), (0, 0));
        assert_eq!(uniq_to_order_pixel(15).unwrap(), (0, 11));
        assert_eq!(uniq_to_order_pixel(16).unwrap(), (1, 0));
        assert_eq!(uniq_to_order_pixel(63).unwrap(), (1, 47));
        assert_eq!(uniq_to_order_pixel(64).unwrap(), (2, 0));
        assert!(uniq_to_order_pixel(3).is_err());
    }

    #[test]
    fn test_distance_layer_length_checked() {
        let map = SkyMap::new(ProbabilityMap::new(vec![1.0 / 12.0; 12], Ordering::Ring).unwrap());
        let short = DistanceMap::new(vec![100.0; 11], vec![10.0; 11], vec![1e-4; 11]).unwrap();
        assert!(map.with_distance(short).is_err());
    }

    #[test]
    fn test_closure_direction_lookup() {
        let lookup = |i: usize| SkyDirection::new(i as f64, 0.0);
        assert_eq!(lookup.direction(7).ra_deg(), 7.0);
    }
}

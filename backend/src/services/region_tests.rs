use super::*;
use crate::skymap::Ordering;

fn twelve_cell_map() -> ProbabilityMap {
    let mut values = vec![0.3 / 11.0; 12];
    values[4] = 0.7;
    ProbabilityMap::new(values, Ordering::Ring).unwrap()
}

fn ramp_map(nside_npix: usize) -> ProbabilityMap {
    let total: f64 = (1..=nside_npix).map(|i| i as f64).sum();
    let values = (1..=nside_npix).map(|i| i as f64 / total).collect();
    ProbabilityMap::new(values, Ordering::Nested).unwrap()
}

#[test]
fn test_single_dominant_cell() {
    let map = twelve_cell_map();
    let threshold = compute_threshold(&map, 0.5).unwrap();
    assert_eq!(threshold, 0.7);

    let region = select_region(&map, threshold);
    assert_eq!(region, vec![4]);
}

#[test]
fn test_full_mass_covers_everything() {
    let map = twelve_cell_map();
    let region = CredibleRegion::from_map(&map, 1.0).unwrap();
    assert_eq!(region.len(), 12);
    assert!((region.probability - 1.0).abs() < 1e-9);
}

#[test]
fn test_smallest_prefix_reaches_mass() {
    let map = ramp_map(48);
    for mass in [0.1, 0.5, 0.9, 0.99] {
        let region = CredibleRegion::from_map(&map, mass).unwrap();
        assert!(region.probability >= mass - 1e-12);

        // Dropping the weakest member must fall short of the mass.
        let weakest = region
            .indices
            .iter()
            .filter_map(|&i| map.get(i))
            .fold(f64::INFINITY, f64::min);
        assert!(region.probability - weakest < mass);
    }
}

#[test]
fn test_regions_are_nested() {
    let map = ramp_map(48);
    let small = CredibleRegion::from_map(&map, 0.5).unwrap();
    let large = CredibleRegion::from_map(&map, 0.9).unwrap();

    assert!(small.len() <= large.len());
    assert!(small.indices.iter().all(|i| large.contains(*i)));
}

#[test]
fn test_ties_are_kept_together() {
    let map = ProbabilityMap::new(vec![1.0 / 12.0; 12], Ordering::Ring).unwrap();
    let region = CredibleRegion::from_map(&map, 0.1).unwrap();
    assert_eq!(region.len(), 12);
}

#[test]
fn test_invalid_mass() {
    let map = twelve_cell_map();
    assert_eq!(compute_threshold(&map, 0.0), Err(RegionError::InvalidMass(0.0)));
    assert_eq!(compute_threshold(&map, 1.5), Err(RegionError::InvalidMass(1.5)));
    assert!(compute_threshold(&map, f64::NAN).is_err());
}

#[test]
fn test_all_zero_map() {
    let map = ProbabilityMap::new(vec![0.0; 12], Ordering::Ring).unwrap();
    assert_eq!(compute_threshold(&map, 0.9), Err(RegionError::EmptyMap));
}

#[test]
fn test_deficient_map_uses_full_support() {
    let mut values = vec![0.0; 12];
    values[0] = 0.2;
    values[1] = 0.1;
    let map = ProbabilityMap::new(values, Ordering::Ring).unwrap();

    let threshold = compute_threshold(&map, 0.9).unwrap();
    assert_eq!(threshold, 0.1);
    assert_eq!(select_region(&map, threshold), vec![0, 1]);
}

#[test]
fn test_hemisphere_masks() {
    let map = ramp_map(48);
    let all: Vec<usize> = (0..48).collect();

    let north = restrict_to_hemisphere(&all, &map, |d| HemisphereMask::North.accepts(d));
    let south = restrict_to_hemisphere(&all, &map, |d| HemisphereMask::South.accepts(d));
    let full = restrict_to_hemisphere(&all, &map, |d| HemisphereMask::Full.accepts(d));

    assert_eq!(full.len(), 48);
    // nside 2 has 8 equatorial cells (dec = 0) that belong to neither side.
    assert_eq!(north.len(), 20);
    assert_eq!(south.len(), 20);
    assert!(north.iter().all(|&i| map.direction(i).dec_deg() > 0.0));
}

#[test]
fn test_declination_band_bounds() {
    let band = HemisphereMask::DeclinationBand {
        min_deg: -30.0,
        max_deg: 10.0,
    };
    assert!(band.accepts(&SkyDirection::new(0.0, 10.0)));
    assert!(!band.accepts(&SkyDirection::new(0.0, -30.0)));
    assert!(band.accepts(&SkyDirection::new(0.0, -29.9)));
    assert!(!band.accepts(&SkyDirection::new(0.0, 10.1)));
}

#[test]
fn test_cone_single_index() {
    let lookup = |_: usize| SkyDirection::new(197.45, -23.38);
    let cone = fit_cone(&[7], &lookup).unwrap();

    assert!((cone.center.ra_deg() - 197.45).abs() < 1e-9);
    assert!((cone.center.dec_deg() + 23.38).abs() < 1e-9);
    assert!(cone.radius_deg() < 1e-6);
}

#[test]
fn test_cone_contains_every_cell() {
    let map = ramp_map(48);
    let region = CredibleRegion::from_map(&map, 0.3).unwrap();
    let cone = fit_cone(&region.indices, &map).unwrap();

    for &i in &region.indices {
        assert!(cone.contains(&map.direction(i)));
    }
}

#[test]
fn test_cone_of_symmetric_pair() {
    let points = [SkyDirection::new(10.0, 0.0), SkyDirection::new(30.0, 0.0)];
    let lookup = |i: usize| points[i];
    let cone = fit_cone(&[0, 1], &lookup).unwrap();

    assert!((cone.center.ra_deg() - 20.0).abs() < 1e-9);
    assert!(cone.center.dec_deg().abs() < 1e-9);
    assert!((cone.radius_deg() - 10.0).abs() < 1e-9);
    assert!((cone.radius_arcsec() - 36000.0).abs() < 1e-5);
}

#[test]
fn test_cone_errors() {
    let lookup = |i: usize| SkyDirection::new(i as f64 * 180.0, 0.0);
    assert_eq!(fit_cone(&[], &lookup), Err(RegionError::EmptyRegion));
    assert!(matches!(
        fit_cone(&[0, 1], &lookup),
        Err(RegionError::DegenerateRegion(_))
    ));
}

#[test]
fn test_filter_in_region() {
    let map = twelve_cell_map();
    let region = CredibleRegion::from_map(&map, 0.5).unwrap();
    let inside = map.direction(4);
    let outside = map.direction(10);

    let record = |oid: &str, d: SkyDirection| CandidateRecord {
        oid: oid.into(),
        meanra: d.ra_deg(),
        meandec: d.dec_deg(),
        ndet: 3,
        firstmjd: 58600.0,
        lastmjd: 58601.0,
        mjdstarthist: None,
        mjdendhist: None,
        stellar: None,
        sgscore: None,
        class: None,
        probability: None,
    };

    let kept = filter_in_region(
        &[record("ZTFin", inside), record("ZTFout", outside)],
        &map,
        &region,
    );
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].oid.as_str(), "ZTFin");
}

//! Sky directions and great-circle geometry.

use serde::{Deserialize, Serialize};

const ARCSEC_PER_DEG: f64 = 3600.0;

/// Equatorial direction (ICRS right ascension / declination).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkyDirection {
    pub ra: qtty::Degrees,
    pub dec: qtty::Degrees,
}

impl SkyDirection {
    /// Create a direction from degrees; RA is wrapped into `[0, 360)`.
    pub fn new(ra_deg: f64, dec_deg: f64) -> Self {
        Self {
            ra: qtty::Degrees::new(ra_deg.rem_euclid(360.0)),
            dec: qtty::Degrees::new(dec_deg),
        }
    }

    pub fn ra_deg(&self) -> f64 {
        self.ra.value()
    }

    pub fn dec_deg(&self) -> f64 {
        self.dec.value()
    }

    /// Cartesian unit vector `(x, y, z)`.
    pub fn to_unit_vector(&self) -> [f64; 3] {
        let ra = self.ra_deg().to_radians();
        let dec = self.dec_deg().to_radians();
        let cos_dec = dec.cos();
        [cos_dec * ra.cos(), cos_dec * ra.sin(), dec.sin()]
    }

    /// Direction of an arbitrary non-zero vector. Returns `None` for a
    /// (numerically) zero vector.
    pub fn from_vector(v: [f64; 3]) -> Option<Self> {
        let norm = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
        if !norm.is_finite() || norm < 1e-12 {
            return None;
        }
        let (x, y, z) = (v[0] / norm, v[1] / norm, v[2] / norm);
        let dec = z.clamp(-1.0, 1.0).asin().to_degrees();
        let ra = y.atan2(x).to_degrees();
        Some(Self::new(ra, dec))
    }

    /// Great-circle separation in degrees.
    ///
    /// Uses the Vincenty formula, which stays accurate for both tiny and
    /// near-antipodal separations.
    pub fn separation_deg(&self, other: &SkyDirection) -> f64 {
        let (ra1, dec1) = (self.ra_deg().to_radians(), self.dec_deg().to_radians());
        let (ra2, dec2) = (other.ra_deg().to_radians(), other.dec_deg().to_radians());
        let dra = ra2 - ra1;

        let num1 = dec2.cos() * dra.sin();
        let num2 = dec1.cos() * dec2.sin() - dec1.sin() * dec2.cos() * dra.cos();
        let denom = dec1.sin() * dec2.sin() + dec1.cos() * dec2.cos() * dra.cos();

        (num1.hypot(num2)).atan2(denom).to_degrees()
    }

    pub fn separation_arcsec(&self, other: &SkyDirection) -> f64 {
        self.separation_deg(other) * ARCSEC_PER_DEG
    }
}

impl std::fmt::Display for SkyDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "(ra={:.5}°, dec={:+.5}°)", self.ra_deg(), self.dec_deg())
    }
}

/// Degrees to arcseconds.
pub fn deg_to_arcsec(deg: f64) -> f64 {
    deg * ARCSEC_PER_DEG
}

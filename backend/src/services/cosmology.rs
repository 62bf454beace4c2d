//! Flat ΛCDM distances.

use serde::{Deserialize, Serialize};

/// Speed of light in km/s.
pub const SPEED_OF_LIGHT_KM_S: f64 = 299_792.458;

/// Simpson intervals per unit redshift; always rounded up to an even count.
const STEPS_PER_UNIT_Z: f64 = 2000.0;
const MIN_STEPS: usize = 64;
/// Enough halvings to shrink [0, 1e4] to adjacent floats.
const MAX_BISECTIONS: usize = 1100;

/// Flat ΛCDM cosmology (Ω_Λ = 1 − Ω_m, radiation neglected).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Cosmology {
    /// Hubble constant in km/s/Mpc.
    pub h0: f64,
    /// Present-day matter density parameter.
    pub omega_m: f64,
}

impl Default for Cosmology {
    fn default() -> Self {
        Self {
            h0: 70.0,
            omega_m: 0.3,
        }
    }
}

impl Cosmology {
    pub fn new(h0: f64, omega_m: f64) -> Self {
        Self { h0, omega_m }
    }

    pub fn omega_lambda(&self) -> f64 {
        1.0 - self.omega_m
    }

    /// Hubble distance c/H0 in Mpc.
    pub fn hubble_distance_mpc(&self) -> f64 {
        SPEED_OF_LIGHT_KM_S / self.h0
    }

    fn e_of_z(&self, z: f64) -> f64 {
        let a = 1.0 + z;
        (self.omega_m * a * a * a + self.omega_lambda()).sqrt()
    }

    /// Line-of-sight comoving distance in Mpc.
    pub fn comoving_distance_mpc(&self, z: f64) -> f64 {
        if z <= 0.0 {
            return 0.0;
        }
        let mut steps = ((z * STEPS_PER_UNIT_Z).ceil() as usize).max(MIN_STEPS);
        if steps % 2 == 1 {
            steps += 1;
        }
        let h = z / steps as f64;
        let f = |x: f64| 1.0 / self.e_of_z(x);

        let mut sum = f(0.0) + f(z);
        for i in 1..steps {
            let weight = if i % 2 == 1 { 4.0 } else { 2.0 };
            sum += weight * f(i as f64 * h);
        }
        self.hubble_distance_mpc() * sum * h / 3.0
    }

    /// Luminosity distance in Mpc; zero for non-positive redshift.
    pub fn luminosity_distance_mpc(&self, z: f64) -> f64 {
        if z <= 0.0 {
            return 0.0;
        }
        (1.0 + z) * self.comoving_distance_mpc(z)
    }

    /// Redshift whose luminosity distance is `distance_mpc`, by bisection.
    ///
    /// The result is the smallest float found with `D_L(z) >= distance_mpc`,
    /// so a lower distance bound converted to redshift and back still passes
    /// an inclusive comparison. Returns `None` for negative or non-finite
    /// distances.
    pub fn redshift_at_distance(&self, distance_mpc: f64) -> Option<f64> {
        if !distance_mpc.is_finite() || distance_mpc < 0.0 {
            return None;
        }
        if distance_mpc == 0.0 {
            return Some(0.0);
        }

        let mut low = 0.0;
        let mut high = 1.0;
        while self.luminosity_distance_mpc(high) < distance_mpc {
            high *= 2.0;
            if high > 1e4 {
                return None;
            }
        }
        // D(low) < target <= D(high) holds throughout; stop once the bounds
        // are adjacent floats.
        for _ in 0..MAX_BISECTIONS {
            let mid = low + 0.5 * (high - low);
            if mid <= low || mid >= high {
                break;
            }
            if self.luminosity_distance_mpc(mid) < distance_mpc {
                low = mid;
            } else {
                high = mid;
            }
        }
        Some(high)
    }
}

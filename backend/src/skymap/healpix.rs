//! HEALPix pixel geometry for RING and NESTED orderings.
//!
//! Pixel centres and pixel lookup follow the reference HEALPix definitions
//! (Górski et al. 2005). Only the operations the counterpart search needs
//! are provided: pixel centres, pixel lookup and pixel area.

use std::f64::consts::{FRAC_PI_2, PI, TAU};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::SkyMapError;
use crate::models::SkyDirection;

const TWO_THIRDS: f64 = 2.0 / 3.0;

// Face row and column offsets used by the NESTED scheme.
const JRLL: [i64; 12] = [2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4];
const JPLL: [i64; 12] = [1, 3, 5, 7, 0, 2, 4, 6, 1, 3, 5, 7];

/// Pixel numbering scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ordering {
    Ring,
    Nested,
}

impl FromStr for Ordering {
    type Err = SkyMapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "RING" => Ok(Self::Ring),
            "NESTED" | "NEST" => Ok(Self::Nested),
            other => Err(SkyMapError::UnsupportedOrdering(other.to_string())),
        }
    }
}

/// Number of pixels at resolution `nside`.
pub fn npix(nside: u32) -> usize {
    12 * (nside as usize) * (nside as usize)
}

/// Recover `nside` from a pixel count; fails unless `npix = 12·k²`.
pub fn nside_from_npix(npix: usize) -> Result<u32, SkyMapError> {
    if npix == 0 || npix % 12 != 0 {
        return Err(SkyMapError::InvalidResolution(npix));
    }
    let k2 = npix / 12;
    let k = (k2 as f64).sqrt().round() as usize;
    if k * k != k2 {
        return Err(SkyMapError::InvalidResolution(npix));
    }
    u32::try_from(k).map_err(|_| SkyMapError::InvalidResolution(npix))
}

/// Check that `nside` can be used with `ordering`.
pub fn validate_nside(nside: u32, ordering: Ordering) -> Result<(), SkyMapError> {
    if nside == 0 {
        return Err(SkyMapError::InvalidResolution(0));
    }
    if ordering == Ordering::Nested && !nside.is_power_of_two() {
        return Err(SkyMapError::Format(format!(
            "NESTED ordering requires a power-of-two NSIDE, got {}",
            nside
        )));
    }
    Ok(())
}

/// Solid angle of one pixel in steradians.
pub fn pixel_area_sr(nside: u32) -> f64 {
    4.0 * PI / npix(nside) as f64
}

/// Centre of pixel `pix`.
pub fn pix2ang(nside: u32, ordering: Ordering, pix: usize) -> SkyDirection {
    let (z, phi) = match ordering {
        Ordering::Ring => pix2zphi_ring(nside as i64, pix as i64),
        Ordering::Nested => pix2zphi_nest(nside as i64, pix as i64),
    };
    SkyDirection::new(phi.to_degrees(), z.clamp(-1.0, 1.0).asin().to_degrees())
}

/// Pixel containing `direction`.
pub fn ang2pix(nside: u32, ordering: Ordering, direction: &SkyDirection) -> usize {
    let z = direction.dec_deg().to_radians().sin();
    let phi = direction.ra_deg().to_radians();
    let pix = match ordering {
        Ordering::Ring => zphi2pix_ring(nside as i64, z, phi),
        Ordering::Nested => zphi2pix_nest(nside as i64, z, phi),
    };
    pix as usize
}

fn isqrt(v: i64) -> i64 {
    let mut r = (v as f64).sqrt() as i64;
    while r * r > v {
        r -= 1;
    }
    while (r + 1) * (r + 1) <= v {
        r += 1;
    }
    r
}

fn pix2zphi_ring(nside: i64, pix: i64) -> (f64, f64) {
    let ncap = 2 * nside * (nside - 1);
    let npix = 12 * nside * nside;
    let fact2 = 4.0 / npix as f64;

    if pix < ncap {
        // north polar cap
        let iring = (1 + isqrt(1 + 2 * pix)) >> 1;
        let iphi = (pix + 1) - 2 * iring * (iring - 1);
        let z = 1.0 - (iring * iring) as f64 * fact2;
        let phi = (iphi as f64 - 0.5) * FRAC_PI_2 / iring as f64;
        (z, phi)
    } else if pix < npix - ncap {
        let fact1 = (2 * nside) as f64 * fact2;
        let ip = pix - ncap;
        let iring = ip / (4 * nside) + nside;
        let iphi = ip % (4 * nside) + 1;
        let fodd = if (iring + nside) & 1 == 1 { 1.0 } else { 0.5 };
        let nl2 = 2 * nside;
        let z = (nl2 - iring) as f64 * fact1;
        let phi = (iphi as f64 - fodd) * PI / nl2 as f64;
        (z, phi)
    } else {
        // south polar cap
        let ip = npix - pix;
        let iring = (1 + isqrt(2 * ip - 1)) >> 1;
        let iphi = 4 * iring + 1 - (ip - 2 * iring * (iring - 1));
        let z = -1.0 + (iring * iring) as f64 * fact2;
        let phi = (iphi as f64 - 0.5) * FRAC_PI_2 / iring as f64;
        (z, phi)
    }
}

fn compress_bits(v: i64) -> i64 {
    let mut out = 0;
    for i in 0..32 {
        out |= ((v >> (2 * i)) & 1) << i;
    }
    out
}

fn spread_bits(v: i64) -> i64 {
    let mut out = 0;
    for i in 0..32 {
        out |= ((v >> i) & 1) << (2 * i);
    }
    out
}

fn pix2zphi_nest(nside: i64, pix: i64) -> (f64, f64) {
    let npface = nside * nside;
    let face = (pix / npface) as usize;
    let local = pix & (npface - 1);
    let ix = compress_bits(local);
    let iy = compress_bits(local >> 1);

    let nl4 = 4 * nside;
    let fact2 = 4.0 / (12 * npface) as f64;
    let jr = JRLL[face] * nside - ix - iy - 1;

    let (nr, z, kshift) = if jr < nside {
        (jr, 1.0 - (jr * jr) as f64 * fact2, 0)
    } else if jr > 3 * nside {
        let nr = nl4 - jr;
        (nr, (nr * nr) as f64 * fact2 - 1.0, 0)
    } else {
        let fact1 = (2 * nside) as f64 * fact2;
        (nside, (2 * nside - jr) as f64 * fact1, (jr - nside) & 1)
    };

    let mut jp = (JPLL[face] * nr + ix - iy + 1 + kshift) / 2;
    if jp > nl4 {
        jp -= nl4;
    }
    if jp < 1 {
        jp += nl4;
    }

    let phi = (jp as f64 - (kshift + 1) as f64 * 0.5) * (FRAC_PI_2 / nr as f64);
    (z, phi)
}

fn zphi2pix_ring(nside: i64, z: f64, phi: f64) -> i64 {
    let za = z.abs();
    let tt = phi.rem_euclid(TAU) / FRAC_PI_2;

    if za <= TWO_THIRDS {
        let temp1 = nside as f64 * (0.5 + tt);
        let temp2 = nside as f64 * z * 0.75;
        let jp = (temp1 - temp2) as i64;
        let jm = (temp1 + temp2) as i64;

        let ir = nside + 1 + jp - jm;
        let kshift = 1 - (ir & 1);
        let ip = ((jp + jm - nside + kshift + 1) / 2).rem_euclid(4 * nside);

        2 * nside * (nside - 1) + (ir - 1) * 4 * nside + ip
    } else {
        let tp = tt - tt.trunc();
        let tmp = nside as f64 * (3.0 * (1.0 - za)).sqrt();

        let jp = (tp * tmp) as i64;
        let jm = ((1.0 - tp) * tmp) as i64;

        let ir = jp + jm + 1;
        let ip = ((tt * ir as f64) as i64).rem_euclid(4 * ir);

        if z > 0.0 {
            2 * ir * (ir - 1) + ip
        } else {
            12 * nside * nside - 2 * ir * (ir + 1) + ip
        }
    }
}

fn zphi2pix_nest(nside: i64, z: f64, phi: f64) -> i64 {
    let za = z.abs();
    let tt = phi.rem_euclid(TAU) / FRAC_PI_2;

    let (face, ix, iy) = if za <= TWO_THIRDS {
        let temp1 = nside as f64 * (0.5 + tt);
        let temp2 = nside as f64 * (z * 0.75);
        let jp = (temp1 - temp2) as i64;
        let jm = (temp1 + temp2) as i64;
        let ifp = jp / nside;
        let ifm = jm / nside;
        let face = if ifp == ifm {
            ifp | 4
        } else if ifp < ifm {
            ifp
        } else {
            ifm + 8
        };
        (face, jm & (nside - 1), nside - (jp & (nside - 1)) - 1)
    } else {
        let ntt = (tt as i64).min(3);
        let tp = tt - ntt as f64;
        let tmp = nside as f64 * (3.0 * (1.0 - za)).sqrt();

        let jp = ((tp * tmp) as i64).min(nside - 1);
        let jm = (((1.0 - tp) * tmp) as i64).min(nside - 1);
        if z >= 0.0 {
            (ntt, nside - jm - 1, nside - jp - 1)
        } else {
            (ntt + 8, jp, jm)
        }
    };

    face * nside * nside + spread_bits(ix) + (spread_bits(iy) << 1)
}

//! Boundary to difficulty conversion
//!
//! Difficulty is the 256-bit quotient `0xffff * 2^240 / boundary`,
//! reported as a double the way pools and dashboards expect it.

use crate::core::Hash256;
use num_bigint::BigUint;
use num_traits::{ToPrimitive, Zero};

/// Convert a boundary (difficulty target) into a difficulty figure
///
/// Returns 0.0 for an all-zero boundary, which only occurs when no work
/// has been received yet.
pub fn boundary_to_difficulty(boundary: &Hash256) -> f64 {
    let divisor = BigUint::from_bytes_be(boundary.as_bytes());
    if divisor.is_zero() {
        return 0.0;
    }
    let dividend = BigUint::from(0xffffu32) << 240;
    let quotient: BigUint = dividend / divisor;
    quotient.to_f64().unwrap_or(f64::MAX)
}

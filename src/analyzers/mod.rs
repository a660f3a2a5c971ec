//! Daily aggregation and rolling variation.
//!
//! This module turns trip records into day-of-year indexed daily totals,
//! aligns two periods on a common index, and computes trailing rolling means
//! and the relative variation between them. Missing days stay missing all the
//! way through.

pub mod aggregate;
pub mod align;
pub mod rolling;
pub mod types;
pub mod utility;

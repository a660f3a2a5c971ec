//! Concrete data sources.
//!
//! [`bysykkel::BysykkelTripSource`] downloads monthly Oslo Bysykkel trip
//! exports through a local file cache. [`mobility_report::MobilityReportSource`]
//! reads the yearly regional mobility reports from disk.

pub mod bysykkel;
pub mod mobility_report;

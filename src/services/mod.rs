//! Traits and record types for the external data the pipeline consumes.

pub mod baseline_source;
pub mod trip_source;

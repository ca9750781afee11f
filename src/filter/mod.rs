//! Filters: per-record transformations.

pub mod predict;

//! Batch writers: consume a complete dataset at the end of a run.

pub mod fit;

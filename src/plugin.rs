use thiserror::Error;

use crate::data::model::Spectrum;
use crate::session::Session;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A required option is missing or inconsistent. Raised before any record is processed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{plugin}: {message}")]
    Missing {
        plugin: &'static str,
        message: &'static str,
    },
}

/// Failures a batch writer reports to its caller.
///
/// Everything else is logged and the write is abandoned without output.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WriteError {
    #[error("no data for training")]
    EmptyBatch,
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Record types plugins exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataKind {
    Spectrum2D,
}

/// Input of a filter: a single record or a collection of them.
#[derive(Debug, Clone, PartialEq)]
pub enum Data {
    Single(Spectrum),
    Many(Vec<Spectrum>),
}

impl Data {
    /// Flatten into a list of records.
    pub fn into_vec(self) -> Vec<Spectrum> {
        match self {
            Data::Single(sp) => vec![sp],
            Data::Many(list) => list,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Data::Single(_) => 1,
            Data::Many(list) => list.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Spectrum> for Data {
    fn from(sp: Spectrum) -> Self {
        Data::Single(sp)
    }
}

impl From<Vec<Spectrum>> for Data {
    fn from(list: Vec<Spectrum>) -> Self {
        Data::Many(list)
    }
}

// ---------------------------------------------------------------------------
// Plugin traits
// ---------------------------------------------------------------------------

/// Common surface of pipeline plugins.
pub trait Plugin {
    /// Name of the plugin, used as sub-command.
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Record types accepted as input.
    fn accepts(&self) -> &'static [DataKind] {
        &[DataKind::Spectrum2D]
    }

    /// Validate the configuration before processing starts.
    fn initialize(&mut self) -> Result<(), ConfigError>;
}

/// Transforms records one call at a time.
pub trait Filter: Plugin {
    /// Record types produced.
    fn generates(&self) -> &'static [DataKind] {
        &[DataKind::Spectrum2D]
    }

    fn process(&mut self, data: Data, session: &Session) -> Vec<Spectrum>;
}

/// Consumes the complete set of records in one go.
pub trait BatchWriter: Plugin {
    fn write_batch(&mut self, data: &[Spectrum], session: &Session) -> Result<(), WriteError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_flattens() {
        let single: Data = Spectrum::new("a", vec![1.0]).into();
        assert_eq!(single.len(), 1);
        assert_eq!(single.into_vec()[0].id, "a");

        let many: Data = vec![Spectrum::new("a", vec![1.0]), Spectrum::new("b", vec![2.0])].into();
        assert_eq!(many.into_vec().len(), 2);
        assert!(Data::Many(Vec::new()).is_empty());
    }
}

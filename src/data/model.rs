use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde_json::Value as JsonValue;

// ---------------------------------------------------------------------------
// MetadataValue – a single sample data field
// ---------------------------------------------------------------------------

/// A dynamically-typed sample data value mirroring common Pandas dtypes.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    /// ISO-8601 date string kept as text for simplicity.
    Date(String),
    Null,
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::String(s) => write!(f, "{s}"),
            MetadataValue::Integer(i) => write!(f, "{i}"),
            MetadataValue::Float(v) => write!(f, "{v}"),
            MetadataValue::Bool(b) => write!(f, "{b}"),
            MetadataValue::Date(d) => write!(f, "{d}"),
            MetadataValue::Null => write!(f, "<null>"),
        }
    }
}

impl From<f64> for MetadataValue {
    fn from(v: f64) -> Self {
        MetadataValue::Float(v)
    }
}

impl From<&str> for MetadataValue {
    fn from(s: &str) -> Self {
        MetadataValue::String(s.to_string())
    }
}

impl MetadataValue {
    /// Coerce the value to an `f64` the way a training target is read.
    ///
    /// Numbers convert directly, booleans become `1.0`/`0.0` and strings are
    /// parsed. Nulls, dates and unparsable strings yield `None`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetadataValue::Float(v) => Some(*v),
            MetadataValue::Integer(i) => Some(*i as f64),
            MetadataValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            MetadataValue::String(s) => s.trim().parse::<f64>().ok(),
            MetadataValue::Date(_) | MetadataValue::Null => None,
        }
    }

    /// JSON representation used by the writers.
    pub fn to_json(&self) -> JsonValue {
        match self {
            MetadataValue::String(s) | MetadataValue::Date(s) => JsonValue::String(s.clone()),
            MetadataValue::Integer(i) => JsonValue::from(*i),
            MetadataValue::Float(v) => serde_json::Number::from_f64(*v)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            MetadataValue::Bool(b) => JsonValue::Bool(*b),
            MetadataValue::Null => JsonValue::Null,
        }
    }
}

// ---------------------------------------------------------------------------
// Spectrum – one record flowing through the pipeline
// ---------------------------------------------------------------------------

/// A single spectrum (one row of the source DataFrame).
///
/// `Clone` is a deep copy: the amplitudes and the sample data are owned.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    /// Identifier used in log messages.
    pub id: String,
    /// Wavenumber axis (x).
    pub x: Vec<f64>,
    /// Amplitudes (y) – same length as `x`, the feature vector for modeling.
    pub y: Vec<f64>,
    /// Sample data fields: name → value.
    pub metadata: BTreeMap<String, MetadataValue>,
}

impl Spectrum {
    /// Build a spectrum on the default index axis `0..n`.
    pub fn new(id: impl Into<String>, amplitudes: Vec<f64>) -> Self {
        let x = (0..amplitudes.len()).map(|i| i as f64).collect();
        Spectrum {
            id: id.into(),
            x,
            y: amplitudes,
            metadata: BTreeMap::new(),
        }
    }

    /// Builder-style helper to attach a sample data field.
    pub fn with_field(mut self, key: &str, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn amplitudes(&self) -> &[f64] {
        &self.y
    }

    pub fn sample_data(&self) -> &BTreeMap<String, MetadataValue> {
        &self.metadata
    }

    pub fn sample_data_mut(&mut self) -> &mut BTreeMap<String, MetadataValue> {
        &mut self.metadata
    }
}

// ---------------------------------------------------------------------------
// SpectralDataset – the complete loaded dataset
// ---------------------------------------------------------------------------

/// The full parsed dataset with its metadata column index.
#[derive(Debug, Clone)]
pub struct SpectralDataset {
    /// All spectra (rows).
    pub spectra: Vec<Spectrum>,
    /// Ordered list of metadata column names (excludes id, x, y).
    pub column_names: Vec<String>,
}

impl SpectralDataset {
    /// Build the column index from the loaded spectra.
    pub fn from_spectra(spectra: Vec<Spectrum>) -> Self {
        let column_names: BTreeSet<String> = spectra
            .iter()
            .flat_map(|sp| sp.metadata.keys().cloned())
            .collect();
        SpectralDataset {
            spectra,
            column_names: column_names.into_iter().collect(),
        }
    }

    /// Number of spectra.
    pub fn len(&self) -> usize {
        self.spectra.len()
    }

    /// Whether the dataset is empty.
    pub fn is_empty(&self) -> bool {
        self.spectra.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coerces_targets_like_float() {
        assert_eq!(MetadataValue::Integer(3).as_f64(), Some(3.0));
        assert_eq!(MetadataValue::from(" 2.5 ").as_f64(), Some(2.5));
        assert_eq!(MetadataValue::Bool(true).as_f64(), Some(1.0));
        assert_eq!(MetadataValue::from("abc").as_f64(), None);
        assert_eq!(MetadataValue::Null.as_f64(), None);
        assert_eq!(MetadataValue::Date("2024-01-01".into()).as_f64(), None);
    }

    #[test]
    fn dataset_collects_column_union() {
        let ds = SpectralDataset::from_spectra(vec![
            Spectrum::new("a", vec![1.0]).with_field("value", 1.0),
            Spectrum::new("b", vec![2.0]).with_field("batch", "x"),
        ]);
        assert_eq!(ds.column_names, vec!["batch".to_string(), "value".to_string()]);
        assert_eq!(ds.len(), 2);
    }

    #[test]
    fn clone_does_not_alias_sample_data() {
        let original = Spectrum::new("a", vec![1.0, 2.0]);
        let mut copy = original.clone();
        copy.sample_data_mut().insert("pred".into(), MetadataValue::Float(1.0));
        assert!(original.sample_data().is_empty());
    }
}

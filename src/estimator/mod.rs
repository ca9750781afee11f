/// Estimators: trainable models over amplitude vectors.
///
/// Every model is a [`Component`] that can be persisted through the
/// [`registry::ModelRegistry`]. Only components that expose an
/// [`Estimator`] can be trained on targets and used for predictions; the
/// rest (e.g. [`scaler::StandardScaler`]) fail the capability check.
use std::fmt;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;

pub mod dummy;
pub mod linalg;
pub mod linear;
pub mod neighbors;
pub mod registry;
pub mod scaler;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised by the estimators while constructing, training or predicting.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("no samples to train on")]
    EmptyTrainingSet,

    #[error("got {features} feature vectors but {targets} targets")]
    LengthMismatch { features: usize, targets: usize },

    #[error("target at position {index} is missing")]
    MissingTarget { index: usize },

    #[error("non-finite value {value} in {location}")]
    NonFinite { location: String, value: f64 },

    #[error("feature vector {row} has {got} values, expected {expected}")]
    ShapeMismatch {
        row: usize,
        got: usize,
        expected: usize,
    },

    #[error("{0} has not been fitted yet")]
    NotFitted(&'static str),

    #[error("invalid parameter for {model}: {message}")]
    InvalidParameter { model: &'static str, message: String },

    #[error("invalid parameters for {model}")]
    Parameters {
        model: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid state for {model}")]
    State {
        model: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

// ---------------------------------------------------------------------------
// Capability contract
// ---------------------------------------------------------------------------

/// A model that learns a scalar target from amplitude vectors.
pub trait Estimator {
    /// Train on `x` (one amplitude vector per sample) and `y` (one target
    /// per sample). A `None` target is a missing value and makes training fail.
    fn fit(&mut self, x: &[Vec<f64>], y: &[Option<f64>]) -> Result<(), ModelError>;

    /// Predict one scalar per amplitude vector.
    fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<f64>, ModelError>;
}

/// Anything the registry can create, save and load.
pub trait Component: fmt::Debug {
    /// Registry identifier of the component type.
    fn kind(&self) -> &'static str;

    /// Serializable snapshot of parameters and fitted state.
    fn state(&self) -> Result<JsonValue, ModelError>;

    /// The predictive-model view of this component, if it has one.
    fn as_estimator(&self) -> Option<&dyn Estimator> {
        None
    }

    fn as_estimator_mut(&mut self) -> Option<&mut dyn Estimator> {
        None
    }
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Deserialize a constructor parameter map into a parameter struct.
pub(crate) fn parse_params<T: DeserializeOwned>(
    model: &'static str,
    params: &Map<String, JsonValue>,
) -> Result<T, ModelError> {
    serde_json::from_value(JsonValue::Object(params.clone()))
        .map_err(|source| ModelError::Parameters { model, source })
}

/// Restore a component from its [`Component::state`] snapshot.
pub(crate) fn restore_state<T: DeserializeOwned>(
    model: &'static str,
    state: JsonValue,
) -> Result<T, ModelError> {
    serde_json::from_value(state).map_err(|source| ModelError::State { model, source })
}

pub(crate) fn snapshot<T: serde::Serialize>(
    model: &'static str,
    value: &T,
) -> Result<JsonValue, ModelError> {
    serde_json::to_value(value).map_err(|source| ModelError::State { model, source })
}

/// Check a feature matrix is non-empty, rectangular and finite; returns its width.
pub(crate) fn check_features(x: &[Vec<f64>]) -> Result<usize, ModelError> {
    let first = x.first().ok_or(ModelError::EmptyTrainingSet)?;
    let width = first.len();
    for (row, values) in x.iter().enumerate() {
        if values.len() != width {
            return Err(ModelError::ShapeMismatch {
                row,
                got: values.len(),
                expected: width,
            });
        }
        if let Some((column, &value)) = values.iter().enumerate().find(|(_, v)| !v.is_finite()) {
            return Err(ModelError::NonFinite {
                location: format!("feature vector {row}, column {column}"),
                value,
            });
        }
    }
    Ok(width)
}

/// Validate a training set and unwrap its targets.
pub(crate) fn check_training_set(
    x: &[Vec<f64>],
    y: &[Option<f64>],
) -> Result<(usize, Vec<f64>), ModelError> {
    let width = check_features(x)?;
    if x.len() != y.len() {
        return Err(ModelError::LengthMismatch {
            features: x.len(),
            targets: y.len(),
        });
    }
    let targets = y
        .iter()
        .enumerate()
        .map(|(index, v)| match v {
            None => Err(ModelError::MissingTarget { index }),
            Some(value) if !value.is_finite() => Err(ModelError::NonFinite {
                location: format!("target {index}"),
                value: *value,
            }),
            Some(value) => Ok(*value),
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok((width, targets))
}

/// Check prediction inputs against the fitted width.
pub(crate) fn check_width(x: &[Vec<f64>], expected: usize) -> Result<(), ModelError> {
    match x.iter().enumerate().find(|(_, v)| v.len() != expected) {
        Some((row, values)) => Err(ModelError::ShapeMismatch {
            row,
            got: values.len(),
            expected,
        }),
        None => Ok(()),
    }
}

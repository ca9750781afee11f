use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use super::{
    Component, Estimator, ModelError, check_training_set, check_width, parse_params,
    restore_state, snapshot,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    #[default]
    Mean,
    Median,
    Constant,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DummyParams {
    pub strategy: Strategy,
    /// Only used by [`Strategy::Constant`].
    pub constant: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DummyFit {
    pub value: f64,
    pub n_features: usize,
}

/// Baseline regressor ignoring the amplitudes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DummyRegressor {
    pub params: DummyParams,
    pub fitted: Option<DummyFit>,
}

impl DummyRegressor {
    pub const KIND: &'static str = "DummyRegressor";

    pub fn from_params(params: &Map<String, JsonValue>) -> Result<Self, ModelError> {
        Ok(Self {
            params: parse_params(Self::KIND, params)?,
            fitted: None,
        })
    }

    pub fn from_state(state: JsonValue) -> Result<Self, ModelError> {
        restore_state(Self::KIND, state)
    }
}

fn median(mut values: Vec<f64>) -> f64 {
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

impl Estimator for DummyRegressor {
    fn fit(&mut self, x: &[Vec<f64>], y: &[Option<f64>]) -> Result<(), ModelError> {
        let (n_features, targets) = check_training_set(x, y)?;
        let value = match self.params.strategy {
            Strategy::Mean => targets.iter().sum::<f64>() / targets.len() as f64,
            Strategy::Median => median(targets),
            Strategy::Constant => {
                self.params
                    .constant
                    .ok_or_else(|| ModelError::InvalidParameter {
                        model: Self::KIND,
                        message: "strategy 'constant' requires a constant".to_string(),
                    })?
            }
        };
        self.fitted = Some(DummyFit { value, n_features });
        Ok(())
    }

    fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<f64>, ModelError> {
        let fit = self
            .fitted
            .as_ref()
            .ok_or(ModelError::NotFitted(Self::KIND))?;
        check_width(x, fit.n_features)?;
        Ok(vec![fit.value; x.len()])
    }
}

impl Component for DummyRegressor {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn state(&self) -> Result<JsonValue, ModelError> {
        snapshot(Self::KIND, self)
    }

    fn as_estimator(&self) -> Option<&dyn Estimator> {
        Some(self)
    }

    fn as_estimator_mut(&mut self) -> Option<&mut dyn Estimator> {
        Some(self)
    }
}

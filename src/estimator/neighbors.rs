use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use super::{
    Component, Estimator, ModelError, check_training_set, check_width, parse_params,
    restore_state, snapshot,
};

/// How neighbour targets are combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weights {
    #[default]
    Uniform,
    /// Inverse Euclidean distance.
    Distance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KNeighborsParams {
    pub n_neighbors: usize,
    pub weights: Weights,
}

impl Default for KNeighborsParams {
    fn default() -> Self {
        Self {
            n_neighbors: 5,
            weights: Weights::Uniform,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeighborsFit {
    pub x: Vec<Vec<f64>>,
    pub y: Vec<f64>,
}

/// k-nearest-neighbours regression on raw amplitudes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KNeighborsRegressor {
    pub params: KNeighborsParams,
    pub fitted: Option<NeighborsFit>,
}

impl KNeighborsRegressor {
    pub const KIND: &'static str = "KNeighborsRegressor";

    pub fn from_params(params: &Map<String, JsonValue>) -> Result<Self, ModelError> {
        let params: KNeighborsParams = parse_params(Self::KIND, params)?;
        if params.n_neighbors == 0 {
            return Err(ModelError::InvalidParameter {
                model: Self::KIND,
                message: "n_neighbors must be at least 1".to_string(),
            });
        }
        Ok(Self {
            params,
            fitted: None,
        })
    }

    pub fn from_state(state: JsonValue) -> Result<Self, ModelError> {
        restore_state(Self::KIND, state)
    }

    fn predict_one(&self, fit: &NeighborsFit, sample: &[f64]) -> f64 {
        let mut distances: Vec<(f64, f64)> = fit
            .x
            .iter()
            .zip(&fit.y)
            .map(|(row, target)| (euclidean(row, sample), *target))
            .collect();
        distances.sort_by(|a, b| a.0.total_cmp(&b.0));
        let nearest = &distances[..self.params.n_neighbors.min(distances.len())];

        match self.params.weights {
            Weights::Uniform => mean(nearest.iter().map(|(_, t)| *t)),
            Weights::Distance => {
                // exact matches take all the weight
                let exact: Vec<f64> = nearest
                    .iter()
                    .filter(|(d, _)| *d == 0.0)
                    .map(|(_, t)| *t)
                    .collect();
                if !exact.is_empty() {
                    return mean(exact.into_iter());
                }
                let (num, den) = nearest
                    .iter()
                    .fold((0.0, 0.0), |(num, den), (d, t)| (num + t / d, den + 1.0 / d));
                num / den
            }
        }
    }
}

fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(p, q)| (p - q) * (p - q))
        .sum::<f64>()
        .sqrt()
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    sum / count.max(1) as f64
}

impl Estimator for KNeighborsRegressor {
    fn fit(&mut self, x: &[Vec<f64>], y: &[Option<f64>]) -> Result<(), ModelError> {
        let (_, targets) = check_training_set(x, y)?;
        if self.params.n_neighbors > x.len() {
            return Err(ModelError::InvalidParameter {
                model: Self::KIND,
                message: format!(
                    "n_neighbors ({}) exceeds the number of samples ({})",
                    self.params.n_neighbors,
                    x.len()
                ),
            });
        }
        self.fitted = Some(NeighborsFit {
            x: x.to_vec(),
            y: targets,
        });
        Ok(())
    }

    fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<f64>, ModelError> {
        let fit = self
            .fitted
            .as_ref()
            .ok_or(ModelError::NotFitted(Self::KIND))?;
        let width = fit.x.first().map_or(0, Vec::len);
        check_width(x, width)?;
        Ok(x.iter().map(|sample| self.predict_one(fit, sample)).collect())
    }
}

impl Component for KNeighborsRegressor {
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

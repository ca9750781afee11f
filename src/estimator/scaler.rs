use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use super::{
    Component, ModelError, check_features, check_width, parse_params, restore_state, snapshot,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScalerParams {
    pub with_mean: bool,
    pub with_std: bool,
}

impl Default for ScalerParams {
    fn default() -> Self {
        Self {
            with_mean: true,
            with_std: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerFit {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

/// Per-wavenumber standardization of amplitudes.
///
/// A transformer only: it learns from amplitudes alone and cannot predict a
/// target, so it never passes the predictive-model capability check.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub params: ScalerParams,
    pub fitted: Option<ScalerFit>,
}

impl StandardScaler {
    pub const KIND: &'static str = "StandardScaler";

    pub fn from_params(params: &Map<String, JsonValue>) -> Result<Self, ModelError> {
        Ok(Self {
            params: parse_params(Self::KIND, params)?,
            fitted: None,
        })
    }

    pub fn from_state(state: JsonValue) -> Result<Self, ModelError> {
        restore_state(Self::KIND, state)
    }

    pub fn fit(&mut self, x: &[Vec<f64>]) -> Result<(), ModelError> {
        let width = check_features(x)?;
        let n = x.len() as f64;

        let mut mean = vec![0.0; width];
        for row in x {
            for (m, v) in mean.iter_mut().zip(row) {
                *m += v / n;
            }
        }

        let mut scale = vec![1.0; width];
        if self.params.with_std {
            for (j, s) in scale.iter_mut().enumerate() {
                let var = x.iter().map(|row| (row[j] - mean[j]).powi(2)).sum::<f64>() / n;
                // constant columns are left unscaled
                *s = if var > 0.0 { var.sqrt() } else { 1.0 };
            }
        }
        if !self.params.with_mean {
            mean.iter_mut().for_each(|m| *m = 0.0);
        }

        self.fitted = Some(ScalerFit { mean, scale });
        Ok(())
    }

    pub fn transform(&self, x: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, ModelError> {
        let fit = self
            .fitted
            .as_ref()
            .ok_or(ModelError::NotFitted(Self::KIND))?;
        check_width(x, fit.mean.len())?;
        Ok(x.iter()
            .map(|row| {
                row.iter()
                    .zip(fit.mean.iter().zip(&fit.scale))
                    .map(|(v, (m, s))| (v - m) / s)
                    .collect()
            })
            .collect())
    }

    pub fn fit_transform(&mut self, x: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, ModelError> {
        self.fit(x)?;
        self.transform(x)
    }
}

impl Component for StandardScaler {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn state(&self) -> Result<JsonValue, ModelError> {
        snapshot(Self::KIND, self)
    }
}

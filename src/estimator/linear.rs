use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use super::linalg::{column_means, least_squares, to_matrix};
use super::{
    Component, Estimator, ModelError, check_training_set, check_width, parse_params,
    restore_state, snapshot,
};

// ---------------------------------------------------------------------------
// Fitted linear model – shared by LinearRegression and Ridge
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearFit {
    pub coef: Vec<f64>,
    pub intercept: f64,
}

impl LinearFit {
    fn train(
        x: &[Vec<f64>],
        y: &[Option<f64>],
        alpha: f64,
        fit_intercept: bool,
    ) -> Result<Self, ModelError> {
        let (width, targets) = check_training_set(x, y)?;
        let mut features: Array2<f64> = to_matrix(x, width);
        let mut targets = Array1::from(targets);

        let (x_offset, y_offset) = if fit_intercept {
            let x_mean = column_means(&features);
            let y_mean = targets.mean().unwrap_or(0.0);
            features -= &x_mean;
            targets -= y_mean;
            (x_mean, y_mean)
        } else {
            (Array1::zeros(width), 0.0)
        };

        let coef = least_squares(&features, &targets, alpha);
        let intercept = y_offset - coef.dot(&x_offset);

        Ok(LinearFit {
            coef: coef.to_vec(),
            intercept,
        })
    }

    fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<f64>, ModelError> {
        check_width(x, self.coef.len())?;
        Ok(x.iter()
            .map(|row| {
                row.iter()
                    .zip(&self.coef)
                    .map(|(v, w)| v * w)
                    .sum::<f64>()
                    + self.intercept
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// LinearRegression
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LinearRegressionParams {
    pub fit_intercept: bool,
}

impl Default for LinearRegressionParams {
    fn default() -> Self {
        Self {
            fit_intercept: true,
        }
    }
}

/// Ordinary least squares (minimum-norm solution for rank-deficient inputs).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinearRegression {
    pub params: LinearRegressionParams,
    pub fitted: Option<LinearFit>,
}

impl LinearRegression {
    pub const KIND: &'static str = "LinearRegression";

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

impl Estimator for LinearRegression {
    fn fit(&mut self, x: &[Vec<f64>], y: &[Option<f64>]) -> Result<(), ModelError> {
        self.fitted = Some(LinearFit::train(x, y, 0.0, self.params.fit_intercept)?);
        Ok(())
    }

    fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<f64>, ModelError> {
        self.fitted
            .as_ref()
            .ok_or(ModelError::NotFitted(Self::KIND))?
            .predict(x)
    }
}

impl Component for LinearRegression {
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

// ---------------------------------------------------------------------------
// Ridge
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RidgeParams {
    pub alpha: f64,
    pub fit_intercept: bool,
}

impl Default for RidgeParams {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            fit_intercept: true,
        }
    }
}

/// Least squares with an L2 penalty on the coefficients.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ridge {
    pub params: RidgeParams,
    pub fitted: Option<LinearFit>,
}

impl Ridge {
    pub const KIND: &'static str = "Ridge";

    pub fn from_params(params: &Map<String, JsonValue>) -> Result<Self, ModelError> {
        let params: RidgeParams = parse_params(Self::KIND, params)?;
        if params.alpha.is_nan() || params.alpha < 0.0 {
            return Err(ModelError::InvalidParameter {
                model: Self::KIND,
                message: format!("alpha must be non-negative, got {}", params.alpha),
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
}

impl Estimator for Ridge {
    fn fit(&mut self, x: &[Vec<f64>], y: &[Option<f64>]) -> Result<(), ModelError> {
        self.fitted = Some(LinearFit::train(
            x,
            y,
            self.params.alpha,
            self.params.fit_intercept,
        )?);
        Ok(())
    }

    fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<f64>, ModelError> {
        self.fitted
            .as_ref()
            .ok_or(ModelError::NotFitted(Self::KIND))?
            .predict(x)
    }
}

impl Component for Ridge {
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

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn targets(values: &[f64]) -> Vec<Option<f64>> {
        values.iter().copied().map(Some).collect()
    }

    #[test]
    fn fits_collinear_spectra() {
        let x = vec![vec![1.0, 2.0], vec![2.0, 3.0], vec![3.0, 4.0]];
        let mut model = LinearRegression::default();
        model.fit(&x, &targets(&[1.0, 2.0, 3.0])).unwrap();

        let fitted = model.fitted.as_ref().unwrap();
        assert!(close(fitted.coef[0], 0.5));
        assert!(close(fitted.coef[1], 0.5));
        assert!(close(fitted.intercept, -0.5));

        let pred = model.predict(&[vec![4.0, 5.0]]).unwrap();
        assert!(close(pred[0], 4.0));
    }

    #[test]
    fn fits_without_intercept() {
        let x = vec![vec![1.0], vec![2.0], vec![4.0]];
        let mut model =
            LinearRegression::from_params(json!({"fit_intercept": false}).as_object().unwrap())
                .unwrap();
        model.fit(&x, &targets(&[3.0, 6.0, 12.0])).unwrap();
        let fitted = model.fitted.unwrap();
        assert!(close(fitted.coef[0], 3.0));
        assert_eq!(fitted.intercept, 0.0);
    }

    #[test]
    fn ridge_shrinks_coefficients() {
        let x = vec![vec![0.0], vec![1.0], vec![2.0], vec![3.0]];
        let y = targets(&[0.0, 2.0, 4.0, 6.0]);

        let mut ols = LinearRegression::default();
        ols.fit(&x, &y).unwrap();
        let mut ridge =
            Ridge::from_params(json!({"alpha": 5.0}).as_object().unwrap()).unwrap();
        ridge.fit(&x, &y).unwrap();

        let ols_coef = ols.fitted.unwrap().coef[0];
        let ridge_coef = ridge.fitted.unwrap().coef[0];
        assert!(close(ols_coef, 2.0));
        // sum of squares of centered x is 5, so the slope is 10 / (5 + 5)
        assert!(close(ridge_coef, 1.0));
    }

    #[test]
    fn rejects_unknown_and_invalid_parameters() {
        assert!(matches!(
            LinearRegression::from_params(json!({"n_jobs": 2}).as_object().unwrap()),
            Err(ModelError::Parameters { .. })
        ));
        assert!(matches!(
            Ridge::from_params(json!({"alpha": -1.0}).as_object().unwrap()),
            Err(ModelError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn predict_before_fit_fails() {
        let model = Ridge::default();
        assert!(matches!(
            model.predict(&[vec![1.0]]),
            Err(ModelError::NotFitted("Ridge"))
        ));
    }

    #[test]
    fn predict_checks_width() {
        let mut model = LinearRegression::default();
        model
            .fit(&[vec![1.0, 0.0], vec![0.0, 1.0]], &targets(&[1.0, 2.0]))
            .unwrap();
        assert!(matches!(
            model.predict(&[vec![1.0]]),
            Err(ModelError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn state_restores_identical_model() {
        let mut model = Ridge::default();
        model
            .fit(&[vec![1.0], vec![2.0], vec![3.0]], &targets(&[2.0, 4.0, 7.0]))
            .unwrap();
        let restored = Ridge::from_state(model.state().unwrap()).unwrap();
        assert_eq!(restored, model);
    }
}

use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, Array2, ArrayView1, Axis};

/// Ordinary least squares with intercept.
///
/// Solved on centred data through an SVD least-squares solve, so constant or
/// collinear columns yield the minimum-norm solution instead of failing the
/// fit.
#[derive(Debug, Clone, Default)]
pub struct LinearRegression {
    coefficients: Array1<f64>,
    intercept: f64,
}

/// Singular values below this fraction of the largest are treated as zero.
const RANK_TOLERANCE: f64 = 1e-10;

impl LinearRegression {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn coefficients(&self) -> &Array1<f64> {
        &self.coefficients
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<(), String> {
        if x.nrows() == 0 || x.nrows() != y.len() {
            return Err(format!(
                "linear fit needs matching non-empty inputs, got {} rows and {} labels",
                x.nrows(),
                y.len()
            ));
        }
        let x_mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| "linear fit has no rows".to_string())?;
        let y_mean = y.mean().unwrap_or(0.0);
        let x_centred = x - &x_mean;
        let y_centred = y - y_mean;

        let coefficients = if x.ncols() == 0 {
            Array1::zeros(0)
        } else {
            let a = DMatrix::from_fn(x.nrows(), x.ncols(), |i, j| x_centred[[i, j]]);
            let b = DVector::from_iterator(y_centred.len(), y_centred.iter().copied());
            let svd = a.svd(true, true);
            let eps = svd.singular_values.max() * RANK_TOLERANCE;
            let beta = svd
                .solve(&b, eps)
                .map_err(|err| format!("linear fit solve failed: {err}"))?;
            beta.iter().copied().collect::<Array1<f64>>()
        };
        if coefficients.iter().any(|c| !c.is_finite()) {
            return Err("linear fit produced non-finite coefficients".to_string());
        }
        self.intercept = y_mean - coefficients.dot(&x_mean);
        self.coefficients = coefficients;
        Ok(())
    }

    /// NaN when the row width differs from the fitted design.
    pub fn predict_one(&self, row: ArrayView1<f64>) -> f64 {
        if row.len() != self.coefficients.len() {
            return f64::NAN;
        }
        self.intercept + self.coefficients.dot(&row)
    }
}

#[cfg(test)]
mod tests {
    use super::LinearRegression;
    use ndarray::{aview1, Array1, Array2};

    #[test]
    fn recovers_exact_linear_relation() {
        let x = Array2::from_shape_fn((20, 2), |(i, j)| {
            if j == 0 {
                i as f64
            } else {
                ((i * 7) % 5) as f64
            }
        });
        let y: Array1<f64> = x
            .rows()
            .into_iter()
            .map(|r| 3.0 + 2.0 * r[0] - 0.5 * r[1])
            .collect();
        let mut model = LinearRegression::new();
        model.fit(&x, &y).expect("fit");
        assert!((model.coefficients()[0] - 2.0).abs() < 1e-9);
        assert!((model.coefficients()[1] + 0.5).abs() < 1e-9);
        assert!((model.intercept() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn constant_and_duplicate_columns_take_minimum_norm_weights() {
        let x = Array2::from_shape_fn((10, 3), |(i, j)| if j == 1 { 0.0 } else { i as f64 });
        let y = Array1::from_shape_fn(10, |i| i as f64 * 4.0);
        let mut model = LinearRegression::new();
        model.fit(&x, &y).expect("fit");
        let c = model.coefficients();
        assert!(c[1].abs() < 1e-9);
        assert!((c[0] - 2.0).abs() < 1e-9);
        assert!((c[2] - 2.0).abs() < 1e-9);
        assert!((model.predict_one(aview1(&[3.0, 0.0, 3.0])) - 12.0).abs() < 1e-9);
    }

    #[test]
    fn mismatched_inputs_are_rejected() {
        let mut model = LinearRegression::new();
        let err = model
            .fit(&Array2::zeros((3, 1)), &Array1::zeros(2))
            .expect_err("mismatch");
        assert!(err.contains("3 rows and 2 labels"));
    }
}

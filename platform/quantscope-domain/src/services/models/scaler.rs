use ndarray::{Array1, Array2, ArrayView2, Axis};

/// Per-feature standardisation fitted on the training slice only.
#[derive(Debug, Clone, PartialEq)]
pub struct StandardScaler {
    pub mean: Array1<f64>,
    pub scale: Array1<f64>,
}

impl StandardScaler {
    /// Population std per column; zero-variance columns get scale 1.
    pub fn fit(x: ArrayView2<f64>) -> Self {
        if x.nrows() == 0 {
            return Self {
                mean: Array1::zeros(x.ncols()),
                scale: Array1::ones(x.ncols()),
            };
        }
        let mean = x
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(x.ncols()));
        let scale = x
            .std_axis(Axis(0), 0.0)
            .mapv(|std| if std.is_finite() && std > f64::EPSILON { std } else { 1.0 });
        Self { mean, scale }
    }

    pub fn transform(&self, x: ArrayView2<f64>) -> Array2<f64> {
        (&x - &self.mean) / &self.scale
    }
}

#[cfg(test)]
mod tests {
    use super::StandardScaler;
    use ndarray::{array, Array2};

    #[test]
    fn constant_column_keeps_unit_scale() {
        let x = array![[1.0, 5.0], [3.0, 5.0]];
        let scaler = StandardScaler::fit(x.view());
        assert_eq!(scaler.mean, array![2.0, 5.0]);
        assert_eq!(scaler.scale, array![1.0, 1.0]);
        assert_eq!(scaler.transform(x.view()), array![[-1.0, 0.0], [1.0, 0.0]]);
    }

    #[test]
    fn empty_slice_is_identity() {
        let scaler = StandardScaler::fit(Array2::<f64>::zeros((0, 3)).view());
        assert_eq!(scaler.mean, array![0.0, 0.0, 0.0]);
        assert_eq!(scaler.scale, array![1.0, 1.0, 1.0]);
    }
}

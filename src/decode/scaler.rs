//! Per-channel standardization (zero mean, unit population variance).
//!
//! Matches `sklearn.preprocessing.StandardScaler`: a channel whose variance
//! is indistinguishable from rounding error, `var <= n·ε·var + (n·|mean|·ε)²`,
//! keeps scale 1, so after centering it is identically zero and carries no
//! signal. Such channels are reported. The test is relative, so sensors in
//! tesla (~1e-13) are not mistaken for constants.
use ndarray::{Array1, Array2, ArrayView2, Axis};

#[derive(Debug, Clone)]
pub struct StandardScaler {
    pub mean: Array1<f64>,
    pub scale: Array1<f64>,
    /// Channels with zero variance in the fitted data.
    pub degenerate: Vec<usize>,
}

impl StandardScaler {
    /// Fit on `x` (`[trials, channels]`).
    pub fn fit(x: ArrayView2<'_, f64>) -> Self {
        let n_ch = x.ncols();
        if x.nrows() == 0 {
            return Self {
                mean: Array1::zeros(n_ch),
                scale: Array1::ones(n_ch),
                degenerate: Vec::new(),
            };
        }
        let mean = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(n_ch));
        let var = x.var_axis(Axis(0), 0.0);

        let n = x.nrows() as f64;
        let mut degenerate = Vec::new();
        let scale = Array1::from_iter(var.iter().zip(mean.iter()).enumerate().map(|(c, (&v, &m))| {
            let bound = n * f64::EPSILON * v + (n * m.abs() * f64::EPSILON).powi(2);
            if v <= bound {
                degenerate.push(c);
                1.0
            } else {
                v.sqrt()
            }
        }));

        Self { mean, scale, degenerate }
    }

    pub fn transform(&self, x: ArrayView2<'_, f64>) -> Array2<f64> {
        let mut out = x.to_owned();
        for mut row in out.rows_mut() {
            row -= &self.mean;
            row /= &self.scale;
        }
        out
    }

    pub fn fit_transform(x: ArrayView2<'_, f64>) -> (Self, Array2<f64>) {
        let scaler = Self::fit(x);
        let out = scaler.transform(x);
        (scaler, out)
    }
}

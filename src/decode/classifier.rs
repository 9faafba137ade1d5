//! Classifiers used inside cross-validation.
//!
//! Labels reaching this module are already encoded as class indices
//! `0..n_classes` (ascending original code order).
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Fit on a training split and predict the test split.
pub trait Classifier: Sync {
    fn fit_predict(
        &self,
        x_train: ArrayView2<'_, f64>,
        y_train: &[usize],
        n_classes: usize,
        x_test: ArrayView2<'_, f64>,
    ) -> Vec<usize>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Penalty {
    #[default]
    L2,
    None,
}

/// Classifier choice and hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum ClassifierConfig {
    LogisticRegression(LogisticRegression),
    NearestCentroid,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self::LogisticRegression(LogisticRegression::default())
    }
}

impl ClassifierConfig {
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::LogisticRegression(lr) => lr.validate(),
            Self::NearestCentroid => Ok(()),
        }
    }
}

impl Classifier for ClassifierConfig {
    fn fit_predict(
        &self,
        x_train: ArrayView2<'_, f64>,
        y_train: &[usize],
        n_classes: usize,
        x_test: ArrayView2<'_, f64>,
    ) -> Vec<usize> {
        match self {
            Self::LogisticRegression(lr) => lr.fit_predict(x_train, y_train, n_classes, x_test),
            Self::NearestCentroid => NearestCentroid.fit_predict(x_train, y_train, n_classes, x_test),
        }
    }
}

// ── Logistic regression ───────────────────────────────────────────────────

/// Logistic regression fitted with a truncated Newton (Newton-CG) solver.
///
/// Objective: `Σ logloss + ||w||² / (2C)` for [`Penalty::L2`], plain
/// `Σ logloss` for [`Penalty::None`]. The intercept is never penalized.
/// More than two classes are handled one-vs-rest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogisticRegression {
    pub penalty: Penalty,
    /// Inverse regularization strength.
    pub c: f64,
    pub max_iter: usize,
    /// Stop once `max |gradient| <= tol`.
    pub tol: f64,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self {
            penalty: Penalty::L2,
            c: 1.0,
            max_iter: 100,
            tol: 1e-4,
        }
    }
}

/// Weights and intercept of one binary problem.
#[derive(Debug, Clone)]
pub struct BinaryModel {
    pub weights: Array1<f64>,
    pub intercept: f64,
}

impl BinaryModel {
    pub fn decision(&self, x: ArrayView2<'_, f64>) -> Array1<f64> {
        x.dot(&self.weights) + self.intercept
    }
}

impl LogisticRegression {
    pub fn validate(&self) -> Result<(), String> {
        if self.penalty == Penalty::L2 && !(self.c > 0.0 && self.c.is_finite()) {
            return Err(format!("logistic regression C must be positive, got {}", self.c));
        }
        if self.max_iter == 0 {
            return Err("logistic regression max_iter must be at least 1".into());
        }
        if !(self.tol > 0.0) {
            return Err(format!("logistic regression tol must be positive, got {}", self.tol));
        }
        Ok(())
    }

    fn l2_strength(&self) -> f64 {
        match self.penalty {
            Penalty::L2 => 1.0 / self.c,
            Penalty::None => 0.0,
        }
    }

    /// Fit a binary model on targets `t ∈ {0, 1}`.
    pub fn fit_binary(&self, x: ArrayView2<'_, f64>, t: ArrayView1<'_, f64>) -> BinaryModel {
        let problem = Objective {
            x,
            t,
            lambda: self.l2_strength(),
        };
        let n_feat = x.ncols();
        let mut beta = Array1::<f64>::zeros(n_feat + 1);
        let mut loss = problem.loss(beta.view());

        for _ in 0..self.max_iter {
            let (grad, s) = problem.gradient(beta.view());
            if grad.iter().fold(0.0_f64, |m, g| m.max(g.abs())) <= self.tol {
                break;
            }
            let dir = problem.newton_direction(&grad, &s);
            let slope = grad.dot(&dir);
            if !(slope < 0.0) {
                break;
            }

            // Armijo backtracking.
            let mut step = 1.0;
            let mut accepted = None;
            for _ in 0..30 {
                let cand = &beta + &(&dir * step);
                let cand_loss = problem.loss(cand.view());
                if cand_loss <= loss + 1e-4 * step * slope {
                    accepted = Some((cand, cand_loss));
                    break;
                }
                step *= 0.5;
            }
            let Some((next, next_loss)) = accepted else {
                break;
            };
            beta = next;
            loss = next_loss;
        }

        BinaryModel {
            weights: beta.slice(ndarray::s![..n_feat]).to_owned(),
            intercept: beta[n_feat],
        }
    }
}

impl Classifier for LogisticRegression {
    fn fit_predict(
        &self,
        x_train: ArrayView2<'_, f64>,
        y_train: &[usize],
        n_classes: usize,
        x_test: ArrayView2<'_, f64>,
    ) -> Vec<usize> {
        if let Some(only) = single_class(y_train) {
            return vec![only; x_test.nrows()];
        }
        if n_classes == 2 {
            let t = Array1::from_iter(y_train.iter().map(|&y| if y == 1 { 1.0 } else { 0.0 }));
            let model = self.fit_binary(x_train, t.view());
            return model
                .decision(x_test)
                .iter()
                .map(|&z| usize::from(z > 0.0))
                .collect();
        }

        let mut scores = Array2::<f64>::from_elem((x_test.nrows(), n_classes), f64::NEG_INFINITY);
        for k in 0..n_classes {
            if !y_train.contains(&k) {
                continue;
            }
            let t = Array1::from_iter(y_train.iter().map(|&y| if y == k { 1.0 } else { 0.0 }));
            let model = self.fit_binary(x_train, t.view());
            scores.column_mut(k).assign(&model.decision(x_test));
        }
        scores.rows().into_iter().map(|row| argmax(row)).collect()
    }
}

/// Penalized log-loss over `[x | 1] · beta`.
struct Objective<'a, 'b> {
    x: ArrayView2<'a, f64>,
    t: ArrayView1<'b, f64>,
    lambda: f64,
}

impl Objective<'_, '_> {
    fn n_feat(&self) -> usize {
        self.x.ncols()
    }

    fn linear(&self, beta: ArrayView1<'_, f64>) -> Array1<f64> {
        let n = self.n_feat();
        self.x.dot(&beta.slice(ndarray::s![..n])) + beta[n]
    }

    fn loss(&self, beta: ArrayView1<'_, f64>) -> f64 {
        let n = self.n_feat();
        let z = self.linear(beta);
        let data: f64 = z
            .iter()
            .zip(self.t.iter())
            .map(|(&z, &t)| softplus(z) - t * z)
            .sum();
        let w = beta.slice(ndarray::s![..n]);
        data + 0.5 * self.lambda * w.dot(&w)
    }

    /// Gradient and the IRLS weights `p (1 - p)`.
    fn gradient(&self, beta: ArrayView1<'_, f64>) -> (Array1<f64>, Array1<f64>) {
        let n = self.n_feat();
        let z = self.linear(beta);
        let p = z.mapv(sigmoid);
        let resid = &p - &self.t;
        let mut grad = Array1::<f64>::zeros(n + 1);
        let gw = self.x.t().dot(&resid) + &beta.slice(ndarray::s![..n]) * self.lambda;
        grad.slice_mut(ndarray::s![..n]).assign(&gw);
        grad[n] = resid.sum();
        let s = p.mapv(|v| v * (1.0 - v));
        (grad, s)
    }

    fn hess_vec(&self, s: &Array1<f64>, v: &Array1<f64>) -> Array1<f64> {
        let n = self.n_feat();
        let vw = v.slice(ndarray::s![..n]);
        let xv = self.x.dot(&vw) + v[n];
        let u = s * &xv;
        let mut out = Array1::<f64>::zeros(n + 1);
        let hw = self.x.t().dot(&u) + &vw * self.lambda;
        out.slice_mut(ndarray::s![..n]).assign(&hw);
        out[n] = u.sum();
        out
    }

    /// Approximate `-H⁻¹ g` with conjugate gradients, truncated on negative
    /// curvature or once the residual drops below `min(0.5, √‖g‖₁)·‖g‖₁`.
    fn newton_direction(&self, grad: &Array1<f64>, s: &Array1<f64>) -> Array1<f64> {
        let dim = grad.len();
        let g_norm1: f64 = grad.iter().map(|g| g.abs()).sum();
        let term = g_norm1.sqrt().min(0.5) * g_norm1;

        let mut d = Array1::<f64>::zeros(dim);
        let mut r = -grad;
        let mut p = r.clone();
        let mut rr = r.dot(&r);

        for i in 0..dim.min(200) {
            if r.iter().map(|v| v.abs()).sum::<f64>() <= term {
                break;
            }
            let hp = self.hess_vec(s, &p);
            let curv = p.dot(&hp);
            if curv <= 1e-12 * p.dot(&p) {
                if i == 0 {
                    return -grad;
                }
                break;
            }
            let alpha = rr / curv;
            d.scaled_add(alpha, &p);
            r.scaled_add(-alpha, &hp);
            let rr_next = r.dot(&r);
            p = &r + &(&p * (rr_next / rr));
            rr = rr_next;
        }
        d
    }
}

#[inline]
fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// `ln(1 + e^z)` without overflow.
#[inline]
fn softplus(z: f64) -> f64 {
    z.max(0.0) + (-z.abs()).exp().ln_1p()
}

// ── Nearest centroid ──────────────────────────────────────────────────────

/// Assigns each test trial to the class with the closest training mean.
#[derive(Debug, Clone, Copy, Default)]
pub struct NearestCentroid;

impl Classifier for NearestCentroid {
    fn fit_predict(
        &self,
        x_train: ArrayView2<'_, f64>,
        y_train: &[usize],
        n_classes: usize,
        x_test: ArrayView2<'_, f64>,
    ) -> Vec<usize> {
        let n_feat = x_train.ncols();
        let mut centroids = Array2::<f64>::zeros((n_classes, n_feat));
        let mut counts = vec![0usize; n_classes];
        for (row, &y) in x_train.axis_iter(Axis(0)).zip(y_train) {
            let mut c = centroids.row_mut(y);
            c += &row;
            counts[y] += 1;
        }
        for (k, &n) in counts.iter().enumerate() {
            if n > 0 {
                centroids.row_mut(k).mapv_inplace(|v| v / n as f64);
            }
        }

        x_test
            .axis_iter(Axis(0))
            .map(|row| {
                let neg_dist = Array1::from_iter((0..n_classes).map(|k| {
                    if counts[k] == 0 {
                        return f64::NEG_INFINITY;
                    }
                    let diff = &row - &centroids.row(k);
                    -diff.dot(&diff)
                }));
                argmax(neg_dist.view())
            })
            .collect()
    }
}

/// Index of the largest value; ties go to the lowest index.
fn argmax(v: ArrayView1<'_, f64>) -> usize {
    let mut best = 0;
    for (i, &x) in v.iter().enumerate() {
        if x > v[best] {
            best = i;
        }
    }
    best
}

fn single_class(y: &[usize]) -> Option<usize> {
    let first = *y.first()?;
    y.iter().all(|&v| v == first).then_some(first)
}

//! Removal of ICA components from sensor data.
//!
//! The decomposition itself is fitted offline; this module only applies a
//! stored solution. With unmixing `W` (`[K, C]`) and mixing `A` (`[C, K]`)
//! the sources are `S = W X` and excluding the set `E` gives
//! `X ← X − A[:, E] · W[E, :] · X`.
use anyhow::{bail, ensure, Result};
use ndarray::{Array2, Axis};

/// A fitted decomposition of `C` channels into `K` components.
#[derive(Debug, Clone, PartialEq)]
pub struct IcaSolution {
    unmixing: Array2<f64>,
    mixing: Array2<f64>,
}

impl IcaSolution {
    pub fn new(unmixing: Array2<f64>, mixing: Array2<f64>) -> Result<Self> {
        let (k, c) = unmixing.dim();
        ensure!(
            mixing.dim() == (c, k),
            "mixing matrix is {:?}, expected {:?} for unmixing {:?}",
            mixing.dim(),
            (c, k),
            (k, c)
        );
        Ok(Self { unmixing, mixing })
    }

    pub fn n_components(&self) -> usize {
        self.unmixing.nrows()
    }

    pub fn n_channels(&self) -> usize {
        self.unmixing.ncols()
    }

    pub fn unmixing(&self) -> &Array2<f64> {
        &self.unmixing
    }

    pub fn mixing(&self) -> &Array2<f64> {
        &self.mixing
    }

    /// Component time courses `W X` for `[C, T]` data.
    pub fn sources(&self, data: &Array2<f64>) -> Array2<f64> {
        self.unmixing.dot(data)
    }

    /// Remove the components `exclude` from `data` (`[C, T]`) in place.
    pub fn exclude(&self, data: &mut Array2<f64>, exclude: &[usize]) -> Result<()> {
        ensure!(
            data.nrows() == self.n_channels(),
            "solution was fitted on {} channels, data has {}",
            self.n_channels(),
            data.nrows()
        );
        if let Some(&bad) = exclude.iter().find(|&&k| k >= self.n_components()) {
            bail!("component {bad} out of range, solution has {}", self.n_components());
        }
        if exclude.is_empty() {
            return Ok(());
        }
        let w_e = self.unmixing.select(Axis(0), exclude);
        let a_e = self.mixing.select(Axis(1), exclude);
        let removed = a_e.dot(&w_e.dot(&*data));
        *data -= &removed;
        Ok(())
    }
}

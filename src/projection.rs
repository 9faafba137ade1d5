//! Signal-space projection (SSP).
//!
//! The projector removing the span of the vectors `v₁ … v_p` is
//! `P = I − U Uᵀ` where `U` is an orthonormal basis of that span, taken from
//! the SVD of the unit-normalised vectors. Singular values below 1 % of the
//! largest are treated as linearly dependent and dropped, as in
//! `mne.io.proj.make_projector`.
use anyhow::{Context, Result};
use nalgebra::DMatrix;
use ndarray::{Array2, ArrayView2, Axis};

/// Build the `[C, C]` projector for `vectors` (`[P, C]`).
///
/// Returns the projector and its rank (number of removed directions).
pub fn make_projector(vectors: ArrayView2<'_, f64>) -> Result<(Array2<f64>, usize)> {
    let (n_proj, n_ch) = vectors.dim();
    let usable: Vec<(usize, f64)> = (0..n_proj)
        .map(|p| (p, vectors.row(p).dot(&vectors.row(p)).sqrt()))
        .filter(|&(_, norm)| norm > 0.0)
        .collect();

    let mut proj = Array2::<f64>::eye(n_ch);
    if usable.is_empty() {
        return Ok((proj, 0));
    }

    let m = DMatrix::from_fn(n_ch, usable.len(), |c, j| {
        let (p, norm) = usable[j];
        vectors[[p, c]] / norm
    });
    let svd = m.svd(true, false);
    let u = svd.u.context("SVD of projection vectors did not converge")?;
    let s_max = svd.singular_values.max();
    let keep: Vec<usize> = svd
        .singular_values
        .iter()
        .enumerate()
        .filter(|&(_, &s)| s / s_max > 1e-2)
        .map(|(i, _)| i)
        .collect();

    for &k in &keep {
        for i in 0..n_ch {
            for j in 0..n_ch {
                proj[[i, j]] -= u[(i, k)] * u[(j, k)];
            }
        }
    }
    Ok((proj, keep.len()))
}

/// Apply the projectors in `vectors` to the rows `rows` of `data`.
///
/// Only the columns of `vectors` that belong to `rows` are used.
pub fn apply_projectors(data: &mut Array2<f64>, vectors: ArrayView2<'_, f64>, rows: &[usize]) -> Result<usize> {
    let sub_vectors = vectors.select(Axis(1), rows);
    let (proj, rank) = make_projector(sub_vectors.view())?;
    if rank == 0 {
        return Ok(0);
    }
    let projected = proj.dot(&data.select(Axis(0), rows));
    for (k, &r) in rows.iter().enumerate() {
        data.row_mut(r).assign(&projected.row(k));
    }
    Ok(rank)
}

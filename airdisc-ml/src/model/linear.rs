//! Ordinary least squares with an intercept.
//!
//! Solved by modified Gram-Schmidt on the centered design matrix. Columns
//! that are (numerically) linear combinations of earlier ones are dropped
//! and get a zero coefficient, which keeps one-hot blocks solvable.

use crate::error::MlError;
use ndarray::{Array1, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Relative residual norm below which a column counts as dependent.
const RANK_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

impl LinearModel {
    pub fn fit(x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<Self, MlError> {
        let (n, p) = x.dim();
        if n == 0 || n != y.len() {
            return Err(MlError::validation(format!(
                "design matrix has {n} rows but target has {} values",
                y.len()
            )));
        }

        let x_mean = x
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(p));
        let y_mean = y.sum() / n as f64;
        let xc = &x - &x_mean;
        let yc = &y - y_mean;

        // q: orthonormal basis; r[k]: column k of R (length k + 1)
        let mut q: Vec<Array1<f64>> = Vec::new();
        let mut r: Vec<Vec<f64>> = Vec::new();
        let mut kept: Vec<usize> = Vec::new();

        for j in 0..p {
            let col = xc.column(j);
            let norm0 = col.dot(&col).sqrt();
            if norm0 == 0.0 {
                continue;
            }
            let mut v = col.to_owned();
            let mut proj = vec![0.0; q.len()];
            // two passes for orthogonality
            for _ in 0..2 {
                for (i, qi) in q.iter().enumerate() {
                    let c = qi.dot(&v);
                    v.scaled_add(-c, qi);
                    proj[i] += c;
                }
            }
            let norm = v.dot(&v).sqrt();
            if norm <= RANK_TOLERANCE * norm0 {
                continue;
            }
            v /= norm;
            proj.push(norm);
            q.push(v);
            r.push(proj);
            kept.push(j);
        }

        // back-substitution on R b = Q^T y
        let qty: Vec<f64> = q.iter().map(|qi| qi.dot(&yc)).collect();
        let m = q.len();
        let mut b = vec![0.0; m];
        for k in (0..m).rev() {
            let mut s = qty[k];
            for l in (k + 1)..m {
                s -= r[l][k] * b[l];
            }
            b[k] = s / r[k][k];
        }

        let mut coefficients = vec![0.0; p];
        for (slot, &j) in kept.iter().enumerate() {
            coefficients[j] = b[slot];
        }
        let intercept = y_mean
            - coefficients
                .iter()
                .zip(x_mean.iter())
                .map(|(c, m)| c * m)
                .sum::<f64>();

        Ok(Self {
            coefficients,
            intercept,
        })
    }

    pub fn predict(&self, x: ArrayView2<'_, f64>) -> Array1<f64> {
        let coef = ArrayView1::from(self.coefficients.as_slice());
        x.dot(&coef) + self.intercept
    }

    pub fn n_features(&self) -> usize {
        self.coefficients.len()
    }

    pub(crate) fn check(&self, n_features: usize) -> Result<(), String> {
        if self.coefficients.len() != n_features {
            return Err(format!(
                "linear model has {} coefficients for {n_features} features",
                self.coefficients.len()
            ));
        }
        if !self.intercept.is_finite() || self.coefficients.iter().any(|c| !c.is_finite()) {
            return Err("linear model has non-finite parameters".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, array};

    #[test]
    fn test_recovers_exact_linear_relation() {
        let x = array![[1.0, 2.0], [2.0, 1.0], [3.0, 5.0], [4.0, 3.0], [5.0, 0.0]];
        let y: Array1<f64> = x.rows().into_iter().map(|r| 3.0 + 2.0 * r[0] - 0.5 * r[1]).collect();
        let model = LinearModel::fit(x.view(), y.view()).unwrap();
        assert!((model.coefficients[0] - 2.0).abs() < 1e-9);
        assert!((model.coefficients[1] + 0.5).abs() < 1e-9);
        assert!((model.intercept - 3.0).abs() < 1e-9);
        let preds = model.predict(x.view());
        for (p, t) in preds.iter().zip(y.iter()) {
            assert!((p - t).abs() < 1e-9);
        }
    }

    #[test]
    fn test_rank_deficient_one_hot_block() {
        // two one-hot columns always summing to one are collinear with the intercept
        let x = array![[1.0, 0.0], [0.0, 1.0], [1.0, 0.0], [0.0, 1.0]];
        let y = array![10.0, 20.0, 10.0, 20.0];
        let model = LinearModel::fit(x.view(), y.view()).unwrap();
        let preds = model.predict(x.view());
        for (p, t) in preds.iter().zip(y.iter()) {
            assert!((p - t).abs() < 1e-9);
        }
        assert!(model.check(2).is_ok());
    }

    #[test]
    fn test_single_row_predicts_target() {
        let x = Array2::from_elem((1, 3), 5.0);
        let y = array![7.5];
        let model = LinearModel::fit(x.view(), y.view()).unwrap();
        assert_eq!(model.coefficients, vec![0.0, 0.0, 0.0]);
        assert_eq!(model.intercept, 7.5);
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let x = Array2::<f64>::zeros((3, 1));
        let y = array![1.0];
        assert!(LinearModel::fit(x.view(), y.view()).is_err());
    }

    #[test]
    fn test_check_detects_width_mismatch() {
        let model = LinearModel {
            coefficients: vec![1.0],
            intercept: 0.0,
        };
        assert!(model.check(2).is_err());
    }
}

//! Random forest regression: bootstrap-aggregated CART trees with
//! squared-error splits. All randomness comes from a single seeded RNG.

use crate::error::MlError;
use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Growth limits shared by every tree in a forest.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TreeParams {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    Leaf {
        value: f64,
    },
    /// Rows with `x[feature] <= threshold` go left.
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// A regression tree stored as a flat node list; node 0 is the root and
/// children always follow their parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    pub nodes: Vec<Node>,
}

impl RegressionTree {
    fn fit(x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>, rows: Vec<usize>, params: &TreeParams) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.grow(x, y, rows, 0, params);
        tree
    }

    fn grow(
        &mut self,
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
        rows: Vec<usize>,
        depth: usize,
        params: &TreeParams,
    ) -> usize {
        let id = self.nodes.len();
        let value = rows.iter().map(|&i| y[i]).sum::<f64>() / rows.len() as f64;
        self.nodes.push(Node::Leaf { value });

        let depth_ok = params.max_depth.is_none_or(|d| depth < d);
        if !depth_ok || rows.len() < params.min_samples_split {
            return id;
        }
        let Some((feature, threshold)) = best_split(x, y, &rows, params.min_samples_leaf) else {
            return id;
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) =
            rows.into_iter().partition(|&i| x[[i, feature]] <= threshold);
        let left = self.grow(x, y, left_rows, depth + 1, params);
        let right = self.grow(x, y, right_rows, depth + 1, params);
        self.nodes[id] = Node::Split {
            feature,
            threshold,
            left,
            right,
        };
        id
    }

    pub fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        let mut id = 0;
        loop {
            match &self.nodes[id] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    id = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    fn check(&self, n_features: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        for (id, node) in self.nodes.iter().enumerate() {
            match node {
                Node::Leaf { value } if !value.is_finite() => {
                    return Err(format!("leaf {id} has a non-finite value"));
                }
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let n = self.nodes.len();
                    if *feature >= n_features || !threshold.is_finite() {
                        return Err(format!("split {id} is out of range"));
                    }
                    if *left <= id || *right <= id || *left >= n || *right >= n {
                        return Err(format!("split {id} has invalid children"));
                    }
                }
                Node::Leaf { .. } => {}
            }
        }
        Ok(())
    }
}

/// Best squared-error split over all features, or `None` when no split
/// reduces the error while honoring the leaf size.
fn best_split(
    x: ArrayView2<'_, f64>,
    y: ArrayView1<'_, f64>,
    rows: &[usize],
    min_leaf: usize,
) -> Option<(usize, f64)> {
    let n = rows.len();
    let total: f64 = rows.iter().map(|&i| y[i]).sum();
    // Minimizing SSE is maximizing sum_l^2 / n_l + sum_r^2 / n_r.
    let parent_score = total * total / n as f64;
    let mut best: Option<(f64, usize, f64)> = None;

    let mut order = rows.to_vec();
    for feature in 0..x.ncols() {
        order.sort_by(|&a, &b| x[[a, feature]].total_cmp(&x[[b, feature]]));
        let mut left_sum = 0.0;
        for k in 1..n {
            left_sum += y[order[k - 1]];
            if k < min_leaf || n - k < min_leaf {
                continue;
            }
            let lo = x[[order[k - 1], feature]];
            let hi = x[[order[k], feature]];
            if lo >= hi {
                continue;
            }
            let right_sum = total - left_sum;
            let score = left_sum * left_sum / k as f64 + right_sum * right_sum / (n - k) as f64;
            if best.is_none_or(|(s, _, _)| score > s) {
                let mid = lo + (hi - lo) / 2.0;
                let threshold = if mid < hi { mid } else { lo };
                best = Some((score, feature, threshold));
            }
        }
    }

    best.filter(|(score, _, _)| *score > parent_score + 1e-12 * parent_score.abs().max(1.0))
        .map(|(_, feature, threshold)| (feature, threshold))
}

/// A fitted random forest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestModel {
    pub n_features: usize,
    pub trees: Vec<RegressionTree>,
}

impl ForestModel {
    pub fn fit(
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
        n_estimators: usize,
        params: TreeParams,
        seed: u64,
    ) -> Result<Self, MlError> {
        let n = x.nrows();
        if n == 0 || n != y.len() {
            return Err(MlError::validation(format!(
                "design matrix has {n} rows but target has {} values",
                y.len()
            )));
        }
        if n_estimators == 0 {
            return Err(MlError::validation("n_estimators must be at least 1"));
        }
        if params.min_samples_split < 2 || params.min_samples_leaf < 1 {
            return Err(MlError::validation(
                "min_samples_split must be >= 2 and min_samples_leaf >= 1",
            ));
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let trees = (0..n_estimators)
            .map(|_| {
                let sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                RegressionTree::fit(x, y, sample, &params)
            })
            .collect();

        Ok(Self {
            n_features: x.ncols(),
            trees,
        })
    }

    pub fn predict(&self, x: ArrayView2<'_, f64>) -> Array1<f64> {
        let k = self.trees.len() as f64;
        x.rows()
            .into_iter()
            .map(|row| self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>() / k)
            .collect()
    }

    pub(crate) fn check(&self, n_features: usize) -> Result<(), String> {
        if self.n_features != n_features {
            return Err(format!(
                "forest expects {} features, preprocessor produces {n_features}",
                self.n_features
            ));
        }
        if self.trees.is_empty() {
            return Err("forest has no trees".to_string());
        }
        self.trees.iter().try_for_each(|t| t.check(n_features))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, array};

    fn step_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((40, 2), |(i, j)| if j == 0 { i as f64 } else { (i % 3) as f64 });
        let y = x.column(0).mapv(|v| if v < 20.0 { 1.0 } else { 5.0 });
        (x, y)
    }

    #[test]
    fn test_single_tree_learns_step() {
        let (x, y) = step_data();
        let rows: Vec<usize> = (0..x.nrows()).collect();
        let tree = RegressionTree::fit(x.view(), y.view(), rows, &TreeParams::default());
        assert_eq!(tree.predict_row(array![3.0, 0.0].view()), 1.0);
        assert_eq!(tree.predict_row(array![30.0, 0.0].view()), 5.0);
        assert!(tree.check(2).is_ok());
    }

    #[test]
    fn test_max_depth_zero_is_mean() {
        let (x, y) = step_data();
        let rows: Vec<usize> = (0..x.nrows()).collect();
        let params = TreeParams {
            max_depth: Some(0),
            ..TreeParams::default()
        };
        let tree = RegressionTree::fit(x.view(), y.view(), rows, &params);
        assert_eq!(tree.nodes.len(), 1);
        assert_eq!(tree.predict_row(array![0.0, 0.0].view()), 3.0);
    }

    #[test]
    fn test_forest_is_deterministic_for_seed() {
        let (x, y) = step_data();
        let a = ForestModel::fit(x.view(), y.view(), 10, TreeParams::default(), 42).unwrap();
        let b = ForestModel::fit(x.view(), y.view(), 10, TreeParams::default(), 42).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.predict(x.view()), b.predict(x.view()));
    }

    #[test]
    fn test_forest_fits_step_closely() {
        let (x, y) = step_data();
        let forest = ForestModel::fit(x.view(), y.view(), 25, TreeParams::default(), 42).unwrap();
        let preds = forest.predict(x.view());
        let mae = preds
            .iter()
            .zip(y.iter())
            .map(|(p, t)| (p - t).abs())
            .sum::<f64>()
            / y.len() as f64;
        assert!(mae < 0.5, "mae {mae}");
    }

    #[test]
    fn test_invalid_params_rejected() {
        let (x, y) = step_data();
        assert!(ForestModel::fit(x.view(), y.view(), 0, TreeParams::default(), 42).is_err());
        let params = TreeParams {
            min_samples_split: 1,
            ..TreeParams::default()
        };
        assert!(ForestModel::fit(x.view(), y.view(), 5, params, 42).is_err());
    }

    #[test]
    fn test_check_rejects_cycles() {
        let tree = RegressionTree {
            nodes: vec![Node::Split {
                feature: 0,
                threshold: 1.0,
                left: 0,
                right: 0,
            }],
        };
        assert!(tree.check(1).is_err());
    }
}

//! Column preprocessing learned at fit time.
//!
//! Numeric features: median imputation, then standard scaling.
//! Categorical features: most-frequent imputation, then one-hot encoding
//! over the sorted training categories. Unknown categories encode as zeros.

use crate::data::table::{ColumnData, Table};
use crate::error::MlError;
use crate::features::{CATEGORICAL_FEATURES, NUMERIC_FEATURES};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fill value for a categorical column that had no observed values at fit time.
pub const MISSING_CATEGORY: &str = "__missing__";

/// Learned imputation and scaling for one numeric column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericScaler {
    pub column: String,
    pub median: f64,
    pub mean: f64,
    pub scale: f64,
}

impl NumericScaler {
    fn fit(column: &str, cells: &[Option<f64>]) -> Self {
        let median = median(cells).unwrap_or(0.0);
        let imputed: Vec<f64> = cells.iter().map(|c| c.unwrap_or(median)).collect();
        let n = imputed.len() as f64;
        let mean = imputed.iter().sum::<f64>() / n;
        let var = imputed.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std = var.sqrt();
        let scale = if std < 10.0 * f64::EPSILON * mean.abs().max(1.0) {
            1.0
        } else {
            std
        };
        Self {
            column: column.to_string(),
            median,
            mean,
            scale,
        }
    }

    fn apply(&self, cell: Option<f64>) -> f64 {
        (cell.unwrap_or(self.median) - self.mean) / self.scale
    }
}

/// Learned imputation and one-hot vocabulary for one categorical column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryEncoder {
    pub column: String,
    pub mode: String,
    /// Sorted, unique.
    pub categories: Vec<String>,
}

impl CategoryEncoder {
    fn fit(column: &str, cells: &[Option<String>]) -> Self {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for cell in cells.iter().flatten() {
            *counts.entry(cell.as_str()).or_default() += 1;
        }
        // Ascending iteration with a strict comparison keeps the smallest
        // category among equally frequent ones.
        let mut mode: Option<(&str, usize)> = None;
        for (value, count) in &counts {
            if mode.is_none_or(|(_, best)| *count > best) {
                mode = Some((*value, *count));
            }
        }
        let mode = mode
            .map(|(v, _)| v.to_string())
            .unwrap_or_else(|| MISSING_CATEGORY.to_string());

        let mut categories: Vec<String> = counts.keys().map(|k| k.to_string()).collect();
        if let Err(pos) = categories.binary_search(&mode) {
            categories.insert(pos, mode.clone());
        }
        Self {
            column: column.to_string(),
            mode,
            categories,
        }
    }

    fn position(&self, cell: Option<&str>) -> Option<usize> {
        let value = cell.unwrap_or(self.mode.as_str());
        self.categories
            .binary_search_by(|c| c.as_str().cmp(value))
            .ok()
    }
}

/// The fitted column transformer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preprocessor {
    pub numeric: Vec<NumericScaler>,
    pub categorical: Vec<CategoryEncoder>,
}

impl Preprocessor {
    /// Learn fill values, scaling and vocabularies from `x`. Every canonical
    /// column must be present; other columns are ignored.
    pub fn fit(x: &Table) -> Result<Self, MlError> {
        for name in NUMERIC_FEATURES.iter().chain(CATEGORICAL_FEATURES.iter()) {
            if !x.contains(name) {
                return Err(MlError::validation(format!(
                    "X is missing required column '{name}'"
                )));
            }
        }

        let numeric = NUMERIC_FEATURES
            .iter()
            .map(|name| Ok(NumericScaler::fit(name, &numeric_cells(x, name)?)))
            .collect::<Result<Vec<_>, MlError>>()?;
        let categorical = CATEGORICAL_FEATURES
            .iter()
            .map(|name| CategoryEncoder::fit(name, &text_cells(x, name)))
            .collect();

        Ok(Self {
            numeric,
            categorical,
        })
    }

    /// Width of the transformed design matrix.
    pub fn n_outputs(&self) -> usize {
        self.numeric.len()
            + self
                .categorical
                .iter()
                .map(|c| c.categories.len())
                .sum::<usize>()
    }

    /// Names of the transformed columns, e.g. `distance_km` or `origin=NYC`.
    pub fn output_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.numeric.iter().map(|n| n.column.clone()).collect();
        for enc in &self.categorical {
            for cat in &enc.categories {
                names.push(format!("{}={cat}", enc.column));
            }
        }
        names
    }

    /// Encode `x` into a dense design matrix. Absent columns are treated as
    /// entirely missing and take the learned fill values.
    pub fn transform(&self, x: &Table) -> Result<Array2<f64>, MlError> {
        let n = x.n_rows();
        let mut out = Array2::<f64>::zeros((n, self.n_outputs()));

        for (j, scaler) in self.numeric.iter().enumerate() {
            let cells = if x.contains(&scaler.column) {
                numeric_cells(x, &scaler.column)?
            } else {
                vec![None; n]
            };
            for (i, cell) in cells.into_iter().enumerate() {
                out[[i, j]] = scaler.apply(cell);
            }
        }

        let mut offset = self.numeric.len();
        for enc in &self.categorical {
            let cells = text_cells(x, &enc.column);
            for (i, cell) in cells.iter().enumerate() {
                if let Some(pos) = enc.position(cell.as_deref()) {
                    out[[i, offset + pos]] = 1.0;
                }
            }
            offset += enc.categories.len();
        }

        Ok(out)
    }

    /// Structural checks for a preprocessor restored from disk.
    pub(crate) fn check(&self) -> Result<(), String> {
        let numeric: Vec<&str> = self.numeric.iter().map(|s| s.column.as_str()).collect();
        if numeric != NUMERIC_FEATURES {
            return Err(format!("unexpected numeric columns {numeric:?}"));
        }
        let categorical: Vec<&str> = self.categorical.iter().map(|c| c.column.as_str()).collect();
        if categorical != CATEGORICAL_FEATURES {
            return Err(format!("unexpected categorical columns {categorical:?}"));
        }
        for s in &self.numeric {
            if !(s.median.is_finite() && s.mean.is_finite() && s.scale.is_finite() && s.scale > 0.0)
            {
                return Err(format!("invalid scaling for '{}'", s.column));
            }
        }
        for c in &self.categorical {
            if c.categories.windows(2).any(|w| w[0] >= w[1]) {
                return Err(format!("categories for '{}' are not sorted and unique", c.column));
            }
            if c.categories.binary_search(&c.mode).is_err() {
                return Err(format!("fill value for '{}' is not a known category", c.column));
            }
        }
        Ok(())
    }
}

/// Numeric cells of a column; NaN counts as missing.
fn numeric_cells(x: &Table, name: &str) -> Result<Vec<Option<f64>>, MlError> {
    let Some(col) = x.column(name) else {
        return Ok(vec![None; x.n_rows()]);
    };
    if let ColumnData::Text(_) = col.data {
        return Err(MlError::validation(format!("column '{name}' must be numeric")));
    }
    let cells = col.data.as_f64().unwrap_or_default();
    cells
        .into_iter()
        .enumerate()
        .map(|(i, c)| match c {
            Some(v) if v.is_nan() => Ok(None),
            Some(v) if v.is_infinite() => Err(MlError::validation(format!(
                "column '{name}' holds an infinite value at row {i}"
            ))),
            other => Ok(other),
        })
        .collect()
}

fn text_cells(x: &Table, name: &str) -> Vec<Option<String>> {
    x.column(name)
        .map(|c| c.data.as_text())
        .unwrap_or_else(|| vec![None; x.n_rows()])
}

fn median(cells: &[Option<f64>]) -> Option<f64> {
    let mut values: Vec<f64> = cells.iter().flatten().copied().collect();
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::table::Column;

    fn frame() -> Table {
        Table::new(vec![
            Column::float("distance_km", vec![Some(1000.0), None, Some(3000.0), Some(2000.0)]),
            Column::int("history_trips", vec![Some(1), Some(1), Some(1), Some(1)]),
            Column::float("avg_spend", vec![Some(10.0), Some(20.0), Some(30.0), Some(40.0)]),
            Column::text(
                "route_id",
                vec![Some("R2".into()), Some("R1".into()), None, Some("R2".into())],
            ),
            Column::from_strs("origin", &["NYC", "LAX", "LAX", "NYC"]),
            Column::from_strs("destination", &["LON", "LON", "LON", "LON"]),
        ])
        .unwrap()
    }

    #[test]
    fn test_median_even_and_odd() {
        assert_eq!(median(&[Some(3.0), Some(1.0), Some(2.0)]), Some(2.0));
        assert_eq!(median(&[Some(4.0), None, Some(1.0)]), Some(2.5));
        assert_eq!(median(&[None]), None);
    }

    #[test]
    fn test_fit_learns_median_and_scale() {
        let prep = Preprocessor::fit(&frame()).unwrap();
        let dist = &prep.numeric[0];
        assert_eq!(dist.median, 2000.0);
        assert_eq!(dist.mean, 2000.0);
        assert!(dist.scale > 0.0);
        // constant column keeps unit scale
        assert_eq!(prep.numeric[1].scale, 1.0);
    }

    #[test]
    fn test_mode_ties_pick_smallest() {
        let prep = Preprocessor::fit(&frame()).unwrap();
        assert_eq!(prep.categorical[0].mode, "R2");
        assert_eq!(prep.categorical[1].mode, "LAX");
        assert_eq!(prep.categorical[0].categories, vec!["R1", "R2"]);
    }

    #[test]
    fn test_transform_shape_and_one_hot() {
        let x = frame();
        let prep = Preprocessor::fit(&x).unwrap();
        let m = prep.transform(&x).unwrap();
        assert_eq!(m.dim(), (4, prep.n_outputs()));
        assert_eq!(prep.n_outputs(), 3 + 2 + 2 + 1);
        // missing route imputed to R2 (column 4)
        assert_eq!(m[[2, 3]], 0.0);
        assert_eq!(m[[2, 4]], 1.0);
        // each categorical block sums to one per row
        for row in m.rows() {
            assert_eq!(row[3] + row[4], 1.0);
            assert_eq!(row[5] + row[6], 1.0);
        }
    }

    #[test]
    fn test_transform_unknown_category_is_all_zero() {
        let prep = Preprocessor::fit(&frame()).unwrap();
        let x = Table::new(vec![Column::from_strs("route_id", &["R9"])]).unwrap();
        let m = prep.transform(&x).unwrap();
        assert_eq!(m[[0, 3]], 0.0);
        assert_eq!(m[[0, 4]], 0.0);
        // absent numeric column imputes the median, which scales to near zero
        assert!((m[[0, 0]] - 0.0).abs() < 1e-12);
    }

    #[test]
    fn test_fit_requires_all_columns() {
        let x = Table::new(vec![Column::from_f64("distance_km", &[3000.0])]).unwrap();
        let err = Preprocessor::fit(&x).unwrap_err();
        assert!(matches!(err, MlError::Validation(_)));
        assert!(err.to_string().contains("history_trips"));
    }

    #[test]
    fn test_fit_rejects_text_in_numeric_column() {
        let mut cols: Vec<Column> = frame().columns().to_vec();
        cols[0] = Column::from_strs("distance_km", &["a", "b", "c", "d"]);
        let x = Table::new(cols).unwrap();
        assert!(matches!(Preprocessor::fit(&x), Err(MlError::Validation(_))));
    }

    #[test]
    fn test_output_names() {
        let prep = Preprocessor::fit(&frame()).unwrap();
        let names = prep.output_names();
        assert_eq!(names[0], "distance_km");
        assert_eq!(names[3], "route_id=R1");
        assert_eq!(names.len(), prep.n_outputs());
    }

    #[test]
    fn test_check_accepts_fitted() {
        let prep = Preprocessor::fit(&frame()).unwrap();
        assert!(prep.check().is_ok());
        let mut broken = prep.clone();
        broken.numeric[0].scale = 0.0;
        assert!(broken.check().is_err());
    }
}

//! Typed in-memory table: an ordered set of named columns plus a row index.
//!
//! Every column holds exactly one cell per index label; cells may be missing.
//! Tables are built from typed columns, from JSON record arrays, or from SQL
//! result batches, and are never mutated in place.

use crate::data::schema::{ColumnSchema, ColumnType, infer_column_type};
use crate::error::MlError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// A row label. Tables default to positional integer labels.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Label {
    Int(i64),
    Str(String),
}

impl From<i64> for Label {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<usize> for Label {
    fn from(v: usize) -> Self {
        Self::Int(v as i64)
    }
}

impl From<&str> for Label {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for Label {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Str(v) => f.write_str(v),
        }
    }
}

/// Positional labels `0..n`.
pub fn range_index(n: usize) -> Vec<Label> {
    (0..n).map(Label::from).collect()
}

/// Cell storage for one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "values", rename_all = "snake_case")]
pub enum ColumnData {
    Float(Vec<Option<f64>>),
    Int(Vec<Option<i64>>),
    Text(Vec<Option<String>>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            Self::Float(v) => v.len(),
            Self::Int(v) => v.len(),
            Self::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dtype(&self) -> ColumnType {
        match self {
            Self::Float(_) => ColumnType::Float,
            Self::Int(_) => ColumnType::Integer,
            Self::Text(_) => ColumnType::Text,
        }
    }

    pub fn null_count(&self) -> usize {
        match self {
            Self::Float(v) => v.iter().filter(|c| c.is_none()).count(),
            Self::Int(v) => v.iter().filter(|c| c.is_none()).count(),
            Self::Text(v) => v.iter().filter(|c| c.is_none()).count(),
        }
    }

    /// Float view. Integers widen; text has no float view.
    pub fn as_f64(&self) -> Option<Vec<Option<f64>>> {
        match self {
            Self::Float(v) => Some(v.clone()),
            Self::Int(v) => Some(v.iter().map(|c| c.map(|n| n as f64)).collect()),
            Self::Text(_) => None,
        }
    }

    /// Integer view. Integral floats within `i64` range narrow; fractional or
    /// out-of-range floats and text have none.
    pub fn as_i64(&self) -> Option<Vec<Option<i64>>> {
        // 2^63, exactly representable; i64 covers [-2^63, 2^63).
        const LIMIT: f64 = 9_223_372_036_854_775_808.0;
        match self {
            Self::Int(v) => Some(v.clone()),
            Self::Float(v) => v
                .iter()
                .map(|c| match c {
                    None => Some(None),
                    Some(f) if f.fract() == 0.0 && (-LIMIT..LIMIT).contains(f) => {
                        Some(Some(*f as i64))
                    }
                    Some(_) => None,
                })
                .collect(),
            Self::Text(_) => None,
        }
    }

    /// Text view. Numbers render with their natural formatting.
    pub fn as_text(&self) -> Vec<Option<String>> {
        match self {
            Self::Text(v) => v.clone(),
            Self::Int(v) => v.iter().map(|c| c.map(|n| n.to_string())).collect(),
            Self::Float(v) => v.iter().map(|c| c.map(|n| n.to_string())).collect(),
        }
    }

    fn take(&self, positions: &[usize]) -> Self {
        match self {
            Self::Float(v) => Self::Float(positions.iter().map(|&i| v[i]).collect()),
            Self::Int(v) => Self::Int(positions.iter().map(|&i| v[i]).collect()),
            Self::Text(v) => Self::Text(positions.iter().map(|&i| v[i].clone()).collect()),
        }
    }

    fn cell_json(&self, row: usize) -> serde_json::Value {
        match self {
            Self::Float(v) => v[row]
                .and_then(serde_json::Number::from_f64)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Self::Int(v) => v[row].map(serde_json::Value::from).unwrap_or_default(),
            Self::Text(v) => v[row]
                .clone()
                .map(serde_json::Value::String)
                .unwrap_or_default(),
        }
    }
}

/// A named column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    pub fn new(name: impl Into<String>, data: ColumnData) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    pub fn float(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self::new(name, ColumnData::Float(values))
    }

    pub fn int(name: impl Into<String>, values: Vec<Option<i64>>) -> Self {
        Self::new(name, ColumnData::Int(values))
    }

    pub fn text(name: impl Into<String>, values: Vec<Option<String>>) -> Self {
        Self::new(name, ColumnData::Text(values))
    }

    /// Dense float column with no missing cells.
    pub fn from_f64(name: impl Into<String>, values: &[f64]) -> Self {
        Self::float(name, values.iter().copied().map(Some).collect())
    }

    /// Dense integer column with no missing cells.
    pub fn from_i64(name: impl Into<String>, values: &[i64]) -> Self {
        Self::int(name, values.iter().copied().map(Some).collect())
    }

    /// Dense text column with no missing cells.
    pub fn from_strs(name: impl Into<String>, values: &[&str]) -> Self {
        Self::text(name, values.iter().map(|s| Some(s.to_string())).collect())
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// An ordered sequence of equally long, uniquely named columns with row labels.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Table {
    index: Vec<Label>,
    columns: Vec<Column>,
}

impl Table {
    /// Build a table with a positional index. Ragged or duplicate columns are
    /// not table-shaped.
    pub fn new(columns: Vec<Column>) -> Result<Self, MlError> {
        let n = columns.first().map(Column::len).unwrap_or(0);
        let mut seen = HashSet::new();
        for col in &columns {
            if col.len() != n {
                return Err(MlError::invalid_input(format!(
                    "column '{}' has {} rows, expected {n}",
                    col.name,
                    col.len()
                )));
            }
            if !seen.insert(col.name.as_str()) {
                return Err(MlError::invalid_input(format!(
                    "duplicate column '{}'",
                    col.name
                )));
            }
        }
        Ok(Self {
            index: range_index(n),
            columns,
        })
    }

    /// A table with no rows and no columns.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Replace the row labels.
    pub fn with_index(mut self, index: Vec<Label>) -> Result<Self, MlError> {
        if !self.columns.is_empty() && index.len() != self.n_rows() {
            return Err(MlError::invalid_input(format!(
                "index has {} labels but the table has {} rows",
                index.len(),
                self.n_rows()
            )));
        }
        self.index = index;
        Ok(self)
    }

    /// Build from a JSON array of flat objects. Column order follows first
    /// appearance; keys absent from a record become missing cells.
    pub fn from_records(records: &[serde_json::Value]) -> Result<Self, MlError> {
        let mut names: Vec<String> = Vec::new();
        for (i, record) in records.iter().enumerate() {
            let obj = record.as_object().ok_or_else(|| {
                MlError::invalid_input(format!("record {i} is not an object"))
            })?;
            for key in obj.keys() {
                if !names.iter().any(|n| n == key) {
                    names.push(key.clone());
                }
            }
        }

        let null = serde_json::Value::Null;
        let rows: Vec<Vec<serde_json::Value>> = records
            .iter()
            .map(|r| {
                names
                    .iter()
                    .map(|n| r.get(n).unwrap_or(&null).clone())
                    .collect()
            })
            .collect();
        Self::from_rows(names, rows)
    }

    /// Build from any JSON value; only an array of objects is table-shaped.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, MlError> {
        match value {
            serde_json::Value::Array(records) => Self::from_records(records),
            other => Err(MlError::invalid_input(format!(
                "expected an array of records, got {}",
                json_kind(other)
            ))),
        }
    }

    /// Build from a column header and row-major cells, inferring each
    /// column's type.
    pub fn from_rows(
        columns: Vec<String>,
        rows: Vec<Vec<serde_json::Value>>,
    ) -> Result<Self, MlError> {
        for (i, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(MlError::invalid_input(format!(
                    "row {i} has {} cells, expected {}",
                    row.len(),
                    columns.len()
                )));
            }
        }

        let mut out = Vec::with_capacity(columns.len());
        for (j, name) in columns.into_iter().enumerate() {
            let cells: Vec<&serde_json::Value> = rows.iter().map(|r| &r[j]).collect();
            let data = match infer_column_type(&name, &cells)? {
                ColumnType::Text => ColumnData::Text(
                    cells
                        .iter()
                        .map(|v| match v {
                            serde_json::Value::Null => None,
                            serde_json::Value::String(s) => Some(s.clone()),
                            other => Some(other.to_string()),
                        })
                        .collect(),
                ),
                ColumnType::Integer => ColumnData::Int(
                    cells
                        .iter()
                        .map(|v| match v {
                            serde_json::Value::Bool(b) => Some(i64::from(*b)),
                            other => other.as_i64(),
                        })
                        .collect(),
                ),
                ColumnType::Float => ColumnData::Float(
                    cells
                        .iter()
                        .map(|v| match v {
                            serde_json::Value::Bool(b) => Some(f64::from(u8::from(*b))),
                            other => other.as_f64(),
                        })
                        .collect(),
                ),
            };
            out.push(Column::new(name, data));
        }

        let n = rows.len();
        let mut table = Self::new(out)?;
        table.index = range_index(n);
        Ok(table)
    }

    pub fn n_rows(&self) -> usize {
        self.index.len()
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    /// True when the table has no rows or no columns.
    pub fn is_empty(&self) -> bool {
        self.n_rows() == 0 || self.columns.is_empty()
    }

    pub fn index(&self) -> &[Label] {
        &self.index
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn schema(&self) -> Vec<ColumnSchema> {
        self.columns
            .iter()
            .map(|c| ColumnSchema {
                name: c.name.clone(),
                dtype: c.data.dtype(),
                nullable: c.data.null_count() > 0,
            })
            .collect()
    }

    /// Rows at `positions`, in that order, with their labels.
    ///
    /// # Panics
    /// Panics if a position is out of bounds.
    pub fn take(&self, positions: &[usize]) -> Self {
        Self {
            index: positions.iter().map(|&i| self.index[i].clone()).collect(),
            columns: self
                .columns
                .iter()
                .map(|c| Column::new(c.name.clone(), c.data.take(positions)))
                .collect(),
        }
    }

    /// Row-major JSON objects, one per row, keyed by column name.
    pub fn to_records(&self) -> Vec<serde_json::Value> {
        (0..self.n_rows())
            .map(|row| {
                let obj: serde_json::Map<String, serde_json::Value> = self
                    .columns
                    .iter()
                    .map(|c| (c.name.clone(), c.data.cell_json(row)))
                    .collect();
                serde_json::Value::Object(obj)
            })
            .collect()
    }
}

/// A named one-dimensional float sequence with row labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub name: String,
    index: Vec<Label>,
    values: Vec<f64>,
}

impl Series {
    pub fn new(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            index: range_index(values.len()),
            values,
        }
    }

    pub fn with_index(mut self, index: Vec<Label>) -> Result<Self, MlError> {
        if index.len() != self.values.len() {
            return Err(MlError::invalid_input(format!(
                "index has {} labels but the series has {} values",
                index.len(),
                self.values.len()
            )));
        }
        self.index = index;
        Ok(self)
    }

    /// Extract a numeric column as a series sharing the table's index.
    pub fn from_column(table: &Table, name: &str) -> Result<Self, MlError> {
        let column = table
            .column(name)
            .ok_or_else(|| MlError::validation(format!("missing column '{name}'")))?;
        let cells = column
            .data
            .as_f64()
            .ok_or_else(|| MlError::validation(format!("column '{name}' must be numeric")))?;
        let values = cells
            .into_iter()
            .enumerate()
            .map(|(i, c)| {
                c.ok_or_else(|| {
                    MlError::validation(format!("column '{name}' is missing a value at row {i}"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            name: name.to_string(),
            index: table.index().to_vec(),
            values,
        })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn index(&self) -> &[Label] {
        &self.index
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Value for a row label, if present.
    pub fn get(&self, label: &Label) -> Option<f64> {
        self.index
            .iter()
            .position(|l| l == label)
            .map(|i| self.values[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Label, f64)> {
        self.index.iter().zip(self.values.iter().copied())
    }

    /// Values at `positions`, in that order, with their labels.
    ///
    /// # Panics
    /// Panics if a position is out of bounds.
    pub fn take(&self, positions: &[usize]) -> Self {
        Self {
            name: self.name.clone(),
            index: positions.iter().map(|&i| self.index[i].clone()).collect(),
            values: positions.iter().map(|&i| self.values[i]).collect(),
        }
    }

    pub fn mean(&self) -> Option<f64> {
        if self.values.is_empty() {
            None
        } else {
            Some(self.values.iter().sum::<f64>() / self.values.len() as f64)
        }
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_rejects_ragged_columns() {
        let err = Table::new(vec![
            Column::from_f64("a", &[1.0, 2.0]),
            Column::from_f64("b", &[1.0]),
        ])
        .unwrap_err();
        assert!(matches!(err, MlError::InvalidInput(_)));
    }

    #[test]
    fn test_new_rejects_duplicate_names() {
        let err = Table::new(vec![
            Column::from_f64("a", &[1.0]),
            Column::from_f64("a", &[2.0]),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_from_records_infers_types_and_missing_cells() {
        let records = vec![
            json!({"distance": 100, "route_id": "R1"}),
            json!({"distance": 250.5, "origin": "NYC"}),
        ];
        let table = Table::from_records(&records).unwrap();
        assert_eq!(table.n_rows(), 2);
        assert_eq!(table.column_names(), vec!["distance", "route_id", "origin"]);
        assert_eq!(
            table.column("distance").unwrap().data,
            ColumnData::Float(vec![Some(100.0), Some(250.5)])
        );
        assert_eq!(
            table.column("origin").unwrap().data,
            ColumnData::Text(vec![None, Some("NYC".into())])
        );
    }

    #[test]
    fn test_from_json_rejects_non_tabular() {
        assert!(Table::from_json(&json!({"a": 1})).is_err());
        assert!(Table::from_json(&json!([1, 2, 3])).is_err());
        assert!(Table::from_json(&json!([{"a": [1, 2]}])).is_err());
    }

    #[test]
    fn test_is_empty() {
        assert!(Table::empty().is_empty());
        let t = Table::new(vec![Column::from_f64("a", &[])]).unwrap();
        assert!(t.is_empty());
        let t = Table::new(vec![Column::from_f64("a", &[1.0])]).unwrap();
        assert!(!t.is_empty());
    }

    #[test]
    fn test_with_index_length_checked() {
        let t = Table::new(vec![Column::from_f64("a", &[1.0, 2.0])]).unwrap();
        assert!(t.clone().with_index(vec![Label::from(7i64)]).is_err());
        let t = t
            .with_index(vec![Label::from("row_a"), Label::from("row_b")])
            .unwrap();
        assert_eq!(t.index()[1], Label::Str("row_b".into()));
    }

    #[test]
    fn test_take_reorders_rows_and_labels() {
        let t = Table::new(vec![
            Column::from_f64("a", &[1.0, 2.0, 3.0]),
            Column::from_strs("b", &["x", "y", "z"]),
        ])
        .unwrap();
        let picked = t.take(&[2, 0]);
        assert_eq!(picked.index(), &[Label::Int(2), Label::Int(0)]);
        assert_eq!(
            picked.column("b").unwrap().data,
            ColumnData::Text(vec![Some("z".into()), Some("x".into())])
        );
    }

    #[test]
    fn test_typed_views() {
        let ints = ColumnData::Float(vec![Some(3.0), None]);
        assert_eq!(ints.as_i64(), Some(vec![Some(3), None]));
        let frac = ColumnData::Float(vec![Some(3.5)]);
        assert_eq!(frac.as_i64(), None);
        let text = ColumnData::Int(vec![Some(12)]);
        assert_eq!(text.as_text(), vec![Some("12".to_string())]);
        assert_eq!(ColumnData::Text(vec![]).as_f64(), None);
    }

    #[test]
    fn test_as_i64_rejects_out_of_range_floats() {
        let too_big = ColumnData::Float(vec![Some(9_223_372_036_854_775_808.0)]);
        assert_eq!(too_big.as_i64(), None);
        let too_small = ColumnData::Float(vec![Some(-1e19)]);
        assert_eq!(too_small.as_i64(), None);
        let floor = ColumnData::Float(vec![Some(-9_223_372_036_854_775_808.0)]);
        assert_eq!(floor.as_i64(), Some(vec![Some(i64::MIN)]));
    }

    #[test]
    fn test_from_records_keeps_wide_integers_as_floats() {
        let t = Table::from_json(&json!([{"n": 18446744073709551615u64}, {"n": 2}])).unwrap();
        assert_eq!(
            t.column("n").unwrap().data,
            ColumnData::Float(vec![Some(18446744073709551615u64 as f64), Some(2.0)])
        );
    }

    #[test]
    fn test_to_records_roundtrip_shape() {
        let t = Table::new(vec![
            Column::float("a", vec![Some(1.5), None]),
            Column::from_strs("b", &["x", "y"]),
        ])
        .unwrap();
        let records = t.to_records();
        assert_eq!(records[0], json!({"a": 1.5, "b": "x"}));
        assert_eq!(records[1], json!({"a": null, "b": "y"}));
    }

    #[test]
    fn test_series_from_column_requires_complete_numbers() {
        let t = Table::new(vec![Column::float("y", vec![Some(1.0), None])]).unwrap();
        assert!(matches!(
            Series::from_column(&t, "y"),
            Err(MlError::Validation(_))
        ));
        let t = Table::new(vec![Column::from_i64("y", &[1, 2])]).unwrap();
        let s = Series::from_column(&t, "y").unwrap();
        assert_eq!(s.values(), &[1.0, 2.0]);
        assert_eq!(s.mean(), Some(1.5));
    }
}

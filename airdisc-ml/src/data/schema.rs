//! Column types and type inference for record tables.

use crate::error::MlError;
use serde::{Deserialize, Serialize};

/// Column data type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Integer,
    Float,
    Text,
}

/// Schema for a single column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    pub dtype: ColumnType,
    pub nullable: bool,
}

/// Infer a column type from the cells of one column.
///
/// Any string makes the column text; otherwise any non-integral number, or
/// any integer outside the `i64` range, makes it float. Booleans count as
/// integers. An all-null column is float.
/// Nested objects and arrays are not tabular and are rejected.
pub fn infer_column_type(name: &str, values: &[&serde_json::Value]) -> Result<ColumnType, MlError> {
    let mut has_int = false;
    let mut has_float = false;
    let mut has_string = false;

    for v in values {
        match v {
            serde_json::Value::Null => {}
            serde_json::Value::Number(n) => {
                if n.as_i64().is_none() {
                    has_float = true;
                } else {
                    has_int = true;
                }
            }
            serde_json::Value::Bool(_) => has_int = true,
            serde_json::Value::String(_) => has_string = true,
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
                return Err(MlError::invalid_input(format!(
                    "column '{name}' holds nested values; records must be flat"
                )));
            }
        }
    }

    if has_string {
        return Ok(ColumnType::Text);
    }
    if has_float || !has_int {
        return Ok(ColumnType::Float);
    }
    Ok(ColumnType::Integer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_infer_column_type_int() {
        let values = [json!(1), json!(2), json!(null)];
        let refs: Vec<_> = values.iter().collect();
        assert_eq!(infer_column_type("n", &refs).unwrap(), ColumnType::Integer);
    }

    #[test]
    fn test_infer_column_type_mixed_numbers_is_float() {
        let values = [json!(1), json!(2.5)];
        let refs: Vec<_> = values.iter().collect();
        assert_eq!(infer_column_type("x", &refs).unwrap(), ColumnType::Float);
    }

    #[test]
    fn test_infer_column_type_string_wins() {
        let values = [json!("R1"), json!(3)];
        let refs: Vec<_> = values.iter().collect();
        assert_eq!(infer_column_type("route_id", &refs).unwrap(), ColumnType::Text);
    }

    #[test]
    fn test_infer_column_type_wide_integer_is_float() {
        let values = [json!(3), json!(u64::MAX)];
        let refs: Vec<_> = values.iter().collect();
        assert_eq!(infer_column_type("trip_count", &refs).unwrap(), ColumnType::Float);
    }

    #[test]
    fn test_infer_column_type_all_null() {
        let values = [json!(null)];
        let refs: Vec<_> = values.iter().collect();
        assert_eq!(infer_column_type("x", &refs).unwrap(), ColumnType::Float);
    }

    #[test]
    fn test_infer_column_type_rejects_nested() {
        let values = [json!({"trips": 3})];
        let refs: Vec<_> = values.iter().collect();
        let err = infer_column_type("history", &refs).unwrap_err();
        assert!(matches!(err, MlError::InvalidInput(_)));
    }
}

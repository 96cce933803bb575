//! Record sources: load raw passenger/route records into a [`Table`].

use crate::data::table::Table;
use crate::error::MlError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where a batch of records came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSourceInfo {
    pub source_type: String,
    pub location: String,
    pub accessed_at: chrono::DateTime<chrono::Utc>,
}

/// Trait for loading raw records from a source.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Load records from this source, optionally limiting the number of rows.
    async fn load(&self, limit: Option<usize>) -> Result<Table, MlError>;

    /// Return metadata about this source.
    fn source_info(&self) -> DataSourceInfo;
}

/// Pick a source from a file extension: `.jsonl` / `.ndjson` are JSON Lines,
/// `.db` / `.sqlite` need a query, everything else is a JSON array.
pub fn source_for_path(
    path: PathBuf,
    query: Option<String>,
) -> Result<Box<dyn DataSource>, MlError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    Ok(match (ext.as_str(), query) {
        ("jsonl" | "ndjson", _) => Box::new(JsonlSource { path }),
        ("db" | "sqlite" | "sqlite3", Some(query)) => Box::new(SqliteSource {
            db_path: path,
            query,
        }),
        ("db" | "sqlite" | "sqlite3", None) => {
            return Err(MlError::invalid_input("SQLite input requires --query"));
        }
        (_, _) => Box::new(JsonSource { path }),
    })
}

// ---------------------------------------------------------------------------
// JsonSource
// ---------------------------------------------------------------------------

/// JSON file holding an array of flat record objects.
pub struct JsonSource {
    pub path: PathBuf,
}

#[async_trait]
impl DataSource for JsonSource {
    async fn load(&self, limit: Option<usize>) -> Result<Table, MlError> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        let value: serde_json::Value = serde_json::from_str(&content)?;
        match value {
            serde_json::Value::Array(mut items) => {
                if let Some(max) = limit {
                    items.truncate(max);
                }
                Table::from_records(&items)
            }
            other => Table::from_json(&other),
        }
    }

    fn source_info(&self) -> DataSourceInfo {
        DataSourceInfo {
            source_type: "json".to_string(),
            location: self.path.display().to_string(),
            accessed_at: chrono::Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// JsonlSource
// ---------------------------------------------------------------------------

/// JSON Lines file: one record object per line.
pub struct JsonlSource {
    pub path: PathBuf,
}

#[async_trait]
impl DataSource for JsonlSource {
    async fn load(&self, limit: Option<usize>) -> Result<Table, MlError> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        let mut items = Vec::new();
        for (lineno, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(max) = limit {
                if items.len() >= max {
                    break;
                }
            }
            let value: serde_json::Value = serde_json::from_str(line).map_err(|e| {
                MlError::invalid_input(format!("line {}: {e}", lineno + 1))
            })?;
            items.push(value);
        }
        Table::from_records(&items)
    }

    fn source_info(&self) -> DataSourceInfo {
        DataSourceInfo {
            source_type: "jsonl".to_string(),
            location: self.path.display().to_string(),
            accessed_at: chrono::Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// SqliteSource
// ---------------------------------------------------------------------------

/// SQLite database source. Loads records via a SQL query.
pub struct SqliteSource {
    pub db_path: PathBuf,
    pub query: String,
}

#[async_trait]
impl DataSource for SqliteSource {
    async fn load(&self, limit: Option<usize>) -> Result<Table, MlError> {
        let db_path = self.db_path.clone();
        let query = if let Some(max) = limit {
            format!("{} LIMIT {max}", self.query.trim_end_matches(';'))
        } else {
            self.query.clone()
        };

        // Run blocking SQLite operations on a blocking thread
        tokio::task::spawn_blocking(move || {
            let conn = rusqlite::Connection::open_with_flags(
                &db_path,
                rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
            )?;
            query_table(&conn, &query, [])
        })
        .await
        .map_err(|e| MlError::invalid_input(format!("SQLite task join error: {e}")))?
    }

    fn source_info(&self) -> DataSourceInfo {
        DataSourceInfo {
            source_type: "sqlite".to_string(),
            location: self.db_path.display().to_string(),
            accessed_at: chrono::Utc::now(),
        }
    }
}

/// Run a query and collect the result set into a table.
pub fn query_table<P: rusqlite::Params>(
    conn: &rusqlite::Connection,
    query: &str,
    params: P,
) -> Result<Table, MlError> {
    let mut stmt = conn.prepare(query)?;
    let column_count = stmt.column_count();
    let columns: Vec<String> = (0..column_count)
        .map(|i| stmt.column_name(i).unwrap_or("?").to_string())
        .collect();

    let mut rows = Vec::new();
    let mut result_rows = stmt.query(params)?;
    while let Some(row) = result_rows.next()? {
        let mut values = Vec::with_capacity(column_count);
        for i in 0..column_count {
            let val = match row.get_ref(i)? {
                rusqlite::types::ValueRef::Null => serde_json::Value::Null,
                rusqlite::types::ValueRef::Integer(n) => serde_json::json!(n),
                rusqlite::types::ValueRef::Real(f) => serde_json::Number::from_f64(f)
                    .map(serde_json::Value::Number)
                    .unwrap_or(serde_json::Value::Null),
                rusqlite::types::ValueRef::Text(t) => {
                    serde_json::Value::String(String::from_utf8_lossy(t).into_owned())
                }
                rusqlite::types::ValueRef::Blob(_) => {
                    return Err(MlError::invalid_input(format!(
                        "column '{}' holds binary data",
                        columns[i]
                    )));
                }
            };
            values.push(val);
        }
        rows.push(values);
    }

    Table::from_rows(columns, rows)
}

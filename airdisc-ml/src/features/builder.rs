//! Raw record table → canonical feature frame.
//!
//! The builder is pure: it reads the input table, never mutates it, and
//! performs no I/O. Missing source columns produce missing cells rather
//! than errors; identifying columns are never carried over.

use crate::data::table::{Column, ColumnData, Table};
use crate::error::MlError;
use crate::features::{FEATURE_COLUMNS, KM_PER_MILE, TRIP_COUNT_ALIASES};
use std::ops::Deref;

/// A table whose columns are exactly [`FEATURE_COLUMNS`], in order.
///
/// Only [`build_features`] constructs one, so holding a `FeatureFrame` is
/// proof of the canonical schema. It dereferences to [`Table`] and can be
/// passed anywhere a table is expected.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureFrame(Table);

impl FeatureFrame {
    pub fn into_table(self) -> Table {
        self.0
    }

    pub fn as_table(&self) -> &Table {
        &self.0
    }

    /// Rows at `positions`, keeping the canonical schema.
    pub fn take(&self, positions: &[usize]) -> Self {
        Self(self.0.take(positions))
    }
}

impl Deref for FeatureFrame {
    type Target = Table;

    fn deref(&self) -> &Table {
        &self.0
    }
}

impl AsRef<Table> for FeatureFrame {
    fn as_ref(&self) -> &Table {
        &self.0
    }
}

/// Build the canonical feature frame from raw records.
///
/// - `distance_km` comes from `distance_km`, else `distance` (miles) converted.
/// - `history_trips` comes from `history_trips`, `trip_count` or `trips_count`.
/// - `avg_spend` comes from `avg_spend`, else `total_spend / history_trips`
///   for rows with a positive trip count.
/// - `route_id`, `origin` and `destination` are copied as text.
///
/// Fails with [`MlError::InvalidInput`] when the table has no rows or no
/// columns, or when a present source column has the wrong type.
pub fn build_features(records: &Table) -> Result<FeatureFrame, MlError> {
    if records.is_empty() {
        return Err(MlError::invalid_input(
            "records must be a non-empty table",
        ));
    }
    let n = records.n_rows();

    let distance_km = if let Some(km) = records.column("distance_km") {
        numeric(km)?
    } else if let Some(miles) = records.column("distance") {
        numeric(miles)?
            .into_iter()
            .map(|d| d.map(|v| v * KM_PER_MILE))
            .collect()
    } else {
        vec![None; n]
    };

    let history_trips = match TRIP_COUNT_ALIASES
        .iter()
        .find_map(|name| records.column(name))
    {
        Some(col) => integer(col)?,
        None => vec![None; n],
    };

    let avg_spend = if let Some(avg) = records.column("avg_spend") {
        numeric(avg)?
    } else if let Some(total) = records.column("total_spend") {
        numeric(total)?
            .into_iter()
            .zip(&history_trips)
            .map(|(spend, trips)| match (spend, trips) {
                (Some(s), Some(t)) if *t > 0 => Some(s / *t as f64),
                _ => None,
            })
            .collect()
    } else {
        vec![None; n]
    };

    let text = |name: &str| -> Vec<Option<String>> {
        records
            .column(name)
            .map(|c| c.data.as_text())
            .unwrap_or_else(|| vec![None; n])
    };

    let [c_dist, c_trips, c_avg, c_route, c_origin, c_dest] = FEATURE_COLUMNS;
    let table = Table::new(vec![
        Column::float(c_dist, distance_km),
        Column::int(c_trips, history_trips),
        Column::float(c_avg, avg_spend),
        Column::text(c_route, text(c_route)),
        Column::text(c_origin, text(c_origin)),
        Column::text(c_dest, text(c_dest)),
    ])?
    .with_index(records.index().to_vec())?;

    Ok(FeatureFrame(table))
}

fn numeric(col: &Column) -> Result<Vec<Option<f64>>, MlError> {
    col.data.as_f64().ok_or_else(|| {
        MlError::invalid_input(format!("column '{}' must be numeric", col.name))
    })
}

fn integer(col: &Column) -> Result<Vec<Option<i64>>, MlError> {
    if let ColumnData::Text(_) = col.data {
        return Err(MlError::invalid_input(format!(
            "column '{}' must be numeric",
            col.name
        )));
    }
    col.data.as_i64().ok_or_else(|| {
        MlError::invalid_input(format!(
            "column '{}' must hold whole numbers within i64 range",
            col.name
        ))
    })
}

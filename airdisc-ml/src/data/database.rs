//! SQLite store for passengers, routes and historical discounts.

use crate::data::source::query_table;
use crate::data::table::{Label, Series, Table};
use crate::error::MlError;
use crate::features::{FeatureFrame, build_features};
use crate::model::predictor::TARGET_NAME;
use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS passengers (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    travel_history TEXT NOT NULL DEFAULT '{}'
);
CREATE TABLE IF NOT EXISTS routes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    origin TEXT NOT NULL,
    destination TEXT NOT NULL,
    distance REAL NOT NULL
);
CREATE TABLE IF NOT EXISTS discounts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    passenger_id INTEGER NOT NULL REFERENCES passengers(id),
    route_id INTEGER NOT NULL REFERENCES routes(id),
    discount_value REAL NOT NULL
);
";

/// Raw training records: one row per discount whose passenger has flown.
/// `distance` is in miles; the builder converts it.
const TRAINING_QUERY: &str = "
SELECT
    d.id AS discount_id,
    p.id AS passenger_id,
    r.distance AS distance,
    CAST(json_extract(p.travel_history, '$.trips') AS INTEGER) AS trip_count,
    CAST(json_extract(p.travel_history, '$.total_spend') AS REAL) AS total_spend,
    d.route_id AS route_id,
    r.origin AS origin,
    r.destination AS destination,
    d.discount_value AS discount_value
FROM discounts d
JOIN passengers p ON d.passenger_id = p.id
JOIN routes r ON d.route_id = r.id
WHERE CAST(json_extract(p.travel_history, '$.trips') AS INTEGER) > 0
ORDER BY d.id
";

/// The JSON document stored in `passengers.travel_history`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TravelHistory {
    pub trips: i64,
    pub total_spend: f64,
}

/// Row counts per table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TableCounts {
    pub passengers: usize,
    pub routes: usize,
    pub discounts: usize,
}

/// A connection to the discount database.
pub struct DiscountDatabase {
    conn: Connection,
    path: Option<PathBuf>,
}

impl DiscountDatabase {
    /// Open (creating if needed) the database file and ensure the schema.
    pub fn open(path: &Path) -> Result<Self, MlError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        let db = Self {
            conn,
            path: Some(path.to_path_buf()),
        };
        db.init_schema()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self, MlError> {
        let db = Self {
            conn: Connection::open_in_memory()?,
            path: None,
        };
        db.init_schema()?;
        Ok(db)
    }

    /// File backing this database; `None` when in memory.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Create the tables if they do not exist. Safe to call repeatedly.
    pub fn init_schema(&self) -> Result<(), MlError> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    pub fn insert_passenger(&self, name: &str, history: &TravelHistory) -> Result<i64, MlError> {
        let history = serde_json::to_string(history)?;
        self.conn.execute(
            "INSERT INTO passengers (name, travel_history) VALUES (?1, ?2)",
            params![name, history],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn insert_route(
        &self,
        origin: &str,
        destination: &str,
        distance_miles: f64,
    ) -> Result<i64, MlError> {
        self.conn.execute(
            "INSERT INTO routes (origin, destination, distance) VALUES (?1, ?2, ?3)",
            params![origin, destination, distance_miles],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn insert_discount(
        &self,
        passenger_id: i64,
        route_id: i64,
        discount_value: f64,
    ) -> Result<i64, MlError> {
        self.conn.execute(
            "INSERT INTO discounts (passenger_id, route_id, discount_value) VALUES (?1, ?2, ?3)",
            params![passenger_id, route_id, discount_value],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Run `f` inside a transaction; it commits only if `f` succeeds.
    pub fn in_transaction<T>(
        &self,
        f: impl FnOnce(&Self) -> Result<T, MlError>,
    ) -> Result<T, MlError> {
        let tx = self.conn.unchecked_transaction()?;
        let out = f(self)?;
        tx.commit()?;
        Ok(out)
    }

    /// Insert the three demo passengers, routes and discounts.
    pub fn load_sample_data(&self) -> Result<TableCounts, MlError> {
        let passengers = [
            ("John Smith", 10, 5000.0),
            ("Jane Doe", 25, 15000.0),
            ("Bob Johnson", 5, 2500.0),
        ];
        let routes = [
            ("New York", "London", 3459.0),
            ("Los Angeles", "Tokyo", 5478.0),
            ("San Francisco", "Paris", 5558.0),
        ];
        let discounts = [15.0, 25.0, 10.0];

        self.in_transaction(|db| {
            for (((name, trips, total_spend), (origin, destination, miles)), value) in
                passengers.iter().zip(&routes).zip(discounts)
            {
                let history = TravelHistory {
                    trips: *trips,
                    total_spend: *total_spend,
                };
                let passenger = db.insert_passenger(name, &history)?;
                let route = db.insert_route(origin, destination, *miles)?;
                db.insert_discount(passenger, route, value)?;
            }
            Ok(())
        })?;
        tracing::info!("Loaded sample passengers, routes and discounts");
        self.counts()
    }

    pub fn counts(&self) -> Result<TableCounts, MlError> {
        let count = |table: &str| -> Result<usize, MlError> {
            let n: i64 =
                self.conn
                    .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
            Ok(usize::try_from(n).unwrap_or(0))
        };
        Ok(TableCounts {
            passengers: count("passengers")?,
            routes: count("routes")?,
            discounts: count("discounts")?,
        })
    }

    /// Joined raw records, labelled by discount id.
    pub fn training_records(&self) -> Result<Table, MlError> {
        let table = query_table(&self.conn, TRAINING_QUERY, [])?;
        if table.n_rows() == 0 {
            return Ok(table);
        }
        let ids = table
            .column("discount_id")
            .and_then(|c| c.data.as_i64())
            .ok_or_else(|| MlError::invalid_input("discount ids must be integers"))?;
        let index = ids
            .into_iter()
            .map(|id| id.map(Label::Int))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| MlError::invalid_input("discount id is missing"))?;
        table.with_index(index)
    }

    /// Canonical features and the `discount_value` target, aligned by row.
    pub fn training_frame(&self) -> Result<(FeatureFrame, Series), MlError> {
        let records = self.training_records()?;
        if records.n_rows() == 0 {
            return Err(MlError::invalid_input(
                "no training data found; run `airdisc init-db --sample` to load data",
            ));
        }
        let features = build_features(&records)?;
        let mut target = Series::from_column(&records, "discount_value")?;
        target.name = TARGET_NAME.to_string();
        tracing::debug!(rows = features.n_rows(), "Loaded training frame");
        Ok((features, target))
    }
}

impl std::fmt::Debug for DiscountDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscountDatabase")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

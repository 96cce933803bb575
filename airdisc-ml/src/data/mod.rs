//! Data access: the table abstraction, record sources and the discount database.

pub mod database;
pub mod schema;
pub mod source;
pub mod table;

pub use database::{DiscountDatabase, TableCounts, TravelHistory};
pub use schema::{ColumnSchema, ColumnType};
pub use source::{DataSource, DataSourceInfo, source_for_path};
pub use table::{Column, ColumnData, Label, Series, Table};

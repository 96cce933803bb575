//! Canonical feature construction for discount modeling.

pub mod builder;

pub use builder::{FeatureFrame, build_features};

/// Numeric canonical features, in frame order.
pub const NUMERIC_FEATURES: [&str; 3] = ["distance_km", "history_trips", "avg_spend"];

/// Categorical canonical features, in frame order.
pub const CATEGORICAL_FEATURES: [&str; 3] = ["route_id", "origin", "destination"];

/// The canonical frame's columns, in order.
pub const FEATURE_COLUMNS: [&str; 6] = [
    "distance_km",
    "history_trips",
    "avg_spend",
    "route_id",
    "origin",
    "destination",
];

/// Kilometres per statute mile.
pub const KM_PER_MILE: f64 = 1.60934;

/// Raw trip-count column names, in order of preference.
pub(crate) const TRIP_COUNT_ALIASES: [&str; 3] = ["history_trips", "trip_count", "trips_count"];

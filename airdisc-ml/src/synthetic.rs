//! Seeded synthetic discount data for demos and tests.
//!
//! Target: `0.002 * distance_km + 0.3 * trips + 0.005 * avg_spend + N(0, 2)`.

use crate::data::database::{DiscountDatabase, TableCounts, TravelHistory};
use crate::data::table::{Column, Series, Table};
use crate::error::MlError;
use crate::features::{FeatureFrame, KM_PER_MILE, build_features};
use crate::model::predictor::TARGET_NAME;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// `(origin, destination, distance in miles)`.
pub const ROUTES: [(&str, &str, f64); 6] = [
    ("New York", "London", 3459.0),
    ("Los Angeles", "Tokyo", 5478.0),
    ("San Francisco", "Paris", 5558.0),
    ("Chicago", "Frankfurt", 4340.0),
    ("Boston", "Dublin", 2990.0),
    ("Seattle", "Seoul", 5212.0),
];

const NOISE_STD: f64 = 2.0;

/// One drawn passenger-route pair.
#[derive(Debug, Clone, PartialEq)]
struct Draw {
    route: usize,
    trips: i64,
    avg_spend: f64,
    discount: f64,
}

fn draws(n: usize, seed: u64) -> Vec<Draw> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            let route = rng.gen_range(0..ROUTES.len());
            let trips: i64 = rng.gen_range(1..=50);
            let avg_spend = (rng.gen_range(100.0..2000.0_f64) * 100.0).round() / 100.0;
            let distance_km = ROUTES[route].2 * KM_PER_MILE;
            let discount = 0.002 * distance_km
                + 0.3 * trips as f64
                + 0.005 * avg_spend
                + NOISE_STD * standard_normal(&mut rng);
            Draw {
                route,
                trips,
                avg_spend,
                discount,
            }
        })
        .collect()
}

/// Box-Muller transform.
fn standard_normal(rng: &mut impl Rng) -> f64 {
    let u1: f64 = 1.0 - rng.r#gen::<f64>();
    let u2: f64 = rng.r#gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

/// `n` rows of canonical features with their discount target.
pub fn discount_dataset(n: usize, seed: u64) -> Result<(FeatureFrame, Series), MlError> {
    if n == 0 {
        return Err(MlError::invalid_input("synthetic dataset needs at least one row"));
    }
    let rows = draws(n, seed);
    let route_ids: Vec<String> = rows.iter().map(|d| format!("R{}", d.route + 1)).collect();
    let raw = Table::new(vec![
        Column::float(
            "distance_km",
            rows.iter()
                .map(|d| Some(ROUTES[d.route].2 * KM_PER_MILE))
                .collect(),
        ),
        Column::int("history_trips", rows.iter().map(|d| Some(d.trips)).collect()),
        Column::float("avg_spend", rows.iter().map(|d| Some(d.avg_spend)).collect()),
        Column::text("route_id", route_ids.into_iter().map(Some).collect()),
        Column::text(
            "origin",
            rows.iter().map(|d| Some(ROUTES[d.route].0.to_string())).collect(),
        ),
        Column::text(
            "destination",
            rows.iter().map(|d| Some(ROUTES[d.route].1.to_string())).collect(),
        ),
    ])?;
    let features = build_features(&raw)?;
    let target = Series::new(TARGET_NAME, rows.iter().map(|d| d.discount).collect())
        .with_index(features.index().to_vec())?;
    Ok((features, target))
}

/// Insert the routes plus `n` synthetic passengers, one discount each.
pub fn populate_database(db: &DiscountDatabase, n: usize, seed: u64) -> Result<TableCounts, MlError> {
    let rows = draws(n, seed);
    db.in_transaction(|db| {
        let route_ids = ROUTES
            .iter()
            .map(|(origin, destination, miles)| db.insert_route(origin, destination, *miles))
            .collect::<Result<Vec<_>, _>>()?;
        for (i, d) in rows.iter().enumerate() {
            let history = TravelHistory {
                trips: d.trips,
                total_spend: d.avg_spend * d.trips as f64,
            };
            let passenger = db.insert_passenger(&format!("Passenger {}", i + 1), &history)?;
            db.insert_discount(passenger, route_ids[d.route], d.discount)?;
        }
        Ok(())
    })?;
    tracing::info!(rows = n, seed, "Inserted synthetic discounts");
    db.counts()
}

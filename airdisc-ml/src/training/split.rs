//! Seeded train/test splitting.

use crate::error::MlError;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

/// Shuffle positions `0..n` with `seed` and hold out `ceil(n * test_fraction)`
/// of them for testing. Returns `(train, test)`; both are non-empty.
pub fn train_test_split(
    n: usize,
    test_fraction: f64,
    seed: u64,
) -> Result<(Vec<usize>, Vec<usize>), MlError> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(MlError::validation(format!(
            "test_fraction must be between 0 and 1, got {test_fraction}"
        )));
    }
    if n < 2 {
        return Err(MlError::validation(format!(
            "need at least 2 rows to split, got {n}"
        )));
    }
    let n_test = ((n as f64 * test_fraction).ceil() as usize).clamp(1, n - 1);

    let mut positions: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    positions.shuffle(&mut rng);
    let train = positions.split_off(n_test);
    Ok((train, positions))
}

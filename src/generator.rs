//! Random input generation.

use std::path::PathBuf;

use log::info;
use rand::distributions::Uniform;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::GenerateConfig;
use crate::matrix::{Element, Matrix, MatrixError};
use crate::source::{create_dir, matrix_path};

pub const MIN_VALUE: Element = -99;
pub const MAX_VALUE: Element = 99;

/// A `rows x cols` matrix of uniform values in `[MIN_VALUE, MAX_VALUE]`.
pub fn random_matrix(rows: usize, cols: usize, seed: u64) -> Matrix {
    let rng = StdRng::seed_from_u64(seed);
    let data = rng
        .sample_iter(Uniform::new_inclusive(MIN_VALUE, MAX_VALUE))
        .take(rows * cols)
        .collect();
    Matrix { data, rows, cols }
}

/// Seeds for the `idx`-th size: A and B each get their own, and no two
/// sizes share a stream.
pub fn seeds_for(base: u64, idx: usize) -> (u64, u64) {
    let seed_a = base.wrapping_add(2 * idx as u64);
    (seed_a, seed_a.wrapping_add(1))
}

/// Write `matrix_A_<size>.txt` and `matrix_B_<size>.txt` for every size.
pub fn generate(config: &GenerateConfig) -> Result<Vec<PathBuf>, MatrixError> {
    create_dir(&config.data_dir)?;

    let mut written = Vec::with_capacity(config.sizes.len() * 2);
    for (idx, &size) in config.sizes.iter().enumerate() {
        let (seed_a, seed_b) = seeds_for(config.seed, idx);
        for (name, seed) in [("A", seed_a), ("B", seed_b)] {
            let path = matrix_path(&config.data_dir, name, size);
            random_matrix(size, size, seed).save_to_file(&path)?;
            info!("Generated {}x{} matrix {:?}", size, size, path);
            written.push(path);
        }
    }
    Ok(written)
}

//! File-backed matrix source and result sink.
//!
//! Inputs live in `<data_dir>/matrix_A_<size>.txt` and
//! `<data_dir>/matrix_B_<size>.txt`; results go to
//! `<results_dir>/result_<size>.txt`.

use std::fs;
use std::path::{Path, PathBuf};

use crate::engine::{Inputs, TaskError};
use crate::matrix::{Matrix, MatrixError};

#[derive(Debug, Clone)]
pub struct FileSource {
    data_dir: PathBuf,
    results_dir: PathBuf,
}

impl FileSource {
    pub fn new(data_dir: impl Into<PathBuf>, results_dir: impl Into<PathBuf>) -> Self {
        FileSource {
            data_dir: data_dir.into(),
            results_dir: results_dir.into(),
        }
    }

    pub fn matrix_a_path(&self, size: usize) -> PathBuf {
        matrix_path(&self.data_dir, "A", size)
    }

    pub fn matrix_b_path(&self, size: usize) -> PathBuf {
        matrix_path(&self.data_dir, "B", size)
    }

    pub fn result_path(&self, size: usize) -> PathBuf {
        self.results_dir.join(format!("result_{}.txt", size))
    }

    /// Load A and B for `size`. Any failure becomes a `LoadFailure` naming
    /// the file that could not be read.
    pub fn load(&self, size: usize) -> Inputs {
        let a = load_one(self.matrix_a_path(size))?;
        let b = load_one(self.matrix_b_path(size))?;
        Ok((a, b))
    }

    /// Write the result for `size`, creating the results directory if needed.
    pub fn store(&self, size: usize, result: &Matrix) -> Result<PathBuf, MatrixError> {
        create_dir(&self.results_dir)?;
        let path = self.result_path(size);
        result.save_to_file(&path)?;
        Ok(path)
    }
}

pub(crate) fn create_dir(path: &Path) -> Result<(), MatrixError> {
    fs::create_dir_all(path).map_err(|source| MatrixError::CreateDir {
        path: path.to_path_buf(),
        source,
    })
}

pub(crate) fn matrix_path(dir: &Path, name: &str, size: usize) -> PathBuf {
    dir.join(format!("matrix_{}_{}.txt", name, size))
}

fn load_one(path: PathBuf) -> Result<Matrix, TaskError> {
    Matrix::load_from_file(&path).map_err(|source| TaskError::LoadFailure { path, source })
}

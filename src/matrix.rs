use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::kernel;

/// Element type of every matrix the engine handles.
pub type Element = i32;

#[derive(Debug, Error)]
pub enum MatrixError {
    #[error("failed to open {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read line {line}: {source}")]
    Read {
        line: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse value {token:?} on line {line}")]
    Parse { line: usize, token: String },

    #[error("inconsistent column count on line {line}: expected {expected}, found {found}")]
    Ragged {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("matrix file is empty")]
    Empty,

    #[error("failed to create directory {path:?}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write matrix: {0}")]
    Write(#[from] std::io::Error),

    #[error("data length {len} does not match dimensions {rows}x{cols}")]
    Shape { len: usize, rows: usize, cols: usize },

    #[error("row range [{start}, {end}) out of bounds for {rows} rows")]
    RowRange { start: usize, end: usize, rows: usize },

    #[error("dimensions incompatible: {a_rows}x{a_cols} * {b_rows}x{b_cols}")]
    Incompatible {
        a_rows: usize,
        a_cols: usize,
        b_rows: usize,
        b_cols: usize,
    },
}

/// Dense row-major integer matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matrix {
    pub data: Vec<Element>,
    pub rows: usize,
    pub cols: usize,
}

/// Rows `[start, start + rows)` of some matrix, at full column width.
///
/// This is what moves between ranks: the coordinator cuts A into row blocks,
/// each rank turns its block into a result block with the same `start`, and
/// the gather puts every result block back at its plan offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowBlock {
    pub start: usize,
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<Element>,
}

impl Matrix {
    /// Create a zero-filled matrix with the given dimensions
    pub fn new(rows: usize, cols: usize) -> Self {
        Matrix {
            data: vec![0; rows * cols],
            rows,
            cols,
        }
    }

    /// Create a matrix from a flat row-major vector
    pub fn from_vec(data: Vec<Element>, rows: usize, cols: usize) -> Result<Self, MatrixError> {
        if data.len() != rows * cols {
            return Err(MatrixError::Shape {
                len: data.len(),
                rows,
                cols,
            });
        }
        Ok(Matrix { data, rows, cols })
    }

    /// Create a matrix from nested rows. Every row must have the same length.
    pub fn from_rows(rows: &[Vec<Element>]) -> Result<Self, MatrixError> {
        let cols = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(rows.len() * cols);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != cols {
                return Err(MatrixError::Ragged {
                    line: i + 1,
                    expected: cols,
                    found: row.len(),
                });
            }
            data.extend_from_slice(row);
        }
        Ok(Matrix {
            data,
            rows: rows.len(),
            cols,
        })
    }

    /// Load a matrix from a text file.
    /// Format: whitespace-separated integers, one row per line. Blank lines
    /// and trailing whitespace are ignored.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, MatrixError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| MatrixError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let reader = BufReader::new(file);
        let mut data = Vec::new();
        let mut rows = 0;
        let mut num_cols = None;

        for (idx, line) in reader.lines().enumerate() {
            let line_num = idx + 1;
            let line = line.map_err(|source| MatrixError::Read {
                line: line_num,
                source,
            })?;

            let before = data.len();
            for token in line.split_whitespace() {
                let value = token.parse::<Element>().map_err(|_| MatrixError::Parse {
                    line: line_num,
                    token: token.to_string(),
                })?;
                data.push(value);
            }
            let found = data.len() - before;
            if found == 0 {
                continue;
            }

            match num_cols {
                Some(expected) if expected != found => {
                    return Err(MatrixError::Ragged {
                        line: line_num,
                        expected,
                        found,
                    });
                }
                None => num_cols = Some(found),
                _ => {}
            }
            rows += 1;
        }

        let cols = num_cols.ok_or(MatrixError::Empty)?;
        Ok(Matrix { data, rows, cols })
    }

    /// Save a matrix to a text file, one row per line, each value followed
    /// by a single space.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), MatrixError> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        for i in 0..self.rows {
            let row_start = i * self.cols;
            for value in &self.data[row_start..row_start + self.cols] {
                write!(writer, "{} ", value)?;
            }
            writeln!(writer)?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Copy out rows `[start, start + count)` as a row block.
    pub fn row_block(&self, start: usize, count: usize) -> Result<RowBlock, MatrixError> {
        let end = start + count;
        if end > self.rows {
            return Err(MatrixError::RowRange {
                start,
                end,
                rows: self.rows,
            });
        }
        let data = self.data[start * self.cols..end * self.cols].to_vec();
        Ok(RowBlock {
            start,
            rows: count,
            cols: self.cols,
            data,
        })
    }

    /// Single-process product `self * other`, used as the baseline the
    /// distributed result is checked and timed against.
    pub fn multiply(&self, other: &Matrix) -> Result<Matrix, MatrixError> {
        let whole = self.row_block(0, self.rows)?;
        let product = kernel::multiply_block(&whole, other)?;
        Ok(Matrix {
            data: product.data,
            rows: self.rows,
            cols: other.cols,
        })
    }
}

impl RowBlock {
    /// An empty block at `start`. Ranks past the end of A get one of these.
    pub fn empty(start: usize, cols: usize) -> Self {
        RowBlock {
            start,
            rows: 0,
            cols,
            data: Vec::new(),
        }
    }

    /// Rebuild a block from the flat buffer a collective delivered.
    pub fn from_flat(
        start: usize,
        rows: usize,
        cols: usize,
        data: Vec<Element>,
    ) -> Result<Self, MatrixError> {
        if data.len() != rows * cols {
            return Err(MatrixError::Shape {
                len: data.len(),
                rows,
                cols,
            });
        }
        Ok(RowBlock {
            start,
            rows,
            cols,
            data,
        })
    }

    /// Flat row-major buffer for a collective send.
    pub fn into_flat(self) -> Vec<Element> {
        self.data
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }
}

//! Local multiply kernel run by every rank on its own row block.

use crate::matrix::{Element, Matrix, MatrixError, RowBlock};

/// Multiply a row block of A by the whole of B.
///
/// Returns the matching row block of `C = A * B`: same `start`, same row
/// count, `b.cols` columns. Products and sums wrap on overflow.
pub fn multiply_block(a: &RowBlock, b: &Matrix) -> Result<RowBlock, MatrixError> {
    if a.cols != b.rows {
        return Err(MatrixError::Incompatible {
            a_rows: a.rows,
            a_cols: a.cols,
            b_rows: b.rows,
            b_cols: b.cols,
        });
    }

    let mut out = vec![0; a.rows * b.cols];
    if b.cols > 0 {
        let a_rows = a.data.chunks_exact(a.cols.max(1));
        for (a_row, c_row) in a_rows.zip(out.chunks_exact_mut(b.cols)) {
            accumulate_row(a_row, b, c_row);
        }
    }

    RowBlock::from_flat(a.start, a.rows, b.cols, out)
}

// i, k, j order: the inner loop walks one row of B and one row of C.
fn accumulate_row(a_row: &[Element], b: &Matrix, c_row: &mut [Element]) {
    for (k, &a_ik) in a_row.iter().enumerate() {
        if a_ik == 0 {
            continue;
        }
        let b_row = &b.data[k * b.cols..(k + 1) * b.cols];
        for (c, &b_kj) in c_row.iter_mut().zip(b_row) {
            *c = c.wrapping_add(a_ik.wrapping_mul(b_kj));
        }
    }
}

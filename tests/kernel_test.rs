mod common;

use distributed_matrix_multiplication::kernel::multiply_block;
use distributed_matrix_multiplication::matrix::{Matrix, RowBlock};

/// Textbook i, j, k product for comparison.
fn naive(a: &Matrix, b: &Matrix) -> Vec<i32> {
    let mut out = vec![0i32; a.rows * b.cols];
    for i in 0..a.rows {
        for j in 0..b.cols {
            let mut sum = 0i32;
            for k in 0..a.cols {
                sum = sum.wrapping_add(a.data[i * a.cols + k].wrapping_mul(b.data[k * b.cols + j]));
            }
            out[i * b.cols + j] = sum;
        }
    }
    out
}

#[test]
fn test_block_keeps_offset_and_shape() {
    let a = common::patterned(6, 4, 1);
    let b = common::patterned(4, 3, 2);
    let block = a.row_block(2, 3).unwrap();

    let product = multiply_block(&block, &b).unwrap();
    assert_eq!(product.start, 2);
    assert_eq!(product.rows, 3);
    assert_eq!(product.cols, 3);

    let expected = naive(&a, &b);
    assert_eq!(product.data, expected[2 * 3..5 * 3].to_vec());
}

#[test]
fn test_matches_naive_order() {
    let a = common::patterned(9, 7, 3);
    let b = common::patterned(7, 5, 4);
    assert_eq!(a.multiply(&b).unwrap().data, naive(&a, &b));
}

#[test]
fn test_empty_block() {
    let b = common::patterned(4, 3, 0);
    let product = multiply_block(&RowBlock::empty(9, 4), &b).unwrap();
    assert!(product.is_empty());
    assert_eq!(product.start, 9);
    assert_eq!(product.cols, 3);
}

#[test]
fn test_zero_inner_dimension() {
    let block = RowBlock::from_flat(0, 2, 0, Vec::new()).unwrap();
    let b = Matrix::new(0, 3);
    let product = multiply_block(&block, &b).unwrap();
    assert_eq!(product.data, vec![0; 6]);
}

#[test]
fn test_mismatched_block_rejected() {
    let block = RowBlock::from_flat(0, 1, 2, vec![1, 2]).unwrap();
    let b = Matrix::new(3, 3);
    assert!(multiply_block(&block, &b).is_err());
}

#[test]
fn test_overflow_wraps() {
    let a = Matrix::from_vec(vec![i32::MAX, i32::MAX], 1, 2).unwrap();
    let b = Matrix::from_vec(vec![2, 1], 2, 1).unwrap();
    let c = a.multiply(&b).unwrap();
    let expected = i32::MAX.wrapping_mul(2).wrapping_add(i32::MAX);
    assert_eq!(c.data, vec![expected]);
}

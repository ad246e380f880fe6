//! Tests for the tensor matrix product and the matrix bridge.
//!
//! Products are checked against a naive triple loop over random seeded
//! data, through every combination of transposes.

use approx::assert_relative_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tensorview::{ErrorKind, Matrix, SparseColumns, TensorError, TensorShape, TensorView};

fn random_view(rng: &mut StdRng, dims: &[usize]) -> TensorView<f64> {
    let n: usize = dims.iter().product();
    TensorView::from_vec((0..n).map(|_| rng.gen_range(-1.0..1.0)).collect(), dims).unwrap()
}

/// `[rows x cols]` element `(i, j)` of a rank-2 view, optionally transposed.
fn at(t: &TensorView<f64>, transposed: bool, i: usize, j: usize) -> f64 {
    if transposed {
        t.get(&[j, i]).unwrap()
    } else {
        t.get(&[i, j]).unwrap()
    }
}

#[test]
fn test_all_transpose_combinations() {
    let (m, k, n) = (3, 4, 5);
    let mut rng = StdRng::seed_from_u64(42);
    for mask in 0..8u8 {
        let (ta, tb, tc) = (mask & 1 != 0, mask & 2 != 0, mask & 4 != 0);
        let a_dims = if ta { [k, m] } else { [m, k] };
        let b_dims = if tb { [n, k] } else { [k, n] };
        let c_dims = if tc { [n, m] } else { [m, n] };
        let a = random_view(&mut rng, &a_dims);
        let b = random_view(&mut rng, &b_dims);
        let c = random_view(&mut rng, &c_dims);
        let before = c.to_vec();

        c.do_matrix_product_of(0.5, tc, &a, ta, &b, tb, 2.0).unwrap();

        let c0 = TensorView::from_vec(before, c.shape().dims()).unwrap();
        for i in 0..m {
            for j in 0..n {
                let dot: f64 = (0..k).map(|p| at(&a, ta, i, p) * at(&b, tb, p, j)).sum();
                let expected = 0.5 * at(&c0, tc, i, j) + 2.0 * dot;
                assert_relative_eq!(at(&c, tc, i, j), expected, epsilon = 1e-12);
            }
        }
    }
}

#[test]
fn test_higher_rank_contraction() {
    // C[i, l] = sum_{j, k} A[i, j, k] * B[j, k, l]
    let mut rng = StdRng::seed_from_u64(7);
    let a = random_view(&mut rng, &[2, 3, 4]);
    let b = random_view(&mut rng, &[3, 4, 5]);
    let c = TensorView::zeros(&[2, 5]);
    c.assign_matrix_product_of(false, &a, false, &b, false).unwrap();

    for i in 0..2 {
        for l in 0..5 {
            let mut expected = 0.0;
            for j in 0..3 {
                for k in 0..4 {
                    expected += a.get(&[i, j, k]).unwrap() * b.get(&[j, k, l]).unwrap();
                }
            }
            assert_relative_eq!(c.get(&[i, l]).unwrap(), expected, epsilon = 1e-12);
        }
    }
}

#[test]
fn test_outer_product() {
    // no reduced axes: [3] x [1, 2] -> [3, 2] with a promoted to a column
    let a = TensorView::from_vec(vec![1.0, 2.0, 3.0], &[3, 1]).unwrap();
    let b = TensorView::from_vec(vec![10.0, 100.0], &[1, 2]).unwrap();
    let c = TensorView::zeros(&[3, 2]);
    c.assign_matrix_product_of(false, &a, false, &b, false).unwrap();
    assert_eq!(c.to_vec(), vec![10.0, 20.0, 30.0, 100.0, 200.0, 300.0]);
}

#[test]
fn test_rank_one_left_operand_is_a_row() {
    let a = TensorView::from_vec(vec![1.0, 2.0], &[2]).unwrap();
    let b = TensorView::from_vec(vec![1.0, 0.0, 0.0, 1.0, 1.0, 1.0], &[2, 3]).unwrap();
    let c = TensorView::zeros(&[3]);
    c.assign_matrix_product_of(false, &a, false, &b, false).unwrap();
    assert_eq!(c.to_vec(), vec![1.0, 2.0, 3.0]);
}

#[test]
fn test_rank_arithmetic_rejections() {
    let a: TensorView<f64> = TensorView::zeros(&[2, 3]);
    let b: TensorView<f64> = TensorView::zeros(&[3, 4]);

    // odd number of removed axes
    let c = TensorView::zeros(&[2, 4, 1]);
    let err = c.assign_matrix_product_of(false, &a, false, &b, false).unwrap_err();
    assert!(matches!(err, TensorError::MatrixProduct { .. }));

    // output rank exceeds the inputs
    let c = TensorView::zeros(&[2, 4, 1, 1, 1]);
    let err = c.assign_matrix_product_of(false, &a, false, &b, false).unwrap_err();
    assert!(matches!(err, TensorError::MatrixProduct { .. }));

    // inner extents disagree
    let b = TensorView::zeros(&[5, 4]);
    let c = TensorView::zeros(&[2, 4]);
    let err = c.assign_matrix_product_of(false, &a, false, &b, false).unwrap_err();
    assert!(err.to_string().contains("[2 x 3]"));
}

#[test]
fn test_non_contiguous_operand_rejected() {
    let backing: TensorView<f64> = TensorView::zeros(&[4, 3]);
    // every other row
    let a = backing.reviewed(TensorShape::from_parts(&[2, 3], &[2, 4], 0).unwrap());
    let b = TensorView::zeros(&[3, 2]);
    let c = TensorView::zeros(&[2, 2]);
    let err = c.assign_matrix_product_of(false, &a, false, &b, false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn test_product_into_column_slice() {
    let out: TensorView<f64> = TensorView::zeros(&[2, 4]);
    // columns 1..3 of `out`
    let c = out.reviewed(TensorShape::from_parts(&[2, 2], &[1, 2], 2).unwrap());
    let a = TensorView::from_vec(vec![1.0, 0.0, 0.0, 1.0], &[2, 2]).unwrap();
    let b = TensorView::from_vec(vec![1.0, 2.0, 3.0, 4.0], &[2, 2]).unwrap();
    c.assign_matrix_product_of(false, &a, false, &b, false).unwrap();
    assert_eq!(out.to_vec(), vec![0.0, 0.0, 1.0, 2.0, 3.0, 4.0, 0.0, 0.0]);
}

#[test]
fn test_as_matrix_round_trip() {
    let t = TensorView::from_vec((0..24).map(f64::from).collect(), &[2, 3, 4]).unwrap();
    let flat = t.reshaped(&[6, 4]).unwrap();
    let m = flat.as_matrix().unwrap();
    assert_eq!((m.rows(), m.cols()), (6, 4));
    let back = TensorView::new(m, TensorShape::new(&[2, 3, 4]));
    assert_eq!(back.to_vec(), t.to_vec());
    assert!(back.sob().shares_buffer_with(t.sob()));
}

#[test]
fn test_sparse_product_reads_columns() {
    // 3 x 4 sparse matrix with ones on the diagonal
    let sparse =
        SparseColumns::from_triplets(3, 4, &[(0, 0, 1.0), (1, 1, 1.0), (2, 2, 1.0)]).unwrap();
    let s = TensorView::from_matrix(Matrix::from_sparse(sparse));
    // columns 1..3 as a [3 x 2] operand
    let a = s.reviewed(TensorShape::from_parts(&[3, 2], &[1, 3], 3).unwrap());
    let b = TensorView::from_vec(vec![1.0, 1.0], &[2]).unwrap();
    let c = TensorView::zeros(&[3]);
    c.assign_matrix_product_of(false, &a, false, &b, false).unwrap();
    assert_eq!(c.to_vec(), vec![0.0, 1.0, 1.0]);
}

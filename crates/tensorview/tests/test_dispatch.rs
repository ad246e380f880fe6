//! Tests for elementwise dispatch: aliasing, reductions and the fused
//! linear-algebra paths.

use approx::assert_relative_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tensorview::{
    DispatchConfig, ElementWiseOperator as Op, FusedPattern, TensorShape, TensorView,
    classify_fused_pattern, negotiate,
};

fn random_view(rng: &mut StdRng, dims: &[usize]) -> TensorView<f64> {
    let n: usize = dims.iter().product();
    TensorView::from_vec((0..n).map(|_| rng.gen_range(-1.0..1.0)).collect(), dims).unwrap()
}

fn assert_views_close(x: &TensorView<f64>, y: &TensorView<f64>) {
    for (a, b) in x.to_vec().iter().zip(y.to_vec().iter()) {
        assert_relative_eq!(a, b, epsilon = 1e-12);
    }
}

/// Run the same binary op with and without fusion and compare.
fn fused_matches_generic(a_dims: &[usize], b_dims: &[usize], c_dims: &[usize], seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    let a = random_view(&mut rng, a_dims);
    let b = random_view(&mut rng, b_dims);
    let init = random_view(&mut rng, c_dims);

    let fused = TensorView::from_vec(init.to_vec(), c_dims).unwrap();
    let generic = TensorView::from_vec(init.to_vec(), c_dims).unwrap();
    fused
        .do_binary_op_of(0.25, &a, &b, 1.5, Op::ElementwiseProduct, Op::Sum)
        .unwrap();
    generic
        .do_binary_op_with(
            0.25,
            &a,
            &b,
            1.5,
            Op::ElementwiseProduct,
            Op::Sum,
            DispatchConfig { fuse_linear_algebra: false },
        )
        .unwrap();
    assert_views_close(&fused, &generic);
}

#[test]
fn test_dot_product_recognized() {
    let shapes = [
        TensorShape::new(&[13, 3, 42, 5]),
        TensorShape::new(&[13, 3, 42, 5]),
        TensorShape::new(&[1, 1, 42, 5]),
    ];
    let plan = negotiate(&shapes).unwrap();
    assert_eq!(
        classify_fused_pattern(Op::ElementwiseProduct, Op::Sum, &plan),
        Some(FusedPattern::DotProduct)
    );
}

#[test]
fn test_dot_product_matches_generic() {
    fused_matches_generic(&[13, 3, 42, 5], &[13, 3, 42, 5], &[1, 1, 42, 5], 7);
    fused_matches_generic(&[8], &[8], &[], 8);
    fused_matches_generic(&[4, 6], &[4, 6], &[1, 6], 9);
}

#[test]
fn test_gradient_matches_generic() {
    fused_matches_generic(&[1, 5], &[7, 5], &[7, 5], 10);
    fused_matches_generic(&[7, 5], &[1, 5], &[7, 5], 11);
    fused_matches_generic(&[6], &[1], &[6], 12);
}

#[test]
fn test_non_fusable_shapes_fall_back() {
    // reduction along a strided axis
    fused_matches_generic(&[4, 6], &[4, 6], &[4, 1], 13);
    // both inputs broadcast
    fused_matches_generic(&[1, 5], &[3, 1], &[3, 5], 14);
}

#[test]
fn test_dot_product_on_offset_views() {
    let mut rng = StdRng::seed_from_u64(21);
    let backing = random_view(&mut rng, &[4, 6]);
    // columns 2..5 of the backing storage
    let a = backing.reviewed(TensorShape::from_parts(&[4, 3], &[1, 4], 8).unwrap());
    let b = random_view(&mut rng, &[4, 3]);
    let c = TensorView::zeros(&[1, 3]);
    c.assign_elementwise_product_of(&a, &b).unwrap();
    for j in 0..3 {
        let expected: f64 = (0..4)
            .map(|i| a.get(&[i, j]).unwrap() * b.get(&[i, j]).unwrap())
            .sum();
        assert_relative_eq!(c.get(&[0, j]).unwrap(), expected, epsilon = 1e-12);
    }
}

#[test]
#[should_panic(expected = "logic error")]
fn test_reduction_into_aliased_input() {
    let a = TensorView::from_vec(vec![1.0, 2.0, 3.0, 4.0], &[2, 2]).unwrap();
    let col = a.reviewed(TensorShape::new(&[2, 1]));
    // same storage, different shape: not the same object, so this is fine
    col.do_unary_op_of(0.0, &a, 1.0, Op::Copy, Op::Sum).unwrap();
    let _ = col.do_binary_op_of(0.0, &a, &col, 1.0, Op::Sum, Op::Sum);
}

#[test]
fn test_reductions() {
    let a = TensorView::from_vec(vec![3.0, -1.0, 4.0, 1.0, -5.0, 9.0], &[2, 3]).unwrap();
    let c = TensorView::zeros(&[2, 1]);

    c.do_unary_op_of(0.0, &a, 1.0, Op::Copy, Op::Max).unwrap();
    assert_eq!(c.to_vec(), vec![4.0, 9.0]);
    c.do_unary_op_of(0.0, &a, 1.0, Op::Copy, Op::Min).unwrap();
    assert_eq!(c.to_vec(), vec![-5.0, -1.0]);
    c.do_unary_op_of(0.0, &a, 1.0, Op::Copy, Op::ElementwiseProduct).unwrap();
    assert_eq!(c.to_vec(), vec![-60.0, -9.0]);

    let s = TensorView::zeros(&[]);
    s.do_unary_op_of(0.0, &a, 1.0, Op::Copy, Op::LogSum).unwrap();
    let expected = a.to_vec().iter().map(|x: &f64| x.exp()).sum::<f64>().ln();
    assert_relative_eq!(s.get(&[]).unwrap(), expected, epsilon = 1e-12);
}

#[test]
fn test_beta_zero_discards_nan() {
    let a = TensorView::from_vec(vec![1.0, 2.0], &[2]).unwrap();
    let c = TensorView::from_vec(vec![f64::NAN, f64::NAN], &[2]).unwrap();
    c.assign_copy_of(&a).unwrap();
    assert_eq!(c.to_vec(), vec![1.0, 2.0]);
}

#[test]
fn test_difference_and_quaternary() {
    let a = TensorView::from_vec(vec![5.0, 7.0], &[2]).unwrap();
    let b = TensorView::from_vec(vec![1.0], &[1]).unwrap();
    let c = TensorView::zeros(&[2]);
    c.assign_difference_of(&a, &b).unwrap();
    assert_eq!(c.to_vec(), vec![4.0, 6.0]);

    // a * b + c * a
    let d = TensorView::zeros(&[2]);
    d.do_quaternary_op_of(0.0, &a, &b, &c, &a, 1.0, Op::AxBplusCxD, Op::Sum)
        .unwrap();
    assert_eq!(d.to_vec(), vec![25.0, 49.0]);
}

#[test]
fn test_f32_dispatch() {
    let a: TensorView<f32> = TensorView::from_vec(vec![1.0, 2.0, 3.0], &[3]).unwrap();
    let c: TensorView<f32> = TensorView::zeros(&[]);
    c.do_binary_op_of(0.0, &a, &a, 1.0, Op::ElementwiseProduct, Op::Sum).unwrap();
    assert_relative_eq!(c.get(&[]).unwrap(), 14.0f32);
}

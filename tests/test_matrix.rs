// Integration tests for the matrix engine: view aliasing, strided
// operations, and the transpose/multiply algebra.

use approx::assert_relative_eq;
use gradnet::matrix::{approx_eq, multiply, transpose, Matrix, MatrixRead, MatrixWrite};
use gradnet::utils::SimpleRng;

#[test]
fn view_and_parent_alias_both_directions() {
    let mut parent = Matrix::zeros(4, 4).unwrap();

    // Writing through a view mutates the parent...
    {
        let mut window = parent.view_mut(1, 1, 2, 2).unwrap();
        window.set(0, 0, 7.0);
        window.set(1, 1, 9.0);
    }
    assert_eq!(parent.at(1, 1), 7.0);
    assert_eq!(parent.at(2, 2), 9.0);

    // ...and writing the parent is visible through a fresh view.
    parent.set(1, 2, 5.0);
    let window = parent.view(1, 1, 2, 2).unwrap();
    assert_eq!(window.at(0, 1), 5.0);
}

#[test]
fn batch_slicing_with_views() {
    // Two row-batches of a 4x3 dataset, scaled independently in place.
    let mut data = Matrix::from_vec(
        4,
        3,
        vec![1.0, 1.0, 1.0, 2.0, 2.0, 2.0, 3.0, 3.0, 3.0, 4.0, 4.0, 4.0],
    )
    .unwrap();

    {
        let mut first = data.view_mut(0, 0, 2, 3).unwrap();
        first.scale(10.0);
    }
    {
        let mut second = data.view_mut(2, 0, 2, 3).unwrap();
        second.scale(100.0);
    }

    assert_eq!(data.at(0, 0), 10.0);
    assert_eq!(data.at(1, 2), 20.0);
    assert_eq!(data.at(2, 0), 300.0);
    assert_eq!(data.at(3, 2), 400.0);
}

#[test]
fn transpose_of_product_equals_product_of_transposes() {
    let mut rng = SimpleRng::new(1234);
    let mut a = Matrix::zeros(3, 4).unwrap();
    let mut b = Matrix::zeros(4, 5).unwrap();
    a.random_uniform(&mut rng, -1.0, 1.0);
    b.random_uniform(&mut rng, -1.0, 1.0);

    // transpose(A x B)
    let mut ab = Matrix::zeros(3, 5).unwrap();
    multiply(&a, &b, &mut ab).unwrap();
    let mut ab_t = Matrix::zeros(5, 3).unwrap();
    transpose(&ab, &mut ab_t).unwrap();

    // B^T x A^T
    let mut a_t = Matrix::zeros(4, 3).unwrap();
    let mut b_t = Matrix::zeros(5, 4).unwrap();
    transpose(&a, &mut a_t).unwrap();
    transpose(&b, &mut b_t).unwrap();
    let mut bt_at = Matrix::zeros(5, 3).unwrap();
    multiply(&b_t, &a_t, &mut bt_at).unwrap();

    assert!(approx_eq(&ab_t, &bt_at, 1e-5));
}

#[test]
fn multiply_with_strided_operands() {
    // Both operands are windows of larger buffers; the result must match the
    // same product on packed copies.
    let backing_a = Matrix::from_vec(
        3,
        4,
        vec![1.0, 2.0, 0.0, 0.0, 3.0, 4.0, 0.0, 0.0, 9.0, 9.0, 9.0, 9.0],
    )
    .unwrap();
    let backing_b = Matrix::from_vec(3, 3, vec![5.0, 6.0, 0.0, 7.0, 8.0, 0.0, 9.0, 9.0, 9.0])
        .unwrap();

    let a = backing_a.view(0, 0, 2, 2).unwrap();
    let b = backing_b.view(0, 0, 2, 2).unwrap();
    let mut out = Matrix::zeros(2, 2).unwrap();
    multiply(&a, &b, &mut out).unwrap();

    let packed_a = a.to_matrix();
    let packed_b = b.to_matrix();
    let mut expected = Matrix::zeros(2, 2).unwrap();
    multiply(&packed_a, &packed_b, &mut expected).unwrap();

    assert!(approx_eq(&out, &expected, 0.0));
    assert_relative_eq!(out.at(0, 0), 19.0, epsilon = 1e-5);
    assert_relative_eq!(out.at(1, 1), 50.0, epsilon = 1e-5);
}

#[test]
fn copy_into_view_updates_parent() {
    let mut parent = Matrix::zeros(3, 3).unwrap();
    let block = Matrix::from_vec(2, 2, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
    {
        let mut window = parent.view_mut(1, 1, 2, 2).unwrap();
        window.copy_from(&block).unwrap();
    }
    assert_eq!(parent.at(1, 1), 1.0);
    assert_eq!(parent.at(2, 2), 4.0);
    assert_eq!(parent.at(0, 0), 0.0);
}

#[test]
fn reductions_are_scan_order_independent_over_views() {
    let m = Matrix::from_vec(2, 4, vec![1.0, -2.0, 3.0, 9.0, -4.0, 5.0, -6.0, 9.0]).unwrap();
    let v = m.view(0, 0, 2, 3).unwrap();
    assert_relative_eq!(v.sum(), -3.0, epsilon = 1e-6);
    assert_relative_eq!(v.max().unwrap(), 5.0, epsilon = 1e-6);
    assert_relative_eq!(v.min().unwrap(), -6.0, epsilon = 1e-6);
}

#[test]
fn shape_errors_do_not_mutate() {
    let mut a = Matrix::from_vec(2, 2, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
    let b = Matrix::zeros(2, 3).unwrap();
    let before = a.clone();
    assert!(a.add(&b).is_err());
    assert!(a.subtract(&b).is_err());
    assert!(a.mul_elementwise(&b).is_err());
    assert!(approx_eq(&a, &before, 0.0));
}

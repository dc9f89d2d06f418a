//! Dense 2-D matrix engine with stride-aware addressing and borrowed views.
//!
//! The buffer model distinguishes owning matrices ([`Matrix`], stride equal
//! to the column count) from non-owning windows ([`MatrixView`] /
//! [`MatrixViewMut`], stride inherited from the parent). A view aliases the
//! parent's storage on purpose (writing through a mutable view writes the
//! parent) and the borrow checker guarantees the parent outlives every view
//! derived from it.
//!
//! All operations are shape-checked up front and do not touch their outputs
//! before the checks pass. The matrix product is a plain triple-loop
//! accumulation; enabling the `blas` cargo feature routes it through
//! `cblas::sgemm` with strides passed as leading dimensions, producing the
//! same result within floating tolerance.

use crate::error::{Error, Result};
use crate::utils::SimpleRng;

/// Read access to a strided row-major element buffer.
///
/// Implemented by [`Matrix`] and both view types so every consumer can work
/// with owned and borrowed storage interchangeably.
pub trait MatrixRead {
    /// Logical row count.
    fn rows(&self) -> usize;
    /// Logical column count.
    fn cols(&self) -> usize;
    /// Elements between the starts of consecutive logical rows.
    fn stride(&self) -> usize;
    /// Underlying buffer, starting at logical position (0, 0).
    fn buf(&self) -> &[f32];

    /// Logical shape as `(rows, cols)`.
    fn shape(&self) -> (usize, usize) {
        (self.rows(), self.cols())
    }

    /// Element at `(row, col)`.
    fn at(&self, row: usize, col: usize) -> f32 {
        self.buf()[row * self.stride() + col]
    }

    /// Contiguous slice covering logical row `row`.
    fn row(&self, row: usize) -> &[f32] {
        let start = row * self.stride();
        &self.buf()[start..start + self.cols()]
    }

    /// Sum of all elements.
    fn sum(&self) -> f32 {
        let mut total = 0.0f32;
        for r in 0..self.rows() {
            for &value in self.row(r) {
                total += value;
            }
        }
        total
    }

    /// Largest element; errors on an empty matrix.
    fn max(&self) -> Result<f32> {
        let mut best: Option<f32> = None;
        for r in 0..self.rows() {
            for &value in self.row(r) {
                best = Some(match best {
                    Some(b) if b >= value => b,
                    _ => value,
                });
            }
        }
        best.ok_or(Error::State("max of an empty matrix"))
    }

    /// Smallest element; errors on an empty matrix.
    fn min(&self) -> Result<f32> {
        let mut best: Option<f32> = None;
        for r in 0..self.rows() {
            for &value in self.row(r) {
                best = Some(match best {
                    Some(b) if b <= value => b,
                    _ => value,
                });
            }
        }
        best.ok_or(Error::State("min of an empty matrix"))
    }

    /// Materialize an owned, densely packed copy of this matrix.
    fn to_matrix(&self) -> Matrix {
        let mut data = Vec::with_capacity(self.rows() * self.cols());
        for r in 0..self.rows() {
            data.extend_from_slice(self.row(r));
        }
        Matrix {
            rows: self.rows(),
            cols: self.cols(),
            stride: self.cols(),
            data,
        }
    }
}

/// Write access on top of [`MatrixRead`]. All mutators honor the stride, so
/// they are safe on views; mutating a view mutates the parent's storage.
pub trait MatrixWrite: MatrixRead {
    /// Mutable underlying buffer, starting at logical position (0, 0).
    fn buf_mut(&mut self) -> &mut [f32];

    /// Store `value` at `(row, col)`.
    fn set(&mut self, row: usize, col: usize, value: f32) {
        let idx = row * self.stride() + col;
        self.buf_mut()[idx] = value;
    }

    /// Mutable slice covering logical row `row`.
    fn row_mut(&mut self, row: usize) -> &mut [f32] {
        let start = row * self.stride();
        let cols = self.cols();
        &mut self.buf_mut()[start..start + cols]
    }

    /// Set every element to `value`.
    fn fill(&mut self, value: f32) {
        for r in 0..self.rows() {
            self.row_mut(r).fill(value);
        }
    }

    /// Element-wise copy from `src`; shapes must match, strides may differ.
    fn copy_from<S: MatrixRead + ?Sized>(&mut self, src: &S) -> Result<()> {
        same_shape("copy", self, src)?;
        for r in 0..self.rows() {
            self.row_mut(r).copy_from_slice(src.row(r));
        }
        Ok(())
    }

    /// `self += other`, element-wise.
    fn add<S: MatrixRead + ?Sized>(&mut self, other: &S) -> Result<()> {
        same_shape("add", self, other)?;
        for r in 0..self.rows() {
            for (dst, &src) in self.row_mut(r).iter_mut().zip(other.row(r)) {
                *dst += src;
            }
        }
        Ok(())
    }

    /// `self -= other`, element-wise.
    fn subtract<S: MatrixRead + ?Sized>(&mut self, other: &S) -> Result<()> {
        same_shape("subtract", self, other)?;
        for r in 0..self.rows() {
            for (dst, &src) in self.row_mut(r).iter_mut().zip(other.row(r)) {
                *dst -= src;
            }
        }
        Ok(())
    }

    /// `self *= other`, element-wise (Hadamard product).
    fn mul_elementwise<S: MatrixRead + ?Sized>(&mut self, other: &S) -> Result<()> {
        same_shape("mul_elementwise", self, other)?;
        for r in 0..self.rows() {
            for (dst, &src) in self.row_mut(r).iter_mut().zip(other.row(r)) {
                *dst *= src;
            }
        }
        Ok(())
    }

    /// Multiply every element by `scalar`.
    fn scale(&mut self, scalar: f32) {
        for r in 0..self.rows() {
            for value in self.row_mut(r) {
                *value *= scalar;
            }
        }
    }

    /// Add `scalar` to every element.
    fn add_scalar(&mut self, scalar: f32) {
        for r in 0..self.rows() {
            for value in self.row_mut(r) {
                *value += scalar;
            }
        }
    }

    /// Replace every element with its square root.
    fn sqrt_inplace(&mut self) {
        for r in 0..self.rows() {
            for value in self.row_mut(r) {
                *value = value.sqrt();
            }
        }
    }

    /// Fill with uniform samples from `[low, high)`.
    fn random_uniform(&mut self, rng: &mut SimpleRng, low: f32, high: f32) {
        for r in 0..self.rows() {
            for value in self.row_mut(r) {
                *value = rng.gen_range_f32(low, high);
            }
        }
    }

    /// Fill with Gaussian samples (Box-Muller).
    fn random_normal(&mut self, rng: &mut SimpleRng, mean: f32, stddev: f32) {
        for r in 0..self.rows() {
            for value in self.row_mut(r) {
                *value = rng.next_normal(mean, stddev);
            }
        }
    }
}

fn same_shape<A, B>(op: &'static str, a: &A, b: &B) -> Result<()>
where
    A: MatrixRead + ?Sized,
    B: MatrixRead + ?Sized,
{
    if a.shape() != b.shape() {
        return Err(Error::ShapeMismatch {
            op,
            expected: a.shape(),
            actual: b.shape(),
        });
    }
    Ok(())
}

/// Owning dense matrix. The stride always equals the column count and the
/// buffer holds exactly `rows * cols` elements.
///
/// # Examples
///
/// ```
/// use gradnet::matrix::{Matrix, MatrixRead, MatrixWrite};
///
/// let mut m = Matrix::zeros(2, 3).unwrap();
/// m.set(1, 2, 5.0);
/// assert_eq!(m.at(1, 2), 5.0);
/// assert_eq!(m.sum(), 5.0);
/// ```
#[derive(Debug, Clone)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    stride: usize,
    data: Vec<f32>,
}

impl Matrix {
    /// Zero-filled matrix; fails when `rows * cols` overflows.
    pub fn zeros(rows: usize, cols: usize) -> Result<Self> {
        let len = rows
            .checked_mul(cols)
            .ok_or(Error::Allocation { rows, cols })?;
        Ok(Self {
            rows,
            cols,
            stride: cols,
            data: vec![0.0; len],
        })
    }

    /// Adopt a row-major buffer; its length must be exactly `rows * cols`.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f32>) -> Result<Self> {
        let len = rows
            .checked_mul(cols)
            .ok_or(Error::Allocation { rows, cols })?;
        if data.len() != len {
            return Err(Error::ShapeMismatch {
                op: "from_vec",
                expected: (rows, cols),
                actual: (1, data.len()),
            });
        }
        Ok(Self {
            rows,
            cols,
            stride: cols,
            data,
        })
    }

    /// Immutable window over `[row_start, row_start + rows) x
    /// [col_start, col_start + cols)`. The stride is inherited, so views of
    /// views keep addressing the original buffer correctly.
    pub fn view(
        &self,
        row_start: usize,
        col_start: usize,
        rows: usize,
        cols: usize,
    ) -> Result<MatrixView<'_>> {
        let (offset, len) =
            view_region(self.rows, self.cols, self.stride, row_start, col_start, rows, cols)?;
        Ok(MatrixView {
            rows,
            cols,
            stride: self.stride,
            data: &self.data[offset..offset + len],
        })
    }

    /// Mutable window; writes go straight to this matrix's storage.
    pub fn view_mut(
        &mut self,
        row_start: usize,
        col_start: usize,
        rows: usize,
        cols: usize,
    ) -> Result<MatrixViewMut<'_>> {
        let (offset, len) =
            view_region(self.rows, self.cols, self.stride, row_start, col_start, rows, cols)?;
        Ok(MatrixViewMut {
            rows,
            cols,
            stride: self.stride,
            data: &mut self.data[offset..offset + len],
        })
    }
}

// Validates the window and returns (buffer offset, slice length).
fn view_region(
    parent_rows: usize,
    parent_cols: usize,
    parent_stride: usize,
    row_start: usize,
    col_start: usize,
    rows: usize,
    cols: usize,
) -> Result<(usize, usize)> {
    let row_end = row_start.checked_add(rows);
    let col_end = col_start.checked_add(cols);
    match (row_end, col_end) {
        (Some(re), Some(ce)) if re <= parent_rows && ce <= parent_cols => {
            let offset = row_start * parent_stride + col_start;
            let len = if rows == 0 {
                0
            } else {
                (rows - 1) * parent_stride + cols
            };
            Ok((offset, len))
        }
        _ => Err(Error::ShapeMismatch {
            op: "view",
            expected: (parent_rows, parent_cols),
            actual: (row_start.saturating_add(rows), col_start.saturating_add(cols)),
        }),
    }
}

/// Non-owning immutable window into a parent matrix.
#[derive(Debug, Clone, Copy)]
pub struct MatrixView<'a> {
    rows: usize,
    cols: usize,
    stride: usize,
    data: &'a [f32],
}

impl<'a> MatrixView<'a> {
    /// Sub-window of this view, addressed in the view's own coordinates.
    pub fn view(
        &self,
        row_start: usize,
        col_start: usize,
        rows: usize,
        cols: usize,
    ) -> Result<MatrixView<'a>> {
        let (offset, len) =
            view_region(self.rows, self.cols, self.stride, row_start, col_start, rows, cols)?;
        Ok(MatrixView {
            rows,
            cols,
            stride: self.stride,
            data: &self.data[offset..offset + len],
        })
    }
}

/// Non-owning mutable window into a parent matrix. Writes alias the parent.
#[derive(Debug)]
pub struct MatrixViewMut<'a> {
    rows: usize,
    cols: usize,
    stride: usize,
    data: &'a mut [f32],
}

impl<'a> MatrixViewMut<'a> {
    /// Mutable sub-window of this view.
    pub fn view_mut(
        &mut self,
        row_start: usize,
        col_start: usize,
        rows: usize,
        cols: usize,
    ) -> Result<MatrixViewMut<'_>> {
        let (offset, len) =
            view_region(self.rows, self.cols, self.stride, row_start, col_start, rows, cols)?;
        Ok(MatrixViewMut {
            rows,
            cols,
            stride: self.stride,
            data: &mut self.data[offset..offset + len],
        })
    }
}

impl MatrixRead for Matrix {
    fn rows(&self) -> usize {
        self.rows
    }
    fn cols(&self) -> usize {
        self.cols
    }
    fn stride(&self) -> usize {
        self.stride
    }
    fn buf(&self) -> &[f32] {
        &self.data
    }
}

impl MatrixWrite for Matrix {
    fn buf_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }
}

impl MatrixRead for MatrixView<'_> {
    fn rows(&self) -> usize {
        self.rows
    }
    fn cols(&self) -> usize {
        self.cols
    }
    fn stride(&self) -> usize {
        self.stride
    }
    fn buf(&self) -> &[f32] {
        self.data
    }
}

impl MatrixRead for MatrixViewMut<'_> {
    fn rows(&self) -> usize {
        self.rows
    }
    fn cols(&self) -> usize {
        self.cols
    }
    fn stride(&self) -> usize {
        self.stride
    }
    fn buf(&self) -> &[f32] {
        self.data
    }
}

impl MatrixWrite for MatrixViewMut<'_> {
    fn buf_mut(&mut self) -> &mut [f32] {
        self.data
    }
}

/// Matrix product `out = a x b`.
///
/// Requires `a.cols == b.rows`, `out.rows == a.rows`, `out.cols == b.cols`.
/// The CPU path is a triple-loop accumulation; the `blas` feature dispatches
/// to `sgemm` with strides as leading dimensions, same contract.
pub fn multiply<A, B, C>(a: &A, b: &B, out: &mut C) -> Result<()>
where
    A: MatrixRead + ?Sized,
    B: MatrixRead + ?Sized,
    C: MatrixWrite + ?Sized,
{
    if a.cols() != b.rows() {
        return Err(Error::ShapeMismatch {
            op: "multiply",
            expected: (a.cols(), b.cols()),
            actual: b.shape(),
        });
    }
    if out.rows() != a.rows() || out.cols() != b.cols() {
        return Err(Error::ShapeMismatch {
            op: "multiply",
            expected: (a.rows(), b.cols()),
            actual: out.shape(),
        });
    }

    #[cfg(feature = "blas")]
    {
        gemm_blas(a, b, out);
        return Ok(());
    }

    #[cfg(not(feature = "blas"))]
    {
        for i in 0..a.rows() {
            for j in 0..b.cols() {
                let mut acc = 0.0f32;
                for k in 0..a.cols() {
                    acc += a.at(i, k) * b.at(k, j);
                }
                out.set(i, j, acc);
            }
        }
        Ok(())
    }
}

#[cfg(feature = "blas")]
fn gemm_blas<A, B, C>(a: &A, b: &B, out: &mut C)
where
    A: MatrixRead + ?Sized,
    B: MatrixRead + ?Sized,
    C: MatrixWrite + ?Sized,
{
    use cblas::{sgemm, Layout, Transpose};

    let (m, n, k) = (a.rows(), b.cols(), a.cols());
    let (lda, ldb, ldc) = (a.stride(), b.stride(), out.stride());
    unsafe {
        sgemm(
            Layout::RowMajor,
            Transpose::None,
            Transpose::None,
            m as i32,
            n as i32,
            k as i32,
            1.0,
            a.buf(),
            lda as i32,
            b.buf(),
            ldb as i32,
            0.0,
            out.buf_mut(),
            ldc as i32,
        );
    }
}

/// Transposed copy `dst = src^T`; `dst` must be `src.cols x src.rows`.
pub fn transpose<S, D>(src: &S, dst: &mut D) -> Result<()>
where
    S: MatrixRead + ?Sized,
    D: MatrixWrite + ?Sized,
{
    if dst.rows() != src.cols() || dst.cols() != src.rows() {
        return Err(Error::ShapeMismatch {
            op: "transpose",
            expected: (src.cols(), src.rows()),
            actual: dst.shape(),
        });
    }
    for i in 0..src.rows() {
        for j in 0..src.cols() {
            dst.set(j, i, src.at(i, j));
        }
    }
    Ok(())
}

/// Element-wise comparison within `tolerance`; shapes must match exactly.
pub fn approx_eq<A, B>(a: &A, b: &B, tolerance: f32) -> bool
where
    A: MatrixRead + ?Sized,
    B: MatrixRead + ?Sized,
{
    if a.shape() != b.shape() {
        return false;
    }
    for r in 0..a.rows() {
        for (&x, &y) in a.row(r).iter().zip(b.row(r)) {
            if (x - y).abs() > tolerance {
                return false;
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix_2x3() -> Matrix {
        Matrix::from_vec(2, 3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap()
    }

    #[test]
    fn test_zeros_is_zero_filled() {
        let m = Matrix::zeros(3, 4).unwrap();
        assert_eq!(m.shape(), (3, 4));
        assert_eq!(m.stride(), 4);
        assert!(m.buf().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_zeros_overflow_is_allocation_error() {
        let result = Matrix::zeros(usize::MAX, 2);
        assert!(matches!(result, Err(Error::Allocation { .. })));
    }

    #[test]
    fn test_from_vec_length_mismatch() {
        let result = Matrix::from_vec(2, 2, vec![1.0, 2.0, 3.0]);
        assert!(matches!(result, Err(Error::ShapeMismatch { .. })));
    }

    #[test]
    fn test_view_reads_parent_region() {
        let m = matrix_2x3();
        let v = m.view(0, 1, 2, 2).unwrap();
        assert_eq!(v.shape(), (2, 2));
        assert_eq!(v.stride(), 3);
        assert_eq!(v.at(0, 0), 2.0);
        assert_eq!(v.at(1, 1), 6.0);
    }

    #[test]
    fn test_view_mut_writes_parent() {
        let mut m = matrix_2x3();
        {
            let mut v = m.view_mut(1, 0, 1, 2).unwrap();
            v.set(0, 0, 40.0);
            v.set(0, 1, 50.0);
        }
        assert_eq!(m.at(1, 0), 40.0);
        assert_eq!(m.at(1, 1), 50.0);
        assert_eq!(m.at(1, 2), 6.0);
    }

    #[test]
    fn test_nested_views_keep_stride() {
        let m = matrix_2x3();
        let outer = m.view(0, 0, 2, 3).unwrap();
        let inner = outer.view(1, 1, 1, 2).unwrap();
        assert_eq!(inner.stride(), 3);
        assert_eq!(inner.at(0, 0), 5.0);
        assert_eq!(inner.at(0, 1), 6.0);
    }

    #[test]
    fn test_view_out_of_bounds() {
        let m = matrix_2x3();
        assert!(m.view(1, 0, 2, 3).is_err());
        assert!(m.view(0, 2, 1, 2).is_err());
    }

    #[test]
    fn test_copy_between_different_strides() {
        let src = matrix_2x3();
        let narrow = src.view(0, 1, 2, 2).unwrap();
        let mut dst = Matrix::zeros(2, 2).unwrap();
        dst.copy_from(&narrow).unwrap();
        assert_eq!(dst.at(0, 0), 2.0);
        assert_eq!(dst.at(1, 1), 6.0);
    }

    #[test]
    fn test_copy_shape_mismatch_leaves_dst_untouched() {
        let src = matrix_2x3();
        let mut dst = Matrix::zeros(3, 2).unwrap();
        assert!(dst.copy_from(&src).is_err());
        assert!(dst.buf().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_elementwise_ops() {
        let mut a = matrix_2x3();
        let b = matrix_2x3();

        a.add(&b).unwrap();
        assert_eq!(a.at(1, 2), 12.0);

        a.subtract(&b).unwrap();
        assert_eq!(a.at(1, 2), 6.0);

        a.mul_elementwise(&b).unwrap();
        assert_eq!(a.at(0, 1), 4.0);

        a.scale(0.5);
        assert_eq!(a.at(0, 1), 2.0);

        a.add_scalar(1.0);
        assert_eq!(a.at(0, 0), 1.5);
    }

    #[test]
    fn test_multiply_known_values() {
        let a = matrix_2x3();
        let b = Matrix::from_vec(3, 2, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let mut c = Matrix::zeros(2, 2).unwrap();
        multiply(&a, &b, &mut c).unwrap();
        assert_eq!(c.at(0, 0), 22.0);
        assert_eq!(c.at(0, 1), 28.0);
        assert_eq!(c.at(1, 0), 49.0);
        assert_eq!(c.at(1, 1), 64.0);
    }

    #[test]
    fn test_multiply_shape_errors() {
        let a = matrix_2x3();
        let b = matrix_2x3();
        let mut c = Matrix::zeros(2, 3).unwrap();
        assert!(matches!(
            multiply(&a, &b, &mut c),
            Err(Error::ShapeMismatch { op: "multiply", .. })
        ));

        let b = Matrix::zeros(3, 2).unwrap();
        let mut wrong_out = Matrix::zeros(3, 2).unwrap();
        assert!(multiply(&a, &b, &mut wrong_out).is_err());
    }

    #[test]
    fn test_multiply_on_views() {
        // Slice a batch of rows out of a larger buffer and multiply in place.
        let big = Matrix::from_vec(3, 3, vec![1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 9.0, 9.0, 9.0]).unwrap();
        let identity = big.view(0, 0, 2, 2).unwrap();
        let x = Matrix::from_vec(2, 2, vec![3.0, 4.0, 5.0, 6.0]).unwrap();
        let mut out = Matrix::zeros(2, 2).unwrap();
        multiply(&identity, &x, &mut out).unwrap();
        assert!(approx_eq(&out, &x, 1e-6));
    }

    #[test]
    fn test_transpose() {
        let a = matrix_2x3();
        let mut t = Matrix::zeros(3, 2).unwrap();
        transpose(&a, &mut t).unwrap();
        assert_eq!(t.at(0, 0), 1.0);
        assert_eq!(t.at(2, 1), 6.0);

        let mut wrong = Matrix::zeros(2, 3).unwrap();
        assert!(transpose(&a, &mut wrong).is_err());
    }

    #[test]
    fn test_reductions() {
        let m = matrix_2x3();
        assert_eq!(m.sum(), 21.0);
        assert_eq!(m.max().unwrap(), 6.0);
        assert_eq!(m.min().unwrap(), 1.0);
    }

    #[test]
    fn test_reductions_on_empty() {
        let m = Matrix::zeros(0, 3).unwrap();
        assert_eq!(m.sum(), 0.0);
        assert!(m.max().is_err());
        assert!(m.min().is_err());
    }

    #[test]
    fn test_random_uniform_range() {
        let mut rng = SimpleRng::new(7);
        let mut m = Matrix::zeros(8, 8).unwrap();
        m.random_uniform(&mut rng, -0.5, 0.5);
        for r in 0..8 {
            for &v in m.row(r) {
                assert!(v >= -0.5 && v < 0.5);
            }
        }
    }

    #[test]
    fn test_random_normal_fills_finite() {
        let mut rng = SimpleRng::new(21);
        let mut m = Matrix::zeros(16, 16).unwrap();
        m.random_normal(&mut rng, 0.0, 1.0);
        assert!(m.buf().iter().all(|v| v.is_finite()));
        // A 256-sample standard normal fill is never all zeros.
        assert!(m.buf().iter().any(|&v| v != 0.0));
    }

    #[test]
    fn test_sqrt_inplace() {
        let mut m = Matrix::from_vec(1, 3, vec![4.0, 9.0, 16.0]).unwrap();
        m.sqrt_inplace();
        assert_eq!(m.buf(), &[2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_fill() {
        let mut m = Matrix::zeros(2, 2).unwrap();
        m.fill(0.1);
        assert!(m.buf().iter().all(|&v| v == 0.1));
    }

    #[test]
    fn test_approx_eq() {
        let a = matrix_2x3();
        let mut b = matrix_2x3();
        assert!(approx_eq(&a, &b, 1e-6));
        b.set(0, 0, 1.5);
        assert!(!approx_eq(&a, &b, 1e-6));
        assert!(approx_eq(&a, &b, 1.0));
    }

    #[test]
    fn test_to_matrix_packs_views() {
        let m = matrix_2x3();
        let v = m.view(0, 1, 2, 2).unwrap();
        let packed = v.to_matrix();
        assert_eq!(packed.stride(), 2);
        assert_eq!(packed.buf(), &[2.0, 3.0, 5.0, 6.0]);
    }
}

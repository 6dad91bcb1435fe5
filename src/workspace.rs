//! Storage owned by one solve.
//!
//! [`Workspace`] keeps the iterate state, [`Arena`] is a single contiguous
//! scratch buffer that the subproblem solvers and the model evaluation borrow
//! as views. Both are sized from `$(n, m)$` once, so no iteration has to
//! allocate scratch vectors of its own.
//!
//! The storage that grows with `$m$` or `$n^2$` is reserved fallibly and a
//! failure is reported as [`NllsError::Allocation`]. The dense
//! factorizations of the subproblem solvers (eigen, Cholesky, SVD) still
//! allocate their `$O(n^2)$` results through nalgebra on every step.
use nalgebra::{DMatrix, DMatrixViewMut, DVector, DVectorViewMut};

use crate::error::NllsError;

/// Iterate state of one solve.
pub(crate) struct Workspace {
    pub f: DVector<f64>,
    pub fnew: DVector<f64>,
    pub j: DMatrix<f64>,
    /// Curvature term `$\sum_i f_i\nabla^2 f_i$`, exact or secant.
    pub hf: DMatrix<f64>,
    /// `$\mathbf{J}^\top\vec{f}$`
    pub g: DVector<f64>,
    pub d: DVector<f64>,
    pub xnew: DVector<f64>,
    // secant update
    pub g_old: DVector<f64>,
    /// `$\mathbf{J}_{\mathrm{old}}^\top\vec{f}_{\mathrm{new}}$`
    pub g_mixed: DVector<f64>,
    pub y: DVector<f64>,
    pub y_sharp: DVector<f64>,
    pub delta: f64,
    pub normd: f64,
    pub norm_f0: f64,
    pub norm_jf0: f64,
    pub norm_f: f64,
    pub norm_jf: f64,
    pub use_second_derivatives: bool,
    pub hybrid_count: usize,
    pub tr_nu: f64,
    pub tr_p: i32,
    pub arena: Arena,
}

impl Workspace {
    pub fn new(n: usize, m: usize) -> Result<Self, NllsError> {
        // largest buffers first, before anything of length n is touched
        let j = try_zeros_matrix(m, n)?;
        let arena = Arena::new(n, m)?;
        let hf = try_zeros_matrix(n, n)?;
        Ok(Self {
            f: try_zeros_vector(m)?,
            fnew: try_zeros_vector(m)?,
            j,
            hf,
            g: DVector::zeros(n),
            d: DVector::zeros(n),
            xnew: DVector::zeros(n),
            g_old: DVector::zeros(n),
            g_mixed: DVector::zeros(n),
            y: DVector::zeros(n),
            y_sharp: DVector::zeros(n),
            delta: 0.,
            normd: 0.,
            norm_f0: 0.,
            norm_jf0: 0.,
            norm_f: 0.,
            norm_jf: 0.,
            use_second_derivatives: false,
            hybrid_count: 0,
            tr_nu: 2.,
            tr_p: 3,
            arena,
        })
    }
}

/// `len` zeros, or [`NllsError::Allocation`] if they cannot be reserved.
fn try_zeroed(len: usize) -> Result<Vec<f64>, NllsError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| NllsError::Allocation {
            bytes: len.saturating_mul(core::mem::size_of::<f64>()),
        })?;
    buf.resize(len, 0.);
    Ok(buf)
}

fn try_zeros_matrix(nrows: usize, ncols: usize) -> Result<DMatrix<f64>, NllsError> {
    let len = nrows
        .checked_mul(ncols)
        .ok_or(NllsError::Allocation { bytes: usize::MAX })?;
    Ok(DMatrix::from_vec(nrows, ncols, try_zeroed(len)?))
}

fn try_zeros_vector(len: usize) -> Result<DVector<f64>, NllsError> {
    Ok(DVector::from_vec(try_zeroed(len)?))
}

/// Contiguous scratch memory, column-major.
pub(crate) struct Arena {
    buf: Vec<f64>,
    n: usize,
    m: usize,
}

/// Non-overlapping views into an [`Arena`].
pub(crate) struct Scratch<'a> {
    /// `$n\times n$` model Hessian, scaled in place when scaling is active.
    pub a: DMatrixViewMut<'a, f64>,
    /// `$n$`, the (scaled) gradient.
    pub v: DVectorViewMut<'a, f64>,
    /// `$n$`, the variable scaling. Survives between iterations.
    pub scale: DVectorViewMut<'a, f64>,
    /// `$n$`
    pub hd: DVectorViewMut<'a, f64>,
    /// `$m$`
    pub jd: DVectorViewMut<'a, f64>,
}

impl Arena {
    fn len(n: usize, m: usize) -> Option<usize> {
        n.checked_mul(n + 3)?.checked_add(m)
    }

    pub fn new(n: usize, m: usize) -> Result<Self, NllsError> {
        let len = Self::len(n, m).ok_or(NllsError::Allocation { bytes: usize::MAX })?;
        Ok(Self {
            buf: try_zeroed(len)?,
            n,
            m,
        })
    }

    pub fn scratch(&mut self) -> Scratch<'_> {
        let (n, m) = (self.n, self.m);
        let (a, rest) = self.buf.split_at_mut(n * n);
        let (v, rest) = rest.split_at_mut(n);
        let (scale, rest) = rest.split_at_mut(n);
        let (hd, jd) = rest.split_at_mut(n);
        debug_assert_eq!(jd.len(), m);
        Scratch {
            a: DMatrixViewMut::from_slice(a, n, n),
            v: DVectorViewMut::from_slice(v, n),
            scale: DVectorViewMut::from_slice(scale, n),
            hd: DVectorViewMut::from_slice(hd, n),
            jd: DVectorViewMut::from_slice(jd, m),
        }
    }
}

use nalgebra::{DMatrix, DVector};

use crate::problem::{EvalStatus, NllsProblem};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockCall {
    Residuals,
    Jacobian,
    Hessians,
}

/// Wraps a problem and records every callback invocation.
///
/// `fail_at` makes the `k`-th call (counting from zero) of the given kind
/// return `Err(status)` instead of evaluating.
pub struct MockProblem<P> {
    inner: P,
    call_history: Vec<MockCall>,
    params: Vec<DVector<f64>>,
    fail_at: Option<(MockCall, usize, i32)>,
}

impl<P: NllsProblem> MockProblem<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            call_history: vec![],
            params: vec![],
            fail_at: None,
        }
    }

    pub fn failing_at(self, call: MockCall, k: usize, status: i32) -> Self {
        Self {
            fail_at: Some((call, k, status)),
            ..self
        }
    }

    pub fn calls(&self) -> &[MockCall] {
        &self.call_history
    }

    /// Parameters passed to the residual callback, in order.
    pub fn params(&self) -> &[DVector<f64>] {
        &self.params
    }

    fn record(&mut self, call: MockCall) -> EvalStatus {
        let k = self.call_history.iter().filter(|&&c| c == call).count();
        self.call_history.push(call);
        match self.fail_at {
            Some((fail, at, status)) if fail == call && at == k => Err(status),
            _ => Ok(()),
        }
    }
}

impl<P: NllsProblem> NllsProblem for MockProblem<P> {
    fn residuals(&mut self, x: &DVector<f64>, f: &mut DVector<f64>) -> EvalStatus {
        self.params.push(x.clone());
        self.record(MockCall::Residuals)?;
        self.inner.residuals(x, f)
    }

    fn jacobian(&mut self, x: &DVector<f64>, j: &mut DMatrix<f64>) -> EvalStatus {
        self.record(MockCall::Jacobian)?;
        self.inner.jacobian(x, j)
    }

    fn hessians(&mut self, x: &DVector<f64>, f: &DVector<f64>, h: &mut DMatrix<f64>) -> EvalStatus {
        self.record(MockCall::Hessians)?;
        self.inner.hessians(x, f, h)
    }
}

/// `$\vec{f}(\vec{x}) = \mathbf{A}\vec{x} - \vec{b}$`.
pub struct LinearProblem {
    pub a: DMatrix<f64>,
    pub b: DVector<f64>,
}

impl NllsProblem for LinearProblem {
    fn residuals(&mut self, x: &DVector<f64>, f: &mut DVector<f64>) -> EvalStatus {
        f.copy_from(&(&self.a * x - &self.b));
        Ok(())
    }

    fn jacobian(&mut self, _x: &DVector<f64>, j: &mut DMatrix<f64>) -> EvalStatus {
        j.copy_from(&self.a);
        Ok(())
    }

    fn hessians(&mut self, _x: &DVector<f64>, _f: &DVector<f64>, h: &mut DMatrix<f64>) -> EvalStatus {
        h.fill(0.);
        Ok(())
    }
}

/// Rosenbrock's function as residuals `$(10(x_2 - x_1^2), 1 - x_1)$`.
pub struct Rosenbrock;

impl NllsProblem for Rosenbrock {
    fn residuals(&mut self, x: &DVector<f64>, f: &mut DVector<f64>) -> EvalStatus {
        f[0] = 10. * (x[1] - x[0] * x[0]);
        f[1] = 1. - x[0];
        Ok(())
    }

    fn jacobian(&mut self, x: &DVector<f64>, j: &mut DMatrix<f64>) -> EvalStatus {
        j[(0, 0)] = -20. * x[0];
        j[(0, 1)] = 10.;
        j[(1, 0)] = -1.;
        j[(1, 1)] = 0.;
        Ok(())
    }

    fn hessians(&mut self, _x: &DVector<f64>, f: &DVector<f64>, h: &mut DMatrix<f64>) -> EvalStatus {
        h.fill(0.);
        h[(0, 0)] = -20. * f[0];
        Ok(())
    }
}

//! Automatic differentiation support using `num-dual`.
//!
//! Property formulas written over [`Scalar`] evaluate in
//! [`Dual64`](num_dual::Dual64) as well as `f64`, which gives exact
//! forward-mode derivatives to check or replace hand-coded ones.
//!
//! # Example
//!
//! ```
//! use geochem::autodiff::pt_derivatives;
//! use geochem::fluids::IdealGas;
//!
//! let gas = IdealGas::new(1.4, 0.028);
//! let v = pt_derivatives(|p, t| gas.v(p, t), 1.0e5, 300.0);
//! assert!((v.dp + v.value / 1.0e5).abs() < 1e-15);
//! ```

use nalgebra::DMatrix;
use num_dual::{Dual64, DualNum};

use crate::fluids::{PtDerivatives, Scalar};

impl Scalar for Dual64 {
    fn ln(self) -> Self {
        DualNum::ln(&self)
    }

    fn sqrt(self) -> Self {
        DualNum::sqrt(&self)
    }
}

/// Evaluates `f(p, T)` with its partial derivatives, one dual evaluation
/// per variable.
pub fn pt_derivatives<F>(f: F, p: f64, t: f64) -> PtDerivatives
where
    F: Fn(Dual64, Dual64) -> Dual64,
{
    let by_p = f(Dual64::from(p).derivative(), Dual64::from(t));
    let by_t = f(Dual64::from(p), Dual64::from(t).derivative());
    PtDerivatives { value: by_p.re, dp: by_p.eps, dt: by_t.eps }
}

/// Computes the Jacobian of a vector function using forward-mode automatic
/// differentiation.
///
/// # Arguments
///
/// * `f` - The function taking a slice of variables and returning a Vec of values
/// * `x` - The point at which to evaluate the Jacobian
pub fn compute_jacobian<F>(f: F, x: &[f64]) -> DMatrix<f64>
where
    F: Fn(&[Dual64]) -> Vec<Dual64>,
{
    let n_vars = x.len();
    let mut columns: Vec<Vec<f64>> = Vec::with_capacity(n_vars);

    for j in 0..n_vars {
        let mut x_dual: Vec<Dual64> = x.iter().map(|&v| Dual64::from(v)).collect();
        x_dual[j] = Dual64::from(x[j]).derivative();
        columns.push(f(&x_dual).iter().map(|r| r.eps).collect());
    }

    let n_eqs = columns.first().map_or(0, Vec::len);
    DMatrix::from_fn(n_eqs, n_vars, |i, j| columns[j][i])
}

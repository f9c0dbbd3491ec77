//! Single-phase fluid properties and vapor mixtures.
//!
//! Equations of state implement [`SinglePhaseEos`], which evaluates
//! mass-specific properties from pressure [Pa] and temperature [K].
//! [`VaporMixture`] combines a primary component with any number of
//! secondary components, weighting specific properties by mass fraction, and
//! inverts `(v, e) -> (p, T)` with a 2x2 Newton iteration.
//!
//! # Example
//!
//! ```
//! use geochem::fluids::{IdealGas, VaporMixture, VaporMixtureSettings};
//!
//! let steam = IdealGas::new(1.43, 0.01801488);
//! let nitrogen = IdealGas::new(1.4, 0.028012734746);
//! let mut mixture =
//!     VaporMixture::new(Box::new(steam), vec![Box::new(nitrogen)], VaporMixtureSettings::default());
//!
//! let x = [0.7];
//! let v = mixture.v_from_p_t(1.0e5, 400.0, &x).unwrap();
//! let e = mixture.e_from_p_t(1.0e5, 400.0, &x).unwrap();
//! let p = mixture.p_from_v_e(v, e, &x).unwrap();
//! assert!((p - 1.0e5).abs() < 1e-3);
//! ```

mod ideal_gas;
mod mixture;

pub use ideal_gas::IdealGas;
pub use mixture::{MixtureDerivatives, PtSolve, VaporMixture, VaporMixtureSettings, VeDerivatives};

use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Result type for fluid-property calculations.
pub type FluidResult<T> = Result<T, FluidError>;

/// Errors that can occur during fluid-property calculations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FluidError {
    /// Invalid input conditions (e.g., negative temperature)
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// Mass fractions outside [0, 1] or summing to more than one
    #[error("Invalid mass fractions {fractions:?}: {reason}")]
    InvalidMassFractions { fractions: Vec<f64>, reason: String },
    /// Wrong number of secondary mass fractions
    #[error("Expected {expected} secondary mass fractions, got {got}")]
    MassFractionCount { expected: usize, got: usize },
}

/// Numeric type that property formulas are evaluated in.
///
/// Implemented for `f64`, and for `num_dual::Dual64` with the `autodiff`
/// feature, so the same formula yields values or forward-mode derivatives.
pub trait Scalar:
    Copy
    + From<f64>
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
{
    fn ln(self) -> Self;
    fn sqrt(self) -> Self;
}

impl Scalar for f64 {
    fn ln(self) -> Self {
        f64::ln(self)
    }

    fn sqrt(self) -> Self {
        f64::sqrt(self)
    }
}

/// A property value with its partial derivatives w.r.t. pressure and
/// temperature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PtDerivatives {
    pub value: f64,
    pub dp: f64,
    pub dt: f64,
}

/// Equation of state of a single-phase fluid, in mass-specific units.
///
/// Volume and internal energy carry derivatives because the `(v, e)`
/// inversion needs them; density and enthalpy follow from those.
pub trait SinglePhaseEos: fmt::Debug + Send + Sync {
    /// Molar mass [kg/mol].
    fn molar_mass(&self) -> f64;

    /// Specific volume [m^3/kg].
    fn v_from_p_t_derivs(&self, p: f64, t: f64) -> PtDerivatives;

    /// Specific internal energy [J/kg].
    fn e_from_p_t_derivs(&self, p: f64, t: f64) -> PtDerivatives;

    /// Specific entropy [J/(kg K)].
    fn s_from_p_t(&self, p: f64, t: f64) -> f64;

    /// Isobaric specific heat [J/(kg K)].
    fn cp_from_p_t(&self, p: f64, t: f64) -> f64;

    /// Isochoric specific heat [J/(kg K)].
    fn cv_from_p_t(&self, p: f64, t: f64) -> f64;

    /// Speed of sound [m/s].
    fn c_from_p_t(&self, p: f64, t: f64) -> f64;

    /// Dynamic viscosity [Pa s].
    fn mu_from_p_t(&self, p: f64, t: f64) -> f64;

    /// Thermal conductivity [W/(m K)].
    fn k_from_p_t(&self, p: f64, t: f64) -> f64;

    fn v_from_p_t(&self, p: f64, t: f64) -> f64 {
        self.v_from_p_t_derivs(p, t).value
    }

    fn e_from_p_t(&self, p: f64, t: f64) -> f64 {
        self.e_from_p_t_derivs(p, t).value
    }

    /// Density [kg/m^3].
    fn rho_from_p_t_derivs(&self, p: f64, t: f64) -> PtDerivatives {
        let v = self.v_from_p_t_derivs(p, t);
        let rho = 1.0 / v.value;
        PtDerivatives { value: rho, dp: -rho * rho * v.dp, dt: -rho * rho * v.dt }
    }

    fn rho_from_p_t(&self, p: f64, t: f64) -> f64 {
        1.0 / self.v_from_p_t(p, t)
    }

    /// Specific enthalpy [J/kg].
    fn h_from_p_t(&self, p: f64, t: f64) -> f64 {
        self.e_from_p_t(p, t) + p * self.v_from_p_t(p, t)
    }
}

/// Checks that `(p, t)` are finite and positive.
pub(crate) fn check_pt(p: f64, t: f64) -> FluidResult<()> {
    if !(p.is_finite() && p > 0.0) {
        return Err(FluidError::InvalidInput(format!("pressure must be positive, got {p}")));
    }
    if !(t.is_finite() && t > 0.0) {
        return Err(FluidError::InvalidInput(format!("temperature must be positive, got {t}")));
    }
    Ok(())
}

//! Vapor mixtures of single-phase components and the `(v, e) -> (p, T)`
//! inversion.

use serde::{Deserialize, Serialize};

use super::{check_pt, FluidError, FluidResult, PtDerivatives, SinglePhaseEos};

/// Step used for the forward differences w.r.t. secondary mass fractions.
const MASS_FRACTION_EPS: f64 = 1e-6;

/// Settings of the `(v, e) -> (p, T)` Newton solve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaporMixtureSettings {
    /// Initial pressure guess [Pa]
    pub p_initial_guess: f64,
    /// Initial temperature guess [K]
    pub t_initial_guess: f64,
    /// Tolerance on the norm of the relative residuals of v and e
    pub tolerance: f64,
    pub max_iterations: usize,
    /// Fraction of the Newton step taken (1.0 = full step)
    pub damping: f64,
    /// Start the next solve from the last converged (p, T)
    pub update_guesses: bool,
}

impl Default for VaporMixtureSettings {
    fn default() -> Self {
        VaporMixtureSettings {
            p_initial_guess: 1.0e5,
            t_initial_guess: 400.0,
            tolerance: 1e-8,
            max_iterations: 100,
            damping: 1.0,
            update_guesses: false,
        }
    }
}

/// Outcome of a `(v, e) -> (p, T)` solve.
///
/// Non-convergence is not an error: the caller decides whether to cut its
/// time step. Pressure and temperature then read as NaN.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PtSolve {
    Converged { p: f64, t: f64, iterations: usize },
    NotConverged { iterations: usize },
}

impl PtSolve {
    pub fn p(&self) -> f64 {
        match self {
            PtSolve::Converged { p, .. } => *p,
            PtSolve::NotConverged { .. } => f64::NAN,
        }
    }

    pub fn t(&self) -> f64 {
        match self {
            PtSolve::Converged { t, .. } => *t,
            PtSolve::NotConverged { .. } => f64::NAN,
        }
    }

    pub fn is_converged(&self) -> bool {
        matches!(self, PtSolve::Converged { .. })
    }

    pub fn iterations(&self) -> usize {
        match self {
            PtSolve::Converged { iterations, .. } | PtSolve::NotConverged { iterations } => *iterations,
        }
    }
}

/// A mixture property with derivatives w.r.t. pressure, temperature and each
/// secondary mass fraction.
#[derive(Debug, Clone, PartialEq)]
pub struct MixtureDerivatives {
    pub value: f64,
    pub dp: f64,
    pub dt: f64,
    pub dx: Vec<f64>,
}

/// Pressure or temperature from `(v, e)` with derivatives w.r.t. specific
/// volume, specific internal energy and each secondary mass fraction.
#[derive(Debug, Clone, PartialEq)]
pub struct VeDerivatives {
    pub value: f64,
    pub dv: f64,
    pub de: f64,
    pub dx: Vec<f64>,
}

impl VeDerivatives {
    fn nan(n_secondary: usize) -> Self {
        VeDerivatives { value: f64::NAN, dv: f64::NAN, de: f64::NAN, dx: vec![f64::NAN; n_secondary] }
    }
}

/// A primary vapor with secondary components.
///
/// Mass-specific properties are mass-fraction weighted sums over the
/// components evaluated at the mixture's `(p, T)`. Mass fractions are given
/// for the secondary components only; the primary takes the rest.
#[derive(Debug)]
pub struct VaporMixture {
    primary: Box<dyn SinglePhaseEos>,
    secondary: Vec<Box<dyn SinglePhaseEos>>,
    settings: VaporMixtureSettings,
    p_guess: f64,
    t_guess: f64,
}

impl VaporMixture {
    pub fn new(
        primary: Box<dyn SinglePhaseEos>,
        secondary: Vec<Box<dyn SinglePhaseEos>>,
        settings: VaporMixtureSettings,
    ) -> Self {
        let (p_guess, t_guess) = (settings.p_initial_guess, settings.t_initial_guess);
        VaporMixture { primary, secondary, settings, p_guess, t_guess }
    }

    pub fn num_secondary(&self) -> usize {
        self.secondary.len()
    }

    pub fn settings(&self) -> &VaporMixtureSettings {
        &self.settings
    }

    /// The `(p, T)` the next solve starts from.
    pub fn initial_guess(&self) -> (f64, f64) {
        (self.p_guess, self.t_guess)
    }

    /// Mass fraction of the primary component.
    pub fn primary_mass_fraction(&self, x: &[f64]) -> FluidResult<f64> {
        if x.len() != self.secondary.len() {
            return Err(FluidError::MassFractionCount { expected: self.secondary.len(), got: x.len() });
        }
        if x.iter().any(|xi| !(0.0..=1.0).contains(xi)) {
            return Err(FluidError::InvalidMassFractions {
                fractions: x.to_vec(),
                reason: "each must lie in [0, 1]".into(),
            });
        }
        let sum: f64 = x.iter().sum();
        if sum > 1.0 {
            return Err(FluidError::InvalidMassFractions {
                fractions: x.to_vec(),
                reason: format!("sum {sum} exceeds 1"),
            });
        }
        Ok(1.0 - sum)
    }

    /// Mass fractions of every component, primary first.
    pub fn secondary_to_all_mass_fractions(&self, x: &[f64]) -> FluidResult<Vec<f64>> {
        let primary = self.primary_mass_fraction(x)?;
        Ok(std::iter::once(primary).chain(x.iter().copied()).collect())
    }

    fn components(&self) -> impl Iterator<Item = &dyn SinglePhaseEos> {
        std::iter::once(&*self.primary).chain(self.secondary.iter().map(|c| &**c))
    }

    fn weighted<F>(&self, x: &[f64], f: F) -> FluidResult<f64>
    where
        F: Fn(&dyn SinglePhaseEos) -> f64,
    {
        let w = self.secondary_to_all_mass_fractions(x)?;
        Ok(self.components().zip(&w).map(|(c, wi)| wi * f(c)).sum())
    }

    /// Mass-fraction weighted value and derivatives, with `dx_i` the
    /// difference between secondary `i` and the primary.
    fn weighted_derivs<F>(&self, x: &[f64], f: F) -> FluidResult<MixtureDerivatives>
    where
        F: Fn(&dyn SinglePhaseEos) -> PtDerivatives,
    {
        let w = self.secondary_to_all_mass_fractions(x)?;
        let per_component: Vec<PtDerivatives> = self.components().map(f).collect();
        let mut out = MixtureDerivatives { value: 0.0, dp: 0.0, dt: 0.0, dx: Vec::with_capacity(x.len()) };
        for (d, wi) in per_component.iter().zip(&w) {
            out.value += wi * d.value;
            out.dp += wi * d.dp;
            out.dt += wi * d.dt;
        }
        let primary = per_component[0].value;
        out.dx.extend(per_component[1..].iter().map(|d| d.value - primary));
        Ok(out)
    }

    /// Mole fractions of every component, primary first.
    pub fn mole_fractions(&self, x: &[f64]) -> FluidResult<Vec<f64>> {
        let w = self.secondary_to_all_mass_fractions(x)?;
        let moles: Vec<f64> = self.components().zip(&w).map(|(c, wi)| wi / c.molar_mass()).collect();
        let total: f64 = moles.iter().sum();
        Ok(moles.into_iter().map(|n| n / total).collect())
    }

    /// Molar mass of the mixture [kg/mol], the mass-fraction weighted
    /// harmonic mean of the component molar masses.
    pub fn molar_mass(&self, x: &[f64]) -> FluidResult<f64> {
        self.weighted(x, |c| 1.0 / c.molar_mass()).map(|inv| 1.0 / inv)
    }

    pub fn v_from_p_t(&self, p: f64, t: f64, x: &[f64]) -> FluidResult<f64> {
        check_pt(p, t)?;
        self.weighted(x, |c| c.v_from_p_t(p, t))
    }

    pub fn v_from_p_t_derivs(&self, p: f64, t: f64, x: &[f64]) -> FluidResult<MixtureDerivatives> {
        check_pt(p, t)?;
        self.weighted_derivs(x, |c| c.v_from_p_t_derivs(p, t))
    }

    pub fn rho_from_p_t(&self, p: f64, t: f64, x: &[f64]) -> FluidResult<f64> {
        self.v_from_p_t(p, t, x).map(|v| 1.0 / v)
    }

    pub fn rho_from_p_t_derivs(&self, p: f64, t: f64, x: &[f64]) -> FluidResult<MixtureDerivatives> {
        let v = self.v_from_p_t_derivs(p, t, x)?;
        let rho = 1.0 / v.value;
        let scale = -rho * rho;
        Ok(MixtureDerivatives {
            value: rho,
            dp: scale * v.dp,
            dt: scale * v.dt,
            dx: v.dx.iter().map(|d| scale * d).collect(),
        })
    }

    pub fn e_from_p_t(&self, p: f64, t: f64, x: &[f64]) -> FluidResult<f64> {
        check_pt(p, t)?;
        self.weighted(x, |c| c.e_from_p_t(p, t))
    }

    pub fn e_from_p_t_derivs(&self, p: f64, t: f64, x: &[f64]) -> FluidResult<MixtureDerivatives> {
        check_pt(p, t)?;
        self.weighted_derivs(x, |c| c.e_from_p_t_derivs(p, t))
    }

    pub fn h_from_p_t(&self, p: f64, t: f64, x: &[f64]) -> FluidResult<f64> {
        check_pt(p, t)?;
        self.weighted(x, |c| c.h_from_p_t(p, t))
    }

    /// Entropy without an ideal mixing contribution.
    pub fn s_from_p_t(&self, p: f64, t: f64, x: &[f64]) -> FluidResult<f64> {
        check_pt(p, t)?;
        self.weighted(x, |c| c.s_from_p_t(p, t))
    }

    pub fn cp_from_p_t(&self, p: f64, t: f64, x: &[f64]) -> FluidResult<f64> {
        check_pt(p, t)?;
        self.weighted(x, |c| c.cp_from_p_t(p, t))
    }

    pub fn cv_from_p_t(&self, p: f64, t: f64, x: &[f64]) -> FluidResult<f64> {
        check_pt(p, t)?;
        self.weighted(x, |c| c.cv_from_p_t(p, t))
    }

    /// Speed of sound from `c^2 = -v^2 / (dv/dp)_s`, with
    /// `(dv/dp)_s = (dv/dp)_T + T (dv/dT)_p^2 / cp`.
    pub fn c_from_p_t(&self, p: f64, t: f64, x: &[f64]) -> FluidResult<f64> {
        let v = self.v_from_p_t_derivs(p, t, x)?;
        let cp = self.cp_from_p_t(p, t, x)?;
        let dv_dp_s = v.dp + t * v.dt * v.dt / cp;
        Ok((-v.value * v.value / dv_dp_s).sqrt())
    }

    /// Mole-fraction weighted viscosity.
    pub fn mu_from_p_t(&self, p: f64, t: f64, x: &[f64]) -> FluidResult<f64> {
        check_pt(p, t)?;
        let y = self.mole_fractions(x)?;
        Ok(self.components().zip(&y).map(|(c, yi)| yi * c.mu_from_p_t(p, t)).sum())
    }

    /// Mole-fraction weighted thermal conductivity.
    pub fn k_from_p_t(&self, p: f64, t: f64, x: &[f64]) -> FluidResult<f64> {
        check_pt(p, t)?;
        let y = self.mole_fractions(x)?;
        Ok(self.components().zip(&y).map(|(c, yi)| yi * c.k_from_p_t(p, t)).sum())
    }

    /// v and e of the mixture with all mass fractions `w` given, skipping
    /// validation so that perturbed fractions can be evaluated.
    fn ve_unchecked(&self, p: f64, t: f64, w: &[f64]) -> (PtDerivatives, PtDerivatives) {
        let zero = PtDerivatives { value: 0.0, dp: 0.0, dt: 0.0 };
        self.components().zip(w).fold((zero, zero), |(mut v, mut e), (c, wi)| {
            let vc = c.v_from_p_t_derivs(p, t);
            let ec = c.e_from_p_t_derivs(p, t);
            v.value += wi * vc.value;
            v.dp += wi * vc.dp;
            v.dt += wi * vc.dt;
            e.value += wi * ec.value;
            e.dp += wi * ec.dp;
            e.dt += wi * ec.dt;
            (v, e)
        })
    }

    /// Damped Newton iteration on `[v(p, T) - v, e(p, T) - e]` from
    /// `(p0, t0)`. Returns the outcome and the residual norm of every
    /// iteration.
    fn newton(&self, v: f64, e: f64, w: &[f64], p0: f64, t0: f64) -> (PtSolve, Vec<f64>) {
        let e_scale = if e != 0.0 { e.abs() } else { 1.0 };
        let (mut p, mut t) = (p0, t0);
        let mut trace = Vec::new();

        for iteration in 0..self.settings.max_iterations {
            if !(p.is_finite() && t.is_finite() && p > 0.0 && t > 0.0) {
                return (PtSolve::NotConverged { iterations: iteration }, trace);
            }
            let (vm, em) = self.ve_unchecked(p, t, w);
            let rv = vm.value - v;
            let re = em.value - e;
            let norm = ((rv / v.abs()).powi(2) + (re / e_scale).powi(2)).sqrt();
            trace.push(norm);
            if norm < self.settings.tolerance {
                return (PtSolve::Converged { p, t, iterations: iteration }, trace);
            }

            // 2x2 elimination
            let det = vm.dp * em.dt - vm.dt * em.dp;
            if det == 0.0 || !det.is_finite() {
                return (PtSolve::NotConverged { iterations: iteration }, trace);
            }
            let dp = (em.dt * rv - vm.dt * re) / det;
            let dt = (vm.dp * re - em.dp * rv) / det;
            p -= self.settings.damping * dp;
            t -= self.settings.damping * dt;
        }

        (PtSolve::NotConverged { iterations: self.settings.max_iterations }, trace)
    }

    /// Solves for `(p, T)` given specific volume `v` and specific internal
    /// energy `e`.
    ///
    /// Returns an error only for invalid inputs. Non-convergence yields
    /// [`PtSolve::NotConverged`] and a warning through `log`.
    pub fn solve_pt(&mut self, v: f64, e: f64, x: &[f64]) -> FluidResult<PtSolve> {
        if !(v.is_finite() && v > 0.0) {
            return Err(FluidError::InvalidInput(format!("specific volume must be positive, got {v}")));
        }
        if !e.is_finite() {
            return Err(FluidError::InvalidInput(format!("specific internal energy must be finite, got {e}")));
        }
        let w = self.secondary_to_all_mass_fractions(x)?;
        let (outcome, trace) = self.newton(v, e, &w, self.p_guess, self.t_guess);
        match outcome {
            PtSolve::Converged { p, t, .. } => {
                if self.settings.update_guesses {
                    self.p_guess = p;
                    self.t_guess = t;
                }
            }
            PtSolve::NotConverged { iterations } => {
                log::warn!(
                    "(p, T) from (v, e) did not converge after {iterations} iterations: v = {v}, e = {e}, \
                     x = {x:?}, initial guess ({}, {}), residual norms {trace:?}",
                    self.p_guess,
                    self.t_guess
                );
            }
        }
        Ok(outcome)
    }

    /// Pressure from `(v, e)`, NaN when the solve does not converge.
    pub fn p_from_v_e(&mut self, v: f64, e: f64, x: &[f64]) -> FluidResult<f64> {
        self.solve_pt(v, e, x).map(|s| s.p())
    }

    /// Temperature from `(v, e)`, NaN when the solve does not converge.
    pub fn t_from_v_e(&mut self, v: f64, e: f64, x: &[f64]) -> FluidResult<f64> {
        self.solve_pt(v, e, x).map(|s| s.t())
    }

    pub fn p_from_v_e_derivs(&mut self, v: f64, e: f64, x: &[f64]) -> FluidResult<VeDerivatives> {
        self.pt_from_v_e_derivs(v, e, x).map(|(p, _)| p)
    }

    pub fn t_from_v_e_derivs(&mut self, v: f64, e: f64, x: &[f64]) -> FluidResult<VeDerivatives> {
        self.pt_from_v_e_derivs(v, e, x).map(|(_, t)| t)
    }

    /// `(p, T)` with derivatives. Derivatives w.r.t. `(v, e)` come from the
    /// inverse of the converged Jacobian; those w.r.t. the mass fractions
    /// from a forward difference of a full solve per secondary component.
    fn pt_from_v_e_derivs(&mut self, v: f64, e: f64, x: &[f64]) -> FluidResult<(VeDerivatives, VeDerivatives)> {
        let n = self.secondary.len();
        let (p, t) = match self.solve_pt(v, e, x)? {
            PtSolve::Converged { p, t, .. } => (p, t),
            PtSolve::NotConverged { .. } => return Ok((VeDerivatives::nan(n), VeDerivatives::nan(n))),
        };
        let w = self.secondary_to_all_mass_fractions(x)?;
        let (vm, em) = self.ve_unchecked(p, t, &w);
        let det = vm.dp * em.dt - vm.dt * em.dp;

        let mut dp_dx = Vec::with_capacity(n);
        let mut dt_dx = Vec::with_capacity(n);
        for i in 0..n {
            let mut perturbed = w.clone();
            perturbed[i + 1] += MASS_FRACTION_EPS;
            perturbed[0] -= MASS_FRACTION_EPS;
            let (outcome, _) = self.newton(v, e, &perturbed, p, t);
            dp_dx.push((outcome.p() - p) / MASS_FRACTION_EPS);
            dt_dx.push((outcome.t() - t) / MASS_FRACTION_EPS);
        }

        Ok((
            VeDerivatives { value: p, dv: em.dt / det, de: -vm.dt / det, dx: dp_dx },
            VeDerivatives { value: t, dv: -em.dp / det, de: vm.dp / det, dx: dt_dx },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::IDEAL_GAS_CONSTANT;
    use crate::fluids::IdealGas;
    use approx::assert_relative_eq;

    fn steam() -> IdealGas {
        IdealGas::new(1.43, 0.01801488)
    }

    fn nitrogen() -> IdealGas {
        IdealGas::new(1.4, 0.028012734746)
    }

    fn mixture(settings: VaporMixtureSettings) -> VaporMixture {
        VaporMixture::new(Box::new(steam()), vec![Box::new(nitrogen())], settings)
    }

    #[test]
    fn test_specific_volume_of_steam_nitrogen() {
        let mix = mixture(VaporMixtureSettings::default());
        let x = [0.7];
        let v = mix.v_from_p_t(1.0e5, 400.0, &x).unwrap();
        // saved value
        assert_relative_eq!(v, 1.38490747936373, max_relative = 1e-8);

        let m = mix.molar_mass(&x).unwrap();
        assert_relative_eq!(v, IDEAL_GAS_CONSTANT * 400.0 / (m * 1.0e5), max_relative = 1e-12);
        assert_relative_eq!(mix.rho_from_p_t(1.0e5, 400.0, &x).unwrap(), 1.0 / v, max_relative = 1e-14);
    }

    #[test]
    fn test_round_trip() {
        let mut mix = mixture(VaporMixtureSettings::default());
        for (x, p, t) in [(0.7, 1.0e5, 400.0), (0.4, 1.0e5, 400.0), (0.4, 1.6e5, 450.0)] {
            let x = [x];
            let v = mix.v_from_p_t(p, t, &x).unwrap();
            let e = mix.e_from_p_t(p, t, &x).unwrap();
            let solve = mix.solve_pt(v, e, &x).unwrap();
            assert!(solve.is_converged());
            assert_relative_eq!(solve.p(), p, max_relative = 1e-8);
            assert_relative_eq!(solve.t(), t, max_relative = 1e-8);
            assert_relative_eq!(mix.p_from_v_e(v, e, &x).unwrap(), p, max_relative = 1e-8);
            assert_relative_eq!(mix.t_from_v_e(v, e, &x).unwrap(), t, max_relative = 1e-8);
        }
    }

    #[test]
    fn test_property_derivatives() {
        let mix = mixture(VaporMixtureSettings::default());
        let (p, t, x) = (1.0e5, 400.0, [0.4]);
        let h_p = 1.0e-2;
        let h_t = 1.0e-4;
        let h_x = 1.0e-7;
        type Prop = fn(&VaporMixture, f64, f64, &[f64]) -> FluidResult<f64>;
        type PropDerivs = fn(&VaporMixture, f64, f64, &[f64]) -> FluidResult<MixtureDerivatives>;
        let cases: [(Prop, PropDerivs); 3] = [
            (VaporMixture::v_from_p_t, VaporMixture::v_from_p_t_derivs),
            (VaporMixture::e_from_p_t, VaporMixture::e_from_p_t_derivs),
            (VaporMixture::rho_from_p_t, VaporMixture::rho_from_p_t_derivs),
        ];
        for (value, derivs) in cases {
            let d = derivs(&mix, p, t, &x).unwrap();
            assert_relative_eq!(d.value, value(&mix, p, t, &x).unwrap(), max_relative = 1e-14);
            let fd_p = (value(&mix, p + h_p, t, &x).unwrap() - value(&mix, p - h_p, t, &x).unwrap()) / (2.0 * h_p);
            let fd_t = (value(&mix, p, t + h_t, &x).unwrap() - value(&mix, p, t - h_t, &x).unwrap()) / (2.0 * h_t);
            let fd_x = (value(&mix, p, t, &[x[0] + h_x]).unwrap() - value(&mix, p, t, &[x[0] - h_x]).unwrap())
                / (2.0 * h_x);
            assert_relative_eq!(d.dp, fd_p, epsilon = 1e-12, max_relative = 1e-6);
            assert_relative_eq!(d.dt, fd_t, max_relative = 1e-6);
            assert_relative_eq!(d.dx[0], fd_x, max_relative = 1e-6);
        }
    }

    #[test]
    fn test_pt_derivatives_from_v_e() {
        let mut mix = mixture(VaporMixtureSettings::default());
        let (p, t, x) = (1.2e5, 420.0, [0.4]);
        let v = mix.v_from_p_t(p, t, &x).unwrap();
        let e = mix.e_from_p_t(p, t, &x).unwrap();

        // for ideal gases p = R_mix e / (cv_mix v) and T = e / cv_mix
        let r_mix = |x: f64| IDEAL_GAS_CONSTANT * ((1.0 - x) / 0.01801488 + x / 0.028012734746);
        let cv_mix = |x: f64| (1.0 - x) * steam().cv() + x * nitrogen().cv();

        let dp = mix.p_from_v_e_derivs(v, e, &x).unwrap();
        assert_relative_eq!(dp.value, p, max_relative = 1e-8);
        assert_relative_eq!(dp.dv, -p / v, max_relative = 1e-7);
        assert_relative_eq!(dp.de, r_mix(x[0]) / (cv_mix(x[0]) * v), max_relative = 1e-7);
        let h = 1.0e-6;
        let p_of_x = |x: f64| r_mix(x) * e / (cv_mix(x) * v);
        let expected_dx = (p_of_x(x[0] + h) - p_of_x(x[0] - h)) / (2.0 * h);
        assert_relative_eq!(dp.dx[0], expected_dx, max_relative = 1e-4);

        let dt = mix.t_from_v_e_derivs(v, e, &x).unwrap();
        assert_relative_eq!(dt.value, t, max_relative = 1e-8);
        assert!(dt.dv.abs() < 1e-12);
        assert_relative_eq!(dt.de, 1.0 / cv_mix(x[0]), max_relative = 1e-7);
        let t_of_x = |x: f64| e / cv_mix(x);
        let expected_dx = (t_of_x(x[0] + h) - t_of_x(x[0] - h)) / (2.0 * h);
        assert_relative_eq!(dt.dx[0], expected_dx, max_relative = 1e-4);
    }

    #[test]
    fn test_non_convergence_reports_nan() {
        let settings = VaporMixtureSettings { max_iterations: 1, ..VaporMixtureSettings::default() };
        let mut mix = mixture(settings);
        let x = [0.4];
        let v = mix.v_from_p_t(3.0e5, 600.0, &x).unwrap();
        let e = mix.e_from_p_t(3.0e5, 600.0, &x).unwrap();

        let solve = mix.solve_pt(v, e, &x).unwrap();
        assert_eq!(solve, PtSolve::NotConverged { iterations: 1 });
        assert!(mix.p_from_v_e(v, e, &x).unwrap().is_nan());
        assert!(mix.t_from_v_e(v, e, &x).unwrap().is_nan());
        let d = mix.p_from_v_e_derivs(v, e, &x).unwrap();
        assert!(d.value.is_nan() && d.dv.is_nan() && d.de.is_nan() && d.dx[0].is_nan());
    }

    #[test]
    fn test_update_guesses() {
        let x = [0.4];
        let mut fixed = mixture(VaporMixtureSettings::default());
        let v = fixed.v_from_p_t(2.0e5, 500.0, &x).unwrap();
        let e = fixed.e_from_p_t(2.0e5, 500.0, &x).unwrap();
        let first = fixed.solve_pt(v, e, &x).unwrap();
        assert!(first.iterations() > 0);
        assert_eq!(fixed.initial_guess(), (1.0e5, 400.0));

        let mut cached = mixture(VaporMixtureSettings { update_guesses: true, ..VaporMixtureSettings::default() });
        cached.solve_pt(v, e, &x).unwrap();
        let (p, t) = cached.initial_guess();
        assert_relative_eq!(p, 2.0e5, max_relative = 1e-8);
        assert_relative_eq!(t, 500.0, max_relative = 1e-8);
        // starting at the answer converges immediately
        assert_eq!(cached.solve_pt(v, e, &x).unwrap().iterations(), 0);
    }

    #[test]
    fn test_mass_fraction_validation() {
        let mut mix = mixture(VaporMixtureSettings::default());
        assert_relative_eq!(mix.primary_mass_fraction(&[0.3]).unwrap(), 0.7, max_relative = 1e-15);
        assert!(matches!(
            mix.v_from_p_t(1.0e5, 400.0, &[0.3, 0.2]),
            Err(FluidError::MassFractionCount { expected: 1, got: 2 })
        ));
        assert!(matches!(mix.primary_mass_fraction(&[1.2]), Err(FluidError::InvalidMassFractions { .. })));
        assert!(matches!(mix.primary_mass_fraction(&[-0.1]), Err(FluidError::InvalidMassFractions { .. })));
        assert!(mix.v_from_p_t(-1.0, 400.0, &[0.3]).is_err());
        assert!(matches!(mix.solve_pt(-1.0, 1.0e5, &[0.3]), Err(FluidError::InvalidInput(_))));

        let three = VaporMixture::new(
            Box::new(steam()),
            vec![Box::new(nitrogen()), Box::new(IdealGas::new(1.3, 0.044))],
            VaporMixtureSettings::default(),
        );
        let w = three.secondary_to_all_mass_fractions(&[0.3, 0.2]).unwrap();
        assert_relative_eq!(w[0], 0.5, max_relative = 1e-15);
        assert_eq!(&w[1..], &[0.3, 0.2]);
        assert!(three.primary_mass_fraction(&[0.6, 0.6]).is_err());
    }

    #[test]
    fn test_mixture_properties() {
        let mix = mixture(VaporMixtureSettings::default());
        let (p, t) = (1.0e5, 400.0);

        // a pure primary reproduces the component
        let pure = [0.0];
        assert_relative_eq!(mix.c_from_p_t(p, t, &pure).unwrap(), steam().c_from_p_t(p, t), max_relative = 1e-12);
        assert_relative_eq!(mix.s_from_p_t(p, t, &pure).unwrap(), steam().s_from_p_t(p, t), max_relative = 1e-14);
        assert_relative_eq!(mix.h_from_p_t(p, t, &pure).unwrap(), steam().h_from_p_t(p, t), max_relative = 1e-14);

        let x = [0.5];
        let cp = mix.cp_from_p_t(p, t, &x).unwrap();
        let cv = mix.cv_from_p_t(p, t, &x).unwrap();
        assert_relative_eq!(cp, 0.5 * (steam().cp() + nitrogen().cp()), max_relative = 1e-14);
        assert_relative_eq!(cv, 0.5 * (steam().cv() + nitrogen().cv()), max_relative = 1e-14);
        // ideal-gas mixture: c^2 = (cp/cv) R_mix T
        let r_mix = IDEAL_GAS_CONSTANT / mix.molar_mass(&x).unwrap();
        assert_relative_eq!(mix.c_from_p_t(p, t, &x).unwrap(), (cp / cv * r_mix * t).sqrt(), max_relative = 1e-12);

        let y = mix.mole_fractions(&x).unwrap();
        assert_relative_eq!(y[0] + y[1], 1.0, max_relative = 1e-15);
        assert!(y[0] > y[1]);
        let gas_a = steam().with_viscosity(1.0e-5);
        let gas_b = nitrogen().with_viscosity(2.0e-5);
        let visc = VaporMixture::new(Box::new(gas_a), vec![Box::new(gas_b)], VaporMixtureSettings::default());
        assert_relative_eq!(visc.mu_from_p_t(p, t, &x).unwrap(), y[0] * 1.0e-5 + y[1] * 2.0e-5, max_relative = 1e-14);
        assert_relative_eq!(visc.k_from_p_t(p, t, &x).unwrap(), 25.68e-3, max_relative = 1e-14);
    }

    #[test]
    fn test_settings_serde() {
        let settings: VaporMixtureSettings = serde_json::from_str(r#"{"update_guesses": true}"#).unwrap();
        assert!(settings.update_guesses);
        assert_eq!(settings.max_iterations, 100);
        assert_eq!(settings.tolerance, 1e-8);
    }
}

//! Calorically perfect ideal gas.

use serde::{Deserialize, Serialize};

use super::{PtDerivatives, Scalar, SinglePhaseEos};
use crate::constants::IDEAL_GAS_CONSTANT;

/// Ideal gas with constant heat capacities.
///
/// `e = cv T`, `v = R T / (M p)`, with `cv = R / (M (gamma - 1))`.
/// Viscosity and thermal conductivity are constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdealGas {
    /// Ratio of specific heats cp/cv
    pub gamma: f64,
    /// Molar mass [kg/mol]
    pub molar_mass: f64,
    /// Dynamic viscosity [Pa s]
    #[serde(default = "default_mu")]
    pub mu: f64,
    /// Thermal conductivity [W/(m K)]
    #[serde(default = "default_k")]
    pub k: f64,
}

fn default_mu() -> f64 {
    18.23e-6
}

fn default_k() -> f64 {
    25.68e-3
}

impl IdealGas {
    pub fn new(gamma: f64, molar_mass: f64) -> Self {
        IdealGas { gamma, molar_mass, mu: default_mu(), k: default_k() }
    }

    pub fn with_viscosity(mut self, mu: f64) -> Self {
        self.mu = mu;
        self
    }

    pub fn with_thermal_conductivity(mut self, k: f64) -> Self {
        self.k = k;
        self
    }

    /// Specific gas constant R/M [J/(kg K)].
    pub fn specific_gas_constant(&self) -> f64 {
        IDEAL_GAS_CONSTANT / self.molar_mass
    }

    pub fn cv(&self) -> f64 {
        self.specific_gas_constant() / (self.gamma - 1.0)
    }

    pub fn cp(&self) -> f64 {
        self.gamma * self.cv()
    }

    pub fn v<S: Scalar>(&self, p: S, t: S) -> S {
        S::from(self.specific_gas_constant()) * t / p
    }

    pub fn e<S: Scalar>(&self, _p: S, t: S) -> S {
        S::from(self.cv()) * t
    }

    pub fn rho<S: Scalar>(&self, p: S, t: S) -> S {
        p / (S::from(self.specific_gas_constant()) * t)
    }

    /// Entropy relative to the state `T = 1 K`, `p = 1 Pa`.
    pub fn s<S: Scalar>(&self, p: S, t: S) -> S {
        S::from(self.cv()) * (S::from(self.gamma) * t.ln() - S::from(self.gamma - 1.0) * p.ln())
    }

    pub fn c<S: Scalar>(&self, _p: S, t: S) -> S {
        (S::from(self.gamma * self.specific_gas_constant()) * t).sqrt()
    }
}

impl SinglePhaseEos for IdealGas {
    fn molar_mass(&self) -> f64 {
        self.molar_mass
    }

    fn v_from_p_t_derivs(&self, p: f64, t: f64) -> PtDerivatives {
        let v = self.v(p, t);
        PtDerivatives { value: v, dp: -v / p, dt: v / t }
    }

    fn e_from_p_t_derivs(&self, p: f64, t: f64) -> PtDerivatives {
        PtDerivatives { value: self.e(p, t), dp: 0.0, dt: self.cv() }
    }

    fn s_from_p_t(&self, p: f64, t: f64) -> f64 {
        self.s(p, t)
    }

    fn cp_from_p_t(&self, _p: f64, _t: f64) -> f64 {
        self.cp()
    }

    fn cv_from_p_t(&self, _p: f64, _t: f64) -> f64 {
        self.cv()
    }

    fn c_from_p_t(&self, p: f64, t: f64) -> f64 {
        self.c(p, t)
    }

    fn mu_from_p_t(&self, _p: f64, _t: f64) -> f64 {
        self.mu
    }

    fn k_from_p_t(&self, _p: f64, _t: f64) -> f64 {
        self.k
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn steam() -> IdealGas {
        IdealGas::new(1.43, 0.01801488)
    }

    #[test]
    fn test_ideal_gas_state() {
        let gas = steam();
        let (p, t) = (1.0e5, 400.0);
        let r = IDEAL_GAS_CONSTANT / 0.01801488;
        assert_relative_eq!(gas.v_from_p_t(p, t), r * t / p, max_relative = 1e-14);
        assert_relative_eq!(gas.rho_from_p_t(p, t), p / (r * t), max_relative = 1e-14);
        assert_relative_eq!(gas.cp_from_p_t(p, t) - gas.cv_from_p_t(p, t), r, max_relative = 1e-12);
        assert_relative_eq!(gas.cp() / gas.cv(), 1.43, max_relative = 1e-14);
        assert_relative_eq!(gas.e_from_p_t(p, t), gas.cv() * t, max_relative = 1e-14);
        assert_relative_eq!(gas.c_from_p_t(p, t), (1.43 * r * t).sqrt(), max_relative = 1e-14);
    }

    #[test]
    fn test_ideal_gas_derivatives() {
        let gas = steam();
        let (p, t) = (3.0e5, 500.0);
        let h = 1.0e-4;
        let v = gas.v_from_p_t_derivs(p, t);
        let fd_p = (gas.v_from_p_t(p + h, t) - gas.v_from_p_t(p - h, t)) / (2.0 * h);
        let fd_t = (gas.v_from_p_t(p, t + h) - gas.v_from_p_t(p, t - h)) / (2.0 * h);
        assert_relative_eq!(v.dp, fd_p, max_relative = 1e-6);
        assert_relative_eq!(v.dt, fd_t, max_relative = 1e-6);

        let e = gas.e_from_p_t_derivs(p, t);
        assert_eq!(e.dp, 0.0);
        assert_relative_eq!(e.dt, gas.cv(), max_relative = 1e-14);
    }

    #[test]
    fn test_ideal_gas_entropy_isentrope() {
        // along p^(1 - gamma) T^gamma = const the entropy is unchanged
        let gas = IdealGas::new(1.4, 0.028012734746);
        let (p1, t1): (f64, f64) = (1.0e5, 300.0);
        let p2 = 4.0e5;
        let t2 = t1 * (p2 / p1).powf((1.4 - 1.0) / 1.4);
        assert_relative_eq!(gas.s_from_p_t(p1, t1), gas.s_from_p_t(p2, t2), max_relative = 1e-12);
    }

    #[test]
    fn test_ideal_gas_transport_and_serde() {
        let gas = steam().with_viscosity(1.2e-5).with_thermal_conductivity(0.025);
        assert_eq!(gas.mu_from_p_t(1.0e5, 400.0), 1.2e-5);
        assert_eq!(gas.k_from_p_t(1.0e5, 400.0), 0.025);

        let parsed: IdealGas = serde_json::from_str(r#"{"gamma": 1.4, "molar_mass": 0.028}"#).unwrap();
        assert_eq!(parsed.mu, 18.23e-6);
        assert_eq!(parsed.k, 25.68e-3);
    }
}

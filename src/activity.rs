//! Activity coefficients and ionic strength.
//!
//! The geochemical system computes ionic strengths with [`IonicStrength`] and
//! hands them to an [`ActivityModel`], which then fills in the activity
//! coefficients of basis and equilibrium species and the activity of water.
//!
//! Two models are provided:
//!
//! - [`IdealActivity`]: every coefficient is one, water activity is one
//! - [`DaviesActivity`]: the Davies extension of Debye-Hueckel theory

use serde::{Deserialize, Serialize};

use crate::constants::MOLES_PER_KG_WATER;
use crate::database::ModelDatabase;

/// Computes the ionic strength and the stoichiometric ionic strength of a
/// solution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IonicStrength {
    /// Upper bound on the ionic strength [mol/kg]
    pub max_ionic_strength: f64,
    /// Upper bound on the stoichiometric ionic strength [mol/kg]
    pub max_stoichiometric_ionic_strength: f64,
    /// Only use basis molalities (ignore equilibrium and kinetic species)
    pub use_only_basis_molality: bool,
}

impl Default for IonicStrength {
    fn default() -> Self {
        IonicStrength {
            max_ionic_strength: 3.0,
            max_stoichiometric_ionic_strength: 3.0,
            use_only_basis_molality: false,
        }
    }
}

impl IonicStrength {
    pub fn new(max_ionic_strength: f64, max_stoichiometric_ionic_strength: f64) -> Self {
        IonicStrength { max_ionic_strength, max_stoichiometric_ionic_strength, use_only_basis_molality: false }
    }

    pub fn with_only_basis_molality(mut self, only_basis: bool) -> Self {
        self.use_only_basis_molality = only_basis;
        self
    }

    /// `0.5 sum m z^2` over dissolved species, bounded by `max_ionic_strength`.
    ///
    /// `kin_moles` are converted to molalities with the solvent mass
    /// `basis_molality[0]`.
    pub fn ionic_strength(
        &self,
        db: &ModelDatabase,
        basis_molality: &[f64],
        eqm_molality: &[f64],
        kin_moles: &[f64],
    ) -> f64 {
        let mut sum = 0.0;
        for (i, sp) in db.basis.iter().enumerate().skip(1) {
            if !sp.is_mineral() && !sp.is_gas() {
                sum += basis_molality[i] * sp.charge * sp.charge;
            }
        }
        if !self.use_only_basis_molality {
            for (j, sp) in db.eqm.iter().enumerate() {
                if !sp.is_mineral() && !sp.is_gas() && !db.is_sorbed(j) {
                    sum += eqm_molality[j] * sp.charge * sp.charge;
                }
            }
            let nw = basis_molality[0];
            for (k, sp) in db.kinetic.iter().enumerate() {
                if !sp.is_mineral() && !sp.is_gas() {
                    sum += kin_moles[k] / nw * sp.charge * sp.charge;
                }
            }
        }
        (0.5 * sum).clamp(0.0, self.max_ionic_strength)
    }

    /// Like [`ionic_strength`](Self::ionic_strength), but neutral equilibrium
    /// and kinetic complexes are split into their basis constituents.
    pub fn stoichiometric_ionic_strength(
        &self,
        db: &ModelDatabase,
        basis_molality: &[f64],
        eqm_molality: &[f64],
        kin_moles: &[f64],
    ) -> f64 {
        let nb = db.num_basis();
        let mut sum = 0.0;
        for (i, sp) in db.basis.iter().enumerate().skip(1) {
            if !sp.is_mineral() && !sp.is_gas() {
                sum += basis_molality[i] * sp.charge * sp.charge;
            }
        }
        if !self.use_only_basis_molality {
            for (j, sp) in db.eqm.iter().enumerate() {
                if sp.is_mineral() || sp.is_gas() || db.is_sorbed(j) {
                    continue;
                }
                if sp.charge != 0.0 {
                    sum += eqm_molality[j] * sp.charge * sp.charge;
                } else {
                    for i in 1..nb {
                        let z = db.basis[i].charge;
                        sum += db.eqm_stoichiometry[(j, i)] * eqm_molality[j] * z * z;
                    }
                }
            }
            let nw = basis_molality[0];
            for (k, sp) in db.kinetic.iter().enumerate() {
                if sp.is_mineral() || sp.is_gas() {
                    continue;
                }
                let m = kin_moles[k] / nw;
                if sp.charge != 0.0 {
                    sum += m * sp.charge * sp.charge;
                } else {
                    for i in 1..nb {
                        let z = db.basis[i].charge;
                        sum += db.kin_stoichiometry[(k, i)] * m * z * z;
                    }
                }
            }
        }
        (0.5 * sum).clamp(0.0, self.max_stoichiometric_ionic_strength)
    }
}

/// Source of activity coefficients for the geochemical system.
pub trait ActivityModel: std::fmt::Debug {
    /// Updates temperature [C] and ionic strengths before coefficients are built.
    fn set_internal_parameters(&mut self, temperature: f64, ionic_strength: f64, stoichiometric_ionic_strength: f64);

    /// Fills the activity coefficients of the basis and equilibrium species.
    fn build_activity_coefficients(&self, db: &ModelDatabase, basis_coef: &mut [f64], eqm_coef: &mut [f64]);

    /// Activity of the solvent.
    fn water_activity(&self) -> f64;
}

/// Ideal solution: all activity coefficients are one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IdealActivity;

impl ActivityModel for IdealActivity {
    fn set_internal_parameters(
        &mut self,
        _temperature: f64,
        _ionic_strength: f64,
        _stoichiometric_ionic_strength: f64,
    ) {
    }

    fn build_activity_coefficients(&self, _db: &ModelDatabase, basis_coef: &mut [f64], eqm_coef: &mut [f64]) {
        basis_coef.fill(1.0);
        eqm_coef.fill(1.0);
    }

    fn water_activity(&self) -> f64 {
        1.0
    }
}

/// Davies activity model.
///
/// `log10 gamma = -A(T) z^2 (sqrt(I) / (1 + sqrt(I)) - 0.3 I)` with the
/// Debye-Hueckel `A` parameter quadratic in temperature. Minerals, gases
/// and neutral species have unit coefficients. The water activity uses the
/// dilute osmotic approximation `ln a_w = -M_w * 2 I_stoich`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DaviesActivity {
    temperature: f64,
    ionic_strength: f64,
    stoichiometric_ionic_strength: f64,
}

impl DaviesActivity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Debye-Hueckel `A` parameter at temperature `t` [C].
    pub fn debye_huckel_a(t: f64) -> f64 {
        0.4913 + 7.127e-4 * t + 1.333e-7 * t * t
    }

    /// Activity coefficient of a species with charge `z`.
    pub fn coefficient(&self, z: f64) -> f64 {
        if z == 0.0 {
            return 1.0;
        }
        let sqrt_i = self.ionic_strength.sqrt();
        let log10_gamma = -Self::debye_huckel_a(self.temperature)
            * z
            * z
            * (sqrt_i / (1.0 + sqrt_i) - 0.3 * self.ionic_strength);
        10f64.powf(log10_gamma)
    }
}

impl ActivityModel for DaviesActivity {
    fn set_internal_parameters(&mut self, temperature: f64, ionic_strength: f64, stoichiometric_ionic_strength: f64) {
        self.temperature = temperature;
        self.ionic_strength = ionic_strength;
        self.stoichiometric_ionic_strength = stoichiometric_ionic_strength;
    }

    fn build_activity_coefficients(&self, db: &ModelDatabase, basis_coef: &mut [f64], eqm_coef: &mut [f64]) {
        for (coef, sp) in basis_coef.iter_mut().zip(db.basis.iter()) {
            *coef = if sp.is_mineral() || sp.is_gas() || sp.is_water() { 1.0 } else { self.coefficient(sp.charge) };
        }
        for (coef, sp) in eqm_coef.iter_mut().zip(db.eqm.iter()) {
            *coef = if sp.is_mineral() || sp.is_gas() { 1.0 } else { self.coefficient(sp.charge) };
        }
    }

    fn water_activity(&self) -> f64 {
        let ln_aw = -2.0 * self.stoichiometric_ionic_strength / MOLES_PER_KG_WATER;
        ln_aw.exp().clamp(f64::MIN_POSITIVE, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Species;
    use crate::log10k::Log10KModel;

    fn db() -> ModelDatabase {
        let basis = vec![
            Species::water(),
            Species::aqueous("Na+", 1.0),
            Species::aqueous("Cl-", -1.0),
            Species::aqueous("Ca++", 2.0),
            Species::mineral("Quartz"),
        ];
        let mut db = ModelDatabase::new(basis, vec![25.0], Log10KModel::PiecewiseLinear).unwrap();
        db.add_equilibrium_species(Species::aqueous("NaCl", 0.0), &[("Na+", 1.0), ("Cl-", 1.0)], &[0.78])
            .unwrap();
        db.add_equilibrium_species(Species::aqueous("CaCl+", 1.0), &[("Ca++", 1.0), ("Cl-", 1.0)], &[0.7])
            .unwrap();
        db
    }

    #[test]
    fn test_ionic_strength() {
        let db = db();
        let basis = [2.0, 0.1, 0.2, 0.05, 7.0];
        let eqm = [0.01, 0.02];
        let is = IonicStrength::default();
        let expected = 0.5 * (0.1 + 0.2 + 0.05 * 4.0 + 0.02);
        assert!((is.ionic_strength(&db, &basis, &eqm, &[]) - expected).abs() < 1e-12);

        let only_basis = IonicStrength::default().with_only_basis_molality(true);
        let expected = 0.5 * (0.1 + 0.2 + 0.05 * 4.0);
        assert!((only_basis.ionic_strength(&db, &basis, &eqm, &[]) - expected).abs() < 1e-12);

        let capped = IonicStrength::new(0.1, 0.1);
        assert_eq!(capped.ionic_strength(&db, &basis, &eqm, &[]), 0.1);
    }

    #[test]
    fn test_stoichiometric_ionic_strength_splits_neutral_complexes() {
        let db = db();
        let basis = [2.0, 0.1, 0.2, 0.05, 7.0];
        let eqm = [0.01, 0.02];
        let is = IonicStrength::default();
        let expected = 0.5 * (0.1 + 0.2 + 0.05 * 4.0 + 0.01 + 0.01 + 0.02);
        assert!((is.stoichiometric_ionic_strength(&db, &basis, &eqm, &[]) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_davies_coefficients() {
        let db = db();
        let mut model = DaviesActivity::new();
        model.set_internal_parameters(25.0, 0.1, 0.1);
        let mut basis_coef = vec![0.0; 5];
        let mut eqm_coef = vec![0.0; 2];
        model.build_activity_coefficients(&db, &mut basis_coef, &mut eqm_coef);

        let a = DaviesActivity::debye_huckel_a(25.0);
        let s = 0.1f64.sqrt();
        let g1 = 10f64.powf(-a * (s / (1.0 + s) - 0.03));
        assert_eq!(basis_coef[0], 1.0);
        assert!((basis_coef[1] - g1).abs() < 1e-12);
        assert!((basis_coef[3] - g1.powi(4)).abs() < 1e-12);
        assert_eq!(basis_coef[4], 1.0);
        assert_eq!(eqm_coef[0], 1.0);
        assert!(basis_coef[1] < 1.0);

        let aw = model.water_activity();
        assert!(aw > 0.99 && aw < 1.0);
    }

    #[test]
    fn test_ideal_is_unity() {
        let db = db();
        let mut model = IdealActivity;
        model.set_internal_parameters(25.0, 1.0, 1.0);
        let mut basis_coef = vec![0.5; 5];
        let mut eqm_coef = vec![0.5; 2];
        model.build_activity_coefficients(&db, &mut basis_coef, &mut eqm_coef);
        assert!(basis_coef.iter().chain(eqm_coef.iter()).all(|&g| g == 1.0));
        assert_eq!(model.water_activity(), 1.0);
    }

    #[test]
    fn test_ionic_strength_config_defaults() {
        let is: IonicStrength = serde_json::from_str("{\"max_ionic_strength\": 1.5}").unwrap();
        assert_eq!(is.max_ionic_strength, 1.5);
        assert_eq!(is.max_stoichiometric_ionic_strength, 3.0);
        assert!(!is.use_only_basis_molality);
    }
}

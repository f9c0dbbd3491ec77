//! Time stepping: kinetic mole additions and advancing the old state.

use nalgebra::{DMatrix, DVector};

use super::GeochemicalSystem;
use crate::activity::ActivityModel;
use crate::error::{GeochemError, GeochemResult};
use crate::kinetics::{calculate_rate, Direction, RateInputs};

impl<A: ActivityModel> GeochemicalSystem<A> {
    /// Makes the current state the old state of the next time step, after
    /// adding `mole_additions` (basis species then kinetic species) to the
    /// bulk constraints.
    pub fn update_old_with_current(&mut self, mole_additions: &DVector<f64>) -> GeochemResult<()> {
        let n = self.num_basis + self.num_kin;
        if mole_additions.len() != n {
            return Err(GeochemError::SizeMismatch { what: "mole additions", expected: n, got: mole_additions.len() });
        }
        self.kin_moles_old.copy_from_slice(&self.kin_moles);
        for i in 0..self.num_basis {
            self.add_to_bulk_moles(i, mole_additions[i])?;
        }
        self.compute_bulk();
        Ok(())
    }

    /// Adds the kinetic contributions over a step `dt` to `mole_additions`
    /// and their derivatives to `dmole_additions`.
    ///
    /// Slots are the basis species followed by the kinetic species. A kinetic
    /// species gains `bio_efficiency * rate * dt`; with the default efficiency
    /// of -1 it dissolves into the basis through the residual, so no basis
    /// addition is made. Other efficiencies are compensated so that the net
    /// basis change is `rate * dt` of the reaction. Death reactions leave the
    /// basis unchanged. A progeny species receives `efficiency * rate * dt`.
    pub fn add_kinetic_rates(
        &self,
        dt: f64,
        mole_additions: &mut DVector<f64>,
        dmole_additions: &mut DMatrix<f64>,
    ) -> GeochemResult<()> {
        if self.num_kin == 0 {
            return Ok(());
        }
        let n = self.num_basis + self.num_kin;
        if mole_additions.len() != n || dmole_additions.nrows() != n || dmole_additions.ncols() != n {
            return Err(GeochemError::SizeMismatch {
                what: "kinetic mole additions",
                expected: n,
                got: mole_additions.len().min(dmole_additions.nrows()).min(dmole_additions.ncols()),
            });
        }

        let nb = self.num_basis;
        let mut eqm_activity = self.eqm_activity.clone();
        for (j, sp) in self.db.eqm.iter().enumerate() {
            if sp.is_gas() || sp.name == "H+" || sp.name == "OH-" {
                eqm_activity[j] = self.eqm_activity_unchecked(j);
            }
        }

        for def in &self.db.kin_rates {
            let kin = def.kinetic_species_index;
            let inputs = RateInputs {
                basis_molality: &self.basis_molality,
                basis_activity: &self.basis_activity,
                basis_activity_known: &self.basis_activity_known,
                eqm_molality: &self.eqm_molality,
                eqm_activity: &eqm_activity,
                kin_moles: self.kin_moles[kin],
                kin_log10k: self.kin_log10k[kin],
                log10_activity_product: self.kinetic_log10_ap(kin),
                temperature: self.temperature,
            };
            let rate = calculate_rate(def, &self.db, &inputs)?;
            let desc = &def.description;
            let bio = desc.kinetic_bio_efficiency;

            let ind = nb + kin;
            mole_additions[ind] += bio * rate.rate * dt;
            dmole_additions[(ind, ind)] += bio * rate.drate_dkin * dt;
            let extra = if desc.direction == Direction::Death { bio } else { bio + 1.0 };
            for i in 0..nb {
                dmole_additions[(ind, i)] += bio * rate.drate_dmol[i] * dt;
                let stoi_fac = self.db.kin_stoichiometry[(kin, i)] * extra * dt;
                mole_additions[i] += stoi_fac * rate.rate;
                dmole_additions[(i, ind)] += stoi_fac * rate.drate_dkin;
                for j in 0..nb {
                    dmole_additions[(i, j)] += stoi_fac * rate.drate_dmol[j];
                }
            }

            let eff = desc.progeny_efficiency;
            if eff == 0.0 {
                continue;
            }
            let progeny = def.progeny_index;
            if progeny < nb {
                mole_additions[progeny] += eff * rate.rate * dt;
                dmole_additions[(progeny, ind)] += eff * rate.drate_dkin * dt;
                for i in 0..nb {
                    dmole_additions[(progeny, i)] += eff * rate.drate_dmol[i] * dt;
                }
            } else {
                // an equilibrium progeny is added through its basis decomposition
                let j = progeny - nb;
                for b in 0..nb {
                    let fac = eff * self.db.eqm_stoichiometry[(j, b)] * dt;
                    mole_additions[b] += fac * rate.rate;
                    dmole_additions[(b, ind)] += fac * rate.drate_dkin;
                    for i in 0..nb {
                        dmole_additions[(b, i)] += fac * rate.drate_dmol[i];
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::super::{GeochemicalSystem, KineticInitial, SystemSettings};
    use super::*;
    use crate::activity::IdealActivity;
    use crate::kinetics::KineticRateDescription;

    fn zeros(n: usize) -> (DVector<f64>, DMatrix<f64>) {
        (DVector::zeros(n), DMatrix::zeros(n, n))
    }

    fn with_rate(description: KineticRateDescription) -> GeochemicalSystem<IdealActivity> {
        let mut db = kinetic_db();
        db.kin_rates.clear();
        db.add_kinetic_rate(description).unwrap();
        GeochemicalSystem::new(
            db,
            IdealActivity,
            &SystemSettings::new("Cl-"),
            &bulk_constraints(),
            &[KineticInitial::moles("Aragonite", 1.0e-6)],
        )
        .unwrap()
    }

    #[test]
    fn test_default_efficiency_only_touches_kinetic_slot() {
        let sys = ideal_kinetic();
        let (mut add, mut dadd) = zeros(7);
        sys.add_kinetic_rates(2.0, &mut add, &mut dadd).unwrap();
        // Q << K: aragonite dissolves
        assert!(add[6] < 0.0);
        for i in 0..6 {
            assert_eq!(add[i], 0.0);
        }
        assert!(dadd[(6, 6)] < 0.0);

        // rate = k A mass (1 - Q/K), with mass in grams
        let q_over_k = 10f64.powf(sys.log10_kinetic_activity_product(0).unwrap() - 1.99);
        let rate = 1.0e-3 * 1.0e-6 * 100.0869 * (1.0 - q_over_k);
        assert!((add[6] + 2.0 * rate).abs() < 1e-18);
    }

    #[test]
    fn test_bio_efficiency_compensates_basis() {
        let sys = with_rate(
            KineticRateDescription::new("Aragonite", 1.0e-3, 1.0)
                .with_multiply_by_mass(true)
                .with_bio_efficiency(0.5),
        );
        let (mut add, mut dadd) = zeros(7);
        sys.add_kinetic_rates(1.0, &mut add, &mut dadd).unwrap();
        let kin_addition = add[6];
        assert!(kin_addition > 0.0);
        // extra = 1.5: basis species get 1.5 * stoichiometry * rate * dt
        let rate_dt = kin_addition / 0.5;
        assert!((add[5] - 1.5 * rate_dt).abs() < 1e-20);
        assert!((add[1] + 1.5 * rate_dt).abs() < 1e-20);
        assert_eq!(add[2], 0.0);
    }

    #[test]
    fn test_death_direction() {
        let sys = with_rate(
            KineticRateDescription::new("Aragonite", 1.0e-3, 1.0)
                .with_multiply_by_mass(true)
                .with_direction(Direction::Death),
        );
        let (mut add, mut dadd) = zeros(7);
        sys.add_kinetic_rates(1.0, &mut add, &mut dadd).unwrap();
        // the kinetic species loses mass and the basis gets the counter-addition
        assert!(add[6] < 0.0);
        assert!((add[5] - add[6]).abs() < 1e-20);
        assert!((add[1] + add[6]).abs() < 1e-20);
    }

    #[test]
    fn test_progeny_additions() {
        let sys = with_rate(
            KineticRateDescription::new("Aragonite", 1.0e-3, 1.0)
                .with_multiply_by_mass(true)
                .with_progeny("Na+", 2.0),
        );
        let (mut add, mut dadd) = zeros(7);
        sys.add_kinetic_rates(1.0, &mut add, &mut dadd).unwrap();
        // bio efficiency -1: kinetic slot gets -rate dt
        assert!((add[2] + 2.0 * add[6]).abs() < 1e-20);

        let sys = with_rate(
            KineticRateDescription::new("Aragonite", 1.0e-3, 1.0)
                .with_multiply_by_mass(true)
                .with_progeny("CO3--", 1.0),
        );
        let (mut add, mut dadd) = zeros(7);
        sys.add_kinetic_rates(1.0, &mut add, &mut dadd).unwrap();
        // CO3-- = HCO3- - H+
        assert!((add[4] + add[6]).abs() < 1e-20);
        assert!((add[1] - add[6]).abs() < 1e-20);
    }

    #[test]
    fn test_additions_accumulate() {
        let sys = ideal_kinetic();
        let (mut add, mut dadd) = zeros(7);
        sys.add_kinetic_rates(1.0, &mut add, &mut dadd).unwrap();
        let once = add[6];
        sys.add_kinetic_rates(1.0, &mut add, &mut dadd).unwrap();
        assert!((add[6] - 2.0 * once).abs() < 1e-22);
    }

    #[test]
    fn test_kinetic_rate_size_checks() {
        let sys = ideal_kinetic();
        let (mut add, mut dadd) = zeros(6);
        assert!(matches!(sys.add_kinetic_rates(1.0, &mut add, &mut dadd), Err(GeochemError::SizeMismatch { .. })));

        // nothing to do without kinetic species
        let plain = ideal(&mixed_constraints());
        let (mut add, mut dadd) = zeros(3);
        plain.add_kinetic_rates(1.0, &mut add, &mut dadd).unwrap();
        assert_eq!(add, DVector::zeros(3));
    }

    #[test]
    fn test_update_old_with_current() {
        let mut sys = ideal_kinetic();
        let mut vars = sys.algebraic_variable_values();
        let last = vars.len() - 1;
        vars[last] = 5.0e-7;
        sys.set_algebraic_variables(&vars).unwrap();

        let mut add = DVector::zeros(7);
        add[2] = 0.01;
        add[6] = -5.0e-7;
        let na = sys.constraint_values()[2];
        sys.update_old_with_current(&add).unwrap();
        assert_eq!(sys.kin_moles_old[0], 5.0e-7);
        assert!((sys.constraint_values()[2] - (na + 0.01)).abs() < 1e-15);
        assert!((sys.bulk_moles_old()[2] - (na + 0.01)).abs() < 1e-15);
        // the kinetic row now has zero residual without additions
        let res = sys.residual(&DVector::zeros(7)).unwrap();
        assert_eq!(res[last], 0.0);
        // Cl- rebalances the added Na+
        assert!(sys.total_charge_old().abs() < 1e-12);

        assert!(sys.update_old_with_current(&DVector::zeros(3)).is_err());
    }
}

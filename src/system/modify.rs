//! Changes to a constructed system: swaps, constraints, temperature and
//! restoring a saved state.

use super::{check_index, ConstraintMeaning, GeochemicalSystem};
use crate::activity::ActivityModel;
use crate::constants::SURFACE_POTENTIAL_SUFFIX;
use crate::error::{GeochemError, GeochemResult};

impl<A: ActivityModel> GeochemicalSystem<A> {
    /// Swaps basis species `out_of_basis` with equilibrium species
    /// `into_basis`, keeping the state close to the pre-swap configuration.
    ///
    /// Water, the charge-balance species and gases cannot be swapped out, and
    /// gases cannot be swapped in. The new basis species gets a bulk
    /// constraint equal to its bulk amount before the swap.
    pub fn perform_swap(&mut self, out_of_basis: usize, into_basis: usize) -> GeochemResult<()> {
        check_index("basis species", out_of_basis, self.num_basis)?;
        check_index("equilibrium species", into_basis, self.num_eqm)?;
        let eqm_name = &self.db.eqm[into_basis].name;
        if out_of_basis == 0 {
            return Err(GeochemError::SwapOutWater(eqm_name.clone()));
        }
        if out_of_basis == self.charge_balance_index {
            return Err(GeochemError::SwapChargeBalance(self.charge_balance_species.clone()));
        }
        if self.db.basis[out_of_basis].is_gas() {
            return Err(GeochemError::SwapGasOut(self.db.basis[out_of_basis].name.clone()));
        }
        if self.db.eqm[into_basis].is_gas() {
            return Err(GeochemError::SwapGasIn(eqm_name.clone()));
        }
        self.swap_unchecked(out_of_basis, into_basis)
    }

    fn swap_unchecked(&mut self, r: usize, s: usize) -> GeochemResult<()> {
        let mut bulk = self.bulk_moles_old.clone();
        self.swapper.perform_swap_with_bulk(&mut self.db, &mut bulk, r, s)?;

        // the incoming species has fixed bulk moles whatever the outgoing one had fixed
        self.constraint_meaning[r] = ConstraintMeaning::MolesBulkSpecies;
        for i in 0..self.num_basis {
            if self.constraint_meaning[i].is_bulk() {
                self.constraint_value[i] = bulk[i];
                self.original_constraint_value[i] = bulk[i];
            }
        }

        // exchange molalities so Newton restarts near the old configuration
        let incoming = &self.db.basis[r];
        let molality_in = if incoming.is_mineral() || incoming.is_gas() || self.eqm_molality[s] == 0.0 {
            self.min_initial_molality.max(0.9 * bulk[r])
        } else {
            self.eqm_molality[s]
        };
        // negative for a consumed mineral
        let molality_out = self.basis_molality[r];
        self.basis_molality[r] = molality_in;
        self.eqm_molality[s] = molality_out.max(0.0);

        self.build_known_basis_activities();
        self.build_temperature_dependent_quantities();
        self.charge_balance_index = self
            .db
            .basis_index(&self.charge_balance_species)
            .ok_or_else(|| GeochemError::ChargeBalanceNotInBasis(self.charge_balance_species.clone()))?;
        self.enforce_charge_balance_if_simple();
        self.build_algebraic_info();
        self.compute_consistent_configuration();
        Ok(())
    }

    /// Changes the temperature [C], updating log10K values and the activity
    /// model. The state is not recomputed.
    pub fn set_temperature(&mut self, temperature: f64) -> GeochemResult<()> {
        self.temperature = temperature;
        self.build_temperature_dependent_quantities();
        let is = self.ionic_strength();
        let is_stoich = self.stoichiometric_ionic_strength();
        self.activity_model.set_internal_parameters(temperature, is, is_stoich);
        Ok(())
    }

    /// Converts every fixed solvent mass, free molality and free mineral
    /// constraint into a bulk constraint, closing the system.
    pub fn close_system(&mut self) -> GeochemResult<()> {
        for i in 0..self.num_basis {
            if matches!(
                self.constraint_meaning[i],
                ConstraintMeaning::KgSolventWater
                    | ConstraintMeaning::FreeMolality
                    | ConstraintMeaning::FreeMolesMineralSpecies
            ) {
                self.change_constraint_to_bulk(i)?;
            }
        }
        Ok(())
    }

    /// Constrains basis species `i` by its current bulk amount.
    ///
    /// A gas is first swapped for the non-gas, non-sorbed equilibrium species
    /// with the largest stoichiometric coefficient in it.
    pub fn change_constraint_to_bulk(&mut self, i: usize) -> GeochemResult<()> {
        check_index("basis species", i, self.num_basis)?;
        if !self.db.basis[i].is_gas() {
            let bulk = self.bulk_from_molalities(i);
            return self.change_constraint_to_bulk_with_value(i, bulk);
        }
        let mut best: Option<(usize, f64)> = None;
        for (j, sp) in self.db.eqm.iter().enumerate() {
            let stoi = self.db.eqm_stoichiometry[(j, i)].abs();
            if sp.is_gas() || stoi == 0.0 || self.db.is_sorbed(j) {
                continue;
            }
            if best.map_or(true, |(_, b)| stoi > b) {
                best = Some((j, stoi));
            }
        }
        match best {
            Some((j, _)) => self.swap_unchecked(i, j),
            None => Err(GeochemError::NoGasSwapCandidate(self.db.basis[i].name.clone())),
        }
    }

    /// Constrains basis species `i` by `value` bulk moles.
    pub fn change_constraint_to_bulk_with_value(&mut self, i: usize, value: f64) -> GeochemResult<()> {
        check_index("basis species", i, self.num_basis)?;
        if self.db.basis[i].is_gas() {
            return Err(GeochemError::GasBulkValue(self.db.basis[i].name.clone()));
        }
        self.constraint_meaning[i] =
            if i == 0 { ConstraintMeaning::MolesBulkWater } else { ConstraintMeaning::MolesBulkSpecies };
        self.set_constraint_value(i, value)?;
        // an activity constraint may just have become a bulk constraint
        self.build_known_basis_activities();
        self.build_algebraic_info();
        Ok(())
    }

    /// Adds `moles` to the bulk constraint of basis species `i`. Species
    /// without a bulk constraint are left alone.
    pub fn add_to_bulk_moles(&mut self, i: usize, moles: f64) -> GeochemResult<()> {
        check_index("basis species", i, self.num_basis)?;
        if !self.constraint_meaning[i].is_bulk() {
            return Ok(());
        }
        self.set_constraint_value(i, self.constraint_value[i] + moles)
    }

    /// Sets the constraint value of basis species `i`, in internal units,
    /// and updates the dependent state.
    pub fn set_constraint_value(&mut self, i: usize, value: f64) -> GeochemResult<()> {
        check_index("basis species", i, self.num_basis)?;
        self.constraint_value[i] = value;
        self.original_constraint_value[i] = value;
        match self.constraint_meaning[i] {
            ConstraintMeaning::MolesBulkWater | ConstraintMeaning::MolesBulkSpecies => {
                self.alter_system_because_bulk_changed()
            }
            ConstraintMeaning::KgSolventWater
            | ConstraintMeaning::FreeMolality
            | ConstraintMeaning::FreeMolesMineralSpecies => {
                self.basis_molality[i] = value;
                self.compute_consistent_configuration();
            }
            ConstraintMeaning::Fugacity => {
                self.basis_activity[i] = value;
                self.basis_molality[i] = 0.0;
                self.compute_consistent_configuration();
            }
            ConstraintMeaning::Activity => {
                self.basis_activity[i] = value;
                self.basis_molality[i] = value / self.basis_activity_coef[i];
                self.compute_consistent_configuration();
            }
        }
        Ok(())
    }

    fn alter_system_because_bulk_changed(&mut self) {
        self.enforce_charge_balance_if_simple();
        for i in 0..self.num_basis {
            if self.constraint_meaning[i].is_bulk() {
                self.bulk_moles_old[i] = self.constraint_value[i];
            }
        }
        self.compute_free_mineral_moles();
    }

    /// Sets the free moles of every mineral, sorption site, sorbed species
    /// and kinetic mineral to `value`. Equilibrium minerals get zero.
    ///
    /// Used to keep minerals from vanishing during a transient, for instance
    /// before a restore.
    pub fn set_mineral_related_free_moles(&mut self, value: f64) {
        for i in 0..self.num_basis {
            if self.db.basis[i].is_mineral() {
                self.basis_molality[i] = value;
            }
        }
        for surface in &self.db.surfaces {
            for site in &surface.sorption_sites {
                if let Some(i) = self.db.basis_index(site) {
                    self.basis_molality[i] = value;
                } else if let Some(j) = self.db.eqm_index(site) {
                    self.eqm_molality[j] = value;
                }
            }
        }
        for j in 0..self.num_eqm {
            if self.db.eqm[j].is_mineral() {
                self.eqm_molality[j] = 0.0;
            }
            if self.db.is_sorbed(j) {
                self.eqm_molality[j] = value;
            }
        }
        for k in 0..self.num_kin {
            if self.db.kinetic[k].is_mineral() {
                self.kin_moles[k] = value;
            }
        }
    }

    /// Restores a saved state from one value per basis species, equilibrium
    /// species, surface (named `<mineral>_surface_potential_expr`) and kinetic
    /// species, given in any order.
    ///
    /// For each basis species, `constraints_from_molalities` decides whether
    /// the constraint is recomputed from the restored values or the restored
    /// value is overridden by the constraint. Gas fugacities and water
    /// activity cannot be recomputed from molalities.
    pub fn set_solvent_mass_and_free_molality_and_mineral_moles_and_surface_pots_and_kinetic_moles<S>(
        &mut self,
        names: &[S],
        values: &[f64],
        constraints_from_molalities: &[bool],
    ) -> GeochemResult<()>
    where
        S: AsRef<str>,
    {
        if names.len() != values.len() {
            return Err(GeochemError::SizeMismatch {
                what: "restore values",
                expected: names.len(),
                got: values.len(),
            });
        }
        let total = self.num_basis + self.num_eqm + self.num_surface_pot + self.num_kin;
        if names.len() != total {
            return Err(GeochemError::SizeMismatch { what: "restore names", expected: total, got: names.len() });
        }
        if constraints_from_molalities.len() != self.num_basis {
            return Err(GeochemError::SizeMismatch {
                what: "constraints from molalities",
                expected: self.num_basis,
                got: constraints_from_molalities.len(),
            });
        }
        let lookup = |name: &str| -> GeochemResult<f64> {
            names
                .iter()
                .position(|n| n.as_ref() == name)
                .map(|p| values[p])
                .ok_or_else(|| GeochemError::MissingRestoreValue(name.to_string()))
        };
        let invalid = |species: &str, value: f64, rule: &'static str| GeochemError::InvalidRestoreValue {
            species: species.to_string(),
            value,
            rule,
        };

        for i in 0..self.num_basis {
            let sp = &self.db.basis[i];
            let value = lookup(&sp.name)?;
            if sp.is_gas() {
                if value != 0.0 {
                    return Err(invalid(&sp.name, value, "must be zero for a gas"));
                }
            } else if sp.is_mineral() {
                if value < 0.0 {
                    return Err(invalid(&sp.name, value, "must be non-negative for a mineral"));
                }
            } else if value <= 0.0 {
                return Err(invalid(&sp.name, value, "must be positive"));
            }
            self.basis_molality[i] = value;
        }
        for j in 0..self.num_eqm {
            let sp = &self.db.eqm[j];
            let value = lookup(&sp.name)?;
            // a former basis species may now be an equilibrium mineral or gas
            if sp.is_mineral() || sp.is_gas() {
                self.eqm_molality[j] = 0.0;
            } else if value < 0.0 {
                return Err(invalid(&sp.name, value, "must be non-negative"));
            } else {
                self.eqm_molality[j] = value;
            }
        }
        for s in 0..self.num_surface_pot {
            let name = format!("{}{}", self.db.surfaces[s].mineral, SURFACE_POTENTIAL_SUFFIX);
            let value = lookup(&name)?;
            if value <= 0.0 {
                return Err(invalid(&name, value, "must be positive"));
            }
            self.surface_pot_expr[s] = value;
        }
        for k in 0..self.num_kin {
            let value = lookup(&self.db.kinetic[k].name)?;
            self.set_kinetic_moles(k, value)?;
        }

        for i in 0..self.num_basis {
            if matches!(
                self.constraint_meaning[i],
                ConstraintMeaning::KgSolventWater
                    | ConstraintMeaning::FreeMolality
                    | ConstraintMeaning::FreeMolesMineralSpecies
            ) {
                if constraints_from_molalities[i] {
                    self.constraint_value[i] = self.basis_molality[i];
                    self.original_constraint_value[i] = self.constraint_value[i];
                } else {
                    self.basis_molality[i] = self.constraint_value[i];
                }
            }
        }
        for i in 0..self.num_basis {
            if self.constraint_meaning[i].is_bulk() && constraints_from_molalities[i] {
                self.constraint_value[i] = self.bulk_from_molalities(i);
                self.original_constraint_value[i] = self.constraint_value[i];
            }
        }
        for i in 0..self.num_basis {
            if !constraints_from_molalities[i] {
                continue;
            }
            match self.constraint_meaning[i] {
                ConstraintMeaning::Fugacity => {
                    return Err(GeochemError::NotDerivableFromMolality(self.db.basis[i].name.clone()));
                }
                ConstraintMeaning::Activity if i == 0 => {
                    return Err(GeochemError::NotDerivableFromMolality(self.db.basis[i].name.clone()));
                }
                ConstraintMeaning::Activity => {
                    self.constraint_value[i] = self.basis_activity_coef[i] * self.basis_molality[i];
                    self.original_constraint_value[i] = self.constraint_value[i];
                }
                _ => {}
            }
        }

        self.enforce_charge_balance_if_simple();
        self.build_known_basis_activities();
        self.update_activity_coefficients();
        self.update_basis_molality_for_known_activity();
        self.compute_remaining_basis_activities();
        self.compute_bulk();
        self.compute_sorbing_surface_area();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::super::{Constraint, SystemSettings};
    use super::*;
    use crate::activity::IdealActivity;

    fn restore_names(sys: &GeochemicalSystem<IdealActivity>) -> Vec<String> {
        let db = sys.database();
        db.basis
            .iter()
            .chain(&db.eqm)
            .map(|s| s.name.clone())
            .chain(db.surfaces.iter().map(|s| format!("{}{}", s.mineral, SURFACE_POTENTIAL_SUFFIX)))
            .chain(db.kinetic.iter().map(|s| s.name.clone()))
            .collect()
    }

    #[test]
    fn test_swap_errors() {
        let mut sys = ideal(&mixed_constraints());
        assert_eq!(sys.perform_swap(0, 0), Err(GeochemError::SwapOutWater("OH-".into())));
        assert_eq!(sys.perform_swap(3, 3), Err(GeochemError::SwapChargeBalance("Cl-".into())));
        assert_eq!(sys.perform_swap(4, 6), Err(GeochemError::SwapGasIn("CO2(g)".into())));
        assert!(matches!(sys.perform_swap(4, 9), Err(GeochemError::IndexOutOfRange { .. })));
        assert!(matches!(sys.perform_swap(2, 0), Err(GeochemError::SingularSwap { .. })));

        let mut cons = mixed_constraints();
        cons[4] = Constraint::fugacity("CO2(g)", 1.0e-3);
        let settings = SystemSettings::new("Cl-").with_swap("HCO3-", "CO2(g)");
        let mut gas = GeochemicalSystem::new(carbonate_db(), IdealActivity, &settings, &cons, &[]).unwrap();
        assert_eq!(gas.perform_swap(4, 1), Err(GeochemError::SwapGasOut("CO2(g)".into())));
    }

    #[test]
    fn test_swap_preserves_bulk_in_original_basis() {
        let mut sys = ideal(&bulk_constraints());
        let before = sys.bulk_old_in_original_basis();
        let co2 = sys.database().eqm_index("CO2(aq)").unwrap();
        let m_co2 = sys.equilibrium_molality(co2).unwrap();
        let m_hco3 = sys.basis_molality()[4];

        sys.perform_swap(4, co2).unwrap();
        assert_eq!(sys.database().basis[4].name, "CO2(aq)");
        assert_eq!(sys.constraint_meaning()[4], ConstraintMeaning::MolesBulkSpecies);
        // molalities are exchanged
        assert_eq!(sys.basis_molality()[4], m_co2);
        let hco3 = sys.database().eqm_index("HCO3-").unwrap();
        assert!(sys.equilibrium_molality(hco3).unwrap() > 0.0);
        assert!(m_hco3 > 0.0);

        let after = sys.bulk_old_in_original_basis();
        for i in 0..before.len() {
            assert!((before[i] - after[i]).abs() < 1e-6, "component {i}: {} vs {}", before[i], after[i]);
        }
        assert!(sys.total_charge_old().abs() < 1e-12);
        assert_eq!(sys.charge_balance_species(), "Cl-");

        // and back again
        sys.perform_swap(4, hco3).unwrap();
        assert_eq!(sys.database().basis[4].name, "HCO3-");
        let back = sys.bulk_old_in_original_basis();
        for i in 0..before.len() {
            assert!((before[i] - back[i]).abs() < 1e-6);
        }
    }

    #[test]
    fn test_swap_in_mineral() {
        let mut sys = ideal(&bulk_constraints());
        let calcite = sys.database().eqm_index("Calcite").unwrap();
        sys.perform_swap(5, calcite).unwrap();
        assert_eq!(sys.database().basis[5].name, "Calcite");
        assert!(sys.basis_activity_known()[5]);
        assert_eq!(sys.basis_activity(5).unwrap(), 1.0);
        // minerals are never algebraic unknowns
        assert!(!sys.in_algebraic_system()[5]);
        assert_eq!(sys.num_basis_in_algebraic_system(), 5);
    }

    #[test]
    fn test_set_temperature() {
        let mut sys = ideal(&mixed_constraints());
        sys.set_temperature(62.5).unwrap();
        assert_eq!(sys.temperature(), 62.5);
        // halfway between 25 and 100
        assert!((sys.log10k(0).unwrap() - 0.5 * (13.99 + 12.26)).abs() < 1e-12);
        assert!((sys.log10k(3).unwrap() - 0.64).abs() < 1e-12);
    }

    #[test]
    fn test_close_system() {
        let mut sys = ideal(&mixed_constraints());
        let water_bulk = sys.compute_bulk_from_molalities(0).unwrap();
        let ca_bulk = sys.compute_bulk_from_molalities(5).unwrap();
        sys.close_system().unwrap();
        let meaning = sys.constraint_meaning();
        assert_eq!(meaning[0], ConstraintMeaning::MolesBulkWater);
        assert_eq!(meaning[5], ConstraintMeaning::MolesBulkSpecies);
        // activity constraints are not touched
        assert_eq!(meaning[1], ConstraintMeaning::Activity);
        assert!((sys.constraint_values()[0] - water_bulk).abs() < 1e-12);
        assert!((sys.constraint_values()[5] - ca_bulk).abs() < 1e-15);
        assert_eq!(sys.num_basis_in_algebraic_system(), 5);
        assert!(sys.in_algebraic_system()[0]);
    }

    #[test]
    fn test_change_constraint_to_bulk() {
        let mut sys = ideal(&mixed_constraints());
        sys.change_constraint_to_bulk_with_value(1, 2.0e-4).unwrap();
        assert_eq!(sys.constraint_meaning()[1], ConstraintMeaning::MolesBulkSpecies);
        assert!(!sys.basis_activity_known()[1]);
        assert_eq!(sys.bulk_moles_old()[1], 2.0e-4);
        assert_eq!(sys.num_basis_in_algebraic_system(), 4);
        assert!(matches!(sys.change_constraint_to_bulk(6), Err(GeochemError::IndexOutOfRange { .. })));
    }

    #[test]
    fn test_change_gas_constraint_to_bulk() {
        let mut cons = mixed_constraints();
        cons[4] = Constraint::fugacity("CO2(g)", 1.0e-3);
        let settings = SystemSettings::new("Cl-").with_swap("HCO3-", "CO2(g)");
        let mut sys = GeochemicalSystem::new(carbonate_db(), IdealActivity, &settings, &cons, &[]).unwrap();
        assert_eq!(sys.change_constraint_to_bulk_with_value(4, 1.0), Err(GeochemError::GasBulkValue("CO2(g)".into())));

        sys.change_constraint_to_bulk(4).unwrap();
        // several candidates have unit coefficients, the first one wins
        assert_eq!(sys.database().basis[4].name, "CO2(aq)");
        assert_eq!(sys.constraint_meaning()[4], ConstraintMeaning::MolesBulkSpecies);
        assert!(sys.in_algebraic_system()[4]);
    }

    #[test]
    fn test_add_to_bulk_moles() {
        let mut sys = ideal(&mixed_constraints());
        sys.add_to_bulk_moles(2, 0.05).unwrap();
        assert!((sys.constraint_values()[2] - 0.15).abs() < 1e-15);
        assert!((sys.bulk_moles_old()[2] - 0.15).abs() < 1e-15);
        // free molality constraints ignore additions
        sys.add_to_bulk_moles(5, 1.0).unwrap();
        assert_eq!(sys.constraint_values()[5], 1.0e-3);
    }

    #[test]
    fn test_set_constraint_value() {
        let mut sys = ideal(&mixed_constraints());
        sys.set_constraint_value(1, 1.0e-8).unwrap();
        assert_eq!(sys.basis_activity(1).unwrap(), 1.0e-8);
        assert!((sys.basis_molality()[1] - 1.0e-8).abs() < 1e-22);
        let oh = sys.equilibrium_molality(0).unwrap();
        assert!((oh - 10f64.powf(-13.99) / 1.0e-8).abs() < 1e-18);

        sys.set_constraint_value(0, 2.0).unwrap();
        assert_eq!(sys.solvent_water_mass(), 2.0);
        sys.set_constraint_value(5, 2.0e-3).unwrap();
        assert_eq!(sys.basis_molality()[5], 2.0e-3);
        assert!(sys.set_constraint_value(9, 1.0).is_err());
    }

    #[test]
    fn test_set_mineral_related_free_moles() {
        let mut sys = surface_system();
        sys.set_mineral_related_free_moles(1.0e-9);
        assert_eq!(sys.basis_molality()[5], 1.0e-9);
        assert_eq!(sys.basis_molality()[4], 1.0e-9);
        assert_eq!(sys.equilibrium_molality(1).unwrap(), 1.0e-9);
        assert_eq!(sys.equilibrium_molality(2).unwrap(), 1.0e-9);
        // aqueous species are untouched
        assert!(sys.equilibrium_molality(0).unwrap() != 1.0e-9);

        let mut kin = ideal_kinetic();
        kin.set_mineral_related_free_moles(3.0e-7);
        assert_eq!(kin.kinetic_mole_numbers(), &[3.0e-7]);
    }

    #[test]
    fn test_restore_state() {
        let source = ideal(&mixed_constraints());
        let names = restore_names(&source);
        let mut values: Vec<f64> = source.basis_molality().to_vec();
        values.extend_from_slice(source.equilibrium_molalities());
        // perturb the free Na+ and the free Ca++
        values[2] = 0.05;
        values[5] = 5.0e-3;

        // constraints win for fixed molalities, molalities win for bulk ones
        let mut sys = ideal(&mixed_constraints());
        let flags = [false, false, true, false, false, false];
        sys.set_solvent_mass_and_free_molality_and_mineral_moles_and_surface_pots_and_kinetic_moles(
            &names, &values, &flags,
        )
        .unwrap();
        assert_eq!(sys.basis_molality()[2], 0.05);
        assert_eq!(sys.basis_molality()[5], 1.0e-3);
        let expected = 0.05 + source.equilibrium_molality(3).unwrap();
        assert!((sys.constraint_values()[2] - expected).abs() < 1e-15);
        assert_eq!(sys.bulk_moles_old()[2], sys.constraint_values()[2]);
        // Cl- keeps its own bulk constraint
        assert_eq!(sys.constraint_values()[3], 0.1);

        // free molality constraints follow the restored values when asked
        let flags = [true, true, false, false, false, true];
        sys.set_solvent_mass_and_free_molality_and_mineral_moles_and_surface_pots_and_kinetic_moles(
            &names, &values, &flags,
        )
        .unwrap();
        assert_eq!(sys.constraint_values()[5], 5.0e-3);
        assert_eq!(sys.basis_molality()[5], 5.0e-3);
        // the H+ activity follows its restored molality
        assert!((sys.constraint_values()[1] - values[1]).abs() < 1e-20);
    }

    #[test]
    fn test_restore_errors() {
        let mut sys = ideal(&mixed_constraints());
        let names = restore_names(&sys);
        let mut values: Vec<f64> = sys.basis_molality().to_vec();
        values.extend_from_slice(sys.equilibrium_molalities());
        let flags = [false; 6];

        assert!(matches!(
            sys.set_solvent_mass_and_free_molality_and_mineral_moles_and_surface_pots_and_kinetic_moles(
                &names[..12],
                &values[..12],
                &flags
            ),
            Err(GeochemError::SizeMismatch { .. })
        ));
        assert!(matches!(
            sys.set_solvent_mass_and_free_molality_and_mineral_moles_and_surface_pots_and_kinetic_moles(
                &names,
                &values,
                &flags[..5]
            ),
            Err(GeochemError::SizeMismatch { .. })
        ));

        let mut renamed = names.clone();
        renamed[3] = "Br-".to_string();
        assert_eq!(
            sys.set_solvent_mass_and_free_molality_and_mineral_moles_and_surface_pots_and_kinetic_moles(
                &renamed, &values, &flags
            ),
            Err(GeochemError::MissingRestoreValue("Cl-".into()))
        );

        let mut bad = values.clone();
        bad[2] = 0.0;
        assert!(matches!(
            sys.set_solvent_mass_and_free_molality_and_mineral_moles_and_surface_pots_and_kinetic_moles(
                &names, &bad, &flags
            ),
            Err(GeochemError::InvalidRestoreValue { .. })
        ));

        let mut cons = mixed_constraints();
        cons[0] = Constraint::activity("H2O", 1.0);
        let mut water = ideal(&cons);
        let mut flags = [false; 6];
        flags[0] = true;
        assert_eq!(
            water.set_solvent_mass_and_free_molality_and_mineral_moles_and_surface_pots_and_kinetic_moles(
                &names, &values, &flags
            ),
            Err(GeochemError::NotDerivableFromMolality("H2O".into()))
        );
    }

    #[test]
    fn test_restore_surface_and_kinetic_values() {
        let mut sys = surface_system();
        let names = restore_names(&sys);
        let mut values: Vec<f64> = sys.basis_molality().to_vec();
        values.extend_from_slice(sys.equilibrium_molalities());
        values.push(1.5);
        sys.set_solvent_mass_and_free_molality_and_mineral_moles_and_surface_pots_and_kinetic_moles(
            &names,
            &values,
            &[false; 6],
        )
        .unwrap();
        assert_eq!(sys.algebraic_variable_values()[3], 1.5);

        let last = values.len() - 1;
        values[last] = 0.0;
        assert!(matches!(
            sys.set_solvent_mass_and_free_molality_and_mineral_moles_and_surface_pots_and_kinetic_moles(
                &names,
                &values,
                &[false; 6]
            ),
            Err(GeochemError::InvalidRestoreValue { .. })
        ));

        let mut kin = ideal_kinetic();
        let names = restore_names(&kin);
        let mut values: Vec<f64> = kin.basis_molality().to_vec();
        values.extend_from_slice(kin.equilibrium_molalities());
        values.push(4.0e-6);
        kin.set_solvent_mass_and_free_molality_and_mineral_moles_and_surface_pots_and_kinetic_moles(
            &names,
            &values,
            &[false; 6],
        )
        .unwrap();
        assert_eq!(kin.kinetic_moles(0).unwrap(), 4.0e-6);
    }
}

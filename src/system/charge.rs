//! Electroneutrality: the charge-balance species and its constraint.

use super::{ConstraintMeaning, GeochemicalSystem};
use crate::activity::ActivityModel;

impl<A: ActivityModel> GeochemicalSystem<A> {
    /// Sets the charge-balance constraint so the bulk composition is neutral,
    /// when every charged basis species has a bulk constraint. Does nothing
    /// otherwise.
    pub(super) fn enforce_charge_balance_if_simple(&mut self) {
        let cb = self.charge_balance_index;
        let mut charge = 0.0;
        for (i, sp) in self.db.basis.iter().enumerate() {
            if sp.charge == 0.0 {
                continue;
            }
            if self.constraint_meaning[i] != ConstraintMeaning::MolesBulkSpecies {
                return;
            }
            if i != cb {
                charge += sp.charge * self.constraint_value[i];
            }
        }
        // kinetic moles are already part of the bulk constraints
        self.constraint_value[cb] = -charge / self.db.basis[cb].charge;
        self.bulk_moles_old[cb] = self.constraint_value[cb];
    }

    /// Total charge of the old bulk composition.
    pub fn total_charge_old(&self) -> f64 {
        self.db.basis.iter().zip(&self.bulk_moles_old).map(|(sp, b)| sp.charge * b).sum()
    }

    /// Adjusts the charge-balance species' bulk constraint so that
    /// [`total_charge_old`](Self::total_charge_old) vanishes.
    pub fn enforce_charge_balance(&mut self) {
        let cb = self.charge_balance_index;
        self.constraint_value[cb] -= self.total_charge_old() / self.db.basis[cb].charge;
        self.bulk_moles_old[cb] = self.constraint_value[cb];
    }

    /// Makes basis species `index` the charge-balance species. The previous
    /// one gets its unbalanced constraint back.
    fn set_charge_balance_species(&mut self, index: usize) {
        let old = self.charge_balance_index;
        self.constraint_value[old] = self.original_constraint_value[old];
        self.bulk_moles_old[old] = self.constraint_value[old];
        self.charge_balance_index = index;
        self.charge_balance_species = self.db.basis[index].name.clone();
        log::debug!("charge-balance species is now {}", self.charge_balance_species);
        self.enforce_charge_balance_if_simple();
    }

    /// Moves the charge balance off a species whose molality has dropped to
    /// `threshold_molality` or below.
    ///
    /// The new species is a bulk-constrained charged species with molality
    /// above the threshold, preferably of opposite charge, with the largest
    /// molality. Returns whether the charge-balance species changed.
    pub fn alter_charge_balance_species(&mut self, threshold_molality: f64) -> bool {
        let cb = self.charge_balance_index;
        if self.basis_molality[cb] > threshold_molality {
            return false;
        }
        let z_cb = self.db.basis[cb].charge;
        let mut best_opposite: Option<(usize, f64)> = None;
        let mut best_same: Option<(usize, f64)> = None;
        for (i, sp) in self.db.basis.iter().enumerate() {
            let m = self.basis_molality[i];
            if i == cb
                || self.constraint_meaning[i] != ConstraintMeaning::MolesBulkSpecies
                || sp.charge == 0.0
                || m <= threshold_molality
            {
                continue;
            }
            let best = if sp.charge * z_cb < 0.0 { &mut best_opposite } else { &mut best_same };
            if best.map_or(true, |(_, mb)| m > mb) {
                *best = Some((i, m));
            }
        }
        match best_opposite.or(best_same) {
            Some((i, _)) => {
                self.set_charge_balance_species(i);
                true
            }
            None => false,
        }
    }

    /// Restores the charge-balance species given at construction, if it is
    /// still in the basis. Returns whether the charge-balance species changed.
    pub fn revert_to_original_charge_balance_species(&mut self) -> bool {
        match self.db.basis_index(&self.original_charge_balance_species) {
            Some(i) if i != self.charge_balance_index => {
                self.set_charge_balance_species(i);
                true
            }
            _ => false,
        }
    }
}

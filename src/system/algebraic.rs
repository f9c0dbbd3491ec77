//! Residual and Jacobian of the algebraic system.
//!
//! For a basis species `i` with a bulk constraint the residual is
//!
//! ```text
//! R_i = -(B_i + dB_i) + nw (m_i + sum_j nu_ji m_j) + sum_k kappa_ki n_k
//! ```
//!
//! where `B` is the old bulk composition, `dB` the mole additions during this
//! step, `m_j` the equilibrium molalities and `n_k` the kinetic mole numbers.
//! The charge-balance species replaces `B_i + dB_i` by the charge carried by
//! the other charged species, so that its row enforces electroneutrality.
//! Surface rows enforce the Gouy-Chapman relation between the surface charge
//! and the sorbed charge, and kinetic rows integrate the kinetic additions.
//!
//! Activity coefficients and the water activity are treated as constants when
//! differentiating.

use nalgebra::{DMatrix, DVector};

use super::{ConstraintMeaning, GeochemicalSystem};
use crate::activity::ActivityModel;
use crate::constants::MOLES_PER_KG_WATER;
use crate::error::{GeochemError, GeochemResult};

fn check_size(what: &'static str, expected: usize, got: usize) -> GeochemResult<()> {
    if expected != got {
        return Err(GeochemError::SizeMismatch { what, expected, got });
    }
    Ok(())
}

impl<A: ActivityModel> GeochemicalSystem<A> {
    /// Current values of the algebraic unknowns: basis molalities (solvent
    /// mass for water), then surface-potential expressions, then kinetic moles.
    pub fn algebraic_variable_values(&self) -> DVector<f64> {
        let nba = self.num_basis_in_algebraic_system;
        let nsp = self.num_surface_pot;
        DVector::from_fn(self.num_in_algebraic_system, |a, _| {
            if a < nba {
                self.basis_molality[self.basis_index[a]]
            } else if a < nba + nsp {
                self.surface_pot_expr[a - nba]
            } else {
                self.kin_moles[a - nba - nsp]
            }
        })
    }

    /// Basis molalities of the algebraic unknowns only.
    pub fn algebraic_basis_values(&self) -> Vec<f64> {
        self.basis_index.iter().map(|&i| self.basis_molality[i]).collect()
    }

    /// Sets the algebraic unknowns and recomputes every dependent quantity.
    ///
    /// All values must be positive.
    pub fn set_algebraic_variables(&mut self, values: &DVector<f64>) -> GeochemResult<()> {
        check_size("algebraic variables", self.num_in_algebraic_system, values.len())?;
        if let Some(v) = values.iter().find(|v| **v <= 0.0) {
            return Err(GeochemError::NonPositiveAlgebraicValue(*v));
        }
        let nba = self.num_basis_in_algebraic_system;
        let nsp = self.num_surface_pot;
        for (a, &i) in self.basis_index.iter().enumerate() {
            self.basis_molality[i] = values[a];
        }
        for sp in 0..nsp {
            self.surface_pot_expr[sp] = values[nba + sp];
        }
        for k in 0..self.num_kin {
            self.kin_moles[k] = values[nba + nsp + k];
        }
        self.compute_consistent_configuration();
        Ok(())
    }

    /// Whether `i` is a charged species, other than the charge-balance
    /// species, that contributes to the charge-balance row.
    fn balances_charge(&self, i: usize) -> bool {
        i != self.charge_balance_index && self.db.basis[i].charge != 0.0
    }

    /// Residual of algebraic equation `a`, given the mole additions over the
    /// basis followed by the kinetic species.
    pub fn residual_component(&self, a: usize, mole_additions: &DVector<f64>) -> GeochemResult<f64> {
        if a >= self.num_in_algebraic_system {
            return Err(GeochemError::IndexOutOfRange {
                what: "algebraic system",
                index: a,
                len: self.num_in_algebraic_system,
            });
        }
        check_size("mole additions", self.num_basis + self.num_kin, mole_additions.len())?;
        Ok(self.residual_unchecked(a, mole_additions))
    }

    fn residual_unchecked(&self, a: usize, add: &DVector<f64>) -> f64 {
        let nba = self.num_basis_in_algebraic_system;
        let nsp = self.num_surface_pot;
        let nw = self.basis_molality[0];

        if a < nba {
            let i = self.basis_index[a];
            let mut res = if i == 0 {
                -(self.bulk_moles_old[0] + add[0]) + nw * MOLES_PER_KG_WATER
            } else if i == self.charge_balance_index {
                let z_cb = self.db.basis[i].charge;
                let mut res = nw * self.basis_molality[i];
                for k in (0..self.num_basis).filter(|&k| self.balances_charge(k)) {
                    // fixed-activity species soak up their additions, so only
                    // bulk species carry them into the charge balance
                    let bulk = if self.constraint_meaning[k] == ConstraintMeaning::MolesBulkSpecies {
                        self.bulk_moles_old[k] + add[k]
                    } else {
                        self.bulk_from_molalities(k)
                    };
                    res += self.db.basis[k].charge * bulk / z_cb;
                }
                res
            } else {
                -(self.bulk_moles_old[i] + add[i]) + nw * self.basis_molality[i]
            };
            for j in 0..self.num_eqm {
                res += nw * self.db.eqm_stoichiometry[(j, i)] * self.eqm_molality[j];
            }
            for k in 0..self.num_kin {
                res += self.db.kin_stoichiometry[(k, i)] * self.kin_moles[k];
            }
            res
        } else if a < nba + nsp {
            let sp = a - nba;
            let x = self.surface_pot_expr[sp];
            let mut res = self.surface_pot_prefactor(sp) * (x - 1.0 / x);
            for j in self.sorbed_on(sp) {
                res += nw * self.db.eqm[j].charge * self.eqm_molality[j];
            }
            res
        } else {
            let k = a - nba - nsp;
            self.kin_moles[k] - (self.kin_moles_old[k] + add[self.num_basis + k])
        }
    }

    fn sorbed_on(&self, sp: usize) -> impl Iterator<Item = usize> + '_ {
        (0..self.num_eqm).filter(move |&j| self.db.surface_sorption[j] == Some(sp))
    }

    /// Residual of every algebraic equation.
    pub fn residual(&self, mole_additions: &DVector<f64>) -> GeochemResult<DVector<f64>> {
        check_size("mole additions", self.num_basis + self.num_kin, mole_additions.len())?;
        Ok(DVector::from_fn(self.num_in_algebraic_system, |a, _| self.residual_unchecked(a, mole_additions)))
    }

    /// Jacobian `d residual_a / d variable_b` of the algebraic system.
    ///
    /// `residual` must be the residual at the current state; `dmole_additions`
    /// holds the derivatives of the mole additions with respect to basis
    /// molalities and kinetic moles.
    pub fn compute_jacobian(
        &self,
        residual: &DVector<f64>,
        mole_additions: &DVector<f64>,
        dmole_additions: &DMatrix<f64>,
    ) -> GeochemResult<DMatrix<f64>> {
        let n_add = self.num_basis + self.num_kin;
        check_size("residual", self.num_in_algebraic_system, residual.len())?;
        check_size("mole additions", n_add, mole_additions.len())?;
        check_size("mole addition derivative rows", n_add, dmole_additions.nrows())?;
        check_size("mole addition derivative columns", n_add, dmole_additions.ncols())?;

        let n = self.num_in_algebraic_system;
        let nba = self.num_basis_in_algebraic_system;
        let nsp = self.num_surface_pot;
        let nb = self.num_basis;
        let nw = self.basis_molality[0];
        let cb = self.charge_balance_index;
        let stoi = &self.db.eqm_stoichiometry;
        let kin_stoi = &self.db.kin_stoichiometry;
        let charge = |i: usize| self.db.basis[i].charge;
        let is_bulk_species = |i: usize| self.constraint_meaning[i] == ConstraintMeaning::MolesBulkSpecies;
        let mut jac = DMatrix::zeros(n, n);

        // molality rows
        for a in 0..nba {
            let ba = self.basis_index[a];

            for b in 0..nba {
                let bb = self.basis_index[b];

                if ba == cb {
                    for i in (0..nb).filter(|&i| self.balances_charge(i) && is_bulk_species(i)) {
                        jac[(a, b)] += charge(i) * dmole_additions[(i, bb)] / charge(ba);
                    }
                } else {
                    jac[(a, b)] -= dmole_additions[(ba, bb)];
                }

                if bb == 0 {
                    // explicit dependence on the solvent mass
                    if ba == cb {
                        for i in (0..nb).filter(|&i| self.balances_charge(i) && !is_bulk_species(i)) {
                            let mut molal = self.basis_molality[i];
                            for j in 0..self.num_eqm {
                                molal += stoi[(j, i)] * self.eqm_molality[j];
                            }
                            jac[(a, b)] += charge(i) * molal / charge(ba);
                        }
                        jac[(a, b)] += self.basis_molality[ba];
                        for j in 0..self.num_eqm {
                            jac[(a, b)] += stoi[(j, ba)] * self.eqm_molality[j];
                        }
                    } else {
                        // m + sum_j nu m_j = (R + B + dB - sum_k kappa n_k) / nw
                        let mut numerator = residual[a] + self.bulk_moles_old[ba] + mole_additions[ba];
                        for k in 0..self.num_kin {
                            numerator -= kin_stoi[(k, ba)] * self.kin_moles[k];
                        }
                        jac[(a, b)] += numerator / nw;
                    }
                } else {
                    let mb = self.basis_molality[bb];
                    if a == b {
                        jac[(a, b)] += nw;
                    }
                    for j in 0..self.num_eqm {
                        jac[(a, b)] += nw * stoi[(j, ba)] * self.eqm_molality[j] * stoi[(j, bb)] / mb;
                    }
                    if ba == cb {
                        // bb is an unknown, so never one of these fixed species
                        for i in (0..nb).filter(|&i| self.balances_charge(i) && !is_bulk_species(i)) {
                            let prefactor = charge(i) * nw / charge(ba);
                            for j in 0..self.num_eqm {
                                jac[(a, b)] += prefactor * stoi[(j, i)] * self.eqm_molality[j] * stoi[(j, bb)] / mb;
                            }
                        }
                    }
                }
            }

            for sp in 0..nsp {
                let b = nba + sp;
                for j in self.sorbed_on(sp) {
                    let dm_dx = 2.0 * self.db.eqm[j].charge * self.eqm_molality[j] / self.surface_pot_expr[sp];
                    jac[(a, b)] += nw * stoi[(j, ba)] * dm_dx;
                    if ba == cb {
                        // fixed charged species reach the sorbed species too
                        for i in (0..nb).filter(|&i| self.balances_charge(i) && !is_bulk_species(i)) {
                            jac[(a, b)] += charge(i) / charge(ba) * nw * stoi[(j, i)] * dm_dx;
                        }
                    }
                }
            }

            for k in 0..self.num_kin {
                let ind = nb + k;
                let b = nba + nsp + k;
                if ba == cb {
                    for i in (0..nb).filter(|&i| self.balances_charge(i)) {
                        if is_bulk_species(i) {
                            jac[(a, b)] += charge(i) * dmole_additions[(i, ind)] / charge(ba);
                        } else {
                            jac[(a, b)] += charge(i) / charge(ba) * kin_stoi[(k, i)];
                        }
                    }
                } else {
                    jac[(a, b)] -= dmole_additions[(ba, ind)];
                }
                jac[(a, b)] += kin_stoi[(k, ba)];
            }
        }

        // surface-potential rows
        for sp in 0..nsp {
            let a = nba + sp;
            for b in 0..nba {
                let bb = self.basis_index[b];
                for j in self.sorbed_on(sp) {
                    let z = self.db.eqm[j].charge;
                    jac[(a, b)] += if bb == 0 {
                        z * self.eqm_molality[j]
                    } else {
                        nw * z * self.eqm_molality[j] * stoi[(j, bb)] / self.basis_molality[bb]
                    };
                }
            }
            let x = self.surface_pot_expr[sp];
            jac[(a, a)] += self.surface_pot_prefactor(sp) * (1.0 + 1.0 / (x * x));
            for j in self.sorbed_on(sp) {
                let z = self.db.eqm[j].charge;
                jac[(a, a)] += nw * z * z * 2.0 * self.eqm_molality[j] / x;
            }
        }

        // kinetic rows
        for k in 0..self.num_kin {
            let a = nba + nsp + k;
            let ind = nb + k;
            jac[(a, a)] += 1.0;
            for b in 0..nba {
                jac[(a, b)] -= dmole_additions[(ind, self.basis_index[b])];
            }
            for kp in 0..self.num_kin {
                jac[(a, nba + nsp + kp)] -= dmole_additions[(ind, nb + kp)];
            }
        }
        Ok(jac)
    }
}

//! Basis swaps.
//!
//! Swapping basis species `r` for equilibrium species `s` is a change of
//! basis. With `S` the identity matrix whose row `r` is replaced by the
//! stoichiometry of `s`, every reaction row `nu` becomes `nu S^-1`, the
//! equilibrium constants shift by `-nu'_r log10K_s`, bulk compositions
//! transform by `S^-T` and the outgoing basis species becomes an equilibrium
//! species with reaction `e_r S^-1` and constant `-log10K_s / nu_sr`.
//!
//! # Example
//!
//! ```
//! use geochem::database::{ModelDatabase, Species};
//! use geochem::log10k::Log10KModel;
//! use geochem::swapper::SpeciesSwapper;
//!
//! let basis = vec![Species::water(), Species::aqueous("H+", 1.0), Species::aqueous("HCO3-", -1.0)];
//! let mut db = ModelDatabase::new(basis, vec![25.0], Log10KModel::PiecewiseLinear).unwrap();
//! db.add_equilibrium_species(
//!     Species::aqueous("CO2(aq)", 0.0),
//!     &[("H2O", -1.0), ("H+", 1.0), ("HCO3-", 1.0)],
//!     &[-6.34],
//! )
//! .unwrap();
//!
//! let swapper = SpeciesSwapper::default();
//! swapper.perform_swap_by_name(&mut db, "HCO3-", "CO2(aq)").unwrap();
//! assert_eq!(db.basis[2].name, "CO2(aq)");
//! assert_eq!(db.eqm[0].name, "HCO3-");
//! assert!((db.eqm_log10k[(0, 0)] - 6.34).abs() < 1e-12);
//! ```

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::database::ModelDatabase;
use crate::error::{GeochemError, GeochemResult};

/// Performs basis swaps on a [`ModelDatabase`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeciesSwapper {
    /// Stoichiometric coefficients smaller than this are treated as zero
    pub stoichiometry_tolerance: f64,
}

impl Default for SpeciesSwapper {
    fn default() -> Self {
        SpeciesSwapper { stoichiometry_tolerance: 1.0e-6 }
    }
}

/// Rewrites `row` (over the basis) for the new basis in which basis species
/// `r` is replaced by a species with stoichiometry `pivot`.
fn transform_row(row: &mut [f64], pivot: &[f64], r: usize) {
    let p = pivot[r];
    let nu_r = row[r];
    for (k, v) in row.iter_mut().enumerate() {
        if k == r {
            *v = nu_r / p;
        } else {
            *v -= nu_r * pivot[k] / p;
        }
    }
}

/// Applies the change of basis to every row of `stoi` and shifts `log10k`.
fn transform_reactions(
    stoi: &mut DMatrix<f64>,
    log10k: &mut DMatrix<f64>,
    pivot: &[f64],
    pivot_log10k: &[f64],
    r: usize,
) {
    let mut row = vec![0.0; stoi.ncols()];
    for j in 0..stoi.nrows() {
        for (c, v) in row.iter_mut().enumerate() {
            *v = stoi[(j, c)];
        }
        transform_row(&mut row, pivot, r);
        for (c, v) in row.iter().enumerate() {
            stoi[(j, c)] = *v;
        }
        for (t, k_s) in pivot_log10k.iter().enumerate() {
            log10k[(j, t)] -= row[r] * k_s;
        }
    }
}

impl SpeciesSwapper {
    pub fn new(stoichiometry_tolerance: f64) -> Self {
        SpeciesSwapper { stoichiometry_tolerance }
    }

    /// Checks that basis species `basis_index` may be swapped for equilibrium
    /// species `eqm_index`.
    pub fn check_swap(&self, db: &ModelDatabase, basis_index: usize, eqm_index: usize) -> GeochemResult<()> {
        if eqm_index >= db.num_eqm() {
            return Err(GeochemError::IndexOutOfRange {
                what: "equilibrium species",
                index: eqm_index,
                len: db.num_eqm(),
            });
        }
        let eqm_name = &db.eqm[eqm_index].name;
        if basis_index == 0 {
            return Err(GeochemError::CannotSwapWater(eqm_name.clone()));
        }
        if basis_index >= db.num_basis() {
            return Err(GeochemError::IndexOutOfRange {
                what: "basis species",
                index: basis_index,
                len: db.num_basis(),
            });
        }
        if db.is_sorbed(eqm_index) {
            return Err(GeochemError::SorptionSwap(eqm_name.clone()));
        }
        if db.eqm_stoichiometry[(eqm_index, basis_index)].abs() < self.stoichiometry_tolerance {
            return Err(GeochemError::SingularSwap {
                basis: db.basis[basis_index].name.clone(),
                eqm: eqm_name.clone(),
            });
        }
        Ok(())
    }

    /// Swaps basis species `basis_index` with equilibrium species `eqm_index`.
    pub fn perform_swap(&self, db: &mut ModelDatabase, basis_index: usize, eqm_index: usize) -> GeochemResult<()> {
        self.swap(db, None, basis_index, eqm_index)
    }

    /// Like [`perform_swap`](Self::perform_swap), also transforming the bulk
    /// composition `bulk` into the new basis.
    pub fn perform_swap_with_bulk(
        &self,
        db: &mut ModelDatabase,
        bulk: &mut [f64],
        basis_index: usize,
        eqm_index: usize,
    ) -> GeochemResult<()> {
        if bulk.len() != db.num_basis() {
            return Err(GeochemError::SizeMismatch {
                what: "bulk composition",
                expected: db.num_basis(),
                got: bulk.len(),
            });
        }
        self.swap(db, Some(bulk), basis_index, eqm_index)
    }

    /// Swaps by species names.
    pub fn perform_swap_by_name(
        &self,
        db: &mut ModelDatabase,
        out_of_basis: &str,
        into_basis: &str,
    ) -> GeochemResult<()> {
        let (r, s) = Self::indices(db, out_of_basis, into_basis)?;
        self.perform_swap(db, r, s)
    }

    /// Swaps by species names, transforming `bulk` too.
    pub fn perform_swap_with_bulk_by_name(
        &self,
        db: &mut ModelDatabase,
        bulk: &mut [f64],
        out_of_basis: &str,
        into_basis: &str,
    ) -> GeochemResult<()> {
        let (r, s) = Self::indices(db, out_of_basis, into_basis)?;
        self.perform_swap_with_bulk(db, bulk, r, s)
    }

    fn indices(db: &ModelDatabase, out_of_basis: &str, into_basis: &str) -> GeochemResult<(usize, usize)> {
        let r = db
            .basis_index(out_of_basis)
            .ok_or_else(|| GeochemError::NotInBasis(out_of_basis.to_string()))?;
        let s = db
            .eqm_index(into_basis)
            .ok_or_else(|| GeochemError::NotEquilibrium(into_basis.to_string()))?;
        Ok((r, s))
    }

    fn swap(&self, db: &mut ModelDatabase, bulk: Option<&mut [f64]>, r: usize, s: usize) -> GeochemResult<()> {
        self.check_swap(db, r, s)?;
        let nb = db.num_basis();
        let pivot: Vec<f64> = db.eqm_stoichiometry.row(s).iter().copied().collect();
        let pivot_eqm_k: Vec<f64> = db.eqm_log10k.row(s).iter().copied().collect();
        let p = pivot[r];

        transform_reactions(&mut db.eqm_stoichiometry, &mut db.eqm_log10k, &pivot, &pivot_eqm_k, r);
        transform_reactions(&mut db.redox_stoichiometry, &mut db.redox_log10k, &pivot, &pivot_eqm_k, r);
        transform_reactions(&mut db.kin_stoichiometry, &mut db.kin_log10k, &pivot, &pivot_eqm_k, r);

        // the outgoing basis species takes slot s
        for k in 0..nb {
            db.eqm_stoichiometry[(s, k)] = if k == r { 1.0 / p } else { -pivot[k] / p };
        }
        for (t, k_s) in pivot_eqm_k.iter().enumerate() {
            db.eqm_log10k[(s, t)] = -k_s / p;
        }
        db.refit_log10k()?;

        if let Some(bulk) = bulk {
            transform_row(bulk, &pivot, r);
        }

        // T <- S T, where S differs from the identity only in row r
        let old = db.swap_to_original_basis.clone();
        for c in 0..nb {
            db.swap_to_original_basis[(r, c)] = (0..nb).map(|k| pivot[k] * old[(k, c)]).sum();
        }

        let out_name = db.basis[r].name.clone();
        let in_name = db.eqm[s].name.clone();
        std::mem::swap(&mut db.basis[r], &mut db.eqm[s]);
        if db.redox_lhs == out_name {
            db.redox_lhs = in_name.clone();
        }
        for rate in &mut db.kin_rates {
            rate.swap_indices(r, nb + s);
        }
        log::debug!("swapped {out_name} out of the basis in favour of {in_name}");
        db.swapped_out.push(out_name);
        db.swapped_in.push(in_name);
        Ok(())
    }

    /// Finds the equilibrium species best suited to replace basis species
    /// `basis_index`: the one maximising `|stoichiometry| * molality` among
    /// those allowed. Returns `None` if no candidate has a positive score.
    pub fn find_best_eqm_swap(
        &self,
        basis_index: usize,
        db: &ModelDatabase,
        eqm_molality: &[f64],
        minerals_allowed: bool,
        gases_allowed: bool,
        sorption_allowed: bool,
    ) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (j, sp) in db.eqm.iter().enumerate() {
            let stoi = db.eqm_stoichiometry[(j, basis_index)];
            if stoi.abs() < self.stoichiometry_tolerance
                || (sp.is_mineral() && !minerals_allowed)
                || (sp.is_gas() && !gases_allowed)
                || (db.is_sorbed(j) && !sorption_allowed)
            {
                continue;
            }
            let score = (stoi * eqm_molality.get(j).copied().unwrap_or(0.0)).abs();
            if score > best.map_or(0.0, |b| b.1) {
                best = Some((j, score));
            }
        }
        best.map(|b| b.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Species;
    use crate::log10k::Log10KModel;

    fn carbonate() -> ModelDatabase {
        let basis = vec![
            Species::water(),
            Species::aqueous("H+", 1.0),
            Species::aqueous("HCO3-", -1.0),
            Species::aqueous("Ca++", 2.0),
        ];
        let mut db = ModelDatabase::new(basis, vec![25.0, 100.0], Log10KModel::PiecewiseLinear).unwrap();
        db.add_equilibrium_species(
            Species::aqueous("CO2(aq)", 0.0),
            &[("H2O", -1.0), ("H+", 1.0), ("HCO3-", 1.0)],
            &[-6.34, -6.44],
        )
        .unwrap();
        db.add_equilibrium_species(Species::aqueous("CO3--", -2.0), &[("HCO3-", 1.0), ("H+", -1.0)], &[10.33, 10.08])
            .unwrap();
        db.add_equilibrium_species(
            Species::mineral("Calcite"),
            &[("Ca++", 1.0), ("HCO3-", 1.0), ("H+", -1.0)],
            &[1.85, 1.1],
        )
        .unwrap();
        db.add_kinetic_species(
            Species::mineral("Aragonite"),
            &[("Ca++", 1.0), ("HCO3-", 1.0), ("H+", -1.0)],
            &[2.0, 1.2],
        )
        .unwrap();
        db
    }

    #[test]
    fn test_swap_rewrites_reactions() {
        let mut db = carbonate();
        let swapper = SpeciesSwapper::default();
        swapper.perform_swap_by_name(&mut db, "HCO3-", "CO2(aq)").unwrap();

        // HCO3- = CO2(aq) - H+ + H2O, log10K = 6.34
        assert_eq!(db.basis[2].name, "CO2(aq)");
        assert_eq!(db.eqm[0].name, "HCO3-");
        let row: Vec<f64> = db.eqm_stoichiometry.row(0).iter().copied().collect();
        assert_eq!(row, vec![1.0, -1.0, 1.0, 0.0]);
        assert!((db.eqm_log10k[(0, 0)] - 6.34).abs() < 1e-12);
        assert!((db.eqm_log10k[(0, 1)] - 6.44).abs() < 1e-12);

        // CO3-- = HCO3- - H+ = CO2(aq) - 2 H+ + H2O
        let row: Vec<f64> = db.eqm_stoichiometry.row(1).iter().copied().collect();
        assert_eq!(row, vec![1.0, -2.0, 1.0, 0.0]);
        assert!((db.eqm_log10k[(1, 0)] - (10.33 + 6.34)).abs() < 1e-12);

        // kinetic rows follow the same change of basis
        let row: Vec<f64> = db.kin_stoichiometry.row(0).iter().copied().collect();
        assert_eq!(row, vec![1.0, -2.0, 1.0, 1.0]);
        assert!((db.kin_log10k[(0, 0)] - (2.0 + 6.34)).abs() < 1e-12);

        // fitted rows are refreshed: halfway between 25 and 100 C
        let eqm = db.eqm_log10k_fit.sample(62.5);
        assert!((eqm[0] - 6.39).abs() < 1e-12);
        assert!((eqm[1] - (10.205 + 6.39)).abs() < 1e-12);
        assert!((db.kin_log10k_fit.sample(62.5)[0] - (1.6 + 6.39)).abs() < 1e-12);

        assert_eq!(db.swapped_out, vec!["HCO3-".to_string()]);
        assert_eq!(db.swapped_in, vec!["CO2(aq)".to_string()]);
    }

    #[test]
    fn test_swap_round_trip() {
        let original = carbonate();
        let mut db = original.clone();
        let swapper = SpeciesSwapper::default();
        let mut bulk = vec![55.5, 1.0e-3, 2.0e-3, 3.0e-3];
        swapper.perform_swap_with_bulk_by_name(&mut db, &mut bulk, "HCO3-", "CO2(aq)").unwrap();
        assert!((bulk[0] - 55.502).abs() < 1e-12);
        assert!((bulk[1] - (-1.0e-3)).abs() < 1e-15);
        assert!((bulk[2] - 2.0e-3).abs() < 1e-15);

        // bulk in the original basis is recovered by T^T
        let b = nalgebra::DVector::from_vec(bulk.clone());
        let orig = db.swap_to_original_basis.transpose() * b;
        assert!((orig[0] - 55.5).abs() < 1e-12);
        assert!((orig[1] - 1.0e-3).abs() < 1e-12);
        assert!((orig[2] - 2.0e-3).abs() < 1e-12);

        swapper.perform_swap_with_bulk_by_name(&mut db, &mut bulk, "CO2(aq)", "HCO3-").unwrap();
        assert_eq!(db.basis[2].name, "HCO3-");
        assert!((&db.eqm_stoichiometry - &original.eqm_stoichiometry).abs().max() < 1e-6);
        assert!((&db.eqm_log10k - &original.eqm_log10k).abs().max() < 1e-6);
        assert!((&db.swap_to_original_basis - DMatrix::<f64>::identity(4, 4)).abs().max() < 1e-12);
        assert!((bulk[1] - 1.0e-3).abs() < 1e-15);
    }

    #[test]
    fn test_swap_errors() {
        let mut db = carbonate();
        let swapper = SpeciesSwapper::default();
        assert_eq!(
            swapper.perform_swap(&mut db, 0, 0),
            Err(GeochemError::CannotSwapWater("CO2(aq)".to_string()))
        );
        assert!(matches!(
            swapper.perform_swap(&mut db, 9, 0),
            Err(GeochemError::IndexOutOfRange { what: "basis species", .. })
        ));
        assert!(matches!(
            swapper.perform_swap(&mut db, 1, 9),
            Err(GeochemError::IndexOutOfRange { what: "equilibrium species", .. })
        ));
        assert!(matches!(
            swapper.perform_swap_by_name(&mut db, "Ca++", "CO2(aq)"),
            Err(GeochemError::SingularSwap { .. })
        ));
        assert_eq!(
            swapper.perform_swap_by_name(&mut db, "CO2(aq)", "HCO3-"),
            Err(GeochemError::NotInBasis("CO2(aq)".to_string()))
        );
        assert_eq!(
            swapper.perform_swap_by_name(&mut db, "H+", "H+"),
            Err(GeochemError::NotEquilibrium("H+".to_string()))
        );
        let mut bulk = vec![1.0];
        assert!(matches!(
            swapper.perform_swap_with_bulk(&mut db, &mut bulk, 2, 0),
            Err(GeochemError::SizeMismatch { .. })
        ));
    }

    #[test]
    fn test_find_best_eqm_swap() {
        let db = carbonate();
        let swapper = SpeciesSwapper::default();
        let molality = [1.0e-3, 5.0e-3, 0.0];
        assert_eq!(swapper.find_best_eqm_swap(2, &db, &molality, true, true, false), Some(1));
        assert_eq!(swapper.find_best_eqm_swap(3, &db, &molality, true, true, false), None);
        assert_eq!(swapper.find_best_eqm_swap(3, &db, &molality, false, true, false), None);
    }
}

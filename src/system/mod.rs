//! The geochemical equilibrium system.
//!
//! A [`GeochemicalSystem`] owns a [`ModelDatabase`] and the user's constraints
//! on every basis species, and maintains a best-effort consistent state:
//! basis molalities (solvent mass in kg for water, free moles for minerals),
//! activities and activity coefficients, equilibrium molalities, bulk mole
//! numbers, surface-potential expressions and kinetic mole numbers.
//!
//! The state is driven to equilibrium by a Newton process over the *algebraic
//! system*, whose unknowns are, in order:
//!
//! 1. the basis species constrained by their bulk amount (water included when
//!    its bulk moles are fixed), except minerals and gases
//! 2. one surface-potential expression per sorbing surface
//! 3. the mole number of every kinetic species
//!
//! Each Newton iteration calls [`GeochemicalSystem::set_algebraic_variables`],
//! then [`residual`](GeochemicalSystem::residual) and
//! [`compute_jacobian`](GeochemicalSystem::compute_jacobian).
//! [`EquilibriumSolver`](crate::solvers::EquilibriumSolver) packages that loop.
//! After convergence, [`update_old_with_current`](GeochemicalSystem::update_old_with_current)
//! advances the state to the next time step.
//!
//! # Example
//!
//! ```
//! use geochem::activity::DaviesActivity;
//! use geochem::database::{ModelDatabase, Species};
//! use geochem::log10k::Log10KModel;
//! use geochem::system::{Constraint, GeochemicalSystem, SystemSettings};
//!
//! let basis = vec![
//!     Species::water(),
//!     Species::aqueous("H+", 1.0),
//!     Species::aqueous("Na+", 1.0),
//!     Species::aqueous("Cl-", -1.0),
//! ];
//! let mut db = ModelDatabase::new(basis, vec![25.0], Log10KModel::PiecewiseLinear).unwrap();
//! db.add_equilibrium_species(Species::aqueous("OH-", -1.0), &[("H2O", 1.0), ("H+", -1.0)], &[13.99])
//!     .unwrap();
//!
//! let constraints = vec![
//!     Constraint::kg_solvent_water(1.0),
//!     Constraint::activity("H+", 1.0e-7),
//!     Constraint::bulk("Na+", 0.1),
//!     Constraint::bulk("Cl-", 0.1),
//! ];
//! let system = GeochemicalSystem::new(
//!     db,
//!     DaviesActivity::new(),
//!     &SystemSettings::new("Cl-"),
//!     &constraints,
//!     &[],
//! )
//! .unwrap();
//!
//! // Na+ and Cl- have fixed bulk amounts, so their molalities are unknown
//! assert_eq!(system.num_in_algebraic_system(), 2);
//! ```

mod algebraic;
mod charge;
mod config;
mod modify;
mod timestep;

pub use config::{Constraint, ConstraintUserMeaning, KineticInitial, SystemSettings};

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::activity::{ActivityModel, DaviesActivity, IonicStrength};
use crate::constants::{
    CELSIUS_TO_KELVIN, DENSITY_WATER, DIELECTRIC_CONSTANT_WATER, FARADAY, GAS_CONSTANT, MOLES_PER_KG_WATER,
    PERMITTIVITY_FREE_SPACE,
};
use crate::database::ModelDatabase;
use crate::error::{GeochemError, GeochemResult};
use crate::swapper::SpeciesSwapper;
use crate::units::to_moles;

/// Internal meaning of the constraint on a basis species, in internal units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintMeaning {
    /// Bulk moles of water
    MolesBulkWater,
    /// Mass of solvent water [kg]
    KgSolventWater,
    /// Bulk moles of a non-water species
    MolesBulkSpecies,
    FreeMolality,
    /// Free moles of a basis mineral
    FreeMolesMineralSpecies,
    Fugacity,
    Activity,
}

impl ConstraintMeaning {
    /// Whether the constraint fixes a bulk mole number.
    pub fn is_bulk(self) -> bool {
        matches!(self, Self::MolesBulkWater | Self::MolesBulkSpecies)
    }
}

fn check_index(what: &'static str, index: usize, len: usize) -> GeochemResult<()> {
    if index >= len {
        return Err(GeochemError::IndexOutOfRange { what, index, len });
    }
    Ok(())
}

/// Constrained geochemical system with residual and Jacobian assembly.
///
/// The system owns its database, activity model, ionic-strength calculator
/// and swapper, so independent instances can be mutated freely. `Clone`
/// gives a deep copy.
#[derive(Debug, Clone)]
pub struct GeochemicalSystem<A: ActivityModel = DaviesActivity> {
    db: ModelDatabase,
    activity_model: A,
    ionic_strength: IonicStrength,
    swapper: SpeciesSwapper,

    num_basis: usize,
    num_eqm: usize,
    num_redox: usize,
    num_surface_pot: usize,
    num_kin: usize,

    charge_balance_species: String,
    original_charge_balance_species: String,
    charge_balance_index: usize,

    constraint_value: Vec<f64>,
    /// Constraint values before any charge-balance adjustment
    original_constraint_value: Vec<f64>,
    constraint_meaning: Vec<ConstraintMeaning>,

    eqm_log10k: Vec<f64>,
    redox_log10k: Vec<f64>,
    kin_log10k: Vec<f64>,

    in_algebraic_system: Vec<bool>,
    num_basis_in_algebraic_system: usize,
    num_in_algebraic_system: usize,
    /// Algebraic slot of each basis species, if it is an unknown
    algebraic_index: Vec<Option<usize>>,
    /// Basis index of each algebraic basis unknown
    basis_index: Vec<usize>,

    bulk_moles_old: Vec<f64>,
    /// Solvent mass [kg] for water, free moles for minerals, zero for gases
    basis_molality: Vec<f64>,
    basis_activity_known: Vec<bool>,
    basis_activity: Vec<f64>,
    basis_activity_coef: Vec<f64>,
    eqm_molality: Vec<f64>,
    eqm_activity_coef: Vec<f64>,
    /// Filled on demand, see `compute_and_get_equilibrium_activity`
    eqm_activity: Vec<f64>,
    surface_pot_expr: Vec<f64>,
    sorbing_surface_area: Vec<f64>,
    kin_moles: Vec<f64>,
    kin_moles_old: Vec<f64>,

    iters_to_make_consistent: usize,
    temperature: f64,
    min_initial_molality: f64,
    original_redox_lhs: String,
}

impl<A: ActivityModel> GeochemicalSystem<A> {
    /// Builds and initializes a system.
    ///
    /// Kinetic amounts are converted to moles first, so that bulk-composition
    /// constraints can account for them. Then the swaps in `settings` are
    /// performed, the constraints are checked and converted, charge balance is
    /// enforced when every charged species has a bulk constraint, and a
    /// consistent initial state is computed.
    pub fn new(
        mut db: ModelDatabase,
        activity_model: A,
        settings: &SystemSettings,
        constraints: &[Constraint],
        kinetic_initial: &[KineticInitial],
    ) -> GeochemResult<Self> {
        let num_kin = db.num_kinetic();
        if kinetic_initial.len() != num_kin {
            return Err(GeochemError::KineticInitialCount { expected: num_kin, got: kinetic_initial.len() });
        }
        let mut kin_moles = vec![0.0; num_kin];
        for (k, sp) in db.kinetic.iter().enumerate() {
            let initial = kinetic_initial
                .iter()
                .find(|ki| ki.species == sp.name)
                .ok_or_else(|| GeochemError::MissingKineticInitial(sp.name.clone()))?;
            if !config::is_kinetic_unit(initial.unit) {
                return Err(GeochemError::InvalidKineticUnit(sp.name.clone()));
            }
            let moles = to_moles(initial.value, initial.unit, &sp.name, &db)?;
            if moles <= 0.0 {
                return Err(GeochemError::NonPositiveKineticMoles(moles));
            }
            kin_moles[k] = moles;
        }

        let cb_name = &settings.charge_balance_species;
        if settings.swap_out_of_basis.len() != settings.swap_into_basis.len() {
            return Err(GeochemError::SwapListMismatch {
                out: settings.swap_out_of_basis.len(),
                into: settings.swap_into_basis.len(),
            });
        }
        if settings.swap_out_of_basis.iter().any(|s| s == cb_name) {
            return Err(GeochemError::SwapOutChargeBalance(cb_name.clone()));
        }
        for (out, into) in settings.swap_out_of_basis.iter().zip(&settings.swap_into_basis) {
            settings.swapper.perform_swap_by_name(&mut db, out, into)?;
        }

        let charge_balance_index =
            db.basis_index(cb_name).ok_or_else(|| GeochemError::ChargeBalanceNotInBasis(cb_name.clone()))?;
        if db.basis[charge_balance_index].charge == 0.0 {
            return Err(GeochemError::ChargeBalanceUncharged(cb_name.clone()));
        }

        let (constraint_value, constraint_meaning) =
            config::normalize_constraints(&db, constraints, &kin_moles, charge_balance_index)?;

        let num_basis = db.num_basis();
        let num_eqm = db.num_eqm();
        let num_redox = db.num_redox();
        let num_surface_pot = db.num_surfaces();
        let original_redox_lhs = db.redox_lhs.clone();
        let mut system = GeochemicalSystem {
            db,
            activity_model,
            ionic_strength: settings.ionic_strength.clone(),
            swapper: settings.swapper.clone(),
            num_basis,
            num_eqm,
            num_redox,
            num_surface_pot,
            num_kin,
            charge_balance_species: cb_name.clone(),
            original_charge_balance_species: cb_name.clone(),
            charge_balance_index,
            original_constraint_value: constraint_value.clone(),
            constraint_value,
            constraint_meaning,
            eqm_log10k: vec![0.0; num_eqm],
            redox_log10k: vec![0.0; num_redox],
            kin_log10k: vec![0.0; num_kin],
            in_algebraic_system: vec![false; num_basis],
            num_basis_in_algebraic_system: 0,
            num_in_algebraic_system: 0,
            algebraic_index: vec![None; num_basis],
            basis_index: Vec::new(),
            bulk_moles_old: vec![0.0; num_basis],
            basis_molality: vec![0.0; num_basis],
            basis_activity_known: vec![false; num_basis],
            basis_activity: vec![0.0; num_basis],
            basis_activity_coef: vec![1.0; num_basis],
            eqm_molality: vec![0.0; num_eqm],
            eqm_activity_coef: vec![1.0; num_eqm],
            eqm_activity: vec![0.0; num_eqm],
            surface_pot_expr: vec![1.0; num_surface_pot],
            sorbing_surface_area: vec![0.0; num_surface_pot],
            kin_moles_old: kin_moles.clone(),
            kin_moles,
            iters_to_make_consistent: settings.iters_to_make_consistent,
            temperature: settings.temperature,
            min_initial_molality: settings.min_initial_molality,
            original_redox_lhs,
        };
        system.initialize()?;
        Ok(system)
    }

    fn initialize(&mut self) -> GeochemResult<()> {
        self.build_temperature_dependent_quantities();
        self.enforce_charge_balance_if_simple();
        self.build_algebraic_info();
        self.init_bulk_and_free();
        self.build_known_basis_activities();
        self.eqm_molality.fill(0.0);
        self.surface_pot_expr.fill(1.0);
        self.compute_consistent_configuration();
        Ok(())
    }

    fn build_temperature_dependent_quantities(&mut self) {
        self.eqm_log10k = self.db.eqm_log10k_fit.sample(self.temperature);
        self.redox_log10k = self.db.redox_log10k_fit.sample(self.temperature);
        self.kin_log10k = self.db.kin_log10k_fit.sample(self.temperature);
    }

    /// Water is an unknown iff its bulk moles are fixed; other non-mineral,
    /// non-gas species iff their bulk moles are fixed.
    fn build_algebraic_info(&mut self) {
        for (i, sp) in self.db.basis.iter().enumerate() {
            let meaning = self.constraint_meaning[i];
            self.in_algebraic_system[i] = if i == 0 {
                meaning == ConstraintMeaning::MolesBulkWater
            } else if sp.is_gas() || sp.is_mineral() {
                false
            } else {
                meaning == ConstraintMeaning::MolesBulkSpecies
            };
        }
        self.basis_index.clear();
        for i in 0..self.num_basis {
            if self.in_algebraic_system[i] {
                self.algebraic_index[i] = Some(self.basis_index.len());
                self.basis_index.push(i);
            } else {
                self.algebraic_index[i] = None;
            }
        }
        self.num_basis_in_algebraic_system = self.basis_index.len();
        self.num_in_algebraic_system = self.num_basis_in_algebraic_system + self.num_surface_pot + self.num_kin;
    }

    /// Initial guesses of bulk moles and free molalities from the constraints.
    /// Water comes first, so the solvent mass is known when molalities are guessed.
    fn init_bulk_and_free(&mut self) {
        use ConstraintMeaning as M;
        for i in 0..self.num_basis {
            let value = self.constraint_value[i];
            let (bulk, molality) = match self.constraint_meaning[i] {
                M::MolesBulkWater => (value, self.min_initial_molality.max(0.999 * value / MOLES_PER_KG_WATER)),
                M::KgSolventWater => (value * MOLES_PER_KG_WATER / 0.999, value),
                M::MolesBulkSpecies => (value, self.min_initial_molality.max(0.9 * value / self.basis_molality[0])),
                M::FreeMolality => (value * self.basis_molality[0] / 0.9, value),
                M::FreeMolesMineralSpecies => (value / 0.9, value),
                M::Fugacity => (0.0, 0.0),
                M::Activity => (value / 0.9, if i == 0 { 1.0 } else { value / 0.9 }),
            };
            self.bulk_moles_old[i] = bulk;
            self.basis_molality[i] = molality;
        }
    }

    fn build_known_basis_activities(&mut self) {
        for i in 0..self.num_basis {
            let known = matches!(self.constraint_meaning[i], ConstraintMeaning::Activity | ConstraintMeaning::Fugacity);
            self.basis_activity_known[i] = known;
            if known {
                self.basis_activity[i] = self.constraint_value[i];
            }
            if self.db.basis[i].is_mineral() {
                self.basis_activity_known[i] = true;
                self.basis_activity[i] = 1.0;
            }
        }
    }

    /// Recomputes activities, equilibrium molalities, bulk moles, free
    /// mineral moles and surface areas from the current unknowns.
    ///
    /// Activity coefficients lag one pass behind the molalities; extra passes
    /// (`iters_to_make_consistent`) reduce that lag.
    fn compute_consistent_configuration(&mut self) {
        for pass in 0..=self.iters_to_make_consistent {
            log::trace!("consistency pass {pass}");
            self.update_activity_coefficients();
            self.update_basis_molality_for_known_activity();
            self.compute_remaining_basis_activities();
            self.compute_eqm_molalities();
        }
        self.compute_bulk();
        self.compute_free_mineral_moles();
        self.compute_sorbing_surface_area();
    }

    fn update_activity_coefficients(&mut self) {
        let is = self.ionic_strength();
        let is_stoich = self.stoichiometric_ionic_strength();
        self.activity_model.set_internal_parameters(self.temperature, is, is_stoich);
        self.activity_model
            .build_activity_coefficients(&self.db, &mut self.basis_activity_coef, &mut self.eqm_activity_coef);
    }

    fn update_basis_molality_for_known_activity(&mut self) {
        for i in 1..self.num_basis {
            let sp = &self.db.basis[i];
            if self.basis_activity_known[i] && !sp.is_mineral() && !sp.is_gas() {
                self.basis_molality[i] = self.basis_activity[i] / self.basis_activity_coef[i];
            }
        }
    }

    fn compute_remaining_basis_activities(&mut self) {
        if !self.basis_activity_known[0] {
            self.basis_activity[0] = self.activity_model.water_activity();
        }
        for i in 1..self.num_basis {
            if !self.basis_activity_known[i] {
                self.basis_activity[i] = self.basis_activity_coef[i] * self.basis_molality[i];
            }
        }
    }

    fn eqm_log10_activity_product(&self, j: usize) -> f64 {
        (0..self.num_basis)
            .map(|i| self.db.eqm_stoichiometry[(j, i)] * self.basis_activity[i].log10())
            .sum()
    }

    /// `expr^(2 z)` for sorbed species, one otherwise.
    fn surface_sorption_modifier(&self, j: usize) -> f64 {
        match self.db.surface_sorption[j] {
            Some(sp) => self.surface_pot_expr[sp].powf(2.0 * self.db.eqm[j].charge),
            None => 1.0,
        }
    }

    fn compute_eqm_molalities(&mut self) {
        for j in 0..self.num_eqm {
            let sp = &self.db.eqm[j];
            self.eqm_molality[j] = if sp.is_mineral() || sp.is_gas() {
                0.0
            } else {
                // work in log10 to avoid overflow
                let log10m = self.eqm_log10_activity_product(j) - self.eqm_log10k[j];
                10f64.powf(log10m) / self.eqm_activity_coef[j] * self.surface_sorption_modifier(j)
            };
        }
    }

    fn compute_bulk(&mut self) {
        for i in 0..self.num_basis {
            self.bulk_moles_old[i] = if self.constraint_meaning[i].is_bulk() {
                self.constraint_value[i]
            } else {
                self.bulk_from_molalities(i)
            };
        }
    }

    /// Bulk moles of basis species `i` implied by the current molalities.
    fn bulk_from_molalities(&self, i: usize) -> f64 {
        let nw = self.basis_molality[0];
        let mut bulk = if i == 0 {
            MOLES_PER_KG_WATER
        } else if self.db.basis[i].is_mineral() {
            // free moles, not a molality
            self.basis_molality[i] / nw
        } else {
            self.basis_molality[i]
        };
        for j in 0..self.num_eqm {
            bulk += self.db.eqm_stoichiometry[(j, i)] * self.eqm_molality[j];
        }
        bulk *= nw;
        for k in 0..self.num_kin {
            bulk += self.db.kin_stoichiometry[(k, i)] * self.kin_moles[k];
        }
        bulk
    }

    fn compute_free_mineral_moles(&mut self) {
        let nw = self.basis_molality[0];
        for i in 0..self.num_basis {
            if !self.db.basis[i].is_mineral() {
                continue;
            }
            self.basis_molality[i] = if self.constraint_meaning[i] == ConstraintMeaning::FreeMolesMineralSpecies {
                self.constraint_value[i]
            } else {
                let mut free = self.bulk_moles_old[i];
                for j in 0..self.num_eqm {
                    free -= nw * self.db.eqm_stoichiometry[(j, i)] * self.eqm_molality[j];
                }
                for k in 0..self.num_kin {
                    free -= self.db.kin_stoichiometry[(k, i)] * self.kin_moles[k];
                }
                free
            };
        }
    }

    /// Specific area times the mass of the sorbing mineral when it is a basis species.
    fn compute_sorbing_surface_area(&mut self) {
        for sp in 0..self.num_surface_pot {
            let surface = &self.db.surfaces[sp];
            let mut area = surface.specific_area;
            if let Some(i) = self.db.basis_index(&surface.mineral) {
                area *= self.db.basis[i].molecular_weight * self.basis_molality[i];
            }
            self.sorbing_surface_area[sp] = area;
        }
    }

    fn surface_pot_prefactor(&self, sp: usize) -> f64 {
        0.5 * self.sorbing_surface_area[sp] / FARADAY
            * (8.0
                * GAS_CONSTANT
                * (self.temperature + CELSIUS_TO_KELVIN)
                * PERMITTIVITY_FREE_SPACE
                * DIELECTRIC_CONSTANT_WATER
                * DENSITY_WATER
                * self.ionic_strength())
            .sqrt()
    }

    /// Replaces `self` by a copy of `other`, provided both systems have the
    /// same numbers of basis, equilibrium, redox, surface and kinetic species
    /// and the same original charge-balance species.
    pub fn clone_from_checked(&mut self, other: &Self) -> GeochemResult<()>
    where
        A: Clone,
    {
        let counts = [
            ("basis species", self.num_basis, other.num_basis),
            ("equilibrium species", self.num_eqm, other.num_eqm),
            ("redox species", self.num_redox, other.num_redox),
            ("surface potentials", self.num_surface_pot, other.num_surface_pot),
            ("kinetic species", self.num_kin, other.num_kin),
        ];
        for (what, mine, theirs) in counts {
            if mine != theirs {
                return Err(GeochemError::IncompatibleAssignment(format!("{mine} {what} versus {theirs}")));
            }
        }
        if self.original_charge_balance_species != other.original_charge_balance_species {
            return Err(GeochemError::IncompatibleAssignment(format!(
                "original charge-balance species {} versus {}",
                self.original_charge_balance_species, other.original_charge_balance_species
            )));
        }
        self.clone_from(other);
        Ok(())
    }

    pub fn database(&self) -> &ModelDatabase {
        &self.db
    }

    pub fn swapper(&self) -> &SpeciesSwapper {
        &self.swapper
    }

    pub fn activity_model(&self) -> &A {
        &self.activity_model
    }

    pub fn num_basis(&self) -> usize {
        self.num_basis
    }

    pub fn num_eqm(&self) -> usize {
        self.num_eqm
    }

    pub fn num_redox(&self) -> usize {
        self.num_redox
    }

    pub fn num_kinetic(&self) -> usize {
        self.num_kin
    }

    pub fn num_surface_potentials(&self) -> usize {
        self.num_surface_pot
    }

    pub fn num_in_algebraic_system(&self) -> usize {
        self.num_in_algebraic_system
    }

    pub fn num_basis_in_algebraic_system(&self) -> usize {
        self.num_basis_in_algebraic_system
    }

    /// Whether each basis species is an algebraic unknown.
    pub fn in_algebraic_system(&self) -> &[bool] {
        &self.in_algebraic_system
    }

    /// Basis index of each algebraic basis unknown.
    pub fn basis_index_of_algebraic_system(&self) -> &[usize] {
        &self.basis_index
    }

    /// Algebraic slot of each basis species, `None` if it is not an unknown.
    pub fn algebraic_index_of_basis_system(&self) -> &[Option<usize>] {
        &self.algebraic_index
    }

    pub fn charge_balance_basis_index(&self) -> usize {
        self.charge_balance_index
    }

    pub fn charge_balance_species(&self) -> &str {
        &self.charge_balance_species
    }

    pub fn original_charge_balance_species(&self) -> &str {
        &self.original_charge_balance_species
    }

    pub fn constraint_meaning(&self) -> &[ConstraintMeaning] {
        &self.constraint_meaning
    }

    /// Constraint values in internal units.
    pub fn constraint_values(&self) -> &[f64] {
        &self.constraint_value
    }

    /// Redox left-hand side at construction, before any swap renamed it.
    pub fn original_redox_lhs(&self) -> &str {
        &self.original_redox_lhs
    }

    /// Temperature [C].
    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// log10K of equilibrium species `j` at the current temperature.
    pub fn log10k(&self, j: usize) -> GeochemResult<f64> {
        check_index("equilibrium species", j, self.num_eqm)?;
        Ok(self.eqm_log10k[j])
    }

    pub fn redox_log10k(&self, red: usize) -> GeochemResult<f64> {
        check_index("redox species", red, self.num_redox)?;
        Ok(self.redox_log10k[red])
    }

    pub fn kinetic_log10k(&self, kin: usize) -> GeochemResult<f64> {
        check_index("kinetic species", kin, self.num_kin)?;
        Ok(self.kin_log10k[kin])
    }

    /// log10 of the activity product of equilibrium species `j`'s reaction.
    pub fn log10_activity_product(&self, j: usize) -> GeochemResult<f64> {
        check_index("equilibrium species", j, self.num_eqm)?;
        Ok(self.eqm_log10_activity_product(j))
    }

    pub fn log10_redox_activity_product(&self, red: usize) -> GeochemResult<f64> {
        check_index("redox species", red, self.num_redox)?;
        Ok((0..self.num_basis)
            .map(|i| self.db.redox_stoichiometry[(red, i)] * self.basis_activity[i].log10())
            .sum())
    }

    pub fn log10_kinetic_activity_product(&self, kin: usize) -> GeochemResult<f64> {
        check_index("kinetic species", kin, self.num_kin)?;
        Ok(self.kinetic_log10_ap(kin))
    }

    fn kinetic_log10_ap(&self, kin: usize) -> f64 {
        (0..self.num_basis)
            .map(|i| self.db.kin_stoichiometry[(kin, i)] * self.basis_activity[i].log10())
            .sum()
    }

    /// Mass of solvent water [kg].
    pub fn solvent_water_mass(&self) -> f64 {
        self.basis_molality[0]
    }

    /// Solvent mass for water, free molality for aqueous species, free moles
    /// for minerals and zero for gases.
    pub fn basis_molality(&self) -> &[f64] {
        &self.basis_molality
    }

    pub fn basis_activity_known(&self) -> &[bool] {
        &self.basis_activity_known
    }

    pub fn basis_activity(&self, i: usize) -> GeochemResult<f64> {
        check_index("basis species", i, self.num_basis)?;
        Ok(self.basis_activity[i])
    }

    pub fn basis_activities(&self) -> &[f64] {
        &self.basis_activity
    }

    pub fn basis_activity_coefficient(&self, i: usize) -> GeochemResult<f64> {
        check_index("basis species", i, self.num_basis)?;
        Ok(self.basis_activity_coef[i])
    }

    pub fn basis_activity_coefficients(&self) -> &[f64] {
        &self.basis_activity_coef
    }

    pub fn equilibrium_molality(&self, j: usize) -> GeochemResult<f64> {
        check_index("equilibrium species", j, self.num_eqm)?;
        Ok(self.eqm_molality[j])
    }

    pub fn equilibrium_molalities(&self) -> &[f64] {
        &self.eqm_molality
    }

    pub fn equilibrium_activity_coefficient(&self, j: usize) -> GeochemResult<f64> {
        check_index("equilibrium species", j, self.num_eqm)?;
        Ok(self.eqm_activity_coef[j])
    }

    pub fn equilibrium_activity_coefficients(&self) -> &[f64] {
        &self.eqm_activity_coef
    }

    /// Activity of equilibrium species `j`: one for minerals, the fugacity
    /// implied by the basis activities for gases, `gamma * m` otherwise.
    pub fn equilibrium_activity(&self, j: usize) -> GeochemResult<f64> {
        check_index("equilibrium species", j, self.num_eqm)?;
        Ok(self.eqm_activity_unchecked(j))
    }

    fn eqm_activity_unchecked(&self, j: usize) -> f64 {
        let sp = &self.db.eqm[j];
        if sp.is_mineral() {
            1.0
        } else if sp.is_gas() {
            10f64.powf(self.eqm_log10_activity_product(j) - self.eqm_log10k[j])
        } else {
            self.eqm_activity_coef[j] * self.eqm_molality[j]
        }
    }

    /// Computes and caches the activity of every equilibrium species.
    pub fn compute_and_get_equilibrium_activity(&mut self) -> &[f64] {
        for j in 0..self.num_eqm {
            self.eqm_activity[j] = self.eqm_activity_unchecked(j);
        }
        &self.eqm_activity
    }

    pub fn kinetic_moles(&self, k: usize) -> GeochemResult<f64> {
        check_index("kinetic species", k, self.num_kin)?;
        Ok(self.kin_moles[k])
    }

    pub fn kinetic_mole_numbers(&self) -> &[f64] {
        &self.kin_moles
    }

    /// Sets both the current and old mole numbers of kinetic species `k`.
    pub fn set_kinetic_moles(&mut self, k: usize, moles: f64) -> GeochemResult<()> {
        check_index("kinetic species", k, self.num_kin)?;
        if moles <= 0.0 {
            return Err(GeochemError::NonPositiveKineticMoles(moles));
        }
        self.kin_moles[k] = moles;
        self.kin_moles_old[k] = moles;
        Ok(())
    }

    pub fn bulk_moles_old(&self) -> &[f64] {
        &self.bulk_moles_old
    }

    /// Bulk moles expressed in the basis the database started with.
    pub fn bulk_old_in_original_basis(&self) -> DVector<f64> {
        self.db.swap_to_original_basis.transpose() * DVector::from_column_slice(&self.bulk_moles_old)
    }

    /// Bulk moles of mobile species, in the original basis. Minerals, gases,
    /// sorbed species and kinetic species are excluded.
    pub fn transported_bulk_in_original_basis(&self) -> DVector<f64> {
        let nw = self.basis_molality[0];
        let transported = DVector::from_fn(self.num_basis, |i, _| {
            let sp = &self.db.basis[i];
            let mut bulk = if i == 0 {
                MOLES_PER_KG_WATER
            } else if !sp.transported {
                0.0
            } else if sp.is_mineral() {
                self.basis_molality[i] / nw
            } else {
                self.basis_molality[i]
            };
            for (j, eqm) in self.db.eqm.iter().enumerate() {
                if eqm.transported {
                    bulk += self.db.eqm_stoichiometry[(j, i)] * self.eqm_molality[j];
                }
            }
            bulk * nw
        });
        self.db.swap_to_original_basis.transpose() * transported
    }

    /// Bulk moles of basis species `i` implied by the current molalities and
    /// kinetic mole numbers.
    pub fn compute_bulk_from_molalities(&self, i: usize) -> GeochemResult<f64> {
        check_index("basis species", i, self.num_basis)?;
        Ok(self.bulk_from_molalities(i))
    }

    /// Saturation index `log10(Q/K)` of every equilibrium mineral, zero for
    /// the other equilibrium species.
    pub fn saturation_indices(&self) -> Vec<f64> {
        (0..self.num_eqm)
            .map(|j| {
                if self.db.eqm[j].is_mineral() {
                    self.eqm_log10_activity_product(j) - self.eqm_log10k[j]
                } else {
                    0.0
                }
            })
            .collect()
    }

    pub fn ionic_strength(&self) -> f64 {
        self.ionic_strength.ionic_strength(&self.db, &self.basis_molality, &self.eqm_molality, &self.kin_moles)
    }

    pub fn stoichiometric_ionic_strength(&self) -> f64 {
        self.ionic_strength.stoichiometric_ionic_strength(
            &self.db,
            &self.basis_molality,
            &self.eqm_molality,
            &self.kin_moles,
        )
    }

    /// Surface potential [V] of surface `sp`.
    pub fn surface_potential(&self, sp: usize) -> GeochemResult<f64> {
        check_index("surface potentials", sp, self.num_surface_pot)?;
        Ok(-2.0 * GAS_CONSTANT * (self.temperature + CELSIUS_TO_KELVIN) / FARADAY * self.surface_pot_expr[sp].ln())
    }

    /// Surface charge [C/m^2] of surface `sp`.
    pub fn surface_charge(&self, sp: usize) -> GeochemResult<f64> {
        check_index("surface potentials", sp, self.num_surface_pot)?;
        let x = self.surface_pot_expr[sp];
        let moles_per_area = self.surface_pot_prefactor(sp) / self.sorbing_surface_area[sp] * (1.0 / x - x);
        Ok(moles_per_area * FARADAY)
    }

    /// Sorbing area [m^2] of each surface.
    pub fn sorbing_surface_area(&self) -> &[f64] {
        &self.sorbing_surface_area
    }
}

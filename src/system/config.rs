//! User-facing configuration of a [`GeochemicalSystem`](super::GeochemicalSystem)
//! and the normalization of constraints into internal units.

use serde::{Deserialize, Serialize};

use super::ConstraintMeaning;
use crate::activity::IonicStrength;
use crate::database::ModelDatabase;
use crate::error::{GeochemError, GeochemResult};
use crate::swapper::SpeciesSwapper;
use crate::units::{to_moles, GeochemistryUnit};

/// How the user expresses the constraint on a basis species.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintUserMeaning {
    /// Mass of solvent water (water only)
    KgSolventWater,
    /// Bulk amount, excluding what is held in kinetic species
    BulkComposition,
    /// Bulk amount, including what is held in kinetic species
    BulkCompositionWithKinetic,
    /// Free molality or mass per kg of solvent
    FreeConcentration,
    /// Free amount of a basis mineral
    FreeMineral,
    Activity,
    Log10Activity,
    Fugacity,
    Log10Fugacity,
}

/// A constraint on one basis species.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    pub species: String,
    pub value: f64,
    pub unit: GeochemistryUnit,
    pub meaning: ConstraintUserMeaning,
}

impl Constraint {
    pub fn new(species: &str, value: f64, unit: GeochemistryUnit, meaning: ConstraintUserMeaning) -> Self {
        Constraint { species: species.to_string(), value, unit, meaning }
    }

    /// Bulk composition in moles.
    pub fn bulk(species: &str, moles: f64) -> Self {
        Self::new(species, moles, GeochemistryUnit::Moles, ConstraintUserMeaning::BulkComposition)
    }

    /// Free molality.
    pub fn free_molality(species: &str, molality: f64) -> Self {
        Self::new(species, molality, GeochemistryUnit::Molal, ConstraintUserMeaning::FreeConcentration)
    }

    /// Free moles of a basis mineral.
    pub fn free_mineral(species: &str, moles: f64) -> Self {
        Self::new(species, moles, GeochemistryUnit::Moles, ConstraintUserMeaning::FreeMineral)
    }

    pub fn activity(species: &str, activity: f64) -> Self {
        Self::new(species, activity, GeochemistryUnit::Dimensionless, ConstraintUserMeaning::Activity)
    }

    pub fn fugacity(species: &str, fugacity: f64) -> Self {
        Self::new(species, fugacity, GeochemistryUnit::Dimensionless, ConstraintUserMeaning::Fugacity)
    }

    /// Mass of solvent water in kg.
    pub fn kg_solvent_water(kg: f64) -> Self {
        Self::new(
            crate::constants::WATER_NAME,
            kg,
            GeochemistryUnit::Kg,
            ConstraintUserMeaning::KgSolventWater,
        )
    }
}

/// Initial amount of a kinetic species.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KineticInitial {
    pub species: String,
    pub value: f64,
    pub unit: GeochemistryUnit,
}

impl KineticInitial {
    pub fn new(species: &str, value: f64, unit: GeochemistryUnit) -> Self {
        KineticInitial { species: species.to_string(), value, unit }
    }

    /// Initial amount in moles.
    pub fn moles(species: &str, moles: f64) -> Self {
        Self::new(species, moles, GeochemistryUnit::Moles)
    }
}

/// Settings of a geochemical system that are not per-species constraints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemSettings {
    /// Basis species whose bulk amount is adjusted to keep the solution neutral
    pub charge_balance_species: String,
    /// Basis species to swap out before the constraints are applied
    pub swap_out_of_basis: Vec<String>,
    /// Equilibrium species replacing `swap_out_of_basis`, pairwise
    pub swap_into_basis: Vec<String>,
    /// Temperature [C]
    pub temperature: f64,
    /// Extra activity/molality passes made when computing a consistent state
    pub iters_to_make_consistent: usize,
    /// Lower bound on initial guesses of free molalities
    pub min_initial_molality: f64,
    pub ionic_strength: IonicStrength,
    pub swapper: SpeciesSwapper,
}

impl Default for SystemSettings {
    fn default() -> Self {
        SystemSettings {
            charge_balance_species: String::new(),
            swap_out_of_basis: Vec::new(),
            swap_into_basis: Vec::new(),
            temperature: 25.0,
            iters_to_make_consistent: 0,
            min_initial_molality: 1.0e-20,
            ionic_strength: IonicStrength::default(),
            swapper: SpeciesSwapper::default(),
        }
    }
}

impl SystemSettings {
    /// Default settings with the given charge-balance species.
    pub fn new(charge_balance_species: &str) -> Self {
        SystemSettings { charge_balance_species: charge_balance_species.to_string(), ..Default::default() }
    }

    /// Adds a swap performed at construction.
    pub fn with_swap(mut self, out_of_basis: &str, into_basis: &str) -> Self {
        self.swap_out_of_basis.push(out_of_basis.to_string());
        self.swap_into_basis.push(into_basis.to_string());
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_iters_to_make_consistent(mut self, iters: usize) -> Self {
        self.iters_to_make_consistent = iters;
        self
    }

    pub fn with_min_initial_molality(mut self, min_initial_molality: f64) -> Self {
        self.min_initial_molality = min_initial_molality;
        self
    }

    pub fn with_ionic_strength(mut self, ionic_strength: IonicStrength) -> Self {
        self.ionic_strength = ionic_strength;
        self
    }

    pub fn with_swapper(mut self, swapper: SpeciesSwapper) -> Self {
        self.swapper = swapper;
        self
    }
}

/// Units in which a kinetic species' initial amount may be given.
pub(super) fn is_kinetic_unit(unit: GeochemistryUnit) -> bool {
    unit == GeochemistryUnit::Moles || unit == GeochemistryUnit::Cm3 || unit.is_mass()
}

fn require_positive(c: &Constraint, meaning: &'static str) -> GeochemResult<()> {
    if c.value <= 0.0 {
        return Err(GeochemError::NonPositiveConstraint { species: c.species.clone(), meaning, value: c.value });
    }
    Ok(())
}

fn require_unit(c: &Constraint, ok: bool, meaning: &'static str, allowed: &'static str) -> GeochemResult<()> {
    if !ok {
        return Err(GeochemError::InvalidConstraintUnit { species: c.species.clone(), meaning, allowed });
    }
    Ok(())
}

/// Converts one constraint on basis species `i` into an internal value and meaning.
fn convert(
    c: &Constraint,
    i: usize,
    db: &ModelDatabase,
    kin_moles: &[f64],
) -> GeochemResult<(f64, ConstraintMeaning)> {
    use ConstraintUserMeaning as U;
    let unit = c.unit;
    match c.meaning {
        U::KgSolventWater => {
            require_positive(c, "kg_solvent_water")?;
            require_unit(c, unit == GeochemistryUnit::Kg, "kg_solvent_water", "kg")?;
            Ok((c.value, ConstraintMeaning::KgSolventWater))
        }
        U::BulkComposition | U::BulkCompositionWithKinetic => {
            require_unit(
                c,
                unit == GeochemistryUnit::Moles || unit.is_mass(),
                "bulk composition",
                "moles or mass",
            )?;
            let mut value = to_moles(c.value, unit, &c.species, db)?;
            if c.meaning == U::BulkComposition {
                for (k, n) in kin_moles.iter().enumerate() {
                    value += n * db.kin_stoichiometry[(k, i)];
                }
            }
            let meaning = if i == 0 { ConstraintMeaning::MolesBulkWater } else { ConstraintMeaning::MolesBulkSpecies };
            Ok((value, meaning))
        }
        U::FreeConcentration => {
            require_positive(c, "free concentration")?;
            require_unit(
                c,
                unit == GeochemistryUnit::Molal || unit.is_mass_per_solvent(),
                "free concentration",
                "molal or mass per kg of solvent",
            )?;
            Ok((to_moles(c.value, unit, &c.species, db)?, ConstraintMeaning::FreeMolality))
        }
        U::FreeMineral => {
            require_positive(c, "free mineral")?;
            require_unit(
                c,
                unit == GeochemistryUnit::Moles || unit == GeochemistryUnit::Cm3 || unit.is_mass(),
                "free mineral",
                "moles, mass or volume",
            )?;
            Ok((to_moles(c.value, unit, &c.species, db)?, ConstraintMeaning::FreeMolesMineralSpecies))
        }
        U::Activity => {
            require_positive(c, "activity")?;
            require_unit(c, unit == GeochemistryUnit::Dimensionless, "activity", "dimensionless")?;
            Ok((c.value, ConstraintMeaning::Activity))
        }
        U::Log10Activity => {
            require_unit(c, unit == GeochemistryUnit::Dimensionless, "log10activity", "dimensionless")?;
            Ok((10f64.powf(c.value), ConstraintMeaning::Activity))
        }
        U::Fugacity => {
            require_positive(c, "fugacity")?;
            require_unit(c, unit == GeochemistryUnit::Dimensionless, "fugacity", "dimensionless")?;
            Ok((c.value, ConstraintMeaning::Fugacity))
        }
        U::Log10Fugacity => {
            require_unit(c, unit == GeochemistryUnit::Dimensionless, "log10fugacity", "dimensionless")?;
            Ok((10f64.powf(c.value), ConstraintMeaning::Fugacity))
        }
    }
}

/// Checks that `meaning` is allowed for basis species `i`.
fn check_legal(
    db: &ModelDatabase,
    i: usize,
    meaning: ConstraintMeaning,
    charge_balance_index: usize,
) -> GeochemResult<()> {
    use ConstraintMeaning as M;
    let sp = &db.basis[i];
    let illegal = |rule: &'static str| Err(GeochemError::IllegalConstraint { species: sp.name.clone(), rule });
    if i == 0 {
        if !matches!(meaning, M::MolesBulkWater | M::KgSolventWater | M::Activity) {
            return illegal("is the solvent and must be provided with a bulk composition, kg_solvent_water or an activity");
        }
    } else if sp.is_gas() {
        if meaning != M::Fugacity {
            return illegal("is a gas and must be provided with a fugacity or log10fugacity");
        }
    } else if sp.is_mineral() {
        if !matches!(meaning, M::FreeMolesMineralSpecies | M::MolesBulkSpecies) {
            return illegal("is a mineral and must be provided with a free mineral amount or a bulk composition");
        }
    } else if !matches!(meaning, M::FreeMolality | M::Activity | M::MolesBulkSpecies) {
        return illegal("is aqueous and must be provided with a free concentration, an activity or a bulk composition");
    }
    if i == charge_balance_index && meaning != M::MolesBulkSpecies {
        return Err(GeochemError::ChargeBalanceNotBulk(sp.name.clone()));
    }
    Ok(())
}

/// Orders `constraints` like the basis of `db`, converts them to internal
/// units and checks their legality.
pub(super) fn normalize_constraints(
    db: &ModelDatabase,
    constraints: &[Constraint],
    kin_moles: &[f64],
    charge_balance_index: usize,
) -> GeochemResult<(Vec<f64>, Vec<ConstraintMeaning>)> {
    let nb = db.num_basis();
    if constraints.len() != nb {
        return Err(GeochemError::ConstraintCount { expected: nb, got: constraints.len() });
    }
    let mut ordered: Vec<Option<&Constraint>> = vec![None; nb];
    for c in constraints {
        if let Some(i) = db.basis_index(&c.species) {
            if ordered[i].is_some() {
                return Err(GeochemError::DuplicateConstraint(c.species.clone()));
            }
            ordered[i] = Some(c);
        }
    }

    let mut values = Vec::with_capacity(nb);
    let mut meanings = Vec::with_capacity(nb);
    for (i, slot) in ordered.iter().enumerate() {
        let c = slot.ok_or_else(|| GeochemError::UnconstrainedSpecies(db.basis[i].name.clone()))?;
        let (value, meaning) = convert(c, i, db, kin_moles)?;
        check_legal(db, i, meaning, charge_balance_index)?;
        values.push(value);
        meanings.push(meaning);
    }
    Ok((values, meanings))
}

//! Conversion between user-facing units and the internal mole-based units.
//!
//! Internally the geochemical system works with moles (bulk composition, free
//! mineral moles, kinetic species), molality (free aqueous concentration) and
//! dimensionless quantities (activity, fugacity). Users may specify amounts in
//! mass or volume, which are converted with the molar mass and molar volume
//! stored in the [`ModelDatabase`].
//!
//! # Example
//!
//! ```
//! use geochem::database::{ModelDatabase, Species};
//! use geochem::log10k::Log10KModel;
//! use geochem::units::{from_moles, to_moles, GeochemistryUnit};
//!
//! let basis = vec![
//!     Species::water(),
//!     Species::aqueous("Na+", 1.0).with_molecular_weight(22.9898),
//! ];
//! let db = ModelDatabase::new(basis, vec![25.0], Log10KModel::PiecewiseLinear).unwrap();
//!
//! let moles = to_moles(2.0, GeochemistryUnit::G, "Na+", &db).unwrap();
//! assert!((moles - 2.0 / 22.9898).abs() < 1e-12);
//! let grams = from_moles(moles, GeochemistryUnit::G, "Na+", &db).unwrap();
//! assert!((grams - 2.0).abs() < 1e-12);
//! ```

use serde::{Deserialize, Serialize};

use crate::database::{ModelDatabase, Species};
use crate::error::{GeochemError, GeochemResult};

/// Units accepted for user-specified quantities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeochemistryUnit {
    /// Dimensionless (activity, fugacity)
    Dimensionless,
    /// Moles
    Moles,
    /// Moles per kg of solvent water
    Molal,
    /// Kilograms
    Kg,
    /// Grams
    G,
    /// Milligrams
    Mg,
    /// Micrograms
    Ug,
    /// Kilograms per kg of solvent water
    KgPerKgSolvent,
    /// Grams per kg of solvent water
    GPerKgSolvent,
    /// Milligrams per kg of solvent water
    MgPerKgSolvent,
    /// Micrograms per kg of solvent water
    UgPerKgSolvent,
    /// Cubic centimetres (minerals only)
    Cm3,
}

impl GeochemistryUnit {
    /// Whether this is a mass unit (kg, g, mg, ug).
    pub fn is_mass(self) -> bool {
        matches!(self, Self::Kg | Self::G | Self::Mg | Self::Ug)
    }

    /// Whether this is a mass-per-kg-solvent unit.
    pub fn is_mass_per_solvent(self) -> bool {
        matches!(self, Self::KgPerKgSolvent | Self::GPerKgSolvent | Self::MgPerKgSolvent | Self::UgPerKgSolvent)
    }

    /// Grams represented by one of this unit, for mass-like units.
    fn grams(self) -> Option<f64> {
        match self {
            Self::Kg | Self::KgPerKgSolvent => Some(1.0e3),
            Self::G | Self::GPerKgSolvent => Some(1.0),
            Self::Mg | Self::MgPerKgSolvent => Some(1.0e-3),
            Self::Ug | Self::UgPerKgSolvent => Some(1.0e-6),
            _ => None,
        }
    }
}

/// Finds the species called `name` among the basis, equilibrium and kinetic
/// species of `db`.
fn lookup<'a>(name: &str, db: &'a ModelDatabase) -> GeochemResult<&'a Species> {
    db.basis
        .iter()
        .chain(db.eqm.iter())
        .chain(db.kinetic.iter())
        .find(|s| s.name == name)
        .ok_or_else(|| GeochemError::UnknownSpecies(name.to_string()))
}

/// Factor `f` such that `amount_in_unit * f = amount_in_moles` (or molality).
fn factor(unit: GeochemistryUnit, species: &Species) -> GeochemResult<f64> {
    match unit {
        GeochemistryUnit::Dimensionless | GeochemistryUnit::Moles | GeochemistryUnit::Molal => Ok(1.0),
        GeochemistryUnit::Cm3 => {
            if !species.is_mineral() {
                return Err(GeochemError::VolumeOfNonMineral(species.name.clone()));
            }
            Ok(1.0 / species.molecular_volume)
        }
        mass => {
            let grams = mass.grams().unwrap_or(1.0);
            Ok(grams / species.molecular_weight)
        }
    }
}

/// Converts `value` given in `unit` for `species` into moles (or molality, for
/// per-kg-solvent units).
///
/// Returns an error if the species is unknown, or if `Cm3` is used for a
/// species that is not a mineral.
pub fn to_moles(value: f64, unit: GeochemistryUnit, species: &str, db: &ModelDatabase) -> GeochemResult<f64> {
    let sp = lookup(species, db)?;
    Ok(value * factor(unit, sp)?)
}

/// Inverse of [`to_moles`].
pub fn from_moles(moles: f64, unit: GeochemistryUnit, species: &str, db: &ModelDatabase) -> GeochemResult<f64> {
    let sp = lookup(species, db)?;
    Ok(moles / factor(unit, sp)?)
}

//! In-memory species database for a geochemical model.
//!
//! A [`ModelDatabase`] holds everything that is fixed by the choice of
//! chemical model: the basis species (water always first), the equilibrium,
//! redox and kinetic species with their stoichiometry over the basis, log10K
//! tables sampled at a common set of temperatures, sorbing surfaces and the
//! kinetic rate laws.
//!
//! The database is built programmatically. Basis swaps performed by
//! [`SpeciesSwapper`](crate::swapper::SpeciesSwapper) rewrite it in place, so
//! the stoichiometry and log10K tables always refer to the *current* basis.
//! `swap_to_original_basis` records the accumulated change of basis.
//!
//! # Example
//!
//! ```
//! use geochem::database::{ModelDatabase, Species};
//! use geochem::log10k::Log10KModel;
//!
//! let basis = vec![
//!     Species::water(),
//!     Species::aqueous("H+", 1.0),
//!     Species::aqueous("HCO3-", -1.0),
//! ];
//! let mut db = ModelDatabase::new(basis, vec![25.0], Log10KModel::PiecewiseLinear).unwrap();
//! let j = db
//!     .add_equilibrium_species(
//!         Species::aqueous("CO2(aq)", 0.0),
//!         &[("H2O", -1.0), ("H+", 1.0), ("HCO3-", 1.0)],
//!         &[-6.34],
//!     )
//!     .unwrap();
//! assert_eq!(db.eqm_index("CO2(aq)"), Some(j));
//! assert_eq!(db.num_basis(), 3);
//! ```

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::constants::WATER_NAME;
use crate::error::{GeochemError, GeochemResult};
use crate::kinetics::{KineticRateDefinition, KineticRateDescription};
use crate::log10k::{Log10KInterpolator, Log10KModel, Log10KTable};

/// Broad classification of a species.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeciesKind {
    /// The solvent, always basis index 0
    Water,
    /// Dissolved species (including sorption sites and sorbed species)
    Aqueous,
    /// Solid mineral phase
    Mineral,
    /// Gas phase
    Gas,
}

/// Metadata for one species.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Species {
    /// Species name, unique across the database
    pub name: String,
    /// Species kind
    pub kind: SpeciesKind,
    /// Electric charge [elementary charges]
    pub charge: f64,
    /// Ion-size parameter [Angstrom]
    pub radius: f64,
    /// Molar mass [g/mol]
    pub molecular_weight: f64,
    /// Molar volume [cm^3/mol], meaningful for minerals
    pub molecular_volume: f64,
    /// Whether the species moves with the fluid
    pub transported: bool,
}

impl Species {
    fn base(name: &str, kind: SpeciesKind, charge: f64, transported: bool) -> Self {
        Species {
            name: name.to_string(),
            kind,
            charge,
            radius: 0.0,
            molecular_weight: 1.0,
            molecular_volume: 0.0,
            transported,
        }
    }

    /// The solvent, `H2O`.
    pub fn water() -> Self {
        Self::base(WATER_NAME, SpeciesKind::Water, 0.0, true).with_molecular_weight(18.0152)
    }

    /// A dissolved species with the given charge.
    pub fn aqueous(name: &str, charge: f64) -> Self {
        Self::base(name, SpeciesKind::Aqueous, charge, true)
    }

    /// A mineral. Minerals are immobile.
    pub fn mineral(name: &str) -> Self {
        Self::base(name, SpeciesKind::Mineral, 0.0, false)
    }

    /// A gas.
    pub fn gas(name: &str) -> Self {
        Self::base(name, SpeciesKind::Gas, 0.0, false)
    }

    pub fn with_molecular_weight(mut self, mw: f64) -> Self {
        self.molecular_weight = mw;
        self
    }

    pub fn with_molecular_volume(mut self, mv: f64) -> Self {
        self.molecular_volume = mv;
        self
    }

    pub fn with_radius(mut self, radius: f64) -> Self {
        self.radius = radius;
        self
    }

    pub fn with_transported(mut self, transported: bool) -> Self {
        self.transported = transported;
        self
    }

    pub fn is_water(&self) -> bool {
        self.kind == SpeciesKind::Water
    }

    pub fn is_mineral(&self) -> bool {
        self.kind == SpeciesKind::Mineral
    }

    pub fn is_gas(&self) -> bool {
        self.kind == SpeciesKind::Gas
    }
}

/// A mineral surface on which equilibrium species can sorb.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SorbingSurface {
    /// Name of the mineral providing the surface
    pub mineral: String,
    /// Specific surface area [m^2/g]
    pub specific_area: f64,
    /// Basis species acting as sorption sites on this surface
    pub sorption_sites: Vec<String>,
}

/// Species, stoichiometry and reaction data defining a geochemical model.
#[derive(Debug, Clone)]
pub struct ModelDatabase {
    /// Basis species, water first
    pub basis: Vec<Species>,
    /// Equilibrium species
    pub eqm: Vec<Species>,
    /// Equilibrium stoichiometry, one row per equilibrium species over the basis
    pub eqm_stoichiometry: DMatrix<f64>,
    /// Equilibrium log10K, one row per species, one column per temperature
    pub eqm_log10k: DMatrix<f64>,
    /// Surface index for sorbed equilibrium species
    pub surface_sorption: Vec<Option<usize>>,
    /// Redox (disequilibrium) species
    pub redox: Vec<Species>,
    pub redox_stoichiometry: DMatrix<f64>,
    pub redox_log10k: DMatrix<f64>,
    /// Basis species on the left-hand side of redox half reactions
    pub redox_lhs: String,
    /// Kinetic species
    pub kinetic: Vec<Species>,
    pub kin_stoichiometry: DMatrix<f64>,
    pub kin_log10k: DMatrix<f64>,
    /// Kinetic rate laws, resolved against the current basis
    pub kin_rates: Vec<KineticRateDefinition>,
    /// Sorbing surfaces
    pub surfaces: Vec<SorbingSurface>,
    /// Temperatures [C] at which log10K values are tabulated
    pub temperatures: Vec<f64>,
    /// Interpolation used for log10K between temperatures
    pub log10k_model: Log10KModel,
    /// Fitted rows of `eqm_log10k`, `redox_log10k` and `kin_log10k`
    pub(crate) eqm_log10k_fit: Log10KTable,
    pub(crate) redox_log10k_fit: Log10KTable,
    pub(crate) kin_log10k_fit: Log10KTable,
    /// Matrix `T` with `original_basis = T * current_basis` (in the sense of components)
    pub swap_to_original_basis: DMatrix<f64>,
    /// Names of the basis species before any swap
    pub original_basis_names: Vec<String>,
    /// Names swapped out of the basis, in order
    pub swapped_out: Vec<String>,
    /// Names swapped into the basis, in order
    pub swapped_in: Vec<String>,
}

/// Appends `row` to the bottom of `mat`.
fn push_row(mat: &mut DMatrix<f64>, row: &[f64]) {
    let nrows = mat.nrows();
    let grown = std::mem::replace(mat, DMatrix::zeros(0, 0)).insert_row(nrows, 0.0);
    *mat = grown;
    for (c, v) in row.iter().enumerate() {
        mat[(nrows, c)] = *v;
    }
}

impl ModelDatabase {
    /// Creates a database from its basis species.
    ///
    /// The first basis species must be water named `H2O`, names must be
    /// unique and at least one temperature must be given.
    pub fn new(basis: Vec<Species>, temperatures: Vec<f64>, log10k_model: Log10KModel) -> GeochemResult<Self> {
        match basis.first() {
            Some(w) if w.is_water() && w.name == WATER_NAME => {}
            _ => {
                return Err(GeochemError::InvalidDatabase(
                    "the first basis species must be water, named H2O".to_string(),
                ))
            }
        }
        if basis.iter().skip(1).any(|s| s.is_water()) {
            return Err(GeochemError::InvalidDatabase("only the first basis species may be water".to_string()));
        }
        if temperatures.is_empty() {
            return Err(GeochemError::InvalidDatabase(
                "at least one temperature is needed for the log10K tables".to_string(),
            ));
        }
        for (i, s) in basis.iter().enumerate() {
            if basis[..i].iter().any(|t| t.name == s.name) {
                return Err(GeochemError::InvalidDatabase(format!("species {} appears more than once", s.name)));
            }
        }
        let nb = basis.len();
        let nt = temperatures.len();
        let original_basis_names = basis.iter().map(|s| s.name.clone()).collect();
        Ok(ModelDatabase {
            basis,
            eqm: Vec::new(),
            eqm_stoichiometry: DMatrix::zeros(0, nb),
            eqm_log10k: DMatrix::zeros(0, nt),
            surface_sorption: Vec::new(),
            redox: Vec::new(),
            redox_stoichiometry: DMatrix::zeros(0, nb),
            redox_log10k: DMatrix::zeros(0, nt),
            redox_lhs: "e-".to_string(),
            kinetic: Vec::new(),
            kin_stoichiometry: DMatrix::zeros(0, nb),
            kin_log10k: DMatrix::zeros(0, nt),
            kin_rates: Vec::new(),
            surfaces: Vec::new(),
            temperatures,
            log10k_model,
            eqm_log10k_fit: Log10KTable::default(),
            redox_log10k_fit: Log10KTable::default(),
            kin_log10k_fit: Log10KTable::default(),
            swap_to_original_basis: DMatrix::identity(nb, nb),
            original_basis_names,
            swapped_out: Vec::new(),
            swapped_in: Vec::new(),
        })
    }

    pub fn num_basis(&self) -> usize {
        self.basis.len()
    }

    pub fn num_eqm(&self) -> usize {
        self.eqm.len()
    }

    pub fn num_redox(&self) -> usize {
        self.redox.len()
    }

    pub fn num_kinetic(&self) -> usize {
        self.kinetic.len()
    }

    pub fn num_surfaces(&self) -> usize {
        self.surfaces.len()
    }

    pub fn basis_index(&self, name: &str) -> Option<usize> {
        self.basis.iter().position(|s| s.name == name)
    }

    pub fn eqm_index(&self, name: &str) -> Option<usize> {
        self.eqm.iter().position(|s| s.name == name)
    }

    pub fn redox_index(&self, name: &str) -> Option<usize> {
        self.redox.iter().position(|s| s.name == name)
    }

    pub fn kinetic_index(&self, name: &str) -> Option<usize> {
        self.kinetic.iter().position(|s| s.name == name)
    }

    pub fn surface_index(&self, mineral: &str) -> Option<usize> {
        self.surfaces.iter().position(|s| s.mineral == mineral)
    }

    /// Whether equilibrium species `j` is sorbed on a surface.
    pub fn is_sorbed(&self, j: usize) -> bool {
        self.surface_sorption.get(j).copied().flatten().is_some()
    }

    fn name_taken(&self, name: &str) -> bool {
        self.basis_index(name).is_some()
            || self.eqm_index(name).is_some()
            || self.redox_index(name).is_some()
            || self.kinetic_index(name).is_some()
    }

    /// Builds a stoichiometry row over the current basis from name/coefficient pairs.
    fn stoichiometry_row(&self, reaction: &[(&str, f64)]) -> GeochemResult<Vec<f64>> {
        let mut row = vec![0.0; self.num_basis()];
        for (name, coeff) in reaction {
            let i = self.basis_index(name).ok_or_else(|| GeochemError::UnknownSpecies(name.to_string()))?;
            row[i] += coeff;
        }
        Ok(row)
    }

    /// Validates a new reaction species and fits its log10K row.
    fn check_new_species(&self, species: &Species, log10k: &[f64]) -> GeochemResult<Log10KInterpolator> {
        if self.name_taken(&species.name) {
            return Err(GeochemError::InvalidDatabase(format!("species {} appears more than once", species.name)));
        }
        if species.is_water() {
            return Err(GeochemError::InvalidDatabase("only the first basis species may be water".to_string()));
        }
        if log10k.len() != self.temperatures.len() {
            return Err(GeochemError::InvalidDatabase(format!(
                "species {} has {} log10K values but there are {} temperatures",
                species.name,
                log10k.len(),
                self.temperatures.len()
            )));
        }
        Log10KInterpolator::fit(self.log10k_model, &self.temperatures, log10k)
    }

    /// Refits the log10K rows after `eqm_log10k`, `redox_log10k` or
    /// `kin_log10k` have been changed in place.
    pub fn refit_log10k(&mut self) -> GeochemResult<()> {
        self.eqm_log10k_fit = Log10KTable::fit(self.log10k_model, &self.temperatures, &self.eqm_log10k)?;
        self.redox_log10k_fit = Log10KTable::fit(self.log10k_model, &self.temperatures, &self.redox_log10k)?;
        self.kin_log10k_fit = Log10KTable::fit(self.log10k_model, &self.temperatures, &self.kin_log10k)?;
        Ok(())
    }

    fn push_eqm(
        &mut self,
        species: Species,
        reaction: &[(&str, f64)],
        log10k: &[f64],
        surface: Option<usize>,
    ) -> GeochemResult<usize> {
        let fit = self.check_new_species(&species, log10k)?;
        let row = self.stoichiometry_row(reaction)?;
        push_row(&mut self.eqm_stoichiometry, &row);
        push_row(&mut self.eqm_log10k, log10k);
        self.eqm_log10k_fit.push(fit);
        self.eqm.push(species);
        self.surface_sorption.push(surface);
        for rate in &mut self.kin_rates {
            rate.grow_for_new_eqm();
        }
        Ok(self.num_eqm() - 1)
    }

    /// Adds an equilibrium species defined by `species = sum_i coeff_i basis_i`.
    ///
    /// Returns the index of the new species.
    pub fn add_equilibrium_species(
        &mut self,
        species: Species,
        reaction: &[(&str, f64)],
        log10k: &[f64],
    ) -> GeochemResult<usize> {
        self.push_eqm(species, reaction, log10k, None)
    }

    /// Adds an equilibrium species sorbed on the surface of `mineral`, which
    /// must already have been registered with [`add_sorbing_surface`](Self::add_sorbing_surface).
    pub fn add_sorbed_species(
        &mut self,
        mut species: Species,
        reaction: &[(&str, f64)],
        log10k: &[f64],
        mineral: &str,
    ) -> GeochemResult<usize> {
        let surface = self.surface_index(mineral).ok_or_else(|| GeochemError::UnknownSpecies(mineral.to_string()))?;
        species.transported = false;
        self.push_eqm(species, reaction, log10k, Some(surface))
    }

    /// Adds a redox (disequilibrium) species.
    pub fn add_redox_species(
        &mut self,
        species: Species,
        reaction: &[(&str, f64)],
        log10k: &[f64],
    ) -> GeochemResult<usize> {
        let fit = self.check_new_species(&species, log10k)?;
        let row = self.stoichiometry_row(reaction)?;
        push_row(&mut self.redox_stoichiometry, &row);
        push_row(&mut self.redox_log10k, log10k);
        self.redox_log10k_fit.push(fit);
        self.redox.push(species);
        Ok(self.num_redox() - 1)
    }

    /// Adds a kinetically controlled species.
    pub fn add_kinetic_species(
        &mut self,
        species: Species,
        reaction: &[(&str, f64)],
        log10k: &[f64],
    ) -> GeochemResult<usize> {
        let fit = self.check_new_species(&species, log10k)?;
        let row = self.stoichiometry_row(reaction)?;
        push_row(&mut self.kin_stoichiometry, &row);
        push_row(&mut self.kin_log10k, log10k);
        self.kin_log10k_fit.push(fit);
        self.kinetic.push(species);
        Ok(self.num_kinetic() - 1)
    }

    /// Registers a sorbing surface provided by `mineral`.
    ///
    /// The sorption sites must be basis species. They are marked as not
    /// transported.
    pub fn add_sorbing_surface(
        &mut self,
        mineral: &str,
        specific_area: f64,
        sorption_sites: &[&str],
    ) -> GeochemResult<usize> {
        if self.surface_index(mineral).is_some() {
            return Err(GeochemError::InvalidDatabase(format!("surface {mineral} appears more than once")));
        }
        for site in sorption_sites {
            let i = self.basis_index(site).ok_or_else(|| GeochemError::UnknownSpecies(site.to_string()))?;
            self.basis[i].transported = false;
        }
        self.surfaces.push(SorbingSurface {
            mineral: mineral.to_string(),
            specific_area,
            sorption_sites: sorption_sites.iter().map(|s| s.to_string()).collect(),
        });
        Ok(self.num_surfaces() - 1)
    }

    /// Validates a rate description and attaches it to its kinetic species.
    pub fn add_kinetic_rate(&mut self, description: KineticRateDescription) -> GeochemResult<usize> {
        let definition = KineticRateDefinition::resolve(description, self)?;
        self.kin_rates.push(definition);
        Ok(self.kin_rates.len() - 1)
    }

    /// Whether basis species `basis_index` is a sorption site of some surface.
    pub fn is_sorption_site(&self, basis_index: usize) -> bool {
        match self.basis.get(basis_index) {
            Some(s) => self.surfaces.iter().any(|surf| surf.sorption_sites.contains(&s.name)),
            None => false,
        }
    }
}

//! # Geochem: Geochemical Equilibrium Systems
//!
//! The state of an aqueous geochemical system (basis and equilibrium species,
//! minerals, gases, sorbing surfaces and kinetic species) with the residual
//! and Jacobian an outer Newton driver needs, plus a vapor-mixture solver that
//! recovers pressure and temperature from specific volume and internal energy.
//!
//! ## Example
//!
//! ```
//! use geochem::activity::DaviesActivity;
//! use geochem::database::{ModelDatabase, Species};
//! use geochem::log10k::Log10KModel;
//! use geochem::solvers::EquilibriumSolver;
//! use geochem::system::{Constraint, GeochemicalSystem, SystemSettings};
//!
//! let basis = vec![
//!     Species::water(),
//!     Species::aqueous("H+", 1.0),
//!     Species::aqueous("Na+", 1.0),
//!     Species::aqueous("Cl-", -1.0),
//! ];
//! let mut db = ModelDatabase::new(basis, vec![25.0, 100.0], Log10KModel::PiecewiseLinear)?;
//! db.add_equilibrium_species(Species::aqueous("OH-", -1.0), &[("H2O", 1.0), ("H+", -1.0)], &[13.99, 12.26])?;
//! db.add_equilibrium_species(Species::aqueous("NaCl", 0.0), &[("Na+", 1.0), ("Cl-", 1.0)], &[0.78, 0.5])?;
//!
//! let constraints = vec![
//!     Constraint::kg_solvent_water(1.0),
//!     Constraint::activity("H+", 1.0e-7),
//!     Constraint::bulk("Na+", 0.1),
//!     Constraint::bulk("Cl-", 0.1),
//! ];
//! let mut system = GeochemicalSystem::new(
//!     db,
//!     DaviesActivity::new(),
//!     &SystemSettings::new("Cl-").with_temperature(40.0),
//!     &constraints,
//!     &[],
//! )?;
//!
//! EquilibriumSolver::default().solve(&mut system, None)?;
//! assert!(system.basis_molality()[2] < 0.1);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Modules
//!
//! - [`database`], [`log10k`]: the species, reactions and equilibrium
//!   constants a system is built from
//! - [`system`]: [`GeochemicalSystem`] and its configuration
//! - [`activity`], [`swapper`], [`kinetics`], [`units`]: the collaborators
//!   a system owns
//! - [`solvers`]: Newton drivers
//! - [`fluids`]: equations of state and vapor mixtures
//!
//! ## Optional Features
//!
//! - **`autodiff`**: Forward-mode derivatives of property formulas using `num-dual`
//!
//! ```toml
//! [dependencies]
//! geochem = { version = "0.1", features = ["autodiff"] }
//! ```
//!
//! The library logs through the `log` facade and never installs a logger.

pub mod activity;
pub mod constants;
pub mod database;
pub mod error;
pub mod fluids;
pub mod kinetics;
pub mod log10k;
pub mod solvers;
pub mod swapper;
pub mod system;
pub mod units;

#[cfg(feature = "autodiff")]
pub mod autodiff;

pub use activity::{ActivityModel, DaviesActivity, IdealActivity, IonicStrength};
pub use database::{ModelDatabase, Species, SpeciesKind};
pub use error::{GeochemError, GeochemResult};
pub use fluids::{FluidError, FluidResult, IdealGas, SinglePhaseEos, VaporMixture};
pub use solvers::{EquilibriumSolver, NewtonRaphson, SolverError, SolverResult};
pub use system::{Constraint, GeochemicalSystem, SystemSettings};
pub use units::GeochemistryUnit;

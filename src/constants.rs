//! Physical constants used throughout the geochemical and fluid calculations.
//!
//! Units follow the conventions of the rest of the crate: temperatures handed
//! to the geochemical system are in degrees Celsius, fluid-property temperatures
//! are in Kelvin, and molar masses of geochemical species are in g/mol.

/// Moles of H2O in one kilogram of water [mol/kg].
pub const MOLES_PER_KG_WATER: f64 = 55.510;

/// Faraday constant [C/mol].
pub const FARADAY: f64 = 96485.3329;

/// Universal gas constant [J/(K mol)].
pub const GAS_CONSTANT: f64 = 8.314462618;

/// Molar gas constant of the fluid equations of state [J/(K mol)].
pub const IDEAL_GAS_CONSTANT: f64 = 8.3144598;

/// Offset between Celsius and Kelvin.
pub const CELSIUS_TO_KELVIN: f64 = 273.15;

/// Permittivity of free space [F/m].
pub const PERMITTIVITY_FREE_SPACE: f64 = 8.854187817e-12;

/// Relative dielectric constant of water at 25 C.
pub const DIELECTRIC_CONSTANT_WATER: f64 = 78.5;

/// Density of water [kg/m^3].
pub const DENSITY_WATER: f64 = 1000.0;

/// Name of the solvent species, which is always basis index 0.
pub const WATER_NAME: &str = "H2O";

/// Suffix appended to a sorbing mineral's name to label its surface-potential
/// expression when restoring a full state from names and values.
pub const SURFACE_POTENTIAL_SUFFIX: &str = "_surface_potential_expr";

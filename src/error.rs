//! Error type shared by the geochemical modules.
//!
//! Every variant describes a configuration mistake or a violated precondition.
//! These are never recovered internally: callers get them as `Err` values and
//! decide what to do. Numerical non-convergence is not an error here; see
//! [`crate::fluids::PtSolve`] for the degraded outcome of the vapor-mixture solve.

/// Result type for geochemical operations.
pub type GeochemResult<T> = Result<T, GeochemError>;

/// Errors raised by the database, unit conversion, swapping, kinetics and
/// the geochemical system itself.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeochemError {
    /// A species name is not known to the database
    #[error("Species {0} is not in the database")]
    UnknownSpecies(String),
    /// Volume units were used for something that is not a mineral
    #[error("Species {0}: cm3 units can only be used for minerals")]
    VolumeOfNonMineral(String),
    /// The database was assembled inconsistently
    #[error("Invalid database: {0}")]
    InvalidDatabase(String),
    /// An index exceeded the number of entities of that type
    #[error("Index {index} is out of range for {what}: there are only {len}")]
    IndexOutOfRange { what: &'static str, index: usize, len: usize },
    /// A vector or matrix had the wrong size
    #[error("{what} has size {got} but must have size {expected}")]
    SizeMismatch { what: &'static str, expected: usize, got: usize },

    /// Water can never leave the basis
    #[error("Cannot remove H2O from the basis (attempted swap with {0})")]
    CannotSwapWater(String),
    /// A named species is not currently a basis species
    #[error("{0} is not in the basis, so cannot be removed from the basis")]
    NotInBasis(String),
    /// A named species is not currently an equilibrium species
    #[error("{0} is not an equilibrium species, so cannot be swapped into the basis")]
    NotEquilibrium(String),
    /// Sorbed species are tied to their surface and cannot join the basis
    #[error("Equilibrium species {0} is involved in surface sorption so cannot be swapped")]
    SorptionSwap(String),
    /// The requested swap would produce a singular basis
    #[error(
        "Swapping {basis} out of the basis for {eqm} is not possible: {eqm} does not involve {basis}, so the swap matrix is not invertible"
    )]
    SingularSwap { basis: String, eqm: String },

    /// log10K interpolation was asked for with too little data
    #[error("The {model} log10K model needs at least {needed} temperatures but {got} were provided")]
    InsufficientTemperatures { model: &'static str, needed: usize, got: usize },

    /// A kinetic rate description is internally inconsistent
    #[error("Kinetic rate for {species}: {reason}")]
    InvalidRateDescription { species: String, reason: String },

    /// Kinetic initial conditions do not line up with the kinetic species
    #[error(
        "An initial amount and a unit must be provided for each of the {expected} kinetic species, but {got} were given"
    )]
    KineticInitialCount { expected: usize, got: usize },
    /// A kinetic species was given no initial amount
    #[error("Initial moles, mass or volume for kinetic species {0} must be provided")]
    MissingKineticInitial(String),
    /// A kinetic species was given an amount in an unsupported unit
    #[error("Kinetic species {0}: units must be moles or mass, or volume in the case of minerals")]
    InvalidKineticUnit(String),
    /// Kinetic mole numbers must remain positive
    #[error("Mole number for kinetic species must be positive, not {0}")]
    NonPositiveKineticMoles(f64),

    /// Swap-out and swap-in lists differ in length
    #[error("Species to swap out of the basis ({out}) and into the basis ({into}) must have the same length")]
    SwapListMismatch { out: usize, into: usize },
    /// The user asked for the charge-balance species to be swapped out
    #[error("Cannot swap out {0} because it is the charge-balance species")]
    SwapOutChargeBalance(String),
    /// The charge-balance species is not in the basis
    #[error("Cannot enforce charge balance using {0} because it is not in the basis")]
    ChargeBalanceNotInBasis(String),
    /// The charge-balance species carries no charge
    #[error("Cannot enforce charge balance using {0} because it has zero charge")]
    ChargeBalanceUncharged(String),
    /// The number of constraints differs from the number of basis species
    #[error(
        "Each of the {expected} basis species must be provided with exactly one constraint, but {got} constraints were given"
    )]
    ConstraintCount { expected: usize, got: usize },
    /// A basis species has no constraint
    #[error("The basis species {0} must appear in the constrained species list")]
    UnconstrainedSpecies(String),
    /// A species has more than one constraint
    #[error("The species {0} is constrained more than once")]
    DuplicateConstraint(String),
    /// A constraint value that must be positive is not
    #[error("Species {species}: specified {meaning} values must be positive, you entered {value}")]
    NonPositiveConstraint { species: String, meaning: &'static str, value: f64 },
    /// A constraint uses a unit that is incompatible with its meaning
    #[error("Species {species}: units for {meaning} must be {allowed}")]
    InvalidConstraintUnit { species: String, meaning: &'static str, allowed: &'static str },
    /// A constraint meaning is not allowed for this kind of species
    #[error("The species {species} {rule}")]
    IllegalConstraint { species: String, rule: &'static str },
    /// The charge-balance species must be bulk constrained
    #[error(
        "The charge-balance species {0} must be provided with a bulk composition. The value should be a reasonable estimate of the mole number, but will be overridden as the solve progresses"
    )]
    ChargeBalanceNotBulk(String),

    /// Algebraic unknowns must stay positive
    #[error("Cannot set algebraic variables to non-positive values such as {0}")]
    NonPositiveAlgebraicValue(f64),
    /// Attempted to swap water out at runtime
    #[error(
        "Attempting to swap out water and replace it by {0}. If the algorithm wants to swap out the charge-balance species, choose a different charge-balance species"
    )]
    SwapOutWater(String),
    /// Attempted to swap out the charge-balance species at runtime
    #[error("Attempting to swap the charge-balance species {0} out of the basis")]
    SwapChargeBalance(String),
    /// Gases never leave the basis through a runtime swap
    #[error("Attempting to swap the gas {0} out of the basis")]
    SwapGasOut(String),
    /// Gases never enter the basis through a runtime swap
    #[error("Attempting to swap the gas {0} into the basis")]
    SwapGasIn(String),
    /// A bulk value was supplied for a gas, which needs a swap instead
    #[error(
        "Cannot change the constraint on the gas {0} to a given bulk value: a swap is needed, so use the version without a value"
    )]
    GasBulkValue(String),
    /// No equilibrium species can replace a gas whose constraint is changed to bulk
    #[error(
        "Attempting to change the constraint of gas {0} to bulk moles requires a suitable non-gas species to swap with, and none was found"
    )]
    NoGasSwapCandidate(String),
    /// Assignment between incompatible systems
    #[error("Cannot assign geochemical systems with different structure: {0}")]
    IncompatibleAssignment(String),
    /// A value supplied when restoring a full state was illegal
    #[error("Value {value} for {species} is not allowed: it {rule}")]
    InvalidRestoreValue { species: String, value: f64, rule: &'static str },
    /// A value was missing when restoring a full state
    #[error("A value for {0} must be provided when setting all molalities")]
    MissingRestoreValue(String),
    /// A constraint cannot be recomputed from molalities
    #[error("{0} cannot be determined from molalities, so it must not be flagged as constrained from molalities")]
    NotDerivableFromMolality(String),
}

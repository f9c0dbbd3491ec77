//! Newton solvers.
//!
//! Two drivers share the same damped-Newton core:
//!
//! - [`NewtonRaphson`]: a general-purpose solver for `F(x) = 0` with a
//!   user-provided Jacobian
//! - [`EquilibriumSolver`]: drives a [`GeochemicalSystem`] to equilibrium
//!   through its residual and Jacobian, optionally including kinetic mole
//!   additions over a time step
//!
//! # Usage Pattern
//!
//! ```
//! use geochem::solvers::NewtonRaphson;
//!
//! // x^2 - 4 = 0
//! let f = |x: &[f64]| (vec![x[0] * x[0] - 4.0], vec![vec![2.0 * x[0]]]);
//! let solver = NewtonRaphson::new(1e-10, 50);
//! let x = solver.solve(f, &[1.0]).unwrap();
//! assert!((x[0] - 2.0).abs() < 1e-8);
//! ```

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::activity::ActivityModel;
use crate::error::GeochemError;
use crate::system::GeochemicalSystem;

/// Result type for solver operations.
pub type SolverResult<T> = Result<T, SolverError>;

/// Errors that can occur during solving.
#[derive(Debug, thiserror::Error)]
pub enum SolverError {
    /// Maximum iterations exceeded without convergence
    #[error("Maximum iterations exceeded (residual norm {residual})")]
    MaxIterationsExceeded { residual: f64 },
    /// Singular Jacobian matrix encountered
    #[error("Singular Jacobian matrix")]
    SingularJacobian,
    /// Solution diverged
    #[error("Solution diverged")]
    Diverged,
    /// Initial guess and residual sizes disagree
    #[error("Invalid initial conditions: {0}")]
    InvalidInitialConditions(String),
    /// The geochemical system rejected a request
    #[error(transparent)]
    Geochem(#[from] GeochemError),
}

/// Statistics from a solver run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SolverStats {
    /// Number of iterations performed
    pub iterations: usize,
    /// Number of residual evaluations
    pub function_evals: usize,
    /// Number of Jacobian evaluations
    pub jacobian_evals: usize,
    /// Final residual norm
    pub final_residual: f64,
}

/// Residual norm beyond which a run that has taken more than ten iterations
/// is declared divergent.
const DIVERGENCE_NORM: f64 = 1e10;

/// Newton-Raphson solver for nonlinear algebraic equations.
///
/// Solves systems of the form F(x) = 0 using the Newton-Raphson method:
/// x_{k+1} = x_k - J^{-1} F(x_k)
///
/// where J is the Jacobian matrix partialF/partialx.
#[derive(Debug, Clone)]
pub struct NewtonRaphson {
    /// Convergence tolerance
    pub tolerance: f64,
    /// Maximum number of iterations
    pub max_iterations: usize,
    /// Relaxation factor (1.0 = full Newton step)
    pub relaxation: f64,
}

impl NewtonRaphson {
    /// Creates a new Newton-Raphson solver with full Newton steps.
    pub fn new(tolerance: f64, max_iterations: usize) -> Self {
        NewtonRaphson { tolerance, max_iterations, relaxation: 1.0 }
    }

    /// Creates a solver with relaxation (damped Newton method).
    pub fn with_relaxation(tolerance: f64, max_iterations: usize, relaxation: f64) -> Self {
        NewtonRaphson { tolerance, max_iterations, relaxation }
    }

    /// Solves the nonlinear system F(x) = 0.
    ///
    /// # Arguments
    ///
    /// * `f` - Function computing residuals and Jacobian (row-major)
    /// * `x0` - Initial guess
    pub fn solve<F>(&self, f: F, x0: &[f64]) -> SolverResult<Vec<f64>>
    where
        F: Fn(&[f64]) -> (Vec<f64>, Vec<Vec<f64>>),
    {
        self.solve_with_stats(f, x0).map(|(x, _)| x)
    }

    /// Solves the nonlinear system and returns the solution with statistics.
    pub fn solve_with_stats<F>(&self, f: F, x0: &[f64]) -> SolverResult<(Vec<f64>, SolverStats)>
    where
        F: Fn(&[f64]) -> (Vec<f64>, Vec<Vec<f64>>),
    {
        let n = x0.len();
        let mut x = x0.to_vec();
        let mut stats = SolverStats::default();

        for iteration in 0..self.max_iterations {
            stats.iterations = iteration + 1;

            let (residuals, jacobian_data) = f(&x);
            stats.function_evals += 1;
            stats.jacobian_evals += 1;
            if residuals.len() != n || jacobian_data.len() != n || jacobian_data.iter().any(|row| row.len() != n) {
                return Err(SolverError::InvalidInitialConditions(format!(
                    "{n} unknowns but {} residuals",
                    residuals.len()
                )));
            }

            let r_vec = DVector::from_vec(residuals);
            let norm = r_vec.norm();
            stats.final_residual = norm;
            if norm < self.tolerance {
                return Ok((x, stats));
            }

            // Solve J * dx = -F
            let j_mat = DMatrix::from_row_slice(n, n, &jacobian_data.concat());
            let dx = j_mat.lu().solve(&(-r_vec)).ok_or(SolverError::SingularJacobian)?;
            for (xi, dxi) in x.iter_mut().zip(dx.iter()) {
                *xi += self.relaxation * dxi;
            }

            if iteration > 10 && norm > DIVERGENCE_NORM {
                return Err(SolverError::Diverged);
            }
        }

        Err(SolverError::MaxIterationsExceeded { residual: stats.final_residual })
    }
}

/// Settings of the [`EquilibriumSolver`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewtonSettings {
    /// Convergence tolerance on the L2 norm of the residual (moles).
    pub tolerance: f64,
    pub max_iterations: usize,
    /// An unknown whose Newton update would make it non-positive is divided
    /// by this factor instead.
    pub positivity_divisor: f64,
}

impl Default for NewtonSettings {
    fn default() -> Self {
        NewtonSettings { tolerance: 1e-12, max_iterations: 100, positivity_divisor: 10.0 }
    }
}

/// Newton driver for the algebraic system of a [`GeochemicalSystem`].
///
/// Each iteration evaluates the kinetic mole additions (when a time step is
/// given), the residual and the Jacobian, solves for the Newton update by LU
/// decomposition and applies it through
/// [`GeochemicalSystem::set_algebraic_variables`]. Unknowns are kept
/// positive.
///
/// ```
/// use geochem::activity::IdealActivity;
/// use geochem::database::{ModelDatabase, Species};
/// use geochem::log10k::Log10KModel;
/// use geochem::solvers::EquilibriumSolver;
/// use geochem::system::{Constraint, GeochemicalSystem, SystemSettings};
///
/// let basis = vec![
///     Species::water(),
///     Species::aqueous("H+", 1.0),
///     Species::aqueous("Na+", 1.0),
///     Species::aqueous("Cl-", -1.0),
/// ];
/// let mut db = ModelDatabase::new(basis, vec![25.0], Log10KModel::PiecewiseLinear).unwrap();
/// db.add_equilibrium_species(Species::aqueous("NaCl", 0.0), &[("Na+", 1.0), ("Cl-", 1.0)], &[0.78])
///     .unwrap();
/// let constraints = vec![
///     Constraint::kg_solvent_water(1.0),
///     Constraint::activity("H+", 1.0e-7),
///     Constraint::bulk("Na+", 0.1),
///     Constraint::bulk("Cl-", 0.1),
/// ];
/// let mut system =
///     GeochemicalSystem::new(db, IdealActivity, &SystemSettings::new("Cl-"), &constraints, &[]).unwrap();
///
/// let stats = EquilibriumSolver::default().solve(&mut system, None).unwrap();
/// assert!(stats.final_residual < 1e-12);
/// ```
#[derive(Debug, Clone, Default)]
pub struct EquilibriumSolver {
    pub settings: NewtonSettings,
}

impl EquilibriumSolver {
    pub fn new(settings: NewtonSettings) -> Self {
        EquilibriumSolver { settings }
    }

    /// Iterates `system` to equilibrium. With `dt`, the kinetic species
    /// evolve over a step of that length.
    ///
    /// On failure the system is left at the last iterate.
    pub fn solve<A: ActivityModel>(
        &self,
        system: &mut GeochemicalSystem<A>,
        dt: Option<f64>,
    ) -> SolverResult<SolverStats> {
        let n_add = system.num_basis() + system.num_kinetic();
        let mut stats = SolverStats::default();

        for iteration in 0..self.settings.max_iterations {
            stats.iterations = iteration;

            let mut additions = DVector::zeros(n_add);
            let mut dadditions = DMatrix::zeros(n_add, n_add);
            if let Some(dt) = dt {
                system.add_kinetic_rates(dt, &mut additions, &mut dadditions)?;
            }
            let residual = system.residual(&additions)?;
            stats.function_evals += 1;
            let norm = residual.norm();
            stats.final_residual = norm;
            log::debug!("equilibrium iteration {iteration}: residual norm {norm:e}");
            if norm < self.settings.tolerance {
                return Ok(stats);
            }

            let jacobian = system.compute_jacobian(&residual, &additions, &dadditions)?;
            stats.jacobian_evals += 1;
            let step = jacobian.lu().solve(&(-&residual)).ok_or(SolverError::SingularJacobian)?;

            let mut values = system.algebraic_variable_values();
            for (v, dv) in values.iter_mut().zip(step.iter()) {
                let trial = *v + dv;
                *v = if trial > 0.0 { trial } else { *v / self.settings.positivity_divisor };
            }
            system.set_algebraic_variables(&values)?;

            if iteration > 10 && norm > DIVERGENCE_NORM {
                return Err(SolverError::Diverged);
            }
        }

        Err(SolverError::MaxIterationsExceeded { residual: stats.final_residual })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::IdealActivity;
    use crate::system::fixtures::*;
    use crate::system::{KineticInitial, SystemSettings};

    #[test]
    fn test_newton_raphson_scalar() {
        let f = |x: &[f64]| (vec![x[0] * x[0] - 2.0], vec![vec![2.0 * x[0]]]);
        let solver = NewtonRaphson::new(1e-12, 50);
        let (x, stats) = solver.solve_with_stats(f, &[1.0]).unwrap();
        assert!((x[0] - 2f64.sqrt()).abs() < 1e-10);
        assert!(stats.iterations < 10);
        assert_eq!(stats.function_evals, stats.iterations);
    }

    #[test]
    fn test_newton_raphson_system() {
        // x + y = 3, x * y = 2 -> (1, 2) from a guess near it
        let f = |v: &[f64]| {
            let (x, y) = (v[0], v[1]);
            (vec![x + y - 3.0, x * y - 2.0], vec![vec![1.0, 1.0], vec![y, x]])
        };
        let x = NewtonRaphson::new(1e-12, 50).solve(f, &[0.5, 2.5]).unwrap();
        assert!((x[0] - 1.0).abs() < 1e-10);
        assert!((x[1] - 2.0).abs() < 1e-10);
    }

    #[test]
    fn test_newton_raphson_relaxation() {
        let f = |x: &[f64]| (vec![x[0] - 5.0], vec![vec![1.0]]);
        let solver = NewtonRaphson::with_relaxation(1e-8, 200, 0.5);
        let (x, stats) = solver.solve_with_stats(f, &[0.0]).unwrap();
        assert!((x[0] - 5.0).abs() < 1e-8);
        // a linear problem needs more than one damped step
        assert!(stats.iterations > 2);
    }

    #[test]
    fn test_newton_raphson_failures() {
        let singular = |x: &[f64]| (vec![x[0] * x[0] + 1.0], vec![vec![0.0]]);
        assert!(matches!(NewtonRaphson::new(1e-10, 10).solve(singular, &[1.0]), Err(SolverError::SingularJacobian)));

        // no real root; from x = 1 the first step lands on x = 0 where f' vanishes
        let f = |x: &[f64]| (vec![x[0] * x[0] + 1.0], vec![vec![2.0 * x[0]]]);
        assert!(matches!(
            NewtonRaphson::new(1e-10, 5).solve(f, &[0.5]),
            Err(SolverError::MaxIterationsExceeded { .. })
        ));
        assert!(matches!(NewtonRaphson::new(1e-10, 5).solve(f, &[1.0]), Err(SolverError::SingularJacobian)));

        let wrong_size = |_: &[f64]| (vec![1.0, 2.0], vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
        assert!(matches!(
            NewtonRaphson::new(1e-10, 5).solve(wrong_size, &[1.0]),
            Err(SolverError::InvalidInitialConditions(_))
        ));
    }

    #[test]
    fn test_equilibrium_mixed_constraints() {
        let mut sys = ideal(&mixed_constraints());
        let stats = EquilibriumSolver::default().solve(&mut sys, None).unwrap();
        assert!(stats.final_residual < 1e-12);
        assert!(stats.iterations > 0);

        // Na+ is conserved
        assert!((sys.compute_bulk_from_molalities(2).unwrap() - 0.1).abs() < 1e-12);

        // carbon speciation is linear in HCO3- with fixed H+ and Ca++
        let factor = 1.0 + 10f64.powf(0.34) + 10f64.powf(-4.33) + 1.0e-3 * 10f64.powf(1.04);
        let hco3 = sys.basis_molality()[4];
        assert!((hco3 - 0.01 / factor).abs() / hco3 < 1e-8);

        // converged state satisfies every residual row
        let res = sys.residual(&DVector::zeros(6)).unwrap();
        assert!(res.norm() < 1e-12);
    }

    #[test]
    fn test_equilibrium_already_converged() {
        let mut sys = ideal(&mixed_constraints());
        let solver = EquilibriumSolver::default();
        solver.solve(&mut sys, None).unwrap();
        let stats = solver.solve(&mut sys, None).unwrap();
        assert_eq!(stats.iterations, 0);
        assert_eq!(stats.jacobian_evals, 0);
    }

    #[test]
    fn test_equilibrium_with_kinetics() {
        let mut sys = GeochemicalSystem::new(
            kinetic_db(),
            IdealActivity,
            &SystemSettings::new("Cl-"),
            &mixed_constraints(),
            &[KineticInitial::moles("Aragonite", 1.0e-6)],
        )
        .unwrap();
        let dt = 1.0;
        EquilibriumSolver::default().solve(&mut sys, Some(dt)).unwrap();

        // implicit Euler: n = n_old - dt k M n (1 - Q/K)
        let n = sys.kinetic_moles(0).unwrap();
        let q_over_k = 10f64.powf(sys.log10_kinetic_activity_product(0).unwrap() - 1.99);
        let expected = 1.0e-6 / (1.0 + dt * 1.0e-3 * 100.0869 * (1.0 - q_over_k));
        assert!(n < 1.0e-6);
        assert!((n - expected).abs() / expected < 1e-5);
    }

    #[test]
    fn test_equilibrium_iteration_limit() {
        let mut sys = ideal(&mixed_constraints());
        let solver = EquilibriumSolver::new(NewtonSettings { max_iterations: 1, ..NewtonSettings::default() });
        assert!(matches!(solver.solve(&mut sys, None), Err(SolverError::MaxIterationsExceeded { .. })));
    }

    #[test]
    fn test_newton_settings_serde() {
        let settings: NewtonSettings = serde_json::from_str(r#"{"tolerance": 1e-10}"#).unwrap();
        assert_eq!(settings.tolerance, 1e-10);
        assert_eq!(settings.max_iterations, 100);
        assert_eq!(settings.positivity_divisor, 10.0);
    }
}

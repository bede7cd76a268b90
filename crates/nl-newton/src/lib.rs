//! nl-newton: Newton iteration engine for sparse nonlinear systems.
//!
//! Composes the Jacobian and LU engines into a family of interchangeable
//! descent-direction strategies (each trading Jacobian freshness for speed),
//! a damped line search, a convergence classifier and an outer driver with a
//! hard-reset-and-retry failure policy. Intended to advance implicit
//! integration schemes, where the same system is solved once per time step
//! and reuse across calls dominates the cost profile.

pub mod descent;
pub mod error;
pub mod estimator;
pub mod iteration;
pub mod line_search;
pub mod options;
pub mod registry;
pub mod solver;

pub use descent::{
    Broyden, ConstantJacobian, DescentDirection, FakeBroyden, Hart, LazyFakeBroyden, SimpleNewton,
};
pub use error::{NewtonError, NewtonResult};
pub use estimator::{ConvergenceStatus, ErrorEstimator};
pub use iteration::{IterationPerformer, IterationRecord};
pub use line_search::{LineSearch, LineSearchOptions, LineSearchOutcome};
pub use options::{NewtonOptions, ParamInfo};
pub use registry::{DescentRegistry, build_trimmer};
pub use solver::{NewtonSolver, RegularizationStrategy, RunOutcome, SolveObserver};

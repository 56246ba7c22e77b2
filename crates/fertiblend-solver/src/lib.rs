mod backend;
mod problem;
mod solution;
mod solver;

pub use backend::{LpBackend, MicroLpBackend};
pub use problem::{Constraint, ConstraintOp, LpProblem, Objective, ProblemError, VariableBounds};
pub use solution::{ConstraintViolation, Solution, SolutionStatus};
pub use solver::Solver;

use microlp::{ComparisonOp, OptimizationDirection, Problem, Variable};

use crate::problem::{ConstraintOp, LpProblem};
use crate::solution::Solution;

/// A linear programming engine that can be plugged into [`crate::Solver`].
///
/// Implementations must return an optimal vertex for any problem with a
/// bounded, non-empty feasible region and otherwise report `Infeasible` or
/// `Unbounded` through the status. Anything else is an `Error`.
pub trait LpBackend: Send + Sync {
    fn name(&self) -> &str;

    fn solve(&self, problem: &LpProblem) -> Solution;
}

/// Pure-Rust simplex backend built on `microlp`
#[derive(Debug, Default, Clone, Copy)]
pub struct MicroLpBackend;

impl LpBackend for MicroLpBackend {
    fn name(&self) -> &str {
        "microlp"
    }

    fn solve(&self, problem: &LpProblem) -> Solution {
        if let Err(e) = problem.check() {
            return Solution::error(e.to_string());
        }

        let direction = if problem.objective.minimize {
            OptimizationDirection::Minimize
        } else {
            OptimizationDirection::Maximize
        };
        let mut lp = Problem::new(direction);

        let vars: Vec<Variable> = problem
            .objective
            .coefficients
            .iter()
            .zip(&problem.bounds)
            .map(|(&cost, b)| lp.add_var(cost, (b.lower, b.upper.unwrap_or(f64::INFINITY))))
            .collect();

        for c in &problem.constraints {
            // A row without variables is decided by its right-hand side alone
            if c.is_empty() {
                if c.is_satisfied_by(0.0, 0.0) {
                    continue;
                }
                return Solution::infeasible();
            }

            let terms: Vec<(Variable, f64)> = c
                .coefficients
                .iter()
                .enumerate()
                .filter(|(_, coef)| **coef != 0.0)
                .map(|(j, &coef)| (vars[j], coef))
                .collect();
            let op = match c.op {
                ConstraintOp::Le => ComparisonOp::Le,
                ConstraintOp::Ge => ComparisonOp::Ge,
                ConstraintOp::Eq => ComparisonOp::Eq,
            };
            lp.add_constraint(terms, op, c.rhs);
        }

        match lp.solve() {
            Ok(solution) => {
                let values: Vec<f64> = vars.iter().map(|&v| solution[v]).collect();
                Solution::optimal(values, solution.objective())
            }
            Err(microlp::Error::Infeasible) => Solution::infeasible(),
            Err(microlp::Error::Unbounded) => Solution::unbounded(),
            Err(microlp::Error::InternalError(msg)) => Solution::error(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::LpProblem;
    use crate::solution::SolutionStatus;

    #[test]
    fn test_simple_maximization() {
        // Maximize: 3x + 2y
        // Subject to:
        //   x + y <= 4
        //   x <= 3
        //   y <= 3
        // Optimal: x=3, y=1, obj=11
        let mut problem = LpProblem::new(vec!["x".to_string(), "y".to_string()]);
        problem.set_objective(vec![3.0, 2.0], false);
        problem.add_constraint("sum", vec![1.0, 1.0], ConstraintOp::Le, 4.0);
        problem.add_constraint("x_max", vec![1.0, 0.0], ConstraintOp::Le, 3.0);
        problem.add_constraint("y_max", vec![0.0, 1.0], ConstraintOp::Le, 3.0);

        let solution = MicroLpBackend.solve(&problem);

        assert_eq!(solution.status, SolutionStatus::Optimal);
        assert!((solution.values[0] - 3.0).abs() < 1e-6, "x = {} (expected 3)", solution.values[0]);
        assert!((solution.values[1] - 1.0).abs() < 1e-6, "y = {} (expected 1)", solution.values[1]);
        assert!((solution.objective_value - 11.0).abs() < 1e-6, "obj = {} (expected 11)", solution.objective_value);
    }

    #[test]
    fn test_minimization_with_bounds() {
        // Minimize: 2x + 3y
        // Subject to:
        //   x + y >= 4
        //   0 <= x <= 3, 0 <= y
        // Optimal: x=3, y=1, obj=9
        let mut problem = LpProblem::new(vec!["x".to_string(), "y".to_string()]);
        problem.set_objective(vec![2.0, 3.0], true);
        problem.set_bounds(0, 0.0, Some(3.0));
        problem.add_constraint("sum", vec![1.0, 1.0], ConstraintOp::Ge, 4.0);

        let solution = MicroLpBackend.solve(&problem);

        assert_eq!(solution.status, SolutionStatus::Optimal);
        assert!((solution.values[0] - 3.0).abs() < 1e-6);
        assert!((solution.values[1] - 1.0).abs() < 1e-6);
        assert!((solution.objective_value - 9.0).abs() < 1e-6);
    }

    #[test]
    fn test_infeasible() {
        // x >= 5
        // x <= 3
        let mut problem = LpProblem::new(vec!["x".to_string()]);
        problem.set_objective(vec![1.0], true);
        problem.add_constraint("lower", vec![1.0], ConstraintOp::Ge, 5.0);
        problem.add_constraint("upper", vec![1.0], ConstraintOp::Le, 3.0);

        let solution = MicroLpBackend.solve(&problem);

        assert_eq!(solution.status, SolutionStatus::Infeasible);
    }

    #[test]
    fn test_unbounded() {
        let mut problem = LpProblem::new(vec!["x".to_string()]);
        problem.set_objective(vec![-1.0], true);
        problem.add_constraint("floor", vec![1.0], ConstraintOp::Ge, 1.0);

        let solution = MicroLpBackend.solve(&problem);

        assert_eq!(solution.status, SolutionStatus::Unbounded);
    }

    #[test]
    fn test_empty_row_decided_by_rhs() {
        let mut problem = LpProblem::new(vec!["x".to_string()]);
        problem.set_objective(vec![1.0], true);
        problem.add_constraint("nothing_positive", vec![0.0], ConstraintOp::Ge, 0.0);
        assert_eq!(MicroLpBackend.solve(&problem).status, SolutionStatus::Optimal);

        problem.add_constraint("nothing_reaches", vec![0.0], ConstraintOp::Ge, 10.0);
        assert_eq!(MicroLpBackend.solve(&problem).status, SolutionStatus::Infeasible);
    }

    #[test]
    fn test_malformed_problem_is_error() {
        let mut problem = LpProblem::new(vec!["x".to_string()]);
        problem.set_objective(vec![1.0, 2.0], true);

        let solution = MicroLpBackend.solve(&problem);

        assert_eq!(solution.status, SolutionStatus::Error);
        assert!(solution.message.is_some());
    }
}

use thiserror::Error;

/// Represents a linear programming problem over continuous variables
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct LpProblem {
    /// Variable names
    pub variables: Vec<String>,
    /// Lower/upper bound for each variable
    pub bounds: Vec<VariableBounds>,
    /// Objective function coefficients (costs)
    pub objective: Objective,
    /// Constraints
    pub constraints: Vec<Constraint>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Objective {
    /// Coefficients for each variable
    pub coefficients: Vec<f64>,
    /// Whether to minimize or maximize
    pub minimize: bool,
}

/// Box bounds of a single variable. `upper: None` means unbounded above.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VariableBounds {
    pub lower: f64,
    pub upper: Option<f64>,
}

impl Default for VariableBounds {
    fn default() -> Self {
        Self { lower: 0.0, upper: None }
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    /// Name/label for the constraint (for diagnostics)
    pub name: String,
    /// Coefficients for each variable
    pub coefficients: Vec<f64>,
    /// Comparison operator
    pub op: ConstraintOp,
    /// Right-hand side value
    pub rhs: f64,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintOp {
    /// Less than or equal (<=)
    Le,
    /// Greater than or equal (>=)
    Ge,
    /// Equal (=)
    Eq,
}

/// Structural defects that make a problem unsolvable before any solver runs
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProblemError {
    #[error("objective has {found} coefficients for {expected} variables")]
    ObjectiveLength { expected: usize, found: usize },
    #[error("{found} bounds declared for {expected} variables")]
    BoundsLength { expected: usize, found: usize },
    #[error("constraint {name} has {found} coefficients for {expected} variables")]
    ConstraintLength { name: String, expected: usize, found: usize },
    #[error("non-finite coefficient in {0}")]
    NonFinite(String),
    #[error("variable {name} has lower bound {lower} above upper bound {upper}")]
    InvertedBounds { name: String, lower: f64, upper: f64 },
}

impl LpProblem {
    pub fn new(variables: Vec<String>) -> Self {
        let n = variables.len();
        Self {
            variables,
            bounds: vec![VariableBounds::default(); n],
            objective: Objective {
                coefficients: vec![0.0; n],
                minimize: true,
            },
            constraints: Vec::new(),
        }
    }

    pub fn set_objective(&mut self, coefficients: Vec<f64>, minimize: bool) {
        self.objective = Objective { coefficients, minimize };
    }

    pub fn set_bounds(&mut self, index: usize, lower: f64, upper: Option<f64>) {
        self.bounds[index] = VariableBounds { lower, upper };
    }

    pub fn add_constraint(&mut self, name: impl Into<String>, coefficients: Vec<f64>, op: ConstraintOp, rhs: f64) {
        self.constraints.push(Constraint {
            name: name.into(),
            coefficients,
            op,
            rhs,
        });
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    pub fn constraint(&self, name: &str) -> Option<&Constraint> {
        self.constraints.iter().find(|c| c.name == name)
    }

    /// Objective value of an arbitrary assignment
    pub fn objective_value(&self, values: &[f64]) -> f64 {
        dot(&self.objective.coefficients, values)
    }

    /// Check dimensions and finiteness of every coefficient.
    pub fn check(&self) -> Result<(), ProblemError> {
        let n = self.num_variables();
        if self.objective.coefficients.len() != n {
            return Err(ProblemError::ObjectiveLength {
                expected: n,
                found: self.objective.coefficients.len(),
            });
        }
        if self.bounds.len() != n {
            return Err(ProblemError::BoundsLength {
                expected: n,
                found: self.bounds.len(),
            });
        }
        if self.objective.coefficients.iter().any(|c| !c.is_finite()) {
            return Err(ProblemError::NonFinite("objective".to_string()));
        }
        for (name, b) in self.variables.iter().zip(&self.bounds) {
            if !b.lower.is_finite() || b.upper.is_some_and(|u| u.is_nan()) {
                return Err(ProblemError::NonFinite(format!("bounds of {}", name)));
            }
            if let Some(upper) = b.upper {
                if b.lower > upper {
                    return Err(ProblemError::InvertedBounds {
                        name: name.clone(),
                        lower: b.lower,
                        upper,
                    });
                }
            }
        }
        for c in &self.constraints {
            if c.coefficients.len() != n {
                return Err(ProblemError::ConstraintLength {
                    name: c.name.clone(),
                    expected: n,
                    found: c.coefficients.len(),
                });
            }
            if !c.rhs.is_finite() || c.coefficients.iter().any(|x| !x.is_finite()) {
                return Err(ProblemError::NonFinite(c.name.clone()));
            }
        }
        Ok(())
    }
}

impl Constraint {
    /// Left-hand side evaluated at `values`
    pub fn lhs(&self, values: &[f64]) -> f64 {
        dot(&self.coefficients, values)
    }

    /// True when no variable appears in the row
    pub fn is_empty(&self) -> bool {
        self.coefficients.iter().all(|&c| c == 0.0)
    }

    /// Whether `lhs` satisfies the row within `tolerance` scaled by the row's rhs
    pub fn is_satisfied_by(&self, lhs: f64, tolerance: f64) -> bool {
        let slack = tolerance * self.rhs.abs().max(1.0);
        match self.op {
            ConstraintOp::Le => lhs <= self.rhs + slack,
            ConstraintOp::Ge => lhs >= self.rhs - slack,
            ConstraintOp::Eq => (lhs - self.rhs).abs() <= slack,
        }
    }
}

fn dot(coefficients: &[f64], values: &[f64]) -> f64 {
    coefficients.iter().zip(values).map(|(c, v)| c * v).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_var_problem() -> LpProblem {
        let mut problem = LpProblem::new(vec!["x".to_string(), "y".to_string()]);
        problem.set_objective(vec![2.0, 3.0], true);
        problem.add_constraint("sum", vec![1.0, 1.0], ConstraintOp::Ge, 4.0);
        problem
    }

    #[test]
    fn test_new_problem_defaults_to_non_negative_variables() {
        let problem = two_var_problem();
        assert_eq!(problem.num_variables(), 2);
        assert_eq!(problem.num_constraints(), 1);
        assert!(problem.bounds.iter().all(|b| b.lower == 0.0 && b.upper.is_none()));
        assert!(problem.check().is_ok());
    }

    #[test]
    fn test_check_rejects_mismatched_rows() {
        let mut problem = two_var_problem();
        problem.add_constraint("short", vec![1.0], ConstraintOp::Le, 1.0);
        assert_eq!(
            problem.check(),
            Err(ProblemError::ConstraintLength {
                name: "short".to_string(),
                expected: 2,
                found: 1
            })
        );
    }

    #[test]
    fn test_check_rejects_inverted_bounds() {
        let mut problem = two_var_problem();
        problem.set_bounds(1, 5.0, Some(2.0));
        assert!(matches!(problem.check(), Err(ProblemError::InvertedBounds { .. })));
    }

    #[test]
    fn test_row_tolerance_scales_with_rhs() {
        let row = Constraint {
            name: "big".to_string(),
            coefficients: vec![1.0],
            op: ConstraintOp::Ge,
            rhs: 1000.0,
        };
        // 1e-6 relative to 1000 allows 1e-3 of shortfall
        assert!(row.is_satisfied_by(999.9995, 1e-6));
        assert!(!row.is_satisfied_by(999.99, 1e-6));

        let zero = Constraint { rhs: 0.0, op: ConstraintOp::Le, ..row };
        assert!(zero.is_satisfied_by(5e-7, 1e-6));
        assert!(!zero.is_satisfied_by(2e-6, 1e-6));
    }

    #[test]
    fn test_objective_value() {
        let problem = two_var_problem();
        assert_eq!(problem.objective_value(&[1.0, 2.0]), 8.0);
    }
}

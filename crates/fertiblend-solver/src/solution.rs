/// The result of solving an LP problem
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    /// Solution status
    pub status: SolutionStatus,
    /// Optimal values for each variable (empty unless optimal)
    pub values: Vec<f64>,
    /// Optimal objective value
    pub objective_value: f64,
    /// Constraints that hold with equality at the optimum
    pub binding_constraints: Vec<String>,
    /// Constraint violations (populated when infeasible)
    pub violations: Vec<ConstraintViolation>,
    /// Reason reported alongside an `Error` status
    pub message: Option<String>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolutionStatus {
    /// An optimal solution was found
    Optimal,
    /// The problem is infeasible (no solution exists)
    Infeasible,
    /// The problem is unbounded
    Unbounded,
    /// Solver encountered an error
    Error,
}

/// Information about a violated constraint
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintViolation {
    /// Constraint name
    pub constraint: String,
    /// Required value (from constraint RHS)
    pub required: f64,
    /// Best value achievable while every other constraint holds
    pub actual: f64,
    /// How much the constraint is violated by
    pub violation_amount: f64,
    /// Human-readable description of what's wrong
    pub description: String,
}

impl Solution {
    pub fn optimal(values: Vec<f64>, objective_value: f64) -> Self {
        Self {
            status: SolutionStatus::Optimal,
            values,
            objective_value,
            binding_constraints: Vec::new(),
            violations: Vec::new(),
            message: None,
        }
    }

    pub fn infeasible() -> Self {
        Self::infeasible_with_violations(Vec::new())
    }

    pub fn infeasible_with_violations(violations: Vec<ConstraintViolation>) -> Self {
        Self {
            status: SolutionStatus::Infeasible,
            values: Vec::new(),
            objective_value: f64::INFINITY,
            binding_constraints: Vec::new(),
            violations,
            message: None,
        }
    }

    pub fn unbounded() -> Self {
        Self {
            status: SolutionStatus::Unbounded,
            values: Vec::new(),
            objective_value: f64::NEG_INFINITY,
            binding_constraints: Vec::new(),
            violations: Vec::new(),
            message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: SolutionStatus::Error,
            values: Vec::new(),
            objective_value: f64::NAN,
            binding_constraints: Vec::new(),
            violations: Vec::new(),
            message: Some(message.into()),
        }
    }

    pub fn is_optimal(&self) -> bool {
        self.status == SolutionStatus::Optimal
    }
}

impl std::fmt::Display for SolutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            SolutionStatus::Optimal => "OPTIMAL",
            SolutionStatus::Infeasible => "INFEASIBLE",
            SolutionStatus::Unbounded => "UNBOUNDED",
            SolutionStatus::Error => "ERROR",
        };
        f.write_str(label)
    }
}

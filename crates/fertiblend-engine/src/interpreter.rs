use std::collections::BTreeSet;

use fertiblend_solver::{ConstraintViolation, Solution, SolutionStatus};
use serde::Serialize;

use crate::builder::{BlendModel, RowKind};
use crate::diagnostics::{self, Precheck};
use crate::nutrient::Nutrient;
use crate::requirement::Target;

/// Quantities below this are reported as not used
const USED_THRESHOLD: f64 = 1e-6;

/// Outcome of optimizing one field
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FieldOutcome {
    Solved(BlendPlan),
    Infeasible {
        field_id: String,
        violated_nutrients: BTreeSet<Nutrient>,
        diagnostic_message: String,
        violations: Vec<ConstraintViolation>,
    },
    ConfigurationError {
        field_id: String,
        reason: String,
    },
    SolverError {
        field_id: String,
        reason: String,
    },
}

impl FieldOutcome {
    pub fn field_id(&self) -> &str {
        match self {
            FieldOutcome::Solved(plan) => &plan.field_id,
            FieldOutcome::Infeasible { field_id, .. }
            | FieldOutcome::ConfigurationError { field_id, .. }
            | FieldOutcome::SolverError { field_id, .. } => field_id,
        }
    }

    pub fn plan(&self) -> Option<&BlendPlan> {
        match self {
            FieldOutcome::Solved(plan) => Some(plan),
            _ => None,
        }
    }

    pub fn is_solved(&self) -> bool {
        matches!(self, FieldOutcome::Solved(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            FieldOutcome::Solved(_) => "OPTIMAL",
            FieldOutcome::Infeasible { .. } => "INFEASIBLE",
            FieldOutcome::ConfigurationError { .. } => "CONFIGURATION ERROR",
            FieldOutcome::SolverError { .. } => "SOLVER ERROR",
        }
    }
}

/// Least-cost blend for one field
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlendPlan {
    pub field_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area_ha: Option<f64>,
    /// Products actually used, registry order
    pub doses: Vec<ProductDose>,
    /// Exact solver quantities for every product, registry order
    pub quantities: Vec<f64>,
    /// Σ quantity × cost_per_unit
    pub product_cost: f64,
    pub application_cost: f64,
    pub total_cost: f64,
    /// Total product mass per unit area
    pub total_dose: f64,
    /// `total_cost` over the whole field when the area is known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_total_cost: Option<f64>,
    pub nutrients: Vec<NutrientCoverage>,
    pub binding_constraints: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductDose {
    pub product_id: String,
    pub quantity: f64,
    /// Rounded for display; costs use `quantity`
    pub display_quantity: f64,
    pub cost: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_quantity: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NutrientCoverage {
    pub nutrient: Nutrient,
    pub target: Option<Target>,
    pub required_min: Option<f64>,
    pub required_max: Option<f64>,
    pub achieved: f64,
    /// achieved − required minimum (against zero when there is no minimum)
    pub surplus: f64,
    pub binding: bool,
}

impl BlendPlan {
    pub fn quantity_of(&self, product_id: &str) -> f64 {
        self.doses
            .iter()
            .find(|d| d.product_id == product_id)
            .map_or(0.0, |d| d.quantity)
    }

    pub fn coverage(&self, nutrient: Nutrient) -> Option<&NutrientCoverage> {
        self.nutrients.iter().find(|c| c.nutrient == nutrient)
    }
}

/// Turns solver output into blend plans or typed failures
pub struct ResultInterpreter {
    display_precision: u32,
}

impl ResultInterpreter {
    pub fn new(display_precision: u32) -> Self {
        Self { display_precision }
    }

    pub fn interpret(&self, model: &BlendModel, solution: &Solution) -> FieldOutcome {
        match solution.status {
            SolutionStatus::Optimal => FieldOutcome::Solved(self.plan(model, solution)),
            SolutionStatus::Infeasible => {
                let report = diagnostics::precheck(model);
                if report.passed() {
                    self.solver_failure(model, &solution.violations)
                } else {
                    self.precheck_failure(model, report)
                }
            }
            SolutionStatus::Unbounded => FieldOutcome::ConfigurationError {
                field_id: model.field_id.clone(),
                reason: "the cost objective is unbounded; some product has a non-positive cost and no cap"
                    .to_string(),
            },
            SolutionStatus::Error => FieldOutcome::SolverError {
                field_id: model.field_id.clone(),
                reason: solution
                    .message
                    .clone()
                    .unwrap_or_else(|| "solver failed without a reason".to_string()),
            },
        }
    }

    /// Infeasible outcome from the structural screen, without solving
    pub fn precheck_failure(&self, model: &BlendModel, report: Precheck) -> FieldOutcome {
        let message = format!("Field {}: {}", model.field_id, report.messages.join("; "));
        FieldOutcome::Infeasible {
            field_id: model.field_id.clone(),
            violated_nutrients: report.violated,
            diagnostic_message: message,
            violations: Vec::new(),
        }
    }

    fn solver_failure(&self, model: &BlendModel, violations: &[ConstraintViolation]) -> FieldOutcome {
        // Conflict entries are named "<row> vs <row>"
        let violated_nutrients: BTreeSet<Nutrient> = violations
            .iter()
            .flat_map(|v| v.constraint.split(" vs "))
            .filter_map(|name| model.row_kind(name))
            .filter_map(RowKind::nutrient)
            .collect();

        let detail = if violations.is_empty() {
            "no blend satisfies every constraint at once".to_string()
        } else {
            violations
                .iter()
                .map(|v| v.description.as_str())
                .collect::<Vec<_>>()
                .join("; ")
        };

        FieldOutcome::Infeasible {
            field_id: model.field_id.clone(),
            violated_nutrients,
            diagnostic_message: format!("Field {}: {}", model.field_id, detail),
            violations: violations.to_vec(),
        }
    }

    fn plan(&self, model: &BlendModel, solution: &Solution) -> BlendPlan {
        // Clamp solver noise below zero; everything downstream uses these exact values
        let quantities: Vec<f64> = solution.values.iter().map(|q| q.max(0.0)).collect();

        let mut doses = Vec::new();
        let mut product_cost = 0.0;
        for (product, &quantity) in model.products.iter().zip(&quantities) {
            let cost = quantity * product.cost_per_unit;
            product_cost += cost;
            if quantity > USED_THRESHOLD {
                doses.push(ProductDose {
                    product_id: product.id.clone(),
                    quantity,
                    display_quantity: round_to(quantity, self.display_precision),
                    cost,
                    field_quantity: model.area_ha.map(|a| quantity * a),
                });
            }
        }

        let total_dose: f64 = quantities.iter().sum();
        let application_cost = total_dose * model.application_cost;
        let total_cost = product_cost + application_cost;

        let nutrients = Nutrient::ALL
            .into_iter()
            .map(|nutrient| {
                let achieved = model.supply(nutrient, &quantities);
                let required = model.required[nutrient];
                let binding = [
                    RowKind::NutrientMin(nutrient),
                    RowKind::NutrientMax(nutrient),
                    RowKind::NutrientExact(nutrient),
                ]
                .into_iter()
                .flat_map(|kind| model.row_names(kind))
                .any(|name| solution.binding_constraints.iter().any(|b| b == name));
                NutrientCoverage {
                    nutrient,
                    target: model.targets[nutrient],
                    required_min: required.min,
                    required_max: required.max,
                    achieved,
                    surplus: achieved - required.min.unwrap_or(0.0),
                    binding,
                }
            })
            .collect();

        BlendPlan {
            field_id: model.field_id.clone(),
            area_ha: model.area_ha,
            doses,
            quantities,
            product_cost,
            application_cost,
            total_cost,
            total_dose,
            field_total_cost: model.area_ha.map(|a| total_cost * a),
            nutrients,
            binding_constraints: solution.binding_constraints.clone(),
        }
    }
}

fn round_to(value: f64, decimals: u32) -> f64 {
    let scale = 10f64.powi(decimals as i32);
    (value * scale).round() / scale
}

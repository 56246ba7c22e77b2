use std::collections::{BTreeMap, HashSet};

use fertiblend_solver::Solver;
use rayon::prelude::*;
use serde::Serialize;

use crate::builder::BlendModelBuilder;
use crate::diagnostics;
use crate::error::InputError;
use crate::interpreter::{FieldOutcome, ResultInterpreter};
use crate::product::ProductRegistry;
use crate::requirement::FieldRequirement;
use crate::settings::Settings;

/// Optimizes fertilizer blends for a batch of fields
#[derive(Debug, Clone)]
pub struct BlendEngine {
    settings: Settings,
    solver: Solver,
}

impl BlendEngine {
    pub fn new(settings: Settings) -> Self {
        let solver = Solver::new()
            .with_timeout(settings.timeout())
            .with_max_retries(settings.solver_retries);
        Self { settings, solver }
    }

    pub fn with_solver(settings: Settings, solver: Solver) -> Self {
        Self { settings, solver }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Reject malformed input before any model is built
    pub fn validate(&self, registry: &ProductRegistry, requirements: &[FieldRequirement]) -> Result<(), InputError> {
        self.validate_batch(registry, requirements)?;
        requirements.iter().try_for_each(FieldRequirement::validate)
    }

    /// Checks that fail a whole batch: settings, registry and field id clashes
    fn validate_batch(&self, registry: &ProductRegistry, requirements: &[FieldRequirement]) -> Result<(), InputError> {
        self.settings.validate()?;
        registry.validate()?;
        let mut seen = HashSet::new();
        for requirement in requirements {
            if !seen.insert(requirement.field_id.as_str()) {
                return Err(InputError::DuplicateField(requirement.field_id.clone()));
            }
        }
        Ok(())
    }

    /// Optimize a single field.
    ///
    /// Assumes the registry and settings are valid; problems with the field
    /// itself come back as `ConfigurationError`.
    pub fn optimize_field(&self, registry: &ProductRegistry, requirement: &FieldRequirement) -> FieldOutcome {
        if let Err(e) = requirement.validate() {
            return FieldOutcome::ConfigurationError {
                field_id: requirement.field_id.clone(),
                reason: e.to_string(),
            };
        }

        let model = BlendModelBuilder::new(&self.settings).build(registry, requirement);
        let interpreter = ResultInterpreter::new(self.settings.display_precision);

        let report = diagnostics::precheck(&model);
        if !report.passed() {
            tracing::debug!(field = %model.field_id, "rejected by precheck");
            return interpreter.precheck_failure(&model, report);
        }

        let solution = self.solver.solve(&model.lp);
        tracing::debug!(
            field = %model.field_id,
            status = %solution.status,
            objective = solution.objective_value,
            "solved blend model"
        );
        interpreter.interpret(&model, &solution)
    }

    /// Optimize every field.
    ///
    /// Settings and registry errors fail the whole batch; a malformed field
    /// only fails itself.
    pub fn optimize(
        &self,
        registry: &ProductRegistry,
        requirements: &[FieldRequirement],
    ) -> Result<BatchResult, InputError> {
        self.validate_batch(registry, requirements)?;

        let solve = |r: &FieldRequirement| (r.field_id.clone(), self.optimize_field(registry, r));
        let outcomes: BTreeMap<String, FieldOutcome> = if self.settings.parallel {
            requirements.par_iter().map(solve).collect()
        } else {
            requirements.iter().map(solve).collect()
        };

        let result = BatchResult { outcomes };
        tracing::info!(
            fields = result.outcomes.len(),
            solved = result.solved_count(),
            infeasible = result.infeasible_count(),
            errors = result.error_count(),
            "optimized batch"
        );
        Ok(result)
    }
}

/// Outcomes of a batch, keyed and ordered by field id
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchResult {
    pub outcomes: BTreeMap<String, FieldOutcome>,
}

impl BatchResult {
    pub fn get(&self, field_id: &str) -> Option<&FieldOutcome> {
        self.outcomes.get(field_id)
    }

    /// Cost summed over solved fields, scaled by area where one is known
    pub fn total_cost(&self) -> f64 {
        self.outcomes
            .values()
            .filter_map(FieldOutcome::plan)
            .map(|plan| plan.field_total_cost.unwrap_or(plan.total_cost))
            .sum()
    }

    pub fn solved_count(&self) -> usize {
        self.outcomes.values().filter(|o| o.is_solved()).count()
    }

    pub fn infeasible_count(&self) -> usize {
        self.outcomes
            .values()
            .filter(|o| matches!(o, FieldOutcome::Infeasible { .. }))
            .count()
    }

    pub fn error_count(&self) -> usize {
        self.outcomes.len() - self.solved_count() - self.infeasible_count()
    }

    pub fn all_solved(&self) -> bool {
        self.outcomes.values().all(FieldOutcome::is_solved)
    }
}

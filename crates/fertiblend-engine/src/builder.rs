use fertiblend_solver::{ConstraintOp, LpProblem};
use serde::Serialize;

use crate::nutrient::{Nutrient, NutrientVector};
use crate::product::{Product, ProductRegistry};
use crate::requirement::{FieldRequirement, RequiredBounds, Target};
use crate::settings::Settings;

/// What an LP row stands for, so solver output can be mapped back to agronomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RowKind {
    NutrientMin(Nutrient),
    NutrientMax(Nutrient),
    NutrientExact(Nutrient),
    /// Settings-level ceiling on total nitrogen
    NitrogenCeiling,
    /// Settings-level ceiling on total product mass
    MixCeiling,
}

impl RowKind {
    pub fn nutrient(self) -> Option<Nutrient> {
        match self {
            RowKind::NutrientMin(n) | RowKind::NutrientMax(n) | RowKind::NutrientExact(n) => Some(n),
            RowKind::NitrogenCeiling => Some(Nutrient::N),
            RowKind::MixCeiling => None,
        }
    }

    fn row_name(self) -> String {
        match self {
            RowKind::NutrientMin(n) => format!("{}_min", n),
            RowKind::NutrientMax(n) => format!("{}_max", n),
            RowKind::NutrientExact(n) => format!("{}_eq", n),
            RowKind::NitrogenCeiling => "N_total_max".to_string(),
            RowKind::MixCeiling => "mix_max".to_string(),
        }
    }
}

/// Linear program for one field, with everything needed to read its solution
#[derive(Debug, Clone, PartialEq)]
pub struct BlendModel {
    pub field_id: String,
    pub area_ha: Option<f64>,
    /// One blend variable per product, in registry order
    pub products: Vec<Product>,
    pub targets: NutrientVector<Option<Target>>,
    pub required: NutrientVector<RequiredBounds>,
    pub application_cost: f64,
    pub max_nitrogen: Option<f64>,
    pub max_mix: Option<f64>,
    /// Role of each row of `lp.constraints`, same order
    pub rows: Vec<RowKind>,
    pub lp: LpProblem,
}

impl BlendModel {
    pub fn row_kind(&self, constraint_name: &str) -> Option<RowKind> {
        self.lp
            .constraints
            .iter()
            .position(|c| c.name == constraint_name)
            .map(|i| self.rows[i])
    }

    pub fn row_names(&self, kind: RowKind) -> impl Iterator<Item = &str> {
        self.rows
            .iter()
            .zip(&self.lp.constraints)
            .filter(move |(k, _)| **k == kind)
            .map(|(_, c)| c.name.as_str())
    }

    /// Amount of `nutrient` delivered by a quantity vector
    pub fn supply(&self, nutrient: Nutrient, quantities: &[f64]) -> f64 {
        self.products
            .iter()
            .zip(quantities)
            .map(|(p, &q)| p.supplies(nutrient, q))
            .sum()
    }
}

/// Translates one field's requirements into a linear program
pub struct BlendModelBuilder<'a> {
    settings: &'a Settings,
}

impl<'a> BlendModelBuilder<'a> {
    pub fn new(settings: &'a Settings) -> Self {
        Self { settings }
    }

    pub fn build(&self, registry: &ProductRegistry, requirement: &FieldRequirement) -> BlendModel {
        let products: Vec<Product> = registry.products().to_vec();
        let names: Vec<String> = products.iter().map(|p| p.id.clone()).collect();
        let mut lp = LpProblem::new(names);

        // Objective: minimize product cost plus spreading cost
        let costs: Vec<f64> = products
            .iter()
            .map(|p| p.cost_per_unit + self.settings.application_cost)
            .collect();
        lp.set_objective(costs, true);

        for (j, p) in products.iter().enumerate() {
            lp.set_bounds(j, p.min_dose, p.cap);
        }

        let (policy, tolerance) = (self.settings.target_policy, self.settings.tolerance);
        let required = requirement
            .targets
            .map(|_, t| t.map(|t| t.required_bounds(policy, tolerance)).unwrap_or_default());

        let mut rows = Vec::new();
        let mut add_row = |lp: &mut LpProblem, kind: RowKind, coeffs: Vec<f64>, op: ConstraintOp, rhs: f64| {
            lp.add_constraint(kind.row_name(), coeffs, op, rhs);
            rows.push(kind);
        };

        for nutrient in Nutrient::ALL {
            let bounds = required[nutrient];
            let coeffs: Vec<f64> = products.iter().map(|p| p.content[nutrient]).collect();
            if bounds.exact {
                let rhs = bounds.min.unwrap_or_default();
                add_row(&mut lp, RowKind::NutrientExact(nutrient), coeffs, ConstraintOp::Eq, rhs);
                continue;
            }
            if let Some(min) = bounds.min {
                add_row(&mut lp, RowKind::NutrientMin(nutrient), coeffs.clone(), ConstraintOp::Ge, min);
            }
            if let Some(max) = bounds.max {
                add_row(&mut lp, RowKind::NutrientMax(nutrient), coeffs, ConstraintOp::Le, max);
            }
        }

        if let Some(max_n) = self.settings.max_nitrogen {
            let coeffs = products.iter().map(|p| p.content[Nutrient::N]).collect();
            add_row(&mut lp, RowKind::NitrogenCeiling, coeffs, ConstraintOp::Le, max_n);
        }
        if let Some(max_mix) = self.settings.max_mix {
            add_row(&mut lp, RowKind::MixCeiling, vec![1.0; products.len()], ConstraintOp::Le, max_mix);
        }

        tracing::debug!(
            field = %requirement.field_id,
            variables = lp.num_variables(),
            constraints = lp.num_constraints(),
            "built blend model"
        );

        BlendModel {
            field_id: requirement.field_id.clone(),
            area_ha: requirement.area_ha,
            products,
            targets: requirement.targets,
            required,
            application_cost: self.settings.application_cost,
            max_nitrogen: self.settings.max_nitrogen,
            max_mix: self.settings.max_mix,
            rows,
            lp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::TargetPolicy;

    fn registry() -> ProductRegistry {
        ProductRegistry::new(vec![
            Product::new("A", 1.0, NutrientVector::new(0.20, 0.0, 0.0)),
            Product::new("B", 2.0, NutrientVector::new(0.0, 0.40, 0.20)).with_cap(50.0),
            Product::new("filler", 0.1, NutrientVector::default()),
        ])
    }

    fn field() -> FieldRequirement {
        FieldRequirement::new("P1")
            .with_target(Nutrient::N, Target::Exact(30.0))
            .with_target(Nutrient::P2O5, Target::AtLeast(20.0))
            .with_target(Nutrient::K2O, Target::Range { min: 10.0, max: 40.0 })
    }

    #[test]
    fn test_variables_follow_registry_order_and_bounds() {
        let settings = Settings::default();
        let model = BlendModelBuilder::new(&settings).build(&registry(), &field());

        assert_eq!(model.lp.variables, vec!["A", "B", "filler"]);
        assert_eq!(model.lp.objective.coefficients, vec![1.0, 2.0, 0.1]);
        assert_eq!(model.lp.bounds[1].upper, Some(50.0));
        // Products without any nutrient stay in the variable set
        assert_eq!(model.lp.num_variables(), 3);
    }

    #[test]
    fn test_rows_under_minimum_policy() {
        let settings = Settings::default();
        let model = BlendModelBuilder::new(&settings).build(&registry(), &field());

        let names: Vec<&str> = model.lp.constraints.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["N_min", "P2O5_min", "K2O_min", "K2O_max"]);
        let n_min = model.lp.constraint("N_min").unwrap();
        assert_eq!(n_min.op, ConstraintOp::Ge);
        assert_eq!(n_min.rhs, 30.0);
        assert_eq!(n_min.coefficients, vec![0.2, 0.0, 0.0]);
        assert_eq!(model.row_kind("K2O_max"), Some(RowKind::NutrientMax(Nutrient::K2O)));
    }

    #[test]
    fn test_exact_policy_emits_equality() {
        let settings = Settings::default().with_target_policy(TargetPolicy::Exact);
        let model = BlendModelBuilder::new(&settings).build(&registry(), &field());

        let row = model.lp.constraint("N_eq").unwrap();
        assert_eq!(row.op, ConstraintOp::Eq);
        assert_eq!(row.rhs, 30.0);
        assert!(model.lp.constraint("N_min").is_none());
    }

    #[test]
    fn test_absent_and_zero_targets_are_unconstrained() {
        let settings = Settings::default();
        let requirement = FieldRequirement::new("P2").with_target(Nutrient::P2O5, Target::AtLeast(0.0));
        let model = BlendModelBuilder::new(&settings).build(&registry(), &requirement);

        assert_eq!(model.lp.num_constraints(), 0);
    }

    #[test]
    fn test_settings_ceilings_and_application_cost() {
        let settings = Settings::default()
            .with_max_nitrogen(Some(250.0))
            .with_max_mix(Some(600.0))
            .with_application_cost(0.02)
            .with_tolerance(0.02);
        let model = BlendModelBuilder::new(&settings).build(&registry(), &field());

        for (got, want) in model.lp.objective.coefficients.iter().zip([1.02, 2.02, 0.12]) {
            assert!((got - want).abs() < 1e-12, "cost {} (expected {})", got, want);
        }
        assert!((model.lp.constraint("N_min").unwrap().rhs - 29.4).abs() < 1e-12);
        assert_eq!(model.lp.constraint("N_total_max").unwrap().rhs, 250.0);
        let mix = model.lp.constraint("mix_max").unwrap();
        assert_eq!(mix.coefficients, vec![1.0, 1.0, 1.0]);
        assert_eq!(model.row_kind("mix_max"), Some(RowKind::MixCeiling));
    }

    #[test]
    fn test_build_is_deterministic() {
        let settings = Settings::default();
        let builder = BlendModelBuilder::new(&settings);
        assert_eq!(builder.build(&registry(), &field()), builder.build(&registry(), &field()));
    }
}

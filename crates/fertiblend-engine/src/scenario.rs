use std::collections::BTreeSet;

use serde::Serialize;

use crate::engine::{BatchResult, BlendEngine};
use crate::error::InputError;
use crate::product::ProductRegistry;
use crate::requirement::FieldRequirement;

/// Side-by-side result of optimizing the same fields under two settings
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioComparison {
    pub cost_a: f64,
    pub cost_b: f64,
    /// cost_b − cost_a
    pub cost_difference: f64,
    pub fields: Vec<FieldComparison>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub largest_increase: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub largest_decrease: Option<String>,
    #[serde(skip)]
    pub a: BatchResult,
    #[serde(skip)]
    pub b: BatchResult,
}

/// Dose change for one field; unsolved fields count as zero dose
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldComparison {
    pub field_id: String,
    pub solved_a: bool,
    pub solved_b: bool,
    pub dose_a: f64,
    pub dose_b: f64,
    pub dose_difference: f64,
    pub products: Vec<ProductDelta>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductDelta {
    pub product_id: String,
    pub quantity_a: f64,
    pub quantity_b: f64,
    pub difference: f64,
}

/// Optimize under both engines and report B − A
pub fn compare(
    engine_a: &BlendEngine,
    engine_b: &BlendEngine,
    registry: &ProductRegistry,
    requirements: &[FieldRequirement],
) -> Result<ScenarioComparison, InputError> {
    let a = engine_a.optimize(registry, requirements)?;
    let b = engine_b.optimize(registry, requirements)?;

    let field_ids: BTreeSet<&String> = a.outcomes.keys().chain(b.outcomes.keys()).collect();
    let mut fields = Vec::new();
    for id in field_ids {
        let plan_a = a.get(id).and_then(|o| o.plan());
        let plan_b = b.get(id).and_then(|o| o.plan());
        let dose_a = plan_a.map_or(0.0, |p| p.total_dose);
        let dose_b = plan_b.map_or(0.0, |p| p.total_dose);

        let products = registry
            .iter()
            .filter_map(|product| {
                let quantity_a = plan_a.map_or(0.0, |p| p.quantity_of(&product.id));
                let quantity_b = plan_b.map_or(0.0, |p| p.quantity_of(&product.id));
                (quantity_a > 0.0 || quantity_b > 0.0).then(|| ProductDelta {
                    product_id: product.id.clone(),
                    quantity_a,
                    quantity_b,
                    difference: quantity_b - quantity_a,
                })
            })
            .collect();

        fields.push(FieldComparison {
            field_id: id.clone(),
            solved_a: plan_a.is_some(),
            solved_b: plan_b.is_some(),
            dose_a,
            dose_b,
            dose_difference: dose_b - dose_a,
            products,
        });
    }

    // Ties resolve to the first field in id order
    let mut largest_increase: Option<&FieldComparison> = None;
    let mut largest_decrease: Option<&FieldComparison> = None;
    for field in &fields {
        if field.dose_difference > largest_increase.map_or(0.0, |f| f.dose_difference) {
            largest_increase = Some(field);
        }
        if field.dose_difference < largest_decrease.map_or(0.0, |f| f.dose_difference) {
            largest_decrease = Some(field);
        }
    }
    let largest_increase = largest_increase.map(|f| f.field_id.clone());
    let largest_decrease = largest_decrease.map(|f| f.field_id.clone());

    let cost_a = a.total_cost();
    let cost_b = b.total_cost();
    tracing::info!(cost_a, cost_b, "compared scenarios");

    Ok(ScenarioComparison {
        cost_a,
        cost_b,
        cost_difference: cost_b - cost_a,
        fields,
        largest_increase,
        largest_decrease,
        a,
        b,
    })
}

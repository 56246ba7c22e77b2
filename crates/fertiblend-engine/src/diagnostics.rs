use std::collections::BTreeSet;

use serde::Serialize;

use crate::builder::BlendModel;
use crate::nutrient::Nutrient;

const EPS: f64 = 1e-6;

/// A nutrient whose minimum is out of reach with the products on hand
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Shortfall {
    pub nutrient: Nutrient,
    pub required: f64,
    /// Most that can be delivered; infinite when an uncapped product carries it
    pub reachable: f64,
}

/// Result of the structural feasibility screen run before solving
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Precheck {
    pub violated: BTreeSet<Nutrient>,
    pub shortfalls: Vec<Shortfall>,
    pub messages: Vec<String>,
}

impl Precheck {
    pub fn passed(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Most of `nutrient` the model can ever deliver.
///
/// Every product at its cap, further limited by the mix ceiling (all of it
/// spent on the richest product) and, for nitrogen, by the nitrogen ceiling.
pub fn reachable(model: &BlendModel, nutrient: Nutrient) -> f64 {
    let mut most: f64 = model
        .products
        .iter()
        .filter(|p| p.content[nutrient] > 0.0)
        .map(|p| p.cap.map_or(f64::INFINITY, |cap| cap * p.content[nutrient]))
        .sum();

    if let Some(max_mix) = model.max_mix {
        let richest = model
            .products
            .iter()
            .map(|p| p.content[nutrient])
            .fold(0.0, f64::max);
        most = most.min(max_mix * richest);
    }
    if nutrient == Nutrient::N {
        if let Some(max_n) = model.max_nitrogen {
            most = most.min(max_n);
        }
    }
    most
}

/// Screen a model for infeasibility that follows from bounds alone
pub fn precheck(model: &BlendModel) -> Precheck {
    let mut report = Precheck::default();

    for nutrient in Nutrient::ALL {
        let Some(required) = model.required[nutrient].min else {
            continue;
        };
        let most = reachable(model, nutrient);
        if required - EPS > most {
            report.violated.insert(nutrient);
            report.messages.push(format!(
                "{} required {:.2} kg exceeds the {:.2} kg reachable with every product at its cap",
                nutrient, required, most
            ));
            report.shortfalls.push(Shortfall {
                nutrient,
                required,
                reachable: most,
            });
        }
    }

    // Minimum doses are forced, so they can overshoot ceilings on their own
    let floor_mix: f64 = model.products.iter().map(|p| p.min_dose).sum();
    if let Some(max_mix) = model.max_mix {
        if floor_mix - 1e-9 > max_mix {
            report.messages.push(format!(
                "minimum doses add up to {:.2} kg, above the mix ceiling of {:.2} kg",
                floor_mix, max_mix
            ));
        }
    }

    for nutrient in Nutrient::ALL {
        let floor: f64 = model
            .products
            .iter()
            .map(|p| p.supplies(nutrient, p.min_dose))
            .sum();
        let mut ceiling = model.required[nutrient].max;
        if nutrient == Nutrient::N {
            ceiling = match (ceiling, model.max_nitrogen) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            };
        }
        if let Some(ceiling) = ceiling {
            if floor - EPS > ceiling {
                report.violated.insert(nutrient);
                report.messages.push(format!(
                    "minimum doses already supply {:.2} kg of {}, above its ceiling of {:.2} kg",
                    floor, nutrient, ceiling
                ));
            }
        }
    }

    report
}

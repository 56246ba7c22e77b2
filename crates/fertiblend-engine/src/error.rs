use thiserror::Error;

use crate::nutrient::Nutrient;

/// Malformed input, rejected before any model is built
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InputError {
    #[error("Product registry is empty")]
    EmptyRegistry,
    #[error("Empty {0} id")]
    EmptyId(&'static str),
    #[error("Duplicate product id: {0}")]
    DuplicateProduct(String),
    #[error("Product {product} has invalid cost {cost}")]
    InvalidCost { product: String, cost: f64 },
    #[error("Product {product} has invalid {nutrient} content {fraction} (expected a fraction between 0 and 1)")]
    InvalidContent {
        product: String,
        nutrient: Nutrient,
        fraction: f64,
    },
    #[error("Product {product} has invalid dose limits (min {min_dose}, cap {cap:?})")]
    InvalidDoseLimits {
        product: String,
        min_dose: f64,
        cap: Option<f64>,
    },
    #[error("Duplicate field id: {0}")]
    DuplicateField(String),
    #[error("Field {field} has invalid area {area}")]
    InvalidArea { field: String, area: f64 },
    #[error("Field {field} has invalid {nutrient} target: {reason}")]
    InvalidTarget {
        field: String,
        nutrient: Nutrient,
        reason: String,
    },
    #[error("Invalid setting {name}: {reason}")]
    InvalidSetting { name: &'static str, reason: String },
}

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::InputError;
use crate::nutrient::{Nutrient, NutrientVector};

/// A fertilizer product available for blending
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    /// Currency per kg of product
    pub cost_per_unit: f64,
    /// Mass fraction of each nutrient, 0..=1
    pub content: NutrientVector<f64>,
    /// Smallest dose that must be applied (kg per unit area)
    #[serde(default)]
    pub min_dose: f64,
    /// Largest dose that may be applied (kg per unit area), unbounded when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cap: Option<f64>,
}

impl Product {
    pub fn new(id: impl Into<String>, cost_per_unit: f64, content: NutrientVector<f64>) -> Self {
        Self {
            id: id.into(),
            cost_per_unit,
            content,
            min_dose: 0.0,
            cap: None,
        }
    }

    pub fn with_cap(mut self, cap: f64) -> Self {
        self.cap = Some(cap);
        self
    }

    pub fn with_min_dose(mut self, min_dose: f64) -> Self {
        self.min_dose = min_dose;
        self
    }

    /// Nutrient delivered by `quantity` kg of this product
    pub fn supplies(&self, nutrient: Nutrient, quantity: f64) -> f64 {
        self.content[nutrient] * quantity
    }

    pub fn validate(&self) -> Result<(), InputError> {
        if self.id.trim().is_empty() {
            return Err(InputError::EmptyId("product"));
        }
        if !self.cost_per_unit.is_finite() || self.cost_per_unit < 0.0 {
            return Err(InputError::InvalidCost {
                product: self.id.clone(),
                cost: self.cost_per_unit,
            });
        }
        for (nutrient, &fraction) in self.content.iter() {
            if !(0.0..=1.0).contains(&fraction) {
                return Err(InputError::InvalidContent {
                    product: self.id.clone(),
                    nutrient,
                    fraction,
                });
            }
        }
        let min_ok = self.min_dose.is_finite() && self.min_dose >= 0.0;
        let cap_ok = self
            .cap
            .is_none_or(|cap| cap.is_finite() && cap >= 0.0 && cap >= self.min_dose);
        if !min_ok || !cap_ok {
            return Err(InputError::InvalidDoseLimits {
                product: self.id.clone(),
                min_dose: self.min_dose,
                cap: self.cap,
            });
        }
        Ok(())
    }
}

/// Ordered set of products; the order fixes the order of blend variables
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductRegistry {
    products: Vec<Product>,
}

impl ProductRegistry {
    pub fn new(products: Vec<Product>) -> Self {
        Self { products }
    }

    pub fn push(&mut self, product: Product) {
        self.products.push(product);
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn get(&self, id: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.id == id)
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Product> {
        self.products.iter()
    }

    pub fn validate(&self) -> Result<(), InputError> {
        if self.products.is_empty() {
            return Err(InputError::EmptyRegistry);
        }
        let mut seen = HashSet::new();
        for product in &self.products {
            product.validate()?;
            if !seen.insert(product.id.as_str()) {
                return Err(InputError::DuplicateProduct(product.id.clone()));
            }
        }
        Ok(())
    }
}

impl FromIterator<Product> for ProductRegistry {
    fn from_iter<I: IntoIterator<Item = Product>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a ProductRegistry {
    type Item = &'a Product;
    type IntoIter = std::slice::Iter<'a, Product>;

    fn into_iter(self) -> Self::IntoIter {
        self.products.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urea() -> Product {
        Product::new("urea", 0.55, NutrientVector::new(0.46, 0.0, 0.0))
    }

    #[test]
    fn test_valid_registry() {
        let registry: ProductRegistry = vec![
            urea(),
            Product::new("kcl", 0.6, NutrientVector::new(0.0, 0.0, 0.6)).with_cap(200.0),
        ]
        .into_iter()
        .collect();
        assert!(registry.validate().is_ok());
        assert_eq!(registry.get("kcl").and_then(|p| p.cap), Some(200.0));
        assert_eq!(registry.get("urea").map(|p| p.supplies(Nutrient::N, 100.0)), Some(46.0));
    }

    #[test]
    fn test_empty_registry_rejected() {
        assert_eq!(ProductRegistry::default().validate(), Err(InputError::EmptyRegistry));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let registry = ProductRegistry::new(vec![urea(), urea()]);
        assert_eq!(
            registry.validate(),
            Err(InputError::DuplicateProduct("urea".to_string()))
        );
    }

    #[test]
    fn test_negative_cost_rejected() {
        let mut product = urea();
        product.cost_per_unit = -1.0;
        assert!(matches!(product.validate(), Err(InputError::InvalidCost { .. })));
    }

    #[test]
    fn test_fraction_above_one_rejected() {
        // 46 looks like a percentage typed into a fraction column
        let product = Product::new("urea", 0.55, NutrientVector::new(46.0, 0.0, 0.0));
        assert!(matches!(
            product.validate(),
            Err(InputError::InvalidContent { nutrient: Nutrient::N, .. })
        ));
    }

    #[test]
    fn test_min_dose_above_cap_rejected() {
        let product = urea().with_min_dose(50.0).with_cap(20.0);
        assert!(matches!(product.validate(), Err(InputError::InvalidDoseLimits { .. })));
    }

    #[test]
    fn test_nan_content_rejected() {
        let product = Product::new("odd", 1.0, NutrientVector::new(f64::NAN, 0.0, 0.0));
        assert!(product.validate().is_err());
    }
}

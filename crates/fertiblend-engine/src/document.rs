use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::nutrient::{Nutrient, NutrientVector};
use crate::product::{Product, ProductRegistry};
use crate::requirement::{FieldRequirement, Target};
use crate::settings::Settings;

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid input document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Product {0} needs exactly one of cost_per_unit or price_per_ton")]
    Price(String),
    #[error("Product {0} needs exactly one of content or percent")]
    Content(String),
    #[error("Field {field} refers to unknown crop {crop}")]
    UnknownCrop { field: String, crop: String },
    #[error("Field {0} has no nutrient targets")]
    NoTargets(String),
}

/// A batch as written on disk: catalog, crop table, fields and settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InputDocument {
    #[serde(default)]
    pub settings: Option<Settings>,
    pub products: Vec<ProductSpec>,
    /// Crop name to its nutrient targets
    #[serde(default)]
    pub crops: BTreeMap<String, NutrientVector<Option<TargetSpec>>>,
    pub fields: Vec<FieldSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProductSpec {
    pub id: String,
    /// Currency per kg
    pub cost_per_unit: Option<f64>,
    /// Currency per metric ton
    pub price_per_ton: Option<f64>,
    /// Mass fractions
    pub content: Option<NutrientVector<f64>>,
    /// Percent of mass, as printed on the bag
    pub percent: Option<NutrientVector<f64>>,
    #[serde(default)]
    pub min_dose: f64,
    pub cap: Option<f64>,
}

/// A nutrient target; a bare number is a point target
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum TargetSpec {
    Point(f64),
    Full(Target),
}

impl From<TargetSpec> for Target {
    fn from(spec: TargetSpec) -> Self {
        match spec {
            TargetSpec::Point(t) => Target::Exact(t),
            TargetSpec::Full(t) => t,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FieldSpec {
    pub id: String,
    pub area_ha: Option<f64>,
    pub crop: Option<String>,
    /// Overrides the crop's target nutrient by nutrient
    #[serde(default)]
    pub targets: NutrientVector<Option<TargetSpec>>,
}

impl InputDocument {
    pub fn from_json(json: &str) -> Result<Self, DocumentError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, DocumentError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| DocumentError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn settings(&self) -> Settings {
        self.settings.clone().unwrap_or_default()
    }

    pub fn registry(&self) -> Result<ProductRegistry, DocumentError> {
        self.products.iter().map(ProductSpec::to_product).collect()
    }

    pub fn requirements(&self) -> Result<Vec<FieldRequirement>, DocumentError> {
        self.fields.iter().map(|f| self.resolve(f)).collect()
    }

    fn resolve(&self, field: &FieldSpec) -> Result<FieldRequirement, DocumentError> {
        let base = match &field.crop {
            Some(crop) => *self.crops.get(crop).ok_or_else(|| DocumentError::UnknownCrop {
                field: field.id.clone(),
                crop: crop.clone(),
            })?,
            None => NutrientVector::default(),
        };

        let targets = NutrientVector::from_fn(|n: Nutrient| field.targets[n].or(base[n]).map(Target::from));
        if targets.iter().all(|(_, t)| t.is_none()) {
            return Err(DocumentError::NoTargets(field.id.clone()));
        }
        Ok(FieldRequirement {
            field_id: field.id.clone(),
            area_ha: field.area_ha,
            crop: field.crop.clone(),
            targets,
        })
    }
}

impl ProductSpec {
    fn to_product(&self) -> Result<Product, DocumentError> {
        let cost_per_unit = match (self.cost_per_unit, self.price_per_ton) {
            (Some(cost), None) => cost,
            (None, Some(price)) => price / 1000.0,
            _ => return Err(DocumentError::Price(self.id.clone())),
        };
        let content = match (self.content, self.percent) {
            (Some(fraction), None) => fraction,
            (None, Some(percent)) => percent.map(|_, &p| p / 100.0),
            _ => return Err(DocumentError::Content(self.id.clone())),
        };
        Ok(Product {
            id: self.id.clone(),
            cost_per_unit,
            content,
            min_dose: self.min_dose,
            cap: self.cap,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"{
        "settings": {"max_nitrogen": 250},
        "products": [
            {"id": "urea", "price_per_ton": 550, "percent": {"N": 46}},
            {"id": "map", "cost_per_unit": 0.8, "content": {"N": 0.11, "P2O5": 0.52}, "cap": 300}
        ],
        "crops": {
            "maize": {"N": 120, "P2O5": {"at_least": 40}}
        },
        "fields": [
            {"id": "P1", "area_ha": 12.5, "crop": "maize"},
            {"id": "P2", "crop": "maize", "targets": {"N": {"range": {"min": 80, "max": 100}}}},
            {"id": "P3", "targets": {"K2O": 30}}
        ]
    }"#;

    #[test]
    fn test_products_are_normalized() {
        let doc = InputDocument::from_json(DOC).unwrap();
        let registry = doc.registry().unwrap();

        let urea = registry.get("urea").unwrap();
        assert!((urea.cost_per_unit - 0.55).abs() < 1e-12);
        assert!((urea.content.n - 0.46).abs() < 1e-12);
        assert_eq!(registry.get("map").unwrap().cap, Some(300.0));
        assert_eq!(doc.settings().max_nitrogen, Some(250.0));
    }

    #[test]
    fn test_crop_targets_with_field_overrides() {
        let doc = InputDocument::from_json(DOC).unwrap();
        let fields = doc.requirements().unwrap();

        assert_eq!(fields[0].target(Nutrient::N), Some(Target::Exact(120.0)));
        assert_eq!(fields[0].area_ha, Some(12.5));
        assert_eq!(fields[1].target(Nutrient::N), Some(Target::Range { min: 80.0, max: 100.0 }));
        assert_eq!(fields[1].target(Nutrient::P2O5), Some(Target::AtLeast(40.0)));
        assert_eq!(fields[2].target(Nutrient::K2O), Some(Target::Exact(30.0)));
        assert_eq!(fields[2].target(Nutrient::N), None);
    }

    #[test]
    fn test_unknown_crop() {
        let doc = InputDocument::from_json(
            r#"{"products": [], "fields": [{"id": "P1", "crop": "rice"}]}"#,
        )
        .unwrap();
        assert!(matches!(
            doc.requirements(),
            Err(DocumentError::UnknownCrop { crop, .. }) if crop == "rice"
        ));
    }

    #[test]
    fn test_field_without_targets() {
        let doc = InputDocument::from_json(r#"{"products": [], "fields": [{"id": "P1"}]}"#).unwrap();
        assert!(matches!(doc.requirements(), Err(DocumentError::NoTargets(_))));
    }

    #[test]
    fn test_crop_with_empty_targets() {
        let doc = InputDocument::from_json(
            r#"{"products": [], "crops": {"fallow": {}}, "fields": [{"id": "P1", "crop": "fallow"}]}"#,
        )
        .unwrap();
        assert!(matches!(doc.requirements(), Err(DocumentError::NoTargets(id)) if id == "P1"));
    }

    #[test]
    fn test_ambiguous_price() {
        let doc = InputDocument::from_json(
            r#"{"products": [{"id": "x", "cost_per_unit": 1, "price_per_ton": 1000, "content": {"N": 0.2}}], "fields": []}"#,
        )
        .unwrap();
        assert!(matches!(doc.registry(), Err(DocumentError::Price(id)) if id == "x"));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            InputDocument::from_json("{\"products\": 3}"),
            Err(DocumentError::Json(_))
        ));
    }
}

use serde::{Deserialize, Serialize};

use crate::error::InputError;
use crate::nutrient::{Nutrient, NutrientVector};
use crate::settings::TargetPolicy;

/// Requested amount of one nutrient (kg per unit area)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    /// A point target; treated as a minimum unless the policy is `Exact`
    Exact(f64),
    AtLeast(f64),
    Range { min: f64, max: f64 },
}

/// Bounds actually imposed on a nutrient row after policy and tolerance
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RequiredBounds {
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// Emitted as a single equality row
    pub exact: bool,
}

impl Target {
    /// The lower end of the target as declared, before any tolerance
    pub fn nominal_min(&self) -> f64 {
        match *self {
            Target::Exact(t) | Target::AtLeast(t) => t,
            Target::Range { min, .. } => min,
        }
    }

    pub fn nominal_max(&self) -> Option<f64> {
        match *self {
            Target::Range { max, .. } => Some(max),
            Target::Exact(_) | Target::AtLeast(_) => None,
        }
    }

    /// Translate the target into row bounds.
    ///
    /// `tolerance` relaxes lower bounds relatively (0.02 accepts 98% of the
    /// target). A zero requirement imposes nothing, whatever the policy.
    pub fn required_bounds(&self, policy: TargetPolicy, tolerance: f64) -> RequiredBounds {
        let relax = |t: f64| Some(t * (1.0 - tolerance)).filter(|&v| v > 0.0);
        match (*self, policy) {
            (Target::Exact(t), _) if t == 0.0 => RequiredBounds::default(),
            (Target::Range { min, max }, _) if min == 0.0 && max == 0.0 => RequiredBounds::default(),
            (Target::Exact(t), TargetPolicy::Exact) => RequiredBounds {
                min: Some(t),
                max: Some(t),
                exact: true,
            },
            (Target::Exact(t), TargetPolicy::Minimum) | (Target::AtLeast(t), _) => RequiredBounds {
                min: relax(t),
                max: None,
                exact: false,
            },
            (Target::Range { min, max }, _) => RequiredBounds {
                min: relax(min),
                max: Some(max),
                exact: false,
            },
        }
    }

    fn check(&self) -> Result<(), String> {
        let valid = |v: f64| v.is_finite() && v >= 0.0;
        match *self {
            Target::Exact(t) | Target::AtLeast(t) if !valid(t) => Err(format!("{} is not a non-negative amount", t)),
            Target::Range { min, max } if !valid(min) || !valid(max) => {
                Err(format!("range [{}, {}] has a negative or non-finite end", min, max))
            }
            Target::Range { min, max } if min > max => Err(format!("minimum {} exceeds maximum {}", min, max)),
            _ => Ok(()),
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::Exact(t) => write!(f, "={:.2}", t),
            Target::AtLeast(t) => write!(f, ">={:.2}", t),
            Target::Range { min, max } => write!(f, "[{:.2}, {:.2}]", min, max),
        }
    }
}

/// Nutrient targets of a single field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRequirement {
    pub field_id: String,
    /// Hectares; when present the plan also reports whole-field totals
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area_ha: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crop: Option<String>,
    #[serde(default)]
    pub targets: NutrientVector<Option<Target>>,
}

impl FieldRequirement {
    pub fn new(field_id: impl Into<String>) -> Self {
        Self {
            field_id: field_id.into(),
            area_ha: None,
            crop: None,
            targets: NutrientVector::default(),
        }
    }

    pub fn with_target(mut self, nutrient: Nutrient, target: Target) -> Self {
        self.targets[nutrient] = Some(target);
        self
    }

    pub fn with_area(mut self, area_ha: f64) -> Self {
        self.area_ha = Some(area_ha);
        self
    }

    pub fn target(&self, nutrient: Nutrient) -> Option<Target> {
        self.targets[nutrient]
    }

    pub fn validate(&self) -> Result<(), InputError> {
        if self.field_id.trim().is_empty() {
            return Err(InputError::EmptyId("field"));
        }
        if let Some(area) = self.area_ha {
            if !area.is_finite() || area <= 0.0 {
                return Err(InputError::InvalidArea {
                    field: self.field_id.clone(),
                    area,
                });
            }
        }
        for (nutrient, target) in self.targets.iter() {
            if let Some(target) = target {
                target.check().map_err(|reason| InputError::InvalidTarget {
                    field: self.field_id.clone(),
                    nutrient,
                    reason,
                })?;
            }
        }
        Ok(())
    }
}

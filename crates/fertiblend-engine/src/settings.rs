use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::InputError;

/// How point targets are turned into rows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetPolicy {
    /// Meeting or exceeding the target is acceptable; excess is reported as surplus
    #[default]
    Minimum,
    /// The blend must hit the target exactly
    Exact,
}

/// Knobs shared by every field of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub target_policy: TargetPolicy,
    /// Relative relaxation of minimum targets, in [0, 1)
    pub tolerance: f64,
    /// Ceiling on total nitrogen applied (kg N per unit area)
    pub max_nitrogen: Option<f64>,
    /// Ceiling on total product applied (kg per unit area)
    pub max_mix: Option<f64>,
    /// Cost of spreading one kg of any product
    pub application_cost: f64,
    /// Decimals kept in displayed quantities
    pub display_precision: u32,
    /// Per-solve time limit in milliseconds, none to wait indefinitely
    pub timeout_ms: Option<u64>,
    pub solver_retries: usize,
    /// Solve fields on the rayon thread pool
    pub parallel: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            target_policy: TargetPolicy::Minimum,
            tolerance: 0.0,
            max_nitrogen: None,
            max_mix: None,
            application_cost: 0.0,
            display_precision: 2,
            timeout_ms: Some(10_000),
            solver_retries: 1,
            parallel: true,
        }
    }
}

impl Settings {
    pub fn with_target_policy(mut self, policy: TargetPolicy) -> Self {
        self.target_policy = policy;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_max_nitrogen(mut self, max: Option<f64>) -> Self {
        self.max_nitrogen = max;
        self
    }

    pub fn with_max_mix(mut self, max: Option<f64>) -> Self {
        self.max_mix = max;
        self
    }

    pub fn with_application_cost(mut self, cost: f64) -> Self {
        self.application_cost = cost;
        self
    }

    pub fn with_display_precision(mut self, decimals: u32) -> Self {
        self.display_precision = decimals;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout_ms = timeout.map(|t| t.as_millis().try_into().unwrap_or(u64::MAX));
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> Result<(), InputError> {
        if !(0.0..1.0).contains(&self.tolerance) {
            return Err(InputError::InvalidSetting {
                name: "tolerance",
                reason: format!("{} is outside [0, 1)", self.tolerance),
            });
        }
        for (name, limit) in [("max_nitrogen", self.max_nitrogen), ("max_mix", self.max_mix)] {
            if let Some(v) = limit {
                if !v.is_finite() || v < 0.0 {
                    return Err(InputError::InvalidSetting {
                        name,
                        reason: format!("{} is not a non-negative amount", v),
                    });
                }
            }
        }
        if !self.application_cost.is_finite() || self.application_cost < 0.0 {
            return Err(InputError::InvalidSetting {
                name: "application_cost",
                reason: format!("{} is not a non-negative cost", self.application_cost),
            });
        }
        if self.display_precision > 12 {
            return Err(InputError::InvalidSetting {
                name: "display_precision",
                reason: format!("{} decimals is more than f64 can show", self.display_precision),
            });
        }
        if self.timeout_ms == Some(0) {
            return Err(InputError::InvalidSetting {
                name: "timeout_ms",
                reason: "a zero time limit can never be met".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.target_policy, TargetPolicy::Minimum);
        assert_eq!(settings.timeout(), Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_out_of_range_values_rejected() {
        assert!(Settings::default().with_tolerance(1.0).validate().is_err());
        assert!(Settings::default().with_max_mix(Some(-1.0)).validate().is_err());
        assert!(Settings::default().with_application_cost(f64::NAN).validate().is_err());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"max_nitrogen": 250, "tolerance": 0.02}"#).unwrap();
        assert_eq!(settings.max_nitrogen, Some(250.0));
        assert_eq!(settings.tolerance, 0.02);
        assert_eq!(settings.display_precision, 2);
        assert!(settings.parallel);
    }
}

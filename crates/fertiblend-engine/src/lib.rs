//! Least-cost N-P2O5-K2O fertilizer blends per field.
//!
//! Each field's nutrient targets become a small linear program over the
//! product catalog; the solution is read back as doses, costs and
//! per-nutrient coverage, or as a diagnosis of why no blend exists.
//!
//! ```ignore
//! let doc = InputDocument::load("farm.json")?;
//! let engine = BlendEngine::new(doc.settings());
//! let batch = engine.optimize(&doc.registry()?, &doc.requirements()?)?;
//! ```

mod builder;
mod diagnostics;
mod document;
mod engine;
mod error;
mod interpreter;
mod nutrient;
mod product;
mod requirement;
mod scenario;
mod settings;

pub use builder::{BlendModel, BlendModelBuilder, RowKind};
pub use diagnostics::{Precheck, Shortfall, precheck, reachable};
pub use document::{DocumentError, FieldSpec, InputDocument, ProductSpec, TargetSpec};
pub use engine::{BatchResult, BlendEngine};
pub use error::InputError;
pub use interpreter::{BlendPlan, FieldOutcome, NutrientCoverage, ProductDose, ResultInterpreter};
pub use nutrient::{Nutrient, NutrientVector, UnknownNutrient};
pub use product::{Product, ProductRegistry};
pub use requirement::{FieldRequirement, RequiredBounds, Target};
pub use scenario::{FieldComparison, ProductDelta, ScenarioComparison, compare};
pub use settings::{Settings, TargetPolicy};

pub use fertiblend_solver::{ConstraintViolation, Solution, SolutionStatus, Solver};

//! Inference parameter resolution.
//!
//! [`ParameterSelector::select`] deep-merges four layers in increasing
//! precedence:
//!
//! 1. model-family base parameters
//! 2. use-case overrides
//! 3. named profile overrides
//! 4. caller-supplied custom parameters
//!
//! and then applies [`apply_safety`] unconditionally. The clamps run last,
//! so no custom parameter can lift a medical temperature above 0.3 or push
//! `max_tokens` past the environment ceiling.

pub mod catalog;
pub mod format;
pub mod merge;
pub mod safety;

pub use catalog::{MEDICAL_TAG, ParameterCatalog, UseCaseParams};
pub use format::{Formatter, format_for_family, formatter_for};
pub use merge::deep_merge;
pub use safety::{Environment, apply_safety};

use serde_json::Value;
use tracing::warn;

use crate::types::{Params, ResolutionRequest};

/// Resolves the generic parameter set for a request.
pub struct ParameterSelector {
    catalog: ParameterCatalog,
    environment: Environment,
}

impl ParameterSelector {
    pub fn new(catalog: ParameterCatalog, environment: Environment) -> Self {
        Self {
            catalog,
            environment,
        }
    }

    pub fn catalog(&self) -> &ParameterCatalog {
        &self.catalog
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// Merge all layers for `request`, then clamp.
    ///
    /// Unknown families, use cases, and profiles contribute nothing; an
    /// unknown profile is logged since it usually means a caller typo.
    pub fn select(&self, request: &ResolutionRequest) -> Params {
        let mut params = Params::new();

        if let Some(base) = self.catalog.families.get(&request.model_family) {
            deep_merge(&mut params, base);
        }
        if let Some(use_case) = self.catalog.use_cases.get(&request.use_case) {
            deep_merge(&mut params, &use_case.overrides);
        }
        if let Some(profile) = &request.profile {
            match self.catalog.profiles.get(profile) {
                Some(overrides) => deep_merge(&mut params, overrides),
                None => warn!(profile = %profile, "unknown parameter profile, ignoring"),
            }
        }
        if let Some(custom) = &request.custom_params {
            deep_merge(&mut params, custom);
        }

        self.apply_safety(&mut params, &request.use_case);
        params
    }

    /// Governance clamps for `use_case` in this selector's environment.
    pub fn apply_safety(&self, params: &mut Params, use_case: &str) {
        apply_safety(params, self.catalog.is_medical(use_case), self.environment);
    }

    /// Render `params` in `family`'s wire shape.
    pub fn format_for_family(&self, family: &str, params: &Params) -> Value {
        format_for_family(family, params)
    }
}

//! Layered parameter definitions: family bases, use-case overrides, profiles.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::merge::deep_merge;
use crate::types::Params;

/// Tag marking a use case as governed by the medical safety clamps.
pub const MEDICAL_TAG: &str = "medical";

/// Overrides and governance tags for one use case.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UseCaseParams {
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub overrides: Params,
}

/// The three configurable parameter layers below caller-supplied values.
///
/// Loadable from TOML/JSON; [`ParameterCatalog::builtin`] supplies the
/// defaults and [`ParameterCatalog::extend`] layers deployment overrides on top.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParameterCatalog {
    #[serde(default)]
    pub families: HashMap<String, Params>,
    #[serde(default)]
    pub use_cases: HashMap<String, UseCaseParams>,
    #[serde(default)]
    pub profiles: HashMap<String, Params>,
}

impl ParameterCatalog {
    /// Built-in families (claude, titan, llama), clinical and general use
    /// cases, and the balanced/creative/precise/concise profiles.
    pub fn builtin() -> Self {
        let mut catalog = Self::default();

        catalog.families.insert(
            "claude".into(),
            object(json!({"max_tokens": 4096, "temperature": 0.7, "top_p": 0.9, "stop_sequences": []})),
        );
        catalog.families.insert(
            "titan".into(),
            object(json!({"max_tokens": 3072, "temperature": 0.7, "top_p": 0.9})),
        );
        catalog.families.insert(
            "llama".into(),
            object(json!({"max_tokens": 2048, "temperature": 0.6, "top_p": 0.9})),
        );

        catalog.use_cases.insert(
            "medical_diagnosis".into(),
            UseCaseParams {
                tags: vec![MEDICAL_TAG.into()],
                overrides: object(json!({"temperature": 0.1, "min_confidence": 0.95})),
            },
        );
        catalog.use_cases.insert(
            "medical_summary".into(),
            UseCaseParams {
                tags: vec![MEDICAL_TAG.into()],
                overrides: object(json!({"temperature": 0.2, "max_tokens": 8192})),
            },
        );
        catalog.use_cases.insert(
            "patient_communication".into(),
            UseCaseParams {
                tags: vec![MEDICAL_TAG.into()],
                overrides: object(json!({"temperature": 0.3})),
            },
        );
        catalog.use_cases.insert(
            "general_chat".into(),
            UseCaseParams {
                tags: Vec::new(),
                overrides: object(json!({"temperature": 0.7})),
            },
        );
        catalog.use_cases.insert(
            "debug".into(),
            UseCaseParams {
                tags: Vec::new(),
                overrides: object(json!({"temperature": 0.0, "max_tokens": 512})),
            },
        );

        catalog.profiles.insert(
            "balanced".into(),
            object(json!({"temperature": 0.5, "top_p": 0.9})),
        );
        catalog.profiles.insert(
            "creative".into(),
            object(json!({"temperature": 0.9, "top_p": 0.95})),
        );
        catalog.profiles.insert(
            "precise".into(),
            object(json!({"temperature": 0.1, "top_p": 0.5})),
        );
        catalog
            .profiles
            .insert("concise".into(), object(json!({"max_tokens": 1024})));

        catalog
    }

    /// Layer `other` over this catalog. Maps deep-merge; tags are unioned.
    pub fn extend(mut self, other: ParameterCatalog) -> Self {
        for (family, params) in other.families {
            deep_merge(self.families.entry(family).or_default(), &params);
        }
        for (profile, params) in other.profiles {
            deep_merge(self.profiles.entry(profile).or_default(), &params);
        }
        for (use_case, incoming) in other.use_cases {
            let entry = self.use_cases.entry(use_case).or_default();
            deep_merge(&mut entry.overrides, &incoming.overrides);
            for tag in incoming.tags {
                if !entry.tags.contains(&tag) {
                    entry.tags.push(tag);
                }
            }
        }
        self
    }

    /// Whether `use_case` is subject to medical governance.
    ///
    /// Tagged use cases and any use case named `medical_*` qualify, so an
    /// untagged clinical use case can't slip past the clamps.
    pub fn is_medical(&self, use_case: &str) -> bool {
        use_case.starts_with("medical_")
            || self
                .use_cases
                .get(use_case)
                .is_some_and(|u| u.tags.iter().any(|t| t == MEDICAL_TAG))
    }
}

fn object(value: serde_json::Value) -> Params {
    match value {
        serde_json::Value::Object(map) => map,
        _ => Params::new(),
    }
}

//! Translation of generic parameters into per-family wire shapes.
//!
//! Formatters are pure: they read the generic set, fill family defaults for
//! anything missing, and drop governance-only keys (`safety_mode`,
//! `min_confidence`) that no provider understands.

use serde_json::{Value, json};

use crate::types::Params;

/// Converts a generic parameter set into one model family's request body.
pub trait Formatter: Send + Sync {
    /// Family this formatter serves (e.g. "claude").
    fn family(&self) -> &str;

    fn format(&self, params: &Params) -> Value;
}

/// Anthropic Messages shape (`anthropic_version`, `max_tokens`, `stop_sequences`).
pub struct AnthropicFormatter;

impl Formatter for AnthropicFormatter {
    fn family(&self) -> &str {
        "claude"
    }

    fn format(&self, params: &Params) -> Value {
        let mut body = json!({
            "anthropic_version": "bedrock-2023-05-31",
            "max_tokens": get_or(params, "max_tokens", json!(4096)),
            "temperature": get_or(params, "temperature", json!(0.7)),
            "top_p": get_or(params, "top_p", json!(0.9)),
            "stop_sequences": get_or(params, "stop_sequences", json!([])),
        });
        if let Some(top_k) = params.get("top_k") {
            body["top_k"] = top_k.clone();
        }
        body
    }
}

/// Amazon Titan shape (`textGenerationConfig` with camelCase keys).
pub struct TitanFormatter;

impl Formatter for TitanFormatter {
    fn family(&self) -> &str {
        "titan"
    }

    fn format(&self, params: &Params) -> Value {
        json!({
            "textGenerationConfig": {
                "maxTokenCount": get_or(params, "max_tokens", json!(3072)),
                "temperature": get_or(params, "temperature", json!(0.7)),
                "topP": get_or(params, "top_p", json!(0.9)),
                "stopSequences": get_or(params, "stop_sequences", json!([])),
            }
        })
    }
}

/// Meta Llama shape (`max_gen_len`).
pub struct LlamaFormatter;

impl Formatter for LlamaFormatter {
    fn family(&self) -> &str {
        "llama"
    }

    fn format(&self, params: &Params) -> Value {
        json!({
            "max_gen_len": get_or(params, "max_tokens", json!(2048)),
            "temperature": get_or(params, "temperature", json!(0.6)),
            "top_p": get_or(params, "top_p", json!(0.9)),
        })
    }
}

/// Unknown families: the generic set minus governance keys, with defaults.
pub struct GenericFormatter;

impl Formatter for GenericFormatter {
    fn family(&self) -> &str {
        "generic"
    }

    fn format(&self, params: &Params) -> Value {
        let mut body = params.clone();
        body.remove("safety_mode");
        body.remove("min_confidence");
        body.entry("max_tokens").or_insert(json!(4096));
        body.entry("temperature").or_insert(json!(0.7));
        body.entry("top_p").or_insert(json!(1.0));
        Value::Object(body)
    }
}

/// Formatter for `family`, matched by prefix (`"claude-3"` → claude).
pub fn formatter_for(family: &str) -> &'static dyn Formatter {
    let family = family.to_ascii_lowercase();
    if family.starts_with("claude") || family.starts_with("anthropic") {
        &AnthropicFormatter
    } else if family.starts_with("titan") || family.starts_with("amazon") {
        &TitanFormatter
    } else if family.starts_with("llama") || family.starts_with("meta") {
        &LlamaFormatter
    } else {
        &GenericFormatter
    }
}

/// Render `params` in `family`'s wire shape.
pub fn format_for_family(family: &str, params: &Params) -> Value {
    formatter_for(family).format(params)
}

fn get_or(params: &Params, key: &str, default: Value) -> Value {
    params.get(key).cloned().unwrap_or(default)
}

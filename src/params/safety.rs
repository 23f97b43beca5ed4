//! Governance clamps applied after every parameter merge.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::HeimdallError;
use crate::types::Params;

/// Highest temperature permitted for medical use cases.
pub const MEDICAL_MAX_TEMPERATURE: f64 = 0.3;
/// Lowest minimum-confidence threshold permitted for medical use cases.
pub const MEDICAL_MIN_CONFIDENCE: f64 = 0.9;
/// Value `safety_mode` is forced to for medical use cases.
pub const SAFETY_MODE_MAXIMUM: &str = "maximum";

/// Deployment environment; decides the `max_tokens` ceiling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Production,
    Staging,
    #[default]
    Development,
}

impl Environment {
    pub fn max_tokens_cap(&self) -> u64 {
        match self {
            Self::Production => 16_384,
            Self::Staging | Self::Development => 8_192,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Production => "production",
            Self::Staging => "staging",
            Self::Development => "development",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = HeimdallError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "staging" | "stage" => Ok(Self::Staging),
            "development" | "dev" => Ok(Self::Development),
            other => Err(HeimdallError::Configuration(format!(
                "unknown environment '{other}'"
            ))),
        }
    }
}

/// Clamp `params` in place.
///
/// Medical use cases get `temperature <= 0.3` (set to 0.3 when missing or
/// non-numeric), `safety_mode = "maximum"`, and any `min_confidence` raised
/// to at least 0.9. Every use case gets `max_tokens` capped at the
/// environment ceiling. Runs after all merges, so caller values cannot
/// escape it.
pub fn apply_safety(params: &mut Params, medical: bool, environment: Environment) {
    if medical {
        let temperature = params
            .get("temperature")
            .and_then(Value::as_f64)
            .map_or(MEDICAL_MAX_TEMPERATURE, |t| t.min(MEDICAL_MAX_TEMPERATURE));
        params.insert("temperature".into(), json!(temperature));

        params.insert("safety_mode".into(), json!(SAFETY_MODE_MAXIMUM));

        if let Some(threshold) = params.get("min_confidence") {
            let raised = threshold
                .as_f64()
                .map_or(MEDICAL_MIN_CONFIDENCE, |c| c.max(MEDICAL_MIN_CONFIDENCE));
            params.insert("min_confidence".into(), json!(raised));
        }
    }

    let cap = environment.max_tokens_cap();
    if let Some(max_tokens) = params.get("max_tokens") {
        let clamped = match max_tokens.as_u64() {
            Some(m) => m.min(cap),
            // fractional or negative budgets: floor, at least one token
            None => max_tokens
                .as_f64()
                .map_or(cap, |m| m.floor().clamp(1.0, cap as f64) as u64),
        };
        params.insert("max_tokens".into(), json!(clamped));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(value: Value) -> Params {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn medical_temperature_is_clamped() {
        let mut p = params(json!({"temperature": 0.9}));
        apply_safety(&mut p, true, Environment::Development);
        assert_eq!(p["temperature"], json!(0.3));
        assert_eq!(p["safety_mode"], json!("maximum"));
    }

    #[test]
    fn medical_low_temperature_is_kept() {
        let mut p = params(json!({"temperature": 0.1}));
        apply_safety(&mut p, true, Environment::Development);
        assert_eq!(p["temperature"], json!(0.1));
    }

    #[test]
    fn medical_non_numeric_temperature_is_replaced() {
        let mut p = params(json!({"temperature": "spicy"}));
        apply_safety(&mut p, true, Environment::Development);
        assert_eq!(p["temperature"], json!(0.3));
    }

    #[test]
    fn medical_safety_mode_cannot_be_lowered() {
        let mut p = params(json!({"safety_mode": "off"}));
        apply_safety(&mut p, true, Environment::Development);
        assert_eq!(p["safety_mode"], json!("maximum"));
    }

    #[test]
    fn min_confidence_is_raised_only_when_configured() {
        let mut with = params(json!({"min_confidence": 0.5}));
        apply_safety(&mut with, true, Environment::Development);
        assert_eq!(with["min_confidence"], json!(0.9));

        let mut without = Params::new();
        apply_safety(&mut without, true, Environment::Development);
        assert!(!without.contains_key("min_confidence"));
    }

    #[test]
    fn non_medical_values_are_untouched() {
        let mut p = params(json!({"temperature": 0.9, "safety_mode": "standard"}));
        apply_safety(&mut p, false, Environment::Production);
        assert_eq!(p["temperature"], json!(0.9));
        assert_eq!(p["safety_mode"], json!("standard"));
    }

    #[test]
    fn max_tokens_capped_per_environment() {
        let mut prod = params(json!({"max_tokens": 20000}));
        apply_safety(&mut prod, false, Environment::Production);
        assert_eq!(prod["max_tokens"], json!(16384));

        let mut dev = params(json!({"max_tokens": 20000}));
        apply_safety(&mut dev, false, Environment::Staging);
        assert_eq!(dev["max_tokens"], json!(8192));

        let mut small = params(json!({"max_tokens": 100}));
        apply_safety(&mut small, false, Environment::Production);
        assert_eq!(small["max_tokens"], json!(100));
    }

    #[test]
    fn odd_max_tokens_are_not_raised_to_the_cap() {
        let mut fractional = params(json!({"max_tokens": 100.5}));
        apply_safety(&mut fractional, false, Environment::Production);
        assert_eq!(fractional["max_tokens"], json!(100));

        let mut negative = params(json!({"max_tokens": -5}));
        apply_safety(&mut negative, false, Environment::Production);
        assert_eq!(negative["max_tokens"], json!(1));

        let mut huge = params(json!({"max_tokens": 1e9}));
        apply_safety(&mut huge, false, Environment::Development);
        assert_eq!(huge["max_tokens"], json!(8192));

        let mut text = params(json!({"max_tokens": "lots"}));
        apply_safety(&mut text, false, Environment::Development);
        assert_eq!(text["max_tokens"], json!(8192));
    }

    #[test]
    fn environment_parses_aliases() {
        assert_eq!("PROD".parse::<Environment>().unwrap(), Environment::Production);
        assert_eq!("staging".parse::<Environment>().unwrap(), Environment::Staging);
        assert!("moon".parse::<Environment>().is_err());
    }
}

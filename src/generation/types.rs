use std::fmt;

use serde::de::{self, Unexpected};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Optional overrides supplied by the caller. Absent or JSON-falsy values
/// (`null`, `false`, `""`, `0`) fall back to the configured defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationParameters {
    #[serde(
        default,
        deserialize_with = "lenient_length",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_length: Option<u32>,
    #[serde(
        default,
        deserialize_with = "lenient_float",
        skip_serializing_if = "Option::is_none"
    )]
    pub temperature: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient_float",
        skip_serializing_if = "Option::is_none"
    )]
    pub top_p: Option<f64>,
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => true,
        Value::String(s) => s.is_empty(),
        Value::Number(n) => n.as_f64() == Some(0.0),
        _ => false,
    }
}

fn unexpected(value: &Value) -> Unexpected<'_> {
    match value {
        Value::Bool(b) => Unexpected::Bool(*b),
        Value::String(s) => Unexpected::Str(s),
        Value::Number(n) => match n.as_f64() {
            Some(f) => Unexpected::Float(f),
            None => Unexpected::Other("number"),
        },
        Value::Array(_) => Unexpected::Seq,
        Value::Object(_) => Unexpected::Map,
        Value::Null => Unexpected::Unit,
    }
}

/// Accepts non-negative integers, including integral floats such as `50.0`.
fn lenient_length<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    if is_falsy(&value) {
        return Ok(None);
    }
    let length = match &value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && *f > 0.0 && *f <= f64::from(u32::MAX))
                .map(|f| f as u64)
        }),
        _ => None,
    };
    length
        .and_then(|v| u32::try_from(v).ok())
        .map(Some)
        .ok_or_else(|| de::Error::invalid_value(unexpected(&value), &"a positive integer"))
}

fn lenient_float<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    if is_falsy(&value) {
        return Ok(None);
    }
    value
        .as_f64()
        .map(Some)
        .ok_or_else(|| de::Error::invalid_type(unexpected(&value), &"a number"))
}

/// Fully populated request, serialized as the model host's wire body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub max_length: u32,
    pub temperature: f64,
    pub top_p: f64,
}

impl GenerationRequest {
    pub fn parameters(&self) -> GenerationParameters {
        GenerationParameters {
            max_length: Some(self.max_length),
            temperature: Some(self.temperature),
            top_p: Some(self.top_p),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FallbackReason {
    UnexpectedShape,
    Exhausted,
}

/// What a generation resolves to. Failures carry their diagnostic inside the
/// text so callers with a single rendering path can always display it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GenerationResult {
    Ok { text: String },
    Fallback { text: String, reason: FallbackReason },
}

impl GenerationResult {
    pub fn text(&self) -> &str {
        match self {
            GenerationResult::Ok { text } | GenerationResult::Fallback { text, .. } => text,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            GenerationResult::Ok { text } | GenerationResult::Fallback { text, .. } => text,
        }
    }

    pub fn fallback_reason(&self) -> Option<FallbackReason> {
        match self {
            GenerationResult::Ok { .. } => None,
            GenerationResult::Fallback { reason, .. } => Some(*reason),
        }
    }
}

/// Which route outbound calls take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EndpointTarget {
    /// Straight to the model host.
    Direct,
    /// Through another EduBot proxy instance.
    ViaBackend,
}

impl fmt::Display for EndpointTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointTarget::Direct => f.write_str("direct"),
            EndpointTarget::ViaBackend => f.write_str("via-backend"),
        }
    }
}

/// Envelope used by the proxy endpoint, both when answering callers and when
/// another proxy instance answers us.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyReply {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ProxyReply {
    pub fn data(text: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(text.into()),
            message: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_serializes_with_kebab_reason() {
        let result = GenerationResult::Fallback {
            text: "sorry".into(),
            reason: FallbackReason::UnexpectedShape,
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["kind"], "fallback");
        assert_eq!(value["reason"], "unexpected-shape");
        assert_eq!(result.text(), "sorry");
    }

    #[test]
    fn proxy_reply_omits_absent_fields() {
        let value = serde_json::to_value(ProxyReply::data("hi")).unwrap();
        assert_eq!(value, serde_json::json!({ "success": true, "data": "hi" }));
    }

    #[test]
    fn parameters_accept_partial_objects() {
        let parsed: GenerationParameters =
            serde_json::from_str(r#"{ "temperature": 1.2 }"#).unwrap();
        assert_eq!(parsed.temperature, Some(1.2));
        assert_eq!(parsed.max_length, None);
    }

    #[test]
    fn falsy_parameters_read_as_unset() {
        let parsed: GenerationParameters = serde_json::from_str(
            r#"{ "max_length": false, "temperature": "", "top_p": null }"#,
        )
        .unwrap();
        assert_eq!(parsed, GenerationParameters::default());

        let parsed: GenerationParameters =
            serde_json::from_str(r#"{ "max_length": 0, "temperature": 0 }"#).unwrap();
        assert_eq!(parsed, GenerationParameters::default());
    }

    #[test]
    fn integral_float_length_is_accepted() {
        let parsed: GenerationParameters =
            serde_json::from_str(r#"{ "max_length": 50.0, "top_p": 1 }"#).unwrap();
        assert_eq!(parsed.max_length, Some(50));
        assert_eq!(parsed.top_p, Some(1.0));
    }

    #[test]
    fn unusable_parameters_are_rejected() {
        for body in [
            r#"{ "max_length": 12.5 }"#,
            r#"{ "max_length": -3 }"#,
            r#"{ "max_length": "long" }"#,
            r#"{ "temperature": "hot" }"#,
            r#"{ "top_p": true }"#,
        ] {
            assert!(
                serde_json::from_str::<GenerationParameters>(body).is_err(),
                "{body} should not parse"
            );
        }
    }
}

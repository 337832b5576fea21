use serde_json::{Map, Value};
use tracing::warn;

use crate::generation::{EndpointTarget, FallbackReason, GenerationResult};

pub const UNEXPECTED_FORMAT_TEXT: &str = "API returned unexpected format. Please try again.";

const LOGGED_BODY_LIMIT: usize = 512;

/// Upstream body decoded against the wire format of the target that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamResponse {
    Recognized { text: String },
    Unrecognized { body: String },
}

impl UpstreamResponse {
    /// Only JSON objects are recognized: `{ response }` from the model host,
    /// `{ success: true, data }` from a backend proxy.
    pub fn decode(raw: &[u8], target: EndpointTarget) -> Self {
        let object = serde_json::from_slice::<Value>(raw)
            .ok()
            .and_then(|value| match value {
                Value::Object(map) => Some(map),
                _ => None,
            });
        let text = object.as_ref().and_then(|map| match target {
            EndpointTarget::Direct => string_field(map, "response"),
            EndpointTarget::ViaBackend => (map.get("success") == Some(&Value::Bool(true)))
                .then(|| string_field(map, "data"))
                .flatten(),
        });

        match text {
            Some(text) => UpstreamResponse::Recognized { text },
            None => UpstreamResponse::Unrecognized {
                body: String::from_utf8_lossy(raw).into_owned(),
            },
        }
    }

    pub fn into_result(self) -> GenerationResult {
        match self {
            UpstreamResponse::Recognized { text } => GenerationResult::Ok { text },
            UpstreamResponse::Unrecognized { body } => {
                warn!(body = %truncate(&body, LOGGED_BODY_LIMIT), "unexpected upstream response format");
                GenerationResult::Fallback {
                    text: UNEXPECTED_FORMAT_TEXT.to_string(),
                    reason: FallbackReason::UnexpectedShape,
                }
            }
        }
    }
}

fn string_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key).and_then(Value::as_str).map(str::to_owned)
}

/// Maps a raw 2xx body to a result. Never fails.
pub fn normalize(raw: &[u8], target: EndpointTarget) -> GenerationResult {
    UpstreamResponse::decode(raw, target).into_result()
}

pub(crate) fn truncate(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

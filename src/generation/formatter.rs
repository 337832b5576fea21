use crate::{
    error::ValidationError,
    generation::{GenerationParameters, GenerationRequest},
};

pub const DEFAULT_MAX_LENGTH: u32 = 100;
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_TOP_P: f64 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationDefaults {
    pub max_length: u32,
    pub temperature: f64,
    pub top_p: f64,
}

impl Default for GenerationDefaults {
    fn default() -> Self {
        Self {
            max_length: DEFAULT_MAX_LENGTH,
            temperature: DEFAULT_TEMPERATURE,
            top_p: DEFAULT_TOP_P,
        }
    }
}

/// Turns a raw prompt plus partial overrides into a complete request.
///
/// Overrides are coalesced the way the chat front end always has: a value of
/// zero counts as unset, so `temperature: 0` becomes the default temperature.
#[derive(Debug, Clone, Default)]
pub struct RequestFormatter {
    defaults: GenerationDefaults,
}

impl RequestFormatter {
    pub fn new(defaults: GenerationDefaults) -> Self {
        Self { defaults }
    }

    pub fn defaults(&self) -> GenerationDefaults {
        self.defaults
    }

    pub fn format(
        &self,
        prompt: &str,
        parameters: &GenerationParameters,
    ) -> Result<GenerationRequest, ValidationError> {
        if prompt.trim().is_empty() {
            return Err(ValidationError::EmptyPrompt);
        }

        Ok(GenerationRequest {
            prompt: prompt.to_string(),
            max_length: parameters
                .max_length
                .filter(|value| *value != 0)
                .unwrap_or(self.defaults.max_length),
            temperature: coalesce(parameters.temperature, self.defaults.temperature),
            top_p: coalesce(parameters.top_p, self.defaults.top_p),
        })
    }
}

fn coalesce(value: Option<f64>, default: f64) -> f64 {
    value
        .filter(|v| *v != 0.0 && !v.is_nan())
        .unwrap_or(default)
}

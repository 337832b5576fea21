use std::sync::Arc;

use reqwest::Url;
use tracing::{info, warn};

use crate::{
    config::AppConfig,
    error::{ServiceError, ValidationError},
    generation::{
        EndpointTarget, GenerationParameters, GenerationRequest, GenerationResult,
        fallback::{self, NextStep, RetryPolicy, TargetSelector},
        formatter::RequestFormatter,
        normalizer,
        upstream::{HttpUpstreamClient, UpstreamClient, encode_body},
    },
};

/// Where each target lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub direct: Url,
    pub backend: Option<Url>,
}

impl Endpoints {
    pub fn direct(url: Url) -> Self {
        Self {
            direct: url,
            backend: None,
        }
    }

    pub fn initial_target(&self) -> EndpointTarget {
        if self.backend.is_some() {
            EndpointTarget::ViaBackend
        } else {
            EndpointTarget::Direct
        }
    }

    pub fn url_for(&self, target: EndpointTarget) -> &Url {
        match (target, &self.backend) {
            (EndpointTarget::ViaBackend, Some(backend)) => backend,
            _ => &self.direct,
        }
    }
}

/// Formatter, upstream client and fallback policy wired together.
pub struct GenerationPipeline {
    formatter: RequestFormatter,
    client: Arc<dyn UpstreamClient>,
    endpoints: Endpoints,
    selector: TargetSelector,
    retry: RetryPolicy,
}

impl GenerationPipeline {
    pub fn new(
        formatter: RequestFormatter,
        client: Arc<dyn UpstreamClient>,
        endpoints: Endpoints,
        retry: RetryPolicy,
    ) -> Self {
        let selector = TargetSelector::new(endpoints.initial_target());
        Self {
            formatter,
            client,
            endpoints,
            selector,
            retry,
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, ServiceError> {
        let client = if config.system_proxy {
            HttpUpstreamClient::new(config.upstream_timeout)?
        } else {
            HttpUpstreamClient::without_proxy(config.upstream_timeout)?
        };
        Ok(Self::new(
            RequestFormatter::new(config.defaults),
            Arc::new(client),
            Endpoints {
                direct: config.upstream_url.clone(),
                backend: config.backend_url.clone(),
            },
            RetryPolicy {
                budget: config.retry_budget,
                backoff: config.retry_backoff,
            },
        ))
    }

    pub fn target(&self) -> EndpointTarget {
        self.selector.current()
    }

    /// Resolves a prompt to displayable text. Only a blank prompt is reported
    /// as an error; every upstream problem ends up as a fallback result.
    pub async fn generate(
        &self,
        prompt: &str,
        parameters: &GenerationParameters,
    ) -> Result<GenerationResult, ValidationError> {
        let request = self.formatter.format(prompt, parameters)?;
        Ok(self.run(&request).await)
    }

    async fn run(&self, request: &GenerationRequest) -> GenerationResult {
        let mut retries_used = 0;
        let mut attempt = 0;

        loop {
            attempt += 1;
            let target = self.selector.current();
            let url = self.endpoints.url_for(target);
            info!(
                attempt,
                %target,
                %url,
                prompt_len = request.prompt.len(),
                max_length = request.max_length,
                "attempting generation"
            );

            let failure = match self.client.post_json(url, &encode_body(request, target)).await {
                Ok(raw) => return normalizer::normalize(&raw, target),
                Err(failure) => failure,
            };

            if target == EndpointTarget::ViaBackend
                && failure.is_transport()
                && self.selector.switch_to_direct()
            {
                warn!(error = %failure, "backend unreachable, switching to direct endpoint");
            }

            match self.retry.next_step(&failure, target, retries_used) {
                NextStep::Retry(delay) => {
                    retries_used += 1;
                    warn!(
                        attempt,
                        kind = failure.kind(),
                        error = %failure,
                        delay_ms = delay.as_millis(),
                        "generation attempt failed, retrying"
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
                NextStep::GiveUp => {
                    warn!(
                        attempt,
                        kind = failure.kind(),
                        error = %failure,
                        "generation attempts exhausted, serving fallback text"
                    );
                    return fallback::exhausted(&failure);
                }
            }
        }
    }
}

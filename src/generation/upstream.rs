use std::error::Error as StdError;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{
    Url,
    header::{ACCEPT, CONTENT_TYPE},
};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::{
    error::UpstreamFailure,
    generation::{EndpointTarget, GenerationRequest, normalizer::truncate},
};

pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(60);

const LOGGED_BODY_LIMIT: usize = 512;

/// One JSON POST to a generation endpoint, returning the raw 2xx body.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    async fn post_json(&self, url: &Url, body: &Value) -> Result<Bytes, UpstreamFailure>;
}

/// Wire body for the given target: flat fields for the model host, a nested
/// `parameters` object for another proxy instance.
pub fn encode_body(request: &GenerationRequest, target: EndpointTarget) -> Value {
    match target {
        EndpointTarget::Direct => json!({
            "prompt": request.prompt,
            "max_length": request.max_length,
            "temperature": request.temperature,
            "top_p": request.top_p,
        }),
        EndpointTarget::ViaBackend => json!({
            "prompt": request.prompt,
            "parameters": request.parameters(),
        }),
    }
}

pub struct HttpUpstreamClient {
    http: reqwest::Client,
    timeout: Duration,
}

impl HttpUpstreamClient {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        Self::from_builder(reqwest::Client::builder(), timeout)
    }

    /// Same as [`HttpUpstreamClient::new`] but ignoring `HTTP_PROXY` and friends.
    pub fn without_proxy(timeout: Duration) -> Result<Self, reqwest::Error> {
        Self::from_builder(reqwest::Client::builder().no_proxy(), timeout)
    }

    fn from_builder(
        builder: reqwest::ClientBuilder,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = builder.timeout(timeout).build()?;
        Ok(Self { http, timeout })
    }

    fn classify(&self, err: reqwest::Error) -> UpstreamFailure {
        if err.is_timeout() {
            UpstreamFailure::Timeout {
                timeout: self.timeout,
            }
        } else {
            UpstreamFailure::Transport {
                message: error_chain(&err),
            }
        }
    }

    /// The endpoint was reached, so a broken body is never a transport failure.
    fn classify_body_error(&self, status: u16, err: reqwest::Error) -> UpstreamFailure {
        if err.is_timeout() {
            UpstreamFailure::Timeout {
                timeout: self.timeout,
            }
        } else {
            UpstreamFailure::Body {
                status,
                message: error_chain(&err),
            }
        }
    }
}

#[async_trait]
impl UpstreamClient for HttpUpstreamClient {
    async fn post_json(&self, url: &Url, body: &Value) -> Result<Bytes, UpstreamFailure> {
        let prompt_len = body
            .get("prompt")
            .and_then(Value::as_str)
            .map(str::len)
            .unwrap_or_default();
        debug!(%url, prompt_len, "sending generation request");

        let start = Instant::now();
        let response = self
            .http
            .post(url.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .json(body)
            .send()
            .await
            .map_err(|err| {
                let failure = self.classify(err);
                warn!(%url, kind = failure.kind(), error = %failure, "no response from generation endpoint");
                failure
            })?;

        let status = response.status();
        let payload = response.bytes().await.map_err(|err| {
            let failure = self.classify_body_error(status.as_u16(), err);
            warn!(%url, kind = failure.kind(), error = %failure, "failed reading generation response");
            failure
        })?;
        let elapsed_ms = start.elapsed().as_millis();

        if !status.is_success() {
            let body = String::from_utf8_lossy(&payload).into_owned();
            warn!(
                %url,
                status = status.as_u16(),
                elapsed_ms,
                body = %truncate(&body, LOGGED_BODY_LIMIT),
                "generation endpoint returned an error status"
            );
            return Err(UpstreamFailure::Status {
                status: status.as_u16(),
                body,
            });
        }

        info!(%url, status = status.as_u16(), elapsed_ms, bytes = payload.len(), "received generation response");
        Ok(payload)
    }
}

fn error_chain(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = StdError::source(err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

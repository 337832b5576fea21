mod types;

pub mod fallback;
pub mod formatter;
pub mod normalizer;
pub mod pipeline;
pub mod upstream;

pub use fallback::{RetryPolicy, TargetSelector};
pub use formatter::{GenerationDefaults, RequestFormatter};
pub use normalizer::UpstreamResponse;
pub use pipeline::{Endpoints, GenerationPipeline};
pub use types::{
    EndpointTarget, FallbackReason, GenerationParameters, GenerationRequest, GenerationResult,
    ProxyReply,
};
pub use upstream::{HttpUpstreamClient, UpstreamClient};

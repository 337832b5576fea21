pub mod config;
pub mod error;
pub mod generation;
pub mod server;
pub mod telemetry;

pub use config::AppConfig;
pub use error::{ServiceError, UpstreamFailure, ValidationError};
pub use generation::{
    EndpointTarget, GenerationParameters, GenerationPipeline, GenerationResult,
};
pub use server::build_router;

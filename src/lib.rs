pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod server;
#[cfg(feature = "tch-backend")]
pub mod training;

pub use config::{AppConfig, TrainConfig};
pub use error::ServiceError;
pub use model::{GenerationRequest, GenerationResponse, ModelRegistry, TextGenerator};
pub use server::build_router;

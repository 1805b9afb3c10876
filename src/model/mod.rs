mod config;
mod registry;
mod types;
pub mod vocab;

#[cfg(feature = "tch-backend")]
mod generator;
#[cfg(feature = "tch-backend")]
pub mod network;

pub use config::ModelConfig;
pub use registry::{ModelRegistry, TextGenerator};
pub use types::{GenerationRequest, GenerationResponse, ModelMetadata};
pub use vocab::Vocabulary;

#[cfg(feature = "tch-backend")]
pub use generator::CharGenerator;

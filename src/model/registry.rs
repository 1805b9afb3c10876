use std::sync::Arc;

use tokio::task;

use crate::{
    config::AppConfig,
    error::ServiceError,
    model::{GenerationRequest, GenerationResponse, ModelMetadata},
};

// implementations block; the registry calls them on tokio's blocking pool
pub trait TextGenerator: Send + Sync {
    fn generate(&self, request: &GenerationRequest) -> Result<Vec<String>, ServiceError>;

    fn metadata(&self) -> ModelMetadata;
}

pub struct ModelRegistry {
    generator: Arc<dyn TextGenerator>,
}

impl ModelRegistry {
    #[cfg(feature = "tch-backend")]
    pub fn initialize(config: &AppConfig) -> Result<Self, ServiceError> {
        let generator = crate::model::CharGenerator::load(
            &config.weights_path,
            &config.vocab_path,
            &config.config_path,
            config.device,
            config.max_gen_length,
        )?;
        Ok(Self::with_generator(Arc::new(generator)))
    }

    pub fn with_generator(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    pub fn metadata(&self) -> ModelMetadata {
        self.generator.metadata()
    }

    pub async fn generate(
        &self,
        request: GenerationRequest,
        config: &AppConfig,
    ) -> Result<GenerationResponse, ServiceError> {
        validate(&request, config)?;
        if request.n == 0 {
            return Ok(GenerationResponse {
                results: Vec::new(),
            });
        }

        let generator = self.generator.clone();
        let results = task::spawn_blocking(move || generator.generate(&request))
            .await
            .map_err(|err| ServiceError::Inference(format!("inference task failed: {err}")))??;

        Ok(GenerationResponse { results })
    }
}

fn validate(request: &GenerationRequest, config: &AppConfig) -> Result<(), ServiceError> {
    // zero is accepted and means greedy decoding
    if !request.temperature.is_finite() || request.temperature < 0.0 {
        return Err(ServiceError::BadRequest(format!(
            "temperature must be a non-negative number, got {}",
            request.temperature
        )));
    }
    if request.n > config.max_samples {
        return Err(ServiceError::BadRequest(format!(
            "n must be at most {}, got {}",
            config.max_samples, request.n
        )));
    }
    Ok(())
}

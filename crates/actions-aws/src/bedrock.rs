use actions_core::backends::TextGenerator;
use actions_core::error::{ActionError, Result};
use actions_core::generation::{anthropic_body, extract_text, GenerationRequest};
use async_trait::async_trait;
use aws_sdk_bedrockruntime::error::DisplayErrorContext;
use aws_sdk_bedrockruntime::primitives::Blob;
use aws_sdk_bedrockruntime::Client;
use tracing::debug;

const SERVICE: &str = "bedrock";

/// Anthropic models through `InvokeModel`.
pub struct BedrockGenerator {
    client: Client,
    model_id: String,
}

impl BedrockGenerator {
    pub fn new(client: Client, model_id: impl Into<String>) -> Self {
        Self {
            client,
            model_id: model_id.into(),
        }
    }
}

#[async_trait]
impl TextGenerator for BedrockGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let body = serde_json::to_vec(&anthropic_body(request))?;
        debug!(model_id = %self.model_id, bytes = body.len(), "invoking model");
        let output = self
            .client
            .invoke_model()
            .model_id(&self.model_id)
            .content_type("application/json")
            .accept("application/json")
            .body(Blob::new(body))
            .send()
            .await
            .map_err(|e| ActionError::backend(SERVICE, DisplayErrorContext(&e)))?;

        extract_text(output.body().as_ref())
    }
}

use actions_core::backends::SecretStore;
use actions_core::error::{ActionError, Result};
use async_trait::async_trait;
use aws_sdk_secretsmanager::error::DisplayErrorContext;
use aws_sdk_secretsmanager::Client;

pub struct SecretsManagerStore {
    client: Client,
}

impl SecretsManagerStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SecretStore for SecretsManagerStore {
    async fn secret_string(&self, secret_id: &str) -> Result<String> {
        let output = self
            .client
            .get_secret_value()
            .secret_id(secret_id)
            .send()
            .await
            .map_err(|e| ActionError::backend("secretsmanager", DisplayErrorContext(&e)))?;
        output
            .secret_string()
            .map(String::from)
            .ok_or_else(|| ActionError::NotFound(format!("secret {secret_id} has no string value")))
    }
}

//! Mock provider implementations for testing.

use super::{
    FinishReason, GenerationParams, ProviderError, ProviderResponse, SpeechProvider, TextProvider,
};
use async_trait::async_trait;

/// Mock text provider returning a canned response.
pub struct MockTextProvider {
    response: Option<String>,
}

impl MockTextProvider {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: Some(response.into()),
        }
    }

    /// A provider that fails every call.
    pub fn unavailable() -> Self {
        Self { response: None }
    }
}

#[async_trait]
impl TextProvider for MockTextProvider {
    async fn generate(
        &self,
        prompt: &str,
        _params: &GenerationParams,
    ) -> Result<ProviderResponse, ProviderError> {
        let Some(response) = &self.response else {
            return Err(ProviderError::Api("mock provider failure".to_string()));
        };

        Ok(ProviderResponse {
            text: Some(response.clone()),
            input_tokens: prompt.len() as i64 / 4,
            output_tokens: response.len() as i64 / 4,
            finish_reason: FinishReason::Complete,
        })
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        if self.response.is_some() {
            Ok(())
        } else {
            Err(ProviderError::NotConfigured(
                "mock text provider not enabled".to_string(),
            ))
        }
    }
}

/// Mock speech provider returning fixed bytes.
pub struct MockSpeechProvider;

#[async_trait]
impl SpeechProvider for MockSpeechProvider {
    async fn synthesize(
        &self,
        _text: &str,
        _voice: &str,
        _instructions: Option<&str>,
    ) -> Result<Vec<u8>, ProviderError> {
        Ok(b"ID3mock-audio".to_vec())
    }
}

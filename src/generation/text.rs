//! 텍스트 생성 모듈

use std::time::Duration;

use async_trait::async_trait;

use super::{GeminiClient, Part};
use crate::error::{ExternalCallError, Result};

/// 텍스트 생성 모델 트레이트
#[async_trait]
pub trait TextModel: Send + Sync {
    /// 프롬프트로 텍스트 생성
    async fn generate(&self, prompt: &str) -> std::result::Result<String, ExternalCallError>;

    /// 모델 식별자
    fn model_id(&self) -> &str;
}

/// Gemini 텍스트 생성 모델
#[derive(Debug, Clone)]
pub struct GeminiText {
    client: GeminiClient,
}

impl GeminiText {
    pub fn new(api_key: String, model: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: GeminiClient::new(api_key, model.into(), timeout)?,
        })
    }
}

#[async_trait]
impl TextModel for GeminiText {
    async fn generate(&self, prompt: &str) -> std::result::Result<String, ExternalCallError> {
        let parts = vec![Part::Text {
            text: prompt.to_string(),
        }];
        self.client.generate_content(parts).await
    }

    fn model_id(&self) -> &str {
        self.client.model()
    }
}

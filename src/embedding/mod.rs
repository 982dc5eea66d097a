//! 임베딩 모듈 - Gemini API를 통한 텍스트 벡터화
//!
//! 청크와 질문을 같은 임베딩 함수로 벡터화합니다.
//! 인덱스 하나에는 하나의 함수만 사용되어야 하므로
//! 프로바이더는 `name()`과 `dimension()`으로 식별됩니다.
//!
//! ## 사용법
//! ```rust,ignore
//! let embedder = GeminiEmbedding::new(api_key, Duration::from_secs(30))?;
//! let embedding = embedder.embed("Hello, world!").await?;
//! ```

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Error, ExternalCallError, Result};

// ============================================================================
// EmbeddingProvider Trait
// ============================================================================

/// 임베딩 프로바이더 트레이트
///
/// 텍스트를 고정 차원 벡터로 변환하는 인터페이스입니다.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// 단일 텍스트 임베딩
    async fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, ExternalCallError>;

    /// 임베딩 차원 수
    fn dimension(&self) -> usize;

    /// 프로바이더 이름 (인덱스에 기록됨)
    fn name(&self) -> &str;
}

// ============================================================================
// Google Gemini Embedding
// ============================================================================

/// Gemini 임베딩 API 엔드포인트
/// source: https://ai.google.dev/gemini-api/docs/embeddings
const GEMINI_EMBED_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-embedding-001:embedContent";

/// 임베딩 모델 이름
const GEMINI_EMBED_MODEL: &str = "gemini-embedding-001";

/// 기본 임베딩 차원
pub const DEFAULT_DIMENSION: usize = 768;

/// 허용되는 출력 차원 (MRL)
const VALID_DIMENSIONS: [usize; 3] = [768, 1536, 3072];

/// Google Gemini 임베딩 구현체
///
/// 문서와 질문 모두 `SEMANTIC_SIMILARITY` 태스크로 임베딩하여
/// 하나의 함수로 인덱스를 구성합니다.
#[derive(Debug)]
pub struct GeminiEmbedding {
    api_key: String,
    client: reqwest::Client,
    dimension: usize,
    name: String,
}

impl GeminiEmbedding {
    /// 기본 차원으로 생성
    pub fn new(api_key: String, timeout: Duration) -> Result<Self> {
        Self::with_dimension(api_key, DEFAULT_DIMENSION, timeout)
    }

    /// 차원을 지정하여 생성
    ///
    /// # Arguments
    /// * `api_key` - Google AI API 키
    /// * `dimension` - 임베딩 차원 (768, 1536, 3072 중 선택)
    /// * `timeout` - HTTP 요청 타임아웃
    pub fn with_dimension(api_key: String, dimension: usize, timeout: Duration) -> Result<Self> {
        if !VALID_DIMENSIONS.contains(&dimension) {
            return Err(Error::Config(format!(
                "Invalid dimension: {}. Must be 768, 1536, or 3072",
                dimension
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_key,
            client,
            dimension,
            name: format!("{}@{}", GEMINI_EMBED_MODEL, dimension),
        })
    }

    fn malformed(&self, reason: impl Into<String>) -> ExternalCallError {
        ExternalCallError::Malformed {
            provider: GEMINI_EMBED_MODEL.to_string(),
            reason: reason.into(),
        }
    }
}

/// Gemini API 요청 본문
#[derive(Debug, Serialize)]
struct EmbedRequest {
    model: String,
    content: EmbedContent,
    #[serde(rename = "taskType")]
    task_type: String,
    #[serde(rename = "outputDimensionality")]
    output_dimensionality: usize,
}

#[derive(Debug, Serialize)]
struct EmbedContent {
    parts: Vec<EmbedPart>,
}

#[derive(Debug, Serialize)]
struct EmbedPart {
    text: String,
}

/// Gemini API 응답
#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbedding {
    async fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, ExternalCallError> {
        // 빈 텍스트 처리
        if text.trim().is_empty() {
            return Ok(vec![0.0; self.dimension]);
        }

        let request = EmbedRequest {
            model: format!("models/{}", GEMINI_EMBED_MODEL),
            content: EmbedContent {
                parts: vec![EmbedPart {
                    text: text.to_string(),
                }],
            },
            task_type: "SEMANTIC_SIMILARITY".to_string(),
            output_dimensionality: self.dimension,
        };

        // API 키는 URL이 아닌 헤더로 전송
        let response = self
            .client
            .post(GEMINI_EMBED_URL)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|source| ExternalCallError::Transport {
                provider: GEMINI_EMBED_MODEL.to_string(),
                source,
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| ExternalCallError::Transport {
                provider: GEMINI_EMBED_MODEL.to_string(),
                source,
            })?;

        if !status.is_success() {
            return Err(ExternalCallError::Status {
                provider: GEMINI_EMBED_MODEL.to_string(),
                status: status.as_u16(),
                message: crate::generation::error_message(&body),
            });
        }

        let parsed: EmbedResponse = serde_json::from_str(&body)
            .map_err(|e| self.malformed(format!("invalid embedding JSON: {}", e)))?;

        if parsed.embedding.values.len() != self.dimension {
            return Err(self.malformed(format!(
                "expected {} dimensions, got {}",
                self.dimension,
                parsed.embedding.values.len()
            )));
        }

        Ok(parsed.embedding.values)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[test]
    fn test_invalid_dimension() {
        let result = GeminiEmbedding::with_dimension("fake_key".to_string(), 999, TIMEOUT);
        let err = result.err();
        assert!(err
            .as_ref()
            .map(|e| e.to_string().contains("Invalid dimension"))
            .unwrap_or(false));
    }

    #[test]
    fn test_valid_dimensions() {
        for dim in VALID_DIMENSIONS {
            let embedder = GeminiEmbedding::with_dimension("fake_key".to_string(), dim, TIMEOUT);
            assert!(embedder.is_ok());
            assert_eq!(embedder.unwrap().dimension(), dim);
        }
    }

    #[test]
    fn test_name_includes_dimension() {
        let embedder = GeminiEmbedding::new("fake_key".to_string(), TIMEOUT).unwrap();
        assert_eq!(embedder.name(), "gemini-embedding-001@768");
    }

    #[tokio::test]
    async fn test_empty_text_skips_network() {
        let embedder = GeminiEmbedding::new("fake_key".to_string(), TIMEOUT).unwrap();
        let vector = embedder.embed("   ").await.unwrap();
        assert_eq!(vector.len(), DEFAULT_DIMENSION);
        assert!(vector.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_request_serialization() {
        let request = EmbedRequest {
            model: "models/gemini-embedding-001".to_string(),
            content: EmbedContent {
                parts: vec![EmbedPart {
                    text: "hello".to_string(),
                }],
            },
            task_type: "SEMANTIC_SIMILARITY".to_string(),
            output_dimensionality: 768,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["taskType"], "SEMANTIC_SIMILARITY");
        assert_eq!(json["outputDimensionality"], 768);
        assert_eq!(json["content"]["parts"][0]["text"], "hello");
    }
}

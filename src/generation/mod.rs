//! 생성 모델 모듈 - Gemini generateContent 클라이언트
//!
//! 비전(이미지 설명)과 텍스트(답변 생성) 호출이 같은
//! `generateContent` 엔드포인트와 요청/응답 타입을 공유합니다.
//!
//! source: https://ai.google.dev/api/generate-content

pub mod text;
pub mod vision;

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, ExternalCallError, Result};

pub use text::{GeminiText, TextModel};
pub use vision::{GeminiVision, ImageInput, VisionModel};

/// Gemini 모델 API 베이스 URL
const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

// ============================================================================
// GeminiClient
// ============================================================================

/// 단일 모델에 묶인 generateContent 클라이언트
#[derive(Debug, Clone)]
pub(crate) struct GeminiClient {
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl GeminiClient {
    pub(crate) fn new(api_key: String, model: String, timeout: Duration) -> Result<Self> {
        if model.trim().is_empty() {
            return Err(Error::Config("model id must not be empty".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_key,
            model,
            client,
        })
    }

    pub(crate) fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/{}:generateContent", GEMINI_API_BASE, self.model)
    }

    /// 파트 목록으로 generateContent 호출 후 응답 텍스트 반환
    pub(crate) async fn generate_content(
        &self,
        parts: Vec<Part>,
    ) -> std::result::Result<String, ExternalCallError> {
        let request = GenerateRequest {
            contents: vec![Content { parts }],
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|source| ExternalCallError::Transport {
                provider: self.model.clone(),
                source,
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| ExternalCallError::Transport {
                provider: self.model.clone(),
                source,
            })?;

        if !status.is_success() {
            return Err(ExternalCallError::Status {
                provider: self.model.clone(),
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        parse_response_text(&body).map_err(|reason| ExternalCallError::Malformed {
            provider: self.model.clone(),
            reason,
        })
    }
}

// ============================================================================
// Response Helpers
// ============================================================================

/// 성공 응답 본문에서 첫 번째 후보의 텍스트 추출
///
/// 여러 텍스트 파트는 순서대로 이어 붙입니다.
pub(crate) fn parse_response_text(body: &str) -> std::result::Result<String, String> {
    let response: GenerateResponse =
        serde_json::from_str(body).map_err(|e| format!("invalid response JSON: {}", e))?;

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| "response has no candidates".to_string())?;

    let text: String = candidate
        .content
        .map(|c| c.parts)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|p| p.text)
        .collect();

    if text.trim().is_empty() {
        let reason = candidate
            .finish_reason
            .unwrap_or_else(|| "UNKNOWN".to_string());
        return Err(format!("candidate has no text (finishReason: {})", reason));
    }

    Ok(text.trim().to_string())
}

/// 에러 응답 본문에서 메시지 추출
pub(crate) fn error_message(body: &str) -> String {
    match serde_json::from_str::<GeminiError>(body) {
        Ok(error) if error.error.status.is_empty() => error.error.message,
        Ok(error) => format!("{}: {}", error.error.status, error.error.message),
        Err(_) => body.chars().take(500).collect(),
    }
}

// ============================================================================
// API Types
// ============================================================================

#[derive(Debug, Serialize)]
pub(crate) struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
pub(crate) struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub(crate) enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Serialize)]
pub(crate) struct InlineData {
    #[serde(rename = "mimeType")]
    pub(crate) mime_type: String,
    pub(crate) data: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

/// Gemini API 에러 응답
#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
    #[serde(default)]
    status: String,
}

// ============================================================================
// Tests
// ============================================================================

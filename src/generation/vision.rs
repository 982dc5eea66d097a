//! 이미지 설명 생성 모듈
//!
//! Gemini Vision으로 이미지 한 장당 설명 텍스트를 생성합니다.
//! 요청에는 이미지 데이터만 들어가며 프롬프트나 생성 옵션은 없습니다.

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};

use super::{GeminiClient, InlineData, Part};
use crate::error::{ExternalCallError, Result};

/// 비전 모델 입력 이미지
#[derive(Debug, Clone, Copy)]
pub struct ImageInput<'a> {
    /// 원본 바이트
    pub bytes: &'a [u8],
    /// MIME 타입 (image/png 등)
    pub mime_type: &'a str,
}

/// 비전 모델 트레이트
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// 이미지 설명 생성
    async fn describe(
        &self,
        image: ImageInput<'_>,
    ) -> std::result::Result<String, ExternalCallError>;

    /// 모델 식별자
    fn model_id(&self) -> &str;
}

/// Gemini 비전 모델
#[derive(Debug, Clone)]
pub struct GeminiVision {
    client: GeminiClient,
}

impl GeminiVision {
    /// 모델 ID로 생성 (예: gemini-2.0-flash)
    pub fn new(api_key: String, model: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: GeminiClient::new(api_key, model.into(), timeout)?,
        })
    }
}

#[async_trait]
impl VisionModel for GeminiVision {
    async fn describe(
        &self,
        image: ImageInput<'_>,
    ) -> std::result::Result<String, ExternalCallError> {
        let parts = vec![image_part(image)];

        tracing::debug!(
            "Requesting vision description ({} bytes, {})",
            image.bytes.len(),
            image.mime_type
        );

        self.client.generate_content(parts).await
    }

    fn model_id(&self) -> &str {
        self.client.model()
    }
}

/// 이미지를 inlineData 파트로 인코딩
fn image_part(image: ImageInput<'_>) -> Part {
    Part::InlineData {
        inline_data: InlineData {
            mime_type: image.mime_type.to_string(),
            data: STANDARD.encode(image.bytes),
        },
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_part_is_base64() {
        let image = ImageInput {
            bytes: b"\x89PNG",
            mime_type: "image/png",
        };
        match image_part(image) {
            Part::InlineData { inline_data } => {
                assert_eq!(inline_data.mime_type, "image/png");
                assert_eq!(inline_data.data, "iVBORw==");
            }
            Part::Text { .. } => panic!("expected inline data"),
        }
    }

    #[test]
    fn test_model_id() {
        let vision =
            GeminiVision::new("fake_key".to_string(), "gemini-2.0-flash", Duration::from_secs(5))
                .unwrap();
        assert_eq!(vision.model_id(), "gemini-2.0-flash");
    }
}

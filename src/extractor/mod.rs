//! 콘텐츠 판별 및 추출 모듈
//!
//! 저장 요청된 블롭이 선언된 종류(문서/이미지)와 실제로 일치하는지 확인하고
//! 문서에서 텍스트를 추출합니다.
//! - 텍스트 파일: UTF-8 디코딩
//! - PDF 파일: pdf-extract로 텍스트 추출
//! - 이미지 파일: 매직 바이트로 포맷 판별

pub mod pdf;

use std::fmt;
use std::path::Path;

use crate::error::{Error, Result};

// ============================================================================
// Content Kinds
// ============================================================================

/// 저장 요청 시 선언하는 콘텐츠 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Document,
    Image,
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentKind::Document => write!(f, "document"),
            ContentKind::Image => write!(f, "image"),
        }
    }
}

/// 지원하는 문서 포맷
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    PlainText,
}

impl DocumentFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::PlainText => "text",
        }
    }
}

/// 지원하는 이미지 포맷
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    Webp,
    Bmp,
}

impl ImageFormat {
    /// 매직 바이트로 이미지 포맷 판별
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(ImageFormat::Png)
        } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(ImageFormat::Jpeg)
        } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            Some(ImageFormat::Gif)
        } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            Some(ImageFormat::Webp)
        } else if bytes.starts_with(b"BM") && bmp_header_size(bytes).is_some() {
            Some(ImageFormat::Bmp)
        } else {
            None
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Gif => "image/gif",
            ImageFormat::Webp => "image/webp",
            ImageFormat::Bmp => "image/bmp",
        }
    }
}

/// BMP DIB 헤더 크기 (알려진 값일 때만)
///
/// "BM"으로 시작하는 일반 텍스트를 이미지로 오인하지 않기 위해 확인합니다.
fn bmp_header_size(bytes: &[u8]) -> Option<u32> {
    let raw: [u8; 4] = bytes.get(14..18)?.try_into().ok()?;
    let size = u32::from_le_bytes(raw);
    matches!(size, 12 | 40 | 52 | 56 | 64 | 108 | 124).then_some(size)
}

/// 확장자가 이미지인지 확인
fn has_image_extension(path: &Path) -> bool {
    matches!(
        extension(path).as_str(),
        "png" | "jpg" | "jpeg" | "webp" | "gif" | "bmp"
    )
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default()
}

// ============================================================================
// Sniffing
// ============================================================================

/// 블롭을 문서로 판별
///
/// 이미지로 보이는 내용, `%PDF-` 헤더가 없는 `.pdf`,
/// UTF-8이 아닌 텍스트는 종류 불일치로 거부합니다.
pub fn sniff_document(path: &Path, bytes: &[u8]) -> Result<DocumentFormat> {
    if ImageFormat::sniff(bytes).is_some() || has_image_extension(path) {
        return Err(Error::storage(
            path,
            "declared as document but content is an image",
        ));
    }

    if bytes.starts_with(b"%PDF-") {
        return Ok(DocumentFormat::Pdf);
    }

    if extension(path) == "pdf" {
        return Err(Error::storage(path, "file has .pdf extension but no PDF header"));
    }

    if std::str::from_utf8(bytes).is_err() {
        return Err(Error::storage(
            path,
            "declared as document but content is neither PDF nor UTF-8 text",
        ));
    }

    Ok(DocumentFormat::PlainText)
}

/// 블롭을 이미지로 판별
pub fn sniff_image(path: &Path, bytes: &[u8]) -> Result<ImageFormat> {
    ImageFormat::sniff(bytes).ok_or_else(|| {
        Error::storage(
            path,
            "declared as image but content is not a supported image format",
        )
    })
}

// ============================================================================
// Extraction
// ============================================================================

/// 문서 바이트에서 텍스트 추출
pub async fn extract_document_text(
    path: &Path,
    bytes: Vec<u8>,
    format: DocumentFormat,
) -> Result<String> {
    match format {
        DocumentFormat::PlainText => String::from_utf8(bytes)
            .map_err(|e| Error::storage(path, format!("invalid UTF-8: {}", e))),
        DocumentFormat::Pdf => {
            // PDF 추출은 CPU 바운드이므로 spawn_blocking 사용
            let owned = path.to_path_buf();
            tokio::task::spawn_blocking(move || pdf::extract_text_from_pdf(&owned, &bytes))
                .await
                .map_err(|e| Error::storage(path, format!("PDF extraction task failed: {}", e)))?
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

//! PDF 텍스트 추출 모듈
//!
//! pdf-extract 크레이트를 사용하여 PDF에서 텍스트를 추출합니다.

use std::path::Path;

use crate::error::{Error, Result};

/// PDF 바이트에서 전체 텍스트 추출
///
/// 페이지 구분자(폼피드)는 빈 줄로 바꿔 문장 분할기가
/// 페이지 경계를 넘어 문장을 잇지 않도록 합니다.
pub fn extract_text_from_pdf(path: &Path, bytes: &[u8]) -> Result<String> {
    let text = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| Error::storage(path, format!("Failed to extract text from PDF: {}", e)))?;

    // 텍스트가 비어있으면 경고
    if text.trim().is_empty() {
        tracing::warn!(
            "No text extracted from PDF: {:?}. It might be a scanned document.",
            path
        );
        return Ok(String::new());
    }

    Ok(normalize_pages(&text))
}

/// 폼피드 문자를 문단 경계로 변환
fn normalize_pages(text: &str) -> String {
    text.split('\x0c')
        .map(str::trim)
        .filter(|page| !page.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

// ============================================================================
// Tests
// ============================================================================

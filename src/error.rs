//! 에러 타입
//!
//! 라이브러리 전체에서 사용하는 타입 에러입니다.
//! CLI 계층은 anyhow로 감싸서 사용자 메시지로 변환합니다.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// 라이브러리 Result 별칭
pub type Result<T> = std::result::Result<T, Error>;

// ============================================================================
// Error
// ============================================================================

/// 파이프라인 에러
#[derive(Error, Debug)]
pub enum Error {
    /// 블롭을 읽을 수 없거나 선언된 종류와 실제 내용이 다름
    #[error("Storage error at {path:?}: {reason}")]
    Storage { path: PathBuf, reason: String },

    /// 인덱스에 기록된 임베딩 함수와 설정된 함수가 다름
    #[error("Index config error: {0}")]
    IndexConfig(String),

    /// 임베딩/비전 프로바이더 호출 실패
    #[error(transparent)]
    ExternalCall(#[from] ExternalCallError),

    /// 답변 생성 호출 실패
    #[error("Generation failed: {0}")]
    Generation(#[source] ExternalCallError),

    /// 조회 대상 없음
    #[error("Not found: {0}")]
    NotFound(String),

    /// 설정 오류 (API 키 누락 등)
    #[error("Config error: {0}")]
    Config(String),

    /// SQLite 에러
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl Error {
    /// Storage 에러 생성 헬퍼
    pub fn storage(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::Storage {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

// ============================================================================
// ExternalCallError
// ============================================================================

/// 외부 모델 API 호출 에러
///
/// 모든 외부 호출은 정확히 한 번만 시도되며 재시도하지 않습니다.
#[derive(Error, Debug)]
pub enum ExternalCallError {
    #[error("{provider} timed out after {after:?}")]
    Timeout {
        provider: String,
        after: Duration,
    },

    #[error("{provider} returned HTTP {status}: {message}")]
    Status {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("{provider} returned a malformed response: {reason}")]
    Malformed { provider: String, reason: String },

    #[error("{provider} request failed: {source}")]
    Transport {
        provider: String,
        #[source]
        source: reqwest::Error,
    },
}

impl ExternalCallError {
    /// 에러를 발생시킨 프로바이더 이름
    pub fn provider(&self) -> &str {
        match self {
            ExternalCallError::Timeout { provider, .. }
            | ExternalCallError::Status { provider, .. }
            | ExternalCallError::Malformed { provider, .. }
            | ExternalCallError::Transport { provider, .. } => provider,
        }
    }

    /// 타임아웃 여부
    pub fn is_timeout(&self) -> bool {
        match self {
            ExternalCallError::Timeout { .. } => true,
            ExternalCallError::Transport { source, .. } => source.is_timeout(),
            _ => false,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_message() {
        let err = Error::storage("/tmp/missing.txt", "file not found");
        let msg = err.to_string();
        assert!(msg.contains("missing.txt"));
        assert!(msg.contains("file not found"));
    }

    #[test]
    fn test_external_call_error_is_transparent() {
        let err: Error = ExternalCallError::Malformed {
            provider: "gemini-embedding-001".to_string(),
            reason: "no values".to_string(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "gemini-embedding-001 returned a malformed response: no values"
        );
    }

    #[test]
    fn test_timeout_detection() {
        let err = ExternalCallError::Timeout {
            provider: "gemini-2.0-flash".to_string(),
            after: Duration::from_secs(30),
        };
        assert!(err.is_timeout());
        assert_eq!(err.provider(), "gemini-2.0-flash");

        let err = ExternalCallError::Status {
            provider: "gemini-2.0-flash".to_string(),
            status: 429,
            message: "quota".to_string(),
        };
        assert!(!err.is_timeout());
    }
}

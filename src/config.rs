//! 설정 모듈
//!
//! 환경변수에서 파이프라인 설정을 읽습니다.
//! 모든 값에는 기본값이 있으며 API 키만 선택적입니다.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::knowledge::SeparatorPolicy;

/// 기본 비전 모델
pub const DEFAULT_VISION_MODEL: &str = "gemini-2.0-flash";
/// 기본 텍스트 생성 모델
pub const DEFAULT_TEXT_MODEL: &str = "gemini-2.0-flash";
/// 외부 호출 기본 타임아웃
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// 질문당 검색할 청크 수
pub const DEFAULT_TOP_K: usize = 3;

// ============================================================================
// Data Directory
// ============================================================================

/// 데이터 디렉토리 경로 (~/.multimodal-rag/)
///
/// `MMRAG_HOME`이 설정되어 있으면 그 경로를 사용합니다.
pub fn get_data_dir() -> PathBuf {
    if let Ok(home) = std::env::var("MMRAG_HOME") {
        if !home.is_empty() {
            return PathBuf::from(home);
        }
    }

    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".multimodal-rag")
}

// ============================================================================
// API Key Management
// ============================================================================

/// API 키 로드 (환경변수에서)
///
/// 우선순위:
/// 1. `GEMINI_API_KEY` 환경변수
/// 2. `GOOGLE_AI_API_KEY` 환경변수
pub fn get_api_key() -> Option<String> {
    for var in ["GEMINI_API_KEY", "GOOGLE_AI_API_KEY"] {
        if let Ok(key) = std::env::var(var) {
            if !key.is_empty() {
                tracing::debug!("Using API key from {}", var);
                return Some(key);
            }
        }
    }
    None
}

/// API 키 존재 여부 확인
pub fn has_api_key() -> bool {
    get_api_key().is_some()
}

// ============================================================================
// Config
// ============================================================================

/// 파이프라인 설정
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite DB가 위치할 디렉토리
    pub data_dir: PathBuf,
    /// Gemini API 키
    pub api_key: Option<String>,
    /// 임베딩 차원 (768, 1536, 3072)
    pub embedding_dimension: usize,
    /// 이미지 설명 모델
    pub vision_model: String,
    /// 답변 생성 모델
    pub text_model: String,
    /// 외부 호출 타임아웃
    pub timeout: Duration,
    /// 질문당 검색 청크 수
    pub top_k: usize,
    /// 문서 분할 정책
    pub separators: SeparatorPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: get_data_dir(),
            api_key: None,
            embedding_dimension: crate::embedding::DEFAULT_DIMENSION,
            vision_model: DEFAULT_VISION_MODEL.to_string(),
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            top_k: DEFAULT_TOP_K,
            separators: SeparatorPolicy::Sentence,
        }
    }
}

impl Config {
    /// 환경변수에서 설정 로드
    pub fn from_env() -> Result<Self> {
        let mut config = Self {
            api_key: get_api_key(),
            ..Self::default()
        };

        if let Some(dim) = env_parse::<usize>("MMRAG_EMBEDDING_DIM")? {
            config.embedding_dimension = dim;
        }
        if let Some(model) = env_string("MMRAG_VISION_MODEL") {
            config.vision_model = model;
        }
        if let Some(model) = env_string("MMRAG_TEXT_MODEL") {
            config.text_model = model;
        }
        if let Some(secs) = env_parse::<u64>("MMRAG_TIMEOUT_SECS")? {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(k) = env_parse::<usize>("MMRAG_TOP_K")? {
            config.top_k = k;
        }
        if let Some(policy) = env_parse::<SeparatorPolicy>("MMRAG_SEPARATORS")? {
            config.separators = policy;
        }

        config.validate()?;
        Ok(config)
    }

    /// 설정값 검증
    pub fn validate(&self) -> Result<()> {
        if self.timeout.is_zero() {
            return Err(Error::Config("timeout must be greater than zero".to_string()));
        }
        if self.top_k == 0 {
            return Err(Error::Config("top_k must be at least 1".to_string()));
        }
        Ok(())
    }

    /// 설정된 API 키 (없으면 에러)
    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            Error::Config(
                "API key not found. Set GEMINI_API_KEY or GOOGLE_AI_API_KEY environment variable.\n\
                 Get your API key at: https://aistudio.google.com/app/apikey"
                    .to_string(),
            )
        })
    }

    /// SQLite DB 파일 경로
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("multimodal.db")
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_string(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| Error::Config(format!("invalid {}={:?}: {}", key, raw, e))),
        None => Ok(None),
    }
}

// ============================================================================
// Tests
// ============================================================================

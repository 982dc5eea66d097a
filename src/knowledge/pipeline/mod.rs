//! RAG 파이프라인 - 저장, 파생, 검색, 답변을 묶는 컨텍스트 객체
//!
//! `RagPipeline`은 저장소 핸들과 외부 프로바이더를 소유하며
//! 요청 처리기에 명시적으로 전달됩니다.
//!
//! - 문서 저장: 텍스트 추출 → 문장 분할 → 임베딩 → 단일 트랜잭션 기록
//! - 이미지 저장: 비전 모델 설명 생성 → 기록
//! - 질문: top-K 검색 → 프롬프트 → 텍스트 생성 → QA 로그 기록
//!
//! 외부 호출이 모두 끝난 뒤에만 DB에 쓰므로,
//! 실패한 저장은 어떤 행도 남기지 않습니다.

mod answer;
mod ingest;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::OnceCell;

use super::chunker::{chunker_for, default_chunker, Chunker};
use super::store::KnowledgeStore;
use crate::config::{Config, DEFAULT_TIMEOUT, DEFAULT_TOP_K};
use crate::embedding::{EmbeddingProvider, GeminiEmbedding};
use crate::error::{Error, ExternalCallError, Result};
use crate::extractor::ContentKind;
use crate::generation::{GeminiText, GeminiVision, TextModel, VisionModel};

pub use answer::build_prompt;

/// 프로세스 전역 파이프라인 (최초 초기화 1회)
static SHARED: OnceCell<Arc<RagPipeline>> = OnceCell::const_new();

// ============================================================================
// Types
// ============================================================================

/// 저장된 레코드 식별자
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordId {
    pub kind: ContentKind,
    pub id: i64,
}

// ============================================================================
// RagPipeline
// ============================================================================

/// 멀티모달 RAG 파이프라인
pub struct RagPipeline {
    store: KnowledgeStore,
    embedder: Arc<dyn EmbeddingProvider>,
    vision: Arc<dyn VisionModel>,
    text: Arc<dyn TextModel>,
    chunker: Box<dyn Chunker>,
    timeout: Duration,
    top_k: usize,
}

impl RagPipeline {
    /// 빌더 시작
    pub fn builder(store: KnowledgeStore) -> RagPipelineBuilder {
        RagPipelineBuilder::new(store)
    }

    /// 설정으로 Gemini 기반 파이프라인 생성
    ///
    /// DB를 열고 스키마를 보장한 뒤 임베딩 함수를 인덱스에 바인딩합니다.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let api_key = config.require_api_key()?.to_string();

        let store = KnowledgeStore::open(&config.db_path())?;
        let embedder = GeminiEmbedding::with_dimension(
            api_key.clone(),
            config.embedding_dimension,
            config.timeout,
        )?;
        let vision = GeminiVision::new(api_key.clone(), &config.vision_model, config.timeout)?;
        let text = GeminiText::new(api_key, &config.text_model, config.timeout)?;

        Self::builder(store)
            .embedder(Arc::new(embedder))
            .vision(Arc::new(vision))
            .text_model(Arc::new(text))
            .chunker(chunker_for(config.separators))
            .timeout(config.timeout)
            .top_k(config.top_k)
            .build()
    }

    /// 프로세스 전역 파이프라인
    ///
    /// 처음 성공한 초기화의 설정이 유지되며 이후 호출은 같은 인스턴스를 반환합니다.
    /// 초기화가 실패하면 다음 호출에서 다시 시도합니다.
    pub async fn shared(config: &Config) -> Result<Arc<RagPipeline>> {
        SHARED
            .get_or_try_init(|| async { Self::from_config(config).map(Arc::new) })
            .await
            .cloned()
    }

    /// 저장소 핸들
    pub fn knowledge_store(&self) -> &KnowledgeStore {
        &self.store
    }

    /// 질문당 검색 청크 수
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// 외부 호출에 타임아웃 적용
    async fn call_external<T, F>(
        &self,
        provider: &str,
        call: F,
    ) -> std::result::Result<T, ExternalCallError>
    where
        F: Future<Output = std::result::Result<T, ExternalCallError>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(ExternalCallError::Timeout {
                provider: provider.to_string(),
                after: self.timeout,
            }),
        }
    }

    /// 텍스트 임베딩 (타임아웃 + 차원 검증)
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let provider = self.embedder.name();
        let vector = self
            .call_external(provider, self.embedder.embed(text))
            .await?;

        if vector.len() != self.embedder.dimension() {
            return Err(ExternalCallError::Malformed {
                provider: provider.to_string(),
                reason: format!(
                    "expected {} dimensions, got {}",
                    self.embedder.dimension(),
                    vector.len()
                ),
            }
            .into());
        }

        Ok(vector)
    }
}

// ============================================================================
// RagPipelineBuilder
// ============================================================================

/// 파이프라인 빌더
pub struct RagPipelineBuilder {
    store: KnowledgeStore,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    vision: Option<Arc<dyn VisionModel>>,
    text: Option<Arc<dyn TextModel>>,
    chunker: Option<Box<dyn Chunker>>,
    timeout: Duration,
    top_k: usize,
}

impl RagPipelineBuilder {
    pub fn new(store: KnowledgeStore) -> Self {
        Self {
            store,
            embedder: None,
            vision: None,
            text: None,
            chunker: None,
            timeout: DEFAULT_TIMEOUT,
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn vision(mut self, vision: Arc<dyn VisionModel>) -> Self {
        self.vision = Some(vision);
        self
    }

    pub fn text_model(mut self, text: Arc<dyn TextModel>) -> Self {
        self.text = Some(text);
        self
    }

    pub fn chunker(mut self, chunker: Box<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// 파이프라인 생성
    ///
    /// 저장소에 다른 임베딩 함수가 기록되어 있으면 `IndexConfig` 에러입니다.
    pub fn build(self) -> Result<RagPipeline> {
        let embedder = self
            .embedder
            .ok_or_else(|| Error::Config("embedding provider is required".to_string()))?;
        let vision = self
            .vision
            .ok_or_else(|| Error::Config("vision model is required".to_string()))?;
        let text = self
            .text
            .ok_or_else(|| Error::Config("text model is required".to_string()))?;

        if self.timeout.is_zero() {
            return Err(Error::Config("timeout must be greater than zero".to_string()));
        }

        self.store.ensure_schema()?;
        self.store
            .bind_embedding(embedder.name(), embedder.dimension())?;

        Ok(RagPipeline {
            store: self.store,
            embedder,
            vision,
            text,
            chunker: self.chunker.unwrap_or_else(default_chunker),
            timeout: self.timeout,
            top_k: self.top_k,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{write_file, KeywordEmbedding, MockText, MockVision};
    use tempfile::TempDir;

    fn open_store(dir: &TempDir) -> KnowledgeStore {
        KnowledgeStore::open(&dir.path().join("rag.db")).unwrap()
    }

    #[test]
    fn test_build_requires_providers() {
        let dir = TempDir::new().unwrap();
        let result = RagPipeline::builder(open_store(&dir)).build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_build_rejects_mixed_embedding_functions() {
        let dir = TempDir::new().unwrap();

        let pipeline = RagPipeline::builder(open_store(&dir))
            .embedder(Arc::new(KeywordEmbedding::new()))
            .vision(Arc::new(MockVision::new()))
            .text_model(Arc::new(MockText::echo()))
            .build()
            .unwrap();
        let path = write_file(&dir, "facts.txt", b"The sky is blue.");
        pipeline.store_document(&path).await.unwrap();

        let result = RagPipeline::builder(open_store(&dir))
            .embedder(Arc::new(KeywordEmbedding::named("other-embedding")))
            .vision(Arc::new(MockVision::new()))
            .text_model(Arc::new(MockText::echo()))
            .build();

        assert!(matches!(result, Err(Error::IndexConfig(_))));
    }

    #[test]
    fn test_empty_index_accepts_new_embedding_function() {
        let dir = TempDir::new().unwrap();

        for embedder in [KeywordEmbedding::new(), KeywordEmbedding::named("other-embedding")] {
            RagPipeline::builder(open_store(&dir))
                .embedder(Arc::new(embedder))
                .vision(Arc::new(MockVision::new()))
                .text_model(Arc::new(MockText::echo()))
                .build()
                .unwrap();
        }

        assert_eq!(
            open_store(&dir).embedding_binding().unwrap(),
            Some(("other-embedding".to_string(), 6))
        );
    }

    #[test]
    fn test_from_config_requires_api_key() {
        let dir = TempDir::new().unwrap();
        let config = Config {
            data_dir: dir.path().to_path_buf(),
            api_key: None,
            ..Config::default()
        };
        assert!(matches!(
            RagPipeline::from_config(&config),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_from_config_builds_gemini_pipeline() {
        let dir = TempDir::new().unwrap();
        let config = Config {
            data_dir: dir.path().join("data"),
            api_key: Some("fake_key".to_string()),
            top_k: 5,
            ..Config::default()
        };

        let pipeline = RagPipeline::from_config(&config).unwrap();
        assert_eq!(pipeline.top_k(), 5);
        assert_eq!(
            pipeline.knowledge_store().embedding_binding().unwrap(),
            Some(("gemini-embedding-001@768".to_string(), 768))
        );
    }

    #[tokio::test]
    async fn test_call_external_times_out() {
        let dir = TempDir::new().unwrap();
        let pipeline = RagPipeline::builder(open_store(&dir))
            .embedder(Arc::new(KeywordEmbedding::new()))
            .vision(Arc::new(MockVision::new()))
            .text_model(Arc::new(MockText::echo()))
            .timeout(Duration::from_millis(20))
            .build()
            .unwrap();

        let result: std::result::Result<(), ExternalCallError> = pipeline
            .call_external("slow-provider", async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;

        let err = result.unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(err.provider(), "slow-provider");
    }

    #[tokio::test]
    async fn test_shared_retries_failed_init_then_keeps_first_instance() {
        let dir = TempDir::new().unwrap();

        let missing_key = Config {
            data_dir: dir.path().join("data"),
            api_key: None,
            ..Config::default()
        };
        assert!(matches!(
            RagPipeline::shared(&missing_key).await,
            Err(Error::Config(_))
        ));

        let config = Config {
            data_dir: dir.path().join("data"),
            api_key: Some("fake_key".to_string()),
            top_k: 4,
            ..Config::default()
        };
        let first = RagPipeline::shared(&config).await.unwrap();

        let other = Config {
            top_k: 9,
            ..config.clone()
        };
        let second = RagPipeline::shared(&other).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.top_k(), 4);
    }
}

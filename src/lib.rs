//! multimodal-rag - 로컬 멀티모달 RAG 시스템
//!
//! 문서와 이미지를 저장하고, 문서는 문장 단위 청크로 임베딩하며
//! 이미지는 비전 모델로 설명을 생성합니다.
//! 질문은 top-K 청크를 컨텍스트로 텍스트 모델에 전달해 답합니다.

pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod extractor;
pub mod generation;
pub mod knowledge;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports
pub use config::{get_api_key, get_data_dir, has_api_key, Config};
pub use embedding::{EmbeddingProvider, GeminiEmbedding};
pub use error::{Error, ExternalCallError, Result};
pub use extractor::ContentKind;
pub use generation::{GeminiText, GeminiVision, ImageInput, TextModel, VisionModel};
pub use knowledge::{
    build_prompt, KnowledgeStore, QaRecord, RagPipeline, RagPipelineBuilder, RecordId,
    RetrievedChunk, SeparatorPolicy, StoreStats,
};

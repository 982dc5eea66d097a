//! Knowledge 모듈 - 멀티모달 RAG 지식 저장소
//!
//! - Store: SQLite에 문서/청크/임베딩/이미지/QA 로그 저장
//! - Vector: 코사인 유사도 및 top-K 랭킹
//! - Chunker: 문장/문단 단위 텍스트 분할
//! - Pipeline: 저장 → 파생 → 검색 → 답변

mod chunker;
mod pipeline;
mod store;
mod vector;

// Re-exports
pub use chunker::{
    chunker_for, default_chunker, Chunker, ParagraphChunker, SentenceChunker, SeparatorPolicy,
};
pub use pipeline::{build_prompt, RagPipeline, RagPipelineBuilder, RecordId};
pub use store::{
    ChunkRecord, DocumentRecord, ImageRecord, KnowledgeStore, NewChunk, NewDocument, NewImage,
    QaRecord, StoreStats,
};
pub use vector::{cosine_similarity, rank_top_k, IndexedChunk, RetrievedChunk};

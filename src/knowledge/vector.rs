//! Vector Index - 유사도 계산 및 top-K 랭킹
//!
//! 벡터는 청크와 같은 SQLite DB에 BLOB으로 저장되며
//! 검색은 전체 벡터에 대한 정확한 코사인 스캔입니다.
//! 동점은 삽입 순서(먼저 삽입된 청크 우선)로 정렬됩니다.

use std::cmp::Ordering;

// ============================================================================
// Types
// ============================================================================

/// 인덱스된 청크 (검색 후보)
#[derive(Debug, Clone)]
pub struct IndexedChunk {
    /// 청크 ID (삽입 순서)
    pub chunk_id: i64,
    /// 소스 문서 ID
    pub doc_id: i64,
    /// 청크 텍스트
    pub text: String,
    /// 임베딩 벡터
    pub embedding: Vec<f32>,
}

/// 검색된 청크
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    /// 청크 ID
    pub chunk_id: i64,
    /// 소스 문서 ID
    pub doc_id: i64,
    /// 청크 텍스트
    pub text: String,
    /// 코사인 유사도 (-1.0 ~ 1.0, 높을수록 관련)
    pub score: f32,
}

// ============================================================================
// Utility Functions
// ============================================================================

/// 코사인 유사도 계산
///
/// 두 벡터 간의 코사인 유사도를 계산합니다.
/// 길이가 다르거나 영벡터가 포함되면 0.0을 반환합니다.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// 후보 청크를 질의 벡터와의 유사도로 정렬하여 상위 k개 반환
///
/// 후보는 삽입 순서대로 전달되어야 합니다.
/// 안정 정렬이므로 동점은 먼저 삽입된 청크가 앞에 옵니다.
pub fn rank_top_k(query: &[f32], candidates: Vec<IndexedChunk>, k: usize) -> Vec<RetrievedChunk> {
    if k == 0 {
        return Vec::new();
    }

    let mut scored: Vec<RetrievedChunk> = candidates
        .into_iter()
        .map(|c| RetrievedChunk {
            score: cosine_similarity(query, &c.embedding),
            chunk_id: c.chunk_id,
            doc_id: c.doc_id,
            text: c.text,
        })
        .collect();

    scored.sort_by(|a, b| compare_scores(b.score, a.score));
    scored.truncate(k);
    scored
}

/// NaN은 가장 낮은 점수로 취급
fn compare_scores(a: f32, b: f32) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

// ============================================================================
// BLOB Codec
// ============================================================================

/// 벡터를 little-endian f32 바이트로 인코딩
pub fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// little-endian f32 바이트를 벡터로 디코딩
///
/// 길이가 4의 배수가 아니면 None을 반환합니다.
pub fn decode_vector(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return None;
    }

    Some(
        bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect(),
    )
}

// ============================================================================
// Tests
// ============================================================================

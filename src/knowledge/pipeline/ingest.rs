//! 콘텐츠 저장 및 파생 (문서 청킹/임베딩, 이미지 설명)

use std::path::Path;

use sha2::{Digest, Sha256};

use super::{RagPipeline, RecordId};
use crate::error::{Error, Result};
use crate::extractor::{extract_document_text, sniff_document, sniff_image, ContentKind};
use crate::generation::ImageInput;
use crate::knowledge::store::{NewChunk, NewDocument, NewImage};

impl RagPipeline {
    /// 블롭 저장
    ///
    /// 경로의 바이트를 읽어 선언된 종류와 일치하는지 확인한 뒤
    /// 파생 데이터(청크+임베딩 또는 이미지 설명)까지 만든 후 기록합니다.
    ///
    /// # Errors
    /// - 경로를 읽을 수 없거나 종류가 맞지 않으면 `Error::Storage`
    /// - 임베딩/비전 호출 실패 시 `Error::ExternalCall` (아무 행도 기록되지 않음)
    pub async fn store(&self, kind: ContentKind, path: &Path) -> Result<RecordId> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| Error::storage(path, format!("Failed to read blob: {}", e)))?;

        let id = match kind {
            ContentKind::Document => self.ingest_document(path, bytes).await?,
            ContentKind::Image => self.annotate_image(path, &bytes).await?,
        };

        Ok(RecordId { kind, id })
    }

    /// 문서 저장
    pub async fn store_document(&self, path: &Path) -> Result<i64> {
        Ok(self.store(ContentKind::Document, path).await?.id)
    }

    /// 이미지 저장
    pub async fn store_image(&self, path: &Path) -> Result<i64> {
        Ok(self.store(ContentKind::Image, path).await?.id)
    }

    /// 가장 최근 이미지의 설명
    pub async fn describe_latest_image(&self) -> Result<String> {
        self.store
            .latest_image()?
            .map(|image| image.description)
            .ok_or_else(|| Error::NotFound("no images have been stored".to_string()))
    }

    async fn ingest_document(&self, path: &Path, bytes: Vec<u8>) -> Result<i64> {
        let format = sniff_document(path, &bytes)?;
        let content_hash = hex::encode(Sha256::digest(&bytes));

        let text = extract_document_text(path, bytes, format).await?;
        let texts = self.chunker.chunk(&text);

        if texts.is_empty() {
            tracing::warn!("No chunks generated for document: {:?}", path);
        } else {
            tracing::debug!(
                "Split {:?} into {} chunks ({})",
                path,
                texts.len(),
                self.chunker.name()
            );
        }

        // 모든 임베딩이 끝난 뒤에 기록
        let mut chunks = Vec::with_capacity(texts.len());
        for text in texts {
            let embedding = self.embed_text(&text).await?;
            chunks.push(NewChunk { text, embedding });
        }

        let doc = NewDocument {
            path: path.display().to_string(),
            format: format.as_str().to_string(),
            content_hash,
        };

        self.store.insert_document(&doc, &chunks)
    }

    async fn annotate_image(&self, path: &Path, bytes: &[u8]) -> Result<i64> {
        let format = sniff_image(path, bytes)?;
        let input = ImageInput {
            bytes,
            mime_type: format.mime_type(),
        };

        let description = self
            .call_external(self.vision.model_id(), self.vision.describe(input))
            .await?;

        self.store.insert_image(&NewImage {
            path: path.display().to_string(),
            mime_type: format.mime_type().to_string(),
            description,
            model: self.vision.model_id().to_string(),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

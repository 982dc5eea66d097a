//! 검색 및 답변 생성

use super::RagPipeline;
use crate::error::{Error, Result};
use crate::knowledge::store::QaRecord;
use crate::knowledge::vector::{rank_top_k, RetrievedChunk};

/// 프롬프트 템플릿
pub fn build_prompt(context: &str, question: &str) -> String {
    format!(
        "Context: {}\n\nQuestion: {}\n\nAnswer concisely using only the context above.",
        context, question
    )
}

impl RagPipeline {
    /// 질의와 가장 유사한 청크 k개 검색
    ///
    /// 점수 내림차순이며 동점은 먼저 저장된 청크가 앞에 옵니다.
    /// 인덱스가 비어 있으면 임베딩 호출 없이 빈 결과를 반환합니다.
    pub async fn retrieve_top_k(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let candidates = self.store.load_index()?;
        if candidates.is_empty() {
            tracing::debug!("Index is empty, skipping query embedding");
            return Ok(Vec::new());
        }

        let query_vector = self.embed_text(query).await?;
        let results = rank_top_k(&query_vector, candidates, k);

        tracing::debug!("Retrieved {} chunks for query", results.len());
        Ok(results)
    }

    /// 질문에 답하고 QA 로그에 기록
    ///
    /// # Errors
    /// - 질의 임베딩 실패 시 `Error::ExternalCall`
    /// - 텍스트 생성 실패/타임아웃 시 `Error::Generation` (QA 로그 기록 안 됨)
    pub async fn answer(&self, question: &str) -> Result<QaRecord> {
        let retrieved = self.retrieve_top_k(question, self.top_k).await?;
        let context = retrieved
            .iter()
            .map(|chunk| chunk.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = build_prompt(&context, question);
        let answer = self
            .call_external(self.text.model_id(), self.text.generate(&prompt))
            .await
            .map_err(Error::Generation)?;

        let record = self
            .store
            .insert_qa(question, &context, &answer, self.text.model_id())?;

        tracing::info!(
            "Answered question with {} context chunks (qa #{})",
            retrieved.len(),
            record.id
        );
        Ok(record)
    }

    /// 질문에 대한 답변 텍스트
    pub async fn ask(&self, question: &str) -> Result<String> {
        Ok(self.answer(question).await?.answer)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::knowledge::store::KnowledgeStore;
    use crate::testing::{test_pipeline, write_file, KeywordEmbedding, MockText, MockVision};
    use tempfile::TempDir;

    #[test]
    fn test_build_prompt_template() {
        let prompt = build_prompt("The sky is blue.", "What color is the sky?");
        assert_eq!(
            prompt,
            concat!(
                "Context: The sky is blue.\n\n",
                "Question: What color is the sky?\n\n",
                "Answer concisely using only the context above."
            )
        );
    }

    #[tokio::test]
    async fn test_retrieve_ranks_relevant_chunk_first() {
        let (dir, pipeline, _mocks) = test_pipeline();
        let path = write_file(&dir, "facts.txt", b"The sky is blue. Grass is green. Water is wet.");
        pipeline.store_document(&path).await.unwrap();

        let results = pipeline.retrieve_top_k("sky", 1).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].text, "The sky is blue.");

        let results = pipeline.retrieve_top_k("green grass", 1).await.unwrap();
        assert_eq!(results[0].text, "Grass is green.");
    }

    #[tokio::test]
    async fn test_retrieve_is_bounded_sorted_and_deterministic() {
        let (dir, pipeline, _mocks) = test_pipeline();
        let path = write_file(
            &dir,
            "facts.txt",
            b"The sky is blue. Grass is green. Water is wet. Blue water under a blue sky.",
        );
        pipeline.store_document(&path).await.unwrap();

        let first = pipeline.retrieve_top_k("blue sky", 3).await.unwrap();
        assert_eq!(first.len(), 3);
        assert!(first.windows(2).all(|w| w[0].score >= w[1].score));

        let second = pipeline.retrieve_top_k("blue sky", 3).await.unwrap();
        assert_eq!(first, second);

        let all = pipeline.retrieve_top_k("blue sky", 100).await.unwrap();
        assert_eq!(all.len(), 4);
        assert!(pipeline.retrieve_top_k("blue sky", 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_index_skips_embedding() {
        let (_dir, pipeline, mocks) = test_pipeline();

        let results = pipeline.retrieve_top_k("anything", 3).await.unwrap();
        assert!(results.is_empty());
        assert_eq!(mocks.embedder.calls(), 0);
    }

    #[tokio::test]
    async fn test_ask_empty_question_on_empty_index() {
        let (_dir, pipeline, mocks) = test_pipeline();

        let record = pipeline.answer("").await.unwrap();
        assert_eq!(record.context, "");
        assert_eq!(record.question, "");
        assert_eq!(mocks.text.last_prompt().unwrap(), build_prompt("", ""));
        assert_eq!(pipeline.knowledge_store().stats().unwrap().qa_count, 1);
    }

    #[tokio::test]
    async fn test_ask_uses_retrieved_context() {
        let (dir, pipeline, mocks) = test_pipeline();
        let path = write_file(&dir, "facts.txt", b"The sky is blue. Grass is green. Water is wet.");
        pipeline.store_document(&path).await.unwrap();

        let answer = pipeline.ask("What color is the sky?").await.unwrap();
        let prompt = mocks.text.last_prompt().unwrap();

        assert_eq!(answer, prompt);
        assert!(prompt.starts_with("Context: The sky is blue."));
        assert!(prompt.contains("Question: What color is the sky?"));

        let history = pipeline.knowledge_store().qa_history(10).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].answer, answer);
        assert_eq!(history[0].context.lines().count(), 3);
    }

    #[tokio::test]
    async fn test_generation_failure_is_not_logged() {
        let (dir, pipeline, mocks) = test_pipeline();
        let path = write_file(&dir, "facts.txt", b"The sky is blue.");
        pipeline.store_document(&path).await.unwrap();

        mocks.text.set_failing(true);
        let err = pipeline.ask("sky?").await.unwrap_err();
        assert!(matches!(err, Error::Generation(_)));
        assert_eq!(pipeline.knowledge_store().stats().unwrap().qa_count, 0);
    }

    #[tokio::test]
    async fn test_slow_generation_times_out() {
        let dir = TempDir::new().unwrap();
        let store = KnowledgeStore::open(&dir.path().join("rag.db")).unwrap();
        let pipeline = RagPipeline::builder(store)
            .embedder(Arc::new(KeywordEmbedding::new()))
            .vision(Arc::new(MockVision::new()))
            .text_model(Arc::new(MockText::hanging()))
            .timeout(Duration::from_millis(50))
            .build()
            .unwrap();

        let err = pipeline.ask("What color is the sky?").await.unwrap_err();
        match err {
            Error::Generation(source) => assert!(source.is_timeout()),
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(pipeline.knowledge_store().stats().unwrap().qa_count, 0);
    }
}

//! 테스트용 프로바이더 및 헬퍼

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use crate::embedding::EmbeddingProvider;
use crate::error::ExternalCallError;
use crate::generation::{ImageInput, TextModel, VisionModel};
use crate::knowledge::{KnowledgeStore, RagPipeline};

fn unavailable(provider: &str) -> ExternalCallError {
    ExternalCallError::Status {
        provider: provider.to_string(),
        status: 503,
        message: "UNAVAILABLE: mock failure".to_string(),
    }
}

// ============================================================================
// KeywordEmbedding
// ============================================================================

const VOCABULARY: [&str; 6] = ["sky", "grass", "water", "blue", "green", "wet"];

/// 고정 어휘의 단어 빈도 벡터
pub struct KeywordEmbedding {
    name: String,
    calls: AtomicUsize,
    fail_after: AtomicUsize,
}

impl KeywordEmbedding {
    pub fn new() -> Self {
        Self::named("keyword-embedding")
    }

    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            calls: AtomicUsize::new(0),
            fail_after: AtomicUsize::new(usize::MAX),
        }
    }

    /// n번 성공한 뒤부터 실패
    pub fn fail_after(&self, n: usize) {
        self.fail_after.store(n, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ExternalCallError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n >= self.fail_after.load(Ordering::SeqCst) {
            return Err(unavailable(&self.name));
        }

        let lower = text.to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();

        Ok(VOCABULARY
            .iter()
            .map(|term| words.iter().filter(|w| *w == term).count() as f32)
            .collect())
    }

    fn dimension(&self) -> usize {
        VOCABULARY.len()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ============================================================================
// MockVision
// ============================================================================

/// 호출마다 다른 설명을 반환하는 비전 모델
pub struct MockVision {
    calls: AtomicUsize,
    failing: AtomicBool,
    last: Mutex<Option<String>>,
}

impl MockVision {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
            last: Mutex::new(None),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_output(&self) -> Option<String> {
        self.last.lock().unwrap().clone()
    }
}

#[async_trait]
impl VisionModel for MockVision {
    async fn describe(&self, image: ImageInput<'_>) -> Result<String, ExternalCallError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(unavailable("mock-vision"));
        }

        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let description = format!(
            "Image #{}: a {} of {} bytes",
            n,
            image.mime_type,
            image.bytes.len()
        );
        *self.last.lock().unwrap() = Some(description.clone());
        Ok(description)
    }

    fn model_id(&self) -> &str {
        "mock-vision"
    }
}

// ============================================================================
// MockText
// ============================================================================

enum TextMode {
    Echo,
    Hanging,
}

/// 프롬프트를 그대로 돌려주는 텍스트 모델
pub struct MockText {
    mode: TextMode,
    failing: AtomicBool,
    last_prompt: Mutex<Option<String>>,
}

impl MockText {
    pub fn echo() -> Self {
        Self::with_mode(TextMode::Echo)
    }

    /// 응답하지 않는 모델 (타임아웃 테스트용)
    pub fn hanging() -> Self {
        Self::with_mode(TextMode::Hanging)
    }

    fn with_mode(mode: TextMode) -> Self {
        Self {
            mode,
            failing: AtomicBool::new(false),
            last_prompt: Mutex::new(None),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.last_prompt.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextModel for MockText {
    async fn generate(&self, prompt: &str) -> Result<String, ExternalCallError> {
        *self.last_prompt.lock().unwrap() = Some(prompt.to_string());

        if self.failing.load(Ordering::SeqCst) {
            return Err(unavailable("mock-text"));
        }

        match self.mode {
            TextMode::Echo => Ok(prompt.to_string()),
            TextMode::Hanging => {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(String::new())
            }
        }
    }

    fn model_id(&self) -> &str {
        "mock-text"
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// 파이프라인에 주입된 목 프로바이더 핸들
pub struct Mocks {
    pub embedder: Arc<KeywordEmbedding>,
    pub vision: Arc<MockVision>,
    pub text: Arc<MockText>,
}

/// 임시 DB 위의 목 파이프라인
pub fn test_pipeline() -> (TempDir, RagPipeline, Mocks) {
    let dir = TempDir::new().unwrap();
    let store = KnowledgeStore::open(&dir.path().join("rag.db")).unwrap();

    let mocks = Mocks {
        embedder: Arc::new(KeywordEmbedding::new()),
        vision: Arc::new(MockVision::new()),
        text: Arc::new(MockText::echo()),
    };

    let pipeline = RagPipeline::builder(store)
        .embedder(mocks.embedder.clone())
        .vision(mocks.vision.clone())
        .text_model(mocks.text.clone())
        .build()
        .unwrap();

    (dir, pipeline, mocks)
}

pub fn write_file(dir: &TempDir, name: &str, contents: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

/// PNG 시그니처 + seed 바이트
pub fn png_bytes(seed: u8) -> Vec<u8> {
    let mut bytes = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR".to_vec();
    bytes.extend(std::iter::repeat(seed).take(16 + seed as usize));
    bytes
}

/// 한 페이지짜리 PDF (Helvetica 텍스트 한 줄, xref 오프셋 계산)
pub fn pdf_bytes(text: &str) -> Vec<u8> {
    let stream = format!("BT /F1 12 Tf 72 712 Td ({}) Tj ET", text);
    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
         /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >>"
            .to_string(),
        format!(
            "<< /Length {} >>\nstream\n{}\nendstream",
            stream.len(),
            stream
        ),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica \
         /Encoding /WinAnsiEncoding >>"
            .to_string(),
    ];

    let mut pdf = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.extend(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).into_bytes());
    }

    let xref_at = pdf.len();
    let mut xref = format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
    for offset in offsets {
        xref.push_str(&format!("{:010} 00000 n \n", offset));
    }
    xref.push_str(&format!(
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
        objects.len() + 1,
        xref_at
    ));
    pdf.extend(xref.into_bytes());
    pdf
}

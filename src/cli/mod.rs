//! CLI 모듈
//!
//! mmrag CLI 명령어 정의 및 구현

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::knowledge::{KnowledgeStore, RagPipeline};

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "mmrag")]
#[command(version, about = "로컬 멀티모달 RAG 시스템", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 문서(PDF, 텍스트)를 저장하고 청크 임베딩 생성
    AddDoc {
        /// 문서 파일 경로
        path: PathBuf,
    },

    /// 이미지를 저장하고 비전 모델 설명 생성
    AddImage {
        /// 이미지 파일 경로
        path: PathBuf,
    },

    /// 저장된 문서를 근거로 질문에 답변
    Ask {
        /// 질문
        question: String,
    },

    /// 가장 최근 이미지의 설명 출력
    DescribeLatest,

    /// 질의와 유사한 청크 검색
    Search {
        /// 검색 쿼리
        query: String,

        /// 결과 개수
        #[arg(short, default_value = "3")]
        k: usize,
    },

    /// 저장된 문서 또는 이미지 목록
    List {
        /// 이미지 목록 표시
        #[arg(long)]
        images: bool,

        /// 결과 개수 제한
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// 문서 또는 이미지 삭제
    Delete {
        /// 삭제할 문서 ID (청크와 벡터도 함께 삭제)
        #[arg(long, conflicts_with = "image")]
        doc: Option<i64>,

        /// 삭제할 이미지 ID
        #[arg(long)]
        image: Option<i64>,
    },

    /// 질문/답변 기록
    History {
        /// 결과 개수 제한
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// 상태 확인
    Status,
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    let config = Config::from_env().context("설정 로드 실패")?;

    match cli.command {
        Commands::AddDoc { path } => cmd_add_doc(&config, path).await,
        Commands::AddImage { path } => cmd_add_image(&config, path).await,
        Commands::Ask { question } => cmd_ask(&config, &question).await,
        Commands::DescribeLatest => cmd_describe_latest(&config),
        Commands::Search { query, k } => cmd_search(&config, &query, k).await,
        Commands::List { images, limit } => cmd_list(&config, images, limit),
        Commands::Delete { doc, image } => cmd_delete(&config, doc, image),
        Commands::History { limit } => cmd_history(&config, limit),
        Commands::Status => cmd_status(&config),
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// API 키 확인 후 파이프라인 초기화
async fn pipeline(config: &Config) -> Result<Arc<RagPipeline>> {
    if config.api_key.is_none() {
        bail!(
            "API 키가 설정되지 않았습니다.\n\n\
             설정 방법:\n  \
             export GEMINI_API_KEY=your-api-key\n  \
             또는\n  \
             export GOOGLE_AI_API_KEY=your-api-key\n\n\
             API 키 발급: https://aistudio.google.com/app/apikey"
        );
    }

    RagPipeline::shared(config)
        .await
        .context("RagPipeline 초기화 실패")
}

fn open_store(config: &Config) -> Result<KnowledgeStore> {
    KnowledgeStore::open(&config.db_path()).context("KnowledgeStore 열기 실패")
}

/// 문서 저장 명령어 (add-doc)
async fn cmd_add_doc(config: &Config, path: PathBuf) -> Result<()> {
    let pipeline = pipeline(config).await?;

    println!("[*] 문서 저장 및 임베딩 생성 중: {}", path.display());

    let doc_id = pipeline
        .store_document(&path)
        .await
        .context("문서 추가 실패")?;
    let chunks = pipeline
        .knowledge_store()
        .chunks_for_document(doc_id)
        .context("청크 조회 실패")?;

    println!("[OK] 문서가 추가되었습니다 (ID: {})", doc_id);
    println!("     청크: {} 개", chunks.len());

    Ok(())
}

/// 이미지 저장 명령어 (add-image)
async fn cmd_add_image(config: &Config, path: PathBuf) -> Result<()> {
    let pipeline = pipeline(config).await?;

    println!("[*] 이미지 설명 생성 중: {}", path.display());

    let image_id = pipeline
        .store_image(&path)
        .await
        .context("이미지 추가 실패")?;
    let description = pipeline
        .describe_latest_image()
        .await
        .context("이미지 설명 조회 실패")?;

    println!("[OK] 이미지가 추가되었습니다 (ID: {})", image_id);
    println!();
    println!("{}", description);

    Ok(())
}

/// 질문 명령어 (ask)
async fn cmd_ask(config: &Config, question: &str) -> Result<()> {
    let pipeline = pipeline(config).await?;

    println!("[*] 답변 생성 중: \"{}\"", question);

    let record = pipeline.answer(question).await.context("답변 생성 실패")?;

    if record.context.is_empty() {
        println!("[!] 관련 문서가 없습니다. 컨텍스트 없이 답변합니다.");
    }

    println!();
    println!("{}", record.answer);

    Ok(())
}

/// 최근 이미지 설명 명령어 (describe-latest)
///
/// 저장된 설명만 읽으므로 API 키 없이 저장소를 직접 조회합니다.
fn cmd_describe_latest(config: &Config) -> Result<()> {
    let store = open_store(config)?;

    match store.latest_image().context("이미지 조회 실패")? {
        Some(image) => {
            println!("[OK] 이미지 #{} ({})", image.id, image.path);
            println!();
            println!("{}", image.description);
        }
        None => println!("[!] 저장된 이미지가 없습니다."),
    }

    Ok(())
}

/// 검색 명령어 (search)
async fn cmd_search(config: &Config, query: &str, k: usize) -> Result<()> {
    let pipeline = pipeline(config).await?;

    println!("[*] 검색 중: \"{}\"", query);

    let results = pipeline
        .retrieve_top_k(query, k)
        .await
        .context("검색 실패")?;

    if results.is_empty() {
        println!("\n[!] 검색 결과가 없습니다.");
        return Ok(());
    }

    println!("\n[OK] 검색 결과 ({} 건):\n", results.len());

    for (i, result) in results.iter().enumerate() {
        println!(
            "{}. [점수: {:.4}] Doc #{} / Chunk #{}",
            i + 1,
            result.score,
            result.doc_id,
            result.chunk_id
        );
        println!("   내용: {}", truncate_text(&result.text, 200));
        println!();
    }

    Ok(())
}

/// 목록 명령어 (list)
fn cmd_list(config: &Config, images: bool, limit: usize) -> Result<()> {
    let store = open_store(config)?;

    if images {
        let images = store.list_images(limit).context("이미지 목록 조회 실패")?;

        if images.is_empty() {
            println!("[!] 저장된 이미지가 없습니다.");
            return Ok(());
        }

        println!("[OK] 저장된 이미지 ({} 건):\n", images.len());

        for image in images {
            println!("  #{:<4} [{}] {}", image.id, image.mime_type, image.path);
            println!("        {}", truncate_text(&image.description, 80));
            println!(
                "        {} | {}",
                image.created_at.format("%Y-%m-%d %H:%M"),
                image.model
            );
            println!();
        }

        return Ok(());
    }

    let docs = store.list_documents(limit).context("문서 목록 조회 실패")?;

    if docs.is_empty() {
        println!("[!] 저장된 문서가 없습니다.");
        return Ok(());
    }

    println!("[OK] 저장된 문서 ({} 건):\n", docs.len());

    for doc in docs {
        let chunks = store
            .chunks_for_document(doc.id)
            .context("청크 조회 실패")?;

        println!("  #{:<4} [{}] {}", doc.id, doc.format, doc.path);
        println!(
            "        {} | {} chunks | sha256 {}",
            doc.created_at.format("%Y-%m-%d %H:%M"),
            chunks.len(),
            truncate_text(&doc.content_hash, 12)
        );
        println!();
    }

    Ok(())
}

/// 삭제 명령어 (delete)
fn cmd_delete(config: &Config, doc: Option<i64>, image: Option<i64>) -> Result<()> {
    let store = open_store(config)?;

    match (doc, image) {
        (Some(id), _) => {
            if store.delete_document(id).context("문서 삭제 실패")? {
                println!("[OK] 문서 #{} 삭제됨 (청크/벡터 포함)", id);
            } else {
                println!("[!] ID {}인 문서를 찾을 수 없습니다", id);
            }
        }
        (None, Some(id)) => {
            if store.delete_image(id).context("이미지 삭제 실패")? {
                println!("[OK] 이미지 #{} 삭제됨", id);
            } else {
                println!("[!] ID {}인 이미지를 찾을 수 없습니다", id);
            }
        }
        (None, None) => bail!("--doc 또는 --image 중 하나를 지정해야 합니다"),
    }

    Ok(())
}

/// 기록 명령어 (history)
fn cmd_history(config: &Config, limit: usize) -> Result<()> {
    let store = open_store(config)?;
    let records = store.qa_history(limit).context("기록 조회 실패")?;

    if records.is_empty() {
        println!("[!] 질문 기록이 없습니다.");
        return Ok(());
    }

    println!("[OK] 질문 기록 ({} 건):\n", records.len());

    for record in records {
        println!(
            "  #{:<4} {} | {}",
            record.id,
            record.created_at.format("%Y-%m-%d %H:%M"),
            record.model
        );
        println!("        Q: {}", truncate_text(&record.question, 80));
        println!("        A: {}", truncate_text(&record.answer, 80));
        println!();
    }

    Ok(())
}

/// 상태 명령어 (status)
fn cmd_status(config: &Config) -> Result<()> {
    println!("mmrag v{}", env!("CARGO_PKG_VERSION"));
    println!();

    println!("[*] 데이터 디렉토리: {}", config.data_dir.display());

    if config.api_key.is_some() {
        println!("[OK] API 키: 설정됨");
    } else {
        println!("[!] API 키: 미설정");
        println!("    설정: export GEMINI_API_KEY=your-key");
    }

    println!(
        "[*] 모델: vision={}, text={}, embedding dim={}",
        config.vision_model, config.text_model, config.embedding_dimension
    );
    println!(
        "[*] top-K: {}, 분할: {}, 타임아웃: {}s",
        config.top_k,
        config.separators,
        config.timeout.as_secs()
    );

    match KnowledgeStore::open(&config.db_path()) {
        Ok(store) => {
            match store.embedding_binding() {
                Ok(Some((name, dim))) => println!("[OK] 임베딩 함수: {} ({}차원)", name, dim),
                Ok(None) => println!("[*] 임베딩 함수: 미지정"),
                Err(e) => println!("[!] 임베딩 함수 조회 실패: {}", e),
            }

            match store.stats() {
                Ok(stats) => {
                    println!(
                        "[OK] 문서: {} 건, 청크: {} 개, 벡터: {} 개",
                        stats.document_count, stats.chunk_count, stats.vector_count
                    );
                    println!(
                        "[OK] 이미지: {} 건, 질문 기록: {} 건",
                        stats.image_count, stats.qa_count
                    );
                    if let Ok(meta) = std::fs::metadata(&stats.db_path) {
                        println!("     DB 크기: {}", format_bytes(meta.len() as usize));
                    }
                }
                Err(e) => {
                    println!("[!] 통계 조회 실패: {}", e);
                }
            }
        }
        Err(e) => {
            println!("[!] KnowledgeStore 열기 실패: {}", e);
        }
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 텍스트 자르기 (UTF-8 안전)
fn truncate_text(text: &str, max_chars: usize) -> String {
    let cleaned = text.replace('\n', " ").replace('\r', "");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= max_chars {
        cleaned.to_string()
    } else {
        let truncated: String = cleaned.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

/// 바이트 크기 포맷팅
fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

// ============================================================================
// Tests
// ============================================================================

//! Knowledge Store - rusqlite 기반 콘텐츠 저장소
//!
//! 문서, 청크, 임베딩, 이미지, QA 로그를 하나의 SQLite DB에 저장합니다.
//! 저장 위치: ~/.multimodal-rag/multimodal.db
//!
//! 청크와 임베딩은 문서를 참조하며 `ON DELETE CASCADE`로 함께 삭제됩니다.
//! 문서 한 건의 행들은 하나의 트랜잭션으로 기록됩니다.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};
use serde::Serialize;

use super::vector::{decode_vector, encode_vector, IndexedChunk};
use crate::error::{Error, Result};

const META_EMBEDDING_NAME: &str = "embedding_name";
const META_EMBEDDING_DIMENSION: &str = "embedding_dimension";

// ============================================================================
// Types
// ============================================================================

/// 저장된 문서
#[derive(Debug, Clone, Serialize)]
pub struct DocumentRecord {
    pub id: i64,
    pub path: String,
    pub format: String,
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
}

/// 새 문서 입력
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub path: String,
    pub format: String,
    pub content_hash: String,
}

/// 새 청크 입력 (텍스트 + 임베딩)
#[derive(Debug, Clone)]
pub struct NewChunk {
    pub text: String,
    pub embedding: Vec<f32>,
}

/// 저장된 청크
#[derive(Debug, Clone, Serialize)]
pub struct ChunkRecord {
    pub id: i64,
    pub doc_id: i64,
    pub chunk_index: i64,
    pub text: String,
}

/// 저장된 이미지와 설명
#[derive(Debug, Clone, Serialize)]
pub struct ImageRecord {
    pub id: i64,
    pub path: String,
    pub mime_type: String,
    pub description: String,
    pub model: String,
    pub created_at: DateTime<Utc>,
}

/// 새 이미지 입력
#[derive(Debug, Clone)]
pub struct NewImage {
    pub path: String,
    pub mime_type: String,
    pub description: String,
    pub model: String,
}

/// 질의응답 기록
#[derive(Debug, Clone, Serialize)]
pub struct QaRecord {
    pub id: i64,
    pub question: String,
    pub context: String,
    pub answer: String,
    pub model: String,
    pub created_at: DateTime<Utc>,
}

/// 저장소 통계
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub document_count: usize,
    pub chunk_count: usize,
    pub vector_count: usize,
    pub image_count: usize,
    pub qa_count: usize,
    pub db_path: PathBuf,
}

// ============================================================================
// KnowledgeStore
// ============================================================================

/// Knowledge Store - SQLite 콘텐츠 저장소
#[derive(Clone)]
pub struct KnowledgeStore {
    conn: Arc<Mutex<Connection>>,
    db_path: PathBuf,
}

impl KnowledgeStore {
    /// 저장소 열기 (없으면 생성) 후 스키마 보장
    ///
    /// # Arguments
    /// * `path` - DB 파일 경로
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    Error::storage(parent, format!("Failed to create database directory: {}", e))
                })?;
            }
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        // 외래키는 연결 단위 설정
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: path.to_path_buf(),
        };

        store.ensure_schema()?;
        Ok(store)
    }

    /// DB 경로 반환
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // 패닉한 쓰기는 트랜잭션 drop으로 롤백되므로 잠금을 회수해도 안전
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 스키마 초기화 (멱등)
    pub fn ensure_schema(&self) -> Result<()> {
        let conn = self.conn();

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                path TEXT NOT NULL,
                format TEXT NOT NULL,
                content_hash TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS chunks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                doc_id INTEGER NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
                chunk_index INTEGER NOT NULL,
                text TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_chunks_doc_id ON chunks(doc_id);

            CREATE TABLE IF NOT EXISTS embeddings (
                chunk_id INTEGER PRIMARY KEY REFERENCES chunks(id) ON DELETE CASCADE,
                vector BLOB NOT NULL
            );

            CREATE TABLE IF NOT EXISTS index_meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS images (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                path TEXT NOT NULL,
                mime_type TEXT NOT NULL,
                description TEXT NOT NULL,
                model TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS qa_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                question TEXT NOT NULL,
                context TEXT NOT NULL,
                answer TEXT NOT NULL,
                model TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            "#,
        )?;

        tracing::debug!("Knowledge store schema ready at {:?}", self.db_path);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Embedding binding
    // ------------------------------------------------------------------------

    /// 인덱스에 기록된 임베딩 함수 (이름, 차원)
    pub fn embedding_binding(&self) -> Result<Option<(String, usize)>> {
        let conn = self.conn();
        read_binding(&conn)
    }

    /// 임베딩 함수를 인덱스에 바인딩
    ///
    /// 처음 호출되면 기록합니다. 다른 함수가 기록되어 있을 때
    /// 저장된 벡터가 하나라도 있으면 `IndexConfig` 에러이고,
    /// 벡터가 없으면(모든 문서 삭제 후 등) 새 함수로 다시 바인딩합니다.
    pub fn bind_embedding(&self, name: &str, dimension: usize) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        match read_binding(&tx)? {
            Some((bound_name, bound_dim)) if bound_name == name && bound_dim == dimension => {}
            Some((bound_name, bound_dim)) => {
                if count(&tx, "SELECT COUNT(*) FROM embeddings")? > 0 {
                    return Err(Error::IndexConfig(format!(
                        "index was built with '{}' ({} dims) but '{}' ({} dims) is configured",
                        bound_name, bound_dim, name, dimension
                    )));
                }
                write_binding(&tx, name, dimension)?;
                tracing::info!(
                    "Rebound empty embedding index from {} ({} dims) to {} ({} dims)",
                    bound_name,
                    bound_dim,
                    name,
                    dimension
                );
            }
            None => {
                write_binding(&tx, name, dimension)?;
                tracing::info!("Bound embedding index to {} ({} dims)", name, dimension);
            }
        }

        tx.commit()?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Documents & chunks
    // ------------------------------------------------------------------------

    /// 문서와 청크/임베딩을 하나의 트랜잭션으로 저장
    pub fn insert_document(&self, doc: &NewDocument, chunks: &[NewChunk]) -> Result<i64> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339();

        tx.execute(
            "INSERT INTO documents (path, format, content_hash, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![doc.path, doc.format, doc.content_hash, now],
        )?;
        let doc_id = tx.last_insert_rowid();

        {
            let mut insert_chunk = tx.prepare(
                "INSERT INTO chunks (doc_id, chunk_index, text) VALUES (?1, ?2, ?3)",
            )?;
            let mut insert_vector =
                tx.prepare("INSERT INTO embeddings (chunk_id, vector) VALUES (?1, ?2)")?;

            for (i, chunk) in chunks.iter().enumerate() {
                insert_chunk.execute(params![doc_id, i as i64, chunk.text])?;
                let chunk_id = tx.last_insert_rowid();
                insert_vector.execute(params![chunk_id, encode_vector(&chunk.embedding)])?;
            }
        }

        tx.commit()?;
        tracing::info!(
            "Added document: {} (id={}, chunks={})",
            doc.path,
            doc_id,
            chunks.len()
        );

        Ok(doc_id)
    }

    /// ID로 문서 조회
    pub fn get_document(&self, id: i64) -> Result<Option<DocumentRecord>> {
        let conn = self.conn();
        let doc = conn
            .query_row(
                "SELECT id, path, format, content_hash, created_at FROM documents WHERE id = ?1",
                params![id],
                map_document,
            )
            .optional()?;
        Ok(doc)
    }

    /// 문서 목록 조회 (최신순)
    pub fn list_documents(&self, limit: usize) -> Result<Vec<DocumentRecord>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, path, format, content_hash, created_at FROM documents
             ORDER BY id DESC
             LIMIT ?1",
        )?;
        let docs = stmt
            .query_map(params![limit as i64], map_document)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(docs)
    }

    /// 문서 삭제 (청크와 임베딩은 cascade로 삭제)
    pub fn delete_document(&self, id: i64) -> Result<bool> {
        let conn = self.conn();
        let rows = conn.execute("DELETE FROM documents WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    /// 문서의 청크 목록 (원문 순서)
    pub fn chunks_for_document(&self, doc_id: i64) -> Result<Vec<ChunkRecord>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, doc_id, chunk_index, text FROM chunks
             WHERE doc_id = ?1
             ORDER BY chunk_index",
        )?;
        let chunks = stmt
            .query_map(params![doc_id], |row| {
                Ok(ChunkRecord {
                    id: row.get(0)?,
                    doc_id: row.get(1)?,
                    chunk_index: row.get(2)?,
                    text: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(chunks)
    }

    /// 전체 청크 수
    pub fn chunk_count(&self) -> Result<usize> {
        let conn = self.conn();
        count(&conn, "SELECT COUNT(*) FROM chunks")
    }

    /// 인덱스 전체 로드 (삽입 순서)
    pub fn load_index(&self) -> Result<Vec<IndexedChunk>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT c.id, c.doc_id, c.text, e.vector
             FROM chunks c
             JOIN embeddings e ON e.chunk_id = c.id
             ORDER BY c.id ASC",
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Vec<u8>>(3)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(chunk_id, doc_id, text, blob)| {
                let embedding = decode_vector(&blob).ok_or_else(|| {
                    Error::IndexConfig(format!("corrupt vector for chunk {}", chunk_id))
                })?;
                Ok(IndexedChunk {
                    chunk_id,
                    doc_id,
                    text,
                    embedding,
                })
            })
            .collect()
    }

    // ------------------------------------------------------------------------
    // Images
    // ------------------------------------------------------------------------

    /// 이미지와 설명 저장
    pub fn insert_image(&self, image: &NewImage) -> Result<i64> {
        let conn = self.conn();
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO images (path, mime_type, description, model, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![image.path, image.mime_type, image.description, image.model, now],
        )?;

        let id = conn.last_insert_rowid();
        tracing::info!("Added image: {} (id={})", image.path, id);
        Ok(id)
    }

    /// 가장 최근에 저장된 이미지
    pub fn latest_image(&self) -> Result<Option<ImageRecord>> {
        let conn = self.conn();
        let image = conn
            .query_row(
                "SELECT id, path, mime_type, description, model, created_at FROM images
                 ORDER BY id DESC
                 LIMIT 1",
                [],
                map_image,
            )
            .optional()?;
        Ok(image)
    }

    /// 이미지 목록 조회 (최신순)
    pub fn list_images(&self, limit: usize) -> Result<Vec<ImageRecord>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, path, mime_type, description, model, created_at FROM images
             ORDER BY id DESC
             LIMIT ?1",
        )?;
        let images = stmt
            .query_map(params![limit as i64], map_image)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(images)
    }

    /// 이미지 삭제
    pub fn delete_image(&self, id: i64) -> Result<bool> {
        let conn = self.conn();
        let rows = conn.execute("DELETE FROM images WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    // ------------------------------------------------------------------------
    // QA log
    // ------------------------------------------------------------------------

    /// QA 기록 추가
    pub fn insert_qa(
        &self,
        question: &str,
        context: &str,
        answer: &str,
        model: &str,
    ) -> Result<QaRecord> {
        let conn = self.conn();
        let created_at = Utc::now();

        conn.execute(
            "INSERT INTO qa_log (question, context, answer, model, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![question, context, answer, model, created_at.to_rfc3339()],
        )?;

        Ok(QaRecord {
            id: conn.last_insert_rowid(),
            question: question.to_string(),
            context: context.to_string(),
            answer: answer.to_string(),
            model: model.to_string(),
            created_at,
        })
    }

    /// QA 기록 조회 (최신순)
    pub fn qa_history(&self, limit: usize) -> Result<Vec<QaRecord>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, question, context, answer, model, created_at FROM qa_log
             ORDER BY id DESC
             LIMIT ?1",
        )?;
        let records = stmt
            .query_map(params![limit as i64], |row| {
                Ok(QaRecord {
                    id: row.get(0)?,
                    question: row.get(1)?,
                    context: row.get(2)?,
                    answer: row.get(3)?,
                    model: row.get(4)?,
                    created_at: parse_datetime(row.get::<_, String>(5)?),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    /// 저장소 통계
    pub fn stats(&self) -> Result<StoreStats> {
        let conn = self.conn();

        Ok(StoreStats {
            document_count: count(&conn, "SELECT COUNT(*) FROM documents")?,
            chunk_count: count(&conn, "SELECT COUNT(*) FROM chunks")?,
            vector_count: count(&conn, "SELECT COUNT(*) FROM embeddings")?,
            image_count: count(&conn, "SELECT COUNT(*) FROM images")?,
            qa_count: count(&conn, "SELECT COUNT(*) FROM qa_log")?,
            db_path: self.db_path.clone(),
        })
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn read_binding(conn: &Connection) -> Result<Option<(String, usize)>> {
    let get = |key: &str| -> rusqlite::Result<Option<String>> {
        conn.query_row(
            "SELECT value FROM index_meta WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
    };

    match (get(META_EMBEDDING_NAME)?, get(META_EMBEDDING_DIMENSION)?) {
        (Some(name), Some(dim)) => {
            let dim = dim.parse::<usize>().map_err(|_| {
                Error::IndexConfig(format!("invalid stored embedding dimension '{}'", dim))
            })?;
            Ok(Some((name, dim)))
        }
        _ => Ok(None),
    }
}

fn write_binding(conn: &Connection, name: &str, dimension: usize) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO index_meta (key, value) VALUES (?1, ?2)",
        params![META_EMBEDDING_NAME, name],
    )?;
    conn.execute(
        "INSERT OR REPLACE INTO index_meta (key, value) VALUES (?1, ?2)",
        params![META_EMBEDDING_DIMENSION, dimension.to_string()],
    )?;
    Ok(())
}

fn count(conn: &Connection, sql: &str) -> Result<usize> {
    let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
    Ok(n as usize)
}

fn map_document(row: &Row<'_>) -> rusqlite::Result<DocumentRecord> {
    Ok(DocumentRecord {
        id: row.get(0)?,
        path: row.get(1)?,
        format: row.get(2)?,
        content_hash: row.get(3)?,
        created_at: parse_datetime(row.get::<_, String>(4)?),
    })
}

fn map_image(row: &Row<'_>) -> rusqlite::Result<ImageRecord> {
    Ok(ImageRecord {
        id: row.get(0)?,
        path: row.get(1)?,
        mime_type: row.get(2)?,
        description: row.get(3)?,
        model: row.get(4)?,
        created_at: parse_datetime(row.get::<_, String>(5)?),
    })
}

/// RFC3339 문자열을 DateTime<Utc>로 파싱
fn parse_datetime(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

// ============================================================================
// Tests
// ============================================================================

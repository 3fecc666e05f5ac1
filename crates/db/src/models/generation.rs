use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

use super::flashcard::Flashcard;

/// Fingerprint of the text a generation ran against.
#[derive(Debug, Clone)]
pub struct SourceText {
    pub hash: String,
    pub length: i64,
}

/// One successful AI generation for a document.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Generation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub document_id: Uuid,
    pub model: String,
    pub source_text_hash: String,
    pub source_text_length: i64,
    pub generated_count: i64,
    pub generation_duration_ms: i64,
    pub created_at: DateTime<Utc>,
}

/// A failed AI generation, kept for diagnostics.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct GenerationError {
    pub id: Uuid,
    pub user_id: Uuid,
    pub document_id: Uuid,
    pub model: String,
    pub source_text_hash: String,
    pub source_text_length: i64,
    pub error_code: String,
    pub error_message: String,
    pub created_at: DateTime<Utc>,
}

/// Outcome of a (re)generation: the new batch and what it replaced.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct GenerationResult {
    pub generation: Generation,
    pub flashcards: Vec<Flashcard>,
    pub replaced_count: u64,
}

impl Generation {
    pub async fn create<'e, E>(
        executor: E,
        user_id: Uuid,
        document_id: Uuid,
        model: &str,
        source: &SourceText,
        generated_count: i64,
        generation_duration_ms: i64,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Generation>(
            r#"INSERT INTO generations (id, user_id, document_id, model, source_text_hash,
                                        source_text_length, generated_count, generation_duration_ms, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
               RETURNING id, user_id, document_id, model, source_text_hash, source_text_length,
                         generated_count, generation_duration_ms, created_at"#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(document_id)
        .bind(model)
        .bind(&source.hash)
        .bind(source.length)
        .bind(generated_count)
        .bind(generation_duration_ms)
        .bind(Utc::now())
        .fetch_one(executor)
        .await
    }

    /// Newest first; rows sharing a timestamp keep reverse insertion order.
    pub async fn find_by_document(
        pool: &SqlitePool,
        user_id: Uuid,
        document_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Generation>(
            r#"SELECT id, user_id, document_id, model, source_text_hash, source_text_length,
                      generated_count, generation_duration_ms, created_at
               FROM generations
               WHERE document_id = $1 AND user_id = $2
               ORDER BY created_at DESC, rowid DESC"#,
        )
        .bind(document_id)
        .bind(user_id)
        .fetch_all(pool)
        .await
    }
}

impl GenerationError {
    pub async fn create(
        pool: &SqlitePool,
        user_id: Uuid,
        document_id: Uuid,
        model: &str,
        source: &SourceText,
        error_code: &str,
        error_message: &str,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, GenerationError>(
            r#"INSERT INTO generation_errors (id, user_id, document_id, model, source_text_hash,
                                              source_text_length, error_code, error_message, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
               RETURNING id, user_id, document_id, model, source_text_hash, source_text_length,
                         error_code, error_message, created_at"#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(document_id)
        .bind(model)
        .bind(&source.hash)
        .bind(source.length)
        .bind(error_code)
        .bind(error_message)
        .bind(Utc::now())
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_document(
        pool: &SqlitePool,
        user_id: Uuid,
        document_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, GenerationError>(
            r#"SELECT id, user_id, document_id, model, source_text_hash, source_text_length,
                      error_code, error_message, created_at
               FROM generation_errors
               WHERE document_id = $1 AND user_id = $2
               ORDER BY created_at DESC, rowid DESC"#,
        )
        .bind(document_id)
        .bind(user_id)
        .fetch_all(pool)
        .await
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

use super::pagination::{PageRequest, SortOrder};

pub const NAME_MAX_CHARS: usize = 100;
pub const CONTENT_MIN_CHARS: usize = 1_000;
pub const CONTENT_MAX_CHARS: usize = 10_000;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, TS, EnumString, Display, Default)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DocumentSort {
    Name,
    #[default]
    CreatedAt,
    UpdatedAt,
}

impl DocumentSort {
    fn column(self) -> &'static str {
        match self {
            DocumentSort::Name => "d.name COLLATE NOCASE",
            DocumentSort::CreatedAt => "d.created_at",
            DocumentSort::UpdatedAt => "d.updated_at",
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Document {
    pub id: Uuid,
    pub user_id: Uuid,
    pub topic_id: Uuid,
    pub name: String,
    pub content: String,
    pub flashcard_count: i64,
    pub pending_flashcard_count: i64, // AI flashcards awaiting review
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// List row: everything but the content body.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct DocumentSummary {
    pub id: Uuid,
    pub topic_id: Uuid,
    pub name: String,
    pub content_length: i64,
    pub flashcard_count: i64,
    pub pending_flashcard_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateDocument {
    pub name: String,
    pub content: String,
    /// Run AI generation right after the document is stored.
    pub generate_flashcards: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateDocument {
    pub name: Option<String>,
    pub content: Option<String>,
}

const COUNT_COLUMNS: &str = r#"
    (SELECT COUNT(*) FROM flashcards f
      WHERE f.document_id = d.id AND f.is_disabled = 0) AS flashcard_count,
    (SELECT COUNT(*) FROM flashcards f
      WHERE f.document_id = d.id AND f.is_disabled = 0
        AND f.source = 'ai' AND f.is_approved = 0) AS pending_flashcard_count"#;

impl Document {
    pub async fn find_by_id(
        pool: &SqlitePool,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!(
            r#"SELECT d.id, d.user_id, d.topic_id, d.name, d.content, {COUNT_COLUMNS},
                      d.created_at, d.updated_at
               FROM documents d
               WHERE d.id = $1 AND d.user_id = $2"#
        );
        sqlx::query_as::<_, Document>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_page_by_topic(
        pool: &SqlitePool,
        user_id: Uuid,
        topic_id: Uuid,
        page: PageRequest,
        sort: DocumentSort,
        order: SortOrder,
    ) -> Result<(Vec<DocumentSummary>, i64), sqlx::Error> {
        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM documents WHERE topic_id = $1 AND user_id = $2",
        )
        .bind(topic_id)
        .bind(user_id)
        .fetch_one(pool)
        .await?;

        let sql = format!(
            r#"SELECT d.id, d.topic_id, d.name, length(d.content) AS content_length, {COUNT_COLUMNS},
                      d.created_at, d.updated_at
               FROM documents d
               WHERE d.topic_id = $1 AND d.user_id = $2
               ORDER BY {} {}, d.id ASC
               LIMIT $3 OFFSET $4"#,
            sort.column(),
            order.as_sql()
        );
        let documents = sqlx::query_as::<_, DocumentSummary>(&sql)
            .bind(topic_id)
            .bind(user_id)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(pool)
            .await?;

        Ok((documents, total))
    }

    /// Caller must have verified that `topic_id` belongs to `user_id`.
    pub async fn create(
        pool: &SqlitePool,
        user_id: Uuid,
        topic_id: Uuid,
        data: &CreateDocument,
        document_id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        let now = Utc::now();
        sqlx::query(
            r#"INSERT INTO documents (id, user_id, topic_id, name, content, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7)"#,
        )
        .bind(document_id)
        .bind(user_id)
        .bind(topic_id)
        .bind(&data.name)
        .bind(&data.content)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await?;

        Self::find_by_id(pool, user_id, document_id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn update(
        pool: &SqlitePool,
        user_id: Uuid,
        id: Uuid,
        name: Option<&str>,
        content: Option<&str>,
    ) -> Result<Option<Self>, sqlx::Error> {
        let result = sqlx::query(
            r#"UPDATE documents
               SET name = COALESCE($1, name),
                   content = COALESCE($2, content),
                   updated_at = $3
               WHERE id = $4 AND user_id = $5"#,
        )
        .bind(name)
        .bind(content)
        .bind(Utc::now())
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        Self::find_by_id(pool, user_id, id).await
    }

    /// Deletes the document; flashcards and generation records cascade.
    pub async fn delete(pool: &SqlitePool, user_id: Uuid, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM documents WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

use super::pagination::{PageRequest, SortOrder};

pub const NAME_MAX_CHARS: usize = 100;
pub const DESCRIPTION_MAX_CHARS: usize = 1_000;

/// Columns a topic list can be ordered by.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, TS, EnumString, Display, Default)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TopicSort {
    Name,
    #[default]
    CreatedAt,
    UpdatedAt,
}

impl TopicSort {
    fn column(self) -> &'static str {
        match self {
            TopicSort::Name => "t.name COLLATE NOCASE",
            TopicSort::CreatedAt => "t.created_at",
            TopicSort::UpdatedAt => "t.updated_at",
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Topic {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub document_count: i64,
    pub flashcard_count: i64, // non-disabled flashcards across all documents
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateTopic {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateTopic {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Key the per-user uniqueness index is built on. Full Unicode case folding,
/// so "Ćwiczenia" and "ćwiczenia" collide.
fn name_key(name: &str) -> String {
    name.to_lowercase()
}

const TOPIC_SELECT: &str = r#"SELECT
    t.id,
    t.user_id,
    t.name,
    t.description,
    (SELECT COUNT(*) FROM documents d WHERE d.topic_id = t.id) AS document_count,
    (SELECT COUNT(*)
       FROM flashcards f
       JOIN documents d ON d.id = f.document_id
      WHERE d.topic_id = t.id AND f.is_disabled = 0) AS flashcard_count,
    t.created_at,
    t.updated_at
FROM topics t"#;

impl Topic {
    pub async fn find_by_id(
        pool: &SqlitePool,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!("{TOPIC_SELECT} WHERE t.id = $1 AND t.user_id = $2");
        sqlx::query_as::<_, Topic>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Returns one page of the user's topics and the total count.
    pub async fn find_page(
        pool: &SqlitePool,
        user_id: Uuid,
        page: PageRequest,
        sort: TopicSort,
        order: SortOrder,
    ) -> Result<(Vec<Self>, i64), sqlx::Error> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM topics WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(pool)
            .await?;

        let sql = format!(
            "{TOPIC_SELECT} WHERE t.user_id = $1 ORDER BY {} {}, t.id ASC LIMIT $2 OFFSET $3",
            sort.column(),
            order.as_sql()
        );
        let topics = sqlx::query_as::<_, Topic>(&sql)
            .bind(user_id)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(pool)
            .await?;

        Ok((topics, total))
    }

    /// True when another topic of the same user already uses `name`.
    pub async fn name_taken(
        pool: &SqlitePool,
        user_id: Uuid,
        name: &str,
        except_id: Option<Uuid>,
    ) -> Result<bool, sqlx::Error> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"SELECT COUNT(*) FROM topics
               WHERE user_id = $1
                 AND name_key = $2
                 AND ($3 IS NULL OR id != $4)"#,
        )
        .bind(user_id)
        .bind(name_key(name))
        .bind(except_id)
        .bind(except_id)
        .fetch_one(pool)
        .await?;
        Ok(count > 0)
    }

    pub async fn create(
        pool: &SqlitePool,
        user_id: Uuid,
        data: &CreateTopic,
        topic_id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        let now = Utc::now();
        sqlx::query(
            r#"INSERT INTO topics (id, user_id, name, name_key, description, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7)"#,
        )
        .bind(topic_id)
        .bind(user_id)
        .bind(&data.name)
        .bind(name_key(&data.name))
        .bind(&data.description)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await?;

        Self::find_by_id(pool, user_id, topic_id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    /// Applies the provided fields; `None` leaves a column untouched.
    pub async fn update(
        pool: &SqlitePool,
        user_id: Uuid,
        id: Uuid,
        name: Option<&str>,
        description: Option<Option<&str>>,
    ) -> Result<Option<Self>, sqlx::Error> {
        let (set_description, description) = match description {
            Some(value) => (true, value),
            None => (false, None),
        };
        let result = sqlx::query(
            r#"UPDATE topics
               SET name = COALESCE($1, name),
                   name_key = COALESCE($2, name_key),
                   description = CASE WHEN $3 THEN $4 ELSE description END,
                   updated_at = $5
               WHERE id = $6 AND user_id = $7"#,
        )
        .bind(name)
        .bind(name.map(name_key))
        .bind(set_description)
        .bind(description)
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

    /// Deletes the topic; documents and flashcards cascade.
    pub async fn delete(pool: &SqlitePool, user_id: Uuid, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM topics WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, QueryBuilder, Sqlite, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

use super::pagination::{PageRequest, SortOrder};

pub const FRONT_MAX_CHARS: usize = 200;
pub const BACK_MAX_CHARS: usize = 500;

/// Origin of a flashcard
#[derive(Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, TS, EnumString, Display)]
#[sqlx(type_name = "flashcard_source", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FlashcardSource {
    Ai,
    Manual,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, TS, EnumString, Display, Default)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FlashcardSort {
    Front,
    #[default]
    CreatedAt,
    UpdatedAt,
}

impl FlashcardSort {
    fn column(self) -> &'static str {
        match self {
            FlashcardSort::Front => "front COLLATE NOCASE",
            FlashcardSort::CreatedAt => "created_at",
            FlashcardSort::UpdatedAt => "updated_at",
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Flashcard {
    pub id: Uuid,
    pub user_id: Uuid,
    pub document_id: Uuid,
    pub front: String,
    pub back: String,
    pub source: FlashcardSource,
    pub is_approved: bool,
    pub is_modified: bool, // AI card edited by the user
    pub is_disabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateFlashcard {
    pub front: String,
    pub back: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateFlashcard {
    pub front: Option<String>,
    pub back: Option<String>,
    pub is_disabled: Option<bool>,
}

/// Optional list filters. Disabled cards are hidden unless asked for.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlashcardFilter {
    pub source: Option<FlashcardSource>,
    pub approved: Option<bool>,
    pub include_disabled: bool,
}

/// What `delete` did to the card.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
pub enum DeleteOutcome {
    /// Unapproved AI card, removed outright.
    Removed,
    /// Kept but hidden.
    Disabled,
}

const FLASHCARD_COLUMNS: &str = "id, user_id, document_id, front, back, source, is_approved, is_modified, is_disabled, created_at, updated_at";

impl Flashcard {
    pub async fn find_by_id(
        pool: &SqlitePool,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!("SELECT {FLASHCARD_COLUMNS} FROM flashcards WHERE id = $1 AND user_id = $2");
        sqlx::query_as::<_, Flashcard>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_page_by_document(
        pool: &SqlitePool,
        user_id: Uuid,
        document_id: Uuid,
        filter: FlashcardFilter,
        page: PageRequest,
        sort: FlashcardSort,
        order: SortOrder,
    ) -> Result<(Vec<Self>, i64), sqlx::Error> {
        fn push_filters<'a>(
            builder: &mut QueryBuilder<'a, Sqlite>,
            user_id: Uuid,
            document_id: Uuid,
            filter: FlashcardFilter,
        ) {
            builder
                .push(" WHERE document_id = ")
                .push_bind(document_id)
                .push(" AND user_id = ")
                .push_bind(user_id);
            if let Some(source) = filter.source {
                builder.push(" AND source = ").push_bind(source);
            }
            if let Some(approved) = filter.approved {
                builder.push(" AND is_approved = ").push_bind(approved);
            }
            if !filter.include_disabled {
                builder.push(" AND is_disabled = 0");
            }
        }

        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM flashcards");
        push_filters(&mut count, user_id, document_id, filter);
        let total = count.build_query_scalar::<i64>().fetch_one(pool).await?;

        let mut select = QueryBuilder::<Sqlite>::new(format!("SELECT {FLASHCARD_COLUMNS} FROM flashcards"));
        push_filters(&mut select, user_id, document_id, filter);
        select
            .push(format!(" ORDER BY {} {}, id ASC", sort.column(), order.as_sql()))
            .push(" LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let flashcards = select.build_query_as::<Flashcard>().fetch_all(pool).await?;

        Ok((flashcards, total))
    }

    /// Inserts a card. Manual cards start approved, AI cards pending review.
    pub async fn create<'e, E>(
        executor: E,
        user_id: Uuid,
        document_id: Uuid,
        data: &CreateFlashcard,
        source: FlashcardSource,
        flashcard_id: Uuid,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let now = Utc::now();
        let sql = format!(
            r#"INSERT INTO flashcards (id, user_id, document_id, front, back, source, is_approved, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
               RETURNING {FLASHCARD_COLUMNS}"#
        );
        sqlx::query_as::<_, Flashcard>(&sql)
            .bind(flashcard_id)
            .bind(user_id)
            .bind(document_id)
            .bind(&data.front)
            .bind(&data.back)
            .bind(source)
            .bind(source == FlashcardSource::Manual)
            .bind(now)
            .bind(now)
            .fetch_one(executor)
            .await
    }

    /// Applies the provided fields. Changing the text of an AI card marks it modified.
    pub async fn update(
        pool: &SqlitePool,
        user_id: Uuid,
        id: Uuid,
        front: Option<&str>,
        back: Option<&str>,
        is_disabled: Option<bool>,
    ) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!(
            r#"UPDATE flashcards
               SET is_modified = CASE
                       WHEN source = 'ai' AND (COALESCE($1, front) != front OR COALESCE($2, back) != back) THEN 1
                       ELSE is_modified
                   END,
                   front = COALESCE($3, front),
                   back = COALESCE($4, back),
                   is_disabled = COALESCE($5, is_disabled),
                   updated_at = $6
               WHERE id = $7 AND user_id = $8
               RETURNING {FLASHCARD_COLUMNS}"#
        );
        sqlx::query_as::<_, Flashcard>(&sql)
            .bind(front)
            .bind(back)
            .bind(front)
            .bind(back)
            .bind(is_disabled)
            .bind(Utc::now())
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn approve(
        pool: &SqlitePool,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!(
            r#"UPDATE flashcards
               SET is_approved = 1, updated_at = $1
               WHERE id = $2 AND user_id = $3
               RETURNING {FLASHCARD_COLUMNS}"#
        );
        sqlx::query_as::<_, Flashcard>(&sql)
            .bind(Utc::now())
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Approves every listed card or none of them. Returns `None` when any id
    /// is unknown or belongs to another user; otherwise the ids that changed.
    pub async fn approve_selected(
        pool: &SqlitePool,
        user_id: Uuid,
        ids: &[Uuid],
    ) -> Result<Option<Vec<Uuid>>, sqlx::Error> {
        let unique: Vec<Uuid> = ids
            .iter()
            .copied()
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        if unique.is_empty() {
            return Ok(Some(Vec::new()));
        }

        // Write first: the transaction must hold the write lock before it reads.
        let mut tx = pool.begin().await?;

        let mut update = QueryBuilder::<Sqlite>::new("UPDATE flashcards SET is_approved = 1, updated_at = ");
        update
            .push_bind(Utc::now())
            .push(" WHERE is_approved = 0 AND user_id = ")
            .push_bind(user_id)
            .push(" AND id IN (");
        let mut separated = update.separated(", ");
        for id in &unique {
            separated.push_bind(*id);
        }
        separated.push_unseparated(") RETURNING id");
        let approved = update.build_query_scalar::<Uuid>().fetch_all(&mut *tx).await?;

        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM flashcards WHERE user_id = ");
        count.push_bind(user_id).push(" AND id IN (");
        let mut separated = count.separated(", ");
        for id in &unique {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");
        let owned = count.build_query_scalar::<i64>().fetch_one(&mut *tx).await?;
        if owned != unique.len() as i64 {
            tx.rollback().await?;
            return Ok(None);
        }

        tx.commit().await?;
        Ok(Some(approved))
    }

    /// Approves all pending AI cards of a document.
    pub async fn approve_all_pending(
        pool: &SqlitePool,
        user_id: Uuid,
        document_id: Uuid,
    ) -> Result<Vec<Uuid>, sqlx::Error> {
        sqlx::query_scalar::<_, Uuid>(
            r#"UPDATE flashcards
               SET is_approved = 1, updated_at = $1
               WHERE document_id = $2 AND user_id = $3
                 AND source = 'ai' AND is_approved = 0 AND is_disabled = 0
               RETURNING id"#,
        )
        .bind(Utc::now())
        .bind(document_id)
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    /// Rejects unapproved AI cards outright, disables everything else.
    pub async fn delete(
        pool: &SqlitePool,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<DeleteOutcome>, sqlx::Error> {
        let removed = sqlx::query(
            "DELETE FROM flashcards WHERE id = $1 AND user_id = $2 AND source = 'ai' AND is_approved = 0",
        )
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await?;
        if removed.rows_affected() > 0 {
            return Ok(Some(DeleteOutcome::Removed));
        }

        let disabled = sqlx::query(
            "UPDATE flashcards SET is_disabled = 1, updated_at = $1 WHERE id = $2 AND user_id = $3",
        )
        .bind(Utc::now())
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await?;
        if disabled.rows_affected() > 0 {
            return Ok(Some(DeleteOutcome::Disabled));
        }
        Ok(None)
    }

    /// Drops the AI cards a regeneration replaces: unapproved and unedited.
    pub async fn delete_replaceable<'e, E>(executor: E, document_id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query(
            r#"DELETE FROM flashcards
               WHERE document_id = $1 AND source = 'ai' AND is_approved = 0 AND is_modified = 0"#,
        )
        .bind(document_id)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{document::Document, test_support};

    struct Fixture {
        db: crate::DBService,
        user_id: Uuid,
        document_id: Uuid,
    }

    async fn fixture() -> Fixture {
        let db = test_support::db().await;
        let user = test_support::user(&db, "ada@example.com").await;
        let topic = test_support::topic(&db, user.id, "Rust").await;
        let document = test_support::document(&db, user.id, topic.id).await;
        Fixture {
            db,
            user_id: user.id,
            document_id: document.id,
        }
    }

    async fn card(f: &Fixture, front: &str, source: FlashcardSource) -> Flashcard {
        let data = CreateFlashcard {
            front: front.to_string(),
            back: "answer".to_string(),
        };
        Flashcard::create(&f.db.pool, f.user_id, f.document_id, &data, source, Uuid::new_v4())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn manual_cards_start_approved() {
        let f = fixture().await;
        let manual = card(&f, "What is a borrow?", FlashcardSource::Manual).await;
        let ai = card(&f, "What is a move?", FlashcardSource::Ai).await;
        assert!(manual.is_approved);
        assert!(!ai.is_approved);

        let doc = Document::find_by_id(&f.db.pool, f.user_id, f.document_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc.flashcard_count, 2);
        assert_eq!(doc.pending_flashcard_count, 1);
    }

    #[tokio::test]
    async fn editing_ai_text_marks_modified() {
        let f = fixture().await;
        let ai = card(&f, "Q", FlashcardSource::Ai).await;

        let same = Flashcard::update(&f.db.pool, f.user_id, ai.id, Some("Q"), None, None)
            .await
            .unwrap()
            .unwrap();
        assert!(!same.is_modified);

        let edited = Flashcard::update(&f.db.pool, f.user_id, ai.id, None, Some("better"), None)
            .await
            .unwrap()
            .unwrap();
        assert!(edited.is_modified);
        assert_eq!(edited.back, "better");
        assert_eq!(edited.front, "Q");
    }

    #[tokio::test]
    async fn delete_rejects_pending_and_disables_approved() {
        let f = fixture().await;
        let pending = card(&f, "pending", FlashcardSource::Ai).await;
        let manual = card(&f, "manual", FlashcardSource::Manual).await;

        assert_eq!(
            Flashcard::delete(&f.db.pool, f.user_id, pending.id).await.unwrap(),
            Some(DeleteOutcome::Removed)
        );
        assert!(Flashcard::find_by_id(&f.db.pool, f.user_id, pending.id).await.unwrap().is_none());

        assert_eq!(
            Flashcard::delete(&f.db.pool, f.user_id, manual.id).await.unwrap(),
            Some(DeleteOutcome::Disabled)
        );
        let disabled = Flashcard::find_by_id(&f.db.pool, f.user_id, manual.id)
            .await
            .unwrap()
            .unwrap();
        assert!(disabled.is_disabled);

        assert_eq!(Flashcard::delete(&f.db.pool, f.user_id, Uuid::new_v4()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn list_hides_disabled_and_filters() {
        let f = fixture().await;
        card(&f, "a", FlashcardSource::Ai).await;
        card(&f, "b", FlashcardSource::Manual).await;
        let hidden = card(&f, "c", FlashcardSource::Manual).await;
        Flashcard::delete(&f.db.pool, f.user_id, hidden.id).await.unwrap();

        let list = |filter| {
            Flashcard::find_page_by_document(
                &f.db.pool,
                f.user_id,
                f.document_id,
                filter,
                PageRequest::default(),
                FlashcardSort::Front,
                SortOrder::Asc,
            )
        };

        let (visible, total) = list(FlashcardFilter::default()).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(visible.len(), 2);

        let (all, total) = list(FlashcardFilter {
            include_disabled: true,
            ..Default::default()
        })
        .await
        .unwrap();
        assert_eq!(total, 3);
        assert_eq!(all[2].front, "c");

        let (pending, _) = list(FlashcardFilter {
            source: Some(FlashcardSource::Ai),
            approved: Some(false),
            ..Default::default()
        })
        .await
        .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].front, "a");
    }

    #[tokio::test]
    async fn approve_selected_is_all_or_nothing() {
        let f = fixture().await;
        let a = card(&f, "a", FlashcardSource::Ai).await;
        let b = card(&f, "b", FlashcardSource::Ai).await;

        let missing = Flashcard::approve_selected(&f.db.pool, f.user_id, &[a.id, Uuid::new_v4()])
            .await
            .unwrap();
        assert!(missing.is_none());
        let a_after = Flashcard::find_by_id(&f.db.pool, f.user_id, a.id).await.unwrap().unwrap();
        assert!(!a_after.is_approved);

        let mut approved = Flashcard::approve_selected(&f.db.pool, f.user_id, &[a.id, b.id, a.id])
            .await
            .unwrap()
            .unwrap();
        approved.sort();
        let mut expected = vec![a.id, b.id];
        expected.sort();
        assert_eq!(approved, expected);

        let again = Flashcard::approve_selected(&f.db.pool, f.user_id, &[a.id])
            .await
            .unwrap()
            .unwrap();
        assert!(again.is_empty());
    }

    #[tokio::test]
    async fn approve_selected_rolls_back_when_a_card_belongs_to_someone_else() {
        let f = fixture().await;
        let own = card(&f, "own", FlashcardSource::Ai).await;

        let bob = test_support::user(&f.db, "bob@example.com").await;
        let topic = test_support::topic(&f.db, bob.id, "Go").await;
        let document = test_support::document(&f.db, bob.id, topic.id).await;
        let foreign = Flashcard::create(
            &f.db.pool,
            bob.id,
            document.id,
            &CreateFlashcard {
                front: "foreign".to_string(),
                back: "answer".to_string(),
            },
            FlashcardSource::Ai,
            Uuid::new_v4(),
        )
        .await
        .unwrap();

        let result = Flashcard::approve_selected(&f.db.pool, f.user_id, &[own.id, foreign.id])
            .await
            .unwrap();
        assert!(result.is_none());

        let own_after = Flashcard::find_by_id(&f.db.pool, f.user_id, own.id).await.unwrap().unwrap();
        assert!(!own_after.is_approved);
        assert_eq!(own_after.updated_at, own.updated_at);
        let foreign_after = Flashcard::find_by_id(&f.db.pool, bob.id, foreign.id)
            .await
            .unwrap()
            .unwrap();
        assert!(!foreign_after.is_approved);
    }

    #[tokio::test]
    async fn approve_all_pending_skips_manual_and_approved() {
        let f = fixture().await;
        let a = card(&f, "a", FlashcardSource::Ai).await;
        card(&f, "m", FlashcardSource::Manual).await;

        let ids = Flashcard::approve_all_pending(&f.db.pool, f.user_id, f.document_id)
            .await
            .unwrap();
        assert_eq!(ids, vec![a.id]);
        assert!(
            Flashcard::approve_all_pending(&f.db.pool, f.user_id, f.document_id)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn replaceable_cards_exclude_approved_and_edited() {
        let f = fixture().await;
        card(&f, "plain", FlashcardSource::Ai).await;
        let edited = card(&f, "edited", FlashcardSource::Ai).await;
        let approved = card(&f, "approved", FlashcardSource::Ai).await;
        card(&f, "manual", FlashcardSource::Manual).await;
        Flashcard::update(&f.db.pool, f.user_id, edited.id, Some("edited!"), None, None)
            .await
            .unwrap();
        Flashcard::approve(&f.db.pool, f.user_id, approved.id).await.unwrap();

        assert_eq!(Flashcard::delete_replaceable(&f.db.pool, f.document_id).await.unwrap(), 1);
    }
}

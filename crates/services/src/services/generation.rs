//! Flashcard generation and regeneration for documents.

use std::{sync::Arc, time::Instant};

use db::models::{
    document::Document,
    flashcard::{CreateFlashcard, Flashcard, FlashcardSource},
    generation::{Generation, GenerationError, GenerationResult, SourceText},
};
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::flashcard_generator::{FlashcardGenerator, GeneratorError, normalize_drafts};

#[derive(Debug, Error)]
pub enum GenerationServiceError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("document not found")]
    DocumentNotFound,
    #[error(transparent)]
    Generator(#[from] GeneratorError),
}

pub struct GenerationService {
    pool: SqlitePool,
    generator: Arc<dyn FlashcardGenerator>,
    max_flashcards: usize,
}

impl GenerationService {
    pub fn new(pool: SqlitePool, generator: Arc<dyn FlashcardGenerator>, max_flashcards: usize) -> Self {
        Self {
            pool,
            generator,
            max_flashcards,
        }
    }

    pub async fn generate(
        &self,
        user_id: Uuid,
        document_id: Uuid,
    ) -> Result<GenerationResult, GenerationServiceError> {
        let document = Document::find_by_id(&self.pool, user_id, document_id)
            .await?
            .ok_or(GenerationServiceError::DocumentNotFound)?;
        self.generate_for(&document).await
    }

    /// Asks the generator for a fresh batch and swaps it in for the
    /// document's unreviewed AI cards. Approved and edited cards survive.
    pub async fn generate_for(
        &self,
        document: &Document,
    ) -> Result<GenerationResult, GenerationServiceError> {
        let source = source_fingerprint(&document.content);
        let model = self.generator.model().to_string();

        info!(
            document_id = %document.id,
            user_id = %document.user_id,
            source_text_length = source.length,
            model = %model,
            "Generating flashcards"
        );

        let started = Instant::now();
        let drafts = match self
            .generator
            .generate(&document.content, self.max_flashcards)
            .await
            .map(|drafts| normalize_drafts(drafts, self.max_flashcards))
        {
            Ok(drafts) if !drafts.is_empty() => drafts,
            Ok(_) => return Err(self.record_failure(document, &model, &source, GeneratorError::NoFlashcards).await),
            Err(e) => return Err(self.record_failure(document, &model, &source, e).await),
        };
        let duration_ms = started.elapsed().as_millis() as i64;

        let mut tx = self.pool.begin().await?;
        let replaced_count = Flashcard::delete_replaceable(&mut *tx, document.id).await?;

        let mut flashcards = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let data = CreateFlashcard {
                front: draft.front,
                back: draft.back,
            };
            let card = Flashcard::create(
                &mut *tx,
                document.user_id,
                document.id,
                &data,
                FlashcardSource::Ai,
                Uuid::new_v4(),
            )
            .await?;
            flashcards.push(card);
        }

        let generation = Generation::create(
            &mut *tx,
            document.user_id,
            document.id,
            &model,
            &source,
            flashcards.len() as i64,
            duration_ms,
        )
        .await?;
        tx.commit().await?;

        info!(
            document_id = %document.id,
            generation_id = %generation.id,
            generated_count = flashcards.len(),
            replaced_count = replaced_count,
            duration_ms = duration_ms,
            "Flashcard generation completed"
        );

        Ok(GenerationResult {
            generation,
            flashcards,
            replaced_count,
        })
    }

    async fn record_failure(
        &self,
        document: &Document,
        model: &str,
        source: &SourceText,
        err: GeneratorError,
    ) -> GenerationServiceError {
        warn!(
            document_id = %document.id,
            error_code = err.code(),
            error = %err,
            "Flashcard generation failed"
        );
        if let Err(db_err) = GenerationError::create(
            &self.pool,
            document.user_id,
            document.id,
            model,
            source,
            err.code(),
            &err.to_string(),
        )
        .await
        {
            error!(error = %db_err, "Failed to record generation error");
        }
        err.into()
    }
}

/// SHA-256 hex digest and char length of the generation input.
pub fn source_fingerprint(text: &str) -> SourceText {
    SourceText {
        hash: format!("{:x}", Sha256::digest(text.as_bytes())),
        length: text.chars().count() as i64,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use db::{
        DBService,
        models::{
            document::CreateDocument,
            flashcard::FlashcardFilter,
            pagination::{PageRequest, SortOrder},
            topic::{CreateTopic, Topic},
            user::User,
        },
    };

    use super::*;
    use crate::services::{claude_api::ClaudeApiError, flashcard_generator::FlashcardDraft};

    /// Hands out queued replies in order.
    struct ScriptedGenerator {
        replies: Mutex<Vec<Result<Vec<FlashcardDraft>, GeneratorError>>>,
    }

    impl ScriptedGenerator {
        fn new(mut replies: Vec<Result<Vec<FlashcardDraft>, GeneratorError>>) -> Arc<Self> {
            replies.reverse();
            Arc::new(Self {
                replies: Mutex::new(replies),
            })
        }
    }

    #[async_trait]
    impl FlashcardGenerator for ScriptedGenerator {
        fn model(&self) -> &str {
            "scripted"
        }

        async fn generate(&self, _text: &str, _max: usize) -> Result<Vec<FlashcardDraft>, GeneratorError> {
            self.replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or(Err(GeneratorError::NoFlashcards))
        }
    }

    fn drafts(fronts: &[&str]) -> Vec<FlashcardDraft> {
        fronts
            .iter()
            .map(|f| FlashcardDraft {
                front: f.to_string(),
                back: format!("answer to {f}"),
            })
            .collect()
    }

    async fn setup() -> (DBService, Document) {
        let db = DBService::new_in_memory().await.unwrap();
        let user = User::create(&db.pool, "ada@example.com", "hash", Uuid::new_v4())
            .await
            .unwrap();
        let topic = Topic::create(
            &db.pool,
            user.id,
            &CreateTopic {
                name: "Rust".to_string(),
                description: None,
            },
            Uuid::new_v4(),
        )
        .await
        .unwrap();
        let document = Document::create(
            &db.pool,
            user.id,
            topic.id,
            &CreateDocument {
                name: "Ownership".to_string(),
                content: "Each value has an owner. ".repeat(60),
                generate_flashcards: None,
            },
            Uuid::new_v4(),
        )
        .await
        .unwrap();
        (db, document)
    }

    async fn visible_cards(db: &DBService, document: &Document) -> Vec<Flashcard> {
        Flashcard::find_page_by_document(
            &db.pool,
            document.user_id,
            document.id,
            FlashcardFilter::default(),
            PageRequest::default(),
            Default::default(),
            SortOrder::Asc,
        )
        .await
        .unwrap()
        .0
    }

    #[tokio::test]
    async fn generation_stores_pending_ai_cards() {
        let (db, document) = setup().await;
        let generator = ScriptedGenerator::new(vec![Ok(drafts(&["Q1", "Q2", "Q3"]))]);
        let service = GenerationService::new(db.pool.clone(), generator, 2);

        let result = service.generate(document.user_id, document.id).await.unwrap();
        assert_eq!(result.flashcards.len(), 2);
        assert_eq!(result.replaced_count, 0);
        assert_eq!(result.generation.generated_count, 2);
        assert_eq!(result.generation.model, "scripted");
        assert_eq!(result.generation.source_text_length, 1500);
        assert!(result
            .flashcards
            .iter()
            .all(|c| c.source == FlashcardSource::Ai && !c.is_approved));
    }

    #[tokio::test]
    async fn regeneration_keeps_reviewed_cards() {
        let (db, document) = setup().await;
        let generator = ScriptedGenerator::new(vec![
            Ok(drafts(&["keep-approved", "keep-edited", "replace-me"])),
            Ok(drafts(&["fresh"])),
        ]);
        let service = GenerationService::new(db.pool.clone(), generator, 10);

        let first = service.generate_for(&document).await.unwrap();
        let by_front = |front: &str| first.flashcards.iter().find(|c| c.front == front).unwrap().id;
        Flashcard::approve(&db.pool, document.user_id, by_front("keep-approved"))
            .await
            .unwrap();
        Flashcard::update(&db.pool, document.user_id, by_front("keep-edited"), None, Some("mine"), None)
            .await
            .unwrap();

        let second = service.generate_for(&document).await.unwrap();
        assert_eq!(second.replaced_count, 1);

        let mut fronts: Vec<_> = visible_cards(&db, &document)
            .await
            .into_iter()
            .map(|c| c.front)
            .collect();
        fronts.sort();
        assert_eq!(fronts, ["fresh", "keep-approved", "keep-edited"]);
        assert_eq!(
            Generation::find_by_document(&db.pool, document.user_id, document.id)
                .await
                .unwrap()
                .len(),
            2
        );
    }

    #[tokio::test]
    async fn failure_is_logged_and_leaves_cards_alone() {
        let (db, document) = setup().await;
        let generator = ScriptedGenerator::new(vec![
            Ok(drafts(&["Q1"])),
            Err(GeneratorError::ClaudeApi(ClaudeApiError::RateLimited)),
        ]);
        let service = GenerationService::new(db.pool.clone(), generator, 10);

        service.generate_for(&document).await.unwrap();
        let err = service.generate_for(&document).await.unwrap_err();
        assert!(matches!(err, GenerationServiceError::Generator(_)));

        assert_eq!(visible_cards(&db, &document).await.len(), 1);
        let errors = GenerationError::find_by_document(&db.pool, document.user_id, document.id)
            .await
            .unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].error_code, "rate_limited");
    }

    #[tokio::test]
    async fn empty_batch_is_an_error() {
        let (db, document) = setup().await;
        let generator = ScriptedGenerator::new(vec![Ok(vec![FlashcardDraft {
            front: " ".to_string(),
            back: "x".to_string(),
        }])]);
        let service = GenerationService::new(db.pool.clone(), generator, 10);

        let err = service.generate_for(&document).await.unwrap_err();
        assert!(matches!(
            err,
            GenerationServiceError::Generator(GeneratorError::NoFlashcards)
        ));
    }

    #[tokio::test]
    async fn unknown_document_is_not_found() {
        let (db, document) = setup().await;
        let service = GenerationService::new(db.pool.clone(), ScriptedGenerator::new(vec![]), 10);
        let err = service.generate(Uuid::new_v4(), document.id).await.unwrap_err();
        assert!(matches!(err, GenerationServiceError::DocumentNotFound));
    }

    #[test]
    fn fingerprint_is_stable_sha256() {
        let fp = source_fingerprint("abc");
        assert_eq!(
            fp.hash,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(source_fingerprint("żółw").length, 4);
    }
}

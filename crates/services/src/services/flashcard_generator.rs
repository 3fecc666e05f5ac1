//! Turns document text into flashcard drafts.

use std::collections::HashSet;

use async_trait::async_trait;
use db::models::flashcard::{BACK_MAX_CHARS, FRONT_MAX_CHARS};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utils::text::truncate_chars;

use super::claude_api::{ClaudeApiClient, ClaudeApiError};

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("claude api error: {0}")]
    ClaudeApi(#[from] ClaudeApiError),
    #[error("AI response contained no usable flashcards")]
    NoFlashcards,
}

impl GeneratorError {
    pub fn code(&self) -> &'static str {
        match self {
            GeneratorError::ClaudeApi(e) => e.code(),
            GeneratorError::NoFlashcards => "no_flashcards",
        }
    }
}

/// A question/answer pair proposed by the generator, not yet stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlashcardDraft {
    pub front: String,
    pub back: String,
}

#[async_trait]
pub trait FlashcardGenerator: Send + Sync {
    /// Model identifier recorded with each generation.
    fn model(&self) -> &str;

    async fn generate(
        &self,
        text: &str,
        max_flashcards: usize,
    ) -> Result<Vec<FlashcardDraft>, GeneratorError>;
}

#[derive(Debug, Deserialize)]
struct GenerationResponse {
    flashcards: Vec<FlashcardDraft>,
}

const SYSTEM_PROMPT: &str = "You are an experienced teacher who writes concise, self-contained study \
flashcards. Each card tests exactly one fact or concept from the source text. Write the cards in the \
same language as the source text. Output valid JSON only.";

/// [`FlashcardGenerator`] backed by the Claude Messages API.
pub struct ClaudeFlashcardGenerator {
    claude: ClaudeApiClient,
}

impl ClaudeFlashcardGenerator {
    const MAX_TOKENS: u32 = 4096;

    pub fn new(claude: ClaudeApiClient) -> Self {
        Self { claude }
    }

    fn prompt(text: &str, max_flashcards: usize) -> String {
        format!(
            r#"Create at most {max_flashcards} flashcards from the text below.

## Rules
- "front" is a question or prompt, at most {FRONT_MAX_CHARS} characters.
- "back" is the answer, at most {BACK_MAX_CHARS} characters.
- Only use information present in the text.
- Skip trivia; prefer definitions, causes, consequences and key facts.

## Output Format
Return ONLY valid JSON with this structure:
```json
{{
  "flashcards": [
    {{ "front": "Question", "back": "Answer" }}
  ]
}}
```

## Text
{text}
"#
        )
    }
}

#[async_trait]
impl FlashcardGenerator for ClaudeFlashcardGenerator {
    fn model(&self) -> &str {
        self.claude.model()
    }

    async fn generate(
        &self,
        text: &str,
        max_flashcards: usize,
    ) -> Result<Vec<FlashcardDraft>, GeneratorError> {
        let response: GenerationResponse = self
            .claude
            .ask_json(
                &Self::prompt(text, max_flashcards),
                Some(SYSTEM_PROMPT),
                Self::MAX_TOKENS,
            )
            .await?;
        Ok(response.flashcards)
    }
}

/// Trims, truncates and de-duplicates drafts, keeping at most `max` of them.
pub fn normalize_drafts(drafts: Vec<FlashcardDraft>, max: usize) -> Vec<FlashcardDraft> {
    let mut seen = HashSet::new();
    drafts
        .into_iter()
        .filter_map(|draft| {
            let front = truncate_chars(draft.front.trim(), FRONT_MAX_CHARS).trim_end();
            let back = truncate_chars(draft.back.trim(), BACK_MAX_CHARS).trim_end();
            if front.is_empty() || back.is_empty() {
                return None;
            }
            Some(FlashcardDraft {
                front: front.to_string(),
                back: back.to_string(),
            })
        })
        .filter(|draft| seen.insert((draft.front.clone(), draft.back.clone())))
        .take(max)
        .collect()
}

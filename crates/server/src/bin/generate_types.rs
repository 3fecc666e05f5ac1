//! Writes the API's TypeScript declarations to `shared/types.ts`.

use std::{fs, path::PathBuf};

use ts_rs::TS;

fn generate_types_content() -> String {
    let decls = [
        utils::response::ApiResponse::<(), ()>::decl(),
        db::models::pagination::SortOrder::decl(),
        db::models::pagination::Pagination::decl(),
        db::models::pagination::Paginated::<()>::decl(),
        db::models::user::UserProfile::decl(),
        db::models::topic::Topic::decl(),
        db::models::topic::TopicSort::decl(),
        db::models::topic::CreateTopic::decl(),
        db::models::topic::UpdateTopic::decl(),
        db::models::document::Document::decl(),
        db::models::document::DocumentSummary::decl(),
        db::models::document::DocumentSort::decl(),
        db::models::document::CreateDocument::decl(),
        db::models::document::UpdateDocument::decl(),
        db::models::flashcard::Flashcard::decl(),
        db::models::flashcard::FlashcardSource::decl(),
        db::models::flashcard::FlashcardSort::decl(),
        db::models::flashcard::CreateFlashcard::decl(),
        db::models::flashcard::UpdateFlashcard::decl(),
        db::models::flashcard::DeleteOutcome::decl(),
        db::models::generation::Generation::decl(),
        db::models::generation::GenerationError::decl(),
        db::models::generation::GenerationResult::decl(),
        server::routes::auth::Credentials::decl(),
        server::routes::auth::LoginResponse::decl(),
        server::routes::documents::DocumentCreated::decl(),
        server::routes::flashcards::ApproveFlashcards::decl(),
        server::routes::flashcards::ApprovedFlashcards::decl(),
        server::routes::flashcards::DeletedFlashcard::decl(),
        server::routes::health::HealthStatus::decl(),
    ];

    let body = decls
        .into_iter()
        .map(|d| format!("export {}", d.trim_start_matches("export ")))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!("// This file was generated by `generate_types`. Do not edit it by hand.\n\n{body}\n")
}

fn main() -> anyhow::Result<()> {
    let check = std::env::args().any(|arg| arg == "--check");
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../shared/types.ts");
    let content = generate_types_content();

    if check {
        let current = fs::read_to_string(&path).unwrap_or_default();
        if current != content {
            anyhow::bail!("{} is out of date, run generate_types", path.display());
        }
        println!("{} is up to date", path.display());
        return Ok(());
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, content)?;
    println!("Wrote {}", path.display());
    Ok(())
}

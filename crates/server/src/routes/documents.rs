use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use db::models::{
    document::{
        CONTENT_MAX_CHARS, CONTENT_MIN_CHARS, CreateDocument, Document, DocumentSort,
        DocumentSummary, NAME_MAX_CHARS, UpdateDocument,
    },
    generation::{Generation, GenerationResult},
    pagination::Paginated,
};
use serde::Serialize;
use tracing::{info, warn};
use ts_rs::TS;
use utils::{response::ApiResponse, text};
use uuid::Uuid;

use super::{ListParams, ListQuery, topics::owned_topic};
use crate::{
    DeploymentImpl,
    error::ApiError,
    extract::{CurrentUser, JsonBody, PathParam, QueryParams},
};

/// A stored document plus the outcome of the optional generation run.
#[derive(Debug, Serialize, TS)]
pub struct DocumentCreated {
    pub document: Document,
    pub generation: Option<GenerationResult>,
    /// Set when generation was requested but failed. The document is kept.
    pub generation_error: Option<String>,
}

pub(crate) async fn owned_document(
    deployment: &DeploymentImpl,
    user_id: Uuid,
    document_id: Uuid,
) -> Result<Document, ApiError> {
    Document::find_by_id(&deployment.db().pool, user_id, document_id)
        .await?
        .ok_or(ApiError::NotFound("document"))
}

fn validate_name(name: &str) -> Result<String, ApiError> {
    text::bounded("name", name, 1, NAME_MAX_CHARS).map_err(ApiError::BadRequest)
}

fn validate_content(content: &str) -> Result<String, ApiError> {
    text::bounded("content", content, CONTENT_MIN_CHARS, CONTENT_MAX_CHARS)
        .map_err(ApiError::BadRequest)
}

/// GET /api/topics/{topic_id}/documents
pub async fn list_documents(
    State(deployment): State<DeploymentImpl>,
    current: CurrentUser,
    PathParam(topic_id): PathParam<Uuid>,
    QueryParams(query): QueryParams<ListQuery>,
) -> Result<Json<ApiResponse<Paginated<DocumentSummary>>>, ApiError> {
    let ListParams { page, sort, order } = query.resolve::<DocumentSort>()?;
    owned_topic(&deployment, current.id(), topic_id).await?;

    let (documents, total) = Document::find_page_by_topic(
        &deployment.db().pool,
        current.id(),
        topic_id,
        page,
        sort,
        order,
    )
    .await?;
    Ok(Json(ApiResponse::success(Paginated::new(
        documents, page, total,
    ))))
}

/// POST /api/topics/{topic_id}/documents
pub async fn create_document(
    State(deployment): State<DeploymentImpl>,
    current: CurrentUser,
    PathParam(topic_id): PathParam<Uuid>,
    JsonBody(payload): JsonBody<CreateDocument>,
) -> Result<(StatusCode, Json<ApiResponse<DocumentCreated>>), ApiError> {
    owned_topic(&deployment, current.id(), topic_id).await?;
    let generate = payload.generate_flashcards.unwrap_or(false);
    let data = CreateDocument {
        name: validate_name(&payload.name)?,
        content: validate_content(&payload.content)?,
        generate_flashcards: Some(generate),
    };

    let pool = &deployment.db().pool;
    let document = Document::create(pool, current.id(), topic_id, &data, Uuid::new_v4()).await?;
    info!(
        user_id = %current.id(),
        document_id = %document.id,
        content_length = text::char_len(&document.content),
        "Document created"
    );

    if !generate {
        let created = DocumentCreated {
            document,
            generation: None,
            generation_error: None,
        };
        return Ok((StatusCode::CREATED, Json(ApiResponse::success(created))));
    }

    let (generation, generation_error) = match deployment.generation() {
        None => (None, Some(ApiError::GenerationUnavailable.to_string())),
        Some(service) => match service.generate_for(&document).await {
            Ok(result) => (Some(result), None),
            Err(e) => {
                warn!(document_id = %document.id, error = %e, "Generation after upload failed");
                (None, Some(e.to_string()))
            }
        },
    };

    // Counts changed if cards were generated.
    let document = owned_document(&deployment, current.id(), document.id).await?;
    let created = DocumentCreated {
        document,
        generation,
        generation_error,
    };
    Ok((StatusCode::CREATED, Json(ApiResponse::success(created))))
}

/// GET /api/documents/{id}
pub async fn get_document(
    State(deployment): State<DeploymentImpl>,
    current: CurrentUser,
    PathParam(document_id): PathParam<Uuid>,
) -> Result<Json<ApiResponse<Document>>, ApiError> {
    let document = owned_document(&deployment, current.id(), document_id).await?;
    Ok(Json(ApiResponse::success(document)))
}

/// PUT /api/documents/{id}
/// Existing flashcards are left as they are when the content changes.
pub async fn update_document(
    State(deployment): State<DeploymentImpl>,
    current: CurrentUser,
    PathParam(document_id): PathParam<Uuid>,
    JsonBody(payload): JsonBody<UpdateDocument>,
) -> Result<Json<ApiResponse<Document>>, ApiError> {
    let name = payload.name.as_deref().map(validate_name).transpose()?;
    let content = payload.content.as_deref().map(validate_content).transpose()?;

    let document = Document::update(
        &deployment.db().pool,
        current.id(),
        document_id,
        name.as_deref(),
        content.as_deref(),
    )
    .await?
    .ok_or(ApiError::NotFound("document"))?;
    Ok(Json(ApiResponse::success(document)))
}

/// DELETE /api/documents/{id}
pub async fn delete_document(
    State(deployment): State<DeploymentImpl>,
    current: CurrentUser,
    PathParam(document_id): PathParam<Uuid>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    if Document::delete(&deployment.db().pool, current.id(), document_id).await? == 0 {
        return Err(ApiError::NotFound("document"));
    }
    info!(user_id = %current.id(), document_id = %document_id, "Document deleted");
    Ok(Json(ApiResponse::success(())))
}

/// POST /api/documents/{id}/generate
/// Replaces the document's unreviewed AI flashcards with a fresh batch.
pub async fn generate_flashcards(
    State(deployment): State<DeploymentImpl>,
    current: CurrentUser,
    PathParam(document_id): PathParam<Uuid>,
) -> Result<Json<ApiResponse<GenerationResult>>, ApiError> {
    let service = deployment
        .generation()
        .ok_or(ApiError::GenerationUnavailable)?;
    let result = service.generate(current.id(), document_id).await?;
    Ok(Json(ApiResponse::success(result)))
}

/// GET /api/documents/{id}/generations
pub async fn list_generations(
    State(deployment): State<DeploymentImpl>,
    current: CurrentUser,
    PathParam(document_id): PathParam<Uuid>,
) -> Result<Json<ApiResponse<Vec<Generation>>>, ApiError> {
    owned_document(&deployment, current.id(), document_id).await?;
    let generations =
        Generation::find_by_document(&deployment.db().pool, current.id(), document_id).await?;
    Ok(Json(ApiResponse::success(generations)))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new()
        .route(
            "/topics/{id}/documents",
            get(list_documents).post(create_document),
        )
        .route(
            "/documents/{id}",
            get(get_document).put(update_document).delete(delete_document),
        )
        .route("/documents/{id}/generate", post(generate_flashcards))
        .route("/documents/{id}/generations", get(list_generations))
}

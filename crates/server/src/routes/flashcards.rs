use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use db::models::{
    flashcard::{
        BACK_MAX_CHARS, CreateFlashcard, DeleteOutcome, FRONT_MAX_CHARS, Flashcard,
        FlashcardFilter, FlashcardSort, FlashcardSource, UpdateFlashcard,
    },
    pagination::Paginated,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use ts_rs::TS;
use utils::{response::ApiResponse, text};
use uuid::Uuid;

use super::{ListParams, documents::owned_document, resolve_list};
use crate::{
    DeploymentImpl,
    error::ApiError,
    extract::{CurrentUser, JsonBody, PathParam, QueryParams},
};

pub const MAX_BULK_APPROVE: usize = 100;

#[derive(Debug, Default, Deserialize)]
pub struct FlashcardListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub sort: Option<String>,
    pub order: Option<String>,
    pub source: Option<String>,
    pub approved: Option<bool>,
    pub include_disabled: Option<bool>,
}

#[derive(Debug, Deserialize, TS)]
pub struct ApproveFlashcards {
    pub ids: Vec<Uuid>,
}

#[derive(Debug, Serialize, TS)]
pub struct ApprovedFlashcards {
    pub approved_count: usize,
    pub approved_ids: Vec<Uuid>,
}

impl From<Vec<Uuid>> for ApprovedFlashcards {
    fn from(approved_ids: Vec<Uuid>) -> Self {
        Self {
            approved_count: approved_ids.len(),
            approved_ids,
        }
    }
}

#[derive(Debug, Serialize, TS)]
pub struct DeletedFlashcard {
    pub id: Uuid,
    pub outcome: DeleteOutcome,
}

fn validate_front(front: &str) -> Result<String, ApiError> {
    text::bounded("front", front, 1, FRONT_MAX_CHARS).map_err(ApiError::BadRequest)
}

fn validate_back(back: &str) -> Result<String, ApiError> {
    text::bounded("back", back, 1, BACK_MAX_CHARS).map_err(ApiError::BadRequest)
}

/// GET /api/documents/{id}/flashcards
pub async fn list_flashcards(
    State(deployment): State<DeploymentImpl>,
    current: CurrentUser,
    PathParam(document_id): PathParam<Uuid>,
    QueryParams(query): QueryParams<FlashcardListQuery>,
) -> Result<Json<ApiResponse<Paginated<Flashcard>>>, ApiError> {
    let ListParams { page, sort, order } = resolve_list::<FlashcardSort>(
        query.page,
        query.limit,
        query.sort.as_deref(),
        query.order.as_deref(),
    )?;
    let source = query
        .source
        .as_deref()
        .map(|s| {
            s.parse::<FlashcardSource>()
                .map_err(|_| ApiError::BadRequest(format!("source must be ai or manual, got {s}")))
        })
        .transpose()?;
    let filter = FlashcardFilter {
        source,
        approved: query.approved,
        include_disabled: query.include_disabled.unwrap_or(false),
    };

    owned_document(&deployment, current.id(), document_id).await?;
    let (flashcards, total) = Flashcard::find_page_by_document(
        &deployment.db().pool,
        current.id(),
        document_id,
        filter,
        page,
        sort,
        order,
    )
    .await?;
    Ok(Json(ApiResponse::success(Paginated::new(
        flashcards, page, total,
    ))))
}

/// POST /api/documents/{id}/flashcards
/// Hand-written cards are approved on creation.
pub async fn create_flashcard(
    State(deployment): State<DeploymentImpl>,
    current: CurrentUser,
    PathParam(document_id): PathParam<Uuid>,
    JsonBody(payload): JsonBody<CreateFlashcard>,
) -> Result<(StatusCode, Json<ApiResponse<Flashcard>>), ApiError> {
    let data = CreateFlashcard {
        front: validate_front(&payload.front)?,
        back: validate_back(&payload.back)?,
    };
    owned_document(&deployment, current.id(), document_id).await?;

    let flashcard = Flashcard::create(
        &deployment.db().pool,
        current.id(),
        document_id,
        &data,
        FlashcardSource::Manual,
        Uuid::new_v4(),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(flashcard))))
}

/// POST /api/documents/{id}/flashcards/approve
pub async fn approve_document_flashcards(
    State(deployment): State<DeploymentImpl>,
    current: CurrentUser,
    PathParam(document_id): PathParam<Uuid>,
) -> Result<Json<ApiResponse<ApprovedFlashcards>>, ApiError> {
    owned_document(&deployment, current.id(), document_id).await?;
    let approved =
        Flashcard::approve_all_pending(&deployment.db().pool, current.id(), document_id).await?;
    info!(
        user_id = %current.id(),
        document_id = %document_id,
        approved_count = approved.len(),
        "Approved all pending flashcards"
    );
    Ok(Json(ApiResponse::success(approved.into())))
}

/// POST /api/flashcards/approve
/// All ids must belong to the caller, otherwise nothing is approved.
pub async fn approve_selected(
    State(deployment): State<DeploymentImpl>,
    current: CurrentUser,
    JsonBody(payload): JsonBody<ApproveFlashcards>,
) -> Result<Json<ApiResponse<ApprovedFlashcards>>, ApiError> {
    if payload.ids.is_empty() || payload.ids.len() > MAX_BULK_APPROVE {
        return Err(ApiError::BadRequest(format!(
            "ids must contain between 1 and {MAX_BULK_APPROVE} flashcard ids"
        )));
    }

    let approved = Flashcard::approve_selected(&deployment.db().pool, current.id(), &payload.ids)
        .await?
        .ok_or(ApiError::NotFound("flashcard"))?;
    info!(
        user_id = %current.id(),
        requested = payload.ids.len(),
        approved_count = approved.len(),
        "Approved selected flashcards"
    );
    Ok(Json(ApiResponse::success(approved.into())))
}

/// GET /api/flashcards/{id}
pub async fn get_flashcard(
    State(deployment): State<DeploymentImpl>,
    current: CurrentUser,
    PathParam(flashcard_id): PathParam<Uuid>,
) -> Result<Json<ApiResponse<Flashcard>>, ApiError> {
    let flashcard = Flashcard::find_by_id(&deployment.db().pool, current.id(), flashcard_id)
        .await?
        .ok_or(ApiError::NotFound("flashcard"))?;
    Ok(Json(ApiResponse::success(flashcard)))
}

/// PUT /api/flashcards/{id}
/// `is_disabled: false` re-enables a deleted card.
pub async fn update_flashcard(
    State(deployment): State<DeploymentImpl>,
    current: CurrentUser,
    PathParam(flashcard_id): PathParam<Uuid>,
    JsonBody(payload): JsonBody<UpdateFlashcard>,
) -> Result<Json<ApiResponse<Flashcard>>, ApiError> {
    let front = payload.front.as_deref().map(validate_front).transpose()?;
    let back = payload.back.as_deref().map(validate_back).transpose()?;

    let flashcard = Flashcard::update(
        &deployment.db().pool,
        current.id(),
        flashcard_id,
        front.as_deref(),
        back.as_deref(),
        payload.is_disabled,
    )
    .await?
    .ok_or(ApiError::NotFound("flashcard"))?;
    Ok(Json(ApiResponse::success(flashcard)))
}

/// DELETE /api/flashcards/{id}
pub async fn delete_flashcard(
    State(deployment): State<DeploymentImpl>,
    current: CurrentUser,
    PathParam(flashcard_id): PathParam<Uuid>,
) -> Result<Json<ApiResponse<DeletedFlashcard>>, ApiError> {
    let outcome = Flashcard::delete(&deployment.db().pool, current.id(), flashcard_id)
        .await?
        .ok_or(ApiError::NotFound("flashcard"))?;
    Ok(Json(ApiResponse::success(DeletedFlashcard {
        id: flashcard_id,
        outcome,
    })))
}

/// POST /api/flashcards/{id}/approve
pub async fn approve_flashcard(
    State(deployment): State<DeploymentImpl>,
    current: CurrentUser,
    PathParam(flashcard_id): PathParam<Uuid>,
) -> Result<Json<ApiResponse<Flashcard>>, ApiError> {
    let flashcard = Flashcard::approve(&deployment.db().pool, current.id(), flashcard_id)
        .await?
        .ok_or(ApiError::NotFound("flashcard"))?;
    Ok(Json(ApiResponse::success(flashcard)))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new()
        .route(
            "/documents/{id}/flashcards",
            get(list_flashcards).post(create_flashcard),
        )
        .route(
            "/documents/{id}/flashcards/approve",
            post(approve_document_flashcards),
        )
        .route("/flashcards/approve", post(approve_selected))
        .route(
            "/flashcards/{id}",
            get(get_flashcard)
                .put(update_flashcard)
                .delete(delete_flashcard),
        )
        .route("/flashcards/{id}/approve", post(approve_flashcard))
}

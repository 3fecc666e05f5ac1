use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::get,
};
use db::models::{
    pagination::Paginated,
    topic::{CreateTopic, DESCRIPTION_MAX_CHARS, NAME_MAX_CHARS, Topic, TopicSort, UpdateTopic},
};
use tracing::info;
use utils::{response::ApiResponse, text};
use uuid::Uuid;

use super::{ListParams, ListQuery};
use crate::{
    DeploymentImpl,
    error::ApiError,
    extract::{CurrentUser, JsonBody, PathParam, QueryParams},
};

/// Loads a topic owned by the caller or fails with 404.
pub(crate) async fn owned_topic(
    deployment: &DeploymentImpl,
    user_id: Uuid,
    topic_id: Uuid,
) -> Result<Topic, ApiError> {
    Topic::find_by_id(&deployment.db().pool, user_id, topic_id)
        .await?
        .ok_or(ApiError::NotFound("topic"))
}

async fn ensure_name_free(
    deployment: &DeploymentImpl,
    user_id: Uuid,
    name: &str,
    except_id: Option<Uuid>,
) -> Result<(), ApiError> {
    if Topic::name_taken(&deployment.db().pool, user_id, name, except_id).await? {
        return Err(ApiError::Conflict(format!(
            "a topic named \"{name}\" already exists"
        )));
    }
    Ok(())
}

fn unique_violation(err: sqlx::Error) -> ApiError {
    match err {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => {
            ApiError::Conflict("a topic with this name already exists".to_string())
        }
        other => ApiError::Database(other),
    }
}

/// GET /api/topics
pub async fn list_topics(
    State(deployment): State<DeploymentImpl>,
    current: CurrentUser,
    QueryParams(query): QueryParams<ListQuery>,
) -> Result<Json<ApiResponse<Paginated<Topic>>>, ApiError> {
    let ListParams { page, sort, order } = query.resolve::<TopicSort>()?;
    let (topics, total) =
        Topic::find_page(&deployment.db().pool, current.id(), page, sort, order).await?;
    Ok(Json(ApiResponse::success(Paginated::new(topics, page, total))))
}

/// POST /api/topics
pub async fn create_topic(
    State(deployment): State<DeploymentImpl>,
    current: CurrentUser,
    JsonBody(payload): JsonBody<CreateTopic>,
) -> Result<(StatusCode, Json<ApiResponse<Topic>>), ApiError> {
    let data = CreateTopic {
        name: text::bounded("name", &payload.name, 1, NAME_MAX_CHARS).map_err(ApiError::BadRequest)?,
        description: text::optional_bounded(
            "description",
            payload.description.as_deref(),
            DESCRIPTION_MAX_CHARS,
        )
        .map_err(ApiError::BadRequest)?,
    };
    ensure_name_free(&deployment, current.id(), &data.name, None).await?;

    let topic = Topic::create(&deployment.db().pool, current.id(), &data, Uuid::new_v4())
        .await
        .map_err(unique_violation)?;
    info!(user_id = %current.id(), topic_id = %topic.id, "Topic created");
    Ok((StatusCode::CREATED, Json(ApiResponse::success(topic))))
}

/// GET /api/topics/{id}
pub async fn get_topic(
    State(deployment): State<DeploymentImpl>,
    current: CurrentUser,
    PathParam(topic_id): PathParam<Uuid>,
) -> Result<Json<ApiResponse<Topic>>, ApiError> {
    let topic = owned_topic(&deployment, current.id(), topic_id).await?;
    Ok(Json(ApiResponse::success(topic)))
}

/// PUT /api/topics/{id}
/// A blank description clears it.
pub async fn update_topic(
    State(deployment): State<DeploymentImpl>,
    current: CurrentUser,
    PathParam(topic_id): PathParam<Uuid>,
    JsonBody(payload): JsonBody<UpdateTopic>,
) -> Result<Json<ApiResponse<Topic>>, ApiError> {
    owned_topic(&deployment, current.id(), topic_id).await?;

    let name = payload
        .name
        .as_deref()
        .map(|name| text::bounded("name", name, 1, NAME_MAX_CHARS))
        .transpose()
        .map_err(ApiError::BadRequest)?;
    let description = payload
        .description
        .as_deref()
        .map(|d| text::optional_bounded("description", Some(d), DESCRIPTION_MAX_CHARS))
        .transpose()
        .map_err(ApiError::BadRequest)?;

    if let Some(name) = &name {
        ensure_name_free(&deployment, current.id(), name, Some(topic_id)).await?;
    }

    let topic = Topic::update(
        &deployment.db().pool,
        current.id(),
        topic_id,
        name.as_deref(),
        description.as_ref().map(|d| d.as_deref()),
    )
    .await
    .map_err(unique_violation)?
    .ok_or(ApiError::NotFound("topic"))?;
    Ok(Json(ApiResponse::success(topic)))
}

/// DELETE /api/topics/{id}
/// Documents and their flashcards go with it.
pub async fn delete_topic(
    State(deployment): State<DeploymentImpl>,
    current: CurrentUser,
    PathParam(topic_id): PathParam<Uuid>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    if Topic::delete(&deployment.db().pool, current.id(), topic_id).await? == 0 {
        return Err(ApiError::NotFound("topic"));
    }
    info!(user_id = %current.id(), topic_id = %topic_id, "Topic deleted");
    Ok(Json(ApiResponse::success(())))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new()
        .route("/topics", get(list_topics).post(create_topic))
        .route(
            "/topics/{id}",
            get(get_topic).put(update_topic).delete(delete_topic),
        )
}

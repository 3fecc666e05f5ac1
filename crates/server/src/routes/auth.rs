use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{DateTime, Utc};
use db::models::user::UserProfile;
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::{
    DeploymentImpl,
    error::ApiError,
    extract::{ACCESS_TOKEN_COOKIE, CurrentUser, JsonBody, access_token},
};

#[derive(Debug, Deserialize, TS)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, TS)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserProfile,
}

/// POST /api/auth/register
pub async fn register(
    State(deployment): State<DeploymentImpl>,
    JsonBody(payload): JsonBody<Credentials>,
) -> Result<(StatusCode, Json<ApiResponse<UserProfile>>), ApiError> {
    let user = deployment
        .auth()
        .register(&payload.email, &payload.password)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(user.into()))))
}

/// POST /api/auth/login
/// Returns the token in the body and as an HttpOnly cookie.
pub async fn login(
    State(deployment): State<DeploymentImpl>,
    jar: CookieJar,
    JsonBody(payload): JsonBody<Credentials>,
) -> Result<(CookieJar, Json<ApiResponse<LoginResponse>>), ApiError> {
    let issued = deployment
        .auth()
        .login(&payload.email, &payload.password)
        .await?;

    let cookie = Cookie::build((ACCESS_TOKEN_COOKIE, issued.token.clone()))
        .path("/")
        .http_only(true)
        .secure(deployment.config().cookie_secure)
        .same_site(SameSite::Lax)
        .build();

    let response = LoginResponse {
        token: issued.token,
        expires_at: issued.expires_at,
        user: issued.user.into(),
    };
    Ok((jar.add(cookie), Json(ApiResponse::success(response))))
}

/// POST /api/auth/logout
/// Closes the caller's session if there is one. Always clears the cookie.
pub async fn logout(
    State(deployment): State<DeploymentImpl>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<(CookieJar, Json<ApiResponse<()>>), ApiError> {
    if let Some(token) = access_token(&headers) {
        if let Ok(ctx) = deployment.auth().authenticate(&token).await {
            deployment.auth().logout(ctx.session_id).await?;
        }
    }

    let jar = jar.remove(Cookie::build(ACCESS_TOKEN_COOKIE).path("/"));
    Ok((jar, Json(ApiResponse::success(()))))
}

/// GET /api/auth/me
pub async fn me(current: CurrentUser) -> Json<ApiResponse<UserProfile>> {
    Json(ApiResponse::success(current.user.into()))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().nest(
        "/auth",
        Router::new()
            .route("/register", post(register))
            .route("/login", post(login))
            .route("/logout", post(logout))
            .route("/me", get(me)),
    )
}

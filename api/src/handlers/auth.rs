//! Account registration, login and session handlers

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use tracing::{debug, info};
use user::{auth::IdentityStore, Credentials, UserRegistration};

use crate::{
    error::{ApiError, ApiResult},
    middleware_hooks::CurrentPrincipal,
    models::{LoginRequest, RegisterRequest, SuccessResponse, UserResponse},
    AppState,
};

/// Register a new account with the USER role
/// POST /api/v1/auth/register
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = UserResponse),
        (status = 400, description = "Invalid input", body = crate::error::ApiErrorResponse),
        (status = 409, description = "Email already registered", body = crate::error::ApiErrorResponse)
    ),
    tag = "auth"
)]
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<UserResponse>)> {
    debug!("Registration requested");

    let user = state
        .user_manager
        .accounts()
        .register(UserRegistration {
            email: req.email,
            password: req.password,
            username: req.username,
            avatar_url: req.avatar_url,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(user.into())))
}

/// Log in and receive the session cookie
/// POST /api/v1/auth/login
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in; session cookie set", body = UserResponse),
        (status = 401, description = "Invalid credentials", body = crate::error::ApiErrorResponse)
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<(HeaderMap, Json<UserResponse>)> {
    let (user, token) = state
        .user_manager
        .accounts()
        .login(Credentials {
            email: req.email,
            password: req.password,
        })
        .await?;

    let mut headers = HeaderMap::new();
    state
        .user_manager
        .authenticator()
        .start_session(&mut headers, &token)?;

    Ok((headers, Json(user.into())))
}

/// Clear the session cookie
/// POST /api/v1/auth/logout
#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    responses(
        (status = 200, description = "Session cookie cleared", body = SuccessResponse)
    ),
    tag = "auth"
)]
pub async fn logout(State(state): State<AppState>) -> ApiResult<(HeaderMap, Json<SuccessResponse>)> {
    let mut headers = HeaderMap::new();
    state
        .user_manager
        .authenticator()
        .end_session(&mut headers)?;

    Ok((
        headers,
        Json(SuccessResponse {
            success: true,
            message: "Logged out successfully".to_string(),
        }),
    ))
}

/// Get the logged-in account
/// GET /api/v1/auth/me
#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    responses(
        (status = 200, description = "Current account", body = UserResponse),
        (status = 401, description = "Not logged in", body = crate::error::ApiErrorResponse)
    ),
    tag = "auth"
)]
pub async fn me(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> ApiResult<Json<UserResponse>> {
    // The token can outlive the account it was issued for.
    let user = state
        .user_manager
        .database()
        .find_by_id(principal.id)
        .await?
        .ok_or_else(|| {
            info!("Session for deleted user {}", principal.id);
            ApiError::Unauthorized
        })?;

    Ok(Json(user.into()))
}

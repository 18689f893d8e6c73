//! User account lookup, update and removal

use axum::{
    extract::{Path, State},
    Json,
};
use tracing::info;
use user::auth::IdentityStore;
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    middleware_hooks::CurrentPrincipal,
    models::{DeleteResponse, UpdateUserRequest, UserResponse},
    AppState,
};

/// Read a user account. Requires `read`.
/// GET /api/v1/users/:id
#[utoipa::path(
    get,
    path = "/api/v1/users/{id}",
    params(
        ("id" = Uuid, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "User found", body = UserResponse),
        (status = 401, description = "Not logged in", body = crate::error::ApiErrorResponse),
        (status = 403, description = "Missing read permission", body = crate::error::ApiErrorResponse),
        (status = 404, description = "User not found", body = crate::error::ApiErrorResponse)
    ),
    tag = "users"
)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<UserResponse>> {
    let user = state
        .user_manager
        .database()
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User {}", id)))?;

    Ok(Json(user.into()))
}

/// Replace a user's email, password, username and avatar. Requires `update`.
/// PUT /api/v1/users/:id
#[utoipa::path(
    put,
    path = "/api/v1/users/{id}",
    params(
        ("id" = Uuid, Path, description = "User ID")
    ),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated", body = UserResponse),
        (status = 400, description = "Invalid profile", body = crate::error::ApiErrorResponse),
        (status = 401, description = "Not logged in", body = crate::error::ApiErrorResponse),
        (status = 403, description = "Missing update permission", body = crate::error::ApiErrorResponse),
        (status = 404, description = "User not found", body = crate::error::ApiErrorResponse),
        (status = 409, description = "Email already registered", body = crate::error::ApiErrorResponse)
    ),
    tag = "users"
)]
pub async fn update_user(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateUserRequest>,
) -> ApiResult<Json<UserResponse>> {
    let user = state
        .user_manager
        .accounts()
        .update(id, request.into())
        .await?;

    info!("User {} updated by {}", id, principal.id);

    Ok(Json(user.into()))
}

/// Delete a user account. Requires `delete`.
/// DELETE /api/v1/users/:id
#[utoipa::path(
    delete,
    path = "/api/v1/users/{id}",
    params(
        ("id" = Uuid, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "User deleted", body = DeleteResponse),
        (status = 401, description = "Not logged in", body = crate::error::ApiErrorResponse),
        (status = 403, description = "Missing delete permission", body = crate::error::ApiErrorResponse),
        (status = 404, description = "User not found", body = crate::error::ApiErrorResponse)
    ),
    tag = "users"
)]
pub async fn delete_user(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<DeleteResponse>> {
    if !state.user_manager.database().delete_user(id).await? {
        return Err(ApiError::NotFound(format!("User {}", id)));
    }

    info!("User {} deleted by {}", id, principal.id);

    Ok(Json(DeleteResponse {
        success: true,
        id,
        message: "User deleted".to_string(),
    }))
}

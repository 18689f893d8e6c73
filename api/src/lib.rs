use authz::Permission;
use axum::{
    handler::Handler,
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod error;
pub mod handlers;
pub mod middleware_hooks;
pub mod models;
pub mod server;


// Re-export server functions for convenience
pub use server::{start_server_with_config, ApiConfig};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub user_manager: Arc<user::UserManager>,
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::auth::register,
        handlers::auth::login,
        handlers::auth::logout,
        handlers::auth::me,
        handlers::users::get_user,
        handlers::users::update_user,
        handlers::users::delete_user,
        handlers::health::health_check,
    ),
    components(
        schemas(
            models::UserResponse,
            models::RegisterRequest,
            models::LoginRequest,
            models::UpdateUserRequest,
            models::SuccessResponse,
            models::DeleteResponse,
            models::HealthResponse,
            models::DatabaseHealth,
            error::ApiErrorResponse,
            error::ErrorDetail,
        )
    ),
    tags(
        (name = "auth", description = "Registration, login and session cookies"),
        (name = "users", description = "User accounts, permission-checked"),
        (name = "health", description = "Health check endpoints"),
    ),
    info(
        title = "Game List API",
        version = "1.0.0",
        description = "Authentication and authorization backend for the game list",
    ),
)]
pub struct ApiDoc;

/// Create the main API router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    let authenticated =
        || middleware::from_fn_with_state(state.clone(), middleware_hooks::authentication_middleware);
    let requires = |permission: Permission| {
        middleware::from_fn_with_state((state.clone(), permission), middleware_hooks::require_access)
    };

    // API v1 routes
    let api_v1 = Router::new()
        // Account and session endpoints
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/logout", post(handlers::auth::logout))
        .route("/auth/me", get(handlers::auth::me.layer(authenticated())))
        // Permission-checked user endpoints
        .route(
            "/users/:id",
            get(handlers::users::get_user.layer(requires(Permission::Read)))
                .put(handlers::users::update_user.layer(requires(Permission::Update)))
                .delete(handlers::users::delete_user.layer(requires(Permission::Delete))),
        )
        // Health check
        .route("/health", get(handlers::health::health_check))
        .layer(middleware::from_fn(middleware_hooks::request_middleware));

    // Main router
    Router::new()
        .nest("/api/v1", api_v1)
        .merge(SwaggerUi::new("/api/v1/swagger").url("/api/v1/openapi.json", ApiDoc::openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

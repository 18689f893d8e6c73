use authz::{Permission, Principal};
use axum::{
    async_trait,
    body::Body,
    extract::{FromRequestParts, State},
    http::{request::Parts, Request},
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::{error::ApiError, AppState};

/// Authentication middleware
///
/// Reads the session cookie, verifies the token and attaches the resulting
/// [`Principal`] to the request extensions. Never consults the database.
/// Requests without a valid session are rejected with 401.
pub async fn authentication_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let principal = state
        .user_manager
        .authenticator()
        .authenticate(request.headers())
        .map_err(|e| {
            debug!(
                "AUTHN MIDDLEWARE: {} {} rejected: {}",
                request.method(),
                request.uri(),
                e
            );
            ApiError::from(e)
        })?;

    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}

/// Authorization middleware for a single required permission
///
/// Authenticates the request (unless an earlier layer already did) and then
/// checks the principal's live role against `permission`.
///
/// # Authorization Flow
///
/// 1. Reuse the attached [`Principal`] or authenticate from the cookie
/// 2. Ask the access-control engine about the live role
/// 3. 403 on deny, 500 if the permission store cannot answer
pub async fn require_access(
    State((state, permission)): State<(AppState, Permission)>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let authenticator = state.user_manager.authenticator();

    let principal = match request.extensions().get::<Principal>() {
        Some(principal) => *principal,
        None => {
            let principal = authenticator.authenticate(request.headers())?;
            request.extensions_mut().insert(principal);
            principal
        }
    };

    match authenticator.authorize(&principal, permission).await {
        Ok(()) => {
            debug!(
                "AUTHZ MIDDLEWARE: {} allowed {} on {}",
                principal.id,
                permission,
                request.uri()
            );
            Ok(next.run(request).await)
        }
        Err(e) => {
            warn!(
                "AUTHZ MIDDLEWARE: {} denied {} on {}: {}",
                principal.id,
                permission,
                request.uri(),
                e
            );
            Err(e.into())
        }
    }
}

/// Request processing middleware hook
///
/// Logs every request with its status and latency.
pub async fn request_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    info!(
        "{} {} -> {} in {:?}",
        method,
        uri,
        response.status().as_u16(),
        start.elapsed()
    );

    response
}

/// Extractor for the principal attached by the authentication layers.
///
/// Rejects with 401 when the route is not behind one of them.
#[derive(Debug, Clone, Copy)]
pub struct CurrentPrincipal(pub Principal);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentPrincipal
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .copied()
            .map(CurrentPrincipal)
            .ok_or(ApiError::Unauthorized)
    }
}

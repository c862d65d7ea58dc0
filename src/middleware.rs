//! Admin authentication.
//!
//! Admin routes require `Authorization: Bearer <token>` matching one of the
//! configured admin tokens. The launcher's `/check` route is not behind this
//! layer: possession of a valid license code is its only credential.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::error::AppError;
use crate::state::AppState;
use crate::util::{extract_bearer_token, extract_client_ip, token_matches};

pub async fn require_admin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let authorized = extract_bearer_token(request.headers())
        .is_some_and(|token| token_matches(token, &state.admin_tokens));

    if !authorized {
        tracing::warn!(
            path = %request.uri().path(),
            ip = extract_client_ip(request.headers()).as_deref().unwrap_or("-"),
            "Rejected admin request"
        );
        return Err(AppError::Unauthorized);
    }

    Ok(next.run(request).await)
}

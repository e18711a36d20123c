use axum::{
    Json,
    extract::{Request, State},
    http::{StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use utils::response::ApiResponse;

use crate::AppState;

fn parse_authorization_bearer(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    let (prefix, rest) = trimmed.split_once(' ')?;
    if !prefix.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = rest.trim();
    if token.is_empty() {
        return None;
    }
    Some(token)
}

fn extract_request_token(req: &Request) -> Option<String> {
    // 1) Authorization: Bearer <token>
    if let Some(value) = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_authorization_bearer)
    {
        return Some(value.to_string());
    }

    // 2) X-API-Token: <token>
    req.headers()
        .get("x-api-token")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn unauthorized() -> Response {
    let response = ApiResponse::<()>::error("Unauthorized");
    (StatusCode::UNAUTHORIZED, Json(response)).into_response()
}

/// Resolves the bearer token to a `User` and stores it as a request
/// extension for downstream handlers. Requests without a valid token get a
/// 401 envelope.
pub async fn require_api_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let Some(token) = extract_request_token(&req) else {
        return unauthorized();
    };

    match state
        .user_provider()
        .user_for_token(&state.db().conn, &token)
        .await
    {
        Ok(Some(user)) => {
            req.extensions_mut().insert(user);
            next.run(req).await
        }
        Ok(None) => unauthorized(),
        Err(err) => {
            tracing::error!("Failed to resolve API token: {}", err);
            let response = ApiResponse::<()>::error("Internal server error");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(response)).into_response()
        }
    }
}

//! Admin routes for gate inspection and operator overrides

use crate::routes::AppState;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get},
    Json, Router,
};
use leadgate_common::{ClientKey, ErrorBody, ReleaseResponse};

/// Build the admin router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/admin/stats", get(get_stats))
        .route("/api/admin/suspects", get(list_suspects))
        .route("/api/admin/suspects/{key}", delete(unflag_suspect))
        .route("/api/admin/lockouts/{key}", delete(lift_lockout))
}

/// Validate the bearer token. Admin is disabled when no token is configured.
fn validate_admin(state: &AppState, headers: &HeaderMap) -> bool {
    let Some(admin_token) = state.config.admin_token.as_deref() else {
        return false;
    };

    headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|t| t == admin_token)
        .unwrap_or(false)
}

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, Json(ErrorBody::new("Unauthorized"))).into_response()
}

async fn get_stats(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if !validate_admin(&state, &headers) {
        return unauthorized();
    }

    Json(state.gate.stats()).into_response()
}

async fn list_suspects(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if !validate_admin(&state, &headers) {
        return unauthorized();
    }

    Json(state.gate.suspects()).into_response()
}

async fn unflag_suspect(
    State(state): State<AppState>,
    Path(key): Path<String>,
    headers: HeaderMap,
) -> Response {
    if !validate_admin(&state, &headers) {
        return unauthorized();
    }

    let client = ClientKey::new(key);
    let released = state.gate.unflag(&client);
    Json(ReleaseResponse { client, released }).into_response()
}

async fn lift_lockout(
    State(state): State<AppState>,
    Path(key): Path<String>,
    headers: HeaderMap,
) -> Response {
    if !validate_admin(&state, &headers) {
        return unauthorized();
    }

    let client = ClientKey::new(key);
    let released = state.gate.lift_lockout(&client);
    Json(ReleaseResponse { client, released }).into_response()
}

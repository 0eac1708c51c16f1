//! Affiliate click endpoints
//!
//! Both endpoints always acknowledge the click. A client flagged by the click
//! is refused by the gate from its next request on.

use crate::abuse::ClickVerdict;
use crate::gate::ClickOutcome;
use crate::notify::{self, Alert, AlertKind};
use crate::routes::AppState;
use axum::{
    extract::{Path, State},
    http::{header, HeaderMap},
    routing::get,
    Extension, Json, Router,
};
use leadgate_common::{ClickAck, ClientKey, PartnerId};
use std::time::Instant;

/// Build the affiliate router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/affiliate/{partner_id}", get(affiliate_click))
        .route("/affiliate2/{partner_id}", get(affiliate_click_advanced))
}

/// Basic link: click frequency check only
async fn affiliate_click(
    State(state): State<AppState>,
    Path(partner_id): Path<String>,
    Extension(client): Extension<ClientKey>,
) -> Json<ClickAck> {
    let partner = PartnerId::new(partner_id);
    let outcome = state.gate.record_click(&partner, &client, Instant::now());
    raise_if_flagged(&state, &client, &outcome);

    Json(ClickAck {
        message: format!("Affiliate link for {} clicked.", partner),
    })
}

/// Advanced link: user-agent screening, frequency and fraud score
async fn affiliate_click_advanced(
    State(state): State<AppState>,
    Path(partner_id): Path<String>,
    Extension(client): Extension<ClientKey>,
    headers: HeaderMap,
) -> Json<ClickAck> {
    let partner = PartnerId::new(partner_id);
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok());

    let outcome = state
        .gate
        .record_click_advanced(&partner, &client, user_agent, Instant::now());
    raise_if_flagged(&state, &client, &outcome);

    Json(ClickAck {
        message: format!("Affiliate link for {} clicked (advanced check).", partner),
    })
}

fn raise_if_flagged(state: &AppState, client: &ClientKey, outcome: &ClickOutcome) {
    if !outcome.newly_flagged {
        return;
    }

    let detail = match &outcome.verdict {
        ClickVerdict::Fraudulent(reason) => reason.describe(),
        ClickVerdict::Clean { .. } => return,
    };

    let alert = Alert::new(
        AlertKind::ClientFlagged,
        "Affiliate fraud suspected",
        format!("Client {} flagged: {}", client, detail),
    )
    .for_client(client.clone());

    notify::dispatch(state.notifier.clone(), alert);
}

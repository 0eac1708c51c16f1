//! Peer security handlers

use crate::notify::{self, Alert, AlertKind};
use crate::routes::AppState;
use axum::{extract::State, routing::post, Json, Router};
use leadgate_common::{constants, AttackAnalysis, AttackReport};

pub fn router() -> Router<AppState> {
    Router::new().route("/cyber_attack_analysis", post(cyber_attack_analysis))
}

/// Record an attack report from a peer system and alert on critical ones
async fn cyber_attack_analysis(
    State(state): State<AppState>,
    Json(report): Json<AttackReport>,
) -> Json<AttackAnalysis> {
    let vector = report.attack_vector.as_deref().unwrap_or("unspecified");
    let severity = report.severity_score.unwrap_or(constants::DEFAULT_SEVERITY);
    let critical = severity > constants::CRITICAL_SEVERITY;

    if critical {
        tracing::warn!(vector, severity, "Critical cyber attack reported");
        let alert = Alert::new(
            AlertKind::CriticalAttack,
            "Cyber attack",
            format!("Critical attack via {} (severity {:.1})", vector, severity),
        );
        notify::dispatch(state.notifier.clone(), alert);
    } else {
        tracing::info!(vector, severity, "Cyber attack analysed");
    }

    Json(AttackAnalysis {
        status: "attack analysed".to_string(),
        critical,
    })
}

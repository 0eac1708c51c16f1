//! Route handlers for the Leadgate server

pub mod admin;
pub mod affiliate;
pub mod security;

use crate::{config::Config, gate::AdmissionGate, notify::Notifier};
use axum::{middleware, response::IntoResponse, routing::get, Json, Router};
use leadgate_common::HealthResponse;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub gate: Arc<AdmissionGate>,
    pub notifier: Arc<dyn Notifier>,
}

impl AppState {
    pub fn new(config: Config, notifier: Arc<dyn Notifier>) -> Self {
        let gate = Arc::new(AdmissionGate::new(&config.gate));
        Self {
            config: Arc::new(config),
            gate,
            notifier,
        }
    }
}

/// Build the public router. Every route, including the fallback, sits behind
/// the admission gate.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .merge(affiliate::router())
        .merge(security::router())
        .merge(admin::router())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            crate::gate::admission_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abuse::LinearScorer;
    use crate::notify::testing::RecordingNotifier;
    use crate::notify::AlertKind;
    use axum::{
        body::Body,
        extract::ConnectInfo,
        http::{Method, Request, StatusCode},
        response::Response,
    };
    use leadgate_common::{constants, AttackAnalysis, ClickAck, ErrorBody, GateStats, ReleaseResponse};
    use serde::de::DeserializeOwned;
    use std::collections::HashMap;
    use std::net::SocketAddr;
    use tower::ServiceExt;

    const TOKEN: &str = "test-admin-token";

    struct Harness {
        app: Router,
        alerts: Arc<RecordingNotifier>,
    }

    fn harness(vars: &[(&str, &str)]) -> Harness {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let config = Config::from_lookup(|key| vars.get(key).cloned()).unwrap();

        let scorer = LinearScorer::new(f64::from(config.gate.clicks.threshold), 0.3)
            .with_signal(|| 0.0);
        let alerts = Arc::new(RecordingNotifier::default());
        let state = AppState {
            gate: Arc::new(AdmissionGate::with_scorer(&config.gate, Arc::new(scorer))),
            config: Arc::new(config),
            notifier: alerts.clone(),
        };

        Harness {
            app: build_router(state),
            alerts,
        }
    }

    fn request(method: Method, uri: &str, ip: &str) -> axum::http::request::Builder {
        let addr = SocketAddr::new(ip.parse().unwrap(), 40_000);
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(extensions) = builder.extensions_mut() {
            extensions.insert(ConnectInfo(addr));
        }
        builder
    }

    async fn get(app: &Router, uri: &str, ip: &str) -> Response {
        let req = request(Method::GET, uri, ip).body(Body::empty()).unwrap();
        app.clone().oneshot(req).await.unwrap()
    }

    async fn body<T: DeserializeOwned>(response: Response) -> T {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let h = harness(&[]);
        let response = get(&h.app, "/health", "192.0.2.1").await;
        assert_eq!(response.status(), StatusCode::OK);
        let health: HealthResponse = body(response).await;
        assert_eq!(health.status, "healthy");
    }

    #[tokio::test]
    async fn test_lockout_flow() {
        let h = harness(&[("RATE_LIMIT_MAX_REQUESTS", "3")]);

        for _ in 0..3 {
            assert_eq!(get(&h.app, "/health", "192.0.2.2").await.status(), StatusCode::OK);
        }

        let response = get(&h.app, "/health", "192.0.2.2").await;
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()["retry-after"], "301");
        assert_eq!(response.headers()["x-ratelimit-limit"], "3");
        let error: ErrorBody = body(response).await;
        assert_eq!(error.error, constants::LOCKED_OUT_MESSAGE);

        let response = get(&h.app, "/affiliate/P1", "192.0.2.2").await;
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let error: ErrorBody = body(response).await;
        assert_eq!(error.error, constants::RATE_LIMITED_MESSAGE);

        // Other clients are unaffected
        assert_eq!(get(&h.app, "/health", "192.0.2.3").await.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_click_flood_blocks_client() {
        let h = harness(&[]);
        let ip = "198.51.100.20";

        for _ in 0..21 {
            let response = get(&h.app, "/affiliate/P1", ip).await;
            assert_eq!(response.status(), StatusCode::OK);
            let ack: ClickAck = body(response).await;
            assert!(ack.message.contains("P1"));
        }

        let response = get(&h.app, "/health", ip).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let error: ErrorBody = body(response).await;
        assert_eq!(error.error, constants::ACCESS_DENIED_MESSAGE);

        let alerts = h.alerts.wait_for(1).await;
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::ClientFlagged);
        assert_eq!(alerts[0].client.as_ref().map(|c| c.as_str()), Some(ip));
    }

    #[tokio::test]
    async fn test_hijacking_user_agent_blocks_next_request() {
        let h = harness(&[]);
        let ip = "198.51.100.21";

        let req = request(Method::GET, "/affiliate2/P9", ip)
            .header("User-Agent", "Fraud-Crawler/2.1")
            .body(Body::empty())
            .unwrap();
        let response = h.app.clone().oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        assert_eq!(get(&h.app, "/affiliate2/P9", ip).await.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_admin_disabled_without_token() {
        let h = harness(&[]);
        let req = request(Method::GET, "/api/admin/stats", "192.0.2.30")
            .header("Authorization", "Bearer anything")
            .body(Body::empty())
            .unwrap();
        let response = h.app.clone().oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_admin_stats_and_unflag() {
        let h = harness(&[("ADMIN_TOKEN", TOKEN)]);
        let suspect = "198.51.100.22";
        let operator = "192.0.2.31";

        let req = request(Method::GET, "/affiliate2/P1", suspect)
            .header("User-Agent", "evil-bot")
            .body(Body::empty())
            .unwrap();
        h.app.clone().oneshot(req).await.unwrap();
        assert_eq!(get(&h.app, "/health", suspect).await.status(), StatusCode::FORBIDDEN);

        // Wrong token
        let req = request(Method::GET, "/api/admin/stats", operator)
            .header("Authorization", "Bearer nope")
            .body(Body::empty())
            .unwrap();
        assert_eq!(h.app.clone().oneshot(req).await.unwrap().status(), StatusCode::UNAUTHORIZED);

        let req = request(Method::GET, "/api/admin/stats", operator)
            .header("Authorization", format!("Bearer {}", TOKEN))
            .body(Body::empty())
            .unwrap();
        let response = h.app.clone().oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let stats: GateStats = body(response).await;
        assert_eq!(stats.flagged, 1);
        assert_eq!(stats.denied, 1);
        assert_eq!(stats.suspects, 1);

        let uri = format!("/api/admin/suspects/{}", suspect);
        let req = request(Method::DELETE, &uri, operator)
            .header("Authorization", format!("Bearer {}", TOKEN))
            .body(Body::empty())
            .unwrap();
        let released: ReleaseResponse = body(h.app.clone().oneshot(req).await.unwrap()).await;
        assert!(released.released);

        assert_eq!(get(&h.app, "/health", suspect).await.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_admin_lifts_lockout() {
        let h = harness(&[("ADMIN_TOKEN", TOKEN), ("RATE_LIMIT_MAX_REQUESTS", "1")]);
        let client = "198.51.100.23";

        get(&h.app, "/health", client).await;
        assert_eq!(
            get(&h.app, "/health", client).await.status(),
            StatusCode::TOO_MANY_REQUESTS
        );

        let uri = format!("/api/admin/lockouts/{}", client);
        let req = request(Method::DELETE, &uri, "192.0.2.32")
            .header("Authorization", format!("Bearer {}", TOKEN))
            .body(Body::empty())
            .unwrap();
        let released: ReleaseResponse = body(h.app.clone().oneshot(req).await.unwrap()).await;
        assert!(released.released);

        assert_eq!(get(&h.app, "/health", client).await.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_cyber_attack_analysis() {
        let h = harness(&[]);

        let req = request(Method::POST, "/cyber_attack_analysis", "192.0.2.40")
            .header("Content-Type", "application/json")
            .body(Body::from(r#"{"attack_vector":"ddos","severity_score":9.5}"#))
            .unwrap();
        let analysis: AttackAnalysis = body(h.app.clone().oneshot(req).await.unwrap()).await;
        assert_eq!(analysis.status, "attack analysed");
        assert!(analysis.critical);

        let req = request(Method::POST, "/cyber_attack_analysis", "192.0.2.40")
            .header("Content-Type", "application/json")
            .body(Body::from("{}"))
            .unwrap();
        let analysis: AttackAnalysis = body(h.app.clone().oneshot(req).await.unwrap()).await;
        assert!(!analysis.critical);

        let alerts = h.alerts.wait_for(1).await;
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::CriticalAttack);
        assert!(alerts[0].message.contains("ddos"));
    }
}

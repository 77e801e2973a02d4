use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post},
    Router,
};
use domain_wrap_util::MintConfig;
use metrics_exporter_prometheus::PrometheusHandle;

use crate::events::MintEventHub;
use crate::mint::MintWorkflow;
use crate::wallet::WalletSession;
use crate::{api, telemetry};

#[derive(Clone)]
pub struct AppState {
    metrics: PrometheusHandle,
    workflow: MintWorkflow,
    wallet: WalletSession,
}

impl AppState {
    pub fn new(metrics: PrometheusHandle, workflow: MintWorkflow, wallet: WalletSession) -> Self {
        Self {
            metrics,
            workflow,
            wallet,
        }
    }

    /// Builds a fresh session: empty registry, disconnected wallet.
    pub fn from_config(metrics: PrometheusHandle, config: &MintConfig) -> Self {
        let wallet = WalletSession::new(config.wallet_address.clone());
        let workflow =
            MintWorkflow::from_config(config, Arc::new(wallet.clone()), MintEventHub::new());
        Self::new(metrics, workflow, wallet)
    }

    pub fn metrics(&self) -> &PrometheusHandle {
        &self.metrics
    }

    pub fn workflow(&self) -> &MintWorkflow {
        &self.workflow
    }

    pub fn wallet(&self) -> &WalletSession {
        &self.wallet
    }
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .route("/api/wallet", get(api::wallet_status).delete(api::disconnect_wallet))
        .route("/api/wallet/connect", post(api::connect_wallet))
        .route("/api/domains/validate", get(api::validate_domain))
        .route("/api/mints", post(api::submit_mint))
        .route("/api/mints/status", get(api::mint_status))
        .route("/api/mints/current", delete(api::cancel_mint))
        .route("/api/mints/events", get(api::mint_events))
        .route("/api/tokens", get(api::list_tokens))
        .route("/api/tokens/:id", get(api::get_token))
        .route("/api/tokens/:id/metadata", get(api::get_token_metadata))
        .route("/api/tokens/:id/transfer", post(api::transfer_token))
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let body = telemetry::render_metrics(state.metrics());
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        Body::from(body),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn setup_state() -> AppState {
        let metrics = telemetry::init_metrics().expect("metrics init");
        AppState::from_config(metrics, &MintConfig::default())
    }

    #[tokio::test]
    async fn healthz_returns_ok() {
        let app = app_router(setup_state());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/healthz")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .expect("handler should respond");

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn metrics_exports_build_info() {
        let app = app_router(setup_state());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/metrics")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .expect("handler should respond");

        assert_eq!(response.status(), StatusCode::OK);
        let collected = response
            .into_body()
            .collect()
            .await
            .expect("body should read");
        let body = String::from_utf8(collected.to_bytes().to_vec()).expect("utf-8");
        assert!(body.contains("app_build_info"));
        assert!(body.contains("app_uptime_seconds"));
    }
}

//! Read-only HTTP side-channel for dashboards, plus the market reset.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bazaar_core::{HubError, Offer};
use bazaar_ledger::{InvoiceRecord, ResetSummary, TransactionRecord};
use serde::Serialize;

use crate::hub::HubStats;
use crate::registry::RosterEntry;
use crate::server::AppState;

/// Error body for side-channel requests.
#[derive(Debug)]
pub struct ApiError(HubError);

impl From<HubError> for ApiError {
    fn from(err: HubError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            HubError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = serde_json::json!({
            "error": self.0.error_kind(),
            "message": self.0.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

/// `GET /offers` body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OffersResponse {
    pub offers: Vec<Offer>,
    pub pending_invoices: Vec<InvoiceRecord>,
}

/// `GET /health` body.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    #[serde(flatten)]
    pub stats: HubStats,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/roster", get(roster))
        .route("/transactions", get(transactions))
        .route("/offers", get(offers))
        .route("/reset", post(reset))
        .route("/health", get(health))
}

async fn roster(State(state): State<AppState>) -> Result<Json<Vec<RosterEntry>>, ApiError> {
    Ok(Json(state.hub.roster().await?))
}

async fn transactions(
    State(state): State<AppState>,
) -> Result<Json<Vec<TransactionRecord>>, ApiError> {
    Ok(Json(state.hub.transactions().await?))
}

async fn offers(State(state): State<AppState>) -> Result<Json<OffersResponse>, ApiError> {
    let market = state.hub.market().await?;
    Ok(Json(OffersResponse {
        offers: market.offers,
        pending_invoices: market.invoices,
    }))
}

async fn reset(State(state): State<AppState>) -> Result<Json<ResetSummary>, ApiError> {
    Ok(Json(state.hub.reset().await?))
}

async fn health(State(state): State<AppState>) -> Response {
    match state.hub.stats().await {
        Ok(stats) => Json(HealthResponse {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
            stats,
        })
        .into_response(),
        Err(e) => ApiError(e).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::Request;
    use bazaar_core::{ConnectionId, Role};
    use bazaar_ledger::Ledger;
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;
    use tower::ServiceExt;

    use crate::config::HubConfig;
    use crate::hub::Hub;
    use crate::server::build_router;

    use super::*;

    fn app() -> (Router, crate::hub::HubHandle, CancellationToken) {
        let cancel = CancellationToken::new();
        let (hub, _task) = Hub::spawn(Ledger::default(), None, 64, cancel.clone());
        let state = AppState {
            hub: hub.clone(),
            config: Arc::new(HubConfig::default()),
        };
        (build_router(state), hub, cancel)
    }

    async fn get_json(router: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let resp = router
            .clone()
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn trade(hub: &crate::hub::HubHandle) -> mpsc::Receiver<crate::connection::Outbound> {
        let (tx, rx) = mpsc::channel(64);
        let (tx_b, _rx_b) = mpsc::channel(64);
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        hub.connect(a.clone(), Role::Participant, Some("Alice".into()), tx).await.unwrap();
        hub.connect(b.clone(), Role::Participant, None, tx_b).await.unwrap();
        for (id, raw) in [
            (&a, r#"{"t":"OFFER","id":"o1","skill":"design","price":5,"from":"A"}"#),
            (&a, r#"{"t":"OFFER","id":"o2","skill":"copy","price":3,"from":"A"}"#),
            (&b, r#"{"t":"ACCEPT","id":"o1","from":"B"}"#),
            (&a, r#"{"t":"PAY","id":"o1","tx":"0xabc","from":"A"}"#),
            (&b, r#"{"t":"ACCEPT","id":"o2","from":"B"}"#),
        ] {
            hub.inbound(id.clone(), raw.to_string()).await.unwrap();
        }
        rx
    }

    #[tokio::test]
    async fn health_reports_counts() {
        let (router, hub, _cancel) = app();
        let _rx = trade(&hub).await;
        let (status, body) = get_json(&router, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["connections"], 2);
        assert_eq!(body["participants"], 2);
        assert_eq!(body["openOffers"], 0);
        assert_eq!(body["pendingInvoices"], 1);
        assert_eq!(body["transactions"], 1);
        assert_eq!(body["droppedMessages"], 0);
    }

    #[tokio::test]
    async fn roster_transactions_offers() {
        let (router, hub, _cancel) = app();
        let _rx = trade(&hub).await;

        let (_, roster) = get_json(&router, "/roster").await;
        assert_eq!(roster.as_array().unwrap().len(), 2);
        assert_eq!(roster[0]["address"], "A");
        assert_eq!(roster[0]["name"], "Alice");

        let (_, txs) = get_json(&router, "/transactions").await;
        assert_eq!(txs[0]["offerId"], "o1");
        assert_eq!(txs[0]["settlementRef"], "0xabc");
        assert_eq!(txs[0]["amount"], 5.0);
        assert_eq!(txs[0]["status"], "completed");

        let (_, offers) = get_json(&router, "/offers").await;
        assert_eq!(offers["offers"].as_array().unwrap().len(), 0);
        assert_eq!(offers["pendingInvoices"][0]["id"], "o2");
    }

    #[tokio::test]
    async fn reset_clears_market() {
        let (router, hub, _cancel) = app();
        let _rx = trade(&hub).await;
        let resp = router
            .clone()
            .oneshot(Request::post("/reset").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let summary: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(summary["transactions"], 1);
        assert_eq!(summary["invoices"], 1);

        let (_, txs) = get_json(&router, "/transactions").await;
        assert!(txs.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn stopped_hub_is_unavailable() {
        let (router, _hub, cancel) = app();
        cancel.cancel();
        // Let the loop observe cancellation and drop its receiver.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let (status, body) = get_json(&router, "/roster").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "unavailable");
    }
}

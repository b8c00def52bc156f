//! Participant balance lookups.
//!
//! Lookups run off the hub loop; results re-enter it as
//! [`HubCommand::BalanceResolved`](crate::hub::HubCommand::BalanceResolved).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum BalanceError {
    #[error("invalid balance service URL `{url}`: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("balance request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("balance service answered {0}")]
    Status(u16),
    #[error("no balance known for {0}")]
    Unknown(String),
}

/// Source of participant balances.
#[async_trait]
pub trait BalanceSource: Send + Sync {
    async fn balance_of(&self, address: &str) -> Result<f64, BalanceError>;
}

/// Balance service reached over HTTP: `GET {base}/balance/{address}` answering
/// `{"balance": <number>}`.
#[derive(Clone, Debug)]
pub struct HttpBalanceSource {
    client: reqwest::Client,
    base_url: Url,
}

#[derive(Deserialize)]
struct BalanceBody {
    balance: f64,
}

impl HttpBalanceSource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, BalanceError> {
        let invalid = |reason: String| BalanceError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason,
        };
        let parsed = Url::parse(base_url).map_err(|e| invalid(e.to_string()))?;
        if parsed.cannot_be_a_base() {
            return Err(invalid("not a base URL".into()));
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: parsed,
        })
    }

    fn url_for(&self, address: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            let _ = segments.pop_if_empty().push("balance").push(address);
        }
        url
    }
}

#[async_trait]
impl BalanceSource for HttpBalanceSource {
    async fn balance_of(&self, address: &str) -> Result<f64, BalanceError> {
        let response = self.client.get(self.url_for(address)).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(BalanceError::Status(status.as_u16()));
        }
        Ok(response.json::<BalanceBody>().await?.balance)
    }
}

/// Fixed in-memory balances.
#[derive(Clone, Debug, Default)]
pub struct StaticBalances {
    balances: HashMap<String, f64>,
}

impl StaticBalances {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        Self {
            balances: entries.into_iter().map(|(a, b)| (a.into(), b)).collect(),
        }
    }
}

#[async_trait]
impl BalanceSource for StaticBalances {
    async fn balance_of(&self, address: &str) -> Result<f64, BalanceError> {
        self.balances
            .get(address)
            .copied()
            .ok_or_else(|| BalanceError::Unknown(address.to_string()))
    }
}

/// Build the configured balance source, if any.
pub fn from_url(
    base_url: Option<&str>,
    timeout: Duration,
) -> Result<Option<Arc<dyn BalanceSource>>, BalanceError> {
    match base_url {
        Some(url) => Ok(Some(Arc::new(HttpBalanceSource::new(url, timeout)?))),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Path;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{Json, Router};

    async fn serve_balances() -> String {
        async fn balance(Path(address): Path<String>) -> Result<Json<serde_json::Value>, StatusCode> {
            match address.as_str() {
                "A" => Ok(Json(serde_json::json!({"balance": 42.5}))),
                "a b" => Ok(Json(serde_json::json!({"balance": 1}))),
                _ => Err(StatusCode::NOT_FOUND),
            }
        }
        let app = Router::new().route("/api/balance/{address}", get(balance));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _server = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });
        format!("http://{addr}/api/")
    }

    #[test]
    fn url_for_appends_segments() {
        let source = HttpBalanceSource::new("http://ledger.local/v1", Duration::from_secs(1)).unwrap();
        assert_eq!(
            source.url_for("A").as_str(),
            "http://ledger.local/v1/balance/A"
        );
        let source = HttpBalanceSource::new("http://ledger.local/v1/", Duration::from_secs(1)).unwrap();
        assert_eq!(
            source.url_for("x/y").as_str(),
            "http://ledger.local/v1/balance/x%2Fy"
        );
    }

    #[test]
    fn rejects_bad_base_url() {
        assert!(matches!(
            HttpBalanceSource::new("not a url", Duration::from_secs(1)),
            Err(BalanceError::InvalidBaseUrl { .. })
        ));
        assert!(matches!(
            HttpBalanceSource::new("mailto:someone@example.com", Duration::from_secs(1)),
            Err(BalanceError::InvalidBaseUrl { .. })
        ));
    }

    #[tokio::test]
    async fn http_source_reads_balance() {
        let base = serve_balances().await;
        let source = HttpBalanceSource::new(&base, Duration::from_secs(5)).unwrap();
        assert_eq!(source.balance_of("A").await.unwrap(), 42.5);
        assert_eq!(source.balance_of("a b").await.unwrap(), 1.0);
        assert!(matches!(
            source.balance_of("Z").await,
            Err(BalanceError::Status(404))
        ));
    }

    #[tokio::test]
    async fn static_source() {
        let source = StaticBalances::new([("A", 10.0)]);
        assert_eq!(source.balance_of("A").await.unwrap(), 10.0);
        assert!(matches!(
            source.balance_of("B").await,
            Err(BalanceError::Unknown(_))
        ));
    }

    #[test]
    fn from_url_is_optional() {
        assert!(from_url(None, Duration::from_secs(1)).unwrap().is_none());
        assert!(from_url(Some("http://x"), Duration::from_secs(1))
            .unwrap()
            .is_some());
    }
}

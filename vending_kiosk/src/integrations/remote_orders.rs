use std::time::Duration;

use log::*;
use reqwest::Client;
use serde_json::Value;
use vending_engine::{db_types::RemoteOrder, RemoteOrderError, RemoteOrderSource};

/// Fetches pending online orders from the ordering service. The endpoint replies to a `GET` with a JSON array of
/// `{ "order_id": 12, "item_id": 1, "user_id": 3 }` objects; `user_id` is optional.
#[derive(Clone)]
pub struct HttpOrderSource {
    url: String,
    client: Client,
}

impl HttpOrderSource {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, RemoteOrderError> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| RemoteOrderError::Network(e.to_string()))?;
        Ok(Self { url: url.to_string(), client })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl RemoteOrderSource for HttpOrderSource {
    async fn fetch_pending_orders(&self) -> Result<Vec<RemoteOrder>, RemoteOrderError> {
        trace!("📡️ Fetching remote orders from {}", self.url);
        let response =
            self.client.get(&self.url).send().await.map_err(|e| RemoteOrderError::Network(e.to_string()))?;
        if !response.status().is_success() {
            return Err(RemoteOrderError::UnexpectedStatus(response.status().as_u16()));
        }
        let rows = response.json::<Vec<Value>>().await.map_err(|e| RemoteOrderError::InvalidPayload(e.to_string()))?;
        let orders = rows
            .into_iter()
            .filter_map(|row| match serde_json::from_value::<RemoteOrder>(row.clone()) {
                Ok(order) => Some(order),
                Err(e) => {
                    warn!("📡️ Skipping malformed remote order {row}. {e}");
                    None
                },
            })
            .collect::<Vec<_>>();
        trace!("📡️ {} remote orders reported", orders.len());
        Ok(orders)
    }
}

#[cfg(test)]
mod test {
    use tokio::net::TcpListener;

    use super::*;
    use crate::integrations::test_server::serve_once;

    #[tokio::test]
    async fn reads_remote_orders() {
        let (base, request) = serve_once(
            "200 OK",
            r#"[{"order_id": 500, "item_id": 1, "user_id": 3}, {"order_id": 501, "item_id": 2}, {"item_id": "x"}]"#,
        )
        .await;
        let source = HttpOrderSource::new(&format!("{base}/order"), Duration::from_secs(2)).unwrap();
        let orders = source.fetch_pending_orders().await.unwrap();
        assert!(request.await.unwrap().starts_with("GET /order "));
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].order_id, 500);
        assert_eq!(orders[0].user_id, Some(3));
        assert_eq!(orders[1].item_id, 2);
        assert_eq!(orders[1].user_id, None);
    }

    #[tokio::test]
    async fn server_errors_are_reported() {
        let (base, _) = serve_once("503 Service Unavailable", "[]").await;
        let source = HttpOrderSource::new(&format!("{base}/order"), Duration::from_secs(2)).unwrap();
        let err = source.fetch_pending_orders().await.unwrap_err();
        assert!(matches!(err, RemoteOrderError::UnexpectedStatus(503)));
    }

    #[tokio::test]
    async fn garbage_payload_is_reported() {
        let (base, _) = serve_once("200 OK", "<html>menu</html>").await;
        let source = HttpOrderSource::new(&format!("{base}/order"), Duration::from_secs(2)).unwrap();
        let err = source.fetch_pending_orders().await.unwrap_err();
        assert!(matches!(err, RemoteOrderError::InvalidPayload(_)));
    }

    #[tokio::test]
    async fn unreachable_service_is_a_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let source = HttpOrderSource::new(&format!("http://{addr}/order"), Duration::from_millis(500)).unwrap();
        let err = source.fetch_pending_orders().await.unwrap_err();
        assert!(matches!(err, RemoteOrderError::Network(_)));
    }
}

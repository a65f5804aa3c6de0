//! HTTP implementation of the remote store surface.
//!
//! Speaks a plain JSON REST protocol: `GET /api/v1/{table}` for snapshots,
//! `PUT /api/v1/{table}/{id}` for upserts, `DELETE /api/v1/{table}/{id}`,
//! and `GET /api/v1/reservations/overlap` for the authoritative conflict
//! check. Connectivity probes hit `GET /api/v1/health`.

use std::time::Duration;

use chrono::NaiveDate;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;

use super::{ConnectivityProbe, RemoteStore};
use crate::error::{Error, Result};
use crate::models::EntityKind;

const HTTP_TIMEOUT_SECS: u64 = 10;
const PROBE_TIMEOUT_SECS: u64 = 3;

/// Remote store client over HTTP
#[derive(Clone)]
pub struct HttpRemoteStore {
    base_url: String,
    client: reqwest::Client,
}

impl HttpRemoteStore {
    /// Create a client for the given base endpoint (scheme required)
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let base_url = normalize_endpoint(endpoint.into())?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|error| Error::Connectivity(error.to_string()))?;
        Ok(Self { base_url, client })
    }

    fn table_url(&self, kind: EntityKind) -> String {
        format!("{}/api/v1/{}", self.base_url, kind.table_name())
    }

    fn row_url(&self, kind: EntityKind, id: &str) -> String {
        format!("{}/{}", self.table_url(kind), id)
    }

    async fn read_rows(&self, response: reqwest::Response) -> Result<Vec<Value>> {
        let rows = response
            .json::<Vec<Value>>()
            .await
            .map_err(|error| Error::Mapping(format!("invalid remote row list: {error}")))?;
        Ok(rows)
    }
}

impl RemoteStore for HttpRemoteStore {
    async fn select_all(&self, kind: EntityKind) -> Result<Vec<Value>> {
        let response = self
            .client
            .get(self.table_url(kind))
            .send()
            .await
            .map_err(|error| Error::Connectivity(error.to_string()))?;
        let response = reject_error_status(response, Error::Connectivity).await?;
        self.read_rows(response).await
    }

    async fn upsert(&self, kind: EntityKind, row: Value) -> Result<()> {
        let id = super::adapter::remote_row_id(&row)?;
        let response = self
            .client
            .put(self.row_url(kind, &id))
            .json(&row)
            .send()
            .await
            .map_err(|error| Error::Connectivity(error.to_string()))?;
        reject_error_status(response, Error::RemoteWrite).await?;
        Ok(())
    }

    async fn delete_by_id(&self, kind: EntityKind, id: &str) -> Result<()> {
        let response = self
            .client
            .delete(self.row_url(kind, id))
            .send()
            .await
            .map_err(|error| Error::Connectivity(error.to_string()))?;

        // Replayed deletes hit an already-removed row
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        reject_error_status(response, Error::RemoteWrite).await?;
        Ok(())
    }

    async fn reservations_overlapping(
        &self,
        room_id: &str,
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> Result<Vec<Value>> {
        let url = format!(
            "{}/api/v1/reservations/overlap?room_id={room_id}&from={}&to={}",
            self.base_url,
            check_in.format("%Y-%m-%d"),
            check_out.format("%Y-%m-%d"),
        );
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|error| Error::Connectivity(error.to_string()))?;
        let response = reject_error_status(response, Error::Connectivity).await?;
        self.read_rows(response).await
    }
}

impl ConnectivityProbe for HttpRemoteStore {
    async fn check(&self) -> bool {
        let request = self
            .client
            .get(format!("{}/api/v1/health", self.base_url))
            .timeout(Duration::from_secs(PROBE_TIMEOUT_SECS));

        match request.send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RemoteErrorBody {
    error: Option<String>,
    message: Option<String>,
}

/// `wrap` picks the taxonomy for the failing side: reads report
/// `Connectivity`, writes report `RemoteWrite`
async fn reject_error_status(
    response: reqwest::Response,
    wrap: fn(String) -> Error,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(wrap(parse_api_error(status, &body)))
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<RemoteErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed.chars().take(180).collect::<String>(), status.as_u16())
    }
}

fn normalize_endpoint(raw: String) -> Result<String> {
    let endpoint = raw.trim();
    if endpoint.is_empty() {
        return Err(Error::InvalidInput("endpoint must not be empty".to_string()));
    }
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        Ok(endpoint.trim_end_matches('/').to_string())
    } else {
        Err(Error::InvalidInput(
            "endpoint must include http:// or https://".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_endpoint_rejects_invalid_values() {
        assert!(normalize_endpoint(String::new()).is_err());
        assert!(normalize_endpoint("api.example.com".to_string()).is_err());
        assert_eq!(
            normalize_endpoint("https://api.example.com/".to_string()).unwrap(),
            "https://api.example.com"
        );
    }

    #[test]
    fn test_table_and_row_urls() {
        let store = HttpRemoteStore::new("https://api.example.com").unwrap();
        assert_eq!(
            store.table_url(EntityKind::PaymentMethods),
            "https://api.example.com/api/v1/payment_methods"
        );
        assert_eq!(
            store.row_url(EntityKind::Rooms, "r-1"),
            "https://api.example.com/api/v1/rooms/r-1"
        );
    }

    #[test]
    fn test_parse_api_error_prefers_message() {
        let message = parse_api_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"message": "departure before arrival"}"#,
        );
        assert_eq!(message, "departure before arrival (422)");
    }

    #[test]
    fn test_parse_api_error_falls_back_to_status() {
        assert_eq!(parse_api_error(StatusCode::BAD_GATEWAY, ""), "HTTP 502");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_error_status_taxonomy_follows_the_side() {
        let read = reqwest::Response::from(
            http::Response::builder().status(500).body("oops").unwrap(),
        );
        let error = reject_error_status(read, Error::Connectivity).await.unwrap_err();
        assert!(matches!(error, Error::Connectivity(_)));

        let write = reqwest::Response::from(
            http::Response::builder()
                .status(422)
                .body(r#"{"message": "departure before arrival"}"#)
                .unwrap(),
        );
        let error = reject_error_status(write, Error::RemoteWrite).await.unwrap_err();
        assert!(matches!(error, Error::RemoteWrite(_)));
        assert_eq!(error.to_string(), "Remote write rejected: departure before arrival (422)");
    }
}

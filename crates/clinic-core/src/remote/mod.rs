//! Client for the external system of record.

use std::marker::PhantomData;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

use crate::config::RemoteEndpoint;
use crate::error::{Error, Result};
use crate::sync::{MirroredRecord, SyncRecord};
use crate::util::{compact_text, is_http_url};

/// Remote feed for one record kind.
#[async_trait]
pub trait ExternalSource<R: SyncRecord>: Send + Sync {
    /// Cheap reachability check; never errors.
    async fn is_available(&self) -> bool;

    /// Every record the feed currently serves.
    async fn fetch_all(&self) -> Result<Vec<R::Wire>>;
}

/// Write side of the external system, for kinds mirrored on create.
#[async_trait]
pub trait ExternalSink<R: MirroredRecord>: Send + Sync {
    async fn is_available(&self) -> bool;

    /// Mirror a local create. `Ok(None)` means the remote did not accept it.
    async fn create(&self, record: &R) -> Result<Option<R::Wire>>;
}

/// JSON-over-HTTP feed: `GET <url>` lists, `POST <url>` creates.
pub struct HttpExternalSource<R> {
    url: String,
    api_key: Option<String>,
    client: reqwest::Client,
    _record: PhantomData<fn() -> R>,
}

impl<R: SyncRecord> HttpExternalSource<R> {
    pub fn new(endpoint: &RemoteEndpoint, timeout: Duration) -> Result<Self> {
        let url = endpoint.url.trim().trim_end_matches('/').to_string();
        if !is_http_url(&url) {
            return Err(Error::Config(format!(
                "{} source URL must include http:// or https://",
                R::KIND
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| Error::Remote(format!("failed to build HTTP client: {error}")))?;

        Ok(Self {
            url,
            api_key: endpoint.api_key.clone(),
            client,
            _record: PhantomData,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn check_health(&self) -> bool {
        match self.request(reqwest::Method::GET).send().await {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                tracing::debug!(
                    kind = %R::KIND,
                    status = response.status().as_u16(),
                    "External health check returned non-success status"
                );
                false
            }
            Err(error) => {
                tracing::debug!(kind = %R::KIND, %error, "External health check failed");
                false
            }
        }
    }

    fn request(&self, method: reqwest::Method) -> reqwest::RequestBuilder {
        let builder = self
            .client
            .request(method, &self.url)
            .header(reqwest::header::ACCEPT, "application/json");
        match self.api_key.as_deref() {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }
}

#[async_trait]
impl<R: SyncRecord> ExternalSource<R> for HttpExternalSource<R> {
    async fn is_available(&self) -> bool {
        self.check_health().await
    }

    async fn fetch_all(&self) -> Result<Vec<R::Wire>> {
        let response = self
            .request(reqwest::Method::GET)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Remote(parse_api_error(status, &body)));
        }

        let body = response.text().await.map_err(transport_error)?;
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&body).map_err(|error| {
            Error::Remote(format!("invalid {} payload: {error}", R::KIND.plural()))
        })
    }
}

#[async_trait]
impl<R: MirroredRecord> ExternalSink<R> for HttpExternalSource<R> {
    async fn is_available(&self) -> bool {
        self.check_health().await
    }

    async fn create(&self, record: &R) -> Result<Option<R::Wire>> {
        let response = self
            .request(reqwest::Method::POST)
            .json(&record.create_request())
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !create_accepted(status) {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(
                kind = %R::KIND,
                id = record.id(),
                error = %parse_api_error(status, &body),
                "External source did not accept create"
            );
            return Ok(None);
        }

        let body = response.text().await.map_err(transport_error)?;
        serde_json::from_str(&body)
            .map(Some)
            .map_err(|error| Error::Remote(format!("invalid created {} payload: {error}", R::KIND)))
    }
}

/// Only `201 Created` confirms the remote stored the record.
fn create_accepted(status: StatusCode) -> bool {
    status == StatusCode::CREATED
}

fn transport_error(error: reqwest::Error) -> Error {
    Error::Remote(compact_text(&error.to_string()))
}

#[derive(Debug, Deserialize)]
struct RemoteErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<RemoteErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return format!("{} ({})", compact_text(&message), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

//! HTTP bookkeeping backend.
//!
//! Talks JSON to a records API:
//!
//! - `GET {base}/records?username=..&server=..` → `{"list": [row, ...]}`
//! - `PATCH {base}/records/{id}` with `{"total_gb": ..}`
//! - `POST {base}/records` with `{"username", "server", "total_gb"}`
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use meter_sync::HttpStore;
//!
//! let store = HttpStore::new(
//!     "https://panel.example.com/api",
//!     Some("node-token".into()),
//!     Duration::from_secs(10),
//! )
//! .unwrap();
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, Url};
use tracing::debug;

use crate::error::SyncError;
use crate::store::{RemoteRow, RemoteStore, RowId};

// ── HttpStore ─────────────────────────────────────────────────────

/// [`RemoteStore`] backed by a JSON records API.
#[derive(Debug, Clone)]
pub struct HttpStore {
    client: Client,
    records_url: Url,
    api_token: Option<String>,
}

impl HttpStore {
    /// Create a store with its own client bounded by `timeout` per request.
    ///
    /// `base_url` is the API root (e.g. `https://panel.example.com/api`).
    /// `api_token` is sent as a Bearer token when present.
    pub fn new(
        base_url: impl Into<String>,
        api_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, SyncError> {
        let client = Client::builder().timeout(timeout).build()?;
        Self::with_client(client, base_url, api_token)
    }

    /// Create with a custom reqwest [`Client`] (for proxies, custom TLS, etc.).
    pub fn with_client(
        client: Client,
        base_url: impl Into<String>,
        api_token: Option<String>,
    ) -> Result<Self, SyncError> {
        let base = base_url.into();
        let mut records_url =
            Url::parse(&base).map_err(|e| SyncError::InvalidUrl(format!("{base}: {e}")))?;
        records_url
            .path_segments_mut()
            .map_err(|()| SyncError::InvalidUrl(base.clone()))?
            .pop_if_empty()
            .push("records");
        Ok(Self {
            client,
            records_url,
            api_token,
        })
    }

    /// `{base}/records/{id}` with the id as one escaped path segment.
    fn row_url(&self, id: &RowId) -> Result<Url, SyncError> {
        let mut url = self.records_url.clone();
        url.path_segments_mut()
            .map_err(|()| SyncError::InvalidUrl(self.records_url.to_string()))?
            .push(&id.to_string());
        Ok(url)
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match self.api_token {
            Some(ref token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn send(&self, req: RequestBuilder) -> Result<Response, SyncError> {
        let resp = self.authorize(req).send().await?;
        if !resp.status().is_success() {
            return Err(SyncError::Status(resp.status().as_u16()));
        }
        Ok(resp)
    }
}

#[async_trait]
impl RemoteStore for HttpStore {
    async fn find_row(
        &self,
        username: &str,
        server_label: &str,
    ) -> Result<Option<RemoteRow>, SyncError> {
        let req = self
            .client
            .get(self.records_url.clone())
            .query(&[("username", username), ("server", server_label)]);
        let list: wire::RowList = self.send(req).await?.json().await?;

        // The filter is advisory on some backends; match exactly here.
        let row = list
            .list
            .into_iter()
            .find(|row| row.username == username && row.server == server_label)
            .map(RemoteRow::from);
        debug!(username, server = server_label, found = row.is_some(), "remote lookup");
        Ok(row)
    }

    async fn create_row(
        &self,
        username: &str,
        server_label: &str,
        total_gib: f64,
    ) -> Result<(), SyncError> {
        let body = wire::NewRow {
            username,
            server: server_label,
            total_gb: total_gib,
        };
        self.send(self.client.post(self.records_url.clone()).json(&body))
            .await?;
        Ok(())
    }

    async fn patch_row(&self, id: &RowId, total_gib: f64) -> Result<(), SyncError> {
        let url = self.row_url(id)?;
        let body = wire::TotalPatch {
            total_gb: total_gib,
        };
        self.send(self.client.patch(url).json(&body)).await?;
        Ok(())
    }
}

// ── Wire types ────────────────────────────────────────────────────

#[allow(missing_debug_implementations)]
mod wire {
    use serde::{Deserialize, Serialize};

    use crate::store::RowId;

    #[derive(Deserialize)]
    pub struct RowList {
        #[serde(default)]
        pub list: Vec<Row>,
    }

    #[derive(Deserialize)]
    pub struct Row {
        pub id: RowId,
        pub username: String,
        pub server: String,
        pub total_gb: f64,
    }

    #[derive(Serialize)]
    pub struct NewRow<'a> {
        pub username: &'a str,
        pub server: &'a str,
        pub total_gb: f64,
    }

    #[derive(Serialize)]
    pub struct TotalPatch {
        pub total_gb: f64,
    }
}

// ── Wire ↔ store conversions ──────────────────────────────────────

impl From<wire::Row> for RemoteRow {
    fn from(w: wire::Row) -> Self {
        Self {
            id: w.id,
            username: w.username,
            server_label: w.server,
            total_gib: w.total_gb,
        }
    }
}

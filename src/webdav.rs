//! Remote transport: the whole dataset as one JSON document on WebDAV

use async_trait::async_trait;
use reqwest::{Method, StatusCode};

use crate::error::{Error, Result};
use crate::models::{RemoteDocument, Snapshot, WebDavConfig, now};

/// Name of the snapshot document at the root of the WebDAV base URL
pub const DATA_FILE_NAME: &str = "todoapp-data.json";

/// Read/write access to the remote snapshot document.
///
/// Every operation fails with [`Error::NotConfigured`] without touching
/// the network while the transport is unconfigured.
#[async_trait]
pub trait RemoteTransport: Send + Sync {
    /// Replace the current connection. Disabled or incomplete settings
    /// leave the transport unconfigured.
    fn configure(&mut self, config: &WebDavConfig);

    fn is_configured(&self) -> bool;

    /// Whether the snapshot document is present
    async fn exists(&self) -> Result<bool>;

    /// Overwrite the snapshot document unconditionally
    async fn upload(&self, snapshot: &Snapshot) -> Result<()>;

    /// `Ok(None)` when there is no document yet
    async fn download(&self) -> Result<Option<Snapshot>>;

    /// Probe the base collection. Transport failures yield `Ok(false)`.
    async fn test_connection(&self) -> Result<bool>;
}

#[derive(Debug, Clone)]
struct Connection {
    base_url: String,
    username: String,
    password: String,
}

impl Connection {
    fn document_url(&self) -> String {
        format!("{}/{}", self.base_url, DATA_FILE_NAME)
    }

    fn collection_url(&self) -> String {
        format!("{}/", self.base_url)
    }
}

/// WebDAV transport over HTTP(S) with basic authentication
#[derive(Debug, Clone, Default)]
pub struct WebDavClient {
    http: reqwest::Client,
    connection: Option<Connection>,
}

impl WebDavClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn connection(&self) -> Result<&Connection> {
        self.connection.as_ref().ok_or(Error::NotConfigured)
    }

    async fn propfind(
        &self,
        conn: &Connection,
        url: &str,
        depth: &str,
    ) -> reqwest::Result<reqwest::Response> {
        // PROPFIND is a valid token, so this never hits the error branch
        let method = Method::from_bytes(b"PROPFIND").unwrap_or(Method::GET);
        self.http
            .request(method, url)
            .basic_auth(&conn.username, Some(&conn.password))
            .header("Depth", depth)
            .send()
            .await
    }

    async fn document_exists(&self, conn: &Connection) -> Result<bool> {
        let response = self
            .propfind(conn, &conn.document_url(), "0")
            .await
            .map_err(|e| Error::SyncDownloadFailed(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => Err(Error::SyncDownloadFailed(format!(
                "existence check returned {status}"
            ))),
        }
    }
}

#[async_trait]
impl RemoteTransport for WebDavClient {
    fn configure(&mut self, config: &WebDavConfig) {
        self.connection = config.is_usable().then(|| Connection {
            base_url: config.url.trim().trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
        });

        match &self.connection {
            Some(conn) => tracing::debug!(url = %conn.base_url, "WebDAV transport configured"),
            None => tracing::debug!("WebDAV transport unconfigured"),
        }
    }

    fn is_configured(&self) -> bool {
        self.connection.is_some()
    }

    async fn exists(&self) -> Result<bool> {
        let conn = self.connection()?;
        self.document_exists(conn).await
    }

    async fn upload(&self, snapshot: &Snapshot) -> Result<()> {
        let conn = self.connection()?;
        let document = RemoteDocument::new(snapshot.clone(), now());
        let body = serde_json::to_string_pretty(&document)?;

        let response = self
            .http
            .put(conn.document_url())
            .basic_auth(&conn.username, Some(&conn.password))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| Error::SyncUploadFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::SyncUploadFailed(format!("server returned {status}")));
        }

        tracing::info!(
            tasks = snapshot.tasks.len(),
            lists = snapshot.lists.len(),
            "Uploaded snapshot to WebDAV"
        );
        Ok(())
    }

    async fn download(&self) -> Result<Option<Snapshot>> {
        let conn = self.connection()?;
        if !self.document_exists(conn).await? {
            tracing::info!("No remote snapshot found");
            return Ok(None);
        }

        let response = self
            .http
            .get(conn.document_url())
            .basic_auth(&conn.username, Some(&conn.password))
            .send()
            .await
            .map_err(|e| Error::SyncDownloadFailed(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(Error::SyncDownloadFailed(format!("server returned {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::SyncDownloadFailed(e.to_string()))?;
        let document: RemoteDocument = serde_json::from_str(&body)
            .map_err(|e| Error::MalformedRemoteDocument(e.to_string()))?;

        tracing::info!(
            tasks = document.tasks.len(),
            lists = document.lists.len(),
            last_sync = %document.last_sync,
            "Downloaded snapshot from WebDAV"
        );
        Ok(Some(document.into_snapshot()))
    }

    async fn test_connection(&self) -> Result<bool> {
        let conn = self.connection()?;
        match self.propfind(conn, &conn.collection_url(), "1").await {
            Ok(response) => Ok(response.status().is_success()),
            Err(e) => {
                tracing::warn!(error = %e, "WebDAV connection test failed");
                Ok(false)
            }
        }
    }
}

//! Transport layer for the contents API.
//!
//! The storage layer never talks to `reqwest` directly. It hands a
//! [`ContentsRequest`] to a [`ContentsTransport`] and gets the raw status and
//! body back, so status classification and JSON translation stay in the
//! storage layer and tests can swap the network for [`MemoryTransport`].
//!
//! # Architecture
//!
//! ```text
//!   GitHubBlobStorage ──► ContentsSession ──► dyn ContentsTransport
//!                         (locate, cancel,        │
//!                          classify status)       ├── HttpTransport   (reqwest)
//!                                                 └── MemoryTransport (in-process)
//! ```

mod http;
mod memory;

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::storage::record::{self, RemoteContents};
use crate::storage::{BlobPath, ContentsEndpoint, ResourceLocator, StorageError, StorageResult};

pub use http::HttpTransport;
pub use memory::{MemoryTransport, RecordedRequest};

/// HTTP method of a contents request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentsMethod {
    Get,
    /// GET of the undecorated file bytes, for files too large to inline
    GetRaw,
    Put,
    Delete,
}

impl ContentsMethod {
    /// reads carry `?ref=`, mutations name the branch in the body
    pub fn is_read(&self) -> bool {
        matches!(self, Self::Get | Self::GetRaw)
    }
}

impl fmt::Display for ContentsMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Get => "GET",
            Self::GetRaw => "GET raw",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        };
        write!(f, "{}", name)
    }
}

/// one request against the contents API
#[derive(Debug, Clone)]
pub struct ContentsRequest {
    pub method: ContentsMethod,
    pub locator: ResourceLocator,
    /// JSON body for PUT and DELETE
    pub body: Option<serde_json::Value>,
}

/// raw answer of the contents API
#[derive(Debug, Clone)]
pub struct ContentsResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

impl ContentsResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// the body as text, lossy for non UTF-8 payloads
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// the `message` of a GitHub error body, the raw body otherwise
    pub fn error_message(&self) -> String {
        serde_json::from_slice::<serde_json::Value>(&self.body)
            .ok()
            .and_then(|body| body.get("message")?.as_str().map(str::to_string))
            .unwrap_or_else(|| self.text())
    }
}

/// something that can carry contents requests to the remote API
///
/// Implementations report network faults as errors and every HTTP answer,
/// successful or not, as a [`ContentsResponse`].
#[async_trait]
pub trait ContentsTransport: Send + Sync {
    async fn send(&self, request: ContentsRequest) -> StorageResult<ContentsResponse>;
}

/// the per-call view of the remote: endpoint, transport and cancellation
///
/// Every network await in the storage layer goes through here, so the
/// cancellation token is checked before each request and raced against it.
pub(crate) struct ContentsSession<'a> {
    transport: &'a dyn ContentsTransport,
    endpoint: &'a ContentsEndpoint,
    cancel: &'a CancellationToken,
}

impl<'a> ContentsSession<'a> {
    pub(crate) fn new(
        transport: &'a dyn ContentsTransport,
        endpoint: &'a ContentsEndpoint,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            transport,
            endpoint,
            cancel,
        }
    }

    pub(crate) fn endpoint(&self) -> &ContentsEndpoint {
        self.endpoint
    }

    async fn send(&self, request: ContentsRequest) -> StorageResult<ContentsResponse> {
        if self.cancel.is_cancelled() {
            return Err(StorageError::Cancelled);
        }

        let method = request.method;
        let path = request.locator.path().clone();

        let response = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(StorageError::Cancelled),
            result = self.transport.send(request) => result?,
        };

        debug!(%method, %path, status = response.status.as_u16(), "contents request");
        Ok(response)
    }

    /// fetch the record (or directory listing) at a path
    ///
    /// not-found is `Ok(None)`, any other non-success status is an error.
    pub(crate) async fn fetch(
        &self,
        path: &BlobPath,
        operation: &'static str,
    ) -> StorageResult<Option<RemoteContents>> {
        let request = ContentsRequest {
            method: ContentsMethod::Get,
            locator: self.endpoint.locate(path),
            body: None,
        };
        let response = self.send(request).await?;

        if response.status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status.is_success() {
            return Err(StorageError::remote(operation, path, response.status, response.error_message()));
        }

        record::parse_contents(&response.body).map(Some)
    }

    /// fetch the raw bytes of a file
    ///
    /// not-found is `Ok(None)`, any other non-success status is an error.
    pub(crate) async fn fetch_raw(&self, path: &BlobPath, operation: &'static str) -> StorageResult<Option<Bytes>> {
        let request = ContentsRequest {
            method: ContentsMethod::GetRaw,
            locator: self.endpoint.locate(path),
            body: None,
        };
        let response = self.send(request).await?;

        if response.status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status.is_success() {
            return Err(StorageError::remote(operation, path, response.status, response.error_message()));
        }
        Ok(Some(response.body))
    }

    /// send a PUT or DELETE, requiring a success status
    pub(crate) async fn mutate(
        &self,
        method: ContentsMethod,
        path: &BlobPath,
        body: serde_json::Value,
        operation: &'static str,
    ) -> StorageResult<ContentsResponse> {
        let request = ContentsRequest {
            method,
            locator: self.endpoint.locate(path),
            body: Some(body),
        };
        let response = self.send(request).await?;

        if !response.status.is_success() {
            return Err(StorageError::remote(operation, path, response.status, response.error_message()));
        }
        Ok(response)
    }
}

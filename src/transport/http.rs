//! `reqwest` transport for the GitHub contents API.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::Client;

use super::{ContentsMethod, ContentsRequest, ContentsResponse, ContentsTransport};
use crate::config::GitHubConnection;
use crate::storage::{StorageError, StorageResult};

const GITHUB_MEDIA_TYPE: &str = "application/vnd.github+json";
const GITHUB_RAW_MEDIA_TYPE: &str = "application/vnd.github.raw";
const GITHUB_API_VERSION: &str = "2022-11-28";

/// HTTP transport over a shared `reqwest::Client`
///
/// The client carries the credential and user agent as default headers, so
/// they are attached once here and never per request. Cloning is cheap and
/// clones share the connection pool.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// build the client for a connection
    pub fn new(connection: &GitHubConnection) -> StorageResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(GITHUB_MEDIA_TYPE));
        headers.insert(
            HeaderName::from_static("x-github-api-version"),
            HeaderValue::from_static(GITHUB_API_VERSION),
        );

        if let Some(token) = connection.token() {
            let mut value = HeaderValue::from_str(&format!("token {}", token)).map_err(|_| {
                StorageError::InvalidConfig("token contains characters not allowed in a header".to_string())
            })?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let mut builder = Client::builder()
            .user_agent(connection.user_agent.as_str())
            .default_headers(headers);
        if let Some(timeout) = connection.timeout_duration() {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
        })
    }

    /// wrap an already configured client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ContentsTransport for HttpTransport {
    async fn send(&self, request: ContentsRequest) -> StorageResult<ContentsResponse> {
        let locator = &request.locator;
        let builder = match request.method {
            ContentsMethod::Get => self.client.get(locator.read_url()),
            // request headers win over the client's default Accept
            ContentsMethod::GetRaw => self
                .client
                .get(locator.read_url())
                .header(ACCEPT, HeaderValue::from_static(GITHUB_RAW_MEDIA_TYPE)),
            ContentsMethod::Put => self.client.put(locator.url().clone()),
            ContentsMethod::Delete => self.client.delete(locator.url().clone()),
        };
        let builder = match &request.body {
            Some(body) => builder.json(body),
            None => builder,
        };

        let response = builder.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        Ok(ContentsResponse { status, body })
    }
}

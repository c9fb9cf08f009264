//! HTTP client for the platform REST API

use crate::error::{ClientError, Result};
use crate::token::TokenStore;
use crate::types::ClientConfig;
use reqwest::{header, Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// HTTP client for the platform API
///
/// Attaches the bearer token from the [`TokenStore`] to every request and
/// normalizes failures into [`ClientError`]. It never caches.
///
/// # Example
///
/// ```rust,no_run
/// use bitforge_client::{ApiClient, ClientConfig, MemoryTokenStore};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = ApiClient::new(
///     ClientConfig {
///         base_url: "http://localhost:5000".into(),
///         ..Default::default()
///     },
///     Arc::new(MemoryTokenStore::new()),
/// )?;
///
/// let clans = client.list_clans(Default::default()).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ApiClient {
    config: ClientConfig,
    http: Client,
    tokens: Arc<dyn TokenStore>,
}

impl ApiClient {
    /// Create a new client
    pub fn new(config: ClientConfig, tokens: Arc<dyn TokenStore>) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ClientError::Network(format!("building HTTP client: {}", e)))?;

        Ok(Self {
            config,
            http,
            tokens,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Token storage shared with the session store
    pub fn tokens(&self) -> &Arc<dyn TokenStore> {
        &self.tokens
    }

    pub fn is_authenticated(&self) -> bool {
        self.tokens.load().is_some()
    }

    /// Issue a request and decode the JSON response.
    pub async fn request<T, B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let response = self.send(method, path, &[], body).await?;
        let data = response.json::<T>().await?;
        Ok(data)
    }

    /// Issue a request whose response body is irrelevant.
    pub async fn request_empty<B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<()>
    where
        B: Serialize + ?Sized,
    {
        self.send(method, path, &[], body).await?;
        Ok(())
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.request::<T, ()>(Method::GET, path, None).await
    }

    /// GET with query parameters
    pub async fn get_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let response = self.send::<()>(Method::GET, path, query, None).await?;
        let data = response.json::<T>().await?;
        Ok(data)
    }

    pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request(Method::POST, path, Some(body)).await
    }

    pub async fn patch<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request(Method::PATCH, path, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<()> {
        self.request_empty::<()>(Method::DELETE, path, None).await
    }

    // ==================== Helper Methods ====================

    /// Percent-encode a single path segment
    pub(crate) fn segment(value: &str) -> String {
        urlencoding::encode(value).into_owned()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn send<B>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> Result<reqwest::Response>
    where
        B: Serialize + ?Sized,
    {
        let mut request = self.http.request(method.clone(), self.url(path));
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(token) = self.tokens.load() {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        let status = response.status();
        debug!(%method, path, status = status.as_u16(), "API response");

        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let err = ClientError::from_status(status.as_u16(), path, &body);
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(%method, path, error = %err, "Server failure");
        }
        Err(err)
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.config.base_url)
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::MemoryTokenStore;

    #[test]
    fn test_url_joins_without_double_slash() {
        let client = ApiClient::new(
            ClientConfig {
                base_url: "http://localhost:5000/".into(),
                ..Default::default()
            },
            Arc::new(MemoryTokenStore::new()),
        )
        .unwrap();
        assert_eq!(client.url("/api/clans"), "http://localhost:5000/api/clans");
    }

    #[test]
    fn test_segment_encoding() {
        assert_eq!(ApiClient::segment("a b/c"), "a%20b%2Fc");
    }
}

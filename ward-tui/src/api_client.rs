//! REST transport for the registry API.

use crate::config::TuiConfig;
use async_trait::async_trait;
use reqwest::StatusCode;
use ward_cache::Transport;
use ward_core::FetchError;

#[derive(Debug, thiserror::Error)]
pub enum ApiClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API request failed: {status}")]
    Status { status: StatusCode, body: String },
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl ApiClientError {
    /// Whether a later attempt may succeed.
    ///
    /// Connection failures, timeouts, 5xx, 408 and 429 are worth retrying.
    /// Other statuses and undecodable bodies are not.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(err) => {
                if err.is_decode() || err.is_builder() {
                    false
                } else if let Some(status) = err.status() {
                    is_transient_status(status)
                } else {
                    err.is_connect() || err.is_timeout() || err.is_request() || err.is_body()
                }
            }
            Self::Status { status, .. } => is_transient_status(*status),
            Self::Serde(_) => false,
        }
    }
}

impl From<ApiClientError> for FetchError {
    fn from(err: ApiClientError) -> Self {
        if err.is_transient() {
            FetchError::transient(err.to_string())
        } else {
            FetchError::permanent(err.to_string())
        }
    }
}

pub fn is_transient_status(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
}

#[derive(Clone)]
pub struct RestClient {
    client: reqwest::Client,
    base_url: String,
}

impl RestClient {
    pub fn new(config: &TuiConfig) -> Result<Self, ApiClientError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn get_json(
        &self,
        path: &str,
        params: &[(String, String)],
    ) -> Result<serde_json::Value, ApiClientError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.client.get(url);
        if !params.is_empty() {
            request = request.query(params);
        }
        let response = request.send().await?;
        self.parse_response(response).await
    }

    async fn parse_response(
        &self,
        response: reqwest::Response,
    ) -> Result<serde_json::Value, ApiClientError> {
        let status = response.status();
        if status.is_success() {
            let bytes = response.bytes().await?;
            Ok(serde_json::from_slice(&bytes)?)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(ApiClientError::Status { status, body })
        }
    }
}

#[async_trait]
impl Transport for RestClient {
    async fn get_json(
        &self,
        path: &str,
        params: &[(String, String)],
    ) -> Result<serde_json::Value, FetchError> {
        RestClient::get_json(self, path, params).await.map_err(|err| {
            tracing::debug!(path, error = %err, transient = err.is_transient(), "Request failed");
            FetchError::from(err)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_error(code: u16) -> ApiClientError {
        ApiClientError::Status {
            status: StatusCode::from_u16(code).unwrap(),
            body: String::new(),
        }
    }

    #[test]
    fn test_server_errors_and_throttling_are_transient() {
        for code in [500, 502, 503, 504, 408, 429] {
            assert!(status_error(code).is_transient(), "{} should be transient", code);
        }
    }

    #[test]
    fn test_client_errors_are_permanent() {
        for code in [400, 401, 403, 404, 422] {
            assert!(!status_error(code).is_transient(), "{} should be permanent", code);
        }
    }

    #[test]
    fn test_not_found_message() {
        let err = FetchError::from(status_error(404));
        assert!(err.is_permanent());
        assert_eq!(err.message(), "API request failed: 404 Not Found");
    }

    #[test]
    fn test_malformed_body_is_permanent() {
        let decode = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err = FetchError::from(ApiClientError::from(decode));
        assert!(err.is_permanent());
    }
}

use std::env;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Used when RELIEF_API_URL is not set.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:8000/query_services";

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("service responded with status {0}")]
    Service(StatusCode),
    #[error("could not decode service response: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Serialize)]
struct ServiceQuery<'a> {
    user_query: &'a str,
}

#[derive(Deserialize)]
struct ServiceResponse {
    formatted_response: String,
}

/// Thin adapter around the relief service's query endpoint.
pub struct BackendClient {
    endpoint: String,
    client: reqwest::Client,
}

impl BackendClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn from_env() -> Self {
        let endpoint = env::var("RELIEF_API_URL").unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string());
        Self::new(endpoint)
    }

    /// Sends one user query and returns the formatted reply text.
    ///
    /// Any non-2xx status, transport failure, or undecodable body comes back
    /// as a tagged `QueryError`; callers decide how much of that to surface.
    pub async fn query(&self, user_query: &str) -> Result<String, QueryError> {
        debug!(endpoint = %self.endpoint, "sending query to relief service");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&ServiceQuery { user_query })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(QueryError::Service(status));
        }

        let body = response.text().await?;
        let parsed: ServiceResponse = serde_json::from_str(&body)?;

        debug!("received formatted response from relief service");
        Ok(parsed.formatted_response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    #[tokio::test]
    async fn query_posts_user_query_and_returns_reply() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/query_services")
            .match_header("content-type", "application/json")
            .match_body(Matcher::Json(json!({"user_query": "need water"})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"formatted_response": "Water is available at..."}"#)
            .create_async()
            .await;

        let client = BackendClient::new(format!("{}/query_services", server.url()));
        let reply = client.query("need water").await.unwrap();

        assert_eq!(reply, "Water is available at...");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn non_2xx_status_is_a_service_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/query_services")
            .with_status(500)
            .with_body("internal error")
            .create_async()
            .await;

        let client = BackendClient::new(format!("{}/query_services", server.url()));
        let err = client.query("hi").await.unwrap_err();

        assert!(matches!(err, QueryError::Service(status) if status.as_u16() == 500));
    }

    #[tokio::test]
    async fn malformed_body_is_a_decode_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/query_services")
            .with_status(200)
            .with_body("not json at all")
            .create_async()
            .await;

        let client = BackendClient::new(format!("{}/query_services", server.url()));
        let err = client.query("hi").await.unwrap_err();

        assert!(matches!(err, QueryError::Decode(_)));
    }

    #[tokio::test]
    async fn missing_field_is_a_decode_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/query_services")
            .with_status(200)
            .with_body(r#"{"unexpected": "shape"}"#)
            .create_async()
            .await;

        let client = BackendClient::new(format!("{}/query_services", server.url()));
        let err = client.query("hi").await.unwrap_err();

        assert!(matches!(err, QueryError::Decode(_)));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_transport_error() {
        // Port 1 is never listening.
        let client = BackendClient::new("http://127.0.0.1:1/query_services");
        let err = client.query("hi").await.unwrap_err();

        assert!(matches!(err, QueryError::Transport(_)));
    }
}

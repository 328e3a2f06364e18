//! HTTP layer shared by every backend operation
//!
//! Attaches the bearer token, turns non-success responses into
//! [`ClientError::Rejected`] with the backend's own message, and records
//! request metrics. Nothing here retries: a failed call is reported once and
//! the caller decides whether to try again.

use crate::config::ApiConfig;
use crate::error::{ClientError, Result};
use crate::metrics;
use bytes::Bytes;
use payment_core::{FieldErrors, Role, SessionError, SessionProvider};
use reqwest::{multipart::Form, Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Instant;
use tracing::{debug, warn};

/// Error envelope the backend uses for failures
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
    message: Option<String>,
    msg: Option<String>,
}

/// Backend message from an error response body, empty when there is none
pub fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|body| body.error.or(body.message).or(body.msg))
        .unwrap_or_default()
}

#[derive(Debug, Clone)]
pub struct FinanceApi {
    base_url: String,
    client: Client,
    sessions: SessionProvider,
    static_token: Option<String>,
}

impl FinanceApi {
    pub fn new(config: &ApiConfig, sessions: SessionProvider) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout()).build()?;

        Ok(FinanceApi {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
            sessions,
            static_token: config
                .bearer_token
                .clone()
                .filter(|token| !token.trim().is_empty()),
        })
    }

    pub fn sessions(&self) -> &SessionProvider {
        &self.sessions
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Token attached to requests: the session's, else the configured one
    pub fn bearer(&self) -> Option<String> {
        self.sessions.token().or_else(|| self.static_token.clone())
    }

    /// Gate an operation to one portal
    ///
    /// A loaded session must carry `role`. Without one, a configured static
    /// token is trusted and the backend does the role check.
    pub fn ensure_role(&self, role: Role) -> Result<()> {
        if self.sessions.is_authenticated() {
            self.sessions.require(role)?;
            return Ok(());
        }
        if self.static_token.is_some() {
            return Ok(());
        }
        Err(SessionError::NotAuthenticated.into())
    }

    pub async fn get_json<T: DeserializeOwned>(&self, operation: &'static str, path: &str) -> Result<T> {
        let request = self.client.get(self.url(path));
        timed(operation, async { decode(&self.dispatch(operation, request).await?) }).await
    }

    pub async fn get_bytes(
        &self,
        operation: &'static str,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Bytes> {
        let request = self.client.get(self.url(path)).query(query);
        timed(operation, self.dispatch(operation, request)).await
    }

    /// POST with an optional JSON body
    pub async fn post_json<B, T>(&self, operation: &'static str, path: &str, body: Option<&B>) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut request = self.client.post(self.url(path));
        if let Some(body) = body {
            request = request.json(body);
        }
        timed(operation, async { decode(&self.dispatch(operation, request).await?) }).await
    }

    pub async fn post_multipart<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        path: &str,
        form: Form,
    ) -> Result<T> {
        let request = self.client.post(self.url(path)).multipart(form);
        timed(operation, async { decode(&self.dispatch(operation, request).await?) }).await
    }

    async fn dispatch(&self, operation: &str, mut request: RequestBuilder) -> Result<Bytes> {
        if let Some(token) = self.bearer() {
            request = request.bearer_auth(token);
        }

        debug!(operation, "Dispatching request");

        let response = request.send().await.map_err(|e| {
            warn!(operation, "Request failed: {}", e);
            ClientError::Transport(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = extract_error_message(&body);
            warn!(operation, status = status.as_u16(), "Backend rejected request: {}", message);
            return Err(ClientError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.bytes().await?)
    }
}

/// Record a local rejection before handing it back
pub(crate) fn local<T>(operation: &str, result: std::result::Result<T, FieldErrors>) -> Result<T> {
    result.map_err(|errors| {
        metrics::record_local_rejection(operation);
        warn!(operation, "Rejected locally: {}", errors);
        ClientError::Validation(errors)
    })
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    // Some endpoints answer 2xx with an empty body
    let body: &[u8] = if body.iter().all(u8::is_ascii_whitespace) {
        b"null"
    } else {
        body
    };
    serde_json::from_slice(body).map_err(|e| ClientError::Decode(e.to_string()))
}

async fn timed<T, F>(operation: &'static str, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let started = Instant::now();
    let result = call.await;
    let outcome = match &result {
        Ok(_) => "ok",
        Err(e) => e.outcome(),
    };
    metrics::record_request(operation, outcome, started.elapsed().as_secs_f64());
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_error_message() {
        assert_eq!(extract_error_message(r#"{"error": "Student not found"}"#), "Student not found");
        assert_eq!(extract_error_message(r#"{"message": "Invalid payment_id"}"#), "Invalid payment_id");
        assert_eq!(extract_error_message(r#"{"msg": "Token has expired"}"#), "Token has expired");
        assert_eq!(extract_error_message("<html>Bad Gateway</html>"), "");
        assert_eq!(extract_error_message(""), "");
    }

    #[test]
    fn test_decode_empty_body() {
        let value: serde_json::Value = decode(b"").unwrap();
        assert!(value.is_null());
        assert!(matches!(decode::<u32>(b"{"), Err(ClientError::Decode(_))));
    }

    #[test]
    fn test_url_joins_base_without_double_slash() {
        let config = ApiConfig {
            base_url: "http://localhost:5000/api/".to_string(),
            ..ApiConfig::default()
        };
        let api = FinanceApi::new(&config, SessionProvider::new()).unwrap();
        assert_eq!(api.url("/payments"), "http://localhost:5000/api/payments");
    }

    #[test]
    fn test_role_gate_without_session() {
        let api = FinanceApi::new(&ApiConfig::default(), SessionProvider::new()).unwrap();
        assert!(matches!(
            api.ensure_role(Role::Finance),
            Err(ClientError::Session(SessionError::NotAuthenticated))
        ));

        let config = ApiConfig {
            bearer_token: Some("static".to_string()),
            ..ApiConfig::default()
        };
        let api = FinanceApi::new(&config, SessionProvider::new()).unwrap();
        assert!(api.ensure_role(Role::Finance).is_ok());
    }
}

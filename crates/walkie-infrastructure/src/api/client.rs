//! HTTP plumbing shared by every endpoint group.

use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use walkie_core::notification::Notifier;

use super::error::ApiError;

pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error. Please try again later.";
pub const CONNECT_ERROR_MESSAGE: &str =
    "Failed to connect to the server. Please check your internet connection.";
const DEFAULT_REJECTION_MESSAGE: &str = "Request failed";

/// Endpoints whose success message is shown to the user.
const AUTH_ENDPOINTS: &[&str] = &[
    "/login",
    "/register",
    "/resetpassword",
    "/resetpassword/confirm",
    "/verify-email",
];

/// Client for the backend REST API.
///
/// Failures come back as [`ApiError`] values; user-visible side effects
/// (server errors, unreachable backend, auth confirmations) are published on
/// the [`Notifier`].
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    notifier: Notifier,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, notifier: Notifier) -> Self {
        Self::with_http_client(reqwest::Client::new(), base_url, notifier)
    }

    pub fn with_http_client(
        http: reqwest::Client,
        base_url: impl Into<String>,
        notifier: Notifier,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http,
            base_url,
            notifier,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    pub(crate) fn http_post(&self, endpoint: &str) -> RequestBuilder {
        self.http.post(self.url(endpoint))
    }

    /// JSON request. `body` is omitted for `None`.
    pub(crate) async fn call<B, T>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&B>,
        token: Option<&str>,
        cancel: Option<&CancellationToken>,
    ) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut builder = self.http.request(method.clone(), self.url(endpoint));
        if let Some(body) = body {
            builder = builder.json(body);
        }
        self.execute(method, endpoint, builder, token, cancel).await
    }

    /// Sends a prepared request and decodes the `{success, ...}` envelope.
    pub(crate) async fn execute<T>(
        &self,
        method: Method,
        endpoint: &str,
        mut builder: RequestBuilder,
        token: Option<&str>,
        cancel: Option<&CancellationToken>,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
    {
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        tracing::debug!("[ApiClient] {} {}", method, endpoint);

        let exchange = async {
            let response = builder.send().await?;
            let status = response.status();
            let bytes = response.bytes().await?;
            Ok::<_, reqwest::Error>((status, bytes))
        };

        let outcome = match cancel {
            Some(cancel) => tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!("[ApiClient] {} {} cancelled", method, endpoint);
                    return Err(ApiError::Cancelled);
                }
                outcome = exchange => outcome,
            },
            None => exchange.await,
        };

        let (status, bytes) = match outcome {
            Ok(pair) => pair,
            Err(e) => {
                let message = if e.is_connect() || e.is_timeout() {
                    CONNECT_ERROR_MESSAGE.to_string()
                } else {
                    e.to_string()
                };
                tracing::warn!("[ApiClient] {} {} failed: {}", method, endpoint, e);
                self.notifier.error(message.clone());
                return Err(ApiError::Transport(message));
            }
        };

        self.interpret(endpoint, status, &bytes)
    }

    fn interpret<T>(&self, endpoint: &str, status: StatusCode, bytes: &[u8]) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
    {
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            self.notifier.error(INTERNAL_ERROR_MESSAGE);
        }

        let body: Option<Value> = serde_json::from_slice(bytes).ok();
        let message = body
            .as_ref()
            .and_then(|v| v.get("message"))
            .and_then(Value::as_str)
            .map(str::to_string);
        let declared_failure = body
            .as_ref()
            .and_then(|v| v.get("success"))
            .and_then(Value::as_bool)
            == Some(false);

        if !status.is_success() || declared_failure {
            let message = message
                .or_else(|| status.canonical_reason().map(str::to_string))
                .unwrap_or_else(|| DEFAULT_REJECTION_MESSAGE.to_string());
            tracing::debug!(
                "[ApiClient] {} rejected ({}): {}",
                endpoint,
                status.as_u16(),
                message
            );
            return Err(ApiError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let Some(body) = body else {
            return Err(ApiError::Decode("response is not JSON".to_string()));
        };

        if is_auth_endpoint(endpoint) {
            if let Some(message) = message.filter(|m| !m.is_empty()) {
                self.notifier.success(message);
            }
        }

        serde_json::from_value(body).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

fn is_auth_endpoint(endpoint: &str) -> bool {
    AUTH_ENDPOINTS.iter().any(|prefix| endpoint.starts_with(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::dto::ApiMessage;
    use walkie_core::notification::NotificationLevel;

    fn client() -> (ApiClient, tokio::sync::broadcast::Receiver<walkie_core::notification::Notification>) {
        let notifier = Notifier::new();
        let rx = notifier.subscribe();
        (ApiClient::new("http://localhost/", notifier), rx)
    }

    #[test]
    fn test_base_url_is_trimmed() {
        let (client, _) = client();
        assert_eq!(client.url("/me"), "http://localhost/me");
    }

    #[test]
    fn test_declared_failure_is_rejected_even_with_200() {
        let (client, mut rx) = client();
        let result: Result<ApiMessage, _> = client.interpret(
            "/chats",
            StatusCode::OK,
            br#"{"success":false,"message":"Session expired"}"#,
        );
        assert_eq!(
            result.unwrap_err(),
            ApiError::Rejected {
                status: 200,
                message: "Session expired".to_string()
            }
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_server_error_notifies() {
        let (client, mut rx) = client();
        let result: Result<ApiMessage, _> =
            client.interpret("/chats", StatusCode::INTERNAL_SERVER_ERROR, b"oops");
        assert_eq!(result.unwrap_err().status(), Some(500));
        let note = rx.try_recv().unwrap();
        assert_eq!(note.level, NotificationLevel::Error);
        assert_eq!(note.message, INTERNAL_ERROR_MESSAGE);
    }

    #[test]
    fn test_auth_success_message_is_announced() {
        let (client, mut rx) = client();
        let _: ApiMessage = client
            .interpret(
                "/verify-email",
                StatusCode::OK,
                br#"{"success":true,"message":"Email verified"}"#,
            )
            .unwrap();
        assert_eq!(rx.try_recv().unwrap().message, "Email verified");

        let _: ApiMessage = client
            .interpret("/chats", StatusCode::OK, br#"{"success":true,"message":"ok"}"#)
            .unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_auth_endpoint_matching() {
        assert!(is_auth_endpoint("/login"));
        assert!(is_auth_endpoint("/resetpassword/confirm"));
        assert!(!is_auth_endpoint("/resend-verification"));
        assert!(!is_auth_endpoint("/me"));
    }
}

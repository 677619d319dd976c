//! The seam between the API wrapper and the network.

use crate::error::TransportError;
use crate::request::RequestDescriptor;
use async_trait::async_trait;
use reqwest::StatusCode;
use std::sync::Arc;
use tradeportal_core::Result;

/// A received HTTP response with its body fully read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub status_text: String,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Creates a response, using the canonical reason phrase as status text.
    #[must_use]
    pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            body: body.into(),
        }
    }

    /// A response with a JSON body.
    #[must_use]
    pub fn json(status: StatusCode, body: &serde_json::Value) -> Self {
        Self::new(status, body.to_string())
    }
}

/// Sends exactly one request and returns the raw response.
///
/// Implementations never retry and never interpret status codes.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait HttpTransport: Send + Sync {
    /// Sends `request`.
    ///
    /// # Errors
    ///
    /// Returns an error if no response could be obtained.
    async fn send(&self, request: RequestDescriptor) -> Result<HttpResponse, TransportError>;
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl<T: HttpTransport + ?Sized> HttpTransport for Arc<T> {
    async fn send(&self, request: RequestDescriptor) -> Result<HttpResponse, TransportError> {
        (**self).send(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_text_is_canonical_reason() {
        let response = HttpResponse::new(StatusCode::FORBIDDEN, Vec::new());
        assert_eq!(response.status_text, "Forbidden");
    }

    #[test]
    fn json_response_body() {
        let response = HttpResponse::json(StatusCode::OK, &serde_json::json!({"ok": true}));
        assert_eq!(response.body, br#"{"ok":true}"#.to_vec());
    }
}

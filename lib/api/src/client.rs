//! The API call wrapper.
//!
//! Turns a logical call (endpoint + options) into exactly one request:
//! default headers, bearer token, CSRF token on mutating methods, and a
//! fail-fast check so protected endpoints are never hit without a token.
//! 401/403 responses end the session through the [`SessionManager`]
//! before the error reaches the caller.

use crate::allowlist::{PublicAllowlist, is_absolute_url};
use crate::auth::{Credentials, LoginOutcome, login_outcome};
use crate::config::ApiConfig;
use crate::cookies::CookieSource;
use crate::error::ApiError;
use crate::request::{CredentialsMode, RequestDescriptor, RequestOptions, is_mutating};
use crate::transport::{HttpResponse, HttpTransport};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use rootcause::Report;
use serde::de::DeserializeOwned;
use serde_json::{Value as JsonValue, json};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use tradeportal_core::{RequestId, Result};
use tradeportal_session::{LogoutReason, SessionError, SessionManager};

fn invalid(reason: String) -> ApiError {
    ApiError::InvalidRequest { reason }
}

/// What an auth failure (401/403 or a missing token) does to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AuthFailure {
    /// Run the logout flow.
    EndSession,
    /// Only return the error. Used by login and logout themselves.
    Report,
}

/// Authenticated client for the backend REST API.
pub struct ApiClient<T> {
    config: ApiConfig,
    allowlist: PublicAllowlist,
    transport: T,
    session: Arc<SessionManager>,
    cookies: Arc<dyn CookieSource>,
}

impl<T: HttpTransport> ApiClient<T> {
    /// Creates a client.
    ///
    /// `cookies` must see the same cookies the transport sends, so the
    /// CSRF header matches the CSRF cookie.
    #[must_use]
    pub fn new(
        config: ApiConfig,
        transport: T,
        session: Arc<SessionManager>,
        cookies: Arc<dyn CookieSource>,
    ) -> Self {
        let allowlist = PublicAllowlist::new(config.public_paths.iter().cloned());
        Self {
            config,
            allowlist,
            transport,
            session,
            cookies,
        }
    }

    /// Returns the configuration the client was built with.
    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// Returns the session manager whose token the client sends.
    #[must_use]
    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    /// Returns the underlying transport.
    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Resolves `endpoint` against the base URL. Absolute URLs pass through.
    #[must_use]
    pub fn resolve_url(&self, endpoint: &str) -> String {
        if is_absolute_url(endpoint) {
            return endpoint.trim().to_string();
        }
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }

    /// Builds the request for `endpoint` without sending it.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` if the token or CSRF values cannot be used
    /// as header values.
    pub fn build_request(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<RequestDescriptor, ApiError> {
        let RequestOptions {
            method,
            headers: caller_headers,
            body,
            credentials,
        } = options;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(token) = self.session.read_token() {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| invalid(format!("authorization header: {e}")))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        for name in caller_headers.keys() {
            headers.remove(name);
        }
        for (name, value) in &caller_headers {
            headers.append(name.clone(), value.clone());
        }

        // The transport writes its own multipart Content-Type with the boundary.
        if body.is_multipart() {
            headers.remove(CONTENT_TYPE);
        }

        let mut credentials = credentials;
        if is_mutating(&method) {
            credentials = CredentialsMode::Include;
            if let Some(csrf) = self.cookies.cookie(&self.config.csrf_cookie) {
                let name = HeaderName::from_bytes(self.config.csrf_header.as_bytes())
                    .map_err(|e| invalid(format!("CSRF header name: {e}")))?;
                if !headers.contains_key(&name) {
                    let value = HeaderValue::from_str(&csrf)
                        .map_err(|e| invalid(format!("CSRF header value: {e}")))?;
                    headers.insert(name, value);
                }
            }
        }

        Ok(RequestDescriptor {
            url: self.resolve_url(endpoint),
            method,
            headers,
            body,
            credentials,
        })
    }

    /// Sends one request and decodes the JSON response.
    ///
    /// # Errors
    ///
    /// - `NoAuthToken`: protected endpoint and no token; nothing was sent
    /// - `Unauthorized`: the backend answered 401/403
    /// - `HttpError`: any other non-success status
    /// - `Network`: the transport failed
    /// - `ParseError`: the success body is not the expected JSON
    pub async fn call<R: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<R, ApiError> {
        self.send(endpoint, options, AuthFailure::EndSession).await
    }

    #[instrument(
        skip(self, options, on_auth_failure),
        fields(request_id = %RequestId::new(), method = %options.method)
    )]
    async fn send<R: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: RequestOptions,
        on_auth_failure: AuthFailure,
    ) -> Result<R, ApiError> {
        let request = self.build_request(endpoint, options)?;

        if !request.headers.contains_key(AUTHORIZATION)
            && !self.allowlist.is_public(endpoint)
            && !is_absolute_url(endpoint)
        {
            warn!("protected endpoint called without a token");
            if on_auth_failure == AuthFailure::EndSession {
                self.session.handle_unauthorized(LogoutReason::MissingToken);
            }
            return Err(ApiError::NoAuthToken {
                endpoint: endpoint.to_string(),
            }
            .into());
        }

        debug!(url = %request.url, "sending request");
        let response = match self.transport.send(request).await {
            Ok(response) => response,
            Err(report) => {
                error!(error = %report, "request failed");
                let reason = report.current_context().to_string();
                return Err(report.context(ApiError::Network { reason }));
            }
        };

        self.interpret(response, on_auth_failure)
    }

    fn interpret<R: DeserializeOwned>(
        &self,
        response: HttpResponse,
        on_auth_failure: AuthFailure,
    ) -> Result<R, ApiError> {
        let status = response.status;

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let status = status.as_u16();
            warn!(status, "credentials rejected");
            if on_auth_failure == AuthFailure::EndSession {
                self.session
                    .handle_unauthorized(LogoutReason::Rejected { status });
            }
            return Err(ApiError::Unauthorized { status }.into());
        }

        if !status.is_success() {
            debug!(status = status.as_u16(), "request unsuccessful");
            return Err(ApiError::HttpError {
                status: status.as_u16(),
                status_text: response.status_text,
            }
            .into());
        }

        decode_json(&response.body)
    }

    /// GETs `endpoint`.
    ///
    /// # Errors
    ///
    /// See [`call`](Self::call).
    pub async fn get<R: DeserializeOwned>(&self, endpoint: &str) -> Result<R, ApiError> {
        self.call(endpoint, RequestOptions::get()).await
    }

    /// POSTs a JSON body to `endpoint`.
    ///
    /// # Errors
    ///
    /// See [`call`](Self::call).
    pub async fn post<R: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: JsonValue,
    ) -> Result<R, ApiError> {
        self.call(endpoint, RequestOptions::method(Method::POST).json(body))
            .await
    }

    /// PUTs a JSON body to `endpoint`.
    ///
    /// # Errors
    ///
    /// See [`call`](Self::call).
    pub async fn put<R: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: JsonValue,
    ) -> Result<R, ApiError> {
        self.call(endpoint, RequestOptions::method(Method::PUT).json(body))
            .await
    }

    /// PATCHes `endpoint` with a JSON body.
    ///
    /// # Errors
    ///
    /// See [`call`](Self::call).
    pub async fn patch<R: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: JsonValue,
    ) -> Result<R, ApiError> {
        self.call(endpoint, RequestOptions::method(Method::PATCH).json(body))
            .await
    }

    /// DELETEs `endpoint`.
    ///
    /// # Errors
    ///
    /// See [`call`](Self::call).
    pub async fn delete<R: DeserializeOwned>(&self, endpoint: &str) -> Result<R, ApiError> {
        self.call(endpoint, RequestOptions::method(Method::DELETE))
            .await
    }

    /// Logs in and stores the issued session.
    ///
    /// When the backend asks for email verification instead, the
    /// pending-verification marker is set and no session is stored.
    ///
    /// # Errors
    ///
    /// Any [`call`](Self::call) error, `ParseError` for an unrecognised
    /// response, or `SessionUnavailable` if the session cannot be stored.
    /// `Unauthorized` here means the credentials were refused; no logout
    /// flow runs.
    pub async fn login(
        &self,
        credentials: &Credentials,
        remember: bool,
    ) -> Result<LoginOutcome, ApiError> {
        let body = serde_json::to_value(credentials)
            .map_err(|e| invalid(format!("login body: {e}")))?;
        // Rejected credentials are not a rejected session; other tabs stay
        // logged in.
        let response: JsonValue = self
            .send(
                &self.config.login_endpoint,
                RequestOptions::method(Method::POST).json(body),
                AuthFailure::Report,
            )
            .await?;
        let outcome = login_outcome(response, credentials)?;

        let unavailable = |report: Report<SessionError>| {
            let reason = report.current_context().to_string();
            report.context(ApiError::SessionUnavailable { reason })
        };

        match &outcome {
            LoginOutcome::Authenticated(session) => {
                self.session
                    .write_session(session, remember)
                    .map_err(unavailable)?;
                self.session
                    .store()
                    .clear_pending_verification()
                    .map_err(unavailable)?;
                info!(role = session.role(), remember, "logged in");
            }
            LoginOutcome::VerificationRequired { email } => {
                self.session
                    .store()
                    .set_pending_verification(email)
                    .map_err(unavailable)?;
                info!("login awaiting email verification");
            }
        }

        Ok(outcome)
    }

    /// Logs out: tells the backend (best effort), then ends the session in
    /// this tab and signals the others.
    ///
    /// A 401/403 from the backend is only logged; the local flow still
    /// runs as a user-requested logout. Returns false if the session had
    /// already ended.
    pub async fn logout(&self) -> bool {
        if self.session.read_token().is_some() {
            let refresh = match self.session.current_session() {
                Ok(session) => session.and_then(|s| s.refresh_token().map(str::to_string)),
                Err(_) => None,
            };
            let options = RequestOptions::method(Method::POST).json(json!({ "refresh": refresh }));
            let result: Result<JsonValue, ApiError> = self
                .send(&self.config.logout_endpoint, options, AuthFailure::Report)
                .await;
            if let Err(report) = result {
                warn!(error = %report, "logout request failed");
            }
        }
        self.session.logout()
    }
}

/// Decodes a success body. An empty body decodes as JSON `null`.
fn decode_json<R: DeserializeOwned>(body: &[u8]) -> Result<R, ApiError> {
    let decoded = if body.iter().all(u8::is_ascii_whitespace) {
        serde_json::from_value(JsonValue::Null)
    } else {
        serde_json::from_slice(body)
    };
    Ok(decoded.map_err(|e| ApiError::ParseError {
        reason: e.to_string(),
    })?)
}

//! [`HttpTransport`] backed by reqwest.
//!
//! On native targets two clients share one cookie jar: requests with
//! [`CredentialsMode::Include`] go through the client that sends and
//! stores cookies, the rest through a client with no cookie store. In the
//! browser the fetch `credentials` option does the same job.

use crate::error::TransportError;
use crate::request::{CredentialsMode, FormValue, MultipartForm, RequestBody, RequestDescriptor};
use crate::transport::{HttpResponse, HttpTransport};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use tradeportal_core::Result;

#[cfg(not(target_arch = "wasm32"))]
use crate::{
    client::ApiClient,
    config::ApiConfig,
    cookies::{CookieSource, find_cookie},
};
#[cfg(not(target_arch = "wasm32"))]
use reqwest::cookie::{CookieStore, Jar};
#[cfg(not(target_arch = "wasm32"))]
use std::sync::Arc;
#[cfg(not(target_arch = "wasm32"))]
use tradeportal_session::SessionManager;

/// Sends requests with reqwest.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    #[cfg(not(target_arch = "wasm32"))]
    cookie_client: reqwest::Client,
    #[cfg(not(target_arch = "wasm32"))]
    jar: Arc<Jar>,
}

impl ReqwestTransport {
    /// Creates a transport with an empty cookie jar.
    ///
    /// # Errors
    ///
    /// Returns an error if a client cannot be built.
    pub fn new() -> Result<Self, TransportError> {
        let setup = |e: reqwest::Error| TransportError::ClientSetup {
            reason: e.to_string(),
        };

        #[cfg(not(target_arch = "wasm32"))]
        {
            let jar = Arc::new(Jar::default());
            let client = reqwest::Client::builder().build().map_err(setup)?;
            let cookie_client = reqwest::Client::builder()
                .cookie_provider(Arc::clone(&jar))
                .build()
                .map_err(setup)?;
            Ok(Self {
                client,
                cookie_client,
                jar,
            })
        }

        #[cfg(target_arch = "wasm32")]
        {
            let client = reqwest::Client::builder().build().map_err(setup)?;
            Ok(Self { client })
        }
    }

    /// The jar shared by requests that include credentials.
    #[cfg(not(target_arch = "wasm32"))]
    #[must_use]
    pub fn jar(&self) -> &Arc<Jar> {
        &self.jar
    }

    /// A cookie source reading this transport's jar as seen by `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if `url` is not a valid URL.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn cookies_for(&self, url: &str) -> Result<JarCookies, TransportError> {
        let url = reqwest::Url::parse(url).map_err(|e| TransportError::ClientSetup {
            reason: format!("invalid base URL '{url}': {e}"),
        })?;
        Ok(JarCookies {
            jar: Arc::clone(&self.jar),
            url,
        })
    }

    fn builder(&self, request: &RequestDescriptor) -> reqwest::RequestBuilder {
        #[cfg(not(target_arch = "wasm32"))]
        {
            let client = match request.credentials {
                CredentialsMode::Include => &self.cookie_client,
                CredentialsMode::Omit => &self.client,
            };
            client.request(request.method.clone(), &request.url)
        }

        #[cfg(target_arch = "wasm32")]
        {
            let builder = self.client.request(request.method.clone(), &request.url);
            match request.credentials {
                CredentialsMode::Include => builder.fetch_credentials_include(),
                CredentialsMode::Omit => builder.fetch_credentials_omit(),
            }
        }
    }
}

fn multipart_form(form: MultipartForm) -> Result<Form, TransportError> {
    let mut multipart = Form::new();
    for part in form.parts() {
        multipart = match &part.value {
            FormValue::Text(text) => multipart.text(part.name.clone(), text.clone()),
            FormValue::File {
                file_name,
                content_type,
                bytes,
            } => {
                let mut file = Part::bytes(bytes.clone()).file_name(file_name.clone());
                if let Some(content_type) = content_type {
                    file = file
                        .mime_str(content_type)
                        .map_err(|e| TransportError::InvalidRequest {
                            reason: format!("content type of '{}': {e}", part.name),
                        })?;
                }
                multipart.part(part.name.clone(), file)
            }
        };
    }
    Ok(multipart)
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: RequestDescriptor) -> Result<HttpResponse, TransportError> {
        let builder = self.builder(&request).headers(request.headers);

        // Bodies are encoded here so the headers chosen upstream go out unchanged.
        let builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => {
                let bytes =
                    serde_json::to_vec(&value).map_err(|e| TransportError::InvalidRequest {
                        reason: e.to_string(),
                    })?;
                builder.body(bytes)
            }
            RequestBody::Text(text) => builder.body(text),
            RequestBody::Bytes(bytes) => builder.body(bytes),
            RequestBody::Multipart(form) => builder.multipart(multipart_form(form)?),
        };

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::ConnectionFailed {
                reason: e.to_string(),
            })?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::BodyReadFailed {
                reason: e.to_string(),
            })?;

        Ok(HttpResponse::new(status, body.to_vec()))
    }
}

/// Reads cookies from a reqwest jar, as they would be sent to one URL.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Clone)]
pub struct JarCookies {
    jar: Arc<Jar>,
    url: reqwest::Url,
}

#[cfg(not(target_arch = "wasm32"))]
impl CookieSource for JarCookies {
    fn cookie(&self, name: &str) -> Option<String> {
        let header = self.jar.cookies(&self.url)?;
        find_cookie(header.to_str().ok()?, name)
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl ApiClient<ReqwestTransport> {
    /// A client over reqwest whose CSRF header reads the transport's jar.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport cannot be built or the base URL
    /// does not parse.
    pub fn with_reqwest(
        config: ApiConfig,
        session: Arc<SessionManager>,
    ) -> Result<Self, TransportError> {
        let transport = ReqwestTransport::new()?;
        let cookies = transport.cookies_for(&config.base_url)?;
        Ok(Self::new(config, transport, session, Arc::new(cookies)))
    }
}

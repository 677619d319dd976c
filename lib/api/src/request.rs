//! Request options and the descriptor handed to the transport.

use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value as JsonValue;

/// Whether cookies accompany a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CredentialsMode {
    /// Send cookies and store any the response sets.
    Include,
    /// Neither send nor store cookies.
    #[default]
    Omit,
}

/// The value of one multipart field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormValue {
    Text(String),
    File {
        file_name: String,
        content_type: Option<String>,
        bytes: Vec<u8>,
    },
}

/// One named multipart field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormPart {
    pub name: String,
    pub value: FormValue,
}

/// A multipart form, used for document uploads (KYC, deposit receipts).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultipartForm {
    parts: Vec<FormPart>,
}

impl MultipartForm {
    /// Creates an empty form.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a text field.
    #[must_use]
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(FormPart {
            name: name.into(),
            value: FormValue::Text(value.into()),
        });
        self
    }

    /// Adds a file field.
    #[must_use]
    pub fn file(
        mut self,
        name: impl Into<String>,
        file_name: impl Into<String>,
        content_type: Option<String>,
        bytes: Vec<u8>,
    ) -> Self {
        self.parts.push(FormPart {
            name: name.into(),
            value: FormValue::File {
                file_name: file_name.into(),
                content_type,
                bytes,
            },
        });
        self
    }

    /// Returns the fields in insertion order.
    #[must_use]
    pub fn parts(&self) -> &[FormPart] {
        &self.parts
    }
}

/// A request body.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(JsonValue),
    Text(String),
    Bytes(Vec<u8>),
    /// The transport picks the `Content-Type`, boundary included.
    Multipart(MultipartForm),
}

impl RequestBody {
    /// Returns true for multipart bodies, which carry no JSON `Content-Type`.
    #[must_use]
    pub fn is_multipart(&self) -> bool {
        matches!(self, Self::Multipart(_))
    }
}

/// Caller-supplied options for one API call.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestOptions {
    pub method: Method,
    /// Merged over the default headers; a caller value replaces the
    /// default of the same name.
    pub headers: HeaderMap,
    pub body: RequestBody,
    /// Mutating methods always use `Include` regardless of this value.
    pub credentials: CredentialsMode,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            headers: HeaderMap::new(),
            body: RequestBody::Empty,
            credentials: CredentialsMode::default(),
        }
    }
}

impl RequestOptions {
    /// A GET with no body.
    #[must_use]
    pub fn get() -> Self {
        Self::default()
    }

    /// Options for `method` with no body.
    #[must_use]
    pub fn method(method: Method) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    /// Sets a JSON body.
    #[must_use]
    pub fn json(mut self, body: JsonValue) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    /// Sets a multipart body.
    #[must_use]
    pub fn multipart(mut self, form: MultipartForm) -> Self {
        self.body = RequestBody::Multipart(form);
        self
    }

    /// Sets any body.
    #[must_use]
    pub fn body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    /// Adds a header, replacing an existing one of the same name.
    #[must_use]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sets the credentials mode.
    #[must_use]
    pub fn credentials(mut self, mode: CredentialsMode) -> Self {
        self.credentials = mode;
        self
    }
}

/// Returns true for methods that change server state and need CSRF
/// protection.
#[must_use]
pub fn is_mutating(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

/// A fully resolved request, ready for the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    pub url: String,
    pub method: Method,
    pub headers: HeaderMap,
    pub body: RequestBody,
    pub credentials: CredentialsMode,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_get_without_credentials() {
        let options = RequestOptions::default();
        assert_eq!(options.method, Method::GET);
        assert_eq!(options.body, RequestBody::Empty);
        assert_eq!(options.credentials, CredentialsMode::Omit);
    }

    #[test]
    fn mutating_methods() {
        for method in [Method::POST, Method::PUT, Method::PATCH, Method::DELETE] {
            assert!(is_mutating(&method), "{method} should be mutating");
        }
        for method in [Method::GET, Method::HEAD, Method::OPTIONS] {
            assert!(!is_mutating(&method), "{method} should not be mutating");
        }
    }

    #[test]
    fn multipart_form_collects_parts() {
        let form = MultipartForm::new()
            .text("document_type", "passport")
            .file(
                "file",
                "passport.png",
                Some("image/png".to_string()),
                vec![1, 2, 3],
            );
        assert_eq!(form.parts().len(), 2);
        assert!(RequestBody::Multipart(form).is_multipart());
    }
}

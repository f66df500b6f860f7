//! HTTP/1.1 response builder.
//!
//! Provides a fluent builder API for constructing HTTP responses and
//! serializing them for transmission over TCP. A response carries either a
//! text body or a binary payload; binary payloads are kept out of the header
//! buffer so the connection can send them as a second write.

use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;
use tracing::error;

use super::{Headers, StatusCode};

/// A response body: UTF-8 text or raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    Text(String),
    Binary(Bytes),
}

impl Body {
    /// Length in bytes, used for `Content-Length`.
    pub fn len(&self) -> usize {
        match self {
            Body::Text(text) => text.len(),
            Body::Binary(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, Body::Binary(_))
    }
}

impl Default for Body {
    fn default() -> Self {
        Body::Text(String::new())
    }
}

/// An HTTP/1.1 response, ready to be serialized and sent.
///
/// # Examples
///
/// ```
/// use crudhttp::http::{Response, StatusCode};
/// use serde_json::json;
///
/// let response = Response::json(StatusCode::Created, &json!({"id": "1", "status": "created"}));
///
/// let bytes = response.into_bytes();
/// let text = std::str::from_utf8(&bytes).unwrap();
/// assert!(text.starts_with("HTTP/1.1 201 Created\r\n"));
/// assert!(text.contains("Content-Type: application/json\r\n"));
/// assert!(text.ends_with("\r\n\r\n{\"id\":\"1\",\"status\":\"created\"}"));
/// ```
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: Headers,
    body: Body,
}

impl Response {
    /// Creates a new response with the given status and an empty text body.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: Body::default(),
        }
    }

    /// A JSON response with `Content-Type: application/json`.
    ///
    /// Falls back to a bare `500` if `value` cannot be serialized.
    pub fn json<T: Serialize + ?Sized>(status: StatusCode, value: &T) -> Self {
        match serde_json::to_string(value) {
            Ok(body) => Self::new(status)
                .header("Content-Type", "application/json")
                .body(body),
            Err(e) => {
                error!(error = %e, "failed to serialize JSON response");
                Self::new(StatusCode::InternalServerError)
            }
        }
    }

    /// A JSON error response whose body is `{"error": message}`.
    pub fn error(status: StatusCode, message: impl Into<String>) -> Self {
        Self::json(status, &serde_json::json!({ "error": message.into() }))
    }

    /// A `200 OK` HTML page.
    pub fn html(page: impl Into<String>) -> Self {
        Self::new(StatusCode::Ok)
            .header("Content-Type", "text/html")
            .body(page)
    }

    /// A `200 OK` binary download with `Content-Disposition: attachment`.
    ///
    /// `filename` is written as a quoted string: control characters are
    /// dropped, `"` and `\\` are backslash-escaped.
    pub fn attachment(filename: &str, content_type: &str, data: impl Into<Bytes>) -> Self {
        Self::new(StatusCode::Ok)
            .header("Content-Type", content_type)
            .header(
                "Content-Disposition",
                format!("attachment; filename=\"{}\"", quote_filename(filename)),
            )
            .body_bytes(data)
    }

    /// Sets a response header, replacing any previous value for the same name.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }

    /// Sets a header in-place. Intended for the connection layer, which
    /// decorates the handler's response without consuming it.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.set(name, value);
    }

    /// Sets the response body from a string.
    ///
    /// The `Content-Length` header is written automatically by [`into_parts`](Self::into_parts).
    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Body::Text(body.into());
        self
    }

    /// Sets a binary body, sent separately after the head.
    #[must_use]
    pub fn body_bytes(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Body::Binary(body.into());
        self
    }

    /// Returns the status code of this response.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body_ref(&self) -> &Body {
        &self.body
    }

    /// Serializes the response using HTTP/1.1 wire format.
    ///
    /// Returns the head (with the text body appended, for text responses) and,
    /// for binary responses, the payload to be written after it.
    ///
    /// Automatically adds:
    /// - `Content-Type: text/plain; charset=utf-8` if the body is non-empty and no
    ///   `Content-Type` header was set.
    /// - `Connection: close`.
    /// - `Content-Length: <n>` computed from the body (always written, always last).
    pub fn into_parts(mut self) -> (BytesMut, Option<Bytes>) {
        let content_length = self.body.len();

        if content_length > 0 && !self.headers.contains("content-type") {
            self.headers
                .set("Content-Type", "text/plain; charset=utf-8");
        }
        self.headers.remove("content-length");
        self.headers.set("Connection", "close");

        let text_len = match &self.body {
            Body::Text(text) => text.len(),
            Body::Binary(_) => 0,
        };
        let estimated_size = 128 + self.headers.len() * 64 + text_len;
        let mut buf = BytesMut::with_capacity(estimated_size);

        // Status line
        buf.put(
            format!(
                "HTTP/1.1 {} {}\r\n",
                self.status.as_u16(),
                self.status.canonical_reason()
            )
            .as_bytes(),
        );

        // Headers
        for (name, value) in self.headers.iter() {
            buf.put(format!("{name}: {value}\r\n").as_bytes());
        }
        buf.put(format!("Content-Length: {content_length}\r\n").as_bytes());

        // Header/body separator
        buf.put(&b"\r\n"[..]);

        match self.body {
            Body::Text(text) => {
                buf.put(text.as_bytes());
                (buf, None)
            }
            Body::Binary(bytes) => (buf, Some(bytes)),
        }
    }

    /// Serializes head and body into a single buffer.
    pub fn into_bytes(self) -> BytesMut {
        let (mut head, payload) = self.into_parts();
        if let Some(payload) = payload {
            head.put(payload);
        }
        head
    }
}

fn quote_filename(filename: &str) -> String {
    let mut quoted = String::with_capacity(filename.len());
    for c in filename.chars().filter(|c| !c.is_control()) {
        if matches!(c, '"' | '\\') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted
}

impl Default for Response {
    fn default() -> Self {
        Self::new(StatusCode::Ok)
    }
}

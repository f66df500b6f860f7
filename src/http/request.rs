//! HTTP/1.1 request parsing.
//!
//! [`Request::parse`] turns a framed message into a [`Request`]. Parsing is
//! lenient: a malformed request line leaves the method, path and version
//! empty, header lines without a colon are skipped, and form bodies that fail
//! to decode are simply left undecoded. Routing then fails to match and the
//! client receives a 404 instead of the connection erroring out.

use std::borrow::Cow;
use std::collections::BTreeMap;

use bytes::Bytes;

use super::{Headers, Method, multipart};
use crate::fields::FieldMap;

/// A file received in a `multipart/form-data` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    /// Filename as declared by the client in `Content-Disposition`.
    pub filename: String,
    /// The part's `Content-Type`, empty when the client sent none.
    pub content_type: String,
    pub data: Bytes,
}

/// A fully parsed HTTP/1.1 request.
///
/// # Examples
///
/// ```
/// use crudhttp::http::Request;
///
/// let raw = b"GET /search?q=hello+world HTTP/1.1\r\nHost: localhost\r\n\r\n";
/// let request = Request::parse(raw);
///
/// assert_eq!(request.method().as_str(), "GET");
/// assert_eq!(request.path(), "/search");
/// assert_eq!(request.query_param("q"), Some("hello world"));
/// assert_eq!(request.headers().get("host"), Some("localhost"));
/// ```
#[derive(Debug)]
pub struct Request {
    method: Method,
    path: String,
    version: String,
    headers: Headers,
    query: Option<String>,
    params: FieldMap,
    form: FieldMap,
    files: BTreeMap<String, FilePart>,
    body: Bytes,
}

impl Request {
    /// Parses a complete HTTP message.
    ///
    /// The body is everything after the blank line that ends the head. Form
    /// fields and files are decoded according to `Content-Type`:
    ///
    /// - `application/x-www-form-urlencoded` fills [`form_fields`](Self::form_fields);
    /// - `multipart/form-data; boundary=…` fills both
    ///   [`form_fields`](Self::form_fields) and [`files`](Self::files);
    /// - anything else leaves the body undecoded.
    pub fn parse(buf: &[u8]) -> Self {
        let mut pos = 0;

        let request_line = next_line(buf, &mut pos).unwrap_or_default();
        let request_line = String::from_utf8_lossy(request_line);
        let mut parts = request_line.split_ascii_whitespace();
        let method = Method::from(parts.next().unwrap_or(""));
        let target = parts.next().unwrap_or("");
        let version = parts.next().unwrap_or("").to_owned();

        let (raw_path, query) = match target.split_once('?') {
            Some((path, query)) => (path, Some(query.to_owned())),
            None => (target, None),
        };
        let path = decode_path(raw_path);
        let params = query.as_deref().map(parse_pairs).unwrap_or_default();

        let mut headers = Headers::new();
        while let Some(line) = next_line(buf, &mut pos) {
            if line.is_empty() {
                break;
            }
            let line = String::from_utf8_lossy(line);
            if let Some((name, value)) = line.split_once(':') {
                headers.set(trim_ows(name), trim_ows(value));
            }
        }

        let body = Bytes::copy_from_slice(&buf[pos.min(buf.len())..]);

        let mut form = FieldMap::new();
        let mut files = BTreeMap::new();
        if let Some(content_type) = headers.get("content-type") {
            let lowered = content_type.to_ascii_lowercase();
            if lowered.contains("multipart/form-data") {
                if let Some(boundary) = multipart_boundary(content_type) {
                    let parsed = multipart::parse(&body, &boundary);
                    form = parsed.fields;
                    files = parsed.files;
                }
            } else if lowered.contains("application/x-www-form-urlencoded") {
                form = parse_pairs(&String::from_utf8_lossy(&body));
            }
        }

        Self {
            method,
            path,
            version,
            headers,
            query,
            params,
            form,
            files,
            body,
        }
    }

    /// Returns the HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the percent-decoded request path (without the query string).
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the protocol version exactly as sent, e.g. `HTTP/1.1`.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Returns the request headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the raw query string (without the leading `?`), if any.
    pub fn query_string(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Returns a decoded query parameter value by key.
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.params.get(key)
    }

    /// Returns the decoded form fields (URL-encoded bodies and multipart text parts).
    pub fn form_fields(&self) -> &FieldMap {
        &self.form
    }

    /// Returns the uploaded files keyed by form-field name.
    pub fn files(&self) -> &BTreeMap<String, FilePart> {
        &self.files
    }

    /// Returns the request body bytes.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type")
    }

    /// Returns the value of the `Content-Length` header parsed as a `usize`, if present.
    pub fn content_length(&self) -> Option<usize> {
        self.headers.get("content-length")?.parse().ok()
    }
}

/// Decodes an `application/x-www-form-urlencoded` component.
///
/// `+` becomes a space and `%XX` becomes the byte `0xXX`. A `%` not followed by
/// two hex digits is kept literally. Bytes that do not form valid UTF-8 after
/// decoding are replaced with U+FFFD.
///
/// # Examples
///
/// ```
/// use crudhttp::http::request::url_decode;
///
/// assert_eq!(url_decode("a%20b+c"), "a b c");
/// assert_eq!(url_decode("100%"), "100%");
/// ```
pub fn url_decode(input: &str) -> String {
    let spaced: Cow<'_, str> = if input.contains('+') {
        Cow::Owned(input.replace('+', " "))
    } else {
        Cow::Borrowed(input)
    };
    String::from_utf8_lossy(&urlencoding::decode_binary(spaced.as_bytes())).into_owned()
}

// Paths keep `+` as-is; only percent escapes are decoded.
fn decode_path(raw: &str) -> String {
    String::from_utf8_lossy(&urlencoding::decode_binary(raw.as_bytes())).into_owned()
}

/// Parses `key=value&key2=value2` pairs, decoding both sides.
///
/// Pieces without `=` are ignored. A repeated key keeps the last value.
pub fn parse_pairs(input: &str) -> FieldMap {
    input
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .map(|(key, value)| (url_decode(key), url_decode(value)))
        .collect()
}

/// Extracts the `boundary` parameter from a `multipart/form-data` content type.
fn multipart_boundary(content_type: &str) -> Option<String> {
    let start = content_type.to_ascii_lowercase().find("boundary=")? + "boundary=".len();
    let value = content_type[start..].trim_start_matches([' ', '\t', '"']);
    let end = value
        .find([';', ' ', '\t', '\r', '\n', '"'])
        .unwrap_or(value.len());
    let boundary = &value[..end];
    (!boundary.is_empty()).then(|| boundary.to_owned())
}

// Returns the next `\n`-terminated line starting at `pos`, without its `\r\n`/`\n`.
fn next_line<'a>(buf: &'a [u8], pos: &mut usize) -> Option<&'a [u8]> {
    if *pos >= buf.len() {
        return None;
    }
    let rest = &buf[*pos..];
    let (line, advance) = match rest.iter().position(|&b| b == b'\n') {
        Some(i) => (&rest[..i], i + 1),
        None => (rest, rest.len()),
    };
    *pos += advance;
    Some(line.strip_suffix(b"\r").unwrap_or(line))
}

fn trim_ows(s: &str) -> &str {
    s.trim_matches([' ', '\t'])
}

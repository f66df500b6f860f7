//! `multipart/form-data` body parsing.
//!
//! The parser works on raw bytes so binary uploads survive unchanged. File
//! payloads are zero-copy [`Bytes`] slices of the request body.
//!
//! A malformed part (no blank line after its headers, or no delimiter after its
//! content) ends parsing: everything decoded before it is kept, the rest of the
//! body is ignored.

use std::collections::BTreeMap;

use bytes::Bytes;

use super::request::FilePart;
use crate::fields::FieldMap;

/// The decoded contents of a multipart body.
#[derive(Debug, Default)]
pub struct Multipart {
    /// Parts without a `filename`, decoded as (lossy) UTF-8 text.
    pub fields: FieldMap,
    /// Parts with a `filename`, keyed by their form-field name.
    pub files: BTreeMap<String, FilePart>,
}

/// Splits `body` into named fields and files using `boundary`.
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use crudhttp::http::multipart;
///
/// let body = Bytes::from_static(
///     b"--b\r\nContent-Disposition: form-data; name=\"f\"; filename=\"x.txt\"\r\n\
///       Content-Type: text/plain\r\n\r\nhello\r\n--b--\r\n",
/// );
/// let parsed = multipart::parse(&body, "b");
/// let file = &parsed.files["f"];
/// assert_eq!(file.filename, "x.txt");
/// assert_eq!(&file.data[..], b"hello");
/// ```
pub fn parse(body: &Bytes, boundary: &str) -> Multipart {
    let delimiter = format!("--{boundary}").into_bytes();
    let mut parsed = Multipart::default();

    let Some(mut pos) = find(body, &delimiter, 0) else {
        return parsed;
    };

    loop {
        pos += delimiter.len();
        if pos >= body.len() || body[pos..].starts_with(b"--") {
            break;
        }

        let Some(header_end) = find(body, b"\r\n\r\n", pos) else {
            break;
        };
        let content_start = header_end + 4;
        let Some(content_end) = find(body, &delimiter, content_start) else {
            break;
        };

        let head = String::from_utf8_lossy(&body[pos..header_end]);
        let part = PartHead::parse(&head);

        let raw = &body[content_start..content_end];
        let trimmed = raw
            .strip_suffix(b"\r\n")
            .or_else(|| raw.strip_suffix(b"\n"))
            .unwrap_or(raw);
        let content = body.slice(content_start..content_start + trimmed.len());

        match part.filename {
            Some(filename) if !filename.is_empty() => {
                parsed.files.insert(
                    part.name,
                    FilePart {
                        filename,
                        content_type: part.content_type,
                        data: content,
                    },
                );
            }
            _ => {
                parsed
                    .fields
                    .insert(part.name, String::from_utf8_lossy(&content));
            }
        }

        pos = content_end;
    }

    parsed
}

// Headers of a single part that the parser cares about.
#[derive(Debug, Default)]
struct PartHead {
    name: String,
    filename: Option<String>,
    content_type: String,
}

impl PartHead {
    fn parse(head: &str) -> Self {
        let mut part = PartHead::default();
        for line in head.lines() {
            let Some((name, value)) = line.split_once(':') else {
                continue;
            };
            let name = name.trim();
            if name.eq_ignore_ascii_case("content-disposition") {
                for param in value.split(';').skip(1) {
                    let Some((key, val)) = param.split_once('=') else {
                        continue;
                    };
                    let val = val.trim().trim_matches('"').to_owned();
                    match key.trim().to_ascii_lowercase().as_str() {
                        "name" => part.name = val,
                        "filename" => part.filename = Some(val),
                        _ => {}
                    }
                }
            } else if name.eq_ignore_ascii_case("content-type") {
                part.content_type = value.trim().to_owned();
            }
        }
        part
    }
}

// Byte-wise substring search starting at `from`.
fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from >= haystack.len() || needle.is_empty() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|i| i + from)
}

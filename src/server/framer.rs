//! Wire framing: reads one complete HTTP message off a connection.
//!
//! The framer reads in chunks of [`READ_CHUNK`] bytes until the request head is
//! buffered. If the head declares a `Content-Length`, it keeps reading until
//! that many body bytes have arrived. Messages without `Content-Length` are
//! complete as soon as their head is.
//!
//! Heads that `httparse` rejects are framed leniently: the buffer is searched
//! for `\r\n\r\n` and a `Content-Length` line, and whatever the parser makes of
//! the result is left to the request parser. A head with no terminator at all is
//! taken to be the whole message.

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

use super::config::ServerConfig;

/// Size of each socket read.
pub const READ_CHUNK: usize = 8192;

// Headers beyond this count make httparse fail and fall back to lenient framing.
const MAX_HEADERS: usize = 100;

/// Errors produced while framing a request.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("connection closed before a request was received")]
    Closed,

    #[error("request not received within {0:?}")]
    Timeout(Duration),

    #[error("request exceeds the limit of {limit} bytes")]
    TooLarge { limit: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Bounds applied while framing one request.
#[derive(Debug, Clone, Copy)]
pub struct FrameLimits {
    pub read_timeout: Duration,
    pub max_header_bytes: usize,
    pub max_body_bytes: usize,
}

impl From<&ServerConfig> for FrameLimits {
    fn from(config: &ServerConfig) -> Self {
        Self {
            read_timeout: config.read_timeout,
            max_header_bytes: config.max_header_bytes,
            max_body_bytes: config.max_body_bytes,
        }
    }
}

/// Reads one HTTP message from `reader`.
///
/// # Errors
///
/// - [`FrameError::Closed`]: the first read returned no data.
/// - [`FrameError::Timeout`]: the message was not complete within `read_timeout`.
/// - [`FrameError::TooLarge`]: the head outgrew `max_header_bytes`, or the declared
///   `Content-Length` is above `max_body_bytes`.
/// - [`FrameError::Io`]: the underlying read failed.
///
/// A peer that closes mid-body is not an error: the truncated message is returned.
pub async fn read_message<R>(reader: &mut R, limits: &FrameLimits) -> Result<Bytes, FrameError>
where
    R: AsyncRead + Unpin,
{
    match tokio::time::timeout(limits.read_timeout, read_frame(reader, limits)).await {
        Ok(result) => result,
        Err(_) => Err(FrameError::Timeout(limits.read_timeout)),
    }
}

async fn read_frame<R>(reader: &mut R, limits: &FrameLimits) -> Result<Bytes, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = BytesMut::with_capacity(READ_CHUNK);
    if read_chunk(reader, &mut buf).await? == 0 {
        return Err(FrameError::Closed);
    }

    let (head_len, content_length) = loop {
        match inspect_head(&buf) {
            Head::Complete {
                head_len,
                content_length,
            } => break (head_len, content_length),
            Head::Partial => {
                if buf.len() > limits.max_header_bytes {
                    return Err(FrameError::TooLarge {
                        limit: limits.max_header_bytes,
                    });
                }
                if read_chunk(reader, &mut buf).await? == 0 {
                    debug!(buffered = buf.len(), "peer closed inside the request head");
                    return Ok(buf.freeze());
                }
            }
        }
    };

    if head_len > limits.max_header_bytes {
        return Err(FrameError::TooLarge {
            limit: limits.max_header_bytes,
        });
    }

    let Some(content_length) = content_length else {
        return Ok(buf.freeze());
    };
    if content_length > limits.max_body_bytes {
        return Err(FrameError::TooLarge {
            limit: limits.max_body_bytes,
        });
    }

    let total = head_len + content_length;
    while buf.len() < total {
        if read_chunk(reader, &mut buf).await? == 0 {
            debug!(
                expected = content_length,
                received = buf.len() - head_len,
                "peer closed before the full body arrived"
            );
            break;
        }
    }
    buf.truncate(total);

    Ok(buf.freeze())
}

async fn read_chunk<R>(reader: &mut R, buf: &mut BytesMut) -> std::io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    buf.reserve(READ_CHUNK);
    reader.read_buf(buf).await
}

// What is known about the request head buffered so far.
#[derive(Debug, PartialEq, Eq)]
enum Head {
    Partial,
    Complete {
        head_len: usize,
        content_length: Option<usize>,
    },
}

fn inspect_head(buf: &[u8]) -> Head {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut req = httparse::Request::new(&mut headers);

    match req.parse(buf) {
        Ok(httparse::Status::Complete(head_len)) => Head::Complete {
            head_len,
            content_length: req
                .headers
                .iter()
                .find(|h| h.name.eq_ignore_ascii_case("content-length"))
                .map(|h| parse_content_length(h.value)),
        },
        Ok(httparse::Status::Partial) => Head::Partial,
        Err(e) => {
            debug!(error = %e, "request head rejected by httparse; framing leniently");
            inspect_head_lenient(buf)
        }
    }
}

fn inspect_head_lenient(buf: &[u8]) -> Head {
    let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
        return Head::Complete {
            head_len: buf.len(),
            content_length: None,
        };
    };

    let content_length = buf[..end]
        .split(|&b| b == b'\n')
        .filter_map(|line| {
            let colon = line.iter().position(|&b| b == b':')?;
            let name = line[..colon].trim_ascii();
            name.eq_ignore_ascii_case(b"content-length")
                .then(|| parse_content_length(&line[colon + 1..]))
        })
        .last();

    Head::Complete {
        head_len: end + 4,
        content_length,
    }
}

// Malformed values count as zero.
fn parse_content_length(value: &[u8]) -> usize {
    std::str::from_utf8(value)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0)
}

//! Chunked HTML streaming.
//!
//! ```ignore
//! let html = render_to_string(&page)?;
//! let mut sink = ChunkedWriter::new(stream);
//! stream_to_response(&mut sink, html_chunks(&html, ChunkOptions::default()), StatusCode::OK)?;
//! ```

use std::io::Write;

use http::header::{CONTENT_TYPE, TRANSFER_ENCODING};
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use tracing::trace;

use crate::error::Result;

/// Default chunk size in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 16_384;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkOptions {
    /// Characters per chunk. Values below 1 are treated as 1.
    pub chunk_size: usize,
}

impl Default for ChunkOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// Split `html` into chunks of `chunk_size` characters (the last one may be
/// shorter). Never splits a character.
pub fn html_chunks(html: &str, options: ChunkOptions) -> HtmlChunks<'_> {
    HtmlChunks {
        rest: html,
        size: options.chunk_size.max(1),
    }
}

/// Iterator returned by [`html_chunks`].
#[derive(Debug, Clone)]
pub struct HtmlChunks<'a> {
    rest: &'a str,
    size: usize,
}

impl<'a> Iterator for HtmlChunks<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        if self.rest.is_empty() {
            return None;
        }
        let end = self
            .rest
            .char_indices()
            .nth(self.size)
            .map_or(self.rest.len(), |(offset, _)| offset);
        let (chunk, rest) = self.rest.split_at(end);
        self.rest = rest;
        Some(chunk)
    }
}

// =============================================================================
// Response sink
// =============================================================================

/// Something an HTML response can be streamed into.
pub trait ResponseSink {
    fn set_status(&mut self, status: StatusCode);

    fn set_header(&mut self, name: HeaderName, value: HeaderValue);

    /// Write one chunk. `Ok(false)` means the sink is saturated and
    /// [`ResponseSink::wait_drain`] must be called before the next write.
    fn write_chunk(&mut self, chunk: &str) -> Result<bool>;

    fn wait_drain(&mut self) -> Result<()>;

    fn end(&mut self) -> Result<()>;
}

/// Set status and headers, write every chunk, then end the response.
pub fn stream_to_response<S, I>(sink: &mut S, chunks: I, status: StatusCode) -> Result<()>
where
    S: ResponseSink + ?Sized,
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    sink.set_status(status);
    sink.set_header(CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"));
    sink.set_header(TRANSFER_ENCODING, HeaderValue::from_static("chunked"));

    let mut written = 0;
    for chunk in chunks {
        if !sink.write_chunk(chunk.as_ref())? {
            sink.wait_drain()?;
        }
        written += 1;
    }
    trace!(chunks = written, status = status.as_u16(), "streamed response");
    sink.end()
}

/// HTTP/1.1 response writer using chunked transfer encoding.
///
/// The status line and headers go out with the first chunk (or on `end`).
#[derive(Debug)]
pub struct ChunkedWriter<W: Write> {
    out: W,
    status: StatusCode,
    headers: HeaderMap,
    head_sent: bool,
}

impl<W: Write> ChunkedWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            head_sent: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn send_head(&mut self) -> Result<()> {
        if self.head_sent {
            return Ok(());
        }
        let reason = self.status.canonical_reason().unwrap_or("");
        write!(self.out, "HTTP/1.1 {} {reason}\r\n", self.status.as_u16())?;
        for (name, value) in &self.headers {
            self.out.write_all(name.as_str().as_bytes())?;
            self.out.write_all(b": ")?;
            self.out.write_all(value.as_bytes())?;
            self.out.write_all(b"\r\n")?;
        }
        self.out.write_all(b"\r\n")?;
        self.head_sent = true;
        Ok(())
    }
}

impl<W: Write> ResponseSink for ChunkedWriter<W> {
    fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.insert(name, value);
    }

    fn write_chunk(&mut self, chunk: &str) -> Result<bool> {
        self.send_head()?;
        if !chunk.is_empty() {
            write!(self.out, "{:X}\r\n{chunk}\r\n", chunk.len())?;
        }
        Ok(true)
    }

    fn wait_drain(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        self.send_head()?;
        self.out.write_all(b"0\r\n\r\n")?;
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    #[test]
    fn test_chunks_of_five() {
        let chunks: Vec<&str> = html_chunks("<main>abcdef</main>", ChunkOptions { chunk_size: 5 }).collect();
        assert_eq!(chunks, vec!["<main", ">abcd", "ef</m", "ain>"]);
    }

    #[test]
    fn test_zero_chunk_size_means_one() {
        let chunks: Vec<&str> = html_chunks("ab", ChunkOptions { chunk_size: 0 }).collect();
        assert_eq!(chunks, vec!["a", "b"]);
        assert_eq!(html_chunks("", ChunkOptions::default()).count(), 0);
    }

    #[test]
    fn test_multibyte_characters_stay_whole() {
        let chunks: Vec<&str> = html_chunks("héllo→", ChunkOptions { chunk_size: 2 }).collect();
        assert_eq!(chunks, vec!["hé", "ll", "o→"]);
    }

    #[derive(Default)]
    struct Recorder {
        status: Option<StatusCode>,
        headers: Vec<(HeaderName, HeaderValue)>,
        writes: Vec<String>,
        drains: usize,
        ended: bool,
    }

    impl ResponseSink for Recorder {
        fn set_status(&mut self, status: StatusCode) {
            self.status = Some(status);
        }

        fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
            self.headers.push((name, value));
        }

        fn write_chunk(&mut self, chunk: &str) -> Result<bool> {
            self.writes.push(chunk.into());
            // Saturate on every second write
            Ok(self.writes.len() % 2 == 1)
        }

        fn wait_drain(&mut self) -> Result<()> {
            self.drains += 1;
            Ok(())
        }

        fn end(&mut self) -> Result<()> {
            self.ended = true;
            Ok(())
        }
    }

    #[test]
    fn test_stream_sets_headers_and_waits_for_drain() {
        let mut sink = Recorder::default();
        stream_to_response(&mut sink, ["a", "b", "c", "d"], StatusCode::NOT_FOUND).unwrap();

        assert_eq!(sink.status, Some(StatusCode::NOT_FOUND));
        assert_eq!(
            sink.headers,
            vec![
                (CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8")),
                (TRANSFER_ENCODING, HeaderValue::from_static("chunked")),
            ]
        );
        assert_eq!(sink.writes.concat(), "abcd");
        assert_eq!(sink.drains, 2);
        assert!(sink.ended);
    }

    #[test]
    fn test_chunked_writer_framing() {
        let mut sink = ChunkedWriter::new(Vec::new());
        let chunks = html_chunks("<p>hi</p>", ChunkOptions { chunk_size: 5 });
        stream_to_response(&mut sink, chunks, StatusCode::OK).unwrap();

        let raw = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(
            raw,
            "HTTP/1.1 200 OK\r\ncontent-type: text/html; charset=utf-8\r\ntransfer-encoding: chunked\r\n\r\n\
             5\r\n<p>hi\r\n4\r\n</p>\r\n0\r\n\r\n"
        );
    }

    #[test_case(StatusCode::CREATED, "HTTP/1.1 201 Created\r\n" ; "created")]
    #[test_case(StatusCode::NO_CONTENT, "HTTP/1.1 204 No Content\r\n" ; "no content")]
    #[test_case(StatusCode::FORBIDDEN, "HTTP/1.1 403 Forbidden\r\n" ; "forbidden")]
    #[test_case(StatusCode::SERVICE_UNAVAILABLE, "HTTP/1.1 503 Service Unavailable\r\n" ; "unavailable")]
    fn test_status_line_uses_canonical_reason(status: StatusCode, line: &str) {
        let mut sink = ChunkedWriter::new(Vec::new());
        stream_to_response(&mut sink, [""], status).unwrap();

        let raw = String::from_utf8(sink.into_inner()).unwrap();
        assert!(raw.starts_with(line), "{raw:?}");
        assert!(raw.ends_with("\r\n\r\n0\r\n\r\n"));
    }

    #[test]
    fn test_unregistered_status_has_empty_reason() {
        let mut sink = ChunkedWriter::new(Vec::new());
        let status = StatusCode::from_u16(599).unwrap();
        stream_to_response(&mut sink, ["x"], status).unwrap();

        let raw = String::from_utf8(sink.into_inner()).unwrap();
        assert!(raw.starts_with("HTTP/1.1 599 \r\n"));
    }

    #[test]
    fn test_repeated_header_replaces_value() {
        let mut sink = ChunkedWriter::new(Vec::new());
        sink.set_header(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        stream_to_response(&mut sink, ["x"], StatusCode::OK).unwrap();

        let raw = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(raw.matches("content-type").count(), 1);
        assert!(raw.contains("content-type: text/html; charset=utf-8\r\n"));
    }

    proptest! {
        #[test]
        fn test_chunks_rejoin_to_input(html in ".{0,200}", size in 1usize..40) {
            let chunks: Vec<&str> = html_chunks(&html, ChunkOptions { chunk_size: size }).collect();
            prop_assert_eq!(chunks.concat(), html.clone());
            for chunk in &chunks {
                prop_assert!(chunk.chars().count() <= size);
                prop_assert!(!chunk.is_empty());
            }
        }
    }
}

//! Response writing: status line, headers, and the small set of body shapes
//! handlers need (whole-buffer, chunked streaming, partial-content range).

use std::io::{self, Write};

use crate::utils::dates::format_http_date;

pub const SERVER_HEADER: &str = "surf-mt/0.0.1";

/// Cache-control applied to cover art and cached transcodes: both are
/// content-addressed by an id that never changes underneath a given file, so
/// a long max-age is safe.
pub const CACHE_CONTROL_LONG: &str = "public, max-age=31536000, immutable";

pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        206 => "Partial Content",
        304 => "Not Modified",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        416 => "Range Not Satisfiable",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        _ => "Unknown",
    }
}

pub struct ResponseWriter<'a, W: Write> {
    out: &'a mut W,
}

impl<'a, W: Write> ResponseWriter<'a, W> {
    pub fn new(out: &'a mut W) -> Self {
        Self { out }
    }

    fn write_status_and_common_headers(&mut self, status: u16, extra_headers: &[(&str, &str)]) -> io::Result<()> {
        write!(
            self.out,
            "HTTP/1.1 {} {}\r\n",
            status,
            reason_phrase(status)
        )?;
        write!(self.out, "Date: {}\r\n", format_http_date(now_secs()))?;
        write!(self.out, "Server: {}\r\n", SERVER_HEADER)?;
        write!(self.out, "Connection: keep-alive\r\n")?;
        for (name, value) in extra_headers {
            write!(self.out, "{}: {}\r\n", name, value)?;
        }
        Ok(())
    }

    pub fn send_json(&mut self, status: u16, body: &[u8]) -> io::Result<()> {
        self.write_status_and_common_headers(
            status,
            &[("Content-Type", "application/json"), ("Content-Length", &body.len().to_string())],
        )?;
        write!(self.out, "\r\n")?;
        self.out.write_all(body)
    }

    /// Plain-text body, used for the playlist-delete confirmation and error
    /// bodies. Always suffixed with `\r\n`, matching the literal bodies the
    /// spec calls out (e.g. `"Not Found\r\n"`, `Content-Length: 11`).
    pub fn send_text(&mut self, status: u16, message: &str) -> io::Result<()> {
        let body = format!("{message}\r\n");
        self.write_status_and_common_headers(
            status,
            &[("Content-Type", "text/plain"), ("Content-Length", &body.len().to_string())],
        )?;
        write!(self.out, "\r\n")?;
        self.out.write_all(body.as_bytes())
    }

    /// Error response with a plain-text reason body, the shape every non-2xx
    /// status the router falls back to uses.
    pub fn send_text_error(&mut self, status: u16, reason: &str) -> io::Result<()> {
        self.send_text(status, reason)
    }

    pub fn send_empty(&mut self, status: u16) -> io::Result<()> {
        self.write_status_and_common_headers(status, &[("Content-Length", "0")])?;
        write!(self.out, "\r\n")
    }

    /// `304 Not Modified`: no body, but `Last-Modified` is still required so
    /// the client can keep using it for the next conditional request.
    pub fn send_not_modified(&mut self, last_modified: i64) -> io::Result<()> {
        self.write_status_and_common_headers(
            304,
            &[("Last-Modified", &format_http_date(last_modified))],
        )?;
        write!(self.out, "\r\n")
    }

    /// A whole binary file: cover art or a fully-cached transcode with no
    /// `Range` header.
    pub fn send_binary(
        &mut self,
        status: u16,
        content_type: &str,
        last_modified: Option<i64>,
        cache_control: Option<&str>,
        body: &[u8],
    ) -> io::Result<()> {
        let mut headers: Vec<(&str, String)> = vec![
            ("Content-Type", content_type.to_string()),
            ("Content-Length", body.len().to_string()),
        ];
        if let Some(lm) = last_modified {
            headers.push(("Last-Modified", format_http_date(lm)));
        }
        if let Some(cc) = cache_control {
            headers.push(("Cache-Control", cc.to_string()));
        }
        headers.push(("Accept-Ranges", "bytes".to_string()));

        let refs: Vec<(&str, &str)> = headers.iter().map(|(k, v)| (*k, v.as_str())).collect();
        self.write_status_and_common_headers(status, &refs)?;
        write!(self.out, "\r\n")?;
        self.out.write_all(body)
    }

    pub fn send_range(
        &mut self,
        content_type: &str,
        start: u64,
        end: u64,
        total_len: u64,
        cache_control: Option<&str>,
        body: &[u8],
    ) -> io::Result<()> {
        let mut headers: Vec<(&str, String)> = vec![
            ("Content-Type".to_string(), content_type.to_string()),
            ("Content-Length".to_string(), body.len().to_string()),
            ("Content-Range".to_string(), format!("bytes {start}-{end}/{total_len}")),
            ("Accept-Ranges".to_string(), "bytes".to_string()),
        ];
        if let Some(cc) = cache_control {
            headers.push(("Cache-Control".to_string(), cc.to_string()));
        }
        let refs: Vec<(&str, &str)> = headers.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        self.write_status_and_common_headers(206, &refs)?;
        write!(self.out, "\r\n")?;
        self.out.write_all(body)
    }

    pub fn send_range_not_satisfiable(&mut self, total_len: u64) -> io::Result<()> {
        self.write_status_and_common_headers(
            416,
            &[("Content-Range", &format!("bytes */{total_len}"))],
        )?;
        write!(self.out, "\r\n")
    }

    /// Begin a chunked-transfer-encoded body; returns a writer that frames
    /// each `write` call as one chunk. Used for streaming transcodes.
    pub fn begin_chunked(mut self, content_type: &str) -> io::Result<ChunkedWriter<'a, W>> {
        self.write_status_and_common_headers(
            200,
            &[
                ("Content-Type", content_type),
                ("Transfer-Encoding", "chunked"),
                ("Accept-Ranges", "bytes"),
                ("Cache-Control", CACHE_CONTROL_LONG),
            ],
        )?;
        write!(self.out, "\r\n")?;
        Ok(ChunkedWriter { out: self.out })
    }
}

pub struct ChunkedWriter<'a, W: Write> {
    out: &'a mut W,
}

impl<'a, W: Write> ChunkedWriter<'a, W> {
    pub fn finish(mut self) -> io::Result<()> {
        write!(self.out, "0\r\n\r\n")
    }
}

impl<'a, W: Write> Write for ChunkedWriter<'a, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        write!(self.out, "{:x}\r\n", buf.len())?;
        self.out.write_all(buf)?;
        write!(self.out, "\r\n")?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

fn now_secs() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

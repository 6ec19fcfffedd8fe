//! Incremental HTTP/1.1 request parsing over a fixed-size buffer (§4.7/§10.6:
//! a `picohttpparser`-style parser via `httparse`, not a full async codec).

use std::io::Read;
use std::net::TcpStream;

use crate::utils::url::split_target;

pub const MAX_REQUEST_BYTES: usize = 8 * 1024;
const MAX_HEADERS: usize = 64;

pub struct Request {
    pub method: String,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Request {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug)]
pub enum ReadError {
    ConnectionClosed,
    TooLarge,
    Malformed,
    Io(std::io::Error),
}

impl From<std::io::Error> for ReadError {
    fn from(e: std::io::Error) -> Self {
        ReadError::Io(e)
    }
}

/// Read and parse one request off `stream`. Returns `ConnectionClosed` if the
/// peer closed before sending a byte (the normal end of a keep-alive loop).
pub fn read_request(stream: &mut TcpStream) -> Result<Request, ReadError> {
    let mut buf = Vec::with_capacity(4096);
    let mut chunk = [0u8; 4096];
    let mut header_end = None;

    loop {
        let n = stream.read(&mut chunk)?;
        if n == 0 {
            if buf.is_empty() {
                return Err(ReadError::ConnectionClosed);
            }
            return Err(ReadError::Malformed);
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.len() > MAX_REQUEST_BYTES {
            return Err(ReadError::TooLarge);
        }

        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut parsed = httparse::Request::new(&mut headers);
        match parsed.parse(&buf) {
            Ok(httparse::Status::Complete(offset)) => {
                header_end = Some((offset, parsed_to_owned(&parsed)));
                break;
            }
            Ok(httparse::Status::Partial) => continue,
            Err(_) => return Err(ReadError::Malformed),
        }
    }

    let (offset, (method, target, raw_headers)) = header_end.expect("loop only exits with a value");
    let (path, query) = split_target(&target);

    let content_length = raw_headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);

    let mut body = buf[offset..].to_vec();
    while body.len() < content_length {
        if offset + content_length > MAX_REQUEST_BYTES {
            return Err(ReadError::TooLarge);
        }
        let n = stream.read(&mut chunk)?;
        if n == 0 {
            return Err(ReadError::Malformed);
        }
        body.extend_from_slice(&chunk[..n]);
    }
    body.truncate(content_length);

    Ok(Request {
        method,
        path,
        query,
        headers: raw_headers,
        body,
    })
}

fn parsed_to_owned(req: &httparse::Request) -> (String, String, Vec<(String, String)>) {
    let method = req.method.unwrap_or("").to_string();
    let target = req.path.unwrap_or("").to_string();
    let headers = req
        .headers
        .iter()
        .filter(|h| !h.name.is_empty())
        .map(|h| (h.name.to_lowercase(), String::from_utf8_lossy(h.value).into_owned()))
        .collect();
    (method, target, headers)
}

//! Percent-decoding and query-string parsing for request targets.

/// Decode a percent-encoded string (`%XX` and `+` as space).
pub fn url_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 2 < bytes.len() => {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
                if let Some(byte) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                    out.push(byte);
                    i += 3;
                } else {
                    out.push(bytes[i]);
                    i += 1;
                }
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Split a request target into (path, query-params). The target is split at the
/// first `?`; the query portion is split at the last `#` to drop any fragment,
/// tokenized on `&`, then each token split on the first `=`.
pub fn split_target(target: &str) -> (String, Vec<(String, String)>) {
    let (path, rest) = match target.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (target, None),
    };

    let params = rest
        .map(|q| match q.rfind('#') {
            Some(idx) => &q[..idx],
            None => q,
        })
        .map(|q| {
            q.split('&')
                .filter(|token| !token.is_empty())
                .map(|token| match token.split_once('=') {
                    Some((k, v)) => (url_decode(k), url_decode(v)),
                    None => (url_decode(token), String::new()),
                })
                .collect()
        })
        .unwrap_or_default();

    (path.to_string(), params)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_percent_and_plus() {
        assert_eq!(url_decode("hello%20world"), "hello world");
        assert_eq!(url_decode("a+b"), "a b");
    }

    #[test]
    fn splits_path_and_query_dropping_fragment() {
        let (path, params) = split_target("/api/v1/stream/abc?q=5#frag");
        assert_eq!(path, "/api/v1/stream/abc");
        assert_eq!(params, vec![("q".to_string(), "5".to_string())]);
    }

    #[test]
    fn path_with_no_query() {
        let (path, params) = split_target("/api/v1/albums");
        assert_eq!(path, "/api/v1/albums");
        assert!(params.is_empty());
    }
}

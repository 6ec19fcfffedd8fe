//! Multi-delimiter tokenizing, used for artist/genre tag values and playlist bodies.

/// Delimiters used to split multi-valued artist/genre tag strings.
pub const TAG_DELIMS: &[char] = &[',', '|', ';', '/'];

/// Split `input` on any of `delims`, trimming whitespace and dropping empty tokens.
pub fn tokenize(input: &str, delims: &[char]) -> Vec<String> {
    input
        .split(|c| delims.contains(&c))
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

/// Split a playlist PUT body on `,` or `\n`, same rules as `tokenize`.
pub fn tokenize_playlist_body(body: &str) -> Vec<String> {
    tokenize(body, &[',', '\n'])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_any_delimiter_and_trims() {
        let tokens = tokenize(" A, B | C ; D/E ", TAG_DELIMS);
        assert_eq!(tokens, vec!["A", "B", "C", "D", "E"]);
    }

    #[test]
    fn skips_empty_runs() {
        let tokens = tokenize("A,,B", TAG_DELIMS);
        assert_eq!(tokens, vec!["A", "B"]);
    }

    #[test]
    fn playlist_body_splits_on_comma_and_newline() {
        let tokens = tokenize_playlist_body("t1,t2\nt3");
        assert_eq!(tokens, vec!["t1", "t2", "t3"]);
    }
}

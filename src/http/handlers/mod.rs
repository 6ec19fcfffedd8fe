pub mod catalog;
pub mod playlists;
pub mod search;
pub mod stream;

use tracing::warn;

use super::request::Request;
use super::AppState;

/// Shared conditional-GET check used by every read handler (§4.7): if
/// `If-Modified-Since` parses and is at or after the last completed scan,
/// the handler short-circuits with a 304 and skips its body entirely.
pub(super) fn not_modified(req: &Request, state: &AppState) -> bool {
    let Some(raw) = req.header("if-modified-since") else {
        return false;
    };
    let Some(since) = crate::utils::dates::parse_http_date(raw) else {
        warn!(value = raw, "ignoring unparseable If-Modified-Since");
        return false;
    };
    since >= *state.latest_mod_time.lock()
}

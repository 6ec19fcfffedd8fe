//! Route table: regex-captured path segments dispatched to handler functions
//! (§4.7). Kept as a flat ordered list checked top-to-bottom, matching the
//! size of the API rather than reaching for a trie.

use std::net::TcpStream;
use std::sync::{Arc, OnceLock};

use regex::Regex;
use tracing::warn;

use crate::error::AppError;

use super::handlers;
use super::request::Request;
use super::response::ResponseWriter;
use super::AppState;

/// What a handler did with the connection. Every handler but the live-stream
/// one writes its response and returns `Served`; the live-stream handler
/// hands socket ownership off to a detached transcode thread (§4.5) and
/// returns `HandedOff` so the serving loop stops touching the stream without
/// closing the underlying fd out from under that thread.
pub enum Outcome {
    Served,
    HandedOff,
}

type Handler = fn(&Request, &Arc<AppState>, &[String], &mut TcpStream) -> Result<Outcome, AppError>;

struct Route {
    method: &'static str,
    pattern: &'static str,
    handler: Handler,
}

const ROUTES: &[Route] = &[
    Route { method: "GET", pattern: r"^/api/v1/albums$", handler: handlers::catalog::list_albums },
    Route { method: "GET", pattern: r"^/api/v1/artists$", handler: handlers::catalog::list_artists },
    Route { method: "GET", pattern: r"^/api/v1/tracks$", handler: handlers::catalog::list_tracks },
    Route { method: "GET", pattern: r"^/api/v1/album/([^/]+)$", handler: handlers::catalog::album_detail },
    Route { method: "GET", pattern: r"^/api/v1/coverart/([^/]+)$", handler: handlers::catalog::cover_art },
    Route { method: "GET", pattern: r"^/api/v1/search$", handler: handlers::search::search },
    Route { method: "GET", pattern: r"^/api/v1/plists$", handler: handlers::playlists::list },
    Route { method: "POST", pattern: r"^/api/v1/plist/insert/([^/]+)$", handler: handlers::playlists::insert_track },
    Route { method: "POST", pattern: r"^/api/v1/plist/reorder/([^/]+)$", handler: handlers::playlists::reorder_tracks },
    Route { method: "POST", pattern: r"^/api/v1/plist/remove/([^/]+)$", handler: handlers::playlists::remove_track },
    Route { method: "GET", pattern: r"^/api/v1/plist/([^/]+)$", handler: handlers::playlists::detail },
    Route { method: "PUT", pattern: r"^/api/v1/plist/([^/]+)$", handler: handlers::playlists::put },
    Route { method: "DELETE", pattern: r"^/api/v1/plist/([^/]+)$", handler: handlers::playlists::delete },
    Route { method: "GET", pattern: r"^/api/v1/stream/([^/]+)$", handler: handlers::stream::stream_track },
];

fn compiled() -> &'static Vec<Regex> {
    static CACHE: OnceLock<Vec<Regex>> = OnceLock::new();
    CACHE.get_or_init(|| {
        ROUTES
            .iter()
            .map(|r| Regex::new(r.pattern).expect("static route pattern compiles"))
            .collect()
    })
}

/// Returns `Ok(true)` if the connection should keep looping for another
/// request on this same socket, `Ok(false)` if the socket has been handed off
/// to another thread and the serving loop must stop touching it.
pub fn dispatch(req: &Request, state: &Arc<AppState>, stream: &mut TcpStream) -> std::io::Result<bool> {
    let patterns = compiled();
    let mut path_matched = false;

    for (route, regex) in ROUTES.iter().zip(patterns.iter()) {
        let Some(captures) = regex.captures(&req.path) else {
            continue;
        };
        path_matched = true;
        if route.method != req.method {
            continue;
        }

        let params: Vec<String> = captures
            .iter()
            .skip(1)
            .filter_map(|m| m.map(|m| m.as_str().to_string()))
            .collect();

        return match (route.handler)(req, state, &params, stream) {
            Ok(Outcome::Served) => Ok(true),
            Ok(Outcome::HandedOff) => Ok(false),
            Err(err) => {
                write_error(stream, &err)?;
                Ok(true)
            }
        };
    }

    let err = if path_matched {
        AppError::MethodNotAllowed
    } else {
        AppError::NotFound("Not Found".to_string())
    };
    write_error(stream, &err)?;
    Ok(true)
}

fn write_error(stream: &mut TcpStream, err: &AppError) -> std::io::Result<()> {
    if matches!(err, AppError::Catalog(_) | AppError::Io(_)) {
        warn!(error = %err, "request failed");
    }
    let mut writer = ResponseWriter::new(stream);
    if let AppError::RangeNotSatisfiable { total_len } = err {
        return writer.send_range_not_satisfiable(*total_len);
    }
    writer.send_text_error(err.status_code(), &err.reason())
}

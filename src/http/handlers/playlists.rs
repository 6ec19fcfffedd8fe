use std::net::TcpStream;
use std::sync::Arc;

use crate::catalog::{self, queries};
use crate::error::AppError;
use crate::utils::tokenize::tokenize_playlist_body;

use super::super::request::Request;
use super::super::response::ResponseWriter;
use super::super::router::Outcome;
use super::super::AppState;
use super::not_modified;

pub fn list(
    req: &Request,
    state: &Arc<AppState>,
    _params: &[String],
    stream: &mut TcpStream,
) -> Result<Outcome, AppError> {
    if not_modified(req, state) {
        ResponseWriter::new(stream).send_not_modified(*state.latest_mod_time.lock())?;
        return Ok(Outcome::Served);
    }

    let conn = catalog::open(&state.db_path)?;
    let playlists = queries::list_playlists(&conn).map_err(|e| AppError::Catalog(e.into()))?;
    let body = serde_json::to_vec(&playlists).map_err(|e| AppError::Catalog(e.into()))?;
    ResponseWriter::new(stream).send_json(200, &body)?;
    Ok(Outcome::Served)
}

pub fn detail(
    req: &Request,
    state: &Arc<AppState>,
    params: &[String],
    stream: &mut TcpStream,
) -> Result<Outcome, AppError> {
    if not_modified(req, state) {
        ResponseWriter::new(stream).send_not_modified(*state.latest_mod_time.lock())?;
        return Ok(Outcome::Served);
    }

    let conn = catalog::open(&state.db_path)?;
    let id = &params[0];
    match queries::get_playlist_detail(&conn, id).map_err(|e| AppError::Catalog(e.into()))? {
        Some(detail) => {
            let body = serde_json::to_vec(&detail).map_err(|e| AppError::Catalog(e.into()))?;
            ResponseWriter::new(stream).send_json(200, &body)?;
            Ok(Outcome::Served)
        }
        None => Err(AppError::NotFound("Not Found".to_string())),
    }
}

/// `PUT /api/v1/plist/{id}[?name=...]`: the body is plain text, one track id
/// per line or comma-separated (§4.7), not JSON. An empty/absent body is
/// rejected before anything is touched, same as the original's
/// `Content-Length` check. Replies with the accepted track-id list as JSON.
pub fn put(
    req: &Request,
    state: &Arc<AppState>,
    params: &[String],
    stream: &mut TcpStream,
) -> Result<Outcome, AppError> {
    if req.body.is_empty() {
        return Err(AppError::BadInput("missing playlist body".to_string()));
    }
    let body = std::str::from_utf8(&req.body)
        .map_err(|_| AppError::BadInput("playlist body is not valid UTF-8".to_string()))?;
    let track_ids = tokenize_playlist_body(body);

    let mut conn = catalog::open(&state.db_path)?;
    let id = &params[0];
    let name = req.query_param("name");
    queries::replace_playlist(&mut conn, id, name, &track_ids)
        .map_err(|e| AppError::Catalog(e.into()))?;

    let response_body = serde_json::to_vec(&track_ids).map_err(|e| AppError::Catalog(e.into()))?;
    ResponseWriter::new(stream).send_json(200, &response_body)?;
    Ok(Outcome::Served)
}

pub fn delete(
    _req: &Request,
    state: &Arc<AppState>,
    params: &[String],
    stream: &mut TcpStream,
) -> Result<Outcome, AppError> {
    let mut conn = catalog::open(&state.db_path)?;
    queries::delete_playlist(&mut conn, &params[0]).map_err(|e| AppError::Catalog(e.into()))?;
    ResponseWriter::new(stream).send_text(200, "Playlist deleted.")?;
    Ok(Outcome::Served)
}

/// Routes match under `POST /api/v1/plist/{insert|reorder|remove}/{id}` but
/// are deliberate stubs (§4.7): clients rebuild the full order through `PUT`
/// instead. The surface is preserved so a client probing it gets `501`
/// rather than `404`.
pub fn insert_track(
    _req: &Request,
    _state: &Arc<AppState>,
    _params: &[String],
    _stream: &mut TcpStream,
) -> Result<Outcome, AppError> {
    Err(AppError::Unimplemented)
}

pub fn reorder_tracks(
    _req: &Request,
    _state: &Arc<AppState>,
    _params: &[String],
    _stream: &mut TcpStream,
) -> Result<Outcome, AppError> {
    Err(AppError::Unimplemented)
}

pub fn remove_track(
    _req: &Request,
    _state: &Arc<AppState>,
    _params: &[String],
    _stream: &mut TcpStream,
) -> Result<Outcome, AppError> {
    Err(AppError::Unimplemented)
}

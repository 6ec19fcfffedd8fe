use std::net::TcpStream;
use std::sync::Arc;

use crate::catalog::{self, queries};
use crate::error::AppError;

use super::super::request::Request;
use super::super::response::{ResponseWriter, CACHE_CONTROL_LONG};
use super::super::router::Outcome;
use super::super::AppState;
use super::not_modified;

pub fn list_albums(
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
    let albums = queries::list_albums(&conn).map_err(|e| AppError::Catalog(e.into()))?;
    let body = serde_json::to_vec(&albums).map_err(|e| AppError::Catalog(e.into()))?;
    ResponseWriter::new(stream).send_json(200, &body)?;
    Ok(Outcome::Served)
}

pub fn list_artists(
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
    let artists = queries::list_artists(&conn).map_err(|e| AppError::Catalog(e.into()))?;
    let body = serde_json::to_vec(&artists).map_err(|e| AppError::Catalog(e.into()))?;
    ResponseWriter::new(stream).send_json(200, &body)?;
    Ok(Outcome::Served)
}

pub fn list_tracks(
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
    let sort = req.query_param("sort");
    // A bad sort token must fail immediately, before any rows are written
    // (§9: the original lets a bad sort abort mid-stream instead).
    let tracks = queries::list_tracks(&conn, sort)?;
    let body = serde_json::to_vec(&tracks).map_err(|e| AppError::Catalog(e.into()))?;
    ResponseWriter::new(stream).send_json(200, &body)?;
    Ok(Outcome::Served)
}

pub fn album_detail(
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
    let album_id = &params[0];
    match queries::get_album_detail(&conn, album_id).map_err(|e| AppError::Catalog(e.into()))? {
        Some(detail) => {
            let body = serde_json::to_vec(&detail).map_err(|e| AppError::Catalog(e.into()))?;
            ResponseWriter::new(stream).send_json(200, &body)?;
            Ok(Outcome::Served)
        }
        None => Err(AppError::NotFound("Not Found".to_string())),
    }
}

/// Cover art is looked up by album id (§4.7). `.jpg` normalizes to the
/// `jpeg` media subtype; any other extension is reported as the literal
/// `image/xyz`, matching the spec's fallback rather than guessing a real
/// MIME type for an unrecognized image format.
pub fn cover_art(
    _req: &Request,
    state: &Arc<AppState>,
    params: &[String],
    stream: &mut TcpStream,
) -> Result<Outcome, AppError> {
    let conn = catalog::open(&state.db_path)?;
    let album_id = &params[0];
    let path = queries::get_cover_art_path(&conn, album_id)
        .map_err(|e| AppError::Catalog(e.into()))?
        .ok_or_else(|| AppError::NotFound("Not Found".to_string()))?;

    let bytes = std::fs::read(&path)?;
    let content_type = cover_art_content_type(&path);
    let last_modified = *state.latest_mod_time.lock();

    ResponseWriter::new(stream).send_binary(
        200,
        &content_type,
        Some(last_modified),
        Some(CACHE_CONTROL_LONG),
        &bytes,
    )?;
    Ok(Outcome::Served)
}

fn cover_art_content_type(path: &str) -> String {
    let ext = std::path::Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());
    match ext.as_deref() {
        Some("png") => "image/png".to_string(),
        Some("jpg") | Some("jpeg") => "image/jpeg".to_string(),
        Some(other) => format!("image/{other}"),
        None => "image/xyz".to_string(),
    }
}

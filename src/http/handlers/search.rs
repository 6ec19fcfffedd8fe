use std::net::TcpStream;
use std::sync::Arc;

use crate::catalog::{self, queries};
use crate::error::AppError;

use super::super::request::Request;
use super::super::response::ResponseWriter;
use super::super::router::Outcome;
use super::super::AppState;

/// `q` missing is treated the same as an empty query: the spec only defines
/// behavior for `|q| < 2` (returns `[]`), so a missing parameter falls into
/// that same empty-result path rather than a `400`.
pub fn search(
    req: &Request,
    state: &Arc<AppState>,
    _params: &[String],
    stream: &mut TcpStream,
) -> Result<Outcome, AppError> {
    let q = req.query_param("q").unwrap_or("");

    let conn = catalog::open(&state.db_path)?;
    let hits = queries::search(&conn, q).map_err(|e| AppError::Catalog(e.into()))?;
    let body = serde_json::to_vec(&hits).map_err(|e| AppError::Catalog(e.into()))?;
    ResponseWriter::new(stream).send_json(200, &body)?;
    Ok(Outcome::Served)
}

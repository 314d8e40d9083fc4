//! REST API for vecscan.
//!
//! Provides a stateless HTTP server with JSON endpoints for conversion and
//! search. Each request names the files it works on; nothing is cached
//! between requests, and every search query opens its own store reader.
//! Defaults for batch size, chunk size and `k` come from the
//! [`EngineConfig`] registered with [`config_with`].
//!
//! ## Endpoints
//!
//! - `POST /convert` - Convert an fvecs file into a store
//! - `POST /search` - Run one or more k-NN queries against a store
//!
//! ## Usage
//!
//! ```rust,no_run
//! use actix_web::{App, HttpServer};
//!
//! #[actix_web::main]
//! async fn main() -> std::io::Result<()> {
//!     let engine = vecscan::EngineConfig { k: 5, ..Default::default() };
//!     HttpServer::new(move || App::new().configure(vecscan::server::config_with(engine)))
//!         .bind("0.0.0.0:7878")?
//!         .run()
//!         .await
//! }
//! ```

use crate::error::VecError;
use crate::search::search_with_distances;
use crate::store::{StoreReader, store_path_for};
use crate::{EngineConfig, convert_to};
use actix_web::{HttpResponse, Responder, http::StatusCode, web};
use log::warn;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// --- Request structs ---

#[derive(Deserialize)]
struct ConvertRequest {
    input: String,
    output: Option<String>,
    batch_size: Option<usize>,
}

#[derive(Deserialize)]
struct Query {
    value: Vec<f32>,
    top_k: Option<usize>,
}

#[derive(Deserialize)]
struct SearchRequest {
    store: String,
    queries: Vec<Query>,
    chunk_size: Option<usize>,
}

// --- Response structs ---

#[derive(Serialize)]
struct ConvertResponse {
    output: PathBuf,
    count: usize,
    dimension: Option<usize>,
}

#[derive(Serialize)]
struct SearchResponse {
    results: Vec<SearchResultGroup>,
}

#[derive(Serialize)]
struct SearchResultGroup {
    ids: Vec<usize>,
    distances: Vec<f32>,
    message: String,
}

/// Maps a core error onto an HTTP status.
fn status_for(err: &VecError) -> StatusCode {
    match err {
        VecError::FileNotFound { .. } => StatusCode::NOT_FOUND,
        VecError::CorruptInput { .. }
        | VecError::InconsistentDimension { .. }
        | VecError::StoreCorrupted { .. }
        | VecError::StoreVersionMismatch { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        VecError::InvalidConfig { .. }
        | VecError::DimensionMismatch { .. }
        | VecError::QueryParse { .. } => StatusCode::BAD_REQUEST,
        VecError::Io { .. } | VecError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: &VecError) -> HttpResponse {
    HttpResponse::build(status_for(err)).json(serde_json::json!({"error": err.to_string()}))
}

// --- Handlers ---

async fn convert_handler(
    engine: web::Data<EngineConfig>,
    body: web::Json<ConvertRequest>,
) -> impl Responder {
    let body = body.into_inner();
    let output = body
        .output
        .map(PathBuf::from)
        .unwrap_or_else(|| store_path_for(&body.input));
    let batch_size = body.batch_size.unwrap_or(engine.read_batch_size);
    let input = body.input;

    let result = web::block(move || convert_to(&input, &output, batch_size)).await;

    match result {
        Ok(Ok(summary)) => HttpResponse::Ok().json(ConvertResponse {
            output: summary.output,
            count: summary.count,
            dimension: summary.dimension,
        }),
        Ok(Err(e)) => {
            warn!("convert failed: {}", e);
            error_response(&e)
        }
        Err(e) => blocking_failed(e),
    }
}

async fn search_handler(
    engine: web::Data<EngineConfig>,
    body: web::Json<SearchRequest>,
) -> impl Responder {
    let body = body.into_inner();
    let chunk_size = body.chunk_size.unwrap_or(engine.chunk_size);
    let default_k = engine.k;

    let result = web::block(move || -> Result<Vec<SearchResultGroup>, VecError> {
        // Store-level failures abort the request, even with no queries.
        let mut opened = Some(StoreReader::open(&body.store, chunk_size)?);
        let mut results = Vec::new();
        for query in &body.queries {
            let reader = match opened.take() {
                Some(reader) => reader,
                None => StoreReader::open(&body.store, chunk_size)?,
            };
            let top_k = query.top_k.unwrap_or(default_k);

            match search_with_distances(&query.value, reader, top_k) {
                Ok(hits) => results.push(SearchResultGroup {
                    message: format!("Found {} neighbors", hits.len()),
                    ids: hits.iter().map(|n| n.id).collect(),
                    distances: hits.iter().map(|n| n.distance).collect(),
                }),
                Err(e @ VecError::DimensionMismatch { .. }) => results.push(SearchResultGroup {
                    ids: Vec::new(),
                    distances: Vec::new(),
                    message: e.to_string(),
                }),
                Err(e) => return Err(e),
            }
        }
        Ok(results)
    })
    .await;

    match result {
        Ok(Ok(results)) => HttpResponse::Ok().json(SearchResponse { results }),
        Ok(Err(e)) => {
            warn!("search failed: {}", e);
            error_response(&e)
        }
        Err(e) => blocking_failed(e),
    }
}

fn blocking_failed(e: actix_web::error::BlockingError) -> HttpResponse {
    HttpResponse::InternalServerError().json(serde_json::json!({"error": e.to_string()}))
}

/// Registers the endpoints with default engine settings.
pub fn config(cfg: &mut web::ServiceConfig) {
    config_with(EngineConfig::default())(cfg)
}

/// Registers the endpoints with `engine` supplying per-request defaults.
pub fn config_with(engine: EngineConfig) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| {
        cfg.app_data(web::Data::new(engine))
           .service(web::resource("/convert").route(web::post().to(convert_handler)))
           .service(web::resource("/search").route(web::post().to(search_handler)));
    }
}

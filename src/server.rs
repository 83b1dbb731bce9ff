//! HTTP query API.
//!
//! The index and embedder are loaded once before the listener starts and
//! never change afterwards; every handler reads the same shared context.
//! Reloading an index means restarting the process.

use std::{collections::HashMap, net::SocketAddr, sync::Arc};

use axum::{
    Json, Router,
    extract::{Query as QueryParams, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Serialize;
use serde_json::json;

use crate::{
    embedding::Embedder,
    error::{Error, Result},
    index::{Index, Stats},
    index_builder::FilterOptions,
    search::{DEFAULT_LIMIT, Query, execute_search},
};

/// Everything a request needs, immutable after startup.
pub struct CatalogContext {
    pub index: Index,
    pub embedder: Box<dyn Embedder>,
}

impl CatalogContext {
    pub fn new(index: Index, embedder: Box<dyn Embedder>) -> Arc<Self> {
        Arc::new(Self { index, embedder })
    }
}

#[derive(Serialize)]
struct FiltersResponse<'a> {
    categories: &'a [String],
    options: &'a FilterOptions,
}

pub fn router(ctx: Arc<CatalogContext>) -> Router {
    Router::new()
        .route("/api/filters", get(filters))
        .route("/api/search", get(search))
        .route("/api/stats", get(stats))
        .with_state(ctx)
}

/// Bind `addr` and serve until the process is stopped.
pub async fn serve(ctx: Arc<CatalogContext>, addr: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        "serving {} records on http://{}",
        ctx.index.len(),
        listener.local_addr()?
    );
    axum::serve(listener, router(ctx)).await?;
    Ok(())
}

fn error_body(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

/// GET /api/filters - categories in configured order and the value lists
/// for every filter axis.
async fn filters(State(ctx): State<Arc<CatalogContext>>) -> Response {
    Json(FiltersResponse {
        categories: ctx.index.categories(),
        options: ctx.index.filters(),
    })
    .into_response()
}

/// Translate raw query parameters. Every configured category name is a
/// filter parameter; unknown parameters are ignored.
fn parse_query(
    params: &HashMap<String, String>,
    categories: &[String],
) -> std::result::Result<Query, String> {
    let limit = match params.get("limit").map(|l| l.trim()) {
        None | Some("") => DEFAULT_LIMIT,
        Some(raw) => raw
            .parse::<usize>()
            .map_err(|_| format!("invalid limit '{raw}'"))?,
    };

    let category_filters = categories
        .iter()
        .filter_map(|c| {
            params
                .get(c)
                .filter(|v| !v.is_empty())
                .map(|v| (c.clone(), v.clone()))
        })
        .collect();

    Ok(Query {
        text: params.get("q").cloned().unwrap_or_default(),
        category_filters,
        file_type: params.get("file_type").cloned(),
        include: params.get("include").cloned(),
        exclude: params.get("exclude").cloned(),
        limit,
    })
}

/// GET /api/search
///
/// A malformed include/exclude pattern is reported in the body as
/// `{"error": ...}` with status 200; a malformed limit is a 400.
async fn search(
    State(ctx): State<Arc<CatalogContext>>,
    QueryParams(params): QueryParams<HashMap<String, String>>,
) -> Response {
    let query = match parse_query(&params, ctx.index.categories()) {
        Ok(query) => query,
        Err(message) => return error_body(StatusCode::BAD_REQUEST, message),
    };

    let outcome = tokio::task::spawn_blocking(move || {
        execute_search(&query, &ctx.index, ctx.embedder.as_ref())
    })
    .await;

    match outcome {
        Ok(Ok(outcome)) => Json(outcome).into_response(),
        Ok(Err(e @ Error::Pattern { .. })) => error_body(StatusCode::OK, e.to_string()),
        Ok(Err(e)) => {
            tracing::error!("search failed: {e}");
            error_body(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
        Err(e) => {
            tracing::error!("search task failed: {e}");
            error_body(StatusCode::INTERNAL_SERVER_ERROR, "search task failed")
        }
    }
}

/// GET /api/stats
async fn stats(State(ctx): State<Arc<CatalogContext>>) -> Json<Stats> {
    Json(ctx.index.stats())
}

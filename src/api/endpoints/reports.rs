//! Report retrieval endpoints.

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::report::ReportStore;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestReportResponse {
    pub latest_report_file: Option<String>,
    pub all_report_files: Vec<String>,
}

/// `GET /api/latest-report` — newest report plus the full listing.
pub async fn latest(
    State(ctx): State<ApiContext>,
) -> Result<Json<LatestReportResponse>, ApiError> {
    let all_report_files = ctx.reports.list()?;
    let latest_report_file = all_report_files.first().cloned();
    Ok(Json(LatestReportResponse {
        latest_report_file,
        all_report_files,
    }))
}

/// `GET /api/reports/:filename` — raw report content, caching
/// disabled so a viewer always sees the freshly generated document.
pub async fn fetch(
    State(ctx): State<ApiContext>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    // Names are validated against the fixed convention before any
    // filesystem access.
    if !ReportStore::is_valid_report_name(&filename) {
        return Err(ApiError::BadRequest("Invalid report file name".into()));
    }

    let Some(html) = ctx.reports.read(&filename)? else {
        return Err(ApiError::NotFound(format!("Report {filename} not found")));
    };

    Ok((
        [
            (header::CONTENT_TYPE, "text/html; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache, no-store, must-revalidate"),
            (header::PRAGMA, "no-cache"),
            (header::EXPIRES, "0"),
        ],
        html,
    )
        .into_response())
}

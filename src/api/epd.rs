use axum::extract::{FromRequest, Multipart, Path, Query, Request, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{Error, Result};
use crate::scan::{self, table, ScanSummary};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ScanRequest {
    #[serde(default)]
    pub product_ids: Vec<Value>,
}

/// Ids may arrive as JSON strings or numbers.
fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

async fn ids_from_upload(mut multipart: Multipart) -> Result<Vec<String>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::Validation(format!("Invalid upload: {e}")))?
    {
        if field.name() == Some("file") {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| Error::Validation(format!("Invalid upload: {e}")))?;
            return table::parse_ids(&bytes);
        }
    }
    Err(Error::Validation("Missing file field 'file'".to_string()))
}

/// POST /api/epd/scan - multipart CSV upload (field `file`) or JSON
/// `{product_ids: [...]}`.
pub async fn create_scan(State(state): State<AppState>, request: Request) -> Result<Json<Value>> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.to_ascii_lowercase().starts_with("multipart/form-data"));

    let raw_ids = if is_multipart {
        let multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|e| Error::Validation(e.body_text()))?;
        ids_from_upload(multipart).await?
    } else {
        let Json(body) = Json::<ScanRequest>::from_request(request, &state).await?;
        body.product_ids.iter().filter_map(id_text).collect()
    };

    let ids = scan::normalize_ids(&raw_ids, state.config.scan.max_ids)?;
    let (stored, rows) = scan::run_scan(&state.catalog, &ids, &state.config.scan);
    let summary = ScanSummary::of(&stored);
    state.scans.append(stored)?;

    Ok(Json(json!({
        "success": true,
        "summary": summary,
        "results": rows,
    })))
}

/// GET /api/epd/scan/{id}
pub async fn get_scan(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Value>> {
    let scan = state.scans.get(&id)?;
    Ok(Json(json!({
        "scan_id": scan.scan_id,
        "created_at": scan.created_at.to_rfc3339(),
        "source": scan.source,
        "counts": scan.counts,
        "results": scan.results,
    })))
}

#[derive(Debug, Deserialize)]
pub struct ExportParams {
    pub format: Option<String>,
}

/// GET /api/epd/export/{id}?format=csv
pub async fn export_scan(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<ExportParams>,
) -> Result<Response> {
    table::check_format(params.format.as_deref())?;
    let scan = state.scans.get(&id)?;
    let body = table::export_csv(&scan)?;
    let disposition = format!("attachment; filename=epd_scan_{}.csv", scan.scan_id);

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

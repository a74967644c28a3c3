//! HTTP handler functions for the nitrogen map API.

use actix_web::{HttpResponse, web};
use nitrogen_map_server_models::{ApiError, ApiHealth, ApiReload, CheckAreaResponse};
use nitrogen_map_spatial::QueryGeometry;

use crate::AppState;

/// `GET /api/health`
pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        status: "API is running".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        field_count: state.dataset.snapshot().len(),
    })
}

/// Parses a request body into a query geometry.
fn parse_query(body: &[u8]) -> Result<QueryGeometry, String> {
    let value = serde_json::from_slice::<serde_json::Value>(body).map_err(|e| e.to_string())?;
    QueryGeometry::from_json_value(value).map_err(|e| e.to_string())
}

/// `POST /api/check-area`
///
/// Returns every field whose boundary intersects the posted `Polygon` or
/// `MultiPolygon`.
pub async fn check_area(state: web::Data<AppState>, body: web::Bytes) -> HttpResponse {
    let geometry = match parse_query(&body) {
        Ok(geometry) => geometry,
        Err(e) => {
            log::debug!("Rejected check-area request: {e}");
            return HttpResponse::BadRequest().json(ApiError {
                detail: format!("Invalid GeoJSON: {e}"),
            });
        }
    };

    let index = state.dataset.snapshot();
    let outcome = index.query(&geometry);

    HttpResponse::Ok().json(CheckAreaResponse::from_matches(outcome.matches))
}

/// `POST /api/reload`
///
/// Rebuilds the index from the dataset file.
pub async fn reload(state: web::Data<AppState>) -> HttpResponse {
    let dataset = state.clone();
    match web::block(move || dataset.dataset.reload()).await {
        Ok(Ok(index)) => HttpResponse::Ok().json(ApiReload {
            dataset: state.dataset.path().display().to_string(),
            field_count: index.len(),
        }),
        Ok(Err(e)) => {
            log::error!("Failed to reload dataset: {e}");
            HttpResponse::InternalServerError().json(ApiError {
                detail: e.to_string(),
            })
        }
        Err(e) => {
            log::error!("Reload task failed: {e}");
            HttpResponse::InternalServerError().json(ApiError {
                detail: "Reload task failed".to_string(),
            })
        }
    }
}

//! HTTP handlers for the vigil server.

use actix_web::{HttpResponse, Responder, get, post, web};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{OpenApi, ToSchema};
use vigil_core::{Analyzer, ScanReport, StdFileSystem};

use crate::openapi::ApiDoc;

/// Shared application state for handlers.
#[derive(Clone)]
pub struct AppState {
    /// Fully wired analyzer shared across requests.
    ///
    /// Built once before the runtime starts: its blocking HTTP clients must
    /// not be constructed inside the Actix runtime.
    pub analyzer: Arc<Analyzer<StdFileSystem>>,
}

/// Request payload for a scan.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ScanRequest {
    /// Repository URL or local path to scan.
    pub target: String,
}

/// Health-check payload.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Static status marker.
    pub status: String,
}

/// Error payload for failed requests.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Human-readable error description.
    pub error: String,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse)
    ),
    tag = "system"
)]
#[get("/health")]
/// Static health check.
pub async fn health() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok".to_string(),
    })
}

#[utoipa::path(
    post,
    path = "/scan",
    request_body = ScanRequest,
    responses(
        (status = 200, description = "Scan completed", body = ScanReport),
        (status = 400, description = "Missing target", body = ErrorResponse),
        (status = 500, description = "Scan failed", body = ErrorResponse)
    ),
    tag = "scan"
)]
#[post("/scan")]
/// Run a full scan of a repository URL or local directory.
pub async fn scan(state: web::Data<AppState>, payload: web::Json<ScanRequest>) -> impl Responder {
    let target = payload.target.trim().to_string();
    if target.is_empty() {
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: "target is required".to_string(),
        });
    }

    let analyzer = state.analyzer.clone();
    let result = web::block(move || analyzer.scan(&target)).await;

    match result {
        Ok(Ok(report)) => HttpResponse::Ok().json(report),
        Ok(Err(err)) => {
            log::error!("scan failed: {err}");
            HttpResponse::InternalServerError().json(ErrorResponse {
                error: err.to_string(),
            })
        }
        Err(err) => {
            log::error!("scan worker failed: {err}");
            HttpResponse::InternalServerError().json(ErrorResponse {
                error: err.to_string(),
            })
        }
    }
}

#[utoipa::path(
    get,
    path = "/openapi.json",
    responses(
        (status = 200, description = "OpenAPI document")
    ),
    tag = "system"
)]
#[get("/openapi.json")]
/// Serve the OpenAPI document.
pub async fn openapi_json() -> impl Responder {
    HttpResponse::Ok().json(ApiDoc::openapi())
}

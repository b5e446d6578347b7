use crate::context::ExecutionContext;
use crate::converter::{
    Acceptance, CompletionHandle, ConversionRequest, ConversionResult, PdfConverter,
};
use crate::error::{AppError, Result};
use crate::page_size::MediaSize;
use axum::{
    extract::{rejection::JsonRejection, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

pub struct AppState {
    pub converter: PdfConverter,
    pub context: ExecutionContext,
    pub output_dir: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertBody {
    pub html: Option<String>,
    pub file_name: Option<String>,
    #[serde(default)]
    pub base64: bool,
    pub base_url: Option<String>,
    pub page_size: Option<String>,
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/convert", post(convert_handler))
        .route("/health", get(health_handler))
        .route("/info", get(info_handler))
        .route("/", get(info_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Convert an HTML document into a PDF file inside the output directory
pub async fn convert_handler(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<ConvertBody>, JsonRejection>,
) -> Result<Json<ConversionResult>> {
    let Json(body) = payload.map_err(|e| AppError::InvalidArgument(e.body_text()))?;

    let output_file = body
        .file_name
        .as_deref()
        .map(|name| output_path(&state.output_dir, name))
        .transpose()?;

    info!(
        file = ?output_file,
        page_size = body.page_size.as_deref().unwrap_or("default"),
        base64 = body.base64,
        "Received conversion request"
    );

    let request = ConversionRequest {
        html: body.html,
        output_file,
        encode_base64: body.base64,
        base_url: body.base_url,
        page_size: body.page_size,
    };

    let (handle, completion) = CompletionHandle::channel();
    let acceptance = state
        .converter
        .convert(Some(&state.context), request, handle)?;
    if acceptance == Acceptance::Dropped {
        return Err(AppError::Busy);
    }

    match completion.await {
        Ok(outcome) => Ok(Json(outcome?)),
        Err(_) => Err(AppError::Internal(
            "conversion ended without a result".to_string(),
        )),
    }
}

/// Health check endpoint
pub async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let job = state.converter.snapshot().map(|job| {
        json!({
            "id": job.id.to_string(),
            "file": job.output_file.display().to_string(),
            "pageSize": job.media_size.id(),
            "base64": job.encode_base64,
            "phase": job.phase.as_str(),
        })
    });

    Json(json!({
        "status": "healthy",
        "service": "pdfpress",
        "busy": job.is_some(),
        "job": job,
    }))
}

/// Information endpoint - lists page sizes and the request format
pub async fn info_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let page_sizes: Vec<&str> = MediaSize::ALL.iter().map(|s| s.id()).collect();

    Json(json!({
        "service": "pdfpress",
        "version": env!("CARGO_PKG_VERSION"),
        "engine": format!("{:?}", state.converter.engine().engine_type()),
        "default_page_size": MediaSize::DEFAULT.id(),
        "page_sizes": page_sizes,
        "endpoints": {
            "convert": {
                "path": "/convert",
                "method": "POST",
                "description": "Render an HTML document to a PDF file. Only one conversion runs at a time; a request arriving meanwhile gets 409.",
                "content_type": "application/json",
                "fields": {
                    "html": "HTML document to render (required)",
                    "fileName": "Name of the PDF file to write in the output directory (required)",
                    "base64": "Boolean - also return the file as base64 (optional)",
                    "baseUrl": "Base URL for relative resources (optional)",
                    "pageSize": "Page size identifier, e.g. 'ISO_A4' (optional)"
                }
            },
            "health": {
                "path": "/health",
                "method": "GET",
                "description": "Health check endpoint"
            },
            "info": {
                "path": "/info",
                "method": "GET",
                "description": "Service information and supported page sizes"
            }
        }
    }))
}

/// Place `name` inside `dir`. Only a single plain file name is accepted.
fn output_path(dir: &Path, name: &str) -> Result<PathBuf> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(file)), None) => Ok(dir.join(file)),
        _ => Err(AppError::InvalidArgument(format!(
            "fileName must be a plain file name, got {:?}",
            name
        ))),
    }
}

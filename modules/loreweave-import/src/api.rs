//! HTTP surface: one form-encoded import endpoint plus a health probe.
//!
//! POST /api/imports takes the import form, runs the pipeline, and answers
//! with a redirect to the new article. Errors map to plain-text responses
//! with the status the error carries.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use ai_client::{CliGenerator, Gemini, TextGenerator};
use loreweave_common::config::ServiceConfig;
use loreweave_common::error::ImportError;
use loreweave_common::types::EntityKind;

use crate::pipeline::{ImportRequest, Importer};
use crate::resolver::PageRef;

pub struct AppState {
    pub importer: Importer,
    pub config: ServiceConfig,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(health))
        .route("/api/imports", post(create_import))
        .with_state(state)
        .layer(
            tower_http::trace::TraceLayer::new_for_http().make_span_with(
                |request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                },
            ),
        )
}

async fn health() -> &'static str {
    "ok"
}

/// The import form, exactly as the editor UI posts it. Unchecked boxes are
/// simply absent, so every toggle is optional with an explicit default.
#[derive(Debug, Deserialize)]
struct ImportForm {
    workspace_id: String,
    lang: String,
    title: Option<String>,
    page_id: Option<u64>,
    kind: Option<String>,
    output_lang: Option<String>,
    generate: Option<String>,
    aggregate: Option<String>,
    import_media: Option<String>,
    publish: Option<String>,
    provider: Option<String>,
    model: Option<String>,
    api_key: Option<String>,
    prompt_template: Option<String>,
    max_media: Option<usize>,
    max_media_bytes: Option<u64>,
}

async fn create_import(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<ImportForm>,
) -> Response {
    let user_id = match user_from_headers(&headers) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let workspace_id = match Uuid::parse_str(form.workspace_id.trim()) {
        Ok(id) => id,
        Err(_) => {
            return (StatusCode::BAD_REQUEST, "invalid workspace_id".to_string()).into_response()
        }
    };
    let page = match page_ref(&form) {
        Some(page) => page,
        None => {
            return (
                StatusCode::BAD_REQUEST,
                "title or page_id is required".to_string(),
            )
                .into_response()
        }
    };

    let generator = match build_generator(&state.config, &form) {
        Ok(generator) => generator,
        Err((status, message)) => return (status, message).into_response(),
    };

    let request = ImportRequest {
        workspace_id,
        user_id,
        lang: form.lang.trim().to_lowercase(),
        page,
        kind: EntityKind::from_str_loose(form.kind.as_deref().unwrap_or("")),
        output_lang: form
            .output_lang
            .as_deref()
            .map(|l| l.trim().to_lowercase())
            .filter(|l| !l.is_empty()),
        generate: flag(&form.generate, true),
        aggregate: flag(&form.aggregate, true),
        import_media: flag(&form.import_media, true),
        publish: flag(&form.publish, false),
        template: form.prompt_template.clone().filter(|t| !t.trim().is_empty()),
        max_media_candidates: form.max_media,
        max_media_bytes: form.max_media_bytes,
    };

    match state.importer.run(generator, request).await {
        Ok(report) => Redirect::to(&format!("/articles/{}", report.article_id)).into_response(),
        Err(err) => error_response(err),
    }
}

fn user_from_headers(headers: &HeaderMap) -> Result<Uuid, Response> {
    let value = headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    Uuid::parse_str(value.trim()).map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            "missing or invalid x-user-id header".to_string(),
        )
            .into_response()
    })
}

fn page_ref(form: &ImportForm) -> Option<PageRef> {
    if let Some(id) = form.page_id {
        return Some(PageRef::Id(id));
    }
    let title = form.title.as_deref().unwrap_or("").trim();
    (!title.is_empty()).then(|| PageRef::Title(title.to_string()))
}

/// Checkbox-style form values. Absent means `default`.
fn flag(value: &Option<String>, default: bool) -> bool {
    match value.as_deref().map(str::trim) {
        None | Some("") => default,
        Some(v) => matches!(
            v.to_ascii_lowercase().as_str(),
            "1" | "true" | "on" | "yes"
        ),
    }
}

/// Builds the generation backend for one request. Form fields override the
/// service defaults; `none` disables generation outright.
fn build_generator(
    config: &ServiceConfig,
    form: &ImportForm,
) -> Result<Option<Arc<dyn TextGenerator>>, (StatusCode, String)> {
    let provider = form.provider.as_deref().map(str::trim).unwrap_or("gemini");
    let model = form
        .model
        .clone()
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| config.gemini_model.clone());

    match provider {
        "none" => Ok(None),
        "gemini" => {
            let Some(key) = form
                .api_key
                .clone()
                .filter(|k| !k.trim().is_empty())
                .or_else(|| config.gemini_api_key.clone())
            else {
                return Ok(None);
            };
            Ok(Some(Arc::new(Gemini::new(key, model))))
        }
        "gemini-cli" => {
            let mut generator = CliGenerator::new(config.cli_binary.clone(), model)
                .with_timeout(Duration::from_secs(config.cli_timeout_secs));
            if let Some(key) = form
                .api_key
                .clone()
                .filter(|k| !k.trim().is_empty())
                .or_else(|| config.gemini_api_key.clone())
            {
                generator = generator.with_api_key(key);
            }
            if let Some(path) = &config.cli_credential_file {
                generator = generator.with_credential_file(path.clone());
            }
            Ok(Some(Arc::new(generator)))
        }
        other => Err((
            StatusCode::BAD_REQUEST,
            format!("unknown provider '{other}'"),
        )),
    }
}

fn error_response(err: ImportError) -> Response {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        warn!(error = %err, "import failed");
    }
    (status, err.to_string()).into_response()
}

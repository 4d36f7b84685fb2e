//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::documents::{build_corpus, export_document, save_copy, ExportError};
use crate::web::protocol::{
    CorpusFileView, ExportRequest, FileView, GenerateRequest, GenerateResponse, HealthResponse,
    IndexResponse, LimitsView, MessageResponse, OptionsView, RemoveResponse, StatsView,
    UploadResponse, WordsInput,
};
use crate::web::session::expired_session_cookie;
use crate::web::state::{AppState, BucketContext};
use axum::{
    extract::{Extension, Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
};
use bytes::Bytes;
use chrono::{SecondsFormat, Utc};
use std::sync::Arc;
use summarizer_core::{
    BucketTotals, FileEntry, GenerationOptions, GenerationSource, OutputFormat, RawOptions,
};
use tracing::{error, info, warn};
use utoipa::OpenApi;
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        index_handler,
        upload_handler,
        remove_handler,
        reset_handler,
        generate_handler,
        export_handler,
        health_handler,
        healthz_handler,
        privacy_delete_handler,
    ),
    components(
        schemas(
            IndexResponse, FileView, LimitsView, StatsView, OptionsView, UploadResponse,
            RemoveResponse, GenerateRequest, WordsInput, GenerateResponse, CorpusFileView,
            ExportRequest, MessageResponse, HealthResponse
        )
    ),
    tags(
        (name = "Document Summarizer API", description = "Upload documents, generate summaries and export them.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Helpers
//=========================================================================================

type HandlerError = (StatusCode, String);

/// Runs filesystem or document work off the async workers.
async fn blocking<T, F>(task: F) -> Result<T, HandlerError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task).await.map_err(|e| {
        error!("Blocking task failed: {:?}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error".to_string(),
        )
    })
}

async fn list_bucket(state: &AppState, bucket_id: Uuid) -> Result<Vec<FileEntry>, HandlerError> {
    let storage = state.storage.clone();
    let files = blocking(move || storage.list_files(bucket_id)).await?;
    Ok(files.unwrap_or_else(|e| {
        warn!("Failed to list bucket {}: {}", bucket_id, e);
        Vec::new()
    }))
}

/// Rescans the bucket and mirrors the totals into the metadata row.
async fn refresh_totals(state: &AppState, bucket_id: Uuid) -> Result<BucketTotals, HandlerError> {
    let totals = BucketTotals::from_entries(&list_bucket(state, bucket_id).await?);
    if let Err(e) = state.metadata.record_totals(bucket_id, totals).await {
        warn!("Failed to record bucket totals: {:?}", e);
    }
    Ok(totals)
}

fn current_options(state: &AppState, raw: &RawOptions) -> GenerationOptions {
    GenerationOptions::from_raw(raw, &state.config.allowed_languages)
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Describe the caller's bucket: files, limits, options and the last result.
#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Current bucket state", body = IndexResponse),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn index_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<BucketContext>,
) -> Result<impl IntoResponse, HandlerError> {
    let files = list_bucket(&state, ctx.bucket_id).await?;
    let session = state.sessions.get(ctx.bucket_id).await;
    let options = current_options(&state, &session.options);

    Ok(Json(IndexResponse {
        bucket_id: ctx.bucket_id,
        stats: BucketTotals::from_entries(&files).into(),
        files: files.iter().map(FileView::from).collect(),
        limits: LimitsView::from(&state.config.quotas),
        options: OptionsView::from(&options),
        languages: state.config.allowed_languages.clone(),
        result_text: session.last_result,
        llm_available: state.summarizer.has_model(),
    }))
}

/// Upload one or more documents.
///
/// Accepts a multipart/form-data request; every part carrying a file name is
/// treated as an upload (the form field is conventionally named `files`).
/// Refused files are reported individually and never fail the request.
#[utoipa::path(
    post,
    path = "/upload",
    request_body(content_type = "multipart/form-data", description = "The documents to upload (pdf, docx, txt)."),
    responses(
        (status = 200, description = "Per-file outcome of the upload", body = UploadResponse),
        (status = 400, description = "Malformed multipart body"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn upload_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<BucketContext>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, HandlerError> {
    let mut parts: Vec<(String, Bytes)> = Vec::new();
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            format!("Failed to read multipart data: {}", e),
        )
    })? {
        let Some(name) = field.file_name().map(str::to_string).filter(|n| !n.is_empty()) else {
            continue;
        };
        let data = field.bytes().await.map_err(|e| {
            (
                StatusCode::BAD_REQUEST,
                format!("Failed to read file bytes: {}", e),
            )
        })?;
        parts.push((name, data));
    }

    let mut accepted = Vec::new();
    let mut rejected = Vec::new();
    for (name, data) in parts {
        let storage = state.storage.clone();
        let bucket_id = ctx.bucket_id;
        match blocking(move || storage.store_file(bucket_id, &data, &name)).await? {
            Ok(entry) => accepted.push(FileView::from(&entry)),
            Err(rejection) => {
                info!("Upload refused: {}", rejection);
                rejected.push(rejection.to_string());
            }
        }
    }

    let totals = refresh_totals(&state, ctx.bucket_id).await?;
    let message = match (accepted.len(), rejected.len()) {
        (0, 0) => "No files were provided.".to_string(),
        (0, _) => "No valid files uploaded.".to_string(),
        (n, _) => format!("{} file(s) uploaded.", n),
    };

    Ok(Json(UploadResponse {
        accepted,
        rejected,
        stats: totals.into(),
        message,
    }))
}

/// Remove one uploaded file from the bucket.
#[utoipa::path(
    post,
    path = "/remove/{file_id}",
    params(
        ("file_id" = String, Path, description = "The id of the file, as listed by `GET /`.")
    ),
    responses(
        (status = 200, description = "Outcome of the removal", body = RemoveResponse),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn remove_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<BucketContext>,
    Path(file_id): Path<String>,
) -> Result<impl IntoResponse, HandlerError> {
    let storage = state.storage.clone();
    let bucket_id = ctx.bucket_id;
    let id = file_id.clone();
    let removed = match blocking(move || storage.remove_file(bucket_id, &id)).await? {
        Ok(removed) => removed,
        Err(e) => {
            error!("Failed to remove file: {}", e);
            false
        }
    };

    let totals = refresh_totals(&state, ctx.bucket_id).await?;
    Ok(Json(RemoveResponse {
        removed,
        file_id,
        stats: totals.into(),
        message: if removed { "File removed." } else { "File not found." }.to_string(),
    }))
}

/// Erase the bucket, forget the session and expire the cookie.
#[utoipa::path(
    post,
    path = "/reset",
    responses(
        (status = 200, description = "Session and uploads reset", body = MessageResponse)
    )
)]
pub async fn reset_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<BucketContext>,
) -> Result<impl IntoResponse, HandlerError> {
    let storage = state.storage.clone();
    let bucket_id = ctx.bucket_id;
    if let Err(e) = blocking(move || storage.erase_bucket(bucket_id)).await? {
        error!("Failed to erase bucket during reset: {}", e);
    }
    if let Err(e) = state
        .metadata
        .record_totals(ctx.bucket_id, BucketTotals::default())
        .await
    {
        warn!("Failed to record bucket totals: {:?}", e);
    }
    state.sessions.remove(ctx.bucket_id).await;

    Ok((
        [(header::SET_COOKIE, expired_session_cookie(state.config.secure_cookies))],
        Json(MessageResponse {
            ok: true,
            message: "Session and uploads reset.".to_string(),
        }),
    ))
}

/// Generate a document from the bucket's uploads.
///
/// Missing options are taken from the previous generation of the session. The
/// result is stored in the session so it can be exported later.
#[utoipa::path(
    post,
    path = "/generate",
    request_body = GenerateRequest,
    responses(
        (status = 200, description = "Generated text", body = GenerateResponse),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn generate_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<BucketContext>,
    Json(req): Json<GenerateRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let previous = state.sessions.get(ctx.bucket_id).await.options;
    let options = current_options(&state, &req.into_raw().or(&previous));

    let files = list_bucket(&state, ctx.bucket_id).await?;
    let bucket_dir = state.storage.bucket_dir(ctx.bucket_id);
    let max_chars = state.config.corpus_max_chars;
    let corpus = blocking(move || build_corpus(&bucket_dir, &files, max_chars)).await?;
    if corpus.is_empty() {
        info!("Generating without readable sources.");
    }

    let generation = state.summarizer.generate(&corpus.text, &options).await;
    let (source, fallback_reason) = match &generation.source {
        GenerationSource::Model => ("model", None),
        GenerationSource::Fallback { reason } => ("fallback", Some(reason.clone())),
    };

    let stored_text = generation.text.clone();
    let stored_options = options.to_raw();
    state
        .sessions
        .update(ctx.bucket_id, move |data| {
            data.options = stored_options;
            data.last_result = Some(stored_text);
        })
        .await;

    Ok(Json(GenerateResponse {
        result_text: generation.text,
        source: source.to_string(),
        fallback_reason,
        filename: format!("{}.{}", options.base_filename(), options.output.extension()),
        options: OptionsView::from(&options),
        corpus_chars: corpus.text.chars().count(),
        corpus_files: corpus.files.iter().map(CorpusFileView::from).collect(),
        message: "Generated. Review the result, then export it.".to_string(),
    }))
}

/// Download a generated (or edited) text as TXT, DOCX or PDF.
#[utoipa::path(
    post,
    path = "/export",
    request_body = ExportRequest,
    responses(
        (status = 200, description = "The exported file as an attachment"),
        (status = 400, description = "Nothing to export"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn export_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<BucketContext>,
    Json(req): Json<ExportRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let session = state.sessions.get(ctx.bucket_id).await;
    let text = req
        .result_text
        .filter(|t| !t.trim().is_empty())
        .or(session.last_result)
        .unwrap_or_default();

    let mut raw = session.options;
    if req.output.is_some() {
        raw.output = req.output;
    }
    let options = current_options(&state, &raw);
    let format: OutputFormat = options.output;

    let font = state.pdf_font.clone();
    let file = blocking(move || export_document(&text, &options, format, &font))
        .await?
        .map_err(|e| match e {
            ExportError::Empty => (StatusCode::BAD_REQUEST, "Nothing to export.".to_string()),
            other => {
                error!("Export failed: {}", other);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to build the export".to_string(),
                )
            }
        })?;

    let output_root = state.storage.output_root().to_path_buf();
    let bucket_id = ctx.bucket_id;
    let copy = file.clone();
    if let Err(e) = blocking(move || save_copy(&output_root, bucket_id, &copy)).await? {
        warn!("Could not keep a copy of the export: {}", e);
    }

    info!("Exported {} ({} bytes).", file.filename, file.bytes.len());
    Ok((
        [
            (header::CONTENT_TYPE, file.mime_type().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file.filename),
            ),
        ],
        file.bytes,
    ))
}

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "The service is up", body = HealthResponse)
    )
)]
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        time: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    })
}

/// Liveness probe, alias of `/health`.
#[utoipa::path(
    get,
    path = "/healthz",
    responses(
        (status = 200, description = "The service is up", body = HealthResponse)
    )
)]
pub async fn healthz_handler() -> Json<HealthResponse> {
    health_handler().await
}

/// Delete everything stored for the caller and mark the metadata row deleted.
#[utoipa::path(
    post,
    path = "/privacy/delete",
    responses(
        (status = 200, description = "Data deleted", body = MessageResponse)
    )
)]
pub async fn privacy_delete_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<BucketContext>,
) -> Result<impl IntoResponse, HandlerError> {
    let storage = state.storage.clone();
    let bucket_id = ctx.bucket_id;
    if let Err(e) = blocking(move || storage.erase_bucket(bucket_id)).await? {
        error!("Failed to erase bucket during privacy deletion: {}", e);
    }
    if let Err(e) = state.metadata.mark_deleted(ctx.bucket_id).await {
        warn!("Failed to mark session metadata deleted: {:?}", e);
    }
    state.sessions.remove(ctx.bucket_id).await;
    info!("Privacy deletion completed for a bucket.");

    Ok((
        [(header::SET_COOKIE, expired_session_cookie(state.config.secure_cookies))],
        Json(MessageResponse {
            ok: true,
            message: "Your files and session data have been deleted.".to_string(),
        }),
    ))
}

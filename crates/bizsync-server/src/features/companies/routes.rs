use axum::{
    extract::{Multipart, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bizsync_common::types::Strategy;

use super::types::{CandidateQuery, ReconcileRequest, ReconcileResponse, UploadParams};
use crate::api::response::ApiResponse;
use crate::error::{ApiResult, AppError};
use crate::features::FeatureState;
use crate::queue::enqueue;

pub fn companies_routes() -> Router<FeatureState> {
    Router::new()
        .route("/", post(reconcile_company).get(find_candidates))
        .route("/upload", post(upload_companies))
}

#[tracing::instrument(skip(state, multipart))]
async fn upload_companies(
    State(state): State<FeatureState>,
    Query(params): Query<UploadParams>,
    mut multipart: Multipart,
) -> ApiResult<Response> {
    let strategy = match params.strategy.as_deref() {
        Some(s) => s.parse::<Strategy>()?,
        None => Strategy::default(),
    };

    let mut content: Option<(Vec<u8>, Option<String>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Failed to read multipart field: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let original_name = field.file_name().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Failed to read file bytes: {e}")))?;
        content = Some((data.to_vec(), original_name));
    }

    let (bytes, original_name) =
        content.ok_or_else(|| AppError::Validation("No file field found in multipart data".into()))?;
    if bytes.is_empty() {
        return Err(AppError::Validation("Uploaded file is empty".into()));
    }

    let queued = enqueue(&state.uploaded_dir, &bytes, strategy, original_name).await?;

    tracing::info!(file = %queued.file_name, %strategy, "Upload accepted");

    Ok((StatusCode::ACCEPTED, Json(ApiResponse::success(queued))).into_response())
}

#[tracing::instrument(skip(state, request), fields(name = %request.name))]
async fn reconcile_company(
    State(state): State<FeatureState>,
    Json(request): Json<ReconcileRequest>,
) -> ApiResult<Response> {
    let strategy = request.strategy.unwrap_or_default();
    let record = request.to_record();

    let outcome = state.reconciler.reconcile_one(&record, strategy).await?;

    Ok(ApiResponse::success(ReconcileResponse { outcome, strategy }).into_response())
}

#[tracing::instrument(skip(state))]
async fn find_candidates(
    State(state): State<FeatureState>,
    Query(query): Query<CandidateQuery>,
) -> ApiResult<Response> {
    let name = query.name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("name is required".into()));
    }
    let zip = query.zip.as_deref().map(str::trim).filter(|z| !z.is_empty());

    let candidates = state.reconciler.find_candidates(name, zip).await?;
    let count = candidates.len();

    Ok(
        ApiResponse::success_with_meta(candidates, serde_json::json!({ "count": count }))
            .into_response(),
    )
}

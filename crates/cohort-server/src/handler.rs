//! Request handlers. Each one unpacks its request, calls the service and
//! serializes the answer; errors become JSON bodies via [`ServerError`].

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use cohort_orchestrator::{
    BatchTransformation, CohortService, DistributionRecord, ExceptionEntry, FileStatus, FileType,
    NewDistributionRecord, NewException, ProcessFileReport, RecordStatus, Resolution,
    TransformationOutcome,
};
use cohort_types::{DistributionId, ExceptionId, FileId, ParticipantKey, RequestId};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{ServerError, ServerResult};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<CohortService>,
}

impl AppState {
    pub fn new(service: Arc<CohortService>) -> Self {
        Self { service }
    }
}

// ---------------------------------------------------------------------------
// Request and response bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ProcessFileRequest {
    pub file_path: String,
    pub file_type: String,
}

#[derive(Debug, Deserialize)]
pub struct ParticipantRequest {
    pub nhs_number: ParticipantKey,
    /// Restrict validation to these rules.
    #[serde(default)]
    pub rules: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub nhs_numbers: Vec<ParticipantKey>,
}

#[derive(Debug, Serialize)]
pub struct ValidateBatchResponse<T> {
    pub results: BTreeMap<ParticipantKey, T>,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
}

#[derive(Debug, Deserialize)]
pub struct CreateDistributionRequest {
    pub records: Vec<NewDistributionRecord>,
}

#[derive(Debug, Serialize)]
pub struct CreatedResponse<T> {
    pub ids: Vec<T>,
    pub count: usize,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExtractRequest {
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct ReplayRequest {
    pub request_id: String,
}

#[derive(Debug, Serialize)]
pub struct ExtractionResponse {
    pub request_id: RequestId,
    pub count: usize,
    pub records: Vec<DistributionRecord>,
}

#[derive(Debug, Deserialize)]
pub struct CreateExceptionsRequest {
    pub exceptions: Vec<NewException>,
}

#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    pub nhs_number: ParticipantKey,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

pub async fn health(State(state): State<AppState>) -> ServerResult<Json<Value>> {
    Ok(Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "pending_distribution": state.service.pending_distribution()?,
    })))
}

pub async fn process_file(
    State(state): State<AppState>,
    Json(request): Json<ProcessFileRequest>,
) -> ServerResult<Json<ProcessFileReport>> {
    let file_type: FileType = request.file_type.parse()?;
    let report = state.service.process_file(&request.file_path, file_type).await?;
    Ok(Json(report))
}

pub async fn file_status(
    State(state): State<AppState>,
    Path(file_id): Path<u64>,
) -> ServerResult<Json<FileStatus>> {
    Ok(Json(state.service.file_status(FileId::new(file_id)).await?))
}

pub async fn record_status(
    State(state): State<AppState>,
    Path((file_id, key)): Path<(u64, String)>,
) -> ServerResult<Json<RecordStatus>> {
    let key = parse_key(&key)?;
    Ok(Json(
        state.service.record_status(FileId::new(file_id), key).await?,
    ))
}

pub async fn validate_participant(
    State(state): State<AppState>,
    Json(request): Json<ParticipantRequest>,
) -> ServerResult<Json<Value>> {
    let validation = match &request.rules {
        Some(rules) => state.service.validate_with(request.nhs_number, rules).await?,
        None => state.service.validate(request.nhs_number).await?,
    };
    Ok(Json(json!({
        "nhs_number": validation.key,
        "passed": validation.passed(),
        "results": validation.results,
        "summary": validation.summary,
    })))
}

pub async fn validate_batch(
    State(state): State<AppState>,
    Json(request): Json<BatchRequest>,
) -> ServerResult<Json<ValidateBatchResponse<Value>>> {
    let results = state.service.validate_batch(&request.nhs_numbers).await?;
    let passed = results.values().filter(|v| v.passed()).count();
    let total = results.len();
    let results = results
        .into_iter()
        .map(|(key, validation)| {
            let body = json!({
                "passed": validation.passed(),
                "results": validation.results,
                "summary": validation.summary,
            });
            (key, body)
        })
        .collect();
    Ok(Json(ValidateBatchResponse {
        results,
        total,
        passed,
        failed: total - passed,
    }))
}

pub async fn transform_participant(
    State(state): State<AppState>,
    Json(request): Json<ParticipantRequest>,
) -> ServerResult<Json<TransformationOutcome>> {
    Ok(Json(state.service.transform(request.nhs_number).await?))
}

pub async fn transform_batch(
    State(state): State<AppState>,
    Json(request): Json<BatchRequest>,
) -> ServerResult<Json<BatchTransformation>> {
    Ok(Json(
        state.service.transform_batch(&request.nhs_numbers).await?,
    ))
}

pub async fn create_distribution(
    State(state): State<AppState>,
    Json(request): Json<CreateDistributionRequest>,
) -> ServerResult<(StatusCode, Json<CreatedResponse<DistributionId>>)> {
    let ids = state.service.create_distribution(request.records)?;
    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            count: ids.len(),
            ids,
        }),
    ))
}

pub async fn extract(
    State(state): State<AppState>,
    request: Option<Json<ExtractRequest>>,
) -> ServerResult<Json<ExtractionResponse>> {
    let limit = request.and_then(|Json(r)| r.limit);
    let extraction = state.service.extract(limit)?;
    Ok(Json(ExtractionResponse {
        request_id: extraction.request_id,
        count: extraction.len(),
        records: extraction.records,
    }))
}

pub async fn replay(
    State(state): State<AppState>,
    Json(request): Json<ReplayRequest>,
) -> ServerResult<Json<ExtractionResponse>> {
    let request_id: RequestId = request
        .request_id
        .parse()
        .map_err(|_| ServerError::BadRequest(format!("malformed request id: {}", request.request_id)))?;
    let records = state.service.replay(request_id)?;
    Ok(Json(ExtractionResponse {
        request_id,
        count: records.len(),
        records,
    }))
}

pub async fn create_exceptions(
    State(state): State<AppState>,
    Json(request): Json<CreateExceptionsRequest>,
) -> ServerResult<(StatusCode, Json<CreatedResponse<ExceptionId>>)> {
    let ids = state.service.create_exceptions(request.exceptions)?;
    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            count: ids.len(),
            ids,
        }),
    ))
}

pub async fn resolve_exceptions(
    State(state): State<AppState>,
    Json(request): Json<ResolveRequest>,
) -> ServerResult<Json<Resolution>> {
    Ok(Json(state.service.resolve_exceptions(request.nhs_number)?))
}

pub async fn list_exceptions(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ServerResult<Json<Vec<ExceptionEntry>>> {
    let key = parse_key(&key)?;
    Ok(Json(state.service.exceptions(key)?))
}

fn parse_key(raw: &str) -> ServerResult<ParticipantKey> {
    raw.parse()
        .map_err(|_| ServerError::BadRequest(format!("malformed NHS number: {raw}")))
}

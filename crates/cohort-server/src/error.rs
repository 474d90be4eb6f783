use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use cohort_orchestrator::PipelineError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// The request itself is malformed.
    #[error("invalid request: {0}")]
    BadRequest(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Pipeline(err) => match err {
                PipelineError::NotFound(_) => StatusCode::NOT_FOUND,
                PipelineError::InvalidInput(_) | PipelineError::UnsupportedType(_) => {
                    StatusCode::BAD_REQUEST
                }
                PipelineError::Conflict(_) => StatusCode::CONFLICT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Config(_) | Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use cohort_types::{FileId, Stage};

    use super::*;

    #[test]
    fn pipeline_errors_map_to_statuses() {
        let cases = [
            (PipelineError::NotFound("File 9 not found".into()), StatusCode::NOT_FOUND),
            (PipelineError::InvalidInput("empty".into()), StatusCode::BAD_REQUEST),
            (PipelineError::UnsupportedType("xlsx".into()), StatusCode::BAD_REQUEST),
            (PipelineError::Conflict("seen".into()), StatusCode::CONFLICT),
            (
                PipelineError::FatalStage {
                    stage: Stage::DemographicsLoading,
                    file_id: FileId::new(1),
                    reason: "boom".into(),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ServerError::from(err).status_code(), status);
        }
        assert_eq!(
            ServerError::BadRequest("bad id".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn pipeline_message_is_passed_through() {
        let err = ServerError::from(PipelineError::NotFound("File 9 not found".into()));
        assert_eq!(err.to_string(), "File 9 not found");
    }
}

use axum::{
    Json,
    extract::rejection::{PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::{debug, error};

use crate::error::ScoreboardError;

#[derive(Debug)]
pub struct AppError(pub ScoreboardError);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ScoreboardError::Validation(_) => StatusCode::BAD_REQUEST,
            ScoreboardError::NotFound(_) => StatusCode::NOT_FOUND,
            ScoreboardError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
        };

        let message = if status.is_server_error() {
            error!("API error: {}", self.0);
            "Score store unavailable, please retry".to_string()
        } else {
            debug!("Rejected request: {}", self.0);
            self.0.to_string()
        };

        let body = Json(serde_json::json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<ScoreboardError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl From<QueryRejection> for ScoreboardError {
    fn from(rejection: QueryRejection) -> Self {
        Self::validation(rejection.body_text())
    }
}

impl From<PathRejection> for ScoreboardError {
    fn from(rejection: PathRejection) -> Self {
        Self::validation(rejection.body_text())
    }
}

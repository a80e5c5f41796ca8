//! API error responses
//!
//! Core errors render through `AppError`'s own response. Failed mode runs
//! add the mode and stage to the error details.

use axum::{
    response::{IntoResponse, Response},
    Json,
};
use navigator_common::errors::{AppError, ErrorDetails, ErrorResponse};
use navigator_context::ModeError;

#[derive(Debug)]
pub enum ApiError {
    App(AppError),
    Mode(ModeError),
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        ApiError::App(err)
    }
}

impl From<ModeError> for ApiError {
    fn from(err: ModeError) -> Self {
        ApiError::Mode(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::App(err) => err.into_response(),
            ApiError::Mode(err) => {
                let status = err.error.status_code();
                let code = err.error.code();

                if err.error.is_server_error() {
                    tracing::error!(
                        mode = %err.mode,
                        stage = %err.stage,
                        error = %err.error,
                        status = status.as_u16(),
                        "Mode run failed"
                    );
                } else {
                    tracing::warn!(
                        mode = %err.mode,
                        stage = %err.stage,
                        error = %err.error,
                        status = status.as_u16(),
                        "Mode run rejected"
                    );
                }

                let body = ErrorResponse {
                    error: ErrorDetails {
                        code,
                        message: err.to_string(),
                        details: Some(serde_json::json!({
                            "mode": err.mode,
                            "stage": err.stage,
                        })),
                        request_id: None,
                    },
                };
                (status, Json(body)).into_response()
            }
        }
    }
}

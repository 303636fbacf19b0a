use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub msg: String,
    pub param: String,
}

impl FieldError {
    pub fn new(param: &str, msg: &str) -> Self {
        FieldError {
            msg: msg.to_string(),
            param: param.to_string(),
        }
    }
}

fn join_messages(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| e.msg.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("ValidationError: {}", join_messages(.0))]
    Validation(Vec<FieldError>),
    #[error("NotFound: {0}")]
    NotFound(&'static str),
    #[error("Unauthorized: {0}")]
    Unauthorized(&'static str),
    #[error("ServerError: {0}")]
    Server(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(vec![FieldError::new("body", &rejection.body_text())])
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            ApiError::Validation(errors) => {
                tracing::info!(?errors, "rejected invalid request");
                (status, Json(json!({ "errors": errors }))).into_response()
            }
            ApiError::NotFound(msg) | ApiError::Unauthorized(msg) => {
                tracing::info!(status = status.as_u16(), "{}", msg);
                (status, Json(json!({ "msg": msg }))).into_response()
            }
            ApiError::Server(err) => {
                tracing::error!(error = %crate::unpack_error(&*err), "request failed");
                (status, "Server Error").into_response()
            }
        }
    }
}

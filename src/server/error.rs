use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use super::dto::FailureResponse;
use crate::rules::{RejectCode, RulesReject};

/// A rejected or malformed request, carrying the requestId it must be echoed back under.
#[derive(Debug)]
pub struct ApiError {
    pub request_id: String,
    pub reject: RulesReject,
}

impl ApiError {
    pub fn new(request_id: impl Into<String>, reject: RulesReject) -> Self {
        Self {
            request_id: request_id.into(),
            reject,
        }
    }

    pub fn bad_request(request_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(
            request_id,
            RulesReject {
                code: RejectCode::InvalidAction,
                message: message.into(),
            },
        )
    }
}

fn status_for(code: RejectCode) -> StatusCode {
    match code {
        RejectCode::InvalidAction => StatusCode::BAD_REQUEST,
        RejectCode::Unauthorized => StatusCode::FORBIDDEN,
        RejectCode::InvalidState | RejectCode::NotYourTurn => StatusCode::CONFLICT,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(self.reject.code);
        let body = FailureResponse {
            request_id: self.request_id,
            code: self.reject.code,
            message: self.reject.message,
            issues: None,
        };
        (status, Json(body)).into_response()
    }
}

//! HTTP handlers and the shared response envelope.
//!
//! Every response, success or failure, is shaped as
//! `{status, success, message, data?, errors?}`.

pub mod dashboard;
pub mod health;
pub mod users;
pub mod verses;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use memverse_core::StoreError;
use memverse_scheduler::DeliveryError;
use serde::Serialize;
use serde_json::Value;
use tracing::{error, warn};

/// Message shown for any failure the user cannot fix themselves.
pub const GENERIC_FAILURE: &str = "Something went wrong, please try again later";

#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub status: u16,
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Value>,
}

/// Successful response carrying `data`.
pub struct ApiResponse<T: Serialize> {
    status: StatusCode,
    message: String,
    data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            status: StatusCode::OK,
            message: message.into(),
            data,
        }
    }

    pub fn created(message: impl Into<String>, data: T) -> Self {
        Self {
            status: StatusCode::CREATED,
            message: message.into(),
            data,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let body = Envelope {
            status: self.status.as_u16(),
            success: true,
            message: self.message,
            data: Some(self.data),
            errors: None,
        };
        (self.status, Json(body)).into_response()
    }
}

/// Failed response. Built from the domain errors below.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    errors: Option<Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            errors: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, GENERIC_FAILURE)
    }

    pub fn with_errors(mut self, errors: Value) -> Self {
        self.errors = Some(errors);
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Envelope::<Value> {
            status: self.status.as_u16(),
            success: false,
            message: self.message,
            data: None,
            errors: self.errors,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { entity, .. } => {
                ApiError::new(StatusCode::NOT_FOUND, format!("{entity} not found"))
            }
            StoreError::AlreadyExists(what) => {
                ApiError::new(StatusCode::CONFLICT, format!("{what} already exists"))
            }
            StoreError::InvalidPace(pace) => ApiError::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                format!("'{pace}' is not a valid verse pace; choose daily or weekly"),
            ),
            other => {
                error!(error = %other, "storage failure");
                ApiError::internal()
            }
        }
    }
}

impl From<DeliveryError> for ApiError {
    fn from(e: DeliveryError) -> Self {
        if e.is_user_actionable() {
            let message = match &e {
                DeliveryError::ProfileIncomplete => {
                    "Please complete your profile to receive verses".to_string()
                }
                other => other.to_string(),
            };
            return ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, message)
                .with_errors(serde_json::json!({ "code": e.code() }));
        }
        warn!(code = e.code(), "request failed: {e}");
        ApiError::internal()
    }
}

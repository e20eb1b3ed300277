//! HTTP adapter mapping for application errors.
//!
//! Every failure leaves the service as the same envelope:
//!
//! ```json
//! {"error": {"code": "not_found", "message": "Object not found", "details": {}}}
//! ```
//!
//! Typed errors always carry `details`. The two catch-all shapes
//! (`internal_error` and `http_error`) omit it so nothing internal leaks.

use actix_web::http::StatusCode;
use actix_web::http::header::{HeaderName, HeaderValue};
use actix_web::{HttpResponse, ResponseError};
use color_eyre::Report;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::domain::Error;

/// Code used for failures nobody anticipated.
pub const INTERNAL_ERROR_CODE: &str = "internal_error";

/// Message used for failures nobody anticipated.
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

/// Code used for framework-level HTTP failures.
pub const HTTP_ERROR_CODE: &str = "http_error";

/// Convenient result alias for HTTP handlers.
pub type ApiResult<T> = Result<T, ApiError>;

/// Body of the error envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Structured details; absent for catch-all responses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// `{"error": {...}}` wrapper returned for every failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// The failure.
    pub error: ErrorBody,
}

impl ErrorEnvelope {
    /// Envelope for a typed error.
    #[must_use]
    pub fn typed(error: &Error) -> Self {
        Self {
            error: ErrorBody {
                code: error.code().as_str().to_owned(),
                message: error.message().to_owned(),
                details: Some(error.details().clone()),
            },
        }
    }

    /// Envelope for an unexpected failure.
    #[must_use]
    pub fn internal() -> Self {
        Self {
            error: ErrorBody {
                code: INTERNAL_ERROR_CODE.to_owned(),
                message: INTERNAL_ERROR_MESSAGE.to_owned(),
                details: None,
            },
        }
    }

    /// Envelope for a framework HTTP failure, using the canonical reason.
    #[must_use]
    pub fn http(status: StatusCode) -> Self {
        Self {
            error: ErrorBody {
                code: HTTP_ERROR_CODE.to_owned(),
                message: status.canonical_reason().unwrap_or("Unknown").to_owned(),
                details: None,
            },
        }
    }
}

/// Catch-all 500 response.
#[must_use]
pub fn internal_response() -> HttpResponse {
    HttpResponse::InternalServerError().json(ErrorEnvelope::internal())
}

/// Framework failure response with `status`.
#[must_use]
pub fn http_error_response(status: StatusCode) -> HttpResponse {
    HttpResponse::build(status).json(ErrorEnvelope::http(status))
}

fn status_for(error: &Error) -> StatusCode {
    StatusCode::from_u16(error.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        status_for(self)
    }

    fn error_response(&self) -> HttpResponse {
        let mut builder = HttpResponse::build(self.status_code());
        for (name, value) in self.headers() {
            match (
                HeaderName::try_from(name.as_str()),
                HeaderValue::try_from(value.as_str()),
            ) {
                (Ok(name), Ok(value)) => {
                    builder.append_header((name, value));
                }
                _ => warn!(header = %name, "dropping unencodable error header"),
            }
        }
        builder.json(ErrorEnvelope::typed(self))
    }
}

/// What handlers return on failure.
///
/// Typed errors render with their own status and code. Anything else
/// travels as a [`Report`] and renders as the catch-all 500; the report is
/// logged by the error-rendering middleware, never sent to the client.
#[derive(Debug)]
pub enum ApiError {
    /// An anticipated failure with a fixed code.
    Typed(Error),
    /// An unexpected failure.
    Unhandled(Report),
}

impl ApiError {
    /// Wrap any error as an unexpected failure.
    pub fn unhandled(error: impl Into<Report>) -> Self {
        Self::Unhandled(error.into())
    }

    /// The typed error, if this is one.
    #[must_use]
    pub const fn as_typed(&self) -> Option<&Error> {
        match self {
            Self::Typed(error) => Some(error),
            Self::Unhandled(_) => None,
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Typed(error) => write!(f, "{error}"),
            Self::Unhandled(report) => write!(f, "{report}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        Self::Typed(error)
    }
}

impl From<Report> for ApiError {
    fn from(report: Report) -> Self {
        Self::Unhandled(report)
    }
}

impl From<actix_web::Error> for ApiError {
    fn from(err: actix_web::Error) -> Self {
        Self::Unhandled(Report::msg(err.to_string()))
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Typed(error) => error.status_code(),
            Self::Unhandled(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            Self::Typed(error) => error.error_response(),
            Self::Unhandled(_) => internal_response(),
        }
    }
}

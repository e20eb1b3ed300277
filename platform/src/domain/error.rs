//! Typed application errors.
//!
//! These errors are transport agnostic. The HTTP adapter in
//! [`crate::inbound::http::error`] renders them into the JSON envelope; this
//! module only fixes the taxonomy: each kind carries a status code, a stable
//! machine-readable code and a default message.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Stable machine-readable error code describing the failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Application-specific failure with a caller-chosen status.
    CustomError,
    /// The request or its payload failed validation.
    ValidationError,
    /// The requested resource does not exist.
    NotFound,
    /// Authentication failed or is missing.
    Unauthorized,
    /// Authenticated but not permitted to perform this action.
    Forbidden,
    /// The database rejected or failed an operation.
    DatabaseError,
    /// A dependency or the service itself cannot serve the request.
    ServiceUnavailable,
}

impl ErrorCode {
    /// Every code, in declaration order.
    pub const ALL: [Self; 7] = [
        Self::CustomError,
        Self::ValidationError,
        Self::NotFound,
        Self::Unauthorized,
        Self::Forbidden,
        Self::DatabaseError,
        Self::ServiceUnavailable,
    ];

    /// Wire representation of the code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CustomError => "custom_error",
            Self::ValidationError => "validation_error",
            Self::NotFound => "not_found",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::DatabaseError => "database_error",
            Self::ServiceUnavailable => "service_unavailable",
        }
    }

    /// HTTP status used when the caller does not pick one.
    #[must_use]
    pub const fn default_status(self) -> u16 {
        match self {
            Self::CustomError | Self::DatabaseError => 500,
            Self::ValidationError => 422,
            Self::NotFound => 404,
            Self::Unauthorized => 401,
            Self::Forbidden => 403,
            Self::ServiceUnavailable => 503,
        }
    }

    /// Message used when the caller does not supply one.
    #[must_use]
    pub const fn default_message(self) -> &'static str {
        match self {
            Self::CustomError => "Application error",
            Self::ValidationError => "Data validation error",
            Self::NotFound => "Object not found",
            Self::Unauthorized => "Authentication failed",
            Self::Forbidden => "Access to the resource is forbidden",
            Self::DatabaseError => "Database error",
            Self::ServiceUnavailable => "Service unavailable",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of a single request validation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// A required field is absent.
    Missing,
    /// A field is present that the target type does not accept.
    ExtraForbidden,
    /// A value has the wrong type.
    TypeError,
    /// A value has the right type but is not acceptable.
    ValueError,
    /// The body is not parseable JSON.
    JsonInvalid,
}

/// One offending field in a request validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldViolation {
    /// Location path such as `body -> email`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
    /// Failure category.
    pub kind: ViolationKind,
}

impl FieldViolation {
    /// Build a violation for `field`.
    pub fn new(field: impl Into<String>, message: impl Into<String>, kind: ViolationKind) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            kind,
        }
    }
}

/// Message used for request validation failures detected before a handler
/// runs.
pub const REQUEST_VALIDATION_MESSAGE: &str = "Validation failed";

/// Typed application error.
///
/// ## Invariants
/// - `status` and `message` are fixed by `code` except for
///   [`ErrorCode::CustomError`], where the caller chooses both.
/// - `details` defaults to an empty JSON object.
///
/// # Examples
/// ```
/// use platform_kit::domain::{Error, ErrorCode};
/// use serde_json::json;
///
/// let err = Error::not_found().with_details(json!({ "user_id": 7 }));
/// assert_eq!(err.code(), ErrorCode::NotFound);
/// assert_eq!(err.status(), 404);
/// assert_eq!(err.details()["user_id"], 7);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Error {
    status: u16,
    code: ErrorCode,
    message: String,
    details: Value,
    headers: Vec<(String, String)>,
}

impl Error {
    fn with_code(code: ErrorCode) -> Self {
        Self {
            status: code.default_status(),
            code,
            message: code.default_message().to_owned(),
            details: Value::Object(Map::new()),
            headers: Vec::new(),
        }
    }

    /// Application-specific error with an explicit status and message.
    ///
    /// # Examples
    /// ```
    /// use platform_kit::domain::{Error, ErrorCode};
    ///
    /// let err = Error::custom(409, "Order already shipped");
    /// assert_eq!(err.code(), ErrorCode::CustomError);
    /// assert_eq!(err.status(), 409);
    /// ```
    pub fn custom(status: u16, message: impl Into<String>) -> Self {
        let mut error = Self::with_code(ErrorCode::CustomError);
        error.status = status;
        error.message = message.into();
        error
    }

    /// Data validation failure (422).
    #[must_use]
    pub fn validation() -> Self {
        Self::with_code(ErrorCode::ValidationError)
    }

    /// Request validation failure listing every offending field (422).
    #[must_use]
    pub fn validation_failed(violations: Vec<FieldViolation>) -> Self {
        let mut error = Self::with_code(ErrorCode::ValidationError);
        error.message = REQUEST_VALIDATION_MESSAGE.to_owned();
        error.details = Value::Array(
            violations
                .into_iter()
                .map(|violation| {
                    serde_json::json!({
                        "field": violation.field,
                        "message": violation.message,
                        "kind": violation.kind,
                    })
                })
                .collect(),
        );
        error
    }

    /// Missing resource (404).
    #[must_use]
    pub fn not_found() -> Self {
        Self::with_code(ErrorCode::NotFound)
    }

    /// Failed or missing authentication (401).
    #[must_use]
    pub fn unauthorized() -> Self {
        Self::with_code(ErrorCode::Unauthorized)
    }

    /// Authenticated caller lacks permission (403).
    #[must_use]
    pub fn forbidden() -> Self {
        Self::with_code(ErrorCode::Forbidden)
    }

    /// Database failure (500).
    #[must_use]
    pub fn database() -> Self {
        Self::with_code(ErrorCode::DatabaseError)
    }

    /// Service or dependency unavailable (503).
    #[must_use]
    pub fn service_unavailable() -> Self {
        Self::with_code(ErrorCode::ServiceUnavailable)
    }

    /// Replace the structured details.
    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    /// Insert one key into the details object.
    ///
    /// Details that are not an object (for example a violation list) are
    /// replaced by a fresh object.
    #[must_use]
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        if !self.details.is_object() {
            self.details = Value::Object(Map::new());
        }
        if let Value::Object(map) = &mut self.details {
            map.insert(key.into(), value.into());
        }
        self
    }

    /// Attach an extra response header, such as `WWW-Authenticate`.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// HTTP status code.
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    /// Stable machine-readable error code.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        self.code
    }

    /// Human-readable message returned to clients.
    #[must_use]
    pub fn message(&self) -> &str {
        self.message.as_str()
    }

    /// Structured details returned to clients.
    #[must_use]
    pub const fn details(&self) -> &Value {
        &self.details
    }

    /// Extra response headers.
    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests;

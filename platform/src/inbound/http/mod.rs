//! HTTP inbound adapter: error rendering, request validation and wire
//! schemas.

pub mod error;
pub mod extract;
pub mod schemas;
pub mod validation;

use actix_web::{HttpRequest, HttpResponse};

pub use self::error::{ApiError, ApiResult, ErrorBody, ErrorEnvelope};
pub use self::extract::{ValidJson, ValidQuery};

/// Default service for unmatched routes.
///
/// Fails with a plain framework 404 so the error renderer produces the
/// `http_error` envelope and logs it like any other framework failure.
///
/// # Errors
///
/// Always returns a 404 error.
pub async fn fallback(req: HttpRequest) -> Result<HttpResponse, actix_web::Error> {
    Err(actix_web::error::ErrorNotFound(format!(
        "no route for {} {}",
        req.method(),
        req.path()
    )))
}

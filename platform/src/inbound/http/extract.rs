//! Extractors that name the field a request failed on.
//!
//! [`ValidJson`] and [`ValidQuery`] deserialize like `web::Json` and
//! `web::Query`, but track the path to the offending value, so a
//! validation error reads `body -> address -> zip` instead of `body`.

use actix_web::dev::Payload;
use actix_web::{FromRequest, HttpMessage, HttpRequest, web};
use futures_util::future::{LocalBoxFuture, Ready, ready};
use serde::de::DeserializeOwned;

use crate::domain::{FieldViolation, ViolationKind};

use super::validation::{
    BODY, QUERY, located, rejected, violation_from_json, violation_from_json_path,
    violation_from_message,
};

/// JSON request body with field-level validation errors.
///
/// # Examples
/// ```
/// use actix_web::HttpResponse;
/// use platform_kit::inbound::http::ValidJson;
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct Signup {
///     email: String,
/// }
///
/// async fn signup(ValidJson(form): ValidJson<Signup>) -> HttpResponse {
///     HttpResponse::Created().body(form.email)
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidJson<T>(pub T);

impl<T> ValidJson<T> {
    /// Unwrap the body.
    pub fn into_inner(self) -> T {
        self.0
    }
}

/// Query string with field-level validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidQuery<T>(pub T);

impl<T> ValidQuery<T> {
    /// Unwrap the query.
    pub fn into_inner(self) -> T {
        self.0
    }
}

fn is_json(content_type: &str) -> bool {
    content_type == "application/json" || content_type.ends_with("+json")
}

/// Deserialize a JSON body, reporting the path of the first bad value.
///
/// # Errors
///
/// Returns the violation for malformed JSON or data that does not fit `T`.
pub fn parse_json<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, FieldViolation> {
    let mut deserializer = serde_json::Deserializer::from_slice(bytes);
    let value = serde_path_to_error::deserialize(&mut deserializer)
        .map_err(|err| violation_from_json_path(&err))?;
    deserializer.end().map_err(|err| violation_from_json(&err))?;
    Ok(value)
}

/// Deserialize a query string, reporting the parameter that failed.
///
/// # Errors
///
/// Returns the violation for the first parameter that does not fit `T`.
pub fn parse_query<T: DeserializeOwned>(query: &str) -> Result<T, FieldViolation> {
    let deserializer =
        serde_urlencoded::Deserializer::new(form_urlencoded::parse(query.as_bytes()));
    serde_path_to_error::deserialize(deserializer).map_err(|err| {
        violation_from_message(&located(QUERY, err.path()), &err.inner().to_string())
    })
}

impl<T> FromRequest for ValidJson<T>
where
    T: DeserializeOwned + 'static,
{
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
        let json = is_json(req.content_type());
        let body = web::Bytes::from_request(req, payload);
        Box::pin(async move {
            if !json {
                return Err(rejected(FieldViolation::new(
                    BODY,
                    "Expected a JSON body with content type application/json",
                    ViolationKind::JsonInvalid,
                )));
            }
            let bytes = body.await?;
            parse_json(&bytes).map(Self).map_err(rejected)
        })
    }
}

impl<T> FromRequest for ValidQuery<T>
where
    T: DeserializeOwned,
{
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(parse_query(req.query_string()).map(Self).map_err(rejected))
    }
}

//! Request validation failures from actix extractors.
//!
//! JSON body, query string and path extraction errors all become a 422
//! `validation_error` listing one `{field, message, kind}` entry per problem.
//! Serde stops at the first problem, so the list has one entry today; the
//! shape leaves room for validators that report several.
//!
//! The stock `web::Json` and `web::Query` handlers only know where the
//! failure happened (`body`, `query`). The extractors in
//! [`super::extract`] also know which field, and report
//! `body -> address -> zip` or `query -> limit`.

use actix_web::error::{JsonPayloadError, PathError, QueryPayloadError};
use actix_web::{HttpRequest, web};
use serde_json::error::Category;
use serde_path_to_error::{Path, Segment};

use crate::domain::{Error, FieldViolation, ViolationKind};

pub(crate) const BODY: &str = "body";
pub(crate) const QUERY: &str = "query";
const PATH: &str = "path";

/// Join a location and a field name the way clients see it.
#[must_use]
pub fn field_path(location: &str, name: &str) -> String {
    format!("{location} -> {name}")
}

/// `location` followed by every segment of the path serde reported.
#[must_use]
pub fn located(location: &str, path: &Path) -> String {
    path.iter()
        .fold(location.to_owned(), |joined, segment| match segment {
            Segment::Seq { index } => field_path(&joined, &index.to_string()),
            Segment::Map { key } => field_path(&joined, key),
            Segment::Enum { variant } => field_path(&joined, variant),
            Segment::Unknown => joined,
        })
}

/// `location -> name`, unless `location` already ends with `name`.
fn child(location: &str, name: &str) -> String {
    if location.ends_with(&format!(" -> {name}")) {
        location.to_owned()
    } else {
        field_path(location, name)
    }
}

fn backticked(rest: &str) -> Option<&str> {
    rest.strip_prefix('`')?.split('`').next()
}

fn without_position(message: &str) -> &str {
    message
        .rsplit_once(" at line ")
        .map_or(message, |(head, _)| head)
}

/// Classify a serde data error message raised while reading `location`.
#[must_use]
pub fn violation_from_message(location: &str, message: &str) -> FieldViolation {
    let message = without_position(message);
    if let Some(name) = message.strip_prefix("missing field ").and_then(backticked) {
        return FieldViolation::new(
            child(location, name),
            "Field required",
            ViolationKind::Missing,
        );
    }
    if let Some(name) = message.strip_prefix("unknown field ").and_then(backticked) {
        return FieldViolation::new(
            child(location, name),
            "Extra inputs are not permitted",
            ViolationKind::ExtraForbidden,
        );
    }
    let kind = if message.starts_with("invalid type:") {
        ViolationKind::TypeError
    } else {
        ViolationKind::ValueError
    };
    FieldViolation::new(location, message, kind)
}

/// Classify a `serde_json` failure on the request body.
#[must_use]
pub fn violation_from_json(err: &serde_json::Error) -> FieldViolation {
    match err.classify() {
        Category::Data => violation_from_message(BODY, &err.to_string()),
        Category::Syntax | Category::Eof | Category::Io => FieldViolation::new(
            BODY,
            without_position(&err.to_string()),
            ViolationKind::JsonInvalid,
        ),
    }
}

/// Classify a `serde_json` failure on the body, naming the field it hit.
#[must_use]
pub fn violation_from_json_path(
    err: &serde_path_to_error::Error<serde_json::Error>,
) -> FieldViolation {
    match err.inner().classify() {
        Category::Data => {
            violation_from_message(&located(BODY, err.path()), &err.inner().to_string())
        }
        Category::Syntax | Category::Eof | Category::Io => violation_from_json(err.inner()),
    }
}

/// The 422 error listing `violation`.
pub(crate) fn rejected(violation: FieldViolation) -> actix_web::Error {
    Error::validation_failed(vec![violation]).into()
}

/// Error handler for `web::Json` extraction.
///
/// Oversized bodies keep their 413 and render as `http_error`.
pub fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    match err {
        JsonPayloadError::Deserialize(inner) => rejected(violation_from_json(&inner)),
        JsonPayloadError::ContentType => rejected(FieldViolation::new(
            BODY,
            "Expected a JSON body with content type application/json",
            ViolationKind::JsonInvalid,
        )),
        other => other.into(),
    }
}

/// Error handler for `web::Query` extraction.
pub fn query_error_handler(err: QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
    match err {
        QueryPayloadError::Deserialize(inner) => {
            rejected(violation_from_message(QUERY, &inner.to_string()))
        }
        other => other.into(),
    }
}

/// Error handler for `web::Path` extraction.
pub fn path_error_handler(err: PathError, _req: &HttpRequest) -> actix_web::Error {
    match err {
        PathError::Deserialize(inner) => rejected(violation_from_message(PATH, &inner.to_string())),
        other => other.into(),
    }
}

/// JSON extractor configuration using [`json_error_handler`].
#[must_use]
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(json_error_handler)
}

/// Query extractor configuration using [`query_error_handler`].
#[must_use]
pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(query_error_handler)
}

/// Path extractor configuration using [`path_error_handler`].
#[must_use]
pub fn path_config() -> web::PathConfig {
    web::PathConfig::default().error_handler(path_error_handler)
}

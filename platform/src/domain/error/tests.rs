//! Tests for the fixed error taxonomy.

use super::*;
use rstest::rstest;
use serde_json::json;

#[rstest]
#[case(Error::validation(), ErrorCode::ValidationError, 422, "validation_error")]
#[case(Error::not_found(), ErrorCode::NotFound, 404, "not_found")]
#[case(Error::unauthorized(), ErrorCode::Unauthorized, 401, "unauthorized")]
#[case(Error::forbidden(), ErrorCode::Forbidden, 403, "forbidden")]
#[case(Error::database(), ErrorCode::DatabaseError, 500, "database_error")]
#[case(
    Error::service_unavailable(),
    ErrorCode::ServiceUnavailable,
    503,
    "service_unavailable"
)]
fn fixed_kinds_carry_fixed_status_and_code(
    #[case] error: Error,
    #[case] code: ErrorCode,
    #[case] status: u16,
    #[case] wire: &str,
) {
    assert_eq!(error.code(), code);
    assert_eq!(error.status(), status);
    assert_eq!(error.code().as_str(), wire);
    assert_eq!(error.message(), code.default_message());
    assert_eq!(error.details(), &json!({}));
}

#[rstest]
fn custom_errors_keep_caller_status_and_message() {
    let error = Error::custom(409, "already shipped");
    assert_eq!(error.code(), ErrorCode::CustomError);
    assert_eq!(error.status(), 409);
    assert_eq!(error.message(), "already shipped");
}

#[rstest]
fn codes_serialise_as_snake_case() {
    let encoded: Vec<Value> = ErrorCode::ALL
        .iter()
        .map(|code| serde_json::to_value(code).expect("code serialises"))
        .collect();
    let expected: Vec<Value> = ErrorCode::ALL
        .iter()
        .map(|code| json!(code.as_str()))
        .collect();
    assert_eq!(encoded, expected);
}

#[rstest]
fn with_detail_builds_an_object() {
    let error = Error::forbidden()
        .with_detail("resource", "invoice")
        .with_detail("owner", 42);
    assert_eq!(error.details(), &json!({ "resource": "invoice", "owner": 42 }));
}

#[rstest]
fn validation_failures_list_each_field_in_order() {
    let error = Error::validation_failed(vec![
        FieldViolation::new("body -> email", "Field required", ViolationKind::Missing),
        FieldViolation::new("query -> limit", "invalid digit", ViolationKind::ValueError),
    ]);

    assert_eq!(error.status(), 422);
    assert_eq!(error.message(), REQUEST_VALIDATION_MESSAGE);
    assert_eq!(
        error.details(),
        &json!([
            { "field": "body -> email", "message": "Field required", "kind": "missing" },
            { "field": "query -> limit", "message": "invalid digit", "kind": "value_error" },
        ])
    );
}

#[rstest]
fn headers_are_kept_in_insertion_order() {
    let error = Error::unauthorized()
        .with_header("WWW-Authenticate", "Bearer")
        .with_header("Cache-Control", "no-store");
    let names: Vec<&str> = error.headers().iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, ["WWW-Authenticate", "Cache-Control"]);
}

//! Transport-agnostic building blocks: the typed error taxonomy, request
//! identifiers and entity field groups.

pub mod entity;
pub mod error;
pub mod request_id;

pub use self::error::{
    Error, ErrorCode, FieldViolation, REQUEST_VALIDATION_MESSAGE, ViolationKind,
};
pub use self::request_id::{REQUEST_ID_HEADER, RequestId};

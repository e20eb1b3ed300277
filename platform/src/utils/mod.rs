//! Small helpers shared by services: string case conversion, JSON merging
//! and encoding, date formatting and password/input hygiene.

pub mod case;
pub mod datetime;
pub mod json;
pub mod merge;
pub mod security;

pub use case::{to_camel_case, to_snake_case};
pub use datetime::{SQL_DATE_FORMAT, format_datetime, time_ago, utc_now};
pub use json::json_serialize;
pub use merge::deep_update;
pub use security::{
    PasswordError, PasswordStrength, generate_random_string, generate_secure_filename,
    hash_password, is_valid_email, sanitize_input, validate_password_strength, verify_password,
};

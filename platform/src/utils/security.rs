//! Password hashing and input hygiene.

use std::path::Path;
use std::sync::OnceLock;

use argon2::Argon2;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use regex::Regex;
use serde::Serialize;
use uuid::Uuid;

/// Shortest password [`validate_password_strength`] accepts.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Errors raised while hashing or checking passwords.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PasswordError {
    /// Hashing failed.
    #[error("password hashing failed: {0}")]
    Hash(String),
    /// The stored hash is not a valid PHC string.
    #[error("stored password hash is malformed: {0}")]
    MalformedHash(String),
}

/// Hash `password` with Argon2id and a fresh random salt.
///
/// # Errors
///
/// Returns [`PasswordError::Hash`] if the hasher rejects its input.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| PasswordError::Hash(err.to_string()))
}

/// Check `plain` against a hash produced by [`hash_password`].
///
/// # Errors
///
/// Returns [`PasswordError::MalformedHash`] when `hashed` cannot be parsed.
/// A wrong password is `Ok(false)`.
pub fn verify_password(plain: &str, hashed: &str) -> Result<bool, PasswordError> {
    let parsed =
        PasswordHash::new(hashed).map_err(|err| PasswordError::MalformedHash(err.to_string()))?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

/// URL-safe random token built from `bytes` random bytes.
///
/// The result is unpadded base64, so it is about a third longer than
/// `bytes`.
#[must_use]
pub fn generate_random_string(bytes: usize) -> String {
    let mut buf = vec![0_u8; bytes];
    rand::rngs::OsRng.fill_bytes(&mut buf);
    URL_SAFE_NO_PAD.encode(buf)
}

/// Random file name that keeps the extension of `original`.
///
/// # Examples
/// ```
/// use platform_kit::utils::generate_secure_filename;
///
/// let name = generate_secure_filename("../../etc/report.pdf");
/// assert!(name.ends_with(".pdf"));
/// assert_eq!(name.len(), 32 + ".pdf".len());
/// ```
#[must_use]
pub fn generate_secure_filename(original: &str) -> String {
    let stem = Uuid::new_v4().simple().to_string();
    match Path::new(original)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
    {
        Some(ext) => format!("{stem}.{ext}"),
        None => stem,
    }
}

/// Trim `input` and escape it for HTML.
///
/// # Examples
/// ```
/// use platform_kit::utils::sanitize_input;
///
/// assert_eq!(
///     sanitize_input("  <script>alert('!')</script> "),
///     "&lt;script&gt;alert(&#x27;!&#x27;)&lt;/script&gt;"
/// );
/// ```
#[must_use]
pub fn sanitize_input(input: &str) -> String {
    let trimmed = input.trim();
    let mut out = String::with_capacity(trimmed.len());
    for c in trimmed.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            other => out.push(other),
        }
    }
    out
}

static EMAIL_RE: OnceLock<Regex> = OnceLock::new();

fn email_regex() -> &'static Regex {
    EMAIL_RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$")
            .unwrap_or_else(|error| panic!("email regex failed to compile: {error}"))
    })
}

/// Whether `email` looks like a deliverable address.
#[must_use]
pub fn is_valid_email(email: &str) -> bool {
    email_regex().is_match(email)
}

/// Outcome of [`validate_password_strength`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PasswordStrength {
    /// True when no rule failed.
    pub valid: bool,
    /// One message per failed rule.
    pub errors: Vec<String>,
}

/// Check `password` against the length and character-class rules.
///
/// Every failed rule is reported, not just the first.
#[must_use]
pub fn validate_password_strength(password: &str) -> PasswordStrength {
    let mut errors = Vec::new();
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        errors.push(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters long"
        ));
    }
    if !password.chars().any(char::is_numeric) {
        errors.push("Password must contain at least one digit".to_owned());
    }
    if !password.chars().any(char::is_uppercase) {
        errors.push("Password must contain at least one uppercase letter".to_owned());
    }
    if !password.chars().any(char::is_lowercase) {
        errors.push("Password must contain at least one lowercase letter".to_owned());
    }
    PasswordStrength {
        valid: errors.is_empty(),
        errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn hashes_verify_and_reject() {
        let hash = hash_password("Correct horse 1").expect("hash");
        assert!(hash.starts_with("$argon2id$"));
        assert_eq!(verify_password("Correct horse 1", &hash), Ok(true));
        assert_eq!(verify_password("wrong", &hash), Ok(false));
    }

    #[test]
    fn equal_passwords_get_distinct_salts() {
        let first = hash_password("same").expect("hash");
        let second = hash_password("same").expect("hash");
        assert_ne!(first, second);
    }

    #[test]
    fn malformed_hashes_are_errors() {
        assert!(matches!(
            verify_password("x", "not-a-hash"),
            Err(PasswordError::MalformedHash(_))
        ));
    }

    #[rstest]
    #[case(32, 43)]
    #[case(16, 22)]
    #[case(0, 0)]
    fn random_strings_are_url_safe(#[case] bytes: usize, #[case] expected_len: usize) {
        let token = generate_random_string(bytes);
        assert_eq!(token.len(), expected_len);
        assert!(
            token
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[rstest]
    #[case("report.pdf", Some("pdf"))]
    #[case("archive.tar.gz", Some("gz"))]
    #[case("README", None)]
    #[case(".bashrc", None)]
    fn secure_filenames_keep_the_extension(#[case] original: &str, #[case] ext: Option<&str>) {
        let name = generate_secure_filename(original);
        let (stem, suffix) = match name.split_once('.') {
            Some((stem, suffix)) => (stem, Some(suffix)),
            None => (name.as_str(), None),
        };
        assert_eq!(suffix, ext);
        assert_eq!(stem.len(), 32);
        assert!(stem.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[rstest]
    #[case("test@tes.ru", true)]
    #[case("first.last+tag@example.co.uk", true)]
    #[case("tes.ru", false)]
    #[case("a@b", false)]
    #[case("spaces in@example.com", false)]
    fn email_shapes(#[case] email: &str, #[case] expected: bool) {
        assert_eq!(is_valid_email(email), expected);
    }

    #[rstest]
    #[case("1234", 3)]
    #[case("1234abcd", 1)]
    #[case("aBcdefgh", 1)]
    #[case("1234aBcd", 0)]
    fn password_rules_are_all_reported(#[case] password: &str, #[case] failures: usize) {
        let strength = validate_password_strength(password);
        assert_eq!(strength.errors.len(), failures);
        assert_eq!(strength.valid, failures == 0);
    }
}

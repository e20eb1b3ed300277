//! Request-scoped identifier for correlating log records and responses.
//!
//! `RequestId` is assigned by the outermost middleware stage and exposed via
//! task-local storage, so code deep inside a handler can log it without the
//! value being threaded through every call.
//!
//! Tokio task-local variables are not inherited across spawned tasks. Use
//! [`RequestId::scope`] when spawning new tasks so the identifier follows the
//! work.

use std::future::Future;

use tokio::task_local;
use uuid::Uuid;

/// Header carrying the request identifier in both directions.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

task_local! {
    static REQUEST_ID: RequestId;
}

/// Per-request identifier exposed via task-local storage.
///
/// Identifiers supplied by clients are kept byte for byte, so the value is
/// an opaque string rather than a UUID.
///
/// # Examples
/// ```
/// use platform_kit::domain::RequestId;
///
/// async fn handler() {
///     if let Some(id) = RequestId::current() {
///         tracing::info!(request_id = %id, "handling");
///     }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(String);

impl RequestId {
    /// Generate a fresh random identifier.
    #[must_use]
    #[rustfmt::skip]
    pub fn generate() -> Self { Self(Uuid::new_v4().to_string()) }

    /// Accept a client-supplied identifier from raw header bytes.
    ///
    /// Any non-empty value is accepted. Bytes that are not UTF-8 are shown
    /// with replacement characters in logs; the middleware echoes the
    /// original header bytes, not this text.
    #[must_use]
    pub fn from_header(raw: &[u8]) -> Option<Self> {
        (!raw.is_empty()).then(|| Self(String::from_utf8_lossy(raw).into_owned()))
    }

    /// Returns the identifier in scope, if any.
    #[must_use]
    #[rustfmt::skip]
    pub fn current() -> Option<Self> { REQUEST_ID.try_with(Clone::clone).ok() }

    /// Borrow the identifier text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Run `fut` with `request_id` in scope.
    ///
    /// # Examples
    /// ```
    /// use platform_kit::domain::RequestId;
    ///
    /// # tokio::runtime::Runtime::new().unwrap().block_on(async {
    /// let id = RequestId::from_header(b"abc-123").expect("non-empty");
    /// let observed = RequestId::scope(id.clone(), async { RequestId::current() }).await;
    /// assert_eq!(observed, Some(id));
    /// # });
    /// ```
    pub async fn scope<Fut>(request_id: RequestId, fut: Fut) -> Fut::Output
    where
        Fut: Future,
    {
        REQUEST_ID.scope(request_id, fut).await
    }

    /// Run the synchronous closure `f` with `request_id` in scope.
    pub fn sync_scope<F, R>(request_id: RequestId, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        REQUEST_ID.sync_scope(request_id, f)
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[tokio::test]
    async fn generated_ids_are_uuids() {
        let id = RequestId::generate();
        let parsed = Uuid::parse_str(id.as_str()).expect("valid UUID");
        assert_eq!(parsed.to_string(), id.as_str());
    }

    #[tokio::test]
    async fn current_reflects_scope() {
        let expected = RequestId::generate();
        let observed = RequestId::scope(expected.clone(), async { RequestId::current() }).await;
        assert_eq!(observed, Some(expected));
    }

    #[tokio::test]
    async fn current_is_none_out_of_scope() {
        assert!(RequestId::current().is_none());
    }

    #[rstest]
    fn sync_scope_exposes_the_id() {
        let expected = RequestId::generate();
        let observed = RequestId::sync_scope(expected.clone(), RequestId::current);
        assert_eq!(observed, Some(expected));
    }

    #[rstest]
    #[case(b"abc-123".as_slice(), Some("abc-123"))]
    #[case(b"tab\there".as_slice(), Some("tab\there"))]
    #[case(b"caf\xe9-42".as_slice(), Some("caf\u{fffd}-42"))]
    #[case(b"".as_slice(), None)]
    fn header_values_are_kept(#[case] raw: &[u8], #[case] expected: Option<&str>) {
        let parsed = RequestId::from_header(raw);
        assert_eq!(parsed.as_ref().map(RequestId::as_str), expected);
    }
}

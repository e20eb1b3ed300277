//! Request timing middleware.
//!
//! Measures each request with a monotonic clock, reports the elapsed time in
//! the `X-Process-Time` header (seconds, three decimals) and warns about
//! slow requests.

use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::header::{HeaderName, HeaderValue};
use actix_web::{Error, HttpMessage};
use futures_util::future::{LocalBoxFuture, Ready, ready};
use tracing::warn;

use crate::config::AppSettings;

use super::edit_error_response;

/// Response header carrying the measured processing time.
pub const PROCESS_TIME_HEADER: &str = "x-process-time";

/// Start, end and elapsed time of one request.
///
/// Stored in request extensions; `end` is filled in once the inner service
/// has produced a response.
#[derive(Debug, Clone, Copy)]
pub struct RequestTimer {
    start: Instant,
    end: Option<Instant>,
}

impl RequestTimer {
    fn started(start: Instant) -> Self {
        Self { start, end: None }
    }

    /// When the request entered the timing stage.
    #[must_use]
    pub const fn start(&self) -> Instant {
        self.start
    }

    /// When the response left the inner service, if it has.
    #[must_use]
    pub const fn end(&self) -> Option<Instant> {
        self.end
    }

    /// Time from start to end, or to now while still running.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.end.unwrap_or_else(Instant::now).duration_since(self.start)
    }
}

/// Format a duration as seconds with three decimals.
#[must_use]
pub fn format_seconds(elapsed: Duration) -> String {
    format!("{:.3}", elapsed.as_secs_f64())
}

/// When a request counts as slow.
///
/// A request is reported when it takes longer than `threshold`, or always
/// when `verbose` is set (debug mode with the DEBUG log level).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlowRequestPolicy {
    threshold: Duration,
    verbose: bool,
}

impl SlowRequestPolicy {
    /// Requests slower than this are always reported.
    pub const DEFAULT_THRESHOLD: Duration = Duration::from_secs(1);

    /// Policy with an explicit threshold.
    #[must_use]
    pub const fn new(threshold: Duration, verbose: bool) -> Self {
        Self { threshold, verbose }
    }

    /// Policy derived from the application settings.
    #[must_use]
    pub fn from_settings(settings: &AppSettings) -> Self {
        Self::new(Self::DEFAULT_THRESHOLD, settings.verbose_timing())
    }

    /// Whether a request that took `elapsed` should be reported.
    #[must_use]
    pub fn should_report(&self, elapsed: Duration) -> bool {
        elapsed > self.threshold || self.verbose
    }
}

impl Default for SlowRequestPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_THRESHOLD, false)
    }
}

/// Middleware measuring request processing time.
///
/// # Examples
/// ```
/// use actix_web::App;
/// use platform_kit::middleware::{SlowRequestPolicy, Timing};
///
/// let app = App::new().wrap(Timing::new(SlowRequestPolicy::default()));
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct Timing {
    policy: SlowRequestPolicy,
}

impl Timing {
    /// Timing stage reporting according to `policy`.
    #[must_use]
    pub const fn new(policy: SlowRequestPolicy) -> Self {
        Self { policy }
    }
}

impl<S, B> Transform<S, ServiceRequest> for Timing
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = TimingMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(TimingMiddleware {
            service,
            policy: self.policy,
        }))
    }
}

/// Service wrapper produced by [`Timing`].
pub struct TimingMiddleware<S> {
    service: S,
    policy: SlowRequestPolicy,
}

impl<S, B> Service<ServiceRequest> for TimingMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let start = Instant::now();
        req.extensions_mut().insert(RequestTimer::started(start));
        let method = req.method().clone();
        let path = req.uri().to_string();
        let policy = self.policy;
        let fut = self.service.call(req);

        Box::pin(async move {
            let result = fut.await;
            let end = Instant::now();
            let elapsed = end.duration_since(start);
            let seconds = format_seconds(elapsed);
            if policy.should_report(elapsed) {
                warn!(%method, %path, process_time = %seconds, "slow request");
            }

            let header = HeaderValue::from_str(&seconds)
                .inspect_err(|error| warn!(%error, "failed to encode process time header"))
                .ok();
            let name = HeaderName::from_static(PROCESS_TIME_HEADER);
            match result {
                Ok(mut res) => {
                    if let Some(timer) = res.request().extensions_mut().get_mut::<RequestTimer>() {
                        timer.end = Some(end);
                    }
                    if let Some(value) = header {
                        res.headers_mut().insert(name, value);
                    }
                    Ok(res)
                }
                Err(err) => Err(edit_error_response(err, |response| {
                    if let Some(value) = header {
                        response.headers_mut().insert(name, value);
                    }
                })),
            }
        })
    }
}

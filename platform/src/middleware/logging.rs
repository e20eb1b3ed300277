//! Request logging middleware.
//!
//! Opens a `request` span carrying the request id, logs when a request
//! starts and finishes, and reports the total time in `X-Execution-Time`.

use std::task::{Context, Poll};
use std::time::Instant;

use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::StatusCode;
use actix_web::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use actix_web::{Error, HttpMessage};
use futures_util::future::{LocalBoxFuture, Ready, ready};
use tracing::{Instrument, info, info_span, warn};

use crate::domain::RequestId;

use super::edit_error_response;
use super::timing::format_seconds;

/// Response header carrying the elapsed seconds, as `0.123`.
pub const EXECUTION_TIME_HEADER: &str = "x-execution-time";

/// Middleware logging the start and end of every request.
///
/// Place it inside [`super::RequestIdentity`] so the span can carry the
/// request id.
#[derive(Clone, Copy, Debug, Default)]
pub struct RequestLogging;

impl<S, B> Transform<S, ServiceRequest> for RequestLogging
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RequestLoggingMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestLoggingMiddleware { service }))
    }
}

/// Service wrapper produced by [`RequestLogging`].
pub struct RequestLoggingMiddleware<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for RequestLoggingMiddleware<S>
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
        let request_id = req
            .extensions()
            .get::<RequestId>()
            .map_or_else(String::new, ToString::to_string);
        let span = info_span!(
            "request",
            request_id = %request_id,
            method = %req.method(),
            path = %req.path(),
        );
        let client = req
            .peer_addr()
            .map_or_else(|| "unknown".to_owned(), |addr| addr.ip().to_string());
        let user_agent = req
            .headers()
            .get(header::USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_owned();
        span.in_scope(|| {
            info!(url = %super::full_url(&req), %client, %user_agent, "request started");
        });

        let start = Instant::now();
        let fut = span.in_scope(|| self.service.call(req));
        Box::pin(
            async move {
                let result = fut.await;
                let seconds = format_seconds(start.elapsed());
                match result {
                    Ok(mut res) => {
                        completed(res.status(), &seconds, res.headers_mut());
                        Ok(res)
                    }
                    Err(err) => Err(edit_error_response(err, |response| {
                        completed(response.status(), &seconds, response.headers_mut());
                    })),
                }
            }
            .instrument(span),
        )
    }
}

/// Log the finished request and set the execution time header.
fn completed(status: StatusCode, seconds: &str, headers: &mut HeaderMap) {
    info!(
        status = status.as_u16(),
        execution_time = %format!("{seconds}s"),
        "request completed"
    );
    match HeaderValue::from_str(seconds) {
        Ok(value) => {
            headers.insert(HeaderName::from_static(EXECUTION_TIME_HEADER), value);
        }
        Err(error) => warn!(%error, "failed to encode execution time header"),
    }
}

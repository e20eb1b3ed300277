//! Central error rendering.
//!
//! The innermost stage. Every failure leaving a handler passes through here
//! and is logged exactly once:
//!
//! - typed errors keep their envelope and are logged at `warn`;
//! - framework errors (unmatched routes, wrong methods, oversized bodies)
//!   get the `http_error` envelope and are logged at `warn`;
//! - unhandled reports, foreign 5xx errors and panics become the
//!   `internal_error` envelope and are logged at `error` with full detail.
//!
//! Routing happens inside this stage, so it never holds a clone of the
//! request across the inner call. Failures that surface as `Err` or as a
//! panic leave as an already rendered error instead of a response.

use std::any::Any;
use std::backtrace::Backtrace;
use std::panic::AssertUnwindSafe;
use std::task::{Context, Poll};

use actix_web::Error;
use actix_web::body::{BodySize, BoxBody, MessageBody};
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::{Method, StatusCode};
use actix_web::HttpResponse;
use futures_util::FutureExt;
use futures_util::future::{LocalBoxFuture, Ready, ready};
use tracing::{error, warn};

use crate::domain::Error as TypedError;
use crate::inbound::http::error::{ApiError, http_error_response, internal_response};
use crate::telemetry::take_panic_report;

use super::rendered_error;

/// Middleware turning every failure into the uniform error envelope.
///
/// # Examples
/// ```
/// use actix_web::App;
/// use platform_kit::middleware::ErrorRenderer;
///
/// let app = App::new().wrap(ErrorRenderer);
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct ErrorRenderer;

impl<S, B> Transform<S, ServiceRequest> for ErrorRenderer
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type InitError = ();
    type Transform = ErrorRendererMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(ErrorRendererMiddleware { service }))
    }
}

/// Service wrapper produced by [`ErrorRenderer`].
pub struct ErrorRendererMiddleware<S> {
    service: S,
}

/// What went wrong, with everything needed for the single log entry.
enum Failure {
    Typed {
        code: &'static str,
        status: u16,
        message: String,
        details: String,
    },
    Framework {
        status: StatusCode,
        error: String,
    },
    Unhandled {
        report: String,
    },
}

impl Failure {
    fn classify(err: &Error, status: StatusCode) -> Self {
        if let Some(typed) = err.as_error::<TypedError>() {
            return Self::typed(typed);
        }
        match err.as_error::<ApiError>() {
            Some(ApiError::Typed(typed)) => Self::typed(typed),
            Some(ApiError::Unhandled(report)) => Self::Unhandled {
                report: format!("{report:?}"),
            },
            None if status.is_server_error() => Self::Unhandled {
                report: format!("{err:?}"),
            },
            None => Self::Framework {
                status,
                error: err.to_string(),
            },
        }
    }

    fn typed(error: &TypedError) -> Self {
        Self::Typed {
            code: error.code().as_str(),
            status: error.status(),
            message: error.message().to_owned(),
            details: error.details().to_string(),
        }
    }

    fn log(&self, method: &Method, url: &str) {
        match self {
            Self::Typed {
                code,
                status,
                message,
                details,
            } => warn!(
                kind = %code,
                status = *status,
                %message,
                %details,
                %method,
                %url,
                "application error"
            ),
            Self::Framework { status, error } => warn!(
                status = status.as_u16(),
                %error,
                %method,
                %url,
                "http error"
            ),
            Self::Unhandled { report } => error!(
                error = %report,
                %method,
                %url,
                "unhandled error"
            ),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| (*message).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_owned())
}

/// The envelope to send for `failure`, or `None` to keep the original.
fn envelope_for(failure: &Failure) -> Option<HttpResponse> {
    match failure {
        Failure::Typed { .. } => None,
        Failure::Framework { status, .. } => Some(http_error_response(*status)),
        Failure::Unhandled { .. } => Some(internal_response()),
    }
}

/// Error status produced without an error value or a body, such as a 405
/// from a resource with no matching method.
fn is_bare_error<B: MessageBody>(res: &ServiceResponse<B>) -> bool {
    let status = res.status();
    (status.is_client_error() || status.is_server_error())
        && matches!(res.response().body().size(), BodySize::None | BodySize::Sized(0))
}

fn render<B>(res: ServiceResponse<B>, method: &Method, url: &str) -> ServiceResponse<BoxBody>
where
    B: MessageBody + 'static,
{
    let failure = match res.response().error() {
        Some(err) => Failure::classify(err, res.status()),
        None if is_bare_error(&res) => Failure::Framework {
            status: res.status(),
            error: res
                .status()
                .canonical_reason()
                .unwrap_or("HTTP error")
                .to_owned(),
        },
        None => return res.map_into_boxed_body(),
    };
    failure.log(method, url);
    let res = res.map_into_boxed_body();
    match envelope_for(&failure) {
        Some(envelope) => res.into_response(envelope),
        None => res,
    }
}

impl<S, B> Service<ServiceRequest> for ErrorRendererMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let method = req.method().clone();
        let url = super::full_url(&req);
        let fut = self.service.call(req);

        Box::pin(async move {
            match AssertUnwindSafe(fut).catch_unwind().await {
                Ok(Ok(res)) => Ok(render(res, &method, &url)),
                Ok(Err(err)) => {
                    let failure = Failure::classify(&err, err.as_response_error().status_code());
                    failure.log(&method, &url);
                    let response = envelope_for(&failure).unwrap_or_else(|| err.error_response());
                    Err(rendered_error(err.to_string(), response))
                }
                Err(payload) => {
                    let trace = take_panic_report()
                        .unwrap_or_else(|| Backtrace::force_capture().to_string());
                    error!(
                        error = %panic_message(payload.as_ref()),
                        %trace,
                        %method,
                        %url,
                        "handler panicked"
                    );
                    Err(rendered_error(
                        "handler panicked".to_owned(),
                        internal_response(),
                    ))
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inbound::http::error::ErrorEnvelope;
    use crate::inbound::http::{ApiResult, fallback};
    use crate::test_support::logs::LogCapture;
    use actix_web::{App, HttpResponse, test, web};
    use color_eyre::eyre::eyre;
    use serde_json::json;
    use tracing::Level;

    async fn typed_failure() -> ApiResult<HttpResponse> {
        Err(TypedError::not_found()
            .with_details(json!({ "user_id": 7 }))
            .into())
    }

    async fn unhandled_failure() -> ApiResult<HttpResponse> {
        Err(eyre!("connection reset by peer: secret-host:5432").into())
    }

    async fn panicking() -> HttpResponse {
        panic!("handler exploded");
    }

    async fn foreign_failure() -> Result<HttpResponse, Error> {
        Err(actix_web::error::ErrorInternalServerError("raw io failure"))
    }

    macro_rules! app {
        () => {
            test::init_service(
                App::new()
                    .wrap(ErrorRenderer)
                    .service(
                        web::resource("/things")
                            .route(web::get().to(|| async { HttpResponse::Ok().finish() })),
                    )
                    .route("/typed", web::get().to(typed_failure))
                    .route("/unhandled", web::get().to(unhandled_failure))
                    .route("/panic", web::get().to(panicking))
                    .route("/foreign", web::get().to(foreign_failure))
                    .route("/ok", web::get().to(|| async { HttpResponse::Ok().body("fine") }))
                    .default_service(web::to(fallback)),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn typed_errors_keep_their_envelope_and_log_once() {
        let capture = LogCapture::default();
        let _guard = tracing::subscriber::set_default(capture.subscriber());
        let app = app!();

        let res = test::call_service(&app, test::TestRequest::get().uri("/typed").to_request()).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        let envelope: ErrorEnvelope = test::read_body_json(res).await;
        assert_eq!(envelope.error.code, "not_found");
        assert_eq!(envelope.error.details, Some(json!({ "user_id": 7 })));

        let logged = capture.events();
        assert_eq!(logged.len(), 1);
        assert_eq!(logged[0].level, Level::WARN);
        assert_eq!(logged[0].field("kind"), Some("not_found"));
        assert_eq!(logged[0].field("status"), Some("404"));
    }

    #[actix_web::test]
    async fn unhandled_reports_become_internal_errors() {
        let capture = LogCapture::default();
        let _guard = tracing::subscriber::set_default(capture.subscriber());
        let app = app!();

        let res =
            test::call_service(&app, test::TestRequest::get().uri("/unhandled").to_request()).await;
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = test::read_body(res).await;
        let text = std::str::from_utf8(&body).expect("utf8");
        assert!(!text.contains("secret-host"));
        let envelope: ErrorEnvelope = serde_json::from_str(text).expect("json");
        assert_eq!(envelope, ErrorEnvelope::internal());

        let logged = capture.events();
        assert_eq!(logged.len(), 1);
        assert_eq!(logged[0].level, Level::ERROR);
        assert!(
            logged[0]
                .field("error")
                .is_some_and(|report| report.contains("secret-host"))
        );
    }

    #[actix_web::test]
    async fn panics_become_internal_errors() {
        let capture = LogCapture::default();
        let _guard = tracing::subscriber::set_default(capture.subscriber());
        let app = app!();

        let err = test::try_call_service(&app, test::TestRequest::get().uri("/panic").to_request())
            .await
            .err()
            .expect("panic leaves as a rendered error");
        let res = err.error_response();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = actix_web::body::to_bytes(res.into_body()).await.expect("body");
        let envelope: ErrorEnvelope = serde_json::from_slice(&body).expect("json");
        assert_eq!(envelope, ErrorEnvelope::internal());

        let logged = capture.with_message("handler panicked");
        assert_eq!(logged.len(), 1);
        assert_eq!(logged[0].field("error"), Some("handler exploded"));
        assert!(logged[0].field("trace").is_some_and(|trace| !trace.is_empty()));
    }

    #[actix_web::test]
    async fn wrong_method_renders_http_error() {
        let capture = LogCapture::default();
        let _guard = tracing::subscriber::set_default(capture.subscriber());
        let app = app!();

        let res =
            test::call_service(&app, test::TestRequest::delete().uri("/things").to_request()).await;
        assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(
            res.headers()
                .get(actix_web::http::header::CONTENT_TYPE)
                .and_then(|value| value.to_str().ok()),
            Some("application/json")
        );
        let envelope: ErrorEnvelope = test::read_body_json(res).await;
        assert_eq!(envelope, ErrorEnvelope::http(StatusCode::METHOD_NOT_ALLOWED));
        assert_eq!(capture.with_message("http error").len(), 1);
    }

    #[actix_web::test]
    async fn foreign_server_errors_are_redacted() {
        let app = app!();
        let res =
            test::call_service(&app, test::TestRequest::get().uri("/foreign").to_request()).await;
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let envelope: ErrorEnvelope = test::read_body_json(res).await;
        assert_eq!(envelope, ErrorEnvelope::internal());
    }

    #[actix_web::test]
    async fn unmatched_routes_render_http_error() {
        let capture = LogCapture::default();
        let _guard = tracing::subscriber::set_default(capture.subscriber());
        let app = app!();

        let res =
            test::call_service(&app, test::TestRequest::get().uri("/missing").to_request()).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        let envelope: ErrorEnvelope = test::read_body_json(res).await;
        assert_eq!(envelope, ErrorEnvelope::http(StatusCode::NOT_FOUND));
        assert_eq!(envelope.error.message, "Not Found");

        let logged = capture.events();
        assert_eq!(logged.len(), 1);
        assert_eq!(logged[0].level, Level::WARN);
    }

    #[actix_web::test]
    async fn successful_responses_pass_through() {
        let capture = LogCapture::default();
        let _guard = tracing::subscriber::set_default(capture.subscriber());
        let app = app!();

        let res = test::call_service(&app, test::TestRequest::get().uri("/ok").to_request()).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(test::read_body(res).await, "fine");
        assert!(capture.events().is_empty());
    }
}

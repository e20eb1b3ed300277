//! Request middleware.
//!
//! Four stages run around every handler, outermost first:
//!
//! 1. [`RequestIdentity`] assigns the request id;
//! 2. [`Timing`] measures processing time;
//! 3. [`RequestLogging`] opens the request span and logs start and end;
//! 4. [`ErrorRenderer`] renders failures into the error envelope.
//!
//! [`install`] applies them in that order.

pub mod logging;
pub mod render;
pub mod request_id;
pub mod timing;

pub use logging::{EXECUTION_TIME_HEADER, RequestLogging};
pub use render::ErrorRenderer;
pub use request_id::RequestIdentity;
pub use timing::{PROCESS_TIME_HEADER, RequestTimer, SlowRequestPolicy, Timing};

use actix_web::body::{BoxBody, MessageBody};
use actix_web::dev::{ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::error::InternalError;
use actix_web::{App, Error, HttpResponse, web};
use bb8::ManageConnection;

use crate::context::AppContext;
use crate::inbound::http::fallback;
use crate::inbound::http::validation::{json_config, path_config, query_config};

/// Absolute URL of the request as seen by the client.
pub(crate) fn full_url(req: &ServiceRequest) -> String {
    let info = req.connection_info();
    format!("{}://{}{}", info.scheme(), info.host(), req.uri())
}

/// Error that renders as the already built `response`.
///
/// Used when a failure escapes the inner service as `Err`, where there is no
/// request left to build a `ServiceResponse` from.
pub(crate) fn rendered_error(cause: String, response: HttpResponse) -> Error {
    InternalError::from_response(cause, response).into()
}

/// Apply `edit` to the response `err` renders as, keeping it an error.
pub(crate) fn edit_error_response(err: Error, edit: impl FnOnce(&mut HttpResponse)) -> Error {
    let mut response = err.error_response();
    edit(&mut response);
    rendered_error(err.to_string(), response)
}

/// Wire the platform pipeline into `app`.
///
/// Registers the request-validation handlers, the shared settings and
/// session manager as app data, the JSON 404 fallback, and the four
/// middleware stages. Routes may be added before or after this call.
///
/// # Examples
/// ```no_run
/// # async fn run(ctx: platform_kit::AppContext) {
/// use actix_web::{App, HttpResponse, web};
///
/// let app = platform_kit::middleware::install(App::new(), &ctx)
///     .route("/health", web::get().to(|| async { HttpResponse::Ok().finish() }));
/// # }
/// ```
pub fn install<T, B, M>(
    app: App<T>,
    context: &AppContext<M>,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse<BoxBody>,
        Error = Error,
        InitError = (),
    > + use<T, B, M>,
>
where
    T: ServiceFactory<
            ServiceRequest,
            Config = (),
            Response = ServiceResponse<B>,
            Error = Error,
            InitError = (),
        > + 'static,
    B: MessageBody + 'static,
    M: ManageConnection,
{
    app.app_data(json_config())
        .app_data(query_config())
        .app_data(path_config())
        .app_data(web::Data::from(context.settings_arc()))
        .app_data(web::Data::new(context.sessions().clone()))
        .default_service(web::to(fallback))
        .wrap(ErrorRenderer)
        .wrap(RequestLogging)
        .wrap(Timing::new(context.slow_request_policy()))
        .wrap(RequestIdentity)
}

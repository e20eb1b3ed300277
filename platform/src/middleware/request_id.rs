//! Request identity middleware.
//!
//! Reuses a client-supplied `X-Request-ID` when one is present, otherwise
//! generates one. The identifier is stored in request extensions, placed in
//! task-local scope for everything downstream, and echoed on the response.
//! Inbound values are echoed with their original bytes.

use std::task::{Context, Poll};

use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::header::{HeaderName, HeaderValue};
use actix_web::{Error, HttpMessage};
use futures_util::future::{LocalBoxFuture, Ready, ready};
use tracing::error;

use crate::domain::{REQUEST_ID_HEADER, RequestId};

use super::edit_error_response;

/// Middleware assigning every request a [`RequestId`].
///
/// Handlers can read it via [`RequestId::current`].
///
/// # Examples
/// ```
/// use actix_web::App;
/// use platform_kit::middleware::RequestIdentity;
///
/// let app = App::new().wrap(RequestIdentity);
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct RequestIdentity;

impl<S, B> Transform<S, ServiceRequest> for RequestIdentity
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RequestIdentityMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestIdentityMiddleware { service }))
    }
}

/// Service wrapper produced by [`RequestIdentity`].
pub struct RequestIdentityMiddleware<S> {
    service: S,
}

/// The request's identifier and the header value to echo for it.
fn assign(req: &ServiceRequest) -> (RequestId, Option<HeaderValue>) {
    let inbound = req.headers().get(REQUEST_ID_HEADER).and_then(|value| {
        RequestId::from_header(value.as_bytes()).map(|id| (id, Some(value.clone())))
    });
    inbound.unwrap_or_else(|| {
        let id = RequestId::generate();
        let echo = HeaderValue::from_str(id.as_str())
            .inspect_err(|error| {
                error!(%error, request_id = %id, "failed to encode request identifier header");
            })
            .ok();
        (id, echo)
    })
}

impl<S, B> Service<ServiceRequest> for RequestIdentityMiddleware<S>
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
        let (request_id, echo) = assign(&req);
        req.extensions_mut().insert(request_id.clone());
        let fut = RequestId::sync_scope(request_id.clone(), || self.service.call(req));
        Box::pin(RequestId::scope(request_id, async move {
            let name = HeaderName::from_static(REQUEST_ID_HEADER);
            match fut.await {
                Ok(mut res) => {
                    if let Some(value) = echo {
                        res.headers_mut().insert(name, value);
                    }
                    Ok(res)
                }
                Err(err) => Err(edit_error_response(err, |response| {
                    if let Some(value) = echo {
                        response.headers_mut().insert(name, value);
                    }
                })),
            }
        }))
    }
}

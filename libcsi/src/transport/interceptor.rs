//! Per-call logging around every CSI RPC.
//!
//! [`CallLogLayer`] sits in front of the tonic router, so calls the router
//! answers on its own, such as unknown methods, are logged like any other.

use std::fmt::Display;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tonic::codegen::http::{HeaderMap, Request, Response};
use tonic::{Code, Status};
use tower::{Layer, Service};
use tracing::{Instrument, debug, error, info_span};

/// Wraps the routed services in [`CallLog`].
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct CallLogLayer;

impl<S> Layer<S> for CallLogLayer {
    type Service = CallLog<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CallLog { inner }
    }
}

/// Runs each call inside a `csi_call` span named after its gRPC path and
/// logs entry, success and failure.  Requests and responses pass through
/// untouched.
#[derive(Debug, Clone)]
pub(crate) struct CallLog<S> {
    inner: S,
}

impl<S, B, R> Service<Request<B>> for CallLog<S>
where
    S: Service<Request<B>, Response = Response<R>>,
    S::Future: Send + 'static,
    S::Error: Display + Send + 'static,
    R: Send + 'static,
{
    type Response = Response<R>;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Response<R>, S::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        let span = info_span!("csi_call", method = req.uri().path());
        span.in_scope(|| debug!("GRPC call"));
        let call = self.inner.call(req);

        Box::pin(
            async move {
                let result = call.await;
                match &result {
                    Ok(res) => match failure(res.headers()) {
                        Some(status) => {
                            error!(code = ?status.code(), error = status.message(), "GRPC error")
                        }
                        None => debug!("GRPC call succeeded"),
                    },
                    Err(e) => error!(error = %e, "GRPC transport error"),
                }
                result
            }
            .instrument(span),
        )
    }
}

/// The status of a call that failed before sending a reply.
///
/// Failures are sent trailers-only, so `grpc-status` shows up in the
/// response headers; successful unary replies carry it in the trailers.
fn failure(headers: &HeaderMap) -> Option<Status> {
    Status::from_header_map(headers).filter(|status| status.code() != Code::Ok)
}

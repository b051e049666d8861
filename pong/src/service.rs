use std::fmt;
use std::future::Future;
use std::ops::ControlFlow;
use std::pin::Pin;
use std::sync::Arc;
use std::task::Context;
use std::task::Poll;
use std::task::ready;

use opentelemetry::KeyValue;
use opentelemetry::global;
use opentelemetry::metrics::Counter;
use pin_project_lite::pin_project;
use tower::BoxError;
use tower::Service;

use slot_limit::Reason;
use slot_limit::Strategy;
use slot_limit::Ticket;

use crate::error::PongError;

#[derive(Clone, Debug)]
struct AdmissionServiceMetrics {
    admissions: Counter<u64>,
}

/// Gates every request through an admission [`Strategy`].
///
/// Rejected requests never reach the inner service and fail with
/// [`PongError::RateLimitExceeded`]. Admitted requests carry an
/// [`AdmissionGuard`] that completes their ticket when the response future
/// resolves or is dropped.
#[derive(Debug)]
pub struct AdmissionService<L, S>
where
    L: ?Sized,
{
    inner: S,
    limiter: Arc<L>,
    instruments: AdmissionServiceMetrics,
}

impl<L, S> Clone for AdmissionService<L, S>
where
    L: ?Sized,
    S: Clone,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            limiter: Arc::clone(&self.limiter),
            instruments: self.instruments.clone(),
        }
    }
}

impl<L, S> AdmissionService<L, S>
where
    L: ?Sized,
{
    pub fn new(inner: S, limiter: Arc<L>) -> Self {
        let meter = global::meter("pong_admission_service");
        let instruments = AdmissionServiceMetrics {
            admissions: meter.u64_counter("pong_admissions").build(),
        };

        Self {
            inner,
            limiter,
            instruments,
        }
    }
}

/// Completes an admitted request's ticket when dropped.
pub struct AdmissionGuard {
    complete: Option<Box<dyn FnOnce() + Send>>,
}

impl AdmissionGuard {
    pub fn new<L>(limiter: Arc<L>, ticket: Ticket) -> Self
    where
        L: Strategy + ?Sized + Send + Sync + 'static,
    {
        Self {
            complete: Some(Box::new(move || limiter.complete(ticket))),
        }
    }
}

impl Drop for AdmissionGuard {
    fn drop(&mut self) {
        if let Some(complete) = self.complete.take() {
            complete();
        }
    }
}

impl fmt::Debug for AdmissionGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdmissionGuard")
            .field("pending", &self.complete.is_some())
            .finish()
    }
}

pin_project! {
    /// Response future of [`AdmissionService`].
    #[project = ResponseFutureProj]
    pub enum ResponseFuture<F> {
        Admitted {
            #[pin]
            inner: F,
            guard: Option<AdmissionGuard>,
        },
        Rejected {
            error: Option<PongError>,
        },
    }
}

impl<F, T> Future for ResponseFuture<F>
where
    F: Future<Output = Result<T, BoxError>>,
{
    type Output = Result<T, BoxError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.project() {
            ResponseFutureProj::Admitted { inner, guard } => {
                let res = ready!(inner.poll(cx));
                // Complete the ticket as soon as the work is done, not when
                // the future itself is eventually dropped.
                guard.take();
                Poll::Ready(res)
            }
            ResponseFutureProj::Rejected { error } => {
                let error = error
                    .take()
                    .unwrap_or_else(|| PongError::Internal("polled after completion".into()));
                Poll::Ready(Err(Box::new(error)))
            }
        }
    }
}

impl<L, S, Req> Service<Req> for AdmissionService<L, S>
where
    L: Strategy + ?Sized + Send + Sync + 'static,
    S: Service<Req, Error = BoxError>,
{
    type Response = S::Response;
    type Error = BoxError;
    type Future = ResponseFuture<S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        // The decision is made per call so a readiness poll never holds a slot.
        match self.limiter.process() {
            ControlFlow::Continue(ticket) => {
                self.instruments
                    .admissions
                    .add(1, &[KeyValue::new("decision", "admitted")]);
                tracing::info!(window = ticket.second(), "request admitted");
                ResponseFuture::Admitted {
                    inner: self.inner.call(req),
                    guard: Some(AdmissionGuard::new(Arc::clone(&self.limiter), ticket)),
                }
            }
            ControlFlow::Break(Reason::RateLimitExceeded { retry_after }) => {
                self.instruments
                    .admissions
                    .add(1, &[KeyValue::new("decision", "rejected")]);
                tracing::info!(?retry_after, "too many requests; returning 429");
                ResponseFuture::Rejected {
                    error: Some(PongError::RateLimitExceeded { retry_after }),
                }
            }
        }
    }
}

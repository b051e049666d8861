//! # Pong
//!
//! `pong` is a self-throttling HTTP responder built on axum and
//! [Tower](https://github.com/tower-rs/tower).
//!
//! ## The Admission Stack
//! Every request passes through the [`AdmissionLayer`], which asks a
//! [`slot_limit::Strategy`] (normally a [`slot_limit::AdmissionWindow`]) whether
//! the request fits into the current second:
//!
//! 1. **Rejection**: Requests over the limit never reach the responder. They fail
//!    with [`PongError::RateLimitExceeded`], which converts to
//!    `429 Too Many Requests` with a `Retry-After` header.
//! 2. **Admission**: Admitted requests are answered after a simulated processing
//!    delay. Their admission is completed when the reply has been produced, or
//!    when the request is abandoned, whichever comes first.
//! 3. **Error Mapping**: [`handle_pong_error`] converts anything the stack raises
//!    into a response, so the router stays infallible.

mod config;
mod error;
mod layer;
mod responder;
mod service;


pub use config::PongConfig;
pub use error::PongError;
pub use error::handle_pong_error;
pub use layer::AdmissionLayer;
pub use responder::PAYLOAD;
pub use responder::PONG_PATH;
pub use responder::router;
pub use service::AdmissionGuard;
pub use service::AdmissionService;
pub use service::ResponseFuture;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::error_handling::HandleErrorLayer;
use axum::extract::State;
use axum::routing::get;
use slot_limit::Strategy;
use tower::BoxError;
use tower::ServiceBuilder;

use crate::AdmissionLayer;
use crate::error::handle_pong_error;

/// Path the responder answers on.
pub const PONG_PATH: &str = "/pong";

/// Body of every successful reply.
pub const PAYLOAD: &str = "World";

#[derive(Clone, Debug)]
struct Responder {
    processing_delay: Duration,
}

async fn respond(State(responder): State<Responder>) -> &'static str {
    tokio::time::sleep(responder.processing_delay).await;
    tracing::debug!("pong responded");
    PAYLOAD
}

/// Builds the pong application.
///
/// Every request to [`PONG_PATH`] is gated by `limiter`. Admitted requests are
/// answered with [`PAYLOAD`] after `processing_delay`; the admission is
/// completed once the reply has been produced.
pub fn router<L>(limiter: Arc<L>, processing_delay: Duration) -> Router
where
    L: Strategy + ?Sized + Send + Sync + 'static,
{
    Router::new()
        .route(PONG_PATH, get(respond))
        .layer(
            ServiceBuilder::new()
                // Outermost: turns the stack's BoxError into a response.
                .layer(HandleErrorLayer::new(handle_pong_error))
                .layer(AdmissionLayer::new(limiter))
                // The route is infallible; the admission layer speaks BoxError.
                .map_err(BoxError::from),
        )
        .with_state(Responder { processing_delay })
}

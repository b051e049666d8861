use std::time::Duration;

use axum::http::HeaderValue;
use axum::http::StatusCode;
use axum::http::header::RETRY_AFTER;
use axum::response::IntoResponse;
use axum::response::Response;
use tower::BoxError;

/// Errors produced by the pong admission stack.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PongError {
    /// The request arrived after this second's admissions were used up.
    ///
    /// Converts to `429 Too Many Requests` with a `Retry-After` header.
    #[error("Too many requests; retry after {retry_after:?}")]
    RateLimitExceeded {
        /// Time left until the next admission window opens.
        retry_after: Duration,
    },

    /// An unexpected error occurred in the inner service.
    ///
    /// The string contains the `Display` representation of the inner error.
    /// Converts to `500 Internal Server Error`.
    #[error("Internal service error: {0}")]
    Internal(String),
}

impl IntoResponse for PongError {
    fn into_response(self) -> Response {
        match self {
            Self::RateLimitExceeded { retry_after } => {
                let secs = retry_after.as_secs().max(1);
                let mut response =
                    (StatusCode::TOO_MANY_REQUESTS, "Too many requests").into_response();
                response
                    .headers_mut()
                    .insert(RETRY_AFTER, HeaderValue::from(secs));
                response
            }
            Self::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
            }
        }
    }
}

/// Turns an error raised by the middleware stack into a response.
pub async fn handle_pong_error(err: BoxError) -> Response {
    match err.downcast::<PongError>() {
        Ok(pong_err) => (*pong_err).into_response(),
        Err(other) => PongError::Internal(other.to_string()).into_response(),
    }
}

use thiserror::Error;

/// Why a request that was sent did not come back with a payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ThrottleCause {
    /// Pong answered `429 Too Many Requests`.
    #[error("pong is over its admission limit")]
    RemoteThrottled,

    /// Pong refused the request with another 4xx status.
    #[error("pong rejected the request with status {0}")]
    RemoteClientError(u16),

    /// The exchange never completed: connect failure, timeout or broken body.
    #[error("transport failure: {0}")]
    TransportFailure(String),
}

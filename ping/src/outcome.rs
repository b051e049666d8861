use std::fmt;
use std::time::Duration;

use http::StatusCode;
use slot_limit::LockKey;
use tower::BoxError;

use crate::PongReply;
use crate::ThrottleCause;

/// Terminal state of one ping cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Every lock slot was held; no request was sent.
    RateLimited,
    /// Pong answered with a 2xx and this body.
    Success(String),
    /// The request was sent but produced no payload.
    Throttled(ThrottleCause),
    /// Anything else.
    Error(String),
}

impl CycleOutcome {
    /// Stable label used as the metric attribute.
    pub fn label(&self) -> &'static str {
        match self {
            CycleOutcome::RateLimited => "rate_limited",
            CycleOutcome::Success(_) => "success",
            CycleOutcome::Throttled(_) => "throttled",
            CycleOutcome::Error(_) => "error",
        }
    }

    /// Maps the result of a pong exchange to an outcome.
    pub fn classify(result: Result<PongReply, BoxError>) -> Self {
        match result {
            Ok(reply) if reply.status.is_success() => CycleOutcome::Success(reply.body),
            Ok(reply) if reply.status == StatusCode::TOO_MANY_REQUESTS => {
                CycleOutcome::Throttled(ThrottleCause::RemoteThrottled)
            }
            Ok(reply) if reply.status.is_client_error() => {
                CycleOutcome::Throttled(ThrottleCause::RemoteClientError(reply.status.as_u16()))
            }
            Ok(reply) => CycleOutcome::Error(format!("unexpected status {}", reply.status)),
            Err(e) => match e.downcast_ref::<reqwest::Error>() {
                Some(re) if re.is_builder() => CycleOutcome::Error(re.to_string()),
                _ => CycleOutcome::Throttled(ThrottleCause::TransportFailure(e.to_string())),
            },
        }
    }
}

impl fmt::Display for CycleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleOutcome::RateLimited => f.write_str("Request not sent: rate limited"),
            CycleOutcome::Success(body) => write!(f, "Request sent & pong responded: {body}"),
            CycleOutcome::Throttled(cause) => write!(f, "Request sent & throttled: {cause}"),
            CycleOutcome::Error(message) => write!(f, "Error: {message}"),
        }
    }
}

/// What one tick produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub tick: u64,
    /// The slot used, if one was acquired.
    pub lock: Option<LockKey>,
    pub outcome: CycleOutcome,
    pub elapsed: Duration,
}

impl CycleReport {
    /// Writes the report to the log, once.
    pub fn log(&self) {
        let lock = self.lock.as_ref().map(LockKey::as_str).unwrap_or("-");
        match &self.outcome {
            CycleOutcome::Error(_) => tracing::warn!(
                tick = self.tick,
                lock,
                elapsed = ?self.elapsed,
                "{}",
                self.outcome
            ),
            _ => tracing::info!(
                tick = self.tick,
                lock,
                elapsed = ?self.elapsed,
                "{}",
                self.outcome
            ),
        }
    }
}

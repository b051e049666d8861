use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use std::time::SystemTime;

use futures::FutureExt;
use opentelemetry::KeyValue;
use opentelemetry::global;
use opentelemetry::metrics::Counter;
use slot_limit::LockKey;
use slot_limit::LockManager;
use slot_limit::LockStore;
use slot_limit::ReleaseHandle;
use tokio::time::Instant;
use tower::BoxError;
use tower::Service;
use tower::ServiceExt;

use crate::CycleOutcome;
use crate::CycleReport;
use crate::PongReply;

#[derive(Clone, Debug)]
struct CoordinatorMetrics {
    cycles: Counter<u64>,
}

/// Runs one ping cycle per tick: take a slot, call pong, give the slot back
/// after the grace delay.
#[derive(Debug)]
pub struct PingCoordinator<S, C>
where
    S: ?Sized,
{
    locks: LockManager<S>,
    client: C,
    keys: Vec<LockKey>,
    grace: Duration,
    instruments: CoordinatorMetrics,
}

impl<S, C> PingCoordinator<S, C>
where
    S: LockStore + ?Sized + 'static,
    C: Service<(), Response = PongReply, Error = BoxError> + Clone + Send + 'static,
    C::Future: Send,
{
    /// Creates a coordinator contending for `keys`, tried in order.
    pub fn new(locks: LockManager<S>, client: C, keys: Vec<LockKey>, grace: Duration) -> Self {
        let meter = global::meter("ping_coordinator");
        let instruments = CoordinatorMetrics {
            cycles: meter.u64_counter("ping_cycles").build(),
        };

        Self {
            locks,
            client,
            keys,
            grace,
            instruments,
        }
    }

    pub fn keys(&self) -> &[LockKey] {
        &self.keys
    }

    pub fn grace(&self) -> Duration {
        self.grace
    }

    /// Runs the cycle for `tick`.
    ///
    /// When a slot was used, the returned [`ReleaseHandle`] tracks its release,
    /// which has already been scheduled `grace` after the exchange finished.
    /// A client that panics still gets its slot released and yields
    /// [`CycleOutcome::Error`].
    pub async fn run_cycle(&self, tick: u64) -> (CycleReport, Option<ReleaseHandle>) {
        let start = Instant::now();
        tracing::debug!(
            tick,
            now = %humantime::format_rfc3339_seconds(SystemTime::now()),
            "cycle started"
        );

        let Some(key) = self.locks.acquire_any(&self.keys).await else {
            return (self.report(tick, None, CycleOutcome::RateLimited, start), None);
        };

        let exchange = AssertUnwindSafe(self.client.clone().oneshot(()))
            .catch_unwind()
            .await;
        let release = self.locks.schedule_release(key.clone(), self.grace);
        let outcome = match exchange {
            Ok(result) => CycleOutcome::classify(result),
            Err(panic) => {
                CycleOutcome::Error(format!("pong exchange panicked: {}", panic_message(&*panic)))
            }
        };

        (self.report(tick, Some(key), outcome, start), Some(release))
    }

    fn report(
        &self,
        tick: u64,
        lock: Option<LockKey>,
        outcome: CycleOutcome,
        start: Instant,
    ) -> CycleReport {
        self.instruments
            .cycles
            .add(1, &[KeyValue::new("outcome", outcome.label())]);
        CycleReport {
            tick,
            lock,
            outcome,
            elapsed: start.elapsed(),
        }
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

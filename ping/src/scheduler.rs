use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use slot_limit::LockStore;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio::time::MissedTickBehavior;
use tower::BoxError;
use tower::Service;

use crate::CycleOutcome;
use crate::CycleReport;
use crate::PingCoordinator;
use crate::PongReply;
use crate::coordinator::panic_message;

const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Fires one cycle per period, each on its own task.
///
/// A slow cycle never delays the next tick. Late ticks are caught up rather
/// than skipped, so every period yields exactly one [`CycleReport`].
#[derive(Debug)]
pub struct PingScheduler<S, C>
where
    S: ?Sized,
{
    coordinator: Arc<PingCoordinator<S, C>>,
    period: Duration,
    drain_timeout: Duration,
}

impl<S, C> PingScheduler<S, C>
where
    S: LockStore + ?Sized + 'static,
    C: Service<(), Response = PongReply, Error = BoxError> + Clone + Send + Sync + 'static,
    C::Future: Send,
{
    pub fn new(coordinator: Arc<PingCoordinator<S, C>>, period: Duration) -> Self {
        Self {
            coordinator,
            period,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }

    /// Bounds how long shutdown waits for in-flight cycles.
    pub fn with_drain_timeout(mut self, drain_timeout: Duration) -> Self {
        self.drain_timeout = drain_timeout;
        self
    }

    /// Ticks until `shutdown` resolves and returns the number of ticks fired.
    ///
    /// Each report is sent on `reports` as soon as its cycle ends. After
    /// shutdown no new cycles start; in-flight cycles get `drain_timeout` to
    /// finish and release their slots, then are aborted.
    pub async fn run<F>(self, reports: UnboundedSender<CycleReport>, shutdown: F) -> u64
    where
        F: Future<Output = ()>,
    {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Burst);

        let mut cycles = JoinSet::new();
        let mut ticks: u64 = 0;
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;
                () = &mut shutdown => break,
                _ = interval.tick() => {
                    let tick = ticks;
                    ticks += 1;
                    cycles.spawn(cycle(Arc::clone(&self.coordinator), tick, reports.clone()));
                }
                Some(_) = cycles.join_next(), if !cycles.is_empty() => {}
            }
        }

        tracing::info!(ticks, in_flight = cycles.len(), "scheduler stopping");
        let drained = tokio::time::timeout(self.drain_timeout, async {
            while cycles.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            tracing::warn!(
                aborted = cycles.len(),
                "in-flight cycles did not finish in time; their slots stay held"
            );
            cycles.shutdown().await;
        }
        ticks
    }
}

async fn cycle<S, C>(
    coordinator: Arc<PingCoordinator<S, C>>,
    tick: u64,
    reports: UnboundedSender<CycleReport>,
) where
    S: LockStore + ?Sized + 'static,
    C: Service<(), Response = PongReply, Error = BoxError> + Clone + Send + Sync + 'static,
    C::Future: Send,
{
    let start = Instant::now();
    let cycle = AssertUnwindSafe(coordinator.run_cycle(tick)).catch_unwind();
    let (report, release) = match cycle.await {
        Ok(done) => done,
        Err(panic) => {
            let message = format!("cycle panicked: {}", panic_message(&*panic));
            let report = CycleReport {
                tick,
                lock: None,
                outcome: CycleOutcome::Error(message),
                elapsed: start.elapsed(),
            };
            (report, None)
        }
    };

    if reports.send(report).is_err() {
        tracing::debug!(tick, "report receiver dropped");
    }

    if let Some(release) = release {
        let key = release.key().clone();
        if let Err(e) = release.completed().await {
            tracing::warn!(tick, %key, error = %e, "lock release did not complete");
        }
    }
}

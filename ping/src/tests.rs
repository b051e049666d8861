use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use futures::future::Ready;
use http::StatusCode;
use slot_limit::InMemoryLockStore;
use slot_limit::LockKey;
use slot_limit::LockManager;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tower::BoxError;
use tower::Service;

use super::*;

const GRACE: Duration = Duration::from_millis(500);

fn keys(names: &[&str]) -> Vec<LockKey> {
    names.iter().map(|name| LockKey::new(*name).unwrap()).collect()
}

fn default_keys() -> Vec<LockKey> {
    keys(&["pingLock1", "pingLock2"])
}

/// A pong stand-in that answers `status`/`body` after `delay` and counts calls.
#[derive(Clone)]
struct MockPong {
    status: StatusCode,
    body: &'static str,
    delay: Duration,
    calls: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl MockPong {
    fn new(status: StatusCode, body: &'static str, delay: Duration) -> Self {
        Self {
            status,
            body,
            delay,
            calls: Arc::new(AtomicUsize::new(0)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn world(delay: Duration) -> Self {
        Self::new(StatusCode::OK, "World", delay)
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Service<()> for MockPong {
    type Response = PongReply;
    type Error = BoxError;
    type Future =
        std::pin::Pin<Box<dyn std::future::Future<Output = Result<PongReply, BoxError>> + Send>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, _req: ()) -> Self::Future {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let reply = PongReply::new(self.status, self.body);
        let delay = self.delay;
        let in_flight = self.in_flight.clone();
        Box::pin(async move {
            tokio::time::sleep(delay).await;
            in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(reply)
        })
    }
}

fn coordinator<C>(
    store: &Arc<InMemoryLockStore>,
    client: C,
    keys: Vec<LockKey>,
) -> PingCoordinator<InMemoryLockStore, C>
where
    C: Service<(), Response = PongReply, Error = BoxError> + Clone + Send + 'static,
    C::Future: Send,
{
    PingCoordinator::new(LockManager::new(store.clone()), client, keys, GRACE)
}

#[tokio::test(start_paused = true)]
async fn test_success_holds_slot_for_grace() {
    let store = Arc::new(InMemoryLockStore::new());
    let pong = MockPong::world(Duration::ZERO);
    let coordinator = coordinator(&store, pong.clone(), default_keys());

    let start = Instant::now();
    let (report, release) = coordinator.run_cycle(0).await;

    assert_eq!(report.tick, 0);
    assert_eq!(report.outcome, CycleOutcome::Success("World".into()));
    assert_eq!(report.lock, Some(LockKey::new("pingLock1").unwrap()));
    assert_eq!(pong.calls(), 1);

    let release = release.unwrap();
    assert_eq!(release.key().as_str(), "pingLock1");
    assert!(store.is_held(release.key()).unwrap());

    let key = release.key().clone();
    release.completed().await.unwrap();
    assert!(start.elapsed() >= GRACE);
    assert!(!store.is_held(&key).unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_grace_counts_from_end_of_exchange() {
    let store = Arc::new(InMemoryLockStore::new());
    let coordinator = coordinator(&store, MockPong::world(Duration::from_secs(1)), default_keys());

    let start = Instant::now();
    let (report, release) = coordinator.run_cycle(0).await;
    assert!(report.elapsed >= Duration::from_secs(1));

    release.unwrap().completed().await.unwrap();
    assert!(start.elapsed() >= Duration::from_secs(1) + GRACE);
}

#[tokio::test(start_paused = true)]
async fn test_remote_throttle_still_releases() {
    let store = Arc::new(InMemoryLockStore::new());
    let pong = MockPong::new(StatusCode::TOO_MANY_REQUESTS, "Too many requests", Duration::ZERO);
    let coordinator = coordinator(&store, pong, default_keys());

    let (report, release) = coordinator.run_cycle(3).await;

    assert_eq!(report.outcome, CycleOutcome::Throttled(ThrottleCause::RemoteThrottled));
    let release = release.unwrap();
    let key = release.key().clone();
    release.completed().await.unwrap();
    assert!(!store.is_held(&key).unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_client_error_is_throttled() {
    let store = Arc::new(InMemoryLockStore::new());
    let pong = MockPong::new(StatusCode::NOT_FOUND, "", Duration::ZERO);
    let coordinator = coordinator(&store, pong, default_keys());

    let (report, release) = coordinator.run_cycle(0).await;

    assert_eq!(
        report.outcome,
        CycleOutcome::Throttled(ThrottleCause::RemoteClientError(404))
    );
    assert!(release.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_transport_failure_is_throttled_and_released() {
    let store = Arc::new(InMemoryLockStore::new());
    let failing = tower::service_fn(|_: ()| async {
        Err::<PongReply, BoxError>("connection refused".into())
    });
    let coordinator = coordinator(&store, failing, default_keys());

    let (report, release) = coordinator.run_cycle(0).await;

    assert_eq!(
        report.outcome,
        CycleOutcome::Throttled(ThrottleCause::TransportFailure("connection refused".into()))
    );
    let release = release.unwrap();
    let key = release.key().clone();
    release.completed().await.unwrap();
    assert!(!store.is_held(&key).unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_server_error_is_an_error() {
    let store = Arc::new(InMemoryLockStore::new());
    let pong = MockPong::new(StatusCode::INTERNAL_SERVER_ERROR, "", Duration::ZERO);
    let coordinator = coordinator(&store, pong, default_keys());

    let (report, release) = coordinator.run_cycle(0).await;

    assert!(matches!(report.outcome, CycleOutcome::Error(_)));
    assert!(release.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_all_slots_held_sends_nothing() {
    let store = Arc::new(InMemoryLockStore::new());
    let manager = LockManager::new(store.clone());
    for key in default_keys() {
        assert!(manager.try_acquire(&key).await);
    }
    let pong = MockPong::world(Duration::ZERO);
    let coordinator = coordinator(&store, pong.clone(), default_keys());

    let (report, release) = coordinator.run_cycle(0).await;

    assert_eq!(report.outcome, CycleOutcome::RateLimited);
    assert_eq!(report.lock, None);
    assert!(release.is_none());
    assert_eq!(pong.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_falls_back_to_second_slot() {
    let store = Arc::new(InMemoryLockStore::new());
    let manager = LockManager::new(store.clone());
    assert!(manager.try_acquire(&LockKey::new("pingLock1").unwrap()).await);
    let coordinator = coordinator(&store, MockPong::world(Duration::ZERO), default_keys());

    let (report, _release) = coordinator.run_cycle(0).await;

    assert_eq!(report.lock, Some(LockKey::new("pingLock2").unwrap()));
    assert_eq!(report.outcome, CycleOutcome::Success("World".into()));
}

#[tokio::test(start_paused = true)]
async fn test_processes_sharing_a_store_never_exceed_slots() {
    let store = Arc::new(InMemoryLockStore::new());
    let pong = MockPong::world(Duration::from_secs(2));
    let processes: Vec<_> = (0..3)
        .map(|_| coordinator(&store, pong.clone(), default_keys()))
        .collect();

    let reports = futures::future::join_all(processes.iter().map(|p| p.run_cycle(0))).await;

    let sent = reports
        .iter()
        .filter(|(report, _)| report.outcome == CycleOutcome::Success("World".into()))
        .count();
    let limited = reports
        .iter()
        .filter(|(report, _)| report.outcome == CycleOutcome::RateLimited)
        .count();
    assert_eq!(sent, 2);
    assert_eq!(limited, 1);
    assert_eq!(pong.max_in_flight.load(Ordering::SeqCst), 2);
}

async fn run_scheduler<C>(
    coordinator: PingCoordinator<InMemoryLockStore, C>,
    until: Duration,
) -> (u64, Vec<CycleReport>)
where
    C: Service<(), Response = PongReply, Error = BoxError> + Clone + Send + Sync + 'static,
    C::Future: Send,
{
    let (tx, mut rx) = mpsc::unbounded_channel();
    let scheduler = PingScheduler::new(Arc::new(coordinator), Duration::from_secs(1));
    let ticks = scheduler.run(tx, tokio::time::sleep(until)).await;

    let mut reports = Vec::new();
    while let Some(report) = rx.recv().await {
        reports.push(report);
    }
    reports.sort_by_key(|report| report.tick);
    (ticks, reports)
}

#[tokio::test(start_paused = true)]
async fn test_scheduler_single_slot_alternates() {
    let store = Arc::new(InMemoryLockStore::new());
    let pong = MockPong::world(Duration::from_secs(1));
    let coordinator = coordinator(&store, pong, keys(&["pingLock1"]));

    let (ticks, reports) = run_scheduler(coordinator, Duration::from_millis(2500)).await;

    assert_eq!(ticks, 3);
    let outcomes: Vec<_> = reports.into_iter().map(|report| report.outcome).collect();
    assert_eq!(
        outcomes,
        vec![
            CycleOutcome::Success("World".into()),
            CycleOutcome::RateLimited,
            CycleOutcome::Success("World".into()),
        ]
    );
    assert!(!store.is_held(&LockKey::new("pingLock1").unwrap()).unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_scheduler_caps_concurrent_requests_at_slot_count() {
    let store = Arc::new(InMemoryLockStore::new());
    let pong = MockPong::world(Duration::from_secs(3));
    let coordinator = coordinator(&store, pong.clone(), default_keys());

    let (ticks, reports) = run_scheduler(coordinator, Duration::from_millis(4500)).await;

    assert_eq!(ticks, 5);
    let outcomes: Vec<_> = reports.iter().map(|report| report.outcome.clone()).collect();
    assert_eq!(
        outcomes,
        vec![
            CycleOutcome::Success("World".into()),
            CycleOutcome::Success("World".into()),
            CycleOutcome::RateLimited,
            CycleOutcome::RateLimited,
            CycleOutcome::Success("World".into()),
        ]
    );
    assert_eq!(reports[4].lock, Some(LockKey::new("pingLock1").unwrap()));
    assert_eq!(pong.max_in_flight.load(Ordering::SeqCst), 2);
}

fn explode(_: ()) -> Ready<Result<PongReply, BoxError>> {
    panic!("pong client exploded")
}

#[tokio::test(start_paused = true)]
async fn test_panicking_exchange_releases_its_slot() {
    let store = Arc::new(InMemoryLockStore::new());
    let coordinator = coordinator(&store, tower::service_fn(explode), keys(&["a"]));

    let start = Instant::now();
    let (report, release) = coordinator.run_cycle(0).await;

    assert_eq!(report.lock, Some(LockKey::new("a").unwrap()));
    assert!(matches!(
        &report.outcome,
        CycleOutcome::Error(message) if message.contains("pong client exploded")
    ));
    let release = release.unwrap();
    assert!(store.is_held(release.key()).unwrap());

    release.completed().await.unwrap();
    assert!(start.elapsed() >= GRACE);
    assert!(!store.is_held(&LockKey::new("a").unwrap()).unwrap());

    let (again, _release) = coordinator.run_cycle(1).await;
    assert_eq!(again.lock, Some(LockKey::new("a").unwrap()));
}

#[tokio::test(start_paused = true)]
async fn test_scheduler_reports_panicking_cycle() {
    let store = Arc::new(InMemoryLockStore::new());
    let coordinator = coordinator(&store, tower::service_fn(explode), keys(&["a"]));

    let (ticks, reports) = run_scheduler(coordinator, Duration::from_millis(500)).await;

    assert_eq!(ticks, 1);
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].lock, Some(LockKey::new("a").unwrap()));
    assert!(matches!(
        &reports[0].outcome,
        CycleOutcome::Error(message) if message.contains("pong client exploded")
    ));
    // The drain waits for the release, so the slot is back.
    assert!(!store.is_held(&LockKey::new("a").unwrap()).unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_scheduler_drain_gives_up_on_hung_cycles() {
    let store = Arc::new(InMemoryLockStore::new());
    let hung = tower::service_fn(|_: ()| futures::future::pending::<Result<PongReply, BoxError>>());
    let coordinator = coordinator(&store, hung, default_keys());

    let (tx, mut rx) = mpsc::unbounded_channel();
    let scheduler = PingScheduler::new(Arc::new(coordinator), Duration::from_secs(1))
        .with_drain_timeout(Duration::from_secs(2));

    let start = Instant::now();
    let ticks = scheduler
        .run(tx, tokio::time::sleep(Duration::from_millis(2500)))
        .await;

    assert_eq!(ticks, 3);
    assert!(start.elapsed() >= Duration::from_millis(4500));

    // Both slots hang; only the third tick could report.
    let mut reports = Vec::new();
    while let Some(report) = rx.recv().await {
        reports.push(report);
    }
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].tick, 2);
    assert_eq!(reports[0].outcome, CycleOutcome::RateLimited);
}

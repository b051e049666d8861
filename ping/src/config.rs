use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use slot_limit::LockKey;

/// Runtime settings of a ping process.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "ping",
    version,
    about = "Pings pong once per tick, sharing lock slots with other ping processes"
)]
pub struct PingConfig {
    /// Endpoint called on every admitted tick.
    #[arg(long, env = "PONG_URL", default_value = "http://localhost:8080/pong")]
    pub pong_url: String,

    /// Directory shared by every ping process on this host. Defaults to
    /// `ping` under the system temp dir.
    #[arg(long, env = "PING_LOCK_DIR")]
    pub lock_dir: Option<PathBuf>,

    /// Lock slots, tried in order.
    #[arg(
        long,
        env = "PING_LOCK_KEYS",
        value_delimiter = ',',
        default_value = "pingLock1,pingLock2"
    )]
    pub lock_keys: Vec<LockKey>,

    #[arg(
        long,
        env = "PING_TICK_INTERVAL",
        default_value = "1s",
        value_parser = humantime::parse_duration
    )]
    pub tick_interval: Duration,

    /// How long a slot stays held after the exchange finished.
    #[arg(
        long,
        env = "PING_GRACE_DELAY",
        default_value = "999ms",
        value_parser = humantime::parse_duration
    )]
    pub grace_delay: Duration,

    /// Gives up on pong after this long. Unset waits forever.
    #[arg(long, env = "PING_REQUEST_TIMEOUT", value_parser = humantime::parse_duration)]
    pub request_timeout: Option<Duration>,
}

impl PingConfig {
    pub fn lock_dir(&self) -> PathBuf {
        self.lock_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("ping"))
    }
}

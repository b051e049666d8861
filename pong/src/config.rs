use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::time::Duration;

use clap::Parser;

/// Runtime settings of the pong responder.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "pong",
    version,
    about = "Answers GET /pong, admitting a fixed number of requests per second"
)]
pub struct PongConfig {
    /// Address to listen on.
    #[arg(long, env = "PONG_LISTEN", default_value = "127.0.0.1:8080")]
    pub listen: SocketAddr,

    /// Requests admitted per wall-clock second.
    #[arg(long, env = "PONG_MAX_RPS", default_value = "1")]
    pub max_requests_per_second: NonZeroU32,

    /// Simulated processing time of an admitted request.
    #[arg(
        long,
        env = "PONG_PROCESSING_DELAY",
        default_value = "1s",
        value_parser = humantime::parse_duration
    )]
    pub processing_delay: Duration,
}

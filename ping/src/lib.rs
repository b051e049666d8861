//! # Ping
//!
//! `ping` calls a pong endpoint once per tick while every ping process sharing
//! a [`slot_limit::LockStore`] stays within a fixed number of lock slots.
//!
//! ## A Cycle
//! 1. **Acquire**: The [`PingCoordinator`] tries each lock key in order. If all
//!    are held the cycle ends as [`CycleOutcome::RateLimited`] without touching
//!    the network.
//! 2. **Request**: Holding a slot, it sends one `GET` through a tower
//!    [`Service`](tower::Service), normally a [`PongClient`], and classifies
//!    the reply.
//! 3. **Release**: Once the exchange is over, the slot is released after the
//!    grace delay, whatever the outcome.
//!
//! The [`PingScheduler`] starts one cycle per tick on its own task and streams
//! every [`CycleReport`] over a channel.

mod client;
mod config;
mod coordinator;
mod error;
mod outcome;
mod scheduler;

#[cfg(test)]
mod tests;

pub use client::PongClient;
pub use client::PongReply;
pub use config::PingConfig;
pub use coordinator::PingCoordinator;
pub use error::ThrottleCause;
pub use outcome::CycleOutcome;
pub use outcome::CycleReport;
pub use scheduler::PingScheduler;

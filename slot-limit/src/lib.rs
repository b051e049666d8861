//! # slot-limit
//!
//! `slot-limit` provides the two primitives the ping/pong pair is built on:
//!
//! * **Lock slots**: a [`LockManager`] hands out named slots from a shared
//!   [`LockStore`]. Taking a slot is an atomic insert-if-absent, giving it back
//!   is a delete scheduled after a grace delay. The delay is the rate limit
//!   shared by every process using the same store.
//! * **Admission windows**: an [`AdmissionWindow`] admits at most a fixed number
//!   of requests per wall-clock second using a single compare-and-swap on packed
//!   atomic state.
//!
//! ## Key Concepts
//!
//! * **Store conflation**: a store failure on insert is reported as "slot held".
//!   Skipping a request is always preferred to double booking a slot.
//! * **Lock-Free admission**: no `Mutex` in the admission hot path. Reset, check
//!   and increment happen in one atomic step.
//! * **Strategy Trait**: the admission window is exposed through [`Strategy`] so
//!   middleware can be written against the trait.
//!
//! ## Example
//!
//! ```rust
//! use std::num::NonZeroU32;
//! use slot_limit::AdmissionWindow;
//! use slot_limit::Strategy;
//!
//! let window = AdmissionWindow::new(NonZeroU32::new(1).unwrap());
//!
//! if let Some(ticket) = window.process().continue_value() {
//!     // Request admitted, do the work...
//!     window.complete(ticket);
//! }
//! ```

use std::fmt::Debug;
use std::ops::ControlFlow;
use std::time::Duration;

mod admission;
mod dir_store;
mod error;
mod key;
mod manager;
mod memory_store;
mod store;

pub use admission::AdmissionWindow;
pub use admission::Ticket;
pub use dir_store::DirLockStore;
pub use error::LockError;
pub use key::LockKey;
pub use manager::LockManager;
pub use manager::ReleaseHandle;
pub use memory_store::InMemoryLockStore;
pub use store::LockStore;

/// Reasons why a request might be rejected by a strategy.
#[derive(Debug, Clone, PartialEq)]
pub enum Reason {
    RateLimitExceeded { retry_after: Duration },
}

/// The core trait for admission algorithms.
///
/// Middleware holds strategies behind an `Arc`, so implementations are
/// normally `Send + Sync`.
pub trait Strategy: Debug {
    /// Attempts to admit a single request.
    ///
    /// This method is non-blocking and uses atomic operations to update
    /// internal state. The returned [`Ticket`] must be handed back to
    /// [`Strategy::complete`] once the request has finished.
    ///
    /// # Errors
    ///
    /// Returns `Reason` if the rate limit has been reached.
    fn process(&self) -> ControlFlow<Reason, Ticket>;

    /// Marks an admitted request as finished, successful or not.
    fn complete(&self, ticket: Ticket);
}

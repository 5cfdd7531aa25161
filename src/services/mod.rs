//! Async runtime integration.
//!
//! Available with the `runtime` feature:
//! - [`ChannelTransport`]: `Transport` that forwards requests over a tokio channel
//! - [`StationRunner`]: single-task `select!` loop that owns the manager
//! - [`StdClock`]: `Clock` over `std::time::Instant`
//!
//! The core stays synchronous and single-threaded. The runner is the one
//! place transport notifications, UI commands and timer ticks meet.

pub mod channel;
pub mod clock;
pub mod runner;

pub use channel::*;
pub use clock::*;
pub use runner::*;

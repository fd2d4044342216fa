//! Time-related abstractions.
//!
//! `sleep` integrates with Tokio's timer wheel, so tests running with a
//! paused clock (`tokio::time::pause`) drive timers deterministically.

pub use tokio::time::{sleep, timeout, Sleep, Timeout};

pub use std::time::{Duration, Instant};

//! Runtime abstraction layer for the catalog session core.
//!
//! Every core crate goes through this crate instead of naming Tokio
//! directly, so the executor choice stays in one place.
//!
//! # Modules
//!
//! - `task`: task spawning
//! - `time`: sleep, timeouts, instants
//! - `sync`: async-aware locks and channels
//! - `timer`: a single-slot cancellable delayed task
//! - `runtime`: blocking entry points for non-async callers
//!
//! # Examples
//!
//! ```rust
//! use core_async::timer::TimerSlot;
//! use core_async::time::Duration;
//!
//! # async fn example() {
//! let slot = TimerSlot::new("example");
//! slot.arm(Duration::from_secs(30), async {
//!     // refresh something
//! });
//!
//! // Re-arming cancels the pending wait first.
//! slot.arm(Duration::from_secs(10), async {});
//! assert!(slot.is_armed());
//! slot.cancel();
//! # }
//! ```

pub mod runtime;
pub mod sync;
pub mod task;
pub mod time;
pub mod timer;

pub use task::spawn;
pub use time::{sleep, Duration, Instant};
pub use timer::TimerSlot;

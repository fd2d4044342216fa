//! Synchronization primitives.
//!
//! Async-aware locks and channels re-exported from `tokio::sync`. Use these
//! when a guard must be held across an `.await`; short critical sections
//! that never suspend can use `parking_lot` directly.
//!
//! # Examples
//!
//! ```rust
//! use core_async::sync::{watch, Mutex};
//!
//! # async fn example() {
//! let gate = Mutex::new(());
//! let _guard = gate.lock().await;
//!
//! let (tx, mut rx) = watch::channel(0u8);
//! tx.send_replace(1);
//! rx.changed().await.unwrap();
//! assert_eq!(*rx.borrow(), 1);
//! # }
//! ```

pub use tokio::sync::{
    broadcast, mpsc, oneshot, watch, Mutex, MutexGuard, Notify, RwLock, RwLockReadGuard,
    RwLockWriteGuard, Semaphore,
};

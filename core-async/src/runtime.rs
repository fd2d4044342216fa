//! Runtime utilities that abstract over the underlying executor.

pub use tokio::runtime::{Builder, Handle, Runtime};

/// Runs the provided future to completion on a throwaway current-thread
/// runtime.
///
/// Intended for synchronous call sites (logging layers, config builders)
/// that sit outside any runtime.
pub fn block_on<F>(future: F) -> std::io::Result<F::Output>
where
    F: std::future::Future,
{
    let runtime = Builder::new_current_thread().enable_all().build()?;
    Ok(runtime.block_on(future))
}

//! Abstraction over async-std task functions

use std::future::Future;

pub use async_rt::task::spawn;

use async_rt::task::spawn_blocking;
use crate::Result;

pub(crate) async fn execute_blocking<F, R>(f: F) -> Result<R>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let res = spawn_blocking(f).await;
    Ok(res)
}

/// Runs a future on async-std executor.
pub fn block_on<F: Future>(future: F) -> Result<F::Output> {
    Ok(async_rt::task::block_on(future))
}

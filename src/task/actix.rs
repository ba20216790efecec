//! Abstraction over actix task functions

use std::future::Future;

pub use actix_rt::spawn;

use actix_rt::{task, Runtime};
use crate::{Result, Error};

pub(crate) async fn execute_blocking<F, R>(f: F) -> Result<R>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    match task::spawn_blocking(f).await {
        Ok(res) => Ok(res),
        Err(err) => Err(Error::msg(format!("blocking task {}", err))),
    }
}

/// Builds a new Actix runtime and runs a future to completion on it.
pub fn block_on<F: Future>(future: F) -> Result<F::Output> {
    let runtime = Runtime::new().map_err(|err| Error::msg(format!("Actix runtime: {}", err)))?;
    Ok(runtime.block_on(future))
}

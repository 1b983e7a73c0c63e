//! Instance scoping: every started instance is stopped exactly once

use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use tracing::{info, warn};
use vmpilot_error::Result;
use vmpilot_runtime::{InstanceApi, InstanceHandle, InstanceKind};

/// Start an instance, run `body` with it, then stop it.
///
/// The instance is stopped whether `body` returns `Ok`, `Err` or panics; a
/// panic is resumed after teardown. A failing stop is logged and does not
/// replace the body's result.
pub async fn with_instance<A, F, Fut, T>(api: &A, kind: InstanceKind, body: F) -> Result<T>
where
    A: InstanceApi,
    F: FnOnce(InstanceHandle) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let handle = api.start(kind).await?;
    announce(api, &handle).await;

    let outcome = AssertUnwindSafe(body(handle.clone())).catch_unwind().await;
    stop_logged(api, &handle).await;

    match outcome {
        Ok(result) => result,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

async fn announce<A: InstanceApi>(api: &A, handle: &InstanceHandle) {
    match api.stream_url(handle).await {
        Ok(url) => info!(instance = %handle.id, kind = %handle.kind, %url, "instance ready"),
        Err(e) => warn!(instance = %handle.id, error = %e, "stream url unavailable"),
    }
}

async fn stop_logged<A: InstanceApi>(api: &A, handle: &InstanceHandle) {
    if let Err(e) = api.stop(handle).await {
        warn!(instance = %handle.id, error = %e, "failed to stop instance");
    }
}

/// A started instance whose lifetime is driven by the caller.
///
/// Consumed by `stop`, so a guard can only stop its instance once.
pub struct InstanceGuard<'a, A: InstanceApi> {
    api: &'a A,
    handle: InstanceHandle,
    stream_url: Option<String>,
}

impl<'a, A: InstanceApi> InstanceGuard<'a, A> {
    pub async fn start(api: &'a A, kind: InstanceKind) -> Result<Self> {
        let handle = api.start(kind).await?;
        let stream_url = match api.stream_url(&handle).await {
            Ok(url) => Some(url),
            Err(e) => {
                warn!(instance = %handle.id, error = %e, "stream url unavailable");
                None
            }
        };
        Ok(Self { api, handle, stream_url })
    }

    pub fn handle(&self) -> &InstanceHandle {
        &self.handle
    }

    pub fn api(&self) -> &'a A {
        self.api
    }

    pub fn stream_url(&self) -> Option<&str> {
        self.stream_url.as_deref()
    }

    pub async fn stop(self) -> Result<()> {
        let result = self.api.stop(&self.handle).await;
        if let Err(e) = &result {
            warn!(instance = %self.handle.id, error = %e, "failed to stop instance");
        }
        result
    }
}

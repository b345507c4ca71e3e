//! Scoped use of a leased instance
use anyhow::Result;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use crate::instance::{Instance, InstanceLauncher, InstanceSize};

/// Start an instance, run `body` against it and stop the instance exactly once afterwards.
///
/// The instance is stopped whether `body` succeeds, fails or panics. If both `body` and the
/// stop fail, the stop failure is logged and the error from `body` is returned.
pub async fn with_instance<F, Fut, T>(
    launcher: &dyn InstanceLauncher,
    size: InstanceSize,
    body: F,
) -> Result<T>
where
    F: FnOnce(Arc<dyn Instance>) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let instance = launcher.start(size).await?;
    tracing::info!(instance = instance.id(), size = %size, "instance started");

    let outcome = AssertUnwindSafe(body(Arc::clone(&instance)))
        .catch_unwind()
        .await;
    let stopped = instance.stop().await;
    tracing::info!(instance = instance.id(), "instance stopped");

    let result = match outcome {
        Ok(result) => result,
        Err(panic) => {
            if let Err(e) = stopped {
                tracing::warn!(instance = instance.id(), error = %e, "failed to stop instance");
            }
            std::panic::resume_unwind(panic);
        }
    };

    match (result, stopped) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) => Err(e.context(format!("failed to stop instance {}", instance.id()))),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(stop_error)) => {
            tracing::warn!(
                instance = instance.id(),
                error = %stop_error,
                "failed to stop instance after an earlier error"
            );
            Err(e)
        }
    }
}

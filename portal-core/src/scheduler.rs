//! Timer and task primitives
//!
//! Every periodic job in the session layer is started through this module and
//! owned through a [`TaskHandle`]. Dropping or cancelling the handle aborts the
//! task, so a timer never outlives the component that started it.

use crate::error::{ErrorContext, PortalError, PortalResult};
use std::future::Future;
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, MissedTickBehavior};
use tracing::{debug, trace};

/// Cancellation handle for a spawned task
#[derive(Debug)]
pub struct TaskHandle {
    name: String,
    handle: Option<JoinHandle<()>>,
}

impl TaskHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the task is still scheduled
    pub fn is_active(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Abort the task. Safe to call more than once.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            debug!(task = %self.name, "Task cancelled");
        }
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Spawn a one-off task on the current runtime
pub fn spawn_task<F>(name: impl Into<String>, future: F) -> TaskHandle
where
    F: Future<Output = ()> + Send + 'static,
{
    let name = name.into();
    debug!(task = %name, "Spawning task");
    TaskHandle {
        name,
        handle: Some(tokio::spawn(future)),
    }
}

/// Run `tick` every `period`, first after one full period has elapsed.
///
/// Each tick is awaited to completion before the next one is scheduled; late
/// ticks are delayed rather than bunched up.
pub fn spawn_interval<F, Fut>(name: impl Into<String>, period: Duration, mut tick: F) -> TaskHandle
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let name = name.into();
    let task_name = name.clone();

    spawn_task(name, async move {
        let mut interval = time::interval_at(time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            trace!(task = %task_name, "Interval tick");
            tick().await;
        }
    })
}

/// Timeout wrapper for async operations
pub async fn with_timeout<F, T>(future: F, timeout_ms: u64, operation_name: &str) -> PortalResult<T>
where
    F: Future<Output = T>,
{
    match time::timeout(Duration::from_millis(timeout_ms), future).await {
        Ok(result) => Ok(result),
        Err(_) => Err(PortalError::Timeout {
            operation: operation_name.to_string(),
            duration_ms: timeout_ms,
            context: ErrorContext::new("scheduler")
                .with_operation("timeout")
                .with_metadata("timeout_ms", &timeout_ms.to_string())
                .with_suggestion("Increase timeout duration")
                .with_suggestion("Verify service availability"),
        }),
    }
}

//! # Panic-guarded background tasks.
//!
//! [`spawn_guarded`] runs a future on tokio with a `catch_unwind` boundary.
//! A panic never escapes the task: it is logged at error level, published as a
//! `panic` event and returned from [`TaskHandle::join`] as a [`TaskPanic`].
//!
//! ```text
//! spawn_guarded(name, hub, fut)
//!   └─► tokio::spawn(AssertUnwindSafe(fut).catch_unwind())
//!         ├─ Ok(())    → Ok(())
//!         └─ Err(any)  → error!("panic: ..") + emit(panic{task,msg}) → Err(TaskPanic)
//! ```
//!
//! ## Rules
//! - Dropping a [`TaskHandle`] detaches the task; it keeps running.
//! - [`TaskHandle::join_within`] bounds the wait; on timeout the task is left
//!   to finish on its own.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::task::JoinHandle;

use crate::error::TaskPanic;
use crate::events::Event;
use crate::telemetry::TelemetryHub;

/// Handle to a task started with [`spawn_guarded`].
#[derive(Debug)]
pub struct TaskHandle {
    name: Arc<str>,
    handle: JoinHandle<Result<(), TaskPanic>>,
}

impl TaskHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn abort(&self) {
        self.handle.abort();
    }

    /// Waits up to `deadline` for the task to finish.
    ///
    /// Returns `true` if it finished (including by panic or abort).
    pub async fn join_within(&mut self, deadline: Duration) -> bool {
        if self.handle.is_finished() {
            return true;
        }
        tokio::time::timeout(deadline, &mut self.handle).await.is_ok()
    }

    /// Waits for completion. An aborted task counts as a clean exit.
    pub async fn join(self) -> Result<(), TaskPanic> {
        match self.handle.await {
            Ok(res) => res,
            Err(_) => Ok(()),
        }
    }
}

/// Spawns `fut` behind a panic boundary reporting to `hub`.
pub fn spawn_guarded<F>(name: impl Into<Arc<str>>, hub: Arc<TelemetryHub>, fut: F) -> TaskHandle
where
    F: Future<Output = ()> + Send + 'static,
{
    let name: Arc<str> = name.into();
    let task_name = Arc::clone(&name);

    let handle = tokio::spawn(async move {
        match AssertUnwindSafe(fut).catch_unwind().await {
            Ok(()) => Ok(()),
            Err(panic) => {
                let message = panic_message(&*panic);
                tracing::error!(task = %task_name, "panic: {message}");
                hub.emit(Event::panicked(&*task_name, message.clone()));
                Err(TaskPanic {
                    task: task_name.to_string(),
                    message,
                })
            }
        }
    });

    TaskHandle { name, handle }
}

/// Renders a panic payload as text.
pub fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventKind, PanicPayload};

    #[tokio::test]
    async fn test_panic_is_contained_and_reported() {
        let hub = Arc::new(TelemetryHub::default());
        let mut rx = hub.subscribe();

        let handle = spawn_guarded("probe", Arc::clone(&hub), async {
            panic!("rtt probe exploded");
        });
        let err = handle.join().await.unwrap_err();
        assert_eq!(err.task, "probe");
        assert_eq!(err.message, "rtt probe exploded");

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::Panic);
        let body: PanicPayload = serde_json::from_str(&ev.payload).unwrap();
        assert_eq!(body.task, "probe");
        assert_eq!(body.msg, "rtt probe exploded");
    }

    #[tokio::test]
    async fn test_clean_exit() {
        let hub = Arc::new(TelemetryHub::default());
        let handle = spawn_guarded("noop", hub, async {});
        assert_eq!(handle.name(), "noop");
        assert!(handle.join().await.is_ok());
    }

    #[tokio::test]
    async fn test_join_within_times_out_on_stuck_task() {
        let hub = Arc::new(TelemetryHub::default());
        let mut handle = spawn_guarded("stuck", hub, std::future::pending::<()>());
        assert!(!handle.join_within(Duration::from_millis(20)).await);
        handle.abort();
        assert!(handle.join_within(Duration::from_secs(1)).await);
    }

    #[test]
    fn test_panic_message_variants() {
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let unknown: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(&*owned), "owned");
        assert_eq!(panic_message(&*unknown), "unknown panic");
    }
}

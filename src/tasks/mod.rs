//! Supervised background tasks.
//!
//! - [`spawn_guarded`] spawn with a panic boundary reporting to telemetry
//! - [`TaskHandle`] bounded join and abort

mod guard;

pub use guard::{TaskHandle, panic_message, spawn_guarded};

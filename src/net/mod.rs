//! Host network hooks.
//!
//! - [`NetHooks`] the host's socket protect callback
//! - [`ProtectedDialer`] UDP bind / TCP connect with protection applied

mod protect;

pub use protect::{NetHooks, ProtectFn, ProtectedDialer, resolve};

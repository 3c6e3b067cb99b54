//! SDK identification reported to the host and in health snapshots.

pub const SDK_NAME: &str = "Bereznev-HY2-Core";
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");
/// Packet engine the SDK is built around.
pub const ENGINE_ID: &str = "sing-tun";

/// `"<name> <version> (<engine id>)"`.
pub fn version() -> String {
    format!("{SDK_NAME} {SDK_VERSION} ({ENGINE_ID})")
}

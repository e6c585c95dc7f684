//! Process-wide tracing setup for ledger binaries.

pub mod tracing;

pub use self::tracing::LogFormat;

/// Initialize tracing/logging from the environment.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    self::tracing::init(LogFormat::from_env(), "info");
}

//! Process-level setup shared by binaries and tests.

pub mod tracing;

pub use self::tracing::setup_tracing;

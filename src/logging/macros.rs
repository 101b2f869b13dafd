//! Re-exports of the tracing macros used throughout the crate.

pub use tracing::{debug, error, info, trace, warn};

//! The status bar: one transient message at a time.

mod channel;

pub use channel::{Severity, StatusChannel, StatusMessage};

//! File resolution and cross-job locking.
//!
//! - `ResourceLock`: the shared set of paths claimed by running jobs
//! - `ManagedFile`: one input or output path with resolve/lock/unlock
//! - `FileType`, `OutputType`, `FileRole`: small enums describing them

mod lock;
mod managed;
mod types;

pub use lock::ResourceLock;
pub use managed::{ManagedFile, ResolvedPath};
pub use types::{FileRole, FileType, OutputType};

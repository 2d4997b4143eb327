//! Progress/preview surfaces for running and draining jobs.

mod registry;
mod types;

pub use registry::JobSlotRegistry;
pub use types::{PreviewArtifact, SlotError, SlotId, SlotPhase, SlotSnapshot};

//! Job execution: lifecycle, shared services and the conversion trait.

mod conversion;
mod errors;
mod job;
mod options;
mod services;

pub use conversion::{Conversion, ConversionContext};
pub use errors::{ConversionError, ConversionResult, JobError, JobResult};
pub use job::{Job, JobHandle, JobOutcome, JobPhase, JobReport, JobSummary};
pub use options::{Dataset, RenderMode, Resolution, Speed, Transition};
pub use services::{JobServices, JobServicesBuilder};

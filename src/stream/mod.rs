pub mod pipeline;
pub mod readable;
pub mod writable;

pub use pipeline::{Pipeline, PipelineStatus};
pub use readable::{AsyncReadableStream, ReadOutcome};
pub use writable::{AsyncWritableStream, WriteOutcome};

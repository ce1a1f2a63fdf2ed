pub mod error;
pub mod sequence;
pub mod source;
pub mod view;

pub mod deferred;
pub mod sequence_configuration;
pub mod sequence_metrics;

mod context;

// Re-export the main types at the crate root
pub use deferred::Deferred;
pub use error::{SequenceError, SequenceResult};
pub use sequence::Sequence;
pub use sequence_configuration::{SequenceConfig, ViolationPolicy};
pub use sequence_metrics::SequenceStats;
pub use source::{IterSource, Source, StreamSource};
pub use view::View;

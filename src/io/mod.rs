//! Pluggable input loader and output sink (§5 "Storage is pluggable").

pub mod loader;
pub mod sink;

pub use loader::{InputLoader, LocalJsonLoader};
pub use sink::{LocalFsSink, OutputSink, S3Sink, StorageMode};

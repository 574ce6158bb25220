pub mod config;
pub mod error;
pub mod extractor;
pub mod pipeline;
pub mod scanner;

// Convenient re-exports
pub use config::{Diagnostics, IndexerConfig};
pub use error::{ConfigError, IndexError, ScanError};
pub use extractor::{extract_ids, ExtractedIds, FieldExtractor, PairingMode, TargetKeys};
pub use pipeline::{output_path_for, IdIndexer, IndexSummary, RunReport};
pub use scanner::{Flow, JsonHandler, JsonScanner, ScanOutcome, Token};

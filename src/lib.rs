// Semantic image search engine: scan filesystem roots for images, embed
// them through a pluggable vision gateway, keep the vectors in an exact
// flat index, persist the snapshot atomically, answer ranked queries.

pub mod config;
pub mod embedding;
pub mod error;
pub mod index;
pub mod indexer;
pub mod scanner;
pub mod search;
pub mod store;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::EngineConfig;
pub use embedding::EmbeddingGateway;
pub use error::{EmbedError, SearchError, StoreError};
pub use index::{Neighbor, VectorIndex};
pub use indexer::{
    BuildHandle, BuildInProgress, BuildOutcome, BuildProgress, BuildReport, CancelFlag,
    IndexBuildJob, IndexBuilder, JobState,
};
pub use scanner::ScanFilter;
pub use search::{SearchEngine, SearchResult};
pub use store::{IndexStore, SnapshotStats};

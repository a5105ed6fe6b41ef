// Service exports
pub mod cache;
pub mod embeddings;
pub mod export;
pub mod postgres;
pub mod store;

pub use cache::{CacheError, CacheKey, CacheManager};
pub use embeddings::{CachedEmbedder, OpenAiEmbedder, RetryPolicy};
pub use export::{ExportSink, FileExportSink};
pub use postgres::PostgresClient;
pub use store::{compose_user_query, CaseStore, ResourceStore, StorageError};

use async_trait::async_trait;
use bytes::Bytes;

use crate::{
    error::Result,
    types::{DeleteResult, Listing, WriteResult},
};

/// Core abstraction for the destination file store
///
/// Every call works against the store's configured coordinate and reads
/// fresh remote state; nothing is cached between calls.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// List the root directory of the store
    ///
    /// Returns `RelayError::RemoteListFailed` on any non-success response,
    /// so an empty listing always means the store really is empty.
    async fn list_entries(&self) -> Result<Listing>;

    /// Fetch the current version token for `path`
    ///
    /// Returns `None` when the path does not exist or the lookup failed.
    async fn get_sha(&self, path: &str) -> Option<String>;

    /// Create or update `path` with `content`
    ///
    /// Looks up the current token itself and includes it when present.
    /// Non-success statuses come back as an `Ok` result carrying the code
    /// and body; only transport failures are errors.
    async fn write_file(&self, path: &str, content: Bytes, message: &str) -> Result<WriteResult>;

    /// Delete `path`, which must currently be at version `sha`
    async fn delete_file(&self, path: &str, sha: &str, message: &str) -> Result<DeleteResult>;

    /// Get a human-readable identifier for this store (for logging/debugging)
    fn identifier(&self) -> String;
}

pub mod archive;
pub mod command;
pub mod config;
pub mod error;
pub mod github;
pub mod memory;
pub mod naming;
pub mod relay;
pub mod source;
pub mod store;
pub mod types;

pub use archive::{ArchiveSnapshot, GitHubArchive};
pub use command::{Command, Outcome, Reply, ReplyBody};
pub use config::RelayConfig;
pub use error::{RelayError, Result};
pub use github::GitHubStore;
pub use memory::MemoryStore;
pub use naming::{resolve_unique_name, unique_name};
pub use relay::Relay;
pub use source::{parse_source, SnapshotSource};
pub use store::RemoteStore;
pub use types::{
    DeleteResult, DeletedEntry, EntryType, IndexedEntry, Listing, RemoteEntry, RepoCoordinate,
    SourceRepo, UploadReceipt, WriteResult,
};

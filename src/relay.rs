use std::sync::Arc;
use tokio::sync::Mutex;

use crate::{
    archive::{ArchiveSnapshot, GitHubArchive},
    config::RelayConfig,
    error::{RelayError, Result},
    github::GitHubStore,
    naming::resolve_unique_name,
    source::{parse_source, SnapshotSource},
    store::RemoteStore,
    types::{DeletedEntry, IndexedEntry, SourceRepo, UploadReceipt},
};

/// Relays repository snapshots into a single destination store
///
/// One `Relay` is bound to one destination. Its own uploads and deletes are
/// serialized so that two of them never act on the same stale listing;
/// writers outside this process can still race with it.
pub struct Relay {
    store: Arc<dyn RemoteStore>,
    snapshots: Arc<dyn SnapshotSource>,
    candidate_branches: Vec<String>,
    mutation: Mutex<()>,
}

impl Relay {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        snapshots: Arc<dyn SnapshotSource>,
        candidate_branches: Vec<String>,
    ) -> Self {
        Self {
            store,
            snapshots,
            candidate_branches,
            mutation: Mutex::new(()),
        }
    }

    /// Wire up the GitHub store and archive fetcher described by `config`
    pub fn from_config(config: &RelayConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(
            Arc::new(GitHubStore::new(config)?),
            Arc::new(GitHubArchive::new(config)?),
            config.candidate_branches.clone(),
        ))
    }

    /// Fetch `source_url`'s archive and store it under a free name
    pub async fn upload(&self, source_url: &str) -> Result<UploadReceipt> {
        let source = parse_source(source_url)?;
        tracing::info!("upload requested for {}/{}", source.owner, source.repo);

        let snapshot = self
            .snapshots
            .fetch_snapshot(&source, &self.candidate_branches)
            .await?
            .ok_or_else(|| RelayError::SourceUnavailable {
                repo: source.repo.clone(),
            })?;

        let outcome = self.store_snapshot(&source, &snapshot).await;
        snapshot.discard();
        outcome
    }

    async fn store_snapshot(&self, source: &SourceRepo, snapshot: &ArchiveSnapshot) -> Result<UploadReceipt> {
        let content = snapshot.read().await?;
        let base_name = format!("uploaded_{}.zip", source.repo);

        let _guard = self.mutation.lock().await;
        let target = resolve_unique_name(self.store.as_ref(), &base_name).await?;
        tracing::info!("storing {} as {} on {}", source.repo, target, self.store.identifier());

        let message = format!("Add or update {}", target);
        let result = self.store.write_file(&target, content, &message).await?;
        if !result.is_success() {
            tracing::warn!("write of {} rejected with {}", target, result.status);
            return Err(RelayError::RemoteWriteFailed {
                status: result.status,
                body: result.body,
            });
        }

        Ok(UploadReceipt {
            repo: source.repo.clone(),
            stored_as: target,
            branch: snapshot.branch.clone(),
            size: snapshot.size,
            digest: snapshot.digest.clone(),
        })
    }

    /// Current listing of the store, indexed in remote order
    pub async fn list(&self) -> Result<Vec<IndexedEntry>> {
        let listing = self.store.list_entries().await?;
        Ok(IndexedEntry::from_listing(&listing))
    }

    /// Delete the entry at `index` of a freshly fetched listing
    pub async fn delete(&self, index: i64) -> Result<DeletedEntry> {
        let _guard = self.mutation.lock().await;
        let listing = self.store.list_entries().await?;

        let position = usize::try_from(index)
            .ok()
            .filter(|&i| i < listing.len())
            .ok_or_else(|| RelayError::invalid_input("Invalid index"))?;
        let entry = &listing[position];
        tracing::info!("deleting {} (index {}) from {}", entry.name, position, self.store.identifier());

        let message = format!("Delete {}", entry.name);
        let result = self.store.delete_file(&entry.name, &entry.sha, &message).await?;
        if !result.is_success() {
            tracing::warn!("delete of {} rejected with {}", entry.name, result.status);
            return Err(RelayError::RemoteDeleteFailed {
                index: position,
                path: entry.name.clone(),
                status: result.status,
                body: result.body,
            });
        }

        Ok(DeletedEntry {
            index: position,
            filename: entry.name.clone(),
        })
    }
}

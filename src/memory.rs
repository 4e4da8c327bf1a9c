use async_trait::async_trait;
use bytes::Bytes;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::{
    error::{RelayError, Result},
    store::RemoteStore,
    types::{DeleteResult, EntryType, Listing, RemoteEntry, WriteResult},
};

struct StoredEntry {
    entry: RemoteEntry,
    content: Bytes,
}

#[derive(Default)]
struct State {
    entries: Vec<StoredEntry>,
    forced_write_failure: Option<(u16, String)>,
    forced_list_failure: Option<(u16, String)>,
    writes: usize,
}

/// In-memory store with the same version-token rules as the contents API
///
/// Creating an existing path without a token is rejected with 422, and a
/// token that does not match the current version is rejected with 409.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a file directly, bypassing the write path
    pub async fn insert_file(&self, name: &str, content: &[u8]) {
        let mut state = self.state.write().await;
        state.entries.push(StoredEntry {
            entry: RemoteEntry {
                name: name.to_string(),
                sha: content_sha(content),
                entry_type: EntryType::File,
            },
            content: Bytes::copy_from_slice(content),
        });
    }

    pub async fn insert_dir(&self, name: &str) {
        let mut state = self.state.write().await;
        state.entries.push(StoredEntry {
            entry: RemoteEntry {
                name: name.to_string(),
                sha: content_sha(name.as_bytes()),
                entry_type: EntryType::Dir,
            },
            content: Bytes::new(),
        });
    }

    /// Make every following write answer with `status` and `body`
    pub async fn fail_writes_with(&self, status: u16, body: &str) {
        self.state.write().await.forced_write_failure = Some((status, body.to_string()));
    }

    /// Make every following listing answer with `status` and `body`
    pub async fn fail_listings_with(&self, status: u16, body: &str) {
        self.state.write().await.forced_list_failure = Some((status, body.to_string()));
    }

    pub async fn content(&self, name: &str) -> Option<Bytes> {
        let state = self.state.read().await;
        state
            .entries
            .iter()
            .find(|e| e.entry.name == name)
            .map(|e| e.content.clone())
    }

    /// Number of write calls that reached the store
    pub async fn write_count(&self) -> usize {
        self.state.read().await.writes
    }

    async fn put(&self, path: &str, content: Bytes, sha: Option<&str>) -> WriteResult {
        let mut state = self.state.write().await;
        state.writes += 1;

        if let Some((status, body)) = &state.forced_write_failure {
            return WriteResult {
                status: *status,
                body: body.clone(),
            };
        }

        let new_sha = content_sha(&content);
        let position = state.entries.iter().position(|e| e.entry.name == path);
        match (position, sha) {
            (Some(idx), Some(sha)) if state.entries[idx].entry.sha == sha => {
                let stored = &mut state.entries[idx];
                stored.entry.sha = new_sha.clone();
                stored.content = content;
                WriteResult {
                    status: 200,
                    body: format!(r#"{{"content":{{"name":"{}","sha":"{}"}}}}"#, path, new_sha),
                }
            }
            (Some(_), Some(sha)) => WriteResult {
                status: 409,
                body: format!(r#"{{"message":"{} does not match {}"}}"#, path, sha),
            },
            (Some(_), None) => WriteResult {
                status: 422,
                body: r#"{"message":"Invalid request.\n\n\"sha\" wasn't supplied."}"#.to_string(),
            },
            (None, _) => {
                state.entries.push(StoredEntry {
                    entry: RemoteEntry {
                        name: path.to_string(),
                        sha: new_sha.clone(),
                        entry_type: EntryType::File,
                    },
                    content,
                });
                WriteResult {
                    status: 201,
                    body: format!(r#"{{"content":{{"name":"{}","sha":"{}"}}}}"#, path, new_sha),
                }
            }
        }
    }

    /// Write with an explicit token instead of looking the current one up
    #[cfg(test)]
    async fn write_with_sha(&self, path: &str, content: Bytes, sha: Option<&str>) -> WriteResult {
        self.put(path, content, sha).await
    }
}

fn content_sha(content: &[u8]) -> String {
    format!("{:x}", Sha256::digest(content))
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn list_entries(&self) -> Result<Listing> {
        let state = self.state.read().await;
        if let Some((status, body)) = &state.forced_list_failure {
            return Err(RelayError::RemoteListFailed {
                status: *status,
                body: body.clone(),
            });
        }
        Ok(state.entries.iter().map(|e| e.entry.clone()).collect())
    }

    async fn get_sha(&self, path: &str) -> Option<String> {
        let state = self.state.read().await;
        state
            .entries
            .iter()
            .find(|e| e.entry.name == path)
            .map(|e| e.entry.sha.clone())
    }

    async fn write_file(&self, path: &str, content: Bytes, _message: &str) -> Result<WriteResult> {
        let sha = self.get_sha(path).await;
        Ok(self.put(path, content, sha.as_deref()).await)
    }

    async fn delete_file(&self, path: &str, sha: &str, _message: &str) -> Result<DeleteResult> {
        let mut state = self.state.write().await;
        let position = state.entries.iter().position(|e| e.entry.name == path);

        let result = match position {
            Some(idx) if state.entries[idx].entry.sha == sha => {
                state.entries.remove(idx);
                DeleteResult {
                    status: 200,
                    body: "{}".to_string(),
                }
            }
            Some(_) => DeleteResult {
                status: 409,
                body: format!(r#"{{"message":"{} does not match {}"}}"#, path, sha),
            },
            None => DeleteResult {
                status: 404,
                body: r#"{"message":"Not Found"}"#.to_string(),
            },
        };
        Ok(result)
    }

    fn identifier(&self) -> String {
        "memory://".to_string()
    }
}

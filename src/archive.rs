use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempPath;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::time::timeout;

use crate::{
    config::RelayConfig,
    error::{RelayError, Result},
    github::USER_AGENT,
    source::SnapshotSource,
    types::SourceRepo,
};

/// A downloaded archive staged on local disk
///
/// The file is removed when the snapshot is dropped; `discard` does the
/// same eagerly and reports failures.
#[derive(Debug)]
pub struct ArchiveSnapshot {
    path: TempPath,
    /// Branch the archive was taken from
    pub branch: String,
    pub size: u64,
    /// Hex SHA-256 of the archive bytes
    pub digest: String,
}

impl ArchiveSnapshot {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole archive back into memory
    pub async fn read(&self) -> Result<Bytes> {
        Ok(Bytes::from(tokio::fs::read(&self.path).await?))
    }

    /// Stage an archive that is already in memory
    pub async fn from_bytes(staging_dir: &Path, repo: &str, branch: &str, content: &[u8]) -> Result<Self> {
        let (mut file, path) = stage_file(staging_dir, repo)?;
        file.write_all(content).await?;
        file.flush().await?;

        Ok(Self {
            path,
            branch: branch.to_string(),
            size: content.len() as u64,
            digest: format!("{:x}", Sha256::digest(content)),
        })
    }

    /// Remove the staged file now
    pub fn discard(self) {
        let shown = self.path.display().to_string();
        match self.path.close() {
            Ok(()) => tracing::debug!("removed staged archive {shown}"),
            Err(e) => tracing::warn!("failed to remove staged archive {shown}: {e}"),
        }
    }
}

/// Create an empty `{repo}-XXXXXX.zip` file in `dir`
///
/// The random part keeps concurrent fetches of the same repo apart.
fn stage_file(dir: &Path, repo: &str) -> Result<(File, TempPath)> {
    let staged = tempfile::Builder::new()
        .prefix(&format!("{}-", repo))
        .suffix(".zip")
        .tempfile_in(dir)?;
    let (file, path) = staged.into_parts();
    Ok((File::from_std(file), path))
}

/// Fetches `.zip` snapshots from GitHub's archive host
///
/// Downloads `{base}/{owner}/{repo}/archive/refs/heads/{branch}.zip` and
/// streams the body to a uniquely named file in the staging directory.
///
/// The archive timeout bounds each wait (connect, response head, every body
/// chunk), not the whole transfer.
#[derive(Clone)]
pub struct GitHubArchive {
    client: Client,
    base: String,
    staging_dir: PathBuf,
    idle_timeout: Duration,
}

impl GitHubArchive {
    pub fn new(config: &RelayConfig) -> Result<Self> {
        let idle_timeout = config.archive_timeout();
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(idle_timeout)
            .build()?;

        Ok(Self {
            client,
            base: config.archive_base.trim_end_matches('/').to_string(),
            staging_dir: config.staging_dir(),
            idle_timeout,
        })
    }

    fn archive_url(&self, source: &SourceRepo, branch: &str) -> String {
        format!(
            "{}/{}/{}/archive/refs/heads/{}.zip",
            self.base, source.owner, source.repo, branch
        )
    }

    /// Stream one branch's archive to disk
    ///
    /// `Ok(None)` means the branch did not answer with an archive. Once it
    /// has answered 200, a broken or stalled body is an error: the branch
    /// exists, so falling back to another one would store the wrong snapshot.
    async fn try_branch(&self, source: &SourceRepo, branch: &str) -> Result<Option<ArchiveSnapshot>> {
        let url = self.archive_url(source, branch);
        tracing::debug!("GET {url}");

        let mut response = match timeout(self.idle_timeout, self.client.get(&url).send()).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                tracing::debug!("archive request for {branch} failed: {e}");
                return Ok(None);
            }
            Err(_) => {
                tracing::debug!("archive request for {branch} got no answer in {:?}", self.idle_timeout);
                return Ok(None);
            }
        };
        if response.status() != StatusCode::OK {
            tracing::debug!("archive for {branch} returned {}", response.status());
            return Ok(None);
        }

        let (mut file, path) = stage_file(&self.staging_dir, &source.repo)?;

        let mut hasher = Sha256::new();
        let mut size = 0u64;
        loop {
            let chunk = match timeout(self.idle_timeout, response.chunk()).await {
                Ok(Ok(Some(chunk))) => chunk,
                Ok(Ok(None)) => break,
                Ok(Err(e)) => return Err(interrupted(branch, e.to_string())),
                Err(_) => {
                    return Err(interrupted(
                        branch,
                        format!("no data for {:?} after {} bytes", self.idle_timeout, size),
                    ))
                }
            };
            hasher.update(&chunk);
            size += chunk.len() as u64;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        Ok(Some(ArchiveSnapshot {
            path,
            branch: branch.to_string(),
            size,
            digest: format!("{:x}", hasher.finalize()),
        }))
    }
}

fn interrupted(branch: &str, message: String) -> RelayError {
    tracing::warn!("archive stream for {branch} broke off: {message}");
    RelayError::ArchiveInterrupted {
        branch: branch.to_string(),
        message,
    }
}

#[async_trait]
impl SnapshotSource for GitHubArchive {
    async fn fetch_snapshot(
        &self,
        source: &SourceRepo,
        branches: &[String],
    ) -> Result<Option<ArchiveSnapshot>> {
        for branch in branches {
            if let Some(snapshot) = self.try_branch(source, branch).await? {
                tracing::info!(
                    "fetched {}/{}@{} ({} bytes)",
                    source.owner,
                    source.repo,
                    branch,
                    snapshot.size
                );
                return Ok(Some(snapshot));
            }
        }
        Ok(None)
    }
}

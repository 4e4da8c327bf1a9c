use async_trait::async_trait;

use crate::{
    archive::ArchiveSnapshot,
    error::{RelayError, Result},
    types::SourceRepo,
};

/// Produces local snapshots of source repositories
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Download a snapshot of `source`, trying `branches` in order
    ///
    /// Returns `Ok(None)` when no branch yields an archive; local staging
    /// failures are errors.
    async fn fetch_snapshot(
        &self,
        source: &SourceRepo,
        branches: &[String],
    ) -> Result<Option<ArchiveSnapshot>>;
}

/// Derive `(owner, repo)` from a repository URL or `owner/repo` string
///
/// Strips a trailing `.git` and trailing slashes, then takes the last two
/// `/`-separated segments.
pub fn parse_source(input: &str) -> Result<SourceRepo> {
    let mut trimmed = input.trim().trim_end_matches('/');
    if let Some(stripped) = trimmed.strip_suffix(".git") {
        trimmed = stripped.trim_end_matches('/');
    }

    let mut segments = trimmed.rsplit('/');
    let repo = segments.next().unwrap_or_default();
    let owner = segments.next().unwrap_or_default();

    if owner.is_empty() || repo.is_empty() || owner.ends_with(':') {
        return Err(RelayError::invalid_input(format!(
            "Invalid GitHub repo URL: {}",
            input.trim()
        )));
    }

    Ok(SourceRepo {
        owner: owner.to_string(),
        repo: repo.to_string(),
    })
}

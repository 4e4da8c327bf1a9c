use serde::{Deserialize, Serialize};

/// Identifies a repository at a given branch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoCoordinate {
    /// Repository owner (user or organization)
    pub owner: String,
    /// Repository name
    pub repo: String,
    /// Branch the coordinate refers to
    pub branch: String,
}

impl RepoCoordinate {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            branch: branch.into(),
        }
    }
}

impl std::fmt::Display for RepoCoordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}@{}", self.owner, self.repo, self.branch)
    }
}

/// A source repository before its branch has been resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRepo {
    pub owner: String,
    pub repo: String,
}

impl SourceRepo {
    pub fn at_branch(&self, branch: &str) -> RepoCoordinate {
        RepoCoordinate::new(self.owner.clone(), self.repo.clone(), branch)
    }
}

/// Type of a remote listing entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    File,
    Dir,
    Symlink,
    Submodule,
}

impl EntryType {
    pub fn from_api(kind: &str) -> Option<Self> {
        match kind {
            "file" => Some(EntryType::File),
            "dir" => Some(EntryType::Dir),
            "symlink" => Some(EntryType::Symlink),
            "submodule" => Some(EntryType::Submodule),
            _ => None,
        }
    }
}

/// One item in a remote directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub name: String,
    /// Content-version token the store requires to overwrite or delete
    pub sha: String,
    pub entry_type: EntryType,
}

/// Point-in-time snapshot of the store's root directory, in remote order
pub type Listing = Vec<RemoteEntry>;

/// A listing entry as reported to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexedEntry {
    pub index: usize,
    pub name: String,
    pub sha: String,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
}

impl IndexedEntry {
    pub fn from_listing(listing: &[RemoteEntry]) -> Vec<IndexedEntry> {
        listing
            .iter()
            .enumerate()
            .map(|(index, e)| IndexedEntry {
                index,
                name: e.name.clone(),
                sha: e.sha.clone(),
                entry_type: e.entry_type,
            })
            .collect()
    }
}

/// Outcome of a create-or-update call
#[derive(Debug, Clone)]
pub struct WriteResult {
    pub status: u16,
    pub body: String,
}

impl WriteResult {
    pub fn is_success(&self) -> bool {
        self.status == 200 || self.status == 201
    }
}

/// Outcome of a delete call
#[derive(Debug, Clone)]
pub struct DeleteResult {
    pub status: u16,
    pub body: String,
}

impl DeleteResult {
    pub fn is_success(&self) -> bool {
        self.status == 200
    }
}

/// What a successful upload produced
#[derive(Debug, Clone)]
pub struct UploadReceipt {
    /// Source repository name
    pub repo: String,
    /// Name the archive was stored under
    pub stored_as: String,
    /// Branch the snapshot was taken from
    pub branch: String,
    pub size: u64,
    /// Hex SHA-256 of the archive bytes
    pub digest: String,
}

/// What a successful delete removed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletedEntry {
    pub index: usize,
    pub filename: String,
}

use std::collections::HashSet;

use crate::{
    error::Result,
    store::RemoteStore,
    types::{EntryType, RemoteEntry},
};

/// Pick a name not taken by any file in `listing`
///
/// Returns `base` unchanged when it is free, otherwise the first free
/// `{stem}_{n}{ext}` for n = 1, 2, ... Comparison is exact and
/// case-sensitive. Directory entries do not block a name.
pub fn unique_name(base: &str, listing: &[RemoteEntry]) -> String {
    let taken: HashSet<&str> = listing
        .iter()
        .filter(|e| e.entry_type == EntryType::File)
        .map(|e| e.name.as_str())
        .collect();

    if !taken.contains(base) {
        return base.to_string();
    }

    let (stem, ext) = split_extension(base);
    (1u64..)
        .map(|counter| format!("{}_{}{}", stem, counter, ext))
        .find(|candidate| !taken.contains(candidate.as_str()))
        .unwrap_or_else(|| base.to_string())
}

/// Fetch the current listing and pick a free name for `base`
pub async fn resolve_unique_name(store: &dyn RemoteStore, base: &str) -> Result<String> {
    let listing = store.list_entries().await?;
    Ok(unique_name(base, &listing))
}

/// Split at the rightmost `.`; leading dots never start an extension
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if !name[..idx].chars().all(|c| c == '.') => name.split_at(idx),
        _ => (name, ""),
    }
}

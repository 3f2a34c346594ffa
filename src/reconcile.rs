use std::collections::{BTreeMap, BTreeSet};

use crate::mapping::IdentityMapping;
use crate::playlist_types::{RemotePlaylist, SourcePlaylist};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReconcileError {
    #[error("Playlist name {name:?} is declared more than once")]
    DuplicateDeclaredName { name: String },
    #[error("Playlist name {name:?} is used by more than one remote playlist")]
    DuplicateRemoteName { name: String },
    #[error("Remote sample is empty, nothing to dry run against")]
    EmptyRemoteSample,
    #[error("No declared playlist is named {name:?}")]
    NoDryRunMatch { name: String },
    #[error("Declared playlist {name:?} has no remote counterpart")]
    Unpublished { name: String },
}

/// Track changes that turn a remote track set into the declared one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackDelta {
    pub to_add: BTreeSet<String>,
    pub to_remove: BTreeSet<String>,
}

impl TrackDelta {
    pub fn between(declared: &BTreeSet<String>, remote: &BTreeSet<String>) -> Self {
        Self {
            to_add: declared.difference(remote).cloned().collect(),
            to_remove: remote.difference(declared).cloned().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }

    pub fn apply(&self, tracks: &BTreeSet<String>) -> BTreeSet<String> {
        tracks
            .difference(&self.to_remove)
            .chain(self.to_add.iter())
            .cloned()
            .collect()
    }
}

/// The diff computed for one run. Playlists are joined by name only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionPlan {
    pub to_create: BTreeSet<String>,
    pub to_delete: BTreeSet<String>,
    /// Every playlist present on both sides, including those whose delta is empty.
    pub to_update: BTreeMap<String, TrackDelta>,
    /// Declared playlists whose remote description differs. Created playlists
    /// start with an empty description.
    pub to_describe: BTreeSet<String>,
}

impl ActionPlan {
    /// True when applying the plan would not touch the remote account.
    pub fn is_noop(&self) -> bool {
        self.to_create.is_empty()
            && self.to_delete.is_empty()
            && self.to_describe.is_empty()
            && self.to_update.values().all(TrackDelta::is_empty)
    }
}

/// Remote playlists keyed by name. Created playlists are registered here so that
/// track additions and the identity mapping can see their ids.
#[derive(Debug, Clone, Default)]
pub struct WorkingSet {
    playlists: BTreeMap<String, RemotePlaylist>,
}

impl WorkingSet {
    pub fn get(&self, name: &str) -> Option<&RemotePlaylist> {
        self.playlists.get(name)
    }

    pub fn register_created(&mut self, name: &str, id: String) {
        self.playlists.insert(
            name.to_string(),
            RemotePlaylist::created(id, name.to_string()),
        );
    }

    /// Changes needed to converge the remote playlist named like `declared`.
    pub fn track_delta(&self, declared: &SourcePlaylist) -> Result<TrackDelta, ReconcileError> {
        let remote = self.require(&declared.name)?;
        Ok(TrackDelta::between(&declared.track_ids, &remote.track_ids))
    }

    pub fn set_description(&mut self, name: &str, description: &str) -> Result<(), ReconcileError> {
        let remote = self
            .playlists
            .get_mut(name)
            .ok_or_else(|| ReconcileError::Unpublished {
                name: name.to_string(),
            })?;
        remote.description = description.to_string();
        Ok(())
    }

    /// Records that `delta` was applied to the playlist called `name`.
    pub fn apply(&mut self, name: &str, delta: &TrackDelta) -> Result<(), ReconcileError> {
        let remote = self
            .playlists
            .get_mut(name)
            .ok_or_else(|| ReconcileError::Unpublished {
                name: name.to_string(),
            })?;
        remote.track_ids = delta.apply(&remote.track_ids);
        Ok(())
    }

    /// Links each declared playlist, in declared order, to the remote id published
    /// under its name.
    pub fn identity_mapping(
        &self,
        declared: &[SourcePlaylist],
    ) -> Result<IdentityMapping, ReconcileError> {
        let mut mapping = IdentityMapping::default();
        for playlist in declared {
            let remote = self.require(&playlist.name)?;
            mapping.push(&playlist.id, &remote.id);
        }
        Ok(mapping)
    }

    /// Remote id of every declared playlist, keyed by name.
    pub fn published_ids(
        &self,
        declared: &[SourcePlaylist],
    ) -> Result<BTreeMap<String, String>, ReconcileError> {
        declared
            .iter()
            .map(|playlist| {
                let remote = self.require(&playlist.name)?;
                Ok((playlist.name.clone(), remote.id.clone()))
            })
            .collect()
    }

    fn require(&self, name: &str) -> Result<&RemotePlaylist, ReconcileError> {
        self.playlists
            .get(name)
            .ok_or_else(|| ReconcileError::Unpublished {
                name: name.to_string(),
            })
    }
}

#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub plan: ActionPlan,
    pub working: WorkingSet,
}

/// Computes the plan converging `remote` to `declared`.
///
/// Names must be unique on each side.
pub fn reconcile(
    declared: &[SourcePlaylist],
    remote: &[RemotePlaylist],
) -> Result<Reconciliation, ReconcileError> {
    let mut declared_by_name: BTreeMap<&str, &SourcePlaylist> = BTreeMap::new();
    for playlist in declared {
        if declared_by_name
            .insert(playlist.name.as_str(), playlist)
            .is_some()
        {
            return Err(ReconcileError::DuplicateDeclaredName {
                name: playlist.name.clone(),
            });
        }
    }

    let mut working = WorkingSet::default();
    for playlist in remote {
        if working
            .playlists
            .insert(playlist.name.clone(), playlist.clone())
            .is_some()
        {
            return Err(ReconcileError::DuplicateRemoteName {
                name: playlist.name.clone(),
            });
        }
    }

    let mut plan = ActionPlan::default();
    for (name, playlist) in &declared_by_name {
        let remote_description = match working.get(name) {
            Some(existing) => {
                plan.to_update.insert(
                    name.to_string(),
                    TrackDelta::between(&playlist.track_ids, &existing.track_ids),
                );
                existing.description.as_str()
            }
            None => {
                plan.to_create.insert(name.to_string());
                ""
            }
        };
        if playlist.description != remote_description {
            plan.to_describe.insert(name.to_string());
        }
    }
    plan.to_delete = working
        .playlists
        .keys()
        .filter(|name| !declared_by_name.contains_key(name.as_str()))
        .cloned()
        .collect();

    Ok(Reconciliation { plan, working })
}

/// Narrows `declared` to the first playlist named `name`, skipping everything
/// before it. Returns the one-element slice and how many playlists were skipped.
pub fn narrow_to_sample<'a>(
    declared: &'a [SourcePlaylist],
    name: &str,
) -> Result<(&'a [SourcePlaylist], usize), ReconcileError> {
    let skipped = declared
        .iter()
        .position(|playlist| playlist.name == name)
        .ok_or_else(|| ReconcileError::NoDryRunMatch {
            name: name.to_string(),
        })?;
    Ok((&declared[skipped..=skipped], skipped))
}

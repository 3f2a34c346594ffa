use std::collections::BTreeSet;

/// A playlist declared by the scraped archive. This is the state we publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePlaylist {
    /// Identifier of the scraped playlist (trailing segment of its URL)
    pub id: String,
    pub name: String,
    pub description: String,
    pub track_ids: BTreeSet<String>,
}

/// A playlist owned by the publishing account on the remote service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemotePlaylist {
    /// Opaque identifier assigned by the remote service
    pub id: String,
    pub name: String,
    pub description: String,
    pub track_ids: BTreeSet<String>,
}

impl RemotePlaylist {
    /// An empty playlist that was just created under `id`.
    pub fn created(id: String, name: String) -> Self {
        Self {
            id,
            name,
            description: String::new(),
            track_ids: BTreeSet::new(),
        }
    }
}

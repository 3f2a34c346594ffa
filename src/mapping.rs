use std::collections::{HashMap, HashSet};
use std::path::Path;

use color_eyre::eyre::{Result, WrapErr};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum MappingError {
    #[error("Failed to parse playlist mapping: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Failed to serialize playlist mapping: {0}")]
    Serialize(serde_json::Error),
    #[error("Scraped playlist {0:?} is listed more than once")]
    DuplicateScrapedId(String),
    #[error("Published playlist {0:?} is listed more than once")]
    DuplicatePublishedId(String),
    #[error("Scraped playlist {0:?} has no published playlists")]
    EmptyPublishedIds(String),
}

/// One scraped playlist and the playlists it was published as.
///
/// Fields are declared in sorted order; serde writes them in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct PlaylistEntry {
    published_playlist_ids: Vec<String>,
    scraped_playlist_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct MappingDocument {
    playlists: Vec<PlaylistEntry>,
}

/// Links scraped playlist ids to the remote ids they were published under,
/// in the order the scraped playlists were first seen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityMapping {
    entries: Vec<PlaylistEntry>,
    index: HashMap<String, usize>,
}

impl IdentityMapping {
    /// Appends `published_id` to the entry for `scraped_id`, creating it if needed.
    pub fn push(&mut self, scraped_id: &str, published_id: &str) {
        let position = match self.index.get(scraped_id) {
            Some(position) => *position,
            None => {
                self.entries.push(PlaylistEntry {
                    published_playlist_ids: Vec::new(),
                    scraped_playlist_id: scraped_id.to_string(),
                });
                self.index
                    .insert(scraped_id.to_string(), self.entries.len() - 1);
                self.entries.len() - 1
            }
        };
        self.entries[position]
            .published_playlist_ids
            .push(published_id.to_string());
    }

    pub fn get(&self, scraped_id: &str) -> Option<&[String]> {
        self.index
            .get(scraped_id)
            .map(|position| self.entries[*position].published_playlist_ids.as_slice())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(scraped_id, published_ids)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries.iter().map(|entry| {
            (
                entry.scraped_playlist_id.as_str(),
                entry.published_playlist_ids.as_slice(),
            )
        })
    }

    /// Canonical text form: sorted keys, two space indentation, no trailing newline.
    pub fn to_json(&self) -> Result<String, MappingError> {
        let document = MappingDocument {
            playlists: self.entries.clone(),
        };
        serde_json::to_string_pretty(&document).map_err(MappingError::Serialize)
    }

    /// Parses a persisted mapping. A scraped id may only appear once, and a
    /// published id may only belong to a single entry, once.
    pub fn from_json(json: &str) -> Result<Self, MappingError> {
        let document: MappingDocument = serde_json::from_str(json)?;

        let mut mapping = Self::default();
        let mut published = HashSet::new();
        for entry in document.playlists {
            if mapping.index.contains_key(&entry.scraped_playlist_id) {
                return Err(MappingError::DuplicateScrapedId(entry.scraped_playlist_id));
            }
            if entry.published_playlist_ids.is_empty() {
                return Err(MappingError::EmptyPublishedIds(entry.scraped_playlist_id));
            }
            for published_id in &entry.published_playlist_ids {
                if !published.insert(published_id.clone()) {
                    return Err(MappingError::DuplicatePublishedId(published_id.clone()));
                }
            }
            for published_id in &entry.published_playlist_ids {
                mapping.push(&entry.scraped_playlist_id, published_id);
            }
        }
        Ok(mapping)
    }

    /// Reads the mapping at `path`, or `None` if there is no file yet.
    pub async fn read(path: &Path) -> Result<Option<Self>> {
        if !tokio::fs::try_exists(path)
            .await
            .wrap_err_with(|| format!("Failed to check for mapping at {}", path.display()))?
        {
            return Ok(None);
        }
        let json = tokio::fs::read_to_string(path)
            .await
            .wrap_err_with(|| format!("Failed to read mapping from {}", path.display()))?;
        let mapping = Self::from_json(&json)
            .wrap_err_with(|| format!("Invalid mapping in {}", path.display()))?;
        Ok(Some(mapping))
    }

    pub async fn write(&self, path: &Path) -> Result<()> {
        tokio::fs::write(path, self.to_json()?)
            .await
            .wrap_err_with(|| format!("Failed to write mapping to {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    fn sample_mapping() -> IdentityMapping {
        let mut mapping = IdentityMapping::default();
        mapping.push("scraped_2", "published_2a");
        mapping.push("scraped_1", "published_1b");
        mapping.push("scraped_2", "published_2b");
        mapping.push("scraped_1", "published_1a");
        mapping
    }

    #[test]
    fn test_to_json_is_canonical() {
        let json = sample_mapping().to_json().unwrap();

        assert_eq!(
            json,
            r#"{
  "playlists": [
    {
      "published_playlist_ids": [
        "published_2a",
        "published_2b"
      ],
      "scraped_playlist_id": "scraped_2"
    },
    {
      "published_playlist_ids": [
        "published_1b",
        "published_1a"
      ],
      "scraped_playlist_id": "scraped_1"
    }
  ]
}"#
        );
    }

    #[test]
    fn test_to_json_is_deterministic() {
        let mapping = sample_mapping();

        assert_eq!(mapping.to_json().unwrap(), mapping.to_json().unwrap());
        assert_eq!(
            mapping.to_json().unwrap(),
            sample_mapping().to_json().unwrap()
        );
    }

    #[test]
    fn test_empty_mapping_json() {
        assert_eq!(
            IdentityMapping::default().to_json().unwrap(),
            "{\n  \"playlists\": []\n}"
        );
    }

    #[test]
    fn test_from_json_reads_back_written_mapping() {
        let mapping = sample_mapping();

        let parsed = assert_ok!(IdentityMapping::from_json(&mapping.to_json().unwrap()));

        assert_eq!(parsed, mapping);
        assert_eq!(
            parsed.iter().map(|(id, _)| id).collect::<Vec<_>>(),
            vec!["scraped_2", "scraped_1"]
        );
    }

    #[test]
    fn test_from_json_rejects_published_id_listed_twice_in_entry() {
        let json = r#"{"playlists": [
            {"scraped_playlist_id": "foo", "published_playlist_ids": ["abc", "abc"]}
        ]}"#;

        let err = assert_err!(IdentityMapping::from_json(json));

        assert!(matches!(err, MappingError::DuplicatePublishedId(id) if id == "abc"));
    }

    #[test]
    fn test_from_json_rejects_published_id_shared_between_entries() {
        let json = r#"{"playlists": [
            {"scraped_playlist_id": "foo", "published_playlist_ids": ["abc"]},
            {"scraped_playlist_id": "bar", "published_playlist_ids": ["abc"]}
        ]}"#;

        let err = assert_err!(IdentityMapping::from_json(json));

        assert!(matches!(err, MappingError::DuplicatePublishedId(_)));
    }

    #[test]
    fn test_from_json_rejects_repeated_scraped_id() {
        let json = r#"{"playlists": [
            {"scraped_playlist_id": "foo", "published_playlist_ids": ["abc"]},
            {"scraped_playlist_id": "foo", "published_playlist_ids": ["def"]}
        ]}"#;

        let err = assert_err!(IdentityMapping::from_json(json));

        assert!(matches!(err, MappingError::DuplicateScrapedId(_)));
    }

    #[test]
    fn test_from_json_rejects_malformed_document() {
        let err = assert_err!(IdentityMapping::from_json(r#"{"mappings": []}"#));

        assert!(matches!(err, MappingError::Parse(_)));
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("playlists.json");

        assert!(IdentityMapping::read(&path).await.unwrap().is_none());

        sample_mapping().write(&path).await.unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, sample_mapping().to_json().unwrap());

        let read = IdentityMapping::read(&path).await.unwrap();
        assert_eq!(read, Some(sample_mapping()));
    }
}

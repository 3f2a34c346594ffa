use std::collections::BTreeSet;
use std::path::Path;

use color_eyre::eyre::{OptionExt, Result, WrapErr, eyre};
use serde::Deserialize;
use url::Url;
use walkdir::WalkDir;

use crate::playlist_types::SourcePlaylist;

/// Snapshots live in this subdirectory of the archive's playlists directory.
const CUMULATIVE_DIR: &str = "cumulative";
const CUMULATIVE_SUFFIX: &str = " (Cumulative)";

#[derive(Debug, Deserialize)]
struct SnapshotFile {
    url: String,
    name: String,
    #[serde(default)]
    description: String,
    tracks: Vec<SnapshotTrack>,
}

#[derive(Debug, Deserialize)]
struct SnapshotTrack {
    url: String,
}

/// Trailing path segment of a canonical URL, e.g. `https://open.spotify.com/track/<id>`.
fn id_from_url(url: &str) -> Result<String> {
    let parsed = Url::parse(url).wrap_err_with(|| format!("Invalid URL: {}", url))?;
    parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .ok_or_eyre(format!("URL has no identifier segment: {}", url))
}

pub(crate) fn parse_snapshot(json: &str) -> Result<SourcePlaylist> {
    let snapshot: SnapshotFile =
        serde_json::from_str(json).wrap_err("Failed to parse playlist snapshot")?;

    let track_ids = snapshot
        .tracks
        .iter()
        .map(|track| id_from_url(&track.url))
        .collect::<Result<BTreeSet<_>>>()?;

    Ok(SourcePlaylist {
        id: id_from_url(&snapshot.url)?,
        name: format!("{}{}", snapshot.name, CUMULATIVE_SUFFIX),
        description: snapshot.description,
        track_ids,
    })
}

/// Loads every `cumulative/*.json` snapshot under `playlists_dir`, in file name order.
pub fn load_declared_playlists(playlists_dir: &Path) -> Result<Vec<SourcePlaylist>> {
    let cumulative_dir = playlists_dir.join(CUMULATIVE_DIR);
    tracing::info!(directory = %cumulative_dir.display(), "Reading playlists");
    if !cumulative_dir.is_dir() {
        return Err(eyre!(
            "Playlists directory has no {} subdirectory: {}",
            CUMULATIVE_DIR,
            playlists_dir.display()
        ));
    }

    let mut playlists = Vec::new();
    for entry in WalkDir::new(&cumulative_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry
            .wrap_err_with(|| format!("Failed to list {}", cumulative_dir.display()))?;
        let path = entry.path();
        if !entry.file_type().is_file()
            || path.extension().and_then(|ext| ext.to_str()) != Some("json")
        {
            continue;
        }

        let json = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read {}", path.display()))?;
        let playlist =
            parse_snapshot(&json).wrap_err_with(|| format!("Invalid snapshot {}", path.display()))?;
        tracing::debug!(playlist = %playlist.name, tracks = playlist.track_ids.len(), "Read snapshot");
        playlists.push(playlist);
    }

    Ok(playlists)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playlist_types::fixtures::tracks;

    fn write_snapshot(dir: &Path, file_name: &str, contents: &str) {
        std::fs::write(dir.join(file_name), contents).unwrap();
    }

    #[test]
    fn test_load_declared_playlists() {
        let temp_dir = tempfile::tempdir().unwrap();
        let cumulative_dir = temp_dir.path().join("cumulative");
        std::fs::create_dir(&cumulative_dir).unwrap();

        write_snapshot(
            &cumulative_dir,
            "foo.json",
            r#"{
                "url": "https://open.spotify.com/playlist/foo_id",
                "description": "The foo playlist",
                "name": "Foo",
                "tracks": [
                    {"url": "https://open.spotify.com/track/1"},
                    {"url": "https://open.spotify.com/track/2"},
                    {"url": "https://open.spotify.com/track/3"}
                ]
            }"#,
        );
        write_snapshot(
            &cumulative_dir,
            "bar.json",
            r#"{
                "url": "https://open.spotify.com/playlist/bar_id",
                "description": "The bar playlist",
                "name": "Bar",
                "tracks": [
                    {"url": "https://open.spotify.com/track/3"},
                    {"url": "https://open.spotify.com/track/4"},
                    {"url": "https://open.spotify.com/track/4"}
                ]
            }"#,
        );
        write_snapshot(&cumulative_dir, "README.md", "not a snapshot");

        let playlists = load_declared_playlists(temp_dir.path()).unwrap();

        assert_eq!(
            playlists,
            vec![
                SourcePlaylist {
                    id: "bar_id".into(),
                    name: "Bar (Cumulative)".into(),
                    description: "The bar playlist".into(),
                    track_ids: tracks(&["3", "4"]),
                },
                SourcePlaylist {
                    id: "foo_id".into(),
                    name: "Foo (Cumulative)".into(),
                    description: "The foo playlist".into(),
                    track_ids: tracks(&["1", "2", "3"]),
                },
            ]
        );
    }

    #[test]
    fn test_snapshot_without_url_is_rejected() {
        let result = parse_snapshot(r#"{"name": "Foo", "description": "", "tracks": []}"#);

        assert!(result.is_err());
    }

    #[test]
    fn test_missing_cumulative_directory_is_an_error() {
        let temp_dir = tempfile::tempdir().unwrap();

        assert!(load_declared_playlists(temp_dir.path()).is_err());
    }

    #[test]
    fn test_id_from_url() {
        assert_eq!(
            id_from_url("https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC").unwrap(),
            "4uLU6hMCjMI75M1A2tKUQC"
        );
        assert!(id_from_url("https://open.spotify.com/track/").is_err());
        assert!(id_from_url("not a url").is_err());
    }
}

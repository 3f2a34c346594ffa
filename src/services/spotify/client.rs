use color_eyre::eyre::{Result, WrapErr};

use crate::playlist_types::RemotePlaylist;
use crate::ports::spotify::PlaylistService;
use crate::spotify_rs::client::SpotifyClient;

pub struct SpotifyHttpAdapter {
    client: SpotifyClient,
}

impl SpotifyHttpAdapter {
    pub fn new(client: SpotifyClient) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl PlaylistService for SpotifyHttpAdapter {
    async fn fetch_playlists(&self, limit: Option<usize>) -> Result<Vec<RemotePlaylist>> {
        self.client
            .remote_playlists(limit)
            .await
            .wrap_err("Failed to fetch published playlists")
    }

    async fn create_playlist(&self, name: &str) -> Result<String> {
        self.client
            .create_playlist(name)
            .await
            .wrap_err_with(|| format!("Failed to create playlist {}", name))
    }

    async fn update_details(&self, playlist_id: &str, description: &str) -> Result<()> {
        self.client
            .update_details(playlist_id, description)
            .await
            .wrap_err_with(|| format!("Failed to update details of playlist {}", playlist_id))
    }

    async fn add_tracks(&self, playlist_id: &str, track_ids: &[String]) -> Result<()> {
        self.client
            .add_tracks(playlist_id, track_ids)
            .await
            .wrap_err_with(|| format!("Failed to add tracks to playlist {}", playlist_id))
    }

    async fn remove_tracks(&self, playlist_id: &str, track_ids: &[String]) -> Result<()> {
        self.client
            .remove_tracks(playlist_id, track_ids)
            .await
            .wrap_err_with(|| format!("Failed to remove tracks from playlist {}", playlist_id))
    }

    async fn delete_playlist(&self, playlist_id: &str) -> Result<()> {
        self.client
            .unfollow_playlist(playlist_id)
            .await
            .wrap_err_with(|| format!("Failed to delete playlist {}", playlist_id))
    }
}

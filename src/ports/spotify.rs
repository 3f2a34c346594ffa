use color_eyre::eyre::Result;

use crate::playlist_types::RemotePlaylist;

/// Port trait wrapping the remote playlist capabilities the publisher needs.
///
/// Implementations live in `services::spotify::client` (production) or test mocks.
/// Every method is a single sequential remote interaction; callers never fan out.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait PlaylistService: Send + Sync {
    /// Playlists owned by the account, in the service's listing order.
    /// `limit` bounds how many playlists are fetched (and how many are returned).
    async fn fetch_playlists(&self, limit: Option<usize>) -> Result<Vec<RemotePlaylist>>;

    /// Creates an empty playlist and returns its remote id.
    async fn create_playlist(&self, name: &str) -> Result<String>;

    /// Replaces the playlist's description.
    async fn update_details(&self, playlist_id: &str, description: &str) -> Result<()>;

    async fn add_tracks(&self, playlist_id: &str, track_ids: &[String]) -> Result<()>;

    async fn remove_tracks(&self, playlist_id: &str, track_ids: &[String]) -> Result<()>;

    /// Removes the playlist from the account. On Spotify this unfollows it.
    async fn delete_playlist(&self, playlist_id: &str) -> Result<()>;
}

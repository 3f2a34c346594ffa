use serde::Deserialize;

/// Spotify OAuth token response. Only authorization code grants include a refresh token.
#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyTokenResponse {
    pub access_token: String,
    pub token_type: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyUser {
    pub id: String,
}

/// One page of a paginated listing. `next` is an absolute URL.
#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyPage<T> {
    pub items: Vec<Option<T>>,
    pub next: Option<String>,
}

/// Playlist as listed by `/me/playlists`
#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyPlaylist {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub owner: SpotifyUser,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyPlaylistItem {
    /// Null for tracks that are no longer available
    pub track: Option<SpotifyTrackRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyTrackRef {
    /// Null for local files
    pub id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyCreatedPlaylist {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyErrorResponse {
    pub error: SpotifyErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyErrorDetail {
    #[serde(default)]
    pub message: Option<String>,
}

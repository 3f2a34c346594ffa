use std::collections::BTreeSet;
use std::future::Future;
use std::num::NonZeroU32;
use std::pin::Pin;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use governor::{
    Quota, RateLimiter, clock::DefaultClock, state::InMemoryState, state::direct::NotKeyed,
};
use reqwest::header::RETRY_AFTER;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::sync::{Mutex, OnceCell};

use crate::config::{SpotifyCredentials, SpotifySettings};
use crate::playlist_types::RemotePlaylist;
use crate::spotify_rs::auth::{TokenError, refresh_access_token};
use crate::spotify_rs::types::{
    SpotifyCreatedPlaylist, SpotifyErrorResponse, SpotifyPage, SpotifyPlaylist,
    SpotifyPlaylistItem, SpotifyUser,
};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const PLAYLIST_PAGE_SIZE: usize = 50;
/// Spotify accepts at most this many tracks per add/remove request
const TRACK_BATCH_SIZE: usize = 100;
const NON_EXISTING_ID_MESSAGE: &str = "Payload contains a non-existing ID";
const PLAYLIST_FULL_MESSAGE: &str = "Playlist size limit reached";

#[derive(Debug, thiserror::Error)]
pub enum SpotifyError {
    #[error("Invalid access token")]
    InvalidAccessToken,
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },
    #[error("Server error ({status})")]
    Server { status: StatusCode },
    #[error("Connection problem: {0}")]
    Connection(#[source] reqwest::Error),
    #[error("Invalid response (empty body)")]
    EmptyResponse,
    #[error("{message} ({status})")]
    RequestFailed { status: StatusCode, message: String },
    #[error("Newlines in description are not allowed: {0:?}")]
    InvalidDescription(String),
    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error(transparent)]
    Token(#[from] TokenError),
}

impl SpotifyError {
    /// Transient failures that are retried with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::InvalidAccessToken
                | Self::RateLimited { .. }
                | Self::Server { .. }
                | Self::Connection(_)
                | Self::EmptyResponse
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BatchOutcome {
    Added,
    PlaylistFull,
}

/// Spotify Web API client for the publishing account
pub struct SpotifyClient {
    client: reqwest::Client,
    api_base_url: String,
    accounts_base_url: String,
    credentials: SpotifyCredentials,
    refresh_token: String,
    /// Fetched lazily and dropped when Spotify rejects it
    access_token: Mutex<Option<String>>,
    user_id: OnceCell<String>,
    rate_limiter: DirectRateLimiter,
    max_retries: usize,
    retry_delay: Duration,
}

impl SpotifyClient {
    pub fn new(
        credentials: SpotifyCredentials,
        refresh_token: String,
        settings: &SpotifySettings,
    ) -> Self {
        let per_second = NonZeroU32::new(settings.requests_per_second).unwrap_or(NonZeroU32::MIN);
        Self {
            client: reqwest::Client::new(),
            api_base_url: settings.api_base_url.trim_end_matches('/').to_string(),
            accounts_base_url: settings.accounts_base_url.trim_end_matches('/').to_string(),
            credentials,
            refresh_token,
            access_token: Mutex::new(None),
            user_id: OnceCell::new(),
            rate_limiter: RateLimiter::direct(Quota::per_second(per_second)),
            max_retries: settings.max_retries,
            retry_delay: Duration::from_millis(settings.retry_delay_ms),
        }
    }

    async fn access_token(&self) -> Result<String, SpotifyError> {
        let mut access_token = self.access_token.lock().await;
        if let Some(token) = access_token.as_ref() {
            return Ok(token.clone());
        }
        tracing::info!("Getting new access token");
        let token = refresh_access_token(
            &self.client,
            &self.accounts_base_url,
            &self.credentials,
            &self.refresh_token,
        )
        .await?;
        *access_token = Some(token.clone());
        Ok(token)
    }

    /// One attempt at a request. Classifies failures so the caller can retry.
    async fn send_once(
        &self,
        method: Method,
        url: &str,
        body: Option<&serde_json::Value>,
        expect_body: bool,
    ) -> Result<String, SpotifyError> {
        self.rate_limiter.until_ready().await;
        let token = self.access_token().await?;

        let mut request = self
            .client
            .request(method, url)
            .bearer_auth(token)
            .timeout(REQUEST_TIMEOUT);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await.map_err(SpotifyError::Connection)?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            *self.access_token.lock().await = None;
            return Err(SpotifyError::InvalidAccessToken);
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = retry_after(
                response
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|value| value.to_str().ok()),
            );
            tokio::time::sleep(retry_after).await;
            return Err(SpotifyError::RateLimited { retry_after });
        }
        if status.is_server_error() {
            return Err(SpotifyError::Server { status });
        }

        let text = response.text().await.map_err(SpotifyError::Connection)?;
        if status.is_client_error() {
            return Err(SpotifyError::RequestFailed {
                status,
                message: error_message(&text),
            });
        }
        if expect_body && text.trim().is_empty() {
            return Err(SpotifyError::EmptyResponse);
        }
        Ok(text)
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<&serde_json::Value>,
        expect_body: bool,
    ) -> Result<String, SpotifyError> {
        let attempt = move || {
            let method = method.clone();
            async move { self.send_once(method, url, body, expect_body).await }
        };
        attempt
            .retry(
                ExponentialBuilder::default()
                    .with_min_delay(self.retry_delay)
                    .with_jitter()
                    .with_max_times(self.max_retries),
            )
            .when(SpotifyError::is_retryable)
            .notify(|err: &SpotifyError, delay: Duration| {
                tracing::warn!(error = %err, ?delay, url, "Retrying Spotify request");
            })
            .await
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, SpotifyError> {
        let text = self.send(Method::GET, url, None, true).await?;
        Ok(serde_json::from_str(&text)?)
    }

    pub async fn current_user_id(&self) -> Result<&str, SpotifyError> {
        let user_id = self
            .user_id
            .get_or_try_init(|| async {
                let user: SpotifyUser =
                    self.get_json(&format!("{}/me", self.api_base_url)).await?;
                Ok::<_, SpotifyError>(user.id)
            })
            .await?;
        Ok(user_id.as_str())
    }

    /// Playlists owned by the current user, stopping once `limit` are found.
    pub async fn owned_playlists(
        &self,
        limit: Option<usize>,
    ) -> Result<Vec<SpotifyPlaylist>, SpotifyError> {
        let user_id = self.current_user_id().await?.to_string();
        let mut playlists = Vec::new();
        let mut next_url = Some(format!(
            "{}/me/playlists?limit={}",
            self.api_base_url, PLAYLIST_PAGE_SIZE
        ));

        while let Some(url) = next_url {
            if limit.is_some_and(|limit| playlists.len() >= limit) {
                break;
            }
            let page: SpotifyPage<SpotifyPlaylist> = self.get_json(&url).await?;
            playlists.extend(
                page.items
                    .into_iter()
                    .flatten()
                    .filter(|playlist| playlist.owner.id == user_id),
            );
            next_url = page.next;
        }

        if let Some(limit) = limit {
            playlists.truncate(limit);
        }
        tracing::info!(count = playlists.len(), "Got playlist ids");
        Ok(playlists)
    }

    pub async fn playlist_track_ids(
        &self,
        playlist_id: &str,
    ) -> Result<BTreeSet<String>, SpotifyError> {
        let mut track_ids = BTreeSet::new();
        let mut next_url = Some(format!(
            "{}/playlists/{}/tracks?fields=next,items(track(id))&limit={}",
            self.api_base_url, playlist_id, TRACK_BATCH_SIZE
        ));

        while let Some(url) = next_url {
            let page: SpotifyPage<SpotifyPlaylistItem> = self.get_json(&url).await?;
            track_ids.extend(
                page.items
                    .into_iter()
                    .flatten()
                    .filter_map(|item| item.track.and_then(|track| track.id)),
            );
            next_url = page.next;
        }

        Ok(track_ids)
    }

    /// Playlist listing plus contents, one playlist at a time.
    pub async fn remote_playlists(
        &self,
        limit: Option<usize>,
    ) -> Result<Vec<RemotePlaylist>, SpotifyError> {
        let playlists = self.owned_playlists(limit).await?;
        let total = playlists.len();

        let mut remote = Vec::with_capacity(total);
        for (index, playlist) in playlists.into_iter().enumerate() {
            tracing::info!(playlist = %playlist.name, progress = index + 1, total, "Getting playlist content");
            let track_ids = self.playlist_track_ids(&playlist.id).await?;
            remote.push(to_remote_playlist(playlist, track_ids));
        }
        Ok(remote)
    }

    pub async fn create_playlist(&self, name: &str) -> Result<String, SpotifyError> {
        let user_id = self.current_user_id().await?.to_string();
        let body = json!({
            "name": name,
            "public": true,
            "collaborative": false,
        });
        let text = self
            .send(
                Method::POST,
                &format!("{}/users/{}/playlists", self.api_base_url, user_id),
                Some(&body),
                true,
            )
            .await?;
        let created: SpotifyCreatedPlaylist = serde_json::from_str(&text)?;
        Ok(created.id)
    }

    /// Spotify rejects descriptions spanning several lines.
    pub async fn update_details(
        &self,
        playlist_id: &str,
        description: &str,
    ) -> Result<(), SpotifyError> {
        if description.contains('\n') {
            return Err(SpotifyError::InvalidDescription(description.to_string()));
        }
        let body = json!({ "description": description });
        self.send(
            Method::PUT,
            &format!("{}/playlists/{}", self.api_base_url, playlist_id),
            Some(&body),
            false,
        )
        .await?;
        Ok(())
    }

    pub async fn unfollow_playlist(&self, playlist_id: &str) -> Result<(), SpotifyError> {
        self.send(
            Method::DELETE,
            &format!("{}/playlists/{}/followers", self.api_base_url, playlist_id),
            None,
            false,
        )
        .await?;
        Ok(())
    }

    /// Adds tracks in batches. Stops early, without failing, once the playlist is full.
    pub async fn add_tracks(
        &self,
        playlist_id: &str,
        track_ids: &[String],
    ) -> Result<(), SpotifyError> {
        for batch in track_ids.chunks(TRACK_BATCH_SIZE) {
            if self.add_batch(playlist_id, batch).await? == BatchOutcome::PlaylistFull {
                tracing::error!(playlist_id, "Playlist is too big, skipping remaining tracks");
                break;
            }
        }
        Ok(())
    }

    /// Adds one batch. If Spotify rejects an id it does not know, the batch is
    /// split in halves until the bad id is isolated and skipped.
    fn add_batch<'a>(
        &'a self,
        playlist_id: &'a str,
        track_ids: &'a [String],
    ) -> Pin<Box<dyn Future<Output = Result<BatchOutcome, SpotifyError>> + Send + 'a>> {
        Box::pin(async move {
            let body = json!({ "uris": track_uris(track_ids) });
            let url = format!("{}/playlists/{}/tracks", self.api_base_url, playlist_id);
            match self.send(Method::POST, &url, Some(&body), true).await {
                Ok(_) => Ok(BatchOutcome::Added),
                Err(SpotifyError::RequestFailed { message, .. })
                    if message.starts_with(PLAYLIST_FULL_MESSAGE) =>
                {
                    Ok(BatchOutcome::PlaylistFull)
                }
                Err(SpotifyError::RequestFailed { message, .. })
                    if message == NON_EXISTING_ID_MESSAGE =>
                {
                    if let [track_id] = track_ids {
                        tracing::warn!(track_id = %track_id, "Skipping bad track id");
                        return Ok(BatchOutcome::Added);
                    }
                    let (first, second) = track_ids.split_at(track_ids.len() / 2);
                    if self.add_batch(playlist_id, first).await? == BatchOutcome::PlaylistFull {
                        return Ok(BatchOutcome::PlaylistFull);
                    }
                    self.add_batch(playlist_id, second).await
                }
                Err(err) => Err(err),
            }
        })
    }

    pub async fn remove_tracks(
        &self,
        playlist_id: &str,
        track_ids: &[String],
    ) -> Result<(), SpotifyError> {
        let url = format!("{}/playlists/{}/tracks", self.api_base_url, playlist_id);
        for batch in track_ids.chunks(TRACK_BATCH_SIZE) {
            let tracks: Vec<_> = track_uris(batch)
                .into_iter()
                .map(|uri| json!({ "uri": uri }))
                .collect();
            let body = json!({ "tracks": tracks });
            self.send(Method::DELETE, &url, Some(&body), false).await?;
        }
        Ok(())
    }
}

fn track_uris(track_ids: &[String]) -> Vec<String> {
    track_ids
        .iter()
        .map(|track_id| format!("spotify:track:{}", track_id))
        .collect()
}

/// Whole seconds from a `Retry-After` header plus one, so the wait always
/// exceeds what was asked for. Defaults to one second.
fn retry_after(header: Option<&str>) -> Duration {
    let seconds = header
        .and_then(|value| value.trim().parse::<f64>().ok())
        .filter(|seconds| seconds.is_finite() && *seconds >= 0.0)
        .unwrap_or(0.0);
    Duration::from_secs(seconds.floor() as u64 + 1)
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<SpotifyErrorResponse>(body)
        .ok()
        .and_then(|response| response.error.message)
        .unwrap_or_else(|| body.trim().to_string())
}

/// Names are kept verbatim so they join with declared names exactly.
fn to_remote_playlist(playlist: SpotifyPlaylist, track_ids: BTreeSet<String>) -> RemotePlaylist {
    RemotePlaylist {
        id: playlist.id,
        name: playlist.name,
        // Spotify escapes slashes in descriptions
        description: playlist
            .description
            .unwrap_or_default()
            .replace("&#x2F;", "/"),
        track_ids,
    }
}

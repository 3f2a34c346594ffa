use std::time::Duration;

use crate::config::SpotifyCredentials;
use crate::spotify_rs::types::SpotifyTokenResponse;


/// Publishing only needs to modify the account's public playlists.
const SPOTIFY_SCOPE: &str = "playlist-modify-public";
const TOKEN_TIMEOUT: Duration = Duration::from_secs(10);

/// Authorization URL the user opens to grant the publisher access
pub fn authorize_url(accounts_base_url: &str, client_id: &str, redirect_uri: &str) -> String {
    format!(
        "{}/authorize?client_id={}&response_type=code&redirect_uri={}&scope={}",
        accounts_base_url,
        urlencoding::encode(client_id),
        urlencoding::encode(redirect_uri),
        urlencoding::encode(SPOTIFY_SCOPE)
    )
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("Spotify rejected the token request: {reason}")]
    Rejected { reason: String },
    #[error("Failed to send http request: {0}")]
    FailedToSendRequest(reqwest::Error),
    #[error("Failed to parse response: {0}")]
    FailedToParseResponse(reqwest::Error),
    #[error("Invalid token type: {0}")]
    InvalidTokenType(String),
    #[error("Response did not contain a refresh token")]
    MissingRefreshToken,
}

async fn request_token(
    client: &reqwest::Client,
    accounts_base_url: &str,
    credentials: &SpotifyCredentials,
    params: &[(&str, &str)],
) -> Result<SpotifyTokenResponse, TokenError> {
    let response = client
        .post(format!("{}/api/token", accounts_base_url))
        // Serializes to x-www-form-urlencoded, as required by spotify
        .form(params)
        .basic_auth(credentials.client_id(), Some(credentials.client_secret()))
        .timeout(TOKEN_TIMEOUT)
        .send()
        .await
        .map_err(TokenError::FailedToSendRequest)?;

    if !response.status().is_success() {
        return Err(TokenError::Rejected {
            reason: response
                .text()
                .await
                .unwrap_or("Failed to get error text".to_string()),
        });
    }

    let token_response: SpotifyTokenResponse = response
        .json()
        .await
        .map_err(TokenError::FailedToParseResponse)?;

    if token_response.token_type != "Bearer" {
        return Err(TokenError::InvalidTokenType(token_response.token_type));
    }

    Ok(token_response)
}

/// Exchange an authorization code for a long-lived refresh token.
/// https://developer.spotify.com/documentation/web-api/tutorials/code-flow
pub async fn exchange_code_for_refresh_token(
    client: &reqwest::Client,
    accounts_base_url: &str,
    credentials: &SpotifyCredentials,
    code: &str,
    // Must be the exact redirect URI used to start the flow
    redirect_uri: &str,
) -> Result<String, TokenError> {
    let params = [
        ("grant_type", "authorization_code"),
        ("code", code),
        ("redirect_uri", redirect_uri),
    ];
    request_token(client, accounts_base_url, credentials, &params)
        .await?
        .refresh_token
        .filter(|token| !token.is_empty())
        .ok_or(TokenError::MissingRefreshToken)
}

/// Get a short-lived access token from the refresh token
pub async fn refresh_access_token(
    client: &reqwest::Client,
    accounts_base_url: &str,
    credentials: &SpotifyCredentials,
    refresh_token: &str,
) -> Result<String, TokenError> {
    let params = [
        ("grant_type", "refresh_token"),
        ("refresh_token", refresh_token),
    ];
    let response = request_token(client, accounts_base_url, credentials, &params).await?;
    Ok(response.access_token)
}

use std::sync::Arc;

use axum::{
    Router,
    extract::{Query, State},
    routing::get,
};
use color_eyre::eyre::{Result, WrapErr, eyre};
use serde::Deserialize;
use tokio::sync::{Mutex, oneshot};

use crate::config::{SpotifyCredentials, SpotifySettings};
use crate::spotify_rs::auth::{authorize_url, exchange_code_for_refresh_token};

type CodeSender = Arc<Mutex<Option<oneshot::Sender<Result<String, String>>>>>;

#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    error: Option<String>,
}

fn callback_result(params: CallbackParams) -> Result<String, String> {
    match (params.code, params.error) {
        (_, Some(error)) => Err(error),
        (Some(code), None) if !code.is_empty() => Ok(code),
        _ => Err("callback did not include an authorization code".to_string()),
    }
}

async fn callback(
    State(sender): State<CodeSender>,
    Query(params): Query<CallbackParams>,
) -> &'static str {
    let result = callback_result(params);
    let message = if result.is_ok() {
        "Authorized. You can close this window."
    } else {
        "Authorization failed. Check the terminal for details."
    };
    // Only the first callback counts
    if let Some(sender) = sender.lock().await.take() {
        let _ = sender.send(result);
    }
    message
}

/// Serves the redirect URI until Spotify calls back with an authorization code.
async fn wait_for_authorization_code(port: u16) -> Result<String> {
    let (sender, receiver) = oneshot::channel();
    let state: CodeSender = Arc::new(Mutex::new(Some(sender)));
    let (shutdown_sender, shutdown_receiver) = oneshot::channel::<()>();

    let app = Router::new().route("/", get(callback)).with_state(state);
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
        .await
        .wrap_err_with(|| format!("Failed to listen on port {}", port))?;
    tracing::info!(port, "Waiting for Spotify authorization callback");

    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_receiver.await;
            })
            .await
    });

    let result = receiver.await.wrap_err("Callback server stopped unexpectedly");
    let _ = shutdown_sender.send(());
    server
        .await
        .wrap_err("Callback server panicked")?
        .wrap_err("Callback server failed")?;

    result?.map_err(|error| eyre!("Spotify authorization failed: {}", error))
}

/// Runs the authorization code flow and returns a refresh token.
pub async fn login(
    client: &reqwest::Client,
    credentials: &SpotifyCredentials,
    settings: &SpotifySettings,
) -> Result<String> {
    let url = authorize_url(
        &settings.accounts_base_url,
        credentials.client_id(),
        &settings.redirect_uri,
    );
    println!("Open this URL to authorize the publisher:\n\n{}\n", url);
    if let Err(err) = webbrowser::open(&url) {
        tracing::warn!(error = %err, "Failed to open browser");
    }

    let code = wait_for_authorization_code(settings.callback_port).await?;
    let refresh_token = exchange_code_for_refresh_token(
        client,
        &settings.accounts_base_url,
        credentials,
        &code,
        &settings.redirect_uri,
    )
    .await
    .wrap_err("Failed to exchange authorization code")?;
    Ok(refresh_token)
}

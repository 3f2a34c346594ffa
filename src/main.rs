mod config;
mod logging;
mod mapping;
mod playlist_types;
mod ports;
mod publish;
mod readme;
mod reconcile;
mod reporter;
mod services;
mod source;
mod spotify_rs;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::{Result, eyre::Context};

use crate::{
    config::{Config, SpotifyCredentials},
    logging::{LogFormat, init_tracing},
    publish::{PublishMode, PublishService},
    reporter::TracingReporter,
    services::spotify::client::SpotifyHttpAdapter,
    spotify_rs::client::SpotifyClient,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// The config file to use
    #[arg(short, long, env = "PLAYLIST_PUBLISHER_CONFIG")]
    config: Option<PathBuf>,

    /// Log filter, e.g. `info` or `playlist_publisher=debug`
    #[arg(long, default_value = "info", global = true, env = "LOG_LEVEL")]
    log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

fn is_directory(s: &str) -> Result<PathBuf, String> {
    let p: PathBuf = s.into();
    if p.is_dir() {
        Ok(p)
    } else {
        Err(format!("`{}` is not an existing directory", s))
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Publish the archived cumulative playlists to Spotify
    Publish {
        /// The archive's playlists directory (containing `cumulative/`)
        #[arg(short, long, value_parser = is_directory)]
        playlists: PathBuf,

        /// Apply changes to Spotify. Without this, a dry run samples one playlist
        /// and makes no changes.
        #[arg(long)]
        prod: bool,

        /// README whose `## Playlists` section is regenerated after a production run
        #[arg(long, env = "PLAYLIST_PUBLISHER_README")]
        readme: Option<PathBuf>,

        #[arg(long, env = "SPOTIFY_CLIENT_ID", hide_env_values = true)]
        client_id: String,

        #[arg(long, env = "SPOTIFY_CLIENT_SECRET", hide_env_values = true)]
        client_secret: String,

        #[arg(long, env = "SPOTIFY_REFRESH_TOKEN", hide_env_values = true)]
        refresh_token: String,
    },
    /// Authorize the publisher and print a refresh token
    Login {
        #[arg(long, env = "SPOTIFY_CLIENT_ID", hide_env_values = true)]
        client_id: String,

        #[arg(long, env = "SPOTIFY_CLIENT_SECRET", hide_env_values = true)]
        client_secret: String,
    },
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Create a default config file, if it doesn't exist
    CreateDefault,
    /// Print the path to the config file
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    init_tracing(&args.log_level, args.log_format)?;

    tracing::debug!("Loading configuration");
    let config = {
        if let Some(config) = args.config {
            Config::from_file(&config)
        } else {
            Config::load()
        }
    }
    .wrap_err("Failed to load playlist-publisher config")?;

    match args.command {
        Commands::Publish {
            playlists,
            prod,
            readme,
            client_id,
            client_secret,
            refresh_token,
        } => {
            let credentials = SpotifyCredentials::new(client_id, client_secret)?;
            let refresh_token = config::refresh_token(refresh_token)?;
            let client = SpotifyClient::new(credentials, refresh_token, &config.spotify);

            let mode = PublishMode::from_prod_flag(prod);
            tracing::info!(?mode, playlists = %playlists.display(), "Publishing playlists");
            let service = PublishService::new(
                SpotifyHttpAdapter::new(client),
                Arc::new(TracingReporter),
                mode,
            );
            let readme = readme.or(config.readme_path);
            let outcome = service
                .publish(&playlists, &config.mapping_path, readme.as_deref())
                .await?;
            if outcome.plan.is_noop() {
                tracing::info!("Published playlists were already up to date");
            }
            tracing::info!(
                created = outcome.summary.created,
                updated = outcome.summary.updated,
                deleted = outcome.summary.deleted,
                "Done"
            );
        }
        Commands::Login {
            client_id,
            client_secret,
        } => {
            let credentials = SpotifyCredentials::new(client_id, client_secret)?;
            let refresh_token = spotify_rs::login::login(
                &reqwest::Client::new(),
                &credentials,
                &config.spotify,
            )
            .await?;
            println!("SPOTIFY_REFRESH_TOKEN={}", refresh_token);
        }
        Commands::Config(config_commands) => match config_commands {
            ConfigCommands::CreateDefault => {
                let path = Config::create_default()?;
                println!("{}", path.display());
            }
            ConfigCommands::Path => match Config::config_path() {
                Some(path) => println!("{}", path.display()),
                None => println!("No default config path found"),
            },
        },
    }

    Ok(())
}

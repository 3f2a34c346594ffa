use color_eyre::Result;
use color_eyre::eyre::Context;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Multi-line output with fields on their own lines
    Pretty,
    /// One line per event
    Compact,
}

/// Installs the global subscriber. `tracing_level` takes `EnvFilter` directives,
/// e.g. `info` or `playlist_publisher=debug,reqwest=warn`.
pub fn init_tracing(tracing_level: &str, format: LogFormat) -> Result<()> {
    let filter_layer =
        EnvFilter::try_new(tracing_level).wrap_err("Failed to create tracing filter")?;
    let registry = tracing_subscriber::registry().with(filter_layer);

    match format {
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init(),
        LogFormat::Compact => registry
            .with(tracing_subscriber::fmt::layer().compact())
            .try_init(),
    }
    .wrap_err("Failed to install tracing subscriber")?;

    Ok(())
}

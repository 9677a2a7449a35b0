use clap::ValueEnum;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::error::{Error, ErrorDetails};

/// Log format for all gateway logs.
#[derive(Clone, Copy, Debug, Default, PartialEq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Set up logging. Respects `RUST_LOG`, defaulting to
/// `warn,storyforge_internal=info,gateway=info`.
pub fn setup_observability(log_format: LogFormat) -> Result<(), Error> {
    let default_filter = "warn,storyforge_internal=info,gateway=info";
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .map_err(|e| {
            Error::new_without_logging(ErrorDetails::Config {
                message: format!("Failed to build log filter: {e}"),
            })
        })?;

    let registry = tracing_subscriber::registry().with(filter);
    match log_format {
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer())
            .try_init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
    }
    .map_err(|e| {
        Error::new_without_logging(ErrorDetails::Config {
            message: format!("Failed to initialize logging: {e}"),
        })
    })
}

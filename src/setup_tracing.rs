use time::format_description::parse;
use tracing_subscriber::{fmt::time::OffsetTime, EnvFilter};

use crate::{
    cli::Commands,
    config::{LogFormat, TracingConfig},
};

/// Third-party targets that are too chatty at `info`.
const QUIET_TARGETS: [&str; 2] = [
    "sqlx::postgres::notice=warn",
    "sea_orm_migration::migrator=warn",
];

/// `RUST_LOG` wins; otherwise CLI commands stay quiet and `serve` uses the
/// configured level.
pub fn default_level<'a>(command: Option<&Commands>, server_log_level: &'a str) -> &'a str {
    match command {
        Some(Commands::Migrate { .. } | Commands::Health { .. }) => "warn",
        Some(Commands::Version { .. }) => "error",
        Some(Commands::Serve { .. }) | None => server_log_level,
    }
}

pub fn setup_tracing_for_command(command: Option<&Commands>, config: &TracingConfig) {
    let default_level = default_level(command, &config.log_level);

    let env_filter = QUIET_TARGETS
        .iter()
        .filter_map(|directive| directive.parse().ok())
        .fold(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
            EnvFilter::add_directive,
        );

    let timer = OffsetTime::new(
        time::UtcOffset::current_local_offset().unwrap_or(time::UtcOffset::UTC),
        parse("[hour]:[minute]:[second].[subsecond digits:2]").expect("Invalid timestamp format"),
    );

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_level(true)
        .with_timer(timer);

    match config.format {
        LogFormat::Compact => builder.with_ansi(true).compact().init(),
        LogFormat::Json => builder.with_ansi(false).json().init(),
    }
}

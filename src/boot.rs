use std::{env, str::FromStr as _};

use clap::Parser as _;
use config_rs::{Config as ConfigRs, ConfigError};
use sea_orm::DbErr;
use thiserror::Error;
use tracing::{debug, trace};

use crate::{
    cli::{Cli, Commands},
    commands::{health, migrate, serve, version},
    config::Config,
    emails::EmailError,
    environment::Environment,
    jobs::{job_supervisor::UncoveredJobType, scheduled_job::ScheduleError},
    setup_tracing::setup_tracing_for_command,
};

const ENVIRONMENT_VARIABLE: &str = "APP_ENVIRONMENT";
const ENV_PREFIX: &str = "APP";
/// `APP__EMAIL_API__API_KEYS` and similar list settings are comma separated.
const ENV_LIST_KEYS: [&str; 3] = [
    "email_api.api_keys",
    "access.allow_list",
    "access.admin_emails",
];

#[derive(Debug, Error)]
pub enum BootError {
    #[error("Failed to load configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
    #[error(transparent)]
    Workers(#[from] UncoveredJobType),
    #[error("Failed to set up the mailer: {0}")]
    Mailer(#[from] EmailError),
    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Service is unhealthy")]
    Unhealthy,
}

pub async fn boot() -> Result<(), BootError> {
    let cli = Cli::parse();

    if let Some(Commands::Version { json }) = cli.command {
        version::print_version_info(json);
        return Ok(());
    }

    let environment = set_environment();
    let config = read_config(&environment)?;

    setup_tracing_for_command(cli.command.as_ref(), &config.tracing);

    debug!("Environment set to: {:?}", environment);
    trace!("Configuration loaded: {:?}", config);

    handle_command(environment, config, cli).await
}

#[must_use]
pub fn set_environment() -> Environment {
    env::var(ENVIRONMENT_VARIABLE)
        .ok()
        .and_then(|s| Environment::from_str(&s).ok())
        .unwrap_or_default()
}

/// `config/<environment>.toml` overlaid with `APP__SECTION__KEY` variables.
pub fn read_config(environment: &Environment) -> Result<Config, ConfigError> {
    let config_file_name = environment.config_file();

    trace!("Reading configuration from: {}", config_file_name);

    load_config(&config_file_name, env_overrides())
}

fn env_overrides() -> config_rs::Environment {
    ENV_LIST_KEYS.iter().fold(
        config_rs::Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true)
            .list_separator(","),
        |source, key| source.with_list_parse_key(key),
    )
}

fn load_config(file_name: &str, overrides: config_rs::Environment) -> Result<Config, ConfigError> {
    ConfigRs::builder()
        .add_source(config_rs::File::with_name(file_name))
        .add_source(overrides)
        .build()?
        .try_deserialize()
}

pub async fn handle_command(
    environment: Environment,
    mut config: Config,
    cli: Cli,
) -> Result<(), BootError> {
    match cli.command {
        Some(Commands::Migrate { action }) => migrate::handle_migrate_command(&config, action).await,
        Some(Commands::Health { json }) => {
            health::handle_health_command(environment, config, json).await
        }
        Some(Commands::Version { json }) => {
            version::print_version_info(json);
            Ok(())
        }
        Some(Commands::Serve { port }) => {
            if let Some(port) = port {
                config.server.port = port;
            }
            serve::handle_serve_command(environment, config).await
        }
        None => serve::handle_serve_command(environment, config).await,
    }
}

use std::sync::Arc;

use sea_orm::{ConnectOptions, DatabaseConnection, DbErr};
use sea_orm_migration::MigratorTrait;
use tokio::sync::oneshot;
use tracing::debug;

use crate::{config::DatabaseConfig, database::migrations::Migrator};

pub mod migrations;
pub mod models;

/// Connects to the database and starts applying pending migrations in the background.
///
/// The receiver resolves once the migrations have finished.
pub async fn setup_database(
    db_config: &DatabaseConfig,
) -> Result<(Arc<DatabaseConnection>, oneshot::Receiver<Result<(), DbErr>>), DbErr> {
    let connection = Arc::new(setup_database_connection(db_config).await?);
    let migrations_connection = Arc::clone(&connection);

    let (sender, receiver) = oneshot::channel();

    tokio::spawn(async move {
        let migration_result = Migrator::up(migrations_connection.as_ref(), None).await;
        let _ = sender.send(migration_result);
    });

    Ok((connection, receiver))
}

pub async fn setup_database_connection(
    db_config: &DatabaseConfig,
) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(db_config.url.clone());

    options.sqlx_logging(false); // Disable SQL query logging to reduce noise
    options.max_connections(db_config.pool_size);

    debug!("Connecting to database at: {}", redact_url(&db_config.url));

    sea_orm::Database::connect(options).await
}

/// Hides the password part of a connection URL.
pub fn redact_url(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            let credentials = &url[scheme_end + 3..at];
            match credentials.split_once(':') {
                Some((user, _)) => format!("{}{user}:***{}", &url[..scheme_end + 3], &url[at..]),
                None => url.to_string(),
            }
        }
        _ => url.to_string(),
    }
}

use sea_orm::DatabaseConnection;
use tracing::warn;

use crate::{
    app::App,
    boot::BootError,
    config::Config,
    database::{redact_url, setup_database_connection},
    environment::Environment,
    job_queue::JobQueue,
    mailer::Mailer,
    monitoring::{run_checks, HealthReport, OverallStatus},
};

/// Runs the checks once, without the report cache, and prints the result.
pub async fn handle_health_command(
    environment: Environment,
    config: Config,
    json: bool,
) -> Result<(), BootError> {
    // An unreachable database is a finding, not a reason to abort
    let db = match setup_database_connection(&config.database).await {
        Ok(db) => db,
        Err(e) => {
            warn!("Could not connect to {}: {e}", redact_url(&config.database.url));
            DatabaseConnection::Disconnected
        }
    };
    let mailer = Mailer::from_config(&config.email)?;

    let app = App::new(config, environment, db, mailer, JobQueue::database());
    let report = run_checks(&app).await;

    if json {
        let rendered = serde_json::to_string_pretty(&report)
            .map_err(|e| BootError::Io(std::io::Error::other(e)))?;
        println!("{rendered}");
    } else {
        print_report(&report);
    }

    if report.status == OverallStatus::Unhealthy {
        return Err(BootError::Unhealthy);
    }
    Ok(())
}

fn print_report(report: &HealthReport) {
    println!("🩺 Overall: {:?} (v{})", report.status, report.version);
    for check in &report.checks {
        let latency = check
            .latency_ms
            .map(|ms| format!(" [{ms} ms]"))
            .unwrap_or_default();
        println!("  {:<10} {:?}: {}{latency}", check.name, check.status, check.message);
    }
}

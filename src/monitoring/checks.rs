//! The individual health checks. Each returns a [`CheckResult`] and never fails.

use std::{
    future::Future,
    path::Path,
    time::{Duration, Instant},
};

use sea_orm::{DatabaseConnection, DbErr};
use serde_json::json;
use tokio::{net::TcpStream, time::timeout};

use super::{
    report::{CheckResult, CheckStatus},
    system,
};
use crate::{
    cache::Cache,
    config::{EmailConfig, MonitoringConfig},
    job_queue::JobQueue,
};

pub const DATABASE: &str = "database";
pub const SMTP: &str = "smtp";
pub const DISK: &str = "disk";
pub const MEMORY: &str = "memory";
pub const QUEUE: &str = "queue";
pub const CACHE: &str = "cache";

const CACHE_PROBE_KEY: &str = "health:probe";

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

pub fn classify_latency(latency_ms: u64, warning_ms: u64) -> CheckStatus {
    if latency_ms >= warning_ms {
        CheckStatus::Warning
    } else {
        CheckStatus::Healthy
    }
}

pub fn classify_disk(free_percent: f64, config: &MonitoringConfig) -> CheckStatus {
    if free_percent < config.disk_critical_free_percent {
        CheckStatus::Critical
    } else if free_percent < config.disk_warning_free_percent {
        CheckStatus::Warning
    } else {
        CheckStatus::Healthy
    }
}

pub fn classify_memory(used_percent: f64, config: &MonitoringConfig) -> CheckStatus {
    if used_percent > config.memory_critical_used_percent {
        CheckStatus::Critical
    } else if used_percent > config.memory_warning_used_percent {
        CheckStatus::Warning
    } else {
        CheckStatus::Healthy
    }
}

pub fn classify_queue(backlog: u64, config: &MonitoringConfig) -> CheckStatus {
    if backlog > config.queue_critical_backlog {
        CheckStatus::Critical
    } else if backlog > config.queue_warning_backlog {
        CheckStatus::Warning
    } else {
        CheckStatus::Healthy
    }
}

pub async fn check_database(db: &DatabaseConnection, config: &MonitoringConfig) -> CheckResult {
    check_ping(db.ping(), config).await
}

/// A ping that outlives `database_timeout_ms` counts as unreachable.
async fn check_ping<F>(ping: F, config: &MonitoringConfig) -> CheckResult
where
    F: Future<Output = Result<(), DbErr>>,
{
    let start = Instant::now();
    let outcome = timeout(Duration::from_millis(config.database_timeout_ms), ping).await;
    let latency = elapsed_ms(start);

    match outcome {
        Ok(Ok(())) => {
            let status = classify_latency(latency, config.database_warning_ms);
            let message = match status {
                CheckStatus::Healthy => "Database responding".to_string(),
                _ => format!("Database slow to respond ({latency} ms)"),
            };
            CheckResult::new(DATABASE, status, message).with_latency(latency)
        }
        Ok(Err(e)) => CheckResult::new(DATABASE, CheckStatus::Critical, format!("Database unreachable: {e}"))
            .with_latency(latency),
        Err(_) => CheckResult::new(
            DATABASE,
            CheckStatus::Critical,
            format!("Database ping timed out after {} ms", config.database_timeout_ms),
        )
        .with_latency(latency),
    }
}

/// Opens a TCP connection to the SMTP relay; the mock transport is always healthy.
pub async fn check_smtp(email: &EmailConfig, config: &MonitoringConfig) -> CheckResult {
    let EmailConfig::Smtp { host, port, .. } = email else {
        return CheckResult::new(SMTP, CheckStatus::Healthy, "Mock transport in use")
            .with_details(json!({ "transport": "mock" }));
    };

    let start = Instant::now();
    let connect = timeout(
        Duration::from_millis(config.smtp_timeout_ms),
        TcpStream::connect((host.as_str(), *port)),
    )
    .await;
    let latency = elapsed_ms(start);
    let details = json!({ "transport": "smtp", "host": host, "port": port });

    match connect {
        Ok(Ok(_stream)) => {
            let status = classify_latency(latency, config.smtp_warning_ms);
            let message = match status {
                CheckStatus::Healthy => "SMTP server reachable".to_string(),
                _ => format!("SMTP server slow to accept connections ({latency} ms)"),
            };
            CheckResult::new(SMTP, status, message)
                .with_latency(latency)
                .with_details(details)
        }
        Ok(Err(e)) => CheckResult::new(SMTP, CheckStatus::Critical, format!("SMTP connection failed: {e}"))
            .with_latency(latency)
            .with_details(details),
        Err(_) => CheckResult::new(
            SMTP,
            CheckStatus::Critical,
            format!("SMTP connection timed out after {} ms", config.smtp_timeout_ms),
        )
        .with_latency(latency)
        .with_details(details),
    }
}

pub fn check_disk(config: &MonitoringConfig) -> CheckResult {
    match system::read_disk(Path::new(&config.disk_path)) {
        Ok(reading) => {
            let free_percent = reading.free_percent();
            let status = classify_disk(free_percent, config);
            CheckResult::new(DISK, status, format!("{free_percent:.1}% free")).with_details(json!({
                "path": config.disk_path,
                "total_bytes": reading.total_bytes,
                "available_bytes": reading.available_bytes,
            }))
        }
        Err(e) => CheckResult::new(
            DISK,
            CheckStatus::Critical,
            format!("Cannot read disk usage for '{}': {e}", config.disk_path),
        ),
    }
}

pub async fn check_memory(config: &MonitoringConfig) -> CheckResult {
    match system::read_memory().await {
        Some(reading) => {
            let used_percent = reading.used_percent();
            let status = classify_memory(used_percent, config);
            CheckResult::new(MEMORY, status, format!("{used_percent:.1}% used")).with_details(json!({
                "total_kb": reading.total_kb,
                "available_kb": reading.available_kb,
            }))
        }
        None => CheckResult::new(MEMORY, CheckStatus::Warning, "Memory statistics unavailable"),
    }
}

pub async fn check_queue(
    job_queue: &JobQueue,
    db: &DatabaseConnection,
    config: &MonitoringConfig,
) -> CheckResult {
    match job_queue.backlog(db).await {
        Ok(backlog) => {
            let status = classify_queue(backlog, config);
            CheckResult::new(QUEUE, status, format!("{backlog} job(s) waiting"))
                .with_details(json!({ "backlog": backlog }))
        }
        Err(e) => CheckResult::new(QUEUE, CheckStatus::Critical, format!("Cannot read queue backlog: {e}")),
    }
}

/// Writes, reads back and deletes a probe value.
pub fn check_cache(cache: &Cache) -> CheckResult {
    let token = uuid::Uuid::new_v4().to_string();
    cache.set(CACHE_PROBE_KEY, json!(token), Duration::from_secs(10));
    let read_back = cache.get(CACHE_PROBE_KEY);
    cache.delete(CACHE_PROBE_KEY);

    if read_back == Some(json!(token)) {
        CheckResult::new(CACHE, CheckStatus::Healthy, "Cache round-trip succeeded")
            .with_details(json!({ "entries": cache.len() }))
    } else {
        CheckResult::new(CACHE, CheckStatus::Critical, "Cache round-trip returned a different value")
    }
}

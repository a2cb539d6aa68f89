use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

use lettre::message::Mailbox;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub tracing: TracingConfig,
    pub database: DatabaseConfig,
    pub jobs: JobsConfig,
    pub server: ServerConfig,
    pub email: EmailConfig,
    pub email_api: EmailApiConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub access: AccessConfig,
    pub conference: ConferenceConfig,
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EmailConfig {
    /// Mock mailer that captures emails in memory
    Mock,
    /// Real SMTP configuration for sending emails
    Smtp {
        host: String,
        port: u16,
        #[serde(deserialize_with = "deserialize_mailbox")]
        sender: Mailbox,
        username: Option<String>,
        password: Option<String>,
        #[serde(default = "default_use_tls")]
        use_tls: bool,
    },
}

impl EmailConfig {
    /// The mailbox used in the `From` header of every outgoing message.
    pub fn sender(&self) -> Mailbox {
        match self {
            Self::Smtp { sender, .. } => sender.clone(),
            Self::Mock => "Conclave <noreply@conclave.test>"
                .parse()
                .expect("Invalid mock sender"),
        }
    }
}

fn deserialize_mailbox<'de, D>(deserializer: D) -> Result<Mailbox, D::Error>
where
    D: Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    s.parse().map_err(serde::de::Error::custom)
}

fn default_use_tls() -> bool {
    true
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TracingConfig {
    pub log_level: String,
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
}

/// Settings for the API-key protected email endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailApiConfig {
    /// Keys accepted in the `X-API-Key` header
    pub api_keys: Vec<String>,
    /// Upper bound for request bodies on the email routes (default: 40 MiB)
    #[serde(default = "default_max_request_bytes")]
    pub max_request_bytes: usize,
    /// How long `email_log` rows are kept (default: 90 days)
    #[serde(default = "default_log_retention_days")]
    pub log_retention_days: u32,
    /// Rows deleted per batch by the log cleanup job
    #[serde(default = "default_log_cleanup_batch_size")]
    pub log_cleanup_batch_size: u64,
    /// Cron expression for the log cleanup job (default: daily at 03:00 UTC)
    #[serde(default = "default_log_cleanup_cron")]
    pub log_cleanup_cron: String,
    #[serde(default = "default_statistics_cache_seconds")]
    pub statistics_cache_seconds: u64,
}

const fn default_max_request_bytes() -> usize {
    40 * 1024 * 1024
}

const fn default_log_retention_days() -> u32 {
    90
}

const fn default_log_cleanup_batch_size() -> u64 {
    500
}

fn default_log_cleanup_cron() -> String {
    "0 0 3 * * *".to_string()
}

const fn default_statistics_cache_seconds() -> u64 {
    60
}

/// Thresholds and timeouts for the health monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    /// How long a health report is served from cache
    pub cache_seconds: u64,
    pub database_warning_ms: u64,
    pub database_timeout_ms: u64,
    pub smtp_timeout_ms: u64,
    pub smtp_warning_ms: u64,
    /// Path whose filesystem is checked for free space
    pub disk_path: String,
    pub disk_warning_free_percent: f64,
    pub disk_critical_free_percent: f64,
    pub memory_warning_used_percent: f64,
    pub memory_critical_used_percent: f64,
    pub queue_warning_backlog: u64,
    pub queue_critical_backlog: u64,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            cache_seconds: 30,
            database_warning_ms: 1000,
            database_timeout_ms: 5000,
            smtp_timeout_ms: 5000,
            smtp_warning_ms: 2000,
            disk_path: ".".to_string(),
            disk_warning_free_percent: 20.0,
            disk_critical_free_percent: 10.0,
            memory_warning_used_percent: 80.0,
            memory_critical_used_percent: 90.0,
            queue_warning_backlog: 100,
            queue_critical_backlog: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory that receives uploaded payment proofs
    pub upload_dir: String,
    /// Largest accepted upload (default: 5 MiB)
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

const fn default_max_upload_bytes() -> usize {
    5 * 1024 * 1024
}

/// Who may submit and who may review.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AccessConfig {
    /// Emails permitted to submit; empty means everyone
    #[serde(default)]
    pub allow_list: Vec<String>,
    /// Emails that are granted the admin role on first review
    #[serde(default)]
    pub admin_emails: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConferenceConfig {
    pub name: String,
    /// Registration fee requested after approval, in minor units; 0 disables payments
    #[serde(default)]
    pub registration_fee_cents: i64,
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Directory containing TrueType fonts for the letter of acceptance
    #[serde(default)]
    pub font_dir: Option<String>,
    #[serde(default = "default_signatory")]
    pub signatory: String,
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_signatory() -> String {
    "Organizing Committee".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    #[serde(default)]
    pub cleanup: CleanupConfig,
    pub workers: WorkersConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupConfig {
    /// Interval between cleanup runs in seconds (default: 3600 = 1 hour)
    #[serde(default = "default_cleanup_interval")]
    pub interval_seconds: u64,
    /// Retention period for completed jobs in seconds (default: 7200 = 2 hours)
    #[serde(default = "default_completed_retention")]
    pub completed_retention_seconds: u64,
    /// Retention period for failed jobs in seconds (default: 172800 = 2 days)
    #[serde(default = "default_failed_retention")]
    pub failed_retention_seconds: u64,
    /// Maximum number of jobs to delete in a single batch (default: 1000)
    #[serde(default = "default_cleanup_batch_size")]
    pub batch_size: usize,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_cleanup_interval(),
            completed_retention_seconds: default_completed_retention(),
            failed_retention_seconds: default_failed_retention(),
            batch_size: default_cleanup_batch_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkersConfig {
    #[serde(flatten)]
    pub workers: HashMap<String, WorkerQueueConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerQueueConfig {
    pub jobs: Vec<String>,
    pub count: u32,
    /// Job execution timeout in seconds (default: 300)
    #[serde(default = "default_job_timeout")]
    pub job_timeout: u32,
    /// Maximum number of retries after the first attempt (default: 3)
    #[serde(default = "default_max_retries")]
    pub max_retries: i32,
    /// Delay before each retry, indexed by retry number; the last step repeats
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_seconds: Vec<u64>,
}

impl WorkerQueueConfig {
    /// Delay before retry number `retry_count` (0-based).
    pub fn retry_delay_seconds(&self, retry_count: i32) -> u64 {
        let index = usize::try_from(retry_count).unwrap_or(0);
        self.retry_backoff_seconds
            .get(index)
            .or_else(|| self.retry_backoff_seconds.last())
            .copied()
            .unwrap_or(60)
    }
}

const fn default_max_retries() -> i32 {
    3
}

const fn default_job_timeout() -> u32 {
    300 // 5 minutes
}

fn default_retry_backoff() -> Vec<u64> {
    vec![60, 300, 900]
}

const fn default_cleanup_interval() -> u64 {
    3600 // 1 hour
}

const fn default_completed_retention() -> u64 {
    7200 // 2 hours
}

const fn default_failed_retention() -> u64 {
    172_800 // 2 days
}

const fn default_cleanup_batch_size() -> usize {
    1000
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue_config(steps: Vec<u64>) -> WorkerQueueConfig {
        WorkerQueueConfig {
            jobs: vec!["send_notification".to_string()],
            count: 1,
            job_timeout: 30,
            max_retries: 3,
            retry_backoff_seconds: steps,
        }
    }

    #[test]
    fn test_retry_delay_follows_fixed_steps() {
        let config = queue_config(default_retry_backoff());

        assert_eq!(config.retry_delay_seconds(0), 60);
        assert_eq!(config.retry_delay_seconds(1), 300);
        assert_eq!(config.retry_delay_seconds(2), 900);
    }

    #[test]
    fn test_retry_delay_clamps_to_last_step() {
        let config = queue_config(default_retry_backoff());

        assert_eq!(config.retry_delay_seconds(7), 900);
    }

    #[test]
    fn test_retry_delay_without_steps_falls_back() {
        let config = queue_config(Vec::new());

        assert_eq!(config.retry_delay_seconds(0), 60);
    }

    #[test]
    fn test_email_config_parses_smtp_sender() {
        let config: EmailConfig = serde_json::from_value(serde_json::json!({
            "type": "smtp",
            "host": "smtp.example.org",
            "port": 587,
            "sender": "Conference <noreply@example.org>",
            "username": null,
            "password": null
        }))
        .expect("valid smtp config");

        assert_eq!(config.sender().email.to_string(), "noreply@example.org");
        assert!(matches!(config, EmailConfig::Smtp { use_tls: true, .. }));
    }
}

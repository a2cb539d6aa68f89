use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::app_info::AppInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Healthy,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Outcome of one health check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl CheckResult {
    pub fn new(name: &str, status: CheckStatus, message: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status,
            message: message.into(),
            latency_ms: None,
            details: None,
        }
    }

    #[must_use]
    pub const fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = Some(latency_ms);
        self
    }

    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: OverallStatus,
    pub checks: Vec<CheckResult>,
    pub checked_at: DateTime<Utc>,
    pub version: String,
    /// Whether this report came from the cache rather than a fresh run
    pub cached: bool,
}

impl HealthReport {
    pub fn new(checks: Vec<CheckResult>) -> Self {
        Self {
            status: aggregate(&checks),
            checks,
            checked_at: Utc::now(),
            version: AppInfo::current().version.to_string(),
            cached: false,
        }
    }

    pub fn check(&self, name: &str) -> Option<&CheckResult> {
        self.checks.iter().find(|check| check.name == name)
    }
}

/// More than two critical checks make the service unhealthy; any single
/// critical or warning check degrades it.
pub fn aggregate(checks: &[CheckResult]) -> OverallStatus {
    let critical = checks
        .iter()
        .filter(|check| check.status == CheckStatus::Critical)
        .count();
    let warning = checks
        .iter()
        .filter(|check| check.status == CheckStatus::Warning)
        .count();

    if critical > 2 {
        OverallStatus::Unhealthy
    } else if critical > 0 || warning > 0 {
        OverallStatus::Degraded
    } else {
        OverallStatus::Healthy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checks(statuses: &[CheckStatus]) -> Vec<CheckResult> {
        statuses
            .iter()
            .enumerate()
            .map(|(i, status)| CheckResult::new(&format!("check{i}"), *status, "test"))
            .collect()
    }

    #[test]
    fn test_all_healthy() {
        let result = aggregate(&checks(&[CheckStatus::Healthy, CheckStatus::Healthy]));

        assert_eq!(result, OverallStatus::Healthy);
    }

    #[test]
    fn test_single_warning_degrades() {
        let result = aggregate(&checks(&[CheckStatus::Healthy, CheckStatus::Warning]));

        assert_eq!(result, OverallStatus::Degraded);
    }

    #[test]
    fn test_two_critical_checks_only_degrade() {
        let result = aggregate(&checks(&[
            CheckStatus::Critical,
            CheckStatus::Critical,
            CheckStatus::Healthy,
        ]));

        assert_eq!(result, OverallStatus::Degraded);
    }

    #[test]
    fn test_three_critical_checks_are_unhealthy() {
        let result = aggregate(&checks(&[
            CheckStatus::Critical,
            CheckStatus::Critical,
            CheckStatus::Critical,
        ]));

        assert_eq!(result, OverallStatus::Unhealthy);
    }

    #[test]
    fn test_report_serializes_lowercase_statuses() {
        let report = HealthReport::new(checks(&[CheckStatus::Warning]));
        let json = serde_json::to_value(&report).expect("serializes");

        assert_eq!(json["status"], "degraded");
        assert_eq!(json["checks"][0]["status"], "warning");
        assert_eq!(json["cached"], false);
    }
}

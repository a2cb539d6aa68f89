pub mod checks;
mod monitor;
pub mod report;
pub mod system;

pub use monitor::{run_checks, HealthMonitor};
pub use report::{CheckResult, CheckStatus, HealthReport, OverallStatus};

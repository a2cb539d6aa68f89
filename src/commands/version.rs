use std::env;

use serde::Serialize;

use crate::app_info::AppInfo;

/// What `conclave version` reports.
#[derive(Debug, Serialize)]
pub struct VersionInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub git_hash: &'static str,
    pub build_timestamp: &'static str,
    pub rustc_version: &'static str,
    pub os: &'static str,
    pub arch: &'static str,
}

impl VersionInfo {
    pub fn collect() -> Self {
        let app = AppInfo::current();

        Self {
            name: app.name,
            version: app.version,
            git_hash: option_env!("GIT_HASH").unwrap_or("unknown"),
            build_timestamp: option_env!("BUILD_TIMESTAMP").unwrap_or("unknown"),
            rustc_version: option_env!("RUSTC_VERSION").unwrap_or("unknown"),
            os: env::consts::OS,
            arch: env::consts::ARCH,
        }
    }
}

pub fn print_version_info(json: bool) {
    let info = VersionInfo::collect();

    if json {
        match serde_json::to_string_pretty(&info) {
            Ok(rendered) => println!("{rendered}"),
            Err(e) => eprintln!("❌ Failed to render version info: {e}"),
        }
        return;
    }

    let app = AppInfo::current();
    println!("📦 {}", app.label());
    if !app.description.is_empty() {
        println!("📝 {}", app.description);
    }

    println!();
    println!("🔨 Build:");
    println!("  🔗 Git hash: {}", info.git_hash);
    println!("  ⏰ Built at: {}", info.build_timestamp);
    println!("  🦀 rustc: {}", info.rustc_version);
    println!();
    println!("💻 Runtime: {} / {}", info.os, info.arch);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_info_serializes_package_metadata() {
        let value = serde_json::to_value(VersionInfo::collect()).expect("serializes");

        assert_eq!(value["name"], "conclave");
        assert_eq!(value["version"], env!("CARGO_PKG_VERSION"));
        assert_eq!(value["os"], env::consts::OS);
    }
}

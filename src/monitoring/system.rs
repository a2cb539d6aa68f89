//! Host resource readings used by the health checks.

use std::{io, path::Path};

/// Memory figures from `/proc/meminfo`, in kibibytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryReading {
    pub total_kb: u64,
    pub available_kb: u64,
}

impl MemoryReading {
    #[allow(clippy::cast_precision_loss)]
    pub fn used_percent(&self) -> f64 {
        if self.total_kb == 0 {
            return 0.0;
        }
        let used = self.total_kb.saturating_sub(self.available_kb);
        used as f64 / self.total_kb as f64 * 100.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskReading {
    pub total_bytes: u64,
    pub available_bytes: u64,
}

impl DiskReading {
    #[allow(clippy::cast_precision_loss)]
    pub fn free_percent(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        self.available_bytes as f64 / self.total_bytes as f64 * 100.0
    }
}

/// Parses the `MemTotal` and `MemAvailable` lines of a meminfo dump.
///
/// Older kernels lack `MemAvailable`; free plus page cache stands in for it.
pub fn parse_meminfo(content: &str) -> Option<MemoryReading> {
    let field = |name: &str| {
        content.lines().find_map(|line| {
            let rest = line.strip_prefix(name)?.strip_prefix(':')?;
            rest.split_whitespace().next()?.parse::<u64>().ok()
        })
    };

    let total_kb = field("MemTotal")?;
    let available_kb = field("MemAvailable")
        .or_else(|| Some(field("MemFree")? + field("Cached").unwrap_or(0)))?;

    Some(MemoryReading {
        total_kb,
        available_kb,
    })
}

pub async fn read_memory() -> Option<MemoryReading> {
    let content = tokio::fs::read_to_string("/proc/meminfo").await.ok()?;
    parse_meminfo(&content)
}

pub fn read_disk(path: &Path) -> io::Result<DiskReading> {
    Ok(DiskReading {
        total_bytes: fs2::total_space(path)?,
        available_bytes: fs2::available_space(path)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MEMINFO: &str = "MemTotal:       16000000 kB
MemFree:         2000000 kB
MemAvailable:    4000000 kB
Cached:          1500000 kB
";

    #[test]
    fn test_parse_meminfo() {
        let reading = parse_meminfo(MEMINFO).expect("parses");

        assert_eq!(reading.total_kb, 16_000_000);
        assert_eq!(reading.available_kb, 4_000_000);
        assert!((reading.used_percent() - 75.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_meminfo_without_available() {
        let reading = parse_meminfo("MemTotal: 1000 kB\nMemFree: 100 kB\nCached: 150 kB\n")
            .expect("parses");

        assert_eq!(reading.available_kb, 250);
    }

    #[test]
    fn test_parse_meminfo_without_total() {
        assert!(parse_meminfo("MemFree: 100 kB\n").is_none());
    }

    #[test]
    fn test_disk_free_percent() {
        let reading = DiskReading {
            total_bytes: 200,
            available_bytes: 30,
        };

        assert!((reading.free_percent() - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_read_disk_of_current_directory() {
        let reading = read_disk(Path::new(".")).expect("current dir has a filesystem");

        assert!(reading.total_bytes >= reading.available_bytes);
    }
}

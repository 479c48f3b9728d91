//! System memory utilization for backpressure.

use std::path::PathBuf;

/// Reports used memory as a percentage of total.
pub trait MemoryGauge: Send + Sync {
    /// `None` when utilization cannot be determined; no backpressure then.
    fn utilization_pct(&self) -> Option<f64>;
}

/// Reads `MemTotal` and `MemAvailable` from `/proc/meminfo`.
#[derive(Debug, Clone)]
pub struct ProcMeminfoGauge {
    path: PathBuf,
}

impl Default for ProcMeminfoGauge {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/proc/meminfo"),
        }
    }
}

impl ProcMeminfoGauge {
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }
}

impl MemoryGauge for ProcMeminfoGauge {
    fn utilization_pct(&self) -> Option<f64> {
        let content = std::fs::read_to_string(&self.path).ok()?;
        parse_meminfo(&content)
    }
}

fn field_kib(content: &str, key: &str) -> Option<u64> {
    content
        .lines()
        .find_map(|line| line.strip_prefix(key))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|kib| kib.parse().ok())
}

/// Utilization from meminfo text: `100 * (total - available) / total`.
pub fn parse_meminfo(content: &str) -> Option<f64> {
    let total = field_kib(content, "MemTotal:")?;
    let available = field_kib(content, "MemAvailable:")?;
    if total == 0 {
        return None;
    }
    let used = total.saturating_sub(available);
    Some(100.0 * used as f64 / total as f64)
}

/// Constant reading.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedMemoryGauge(pub Option<f64>);

impl MemoryGauge for FixedMemoryGauge {
    fn utilization_pct(&self) -> Option<f64> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "MemTotal:       16000000 kB\n\
                          MemFree:         1000000 kB\n\
                          MemAvailable:    4000000 kB\n\
                          Buffers:          200000 kB\n";

    #[test]
    fn parses_utilization() {
        let pct = parse_meminfo(SAMPLE).expect("utilization");
        assert!((pct - 75.0).abs() < 1e-9);
    }

    #[test]
    fn missing_fields_yield_none() {
        assert_eq!(parse_meminfo("MemTotal: 100 kB\n"), None);
        assert_eq!(parse_meminfo(""), None);
        assert_eq!(parse_meminfo("MemTotal: 0 kB\nMemAvailable: 0 kB\n"), None);
    }

    #[test]
    fn gauge_reads_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("meminfo");
        std::fs::write(&path, SAMPLE).expect("write");
        let gauge = ProcMeminfoGauge::with_path(path);
        assert!(gauge.utilization_pct().is_some());
        let missing = ProcMeminfoGauge::with_path(dir.path().join("absent"));
        assert_eq!(missing.utilization_pct(), None);
    }
}

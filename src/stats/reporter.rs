// src/stats/reporter.rs
use crate::stats::metrics::MetricsReport;
use log::{debug, info};
use sysinfo::{Components, System};

/// Statistics related to host hardware
#[derive(Debug, Clone)]
pub struct HardwareStats {
    /// Current CPU usage percentage (0-100)
    pub cpu_usage: f32,
    /// Memory currently used on the host (in bytes)
    pub memory_used: u64,
    /// Current CPU temperature in Celsius
    pub temperature: f32,
}

/// Result of submitting a share to the mining pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareResult {
    /// The share was accepted as valid
    Accepted,
    /// The share was rejected (stale, duplicate, low difficulty)
    Rejected,
}

/// Formats and logs the periodic metrics line
///
/// Runs on the reactor thread; hash counters come from the solver pool's
/// [`MetricsReport`], share verdicts from the pool responses.
pub struct StatsReporter {
    system: System,
    components: Components,
    accepted: u64,
    rejected: u64,
}

impl Default for StatsReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsReporter {
    /// Creates a reporter with zeroed share counters
    pub fn new() -> Self {
        StatsReporter {
            system: System::new(),
            components: Components::new_with_refreshed_list(),
            accepted: 0,
            rejected: 0,
        }
    }

    /// Counts a pool verdict on a submitted share
    pub fn record_share(&mut self, result: ShareResult) {
        match result {
            ShareResult::Accepted => self.accepted += 1,
            ShareResult::Rejected => self.rejected += 1,
        }
    }

    /// Accepted and rejected share counts
    pub fn shares(&self) -> (u64, u64) {
        (self.accepted, self.rejected)
    }

    /// Gets the current hardware statistics
    ///
    /// This refreshes system information before returning the stats.
    pub fn get_hardware_stats(&mut self) -> HardwareStats {
        self.system.refresh_cpu_all();
        self.system.refresh_memory();
        self.components.refresh(true);

        let cpus = self.system.cpus();
        let cpu_usage = if cpus.is_empty() {
            0.0
        } else {
            cpus.iter().map(|c| c.cpu_usage()).sum::<f32>() / cpus.len() as f32
        };

        let temperature = self
            .components
            .iter()
            .find(|c| c.label().contains("CPU"))
            .and_then(|c| c.temperature())
            .unwrap_or(0.0);

        HardwareStats {
            cpu_usage,
            memory_used: self.system.used_memory(),
            temperature,
        }
    }

    /// Builds the metrics line for `report`
    pub fn format_line(&self, report: &MetricsReport, hw: &HardwareStats) -> String {
        format!(
            "{} | Accepted/Rejected: {}/{} | CPU: {:.1}% | Temp: {:.1}°C",
            report, self.accepted, self.rejected, hw.cpu_usage, hw.temperature
        )
    }

    /// Logs the metrics line, and per-solver detail at debug level
    pub fn report(&mut self, report: &MetricsReport) {
        let hw = self.get_hardware_stats();
        info!("{}", self.format_line(report, &hw));
        for solver in &report.solvers {
            debug!("  {}", solver);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn line_includes_share_counts() {
        let mut reporter = StatsReporter::new();
        reporter.record_share(ShareResult::Accepted);
        reporter.record_share(ShareResult::Accepted);
        reporter.record_share(ShareResult::Rejected);
        assert_eq!(reporter.shares(), (2, 1));

        let report = MetricsReport {
            interval: Duration::from_secs(10),
            uptime: Duration::from_secs(10),
            solvers: Vec::new(),
        };
        let hw = HardwareStats {
            cpu_usage: 12.5,
            memory_used: 0,
            temperature: 40.0,
        };
        let line = reporter.format_line(&report, &hw);
        assert!(line.contains("Accepted/Rejected: 2/1"));
        assert!(line.contains("CPU: 12.5%"));
    }
}

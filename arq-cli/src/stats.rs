//! Statistics display and formatting
//!
//! Everything here writes to stderr; stdout is left free.

use crate::config::TestMode;
use arq_protocol::packet::{PAYLOAD_SIZE, SEGMENT_SIZE};
use arq_protocol::{ReceiverStats, SenderStats};
use std::fmt;
use std::time::Duration;

/// Format bytes in human-readable form
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Format bandwidth in human-readable form
pub fn format_bandwidth(bps: u64) -> String {
    const KBPS: u64 = 1000;
    const MBPS: u64 = KBPS * 1000;
    const GBPS: u64 = MBPS * 1000;

    if bps >= GBPS {
        format!("{:.2} Gbps", bps as f64 / GBPS as f64)
    } else if bps >= MBPS {
        format!("{:.2} Mbps", bps as f64 / MBPS as f64)
    } else if bps >= KBPS {
        format!("{:.2} Kbps", bps as f64 / KBPS as f64)
    } else {
        format!("{} bps", bps)
    }
}

/// Format an elapsed time, keeping microsecond resolution for short runs
pub fn format_duration(duration: Duration) -> String {
    let micros = duration.as_micros();
    if micros < 1_000 {
        return format!("{}µs", micros);
    }
    if micros < 1_000_000 {
        return format!("{:.2}ms", micros as f64 / 1_000.0);
    }

    let secs = duration.as_secs();
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = duration.as_secs_f64() % 60.0;

    if hours > 0 {
        format!("{}h {:02}m {:05.2}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {:05.2}s", minutes, seconds)
    } else {
        format!("{:.2}s", seconds)
    }
}

/// Outcome of one initiator run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub mode: TestMode,
    /// Present for sliding-window runs
    pub window_size: Option<usize>,
    pub elapsed: Duration,
    pub stats: SenderStats,
}

impl RunReport {
    pub fn new(
        mode: TestMode,
        window_size: Option<usize>,
        elapsed: Duration,
        stats: SenderStats,
    ) -> Self {
        RunReport {
            mode,
            window_size,
            elapsed,
            stats,
        }
    }

    /// Distinct segments delivered per second
    pub fn segments_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.stats.segments_sent as f64 / secs
        } else {
            0.0
        }
    }

    /// Goodput in bits per second, counting each segment once
    pub fn throughput_bps(&self) -> u64 {
        (self.segments_per_sec() * (SEGMENT_SIZE * 8) as f64) as u64
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(window) = self.window_size {
            write!(f, "Window size = {:2} ", window)?;
        }
        write!(
            f,
            "Elapsed time = {} ({} us)",
            format_duration(self.elapsed),
            self.elapsed.as_micros()
        )?;
        if self.mode != TestMode::Unreliable {
            write!(f, " retransmits = {}", self.stats.retransmits)?;
        }
        write!(
            f,
            " | {:.0} segs/s, {}",
            self.segments_per_sec(),
            format_bandwidth(self.throughput_bps())
        )
    }
}

/// Print one run's result
pub fn display_report(report: &RunReport) {
    eprintln!("{}", report);
}

/// Print the table produced by a window sweep
pub fn display_sweep_table(reports: &[RunReport]) {
    eprintln!("\n┌────────┬──────────────┬─────────────┬──────────────┐");
    eprintln!("│ Window │ Elapsed (us) │ Retransmits │ Throughput   │");
    eprintln!("├────────┼──────────────┼─────────────┼──────────────┤");
    for report in reports {
        eprintln!(
            "│ {:6} │ {:12} │ {:11} │ {:12} │",
            report.window_size.unwrap_or(1),
            report.elapsed.as_micros(),
            report.stats.retransmits,
            format_bandwidth(report.throughput_bps())
        );
    }
    eprintln!("└────────┴──────────────┴─────────────┴──────────────┘");
}

/// Print what a responder saw
pub fn display_receiver_summary(mode: TestMode, stats: &ReceiverStats, expected: u32) {
    let lost = u64::from(expected).saturating_sub(stats.delivered);
    eprintln!(
        "{}: received {} of {} segments ({} lost, {})",
        mode,
        stats.delivered,
        expected,
        lost,
        format_bytes(stats.delivered * PAYLOAD_SIZE as u64)
    );
    if mode != TestMode::Unreliable {
        eprintln!(
            "  datagrams = {}, duplicates = {}, rejected = {}, acks sent = {}",
            stats.datagrams_received, stats.duplicates, stats.rejected, stats.acks_sent
        );
    }
    if stats.malformed > 0 {
        eprintln!("  malformed datagrams = {}", stats.malformed);
    }
}

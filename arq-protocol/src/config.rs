//! Engine configuration
//!
//! Every engine is constructed from an explicit [`EngineConfig`]; there is no
//! ambient or global state shared between runs.

use crate::error::ArqError;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default number of segments per run
pub const DEFAULT_SEGMENT_COUNT: u32 = 20_000;

/// Default retransmission timeout
pub const DEFAULT_RTO: Duration = Duration::from_micros(1500);

/// Largest window exercised by a window sweep
pub const MAX_SWEEP_WINDOW: usize = 30;

/// What the sliding-window receiver advertises after each admitted segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AckPolicy {
    /// Advertise the highest contiguously received sequence number
    Cumulative,
    /// Advertise the highest contiguously received sequence number, clamped
    /// to the segment that was just received
    #[default]
    EarlyRetransmit,
}

impl fmt::Display for AckPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AckPolicy::Cumulative => write!(f, "cumulative"),
            AckPolicy::EarlyRetransmit => write!(f, "early-retransmit"),
        }
    }
}

impl FromStr for AckPolicy {
    type Err = ArqError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cumulative" => Ok(AckPolicy::Cumulative),
            "early-retransmit" => Ok(AckPolicy::EarlyRetransmit),
            other => Err(ArqError::InvalidConfig(format!(
                "unknown ack policy '{}'",
                other
            ))),
        }
    }
}

/// Parameters of one transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Number of segments to transfer (sequence numbers `0..segment_count`)
    pub segment_count: u32,
    /// Maximum outstanding segments (sliding window only)
    pub window_size: usize,
    /// Retransmission timeout
    pub rto: Duration,
    /// Receiver acknowledgment policy (sliding window only)
    pub ack_policy: AckPolicy,
    /// Give up receiving after this long without a datagram
    pub idle_timeout: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            segment_count: DEFAULT_SEGMENT_COUNT,
            window_size: 1,
            rto: DEFAULT_RTO,
            ack_policy: AckPolicy::default(),
            idle_timeout: None,
        }
    }
}

impl EngineConfig {
    pub fn with_segment_count(mut self, segment_count: u32) -> Self {
        self.segment_count = segment_count;
        self
    }

    pub fn with_window_size(mut self, window_size: usize) -> Self {
        self.window_size = window_size;
        self
    }

    pub fn with_rto(mut self, rto: Duration) -> Self {
        self.rto = rto;
        self
    }

    pub fn with_ack_policy(mut self, ack_policy: AckPolicy) -> Self {
        self.ack_policy = ack_policy;
        self
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Option<Duration>) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Reject configurations no engine can run with
    pub fn validate(&self) -> Result<(), ArqError> {
        if self.segment_count == 0 {
            return Err(ArqError::InvalidConfig(
                "segment count must be at least 1".to_string(),
            ));
        }
        if self.window_size == 0 {
            return Err(ArqError::InvalidConfig(
                "window size must be at least 1".to_string(),
            ));
        }
        if self.rto.is_zero() {
            return Err(ArqError::InvalidConfig(
                "retransmission timeout must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Sequence number of the last segment of the run
    pub fn final_seq(&self) -> crate::SeqNumber {
        crate::SeqNumber::new(self.segment_count.saturating_sub(1))
    }
}

/// Responder shutdown: how often and how far apart the final ack is repeated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LingerConfig {
    pub count: u32,
    pub interval: Duration,
}

impl Default for LingerConfig {
    fn default() -> Self {
        LingerConfig {
            count: 10,
            interval: Duration::from_secs(1),
        }
    }
}

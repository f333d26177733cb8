//! Retransmission timer
//!
//! A monotonic stopwatch with a fixed retransmission timeout (RTO). The
//! senders start it after a transmission and consult it to decide when the
//! oldest unacknowledged segment must be sent again.

use std::time::{Duration, Instant};

/// Stopwatch with a fixed expiry threshold
#[derive(Debug, Clone)]
pub struct RetransmitTimer {
    rto: Duration,
    started: Instant,
}

impl RetransmitTimer {
    /// Create a timer with the given retransmission timeout, started now
    pub fn new(rto: Duration) -> Self {
        RetransmitTimer {
            rto,
            started: Instant::now(),
        }
    }

    /// (Re)start the timer
    pub fn start(&mut self) {
        self.started = Instant::now();
    }

    /// Time elapsed since the last start
    pub fn lap(&self) -> Duration {
        self.started.elapsed()
    }

    /// Check if the retransmission timeout has passed
    pub fn expired(&self) -> bool {
        self.lap() > self.rto
    }

    /// Time left until expiry (zero once expired)
    pub fn remaining(&self) -> Duration {
        self.rto.saturating_sub(self.lap())
    }

    pub fn rto(&self) -> Duration {
        self.rto
    }
}

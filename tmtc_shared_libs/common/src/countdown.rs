/*
Elapsed-time countdown used to pace telecommand dispatch (wait directives,
inter-command delay, telemetry reception timeouts).

Timing is based on std::time::Instant so that wall clock adjustments on the
ground station machine cannot stall or skip pacing.
*/

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct Countdown {
    start: Instant,
    timeout: Duration,
}

impl Countdown {
    /// Create a countdown and start it immediately. A `None` timeout means a
    /// zero timeout, so the countdown reports timed out right away.
    pub fn new(timeout: Option<Duration>) -> Self {
        Countdown {
            start: Instant::now(),
            timeout: timeout.unwrap_or(Duration::ZERO),
        }
    }

    /// Restart the clock. If a new timeout is provided it replaces the
    /// current one, otherwise the previous timeout is re-armed.
    pub fn reset(&mut self, new_timeout: Option<Duration>) {
        if let Some(timeout) = new_timeout {
            self.timeout = timeout;
        }
        self.start = Instant::now();
    }

    pub fn timed_out(&self) -> bool {
        self.start.elapsed() >= self.timeout
    }

    pub fn busy(&self) -> bool {
        !self.timed_out()
    }

    /// Time left until the deadline, zero once it has passed
    pub fn remaining(&self) -> Duration {
        self.timeout.saturating_sub(self.start.elapsed())
    }
}

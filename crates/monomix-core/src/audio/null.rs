//! Null output device
//!
//! Discards every period but blocks like hardware would, so the render loop
//! runs at real-time pace without a sound card.

use std::thread;
use std::time::{Duration, Instant};

use crate::types::{period_duration, Sample};

use super::backend::PcmDevice;
use super::error::{AudioResult, WriteError};

pub struct NullDevice {
    sample_rate: u32,
    period: Duration,
    /// When the next period is due; None until the first write
    next_deadline: Option<Instant>,
    periods_written: u64,
}

impl NullDevice {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            period: period_duration(sample_rate),
            next_deadline: None,
            periods_written: 0,
        }
    }

    pub fn periods_written(&self) -> u64 {
        self.periods_written
    }
}

impl PcmDevice for NullDevice {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn write(&mut self, _period: &[Sample]) -> Result<(), WriteError> {
        let now = Instant::now();
        let deadline = self.next_deadline.unwrap_or(now);
        if deadline > now {
            thread::sleep(deadline - now);
        }
        // Behind schedule: restart the clock rather than bursting to catch up
        self.next_deadline = Some(deadline.max(now) + self.period);
        self.periods_written += 1;
        Ok(())
    }

    fn recover(&mut self, _error: &WriteError) -> AudioResult<()> {
        self.next_deadline = None;
        Ok(())
    }

    fn drain(&mut self) {
        log::debug!(
            "Null device closing after {} periods",
            self.periods_written
        );
    }
}

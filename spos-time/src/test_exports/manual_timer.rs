// Copyright (c) 2022 MASSA LABS <info@massa.net>

use crate::{SposTime, SyncTimer};
use parking_lot::RwLock;

/// `SyncTimer` driven by hand: either the local clock with a settable offset,
/// or a frozen instant that only moves when told to.
#[derive(Default)]
pub struct ManualSyncTimer {
    offset: RwLock<i64>,
    frozen: RwLock<Option<SposTime>>,
}

impl ManualSyncTimer {
    /// Follows the local clock with a zero offset
    pub fn new() -> Self {
        Self::default()
    }

    /// Frozen at `time` until `advance` or `set_time` is called
    pub fn frozen_at(time: SposTime) -> Self {
        ManualSyncTimer {
            offset: RwLock::new(0),
            frozen: RwLock::new(Some(time)),
        }
    }

    /// Changes the drift applied on top of the base clock
    pub fn set_offset(&self, offset_millis: i64) {
        *self.offset.write() = offset_millis;
    }

    /// Freezes the base clock at `time`
    pub fn set_time(&self, time: SposTime) {
        *self.frozen.write() = Some(time);
    }

    /// Moves a frozen clock forward. No effect on a clock following the local time.
    pub fn advance(&self, millis: u64) {
        if let Some(time) = self.frozen.write().as_mut() {
            *time = time.saturating_add(SposTime::from_millis(millis));
        }
    }
}

impl SyncTimer for ManualSyncTimer {
    fn clock_offset(&self) -> i64 {
        *self.offset.read()
    }

    fn current_time(&self) -> SposTime {
        let base = self.frozen.read().unwrap_or_else(SposTime::now);
        base.apply_offset(self.clock_offset())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frozen_clock_moves_only_on_demand() {
        let timer = ManualSyncTimer::frozen_at(SposTime::from_millis(1_000));
        assert_eq!(timer.current_time(), SposTime::from_millis(1_000));
        timer.advance(250);
        timer.set_offset(300);
        assert_eq!(timer.current_time(), SposTime::from_millis(1_550));
        assert_eq!(timer.formatted_current_time(), "1970-01-01 00:00:01.550000000");
    }
}

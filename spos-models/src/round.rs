// Copyright (c) 2022 MASSA LABS <info@massa.net>

use serde::{Deserialize, Serialize};
use spos_time::SposTime;

/// Fixed-duration global slot.
///
/// `index == floor((time_stamp - genesis) / time_duration)` and `time_stamp` is the start of
/// the round. The index never decreases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Round {
    index: i64,
    time_stamp: SposTime,
    time_duration: SposTime,
}

impl Round {
    /// Round containing `now`. Before genesis the index is negative.
    pub fn new(genesis: SposTime, now: SposTime, time_duration: SposTime) -> Self {
        let index = Self::index_at(genesis, now, time_duration);
        Round {
            index,
            time_stamp: Self::start_of(genesis, index, time_duration),
            time_duration,
        }
    }

    fn index_at(genesis: SposTime, now: SposTime, time_duration: SposTime) -> i64 {
        let duration = i64::try_from(time_duration.to_millis())
            .unwrap_or(i64::MAX)
            .max(1);
        now.signed_diff(genesis).div_euclid(duration)
    }

    fn start_of(genesis: SposTime, index: i64, time_duration: SposTime) -> SposTime {
        let offset = i128::from(index) * i128::from(time_duration.to_millis());
        genesis.apply_offset(i64::try_from(offset).unwrap_or(if offset < 0 {
            i64::MIN
        } else {
            i64::MAX
        }))
    }

    /// Moves to the round containing `now`. Returns true if the index changed.
    /// A `now` earlier than the current round (clock jumping back) leaves the round untouched.
    ///
    /// ```
    /// # use spos_models::round::Round;
    /// # use spos_time::SposTime;
    /// let genesis = SposTime::from_millis(10_000);
    /// let mut round = Round::new(genesis, genesis, SposTime::from_millis(4_000));
    /// assert!(round.update_round(genesis, SposTime::from_millis(18_500)));
    /// assert_eq!(round.index(), 2);
    /// assert_eq!(round.time_stamp(), SposTime::from_millis(18_000));
    /// assert!(!round.update_round(genesis, SposTime::from_millis(11_000)));
    /// assert_eq!(round.index(), 2);
    /// ```
    pub fn update_round(&mut self, genesis: SposTime, now: SposTime) -> bool {
        let index = Self::index_at(genesis, now, self.time_duration);
        if index <= self.index {
            return false;
        }
        self.index = index;
        self.time_stamp = Self::start_of(genesis, index, self.time_duration);
        true
    }

    /// Round index
    pub fn index(&self) -> i64 {
        self.index
    }

    /// Start of the round
    pub fn time_stamp(&self) -> SposTime {
        self.time_stamp
    }

    /// Duration of every round
    pub fn time_duration(&self) -> SposTime {
        self.time_duration
    }

    /// Milliseconds elapsed since the start of the round, negative before it
    pub fn time_in_round(&self, now: SposTime) -> i64 {
        now.signed_diff(self.time_stamp)
    }

    /// `(time_stamp + duration) - now` in milliseconds. May be negative.
    pub fn remaining_time(&self, now: SposTime) -> i64 {
        self.time_stamp
            .saturating_add(self.time_duration)
            .signed_diff(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_before_genesis_is_negative() {
        let genesis = SposTime::from_millis(100_000);
        let round = Round::new(
            genesis,
            SposTime::from_millis(99_000),
            SposTime::from_millis(4_000),
        );
        assert_eq!(round.index(), -1);
        assert_eq!(round.time_stamp(), SposTime::from_millis(96_000));
        assert_eq!(round.remaining_time(SposTime::from_millis(99_000)), 1_000);
    }

    #[test]
    fn test_remaining_time_goes_negative() {
        let genesis = SposTime::from_millis(0);
        let round = Round::new(genesis, genesis, SposTime::from_millis(4_000));
        assert_eq!(round.remaining_time(SposTime::from_millis(4_500)), -500);
        assert_eq!(round.time_in_round(SposTime::from_millis(4_500)), 4_500);
    }

    #[test]
    fn test_index_is_monotonic_over_many_updates() {
        let genesis = SposTime::from_millis(1_000);
        let mut round = Round::new(genesis, genesis, SposTime::from_millis(100));
        let mut last = round.index();
        for now in [1_050u64, 1_420, 1_300, 2_000, 1_999, 5_000] {
            round.update_round(genesis, SposTime::from_millis(now));
            assert!(round.index() >= last);
            last = round.index();
        }
        assert_eq!(last, 40);
    }
}

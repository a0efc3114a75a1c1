// Copyright (c) 2022 MASSA LABS <info@massa.net>

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a subround inside a round.
///
/// The protocol uses the dense range `START_ROUND..=END_ROUND`; the other values are sentinels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SubroundId(pub i32);

impl SubroundId {
    /// Nothing may run in this round
    pub const BEFORE_ROUND: SubroundId = SubroundId(-1);
    /// Group selection and state reset
    pub const START_ROUND: SubroundId = SubroundId(0);
    /// Block proposal
    pub const BLOCK: SubroundId = SubroundId(1);
    /// Commitment hashes (Bellare–Neven)
    pub const COMMITMENT_HASH: SubroundId = SubroundId(2);
    /// Participation bitmap (Bellare–Neven)
    pub const BITMAP: SubroundId = SubroundId(3);
    /// Commitment reveal (Bellare–Neven)
    pub const COMMITMENT: SubroundId = SubroundId(4);
    /// Signature shares
    pub const SIGNATURE: SubroundId = SubroundId(5);
    /// Aggregation and commit
    pub const END_ROUND: SubroundId = SubroundId(6);
    /// Terminal: every subround of the round is done
    pub const AFTER_ROUND: SubroundId = SubroundId(7);
    /// Time outside of every registered subround
    pub const UNKNOWN: SubroundId = SubroundId(i32::MAX);

    /// True for the ids carried by real subrounds
    pub fn is_protocol_subround(&self) -> bool {
        (Self::START_ROUND.0..=Self::END_ROUND.0).contains(&self.0)
    }

    /// Human readable name
    pub fn name(&self) -> &'static str {
        match *self {
            Self::BEFORE_ROUND => "(BEFORE_ROUND)",
            Self::START_ROUND => "(START_ROUND)",
            Self::BLOCK => "(BLOCK)",
            Self::COMMITMENT_HASH => "(COMMITMENT_HASH)",
            Self::BITMAP => "(BITMAP)",
            Self::COMMITMENT => "(COMMITMENT)",
            Self::SIGNATURE => "(SIGNATURE)",
            Self::END_ROUND => "(END_ROUND)",
            Self::AFTER_ROUND => "(AFTER_ROUND)",
            _ => "(UNKNOWN)",
        }
    }
}

impl fmt::Display for SubroundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Completion state of a subround within the current round.
/// `NotFinished` may move to `Extended` or `Finished`; both are final until the next round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SubroundStatus {
    /// still running, or not started
    #[default]
    NotFinished,
    /// deadline passed without completion
    Extended,
    /// completed
    Finished,
}

impl SubroundStatus {
    /// Whether moving from `self` to `next` is allowed
    ///
    /// ```
    /// # use spos_models::subround::SubroundStatus;
    /// assert!(SubroundStatus::NotFinished.can_become(SubroundStatus::Finished));
    /// assert!(!SubroundStatus::Extended.can_become(SubroundStatus::Finished));
    /// assert!(!SubroundStatus::Finished.can_become(SubroundStatus::Extended));
    /// assert!(SubroundStatus::Finished.can_become(SubroundStatus::Finished));
    /// ```
    pub fn can_become(self, next: SubroundStatus) -> bool {
        match self {
            SubroundStatus::NotFinished => true,
            terminal => terminal == next,
        }
    }
}

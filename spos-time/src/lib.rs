// Copyright (c) 2022 MASSA LABS <info@massa.net>
//! Unsigned time management and the synchronized clock of the consensus engine
#![warn(missing_docs)]
#![warn(unused_crate_dependencies)]

mod error;
mod sntp;
mod sync_timer;

#[cfg(feature = "test-exports")]
pub mod test_exports;

pub use error::TimeError;
pub use sntp::SntpQuery;
pub use sync_timer::{NtpSyncHandle, NtpSyncTimer, SyncTimer, TimeQuery};

use nom::error::{context, ContextError, ParseError};
use nom::IResult;
use serde::{Deserialize, Serialize};
use spos_serialization::{Deserializer, Serializer, U64VarIntDeserializer, U64VarIntSerializer};
use std::fmt;
use std::ops::Bound;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use std::{
    convert::{TryFrom, TryInto},
    str::FromStr,
};
use time::OffsetDateTime;

/// Time structure used everywhere.
/// milliseconds since 01/01/1970.
#[derive(
    Debug, Clone, Copy, Default, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct SposTime(u64);

/// Serializer for `SposTime`
#[derive(Clone, Copy, Default)]
pub struct SposTimeSerializer {
    u64_serializer: U64VarIntSerializer,
}

impl SposTimeSerializer {
    /// Creates a `SposTimeSerializer`
    pub const fn new() -> Self {
        Self {
            u64_serializer: U64VarIntSerializer::new(),
        }
    }
}

impl Serializer<SposTime> for SposTimeSerializer {
    fn serialize(
        &self,
        value: &SposTime,
        buffer: &mut Vec<u8>,
    ) -> Result<(), spos_serialization::SerializeError> {
        self.u64_serializer.serialize(&value.to_millis(), buffer)
    }
}

/// Deserializer for `SposTime`
#[derive(Clone, Copy)]
pub struct SposTimeDeserializer {
    u64_deserializer: U64VarIntDeserializer,
}

fn bound_to_millis(bound: Bound<SposTime>) -> Bound<u64> {
    match bound {
        Bound::Included(t) => Bound::Included(t.to_millis()),
        Bound::Excluded(t) => Bound::Excluded(t.to_millis()),
        Bound::Unbounded => Bound::Unbounded,
    }
}

impl SposTimeDeserializer {
    /// Creates a `SposTimeDeserializer`
    ///
    /// Arguments:
    /// * range: accepted bounds for the deserialized time
    pub fn new(range: (Bound<SposTime>, Bound<SposTime>)) -> Self {
        Self {
            u64_deserializer: U64VarIntDeserializer::new(
                bound_to_millis(range.0),
                bound_to_millis(range.1),
            ),
        }
    }
}

impl Deserializer<SposTime> for SposTimeDeserializer {
    /// ```
    /// use std::ops::Bound::Included;
    /// use spos_serialization::{Serializer, Deserializer, DeserializeError};
    /// use spos_time::{SposTime, SposTimeSerializer, SposTimeDeserializer};
    ///
    /// let time: SposTime = SposTime::from_millis(30);
    /// let mut serialized = Vec::new();
    /// let serializer = SposTimeSerializer::new();
    /// let deserializer = SposTimeDeserializer::new((Included(SposTime::from_millis(0)), Included(SposTime::from_millis(u64::MAX))));
    /// serializer.serialize(&time, &mut serialized).unwrap();
    /// let (rest, time_deser) = deserializer.deserialize::<DeserializeError>(&serialized).unwrap();
    /// assert!(rest.is_empty());
    /// assert_eq!(time, time_deser);
    /// ```
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], SposTime, E> {
        context("Failed SposTime deserialization", |input| {
            self.u64_deserializer
                .deserialize(input)
                .map(|(rest, res)| (rest, SposTime::from_millis(res)))
        })(buffer)
    }
}

impl fmt::Display for SposTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_millis())
    }
}

impl TryFrom<Duration> for SposTime {
    type Error = TimeError;

    /// Conversion from `std::time::Duration`.
    /// ```
    /// # use std::time::Duration;
    /// # use spos_time::*;
    /// # use std::convert::TryFrom;
    /// let duration: Duration = Duration::from_millis(42);
    /// let time : SposTime = SposTime::from_millis(42);
    /// assert_eq!(time, SposTime::try_from(duration).unwrap());
    /// ```
    fn try_from(value: Duration) -> Result<Self, Self::Error> {
        Ok(SposTime(
            value
                .as_millis()
                .try_into()
                .map_err(|_| TimeError::ConversionError)?,
        ))
    }
}

impl From<SposTime> for Duration {
    fn from(value: SposTime) -> Self {
        value.to_duration()
    }
}

impl FromStr for SposTime {
    type Err = crate::TimeError;

    /// Conversion from `&str`.
    ///
    /// ```
    /// # use spos_time::*;
    /// # use std::str::FromStr;
    /// assert_eq!(SposTime::from_millis(42), SposTime::from_str("42").unwrap());
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(SposTime(
            u64::from_str(s).map_err(|_| Self::Err::ConversionError)?,
        ))
    }
}

impl SposTime {
    /// Conversion from `u64`, representing timestamp in milliseconds.
    pub const fn from_millis(value: u64) -> Self {
        SposTime(value)
    }

    /// Smallest time interval
    pub const EPSILON: SposTime = SposTime(1);

    /// Gets the local UNIX timestamp (resolution: milliseconds).
    /// A clock set before 1970 reads as zero.
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        SposTime(u64::try_from(millis).unwrap_or(u64::MAX))
    }

    /// Conversion to `std::time::Duration`.
    pub fn to_duration(&self) -> Duration {
        Duration::from_millis(self.0)
    }

    /// Conversion to `u64`, representing milliseconds.
    pub const fn to_millis(&self) -> u64 {
        self.0
    }

    /// Shifts the time by a signed amount of milliseconds, saturating at both ends.
    ///
    /// ```
    /// # use spos_time::*;
    /// let time = SposTime::from_millis(1000);
    /// assert_eq!(time.apply_offset(-300), SposTime::from_millis(700));
    /// assert_eq!(time.apply_offset(300), SposTime::from_millis(1300));
    /// assert_eq!(time.apply_offset(-5000), SposTime::from_millis(0));
    /// ```
    #[must_use]
    pub fn apply_offset(self, offset_millis: i64) -> Self {
        if offset_millis >= 0 {
            SposTime(self.0.saturating_add(offset_millis.unsigned_abs()))
        } else {
            SposTime(self.0.saturating_sub(offset_millis.unsigned_abs()))
        }
    }

    /// Signed difference `self - other` in milliseconds, saturating at the i64 bounds.
    ///
    /// ```
    /// # use spos_time::*;
    /// let a = SposTime::from_millis(100);
    /// let b = SposTime::from_millis(350);
    /// assert_eq!(a.signed_diff(b), -250);
    /// assert_eq!(b.signed_diff(a), 250);
    /// ```
    pub fn signed_diff(self, other: SposTime) -> i64 {
        let diff = i128::from(self.0) - i128::from(other.0);
        i64::try_from(diff).unwrap_or(if diff < 0 { i64::MIN } else { i64::MAX })
    }

    /// ```
    /// # use spos_time::*;
    /// let res = SposTime::from_millis(42).saturating_sub(SposTime::from_millis(7));
    /// assert_eq!(res, SposTime::from_millis(42-7))
    /// ```
    #[must_use]
    pub fn saturating_sub(self, t: SposTime) -> Self {
        SposTime(self.0.saturating_sub(t.0))
    }

    /// ```
    /// # use spos_time::*;
    /// let res = SposTime::from_millis(42).saturating_add(SposTime::from_millis(7));
    /// assert_eq!(res, SposTime::from_millis(42+7))
    /// ```
    #[must_use]
    pub fn saturating_add(self, t: SposTime) -> Self {
        SposTime(self.0.saturating_add(t.0))
    }

    /// Checked subtraction
    pub fn checked_sub(self, t: SposTime) -> Result<Self, TimeError> {
        self.0
            .checked_sub(t.0)
            .ok_or_else(|| TimeError::CheckedOperationError("subtraction error".to_string()))
            .map(SposTime)
    }

    /// Checked addition
    pub fn checked_add(self, t: SposTime) -> Result<Self, TimeError> {
        self.0
            .checked_add(t.0)
            .ok_or_else(|| TimeError::CheckedOperationError("addition error".to_string()))
            .map(SposTime)
    }

    /// ```
    /// # use spos_time::*;
    /// let res : u64 = SposTime::from_millis(42).checked_div_time(SposTime::from_millis(7)).unwrap();
    /// assert_eq!(res, 42/7)
    /// ```
    pub fn checked_div_time(self, t: SposTime) -> Result<u64, TimeError> {
        self.0
            .checked_div(t.0)
            .ok_or_else(|| TimeError::CheckedOperationError("division error".to_string()))
    }

    /// ```
    /// # use spos_time::*;
    /// let res : SposTime = SposTime::from_millis(42).saturating_mul(7);
    /// assert_eq!(res, SposTime::from_millis(42*7))
    /// ```
    #[must_use]
    pub const fn saturating_mul(self, n: u64) -> SposTime {
        SposTime(self.0.saturating_mul(n))
    }

    /// Checked multiplication by an integer
    pub fn checked_mul(self, n: u64) -> Result<Self, TimeError> {
        self.0
            .checked_mul(n)
            .ok_or_else(|| TimeError::CheckedOperationError("multiplication error".to_string()))
            .map(SposTime)
    }

    /// ```
    /// # use spos_time::*;
    /// let time1 = SposTime::from_millis(42);
    /// let time2 = SposTime::from_millis(84);
    /// assert_eq!(time1.abs_diff(time2), SposTime::from_millis(42));
    /// assert_eq!(time2.abs_diff(time1), SposTime::from_millis(42));
    /// ```
    pub fn abs_diff(&self, t: SposTime) -> SposTime {
        SposTime(self.0.abs_diff(t.0))
    }

    /// Formats the instant as `YYYY-MM-DD hh:mm:ss.nnnnnnnnn` in UTC.
    ///
    /// ```
    /// # use spos_time::*;
    /// let time = SposTime::from_millis(1_640_995_200_042);
    /// assert_eq!(time.format_instant(), String::from("2022-01-01 00:00:00.042000000"))
    /// ```
    pub fn format_instant(&self) -> String {
        let nanos = i128::from(self.0) * 1_000_000;
        match OffsetDateTime::from_unix_timestamp_nanos(nanos) {
            Ok(date_time) => format!(
                "{:04}-{:02}-{:02} {:02}:{:02}:{:02}.{:09}",
                date_time.year(),
                u8::from(date_time.month()),
                date_time.day(),
                date_time.hour(),
                date_time.minute(),
                date_time.second(),
                date_time.nanosecond()
            ),
            Err(_) => format!("{}ms", self.0),
        }
    }

    /// Get max SposTime value
    pub fn max() -> SposTime {
        SposTime::from_millis(u64::MAX)
    }
}

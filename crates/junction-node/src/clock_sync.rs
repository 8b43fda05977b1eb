//! Berkeley-style clock averaging.
//!
//! One authoritative clock (the signal controller) and any number of
//! participants report their local time of day. Once the authoritative time
//! and at least one participant are known, [`ClockSync::synchronize`] takes
//! the floor of the mean of every reading and stores it. Later registrations
//! do not move the stored value until `synchronize` is called again.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{NaiveTime, Timelike};
use junction_common::{JunctionError, Result};

const SECONDS_PER_DAY: u32 = 86_400;

/// A time of day with whole-second precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClockTime(NaiveTime);

impl ClockTime {
    /// Builds a time from seconds since midnight, wrapping past one day.
    pub fn from_seconds(seconds: u32) -> Self {
        let seconds = seconds % SECONDS_PER_DAY;
        // In range after the modulo, so this never falls back.
        Self(NaiveTime::from_num_seconds_from_midnight_opt(seconds, 0).unwrap_or(NaiveTime::MIN))
    }

    pub fn seconds(&self) -> u32 {
        self.0.num_seconds_from_midnight()
    }
}

impl FromStr for ClockTime {
    type Err = JunctionError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let parsed = NaiveTime::parse_from_str(trimmed, "%H:%M:%S")
            .map_err(|_| JunctionError::InvalidFormat(trimmed.to_string()))?;
        // chrono accepts `:60` as a leap second; a wall clock reading cannot.
        if parsed.nanosecond() >= 1_000_000_000 {
            return Err(JunctionError::InvalidFormat(trimmed.to_string()));
        }
        Ok(Self(parsed))
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%H:%M:%S"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Synchronized(ClockTime),
    /// Not enough readings yet.
    Pending,
}

#[derive(Debug, Default)]
pub struct ClockSync {
    authoritative: Option<ClockTime>,
    participants: BTreeMap<String, ClockTime>,
    synchronized: Option<ClockTime>,
}

impl ClockSync {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_authoritative_time(&mut self, time: &str) -> Result<ClockTime> {
        let parsed: ClockTime = time.parse()?;
        self.authoritative = Some(parsed);
        tracing::debug!(time = %parsed, "Authoritative time set");
        Ok(parsed)
    }

    /// Records (or overwrites) a participant's reading.
    pub fn register_participant(&mut self, id: &str, time: &str) -> Result<ClockTime> {
        let parsed: ClockTime = time.parse()?;
        if self.participants.insert(id.to_string(), parsed).is_some() {
            tracing::debug!(participant = id, time = %parsed, "Participant time updated");
        } else {
            tracing::debug!(participant = id, time = %parsed, "Participant registered");
        }
        Ok(parsed)
    }

    pub fn synchronize(&mut self) -> SyncOutcome {
        let Some(authoritative) = self.authoritative else {
            return SyncOutcome::Pending;
        };
        if self.participants.is_empty() {
            return SyncOutcome::Pending;
        }

        let readings = self.participants.len() as u64 + 1;
        let total: u64 = self
            .participants
            .values()
            .map(|t| u64::from(t.seconds()))
            .sum::<u64>()
            + u64::from(authoritative.seconds());
        // Every reading is below one day, so the mean is too.
        let mean = ClockTime::from_seconds((total / readings) as u32);

        self.synchronized = Some(mean);
        tracing::info!(
            synchronized = %mean,
            participants = self.participants.len(),
            "Clocks synchronized"
        );
        SyncOutcome::Synchronized(mean)
    }

    pub fn synchronized_time(&self) -> Option<ClockTime> {
        self.synchronized
    }

    pub fn authoritative_time(&self) -> Option<ClockTime> {
        self.authoritative
    }

    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    pub fn participants(&self) -> impl Iterator<Item = (&str, ClockTime)> {
        self.participants.iter().map(|(id, t)| (id.as_str(), *t))
    }
}

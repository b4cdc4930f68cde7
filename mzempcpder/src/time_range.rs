use std::{num::ParseFloatError, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use mzempcpd::Peak;

/// A closed range of apex times, written `start-end` with either end optional
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

impl TimeRange {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, time: f64) -> bool {
        self.start <= time && time <= self.end
    }

    /// Keep only the peaks whose apex falls within this range
    pub fn filter_peaks(&self, peaks: Vec<Peak>) -> Vec<Peak> {
        peaks.into_iter().filter(|p| self.contains(p.apex)).collect()
    }
}

impl Default for TimeRange {
    fn default() -> Self {
        Self::new(0.0, f64::INFINITY)
    }
}

#[derive(Debug, Error)]
pub enum TimeRangeParseError {
    #[error("Failed to parse time range start {0}")]
    MalformedStart(#[source] ParseFloatError),
    #[error("Failed to parse time range end {0}")]
    MalformedEnd(#[source] ParseFloatError),
}

fn parse_bound(token: &str, missing: f64) -> Result<f64, ParseFloatError> {
    match token.trim() {
        "" => Ok(missing),
        token => token.parse(),
    }
}

impl FromStr for TimeRange {
    type Err = TimeRangeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (start, end) = [' ', ':', '-']
            .into_iter()
            .find_map(|sep| s.split_once(sep))
            .unwrap_or((s, ""));
        let start = parse_bound(start, 0.0).map_err(TimeRangeParseError::MalformedStart)?;
        let end = parse_bound(end, f64::INFINITY).map_err(TimeRangeParseError::MalformedEnd)?;
        Ok(Self::new(start, end))
    }
}

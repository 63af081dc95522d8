// Copyright 2025 Elbfetch Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

//! Time windows and day-prefix derivation.
//!
//! Load balancers deliver access logs under keys partitioned by UTC day:
//!
//! ```text
//! {root}/AWSLogs/{account}/elasticloadbalancing/{region}/{YYYY}/{MM}/{DD}/...
//! ```
//!
//! A run only knows its [`TimeWindow`], so [`LogLocation::prefixes`] turns
//! the window into the smallest set of day prefixes that can hold objects
//! modified inside it. The listing is coarser than the window (whole days);
//! exact filtering happens later against each object's last-modified time.
//!
//! # Example
//!
//! ```rust
//! use elbfetch_core::window::{LogLocation, TimeWindow};
//! use chrono::{TimeZone, Utc};
//!
//! let window = TimeWindow::new(
//!     Utc.with_ymd_and_hms(2023, 1, 1, 23, 30, 0).unwrap(),
//!     Utc.with_ymd_and_hms(2023, 1, 2, 0, 30, 0).unwrap(),
//! )
//! .unwrap();
//!
//! let location = LogLocation::new("alb", "123456789012", "us-east-1");
//! let prefixes = location.prefixes(&window);
//!
//! assert_eq!(prefixes.len(), 2);
//! assert_eq!(
//!     prefixes.get("2023/01/02"),
//!     Some("alb/AWSLogs/123456789012/elasticloadbalancing/us-east-1/2023/01/02")
//! );
//! ```

use crate::error::RetrievalError;
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;

/// Day key format used in object keys.
const DAY_KEY_FORMAT: &str = "%Y/%m/%d";

/// Half-open time range `[start, end)` a run is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeWindow {
    /// Creates a window.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::Validation`] if `start` is after `end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, RetrievalError> {
        if start > end {
            return Err(RetrievalError::validation(
                format!("start ({start}) should be before end ({end})"),
                Some("start"),
            ));
        }
        Ok(Self { start, end })
    }

    /// Returns the window start.
    #[must_use]
    pub const fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// Returns the window end.
    #[must_use]
    pub const fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Returns whether `instant` lies strictly between start and end.
    ///
    /// Both bounds are exclusive: an object modified exactly at `start` or
    /// `end` is not selected.
    #[must_use]
    pub fn contains_strict(&self, instant: DateTime<Utc>) -> bool {
        self.start < instant && instant < self.end
    }

    /// Returns whether the window has zero length.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Static routing facts locating one load balancer's logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLocation {
    root: String,
    account_id: String,
    region: String,
}

impl LogLocation {
    /// Creates a location. A trailing `/` on `root` is ignored.
    #[must_use]
    pub fn new(
        root: impl Into<String>,
        account_id: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        let root: String = root.into();
        Self {
            root: root.trim_end_matches('/').to_string(),
            account_id: account_id.into(),
            region: region.into(),
        }
    }

    /// Returns the log root prefix.
    #[must_use]
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Returns the account identifier.
    #[must_use]
    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// Returns the region.
    #[must_use]
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Returns the full key prefix for one UTC day key (`YYYY/MM/DD`).
    #[must_use]
    pub fn day_prefix(&self, day_key: &str) -> String {
        format!(
            "{}/AWSLogs/{}/elasticloadbalancing/{}/{}",
            self.root, self.account_id, self.region, day_key
        )
    }

    /// Derives one prefix per UTC calendar day touched by `window`.
    ///
    /// A cursor walks from `start` in one-hour steps while it is before
    /// `end`, recording each day it lands on. The day holding the window's
    /// last instant is added as well, since the final step can jump past a
    /// midnight that the window still crosses. A zero-length window yields
    /// no prefixes.
    #[must_use]
    pub fn prefixes(&self, window: &TimeWindow) -> PrefixSet {
        let mut set = PrefixSet::default();
        if window.is_empty() {
            return set;
        }

        let mut cursor = window.start;
        while cursor < window.end {
            set.insert_day(self, cursor);
            cursor += Duration::hours(1);
        }
        set.insert_day(self, window.end - Duration::nanoseconds(1));

        set
    }
}

/// Day-keyed set of listing prefixes, ordered by day.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrefixSet {
    by_day: BTreeMap<String, String>,
}

impl PrefixSet {
    fn insert_day(&mut self, location: &LogLocation, instant: DateTime<Utc>) {
        let day_key = day_key(instant);
        if !self.by_day.contains_key(&day_key) {
            let prefix = location.day_prefix(&day_key);
            self.by_day.insert(day_key, prefix);
        }
    }

    /// Returns the number of distinct days.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_day.len()
    }

    /// Returns whether no day is covered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_day.is_empty()
    }

    /// Returns the prefix for a day key.
    #[must_use]
    pub fn get(&self, day_key: &str) -> Option<&str> {
        self.by_day.get(day_key).map(String::as_str)
    }

    /// Iterates over the day keys in chronological order.
    pub fn days(&self) -> impl Iterator<Item = &str> {
        self.by_day.keys().map(String::as_str)
    }

    /// Iterates over the prefixes in chronological order.
    pub fn prefixes(&self) -> impl Iterator<Item = &str> {
        self.by_day.values().map(String::as_str)
    }
}

/// Formats the UTC calendar day of `instant` as `YYYY/MM/DD`.
#[must_use]
pub fn day_key(instant: DateTime<Utc>) -> String {
    instant.format(DAY_KEY_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn location() -> LogLocation {
        LogLocation::new("alb", "123456789012", "us-east-1")
    }

    fn window(start: DateTime<Utc>, end: DateTime<Utc>) -> TimeWindow {
        TimeWindow::new(start, end).unwrap()
    }

    #[test]
    fn test_window_rejects_inverted_bounds() {
        let start = Utc.with_ymd_and_hms(2023, 1, 2, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();

        let err = TimeWindow::new(start, end).unwrap_err();
        assert!(matches!(err, RetrievalError::Validation { .. }));
    }

    #[test]
    fn test_contains_strict_excludes_bounds() {
        let start = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2023, 1, 1, 1, 0, 0).unwrap();
        let w = window(start, end);

        assert!(!w.contains_strict(start));
        assert!(!w.contains_strict(end));
        assert!(w.contains_strict(start + Duration::seconds(1)));
        assert!(w.contains_strict(end - Duration::nanoseconds(1)));
        assert!(!w.contains_strict(start - Duration::seconds(1)));
    }

    #[test]
    fn test_single_day_window_yields_one_prefix() {
        let w = window(
            Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2023, 1, 1, 23, 59, 59).unwrap(),
        );

        let prefixes = location().prefixes(&w);
        assert_eq!(prefixes.len(), 1);
        assert_eq!(
            prefixes.prefixes().collect::<Vec<_>>(),
            vec!["alb/AWSLogs/123456789012/elasticloadbalancing/us-east-1/2023/01/01"]
        );
    }

    #[test]
    fn test_window_ending_at_midnight_stays_on_one_day() {
        let w = window(
            Utc.with_ymd_and_hms(2023, 1, 1, 22, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2023, 1, 2, 0, 0, 0).unwrap(),
        );

        let days: Vec<_> = location().prefixes(&w).days().map(str::to_string).collect();
        assert_eq!(days, vec!["2023/01/01"]);
    }

    #[test]
    fn test_midnight_crossing_yields_two_prefixes() {
        let w = window(
            Utc.with_ymd_and_hms(2023, 1, 1, 23, 30, 0).unwrap(),
            Utc.with_ymd_and_hms(2023, 1, 2, 0, 30, 0).unwrap(),
        );

        let days: Vec<_> = location().prefixes(&w).days().map(str::to_string).collect();
        assert_eq!(days, vec!["2023/01/01", "2023/01/02"]);
    }

    #[test]
    fn test_short_midnight_crossing_still_covers_second_day() {
        let w = window(
            Utc.with_ymd_and_hms(2023, 1, 1, 23, 50, 0).unwrap(),
            Utc.with_ymd_and_hms(2023, 1, 2, 0, 5, 0).unwrap(),
        );

        assert_eq!(location().prefixes(&w).len(), 2);
    }

    #[test]
    fn test_multi_day_window_does_not_skip_days() {
        // Every day between the bounds must appear.
        let w = window(
            Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2023, 1, 10, 12, 0, 0).unwrap(),
        );

        let days: Vec<_> = location().prefixes(&w).days().map(str::to_string).collect();
        let expected: Vec<String> = (1..=10).map(|d| format!("2023/01/{d:02}")).collect();
        assert_eq!(days, expected);
    }

    #[test]
    fn test_prefix_count_matches_distinct_days() {
        let start = Utc.with_ymd_and_hms(2023, 2, 27, 5, 17, 0).unwrap();
        for hours in [1_i64, 5, 19, 24, 25, 47, 48, 49, 100, 24 * 7 + 3] {
            let end = start + Duration::hours(hours);
            let w = window(start, end);

            let mut expected = std::collections::BTreeSet::new();
            let mut t = start;
            while t < end {
                expected.insert(day_key(t));
                t += Duration::minutes(1);
            }

            assert_eq!(
                location().prefixes(&w).len(),
                expected.len(),
                "window of {hours}h"
            );
        }
    }

    #[test]
    fn test_zero_length_window_yields_nothing() {
        let t = Utc.with_ymd_and_hms(2023, 1, 1, 12, 0, 0).unwrap();
        assert!(location().prefixes(&window(t, t)).is_empty());
    }

    #[test]
    fn test_root_trailing_slash_is_trimmed() {
        let location = LogLocation::new("logs/alb/", "123456789012", "eu-west-1");
        assert_eq!(
            location.day_prefix("2024/02/29"),
            "logs/alb/AWSLogs/123456789012/elasticloadbalancing/eu-west-1/2024/02/29"
        );
    }
}

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

//! Window resolution from `-s`, `-e` and `--duration`.

use chrono::{DateTime, Duration, Local, NaiveDateTime, TimeZone, Utc};
use elbfetch_core::error::RetrievalError;
use elbfetch_core::window::TimeWindow;

/// Format accepted by `-s` and `-e`.
pub const INPUT_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Default window length when neither `-s` nor `--duration` is given.
pub const DEFAULT_WINDOW_MINUTES: i64 = 10;

/// Parses a wall-clock time in `zone`.
///
/// # Errors
///
/// Returns [`RetrievalError::Validation`] naming `parameter` if the input
/// does not match [`INPUT_TIME_FORMAT`] or does not exist in `zone` (e.g.
/// inside a daylight-saving gap).
pub fn parse_in<Tz: TimeZone>(
    input: &str,
    zone: &Tz,
    parameter: &str,
) -> Result<DateTime<Utc>, RetrievalError> {
    let naive = NaiveDateTime::parse_from_str(input, INPUT_TIME_FORMAT).map_err(|_| {
        RetrievalError::validation(
            format!("-{parameter} time format is yyyy-MM-ddTHH:mm:ss, got {input:?}"),
            Some(parameter),
        )
    })?;

    zone.from_local_datetime(&naive)
        .earliest()
        .map(|t| t.with_timezone(&Utc))
        .ok_or_else(|| {
            RetrievalError::validation(
                format!("-{parameter} {input} does not exist in the local time zone"),
                Some(parameter),
            )
        })
}

/// Flag values that determine the window.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowInput<'a> {
    /// `-s`
    pub start: Option<&'a str>,
    /// `-e`
    pub end: Option<&'a str>,
    /// `--duration` in minutes; overrides `-s`
    pub duration: Option<u32>,
}

impl WindowInput<'_> {
    /// Resolves the window in `zone`, relative to `now`.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::Validation`] if a time does not parse or the
    /// start falls after the end.
    pub fn resolve<Tz: TimeZone>(
        &self,
        zone: &Tz,
        now: DateTime<Utc>,
    ) -> Result<TimeWindow, RetrievalError> {
        let end = match self.end {
            Some(input) => parse_in(input, zone, "e")?,
            None => now,
        };

        let start = match (self.duration, self.start) {
            (Some(minutes), _) => end - Duration::minutes(i64::from(minutes)),
            (None, Some(input)) => parse_in(input, zone, "s")?,
            (None, None) => now - Duration::minutes(DEFAULT_WINDOW_MINUTES),
        };

        TimeWindow::new(start, end).map_err(|_| {
            RetrievalError::validation("-s should be before -e", Some("start"))
        })
    }

    /// Resolves the window in UTC or the local zone.
    ///
    /// # Errors
    ///
    /// See [`WindowInput::resolve`].
    pub fn resolve_now(&self, utc: bool) -> Result<TimeWindow, RetrievalError> {
        let now = Utc::now();
        if utc {
            self.resolve(&Utc, now)
        } else {
            self.resolve(&Local, now)
        }
    }
}

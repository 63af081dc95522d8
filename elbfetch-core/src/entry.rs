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

//! Log records for merged-stream output.
//!
//! In merged-stream mode every decoded line is kept in an [`EntryBuffer`]
//! together with its request timestamp; once all objects are processed the
//! buffer is sorted and emitted. Sorting is stable, so lines sharing a
//! timestamp keep the order in which they were buffered.

use crate::format::LogFormat;
use chrono::{DateTime, NaiveDateTime, Utc};
use std::io::{self, Write};

/// Request timestamp format shared by ALB and ELB logs, e.g. `2023-01-01T00:55:00.228196Z`.
const LOG_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.fZ";

/// One decoded log line and its request time.
///
/// Lines are kept as raw bytes: request fields may carry bytes that are not
/// valid UTF-8, and those are emitted unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Request timestamp extracted from the line
    pub request_time: DateTime<Utc>,
    /// The line as read, without its line terminator
    pub line: Vec<u8>,
}

impl Entry {
    /// Parses a line of the given format.
    ///
    /// ALB lines carry the timestamp in the second field (after the request
    /// type), ELB lines in the first.
    ///
    /// # Errors
    ///
    /// Returns a description of the problem if the field is missing or is
    /// not a timestamp.
    pub fn parse(line: Vec<u8>, format: LogFormat) -> Result<Self, String> {
        let field = format.timestamp_field();
        let raw = line
            .split(|b| *b == b' ')
            .nth(field)
            .ok_or_else(|| format!("missing timestamp field {}", field + 1))?;
        let raw = std::str::from_utf8(raw)
            .map_err(|_| format!("timestamp field {} is not valid UTF-8", field + 1))?;

        let request_time = NaiveDateTime::parse_from_str(raw, LOG_TIME_FORMAT)
            .map_err(|e| format!("invalid timestamp {raw:?}: {e}"))?
            .and_utc();

        Ok(Self { request_time, line })
    }
}

/// Buffer of entries collected over one run.
#[derive(Debug, Default)]
pub struct EntryBuffer {
    entries: Vec<Entry>,
}

impl EntryBuffer {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry.
    pub fn push(&mut self, entry: Entry) {
        self.entries.push(entry);
    }

    /// Returns the number of buffered entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether the buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sorts by request time, keeping insertion order among equal timestamps.
    #[must_use]
    pub fn into_sorted(mut self) -> Vec<Entry> {
        self.entries.sort_by_key(|e| e.request_time);
        self.entries
    }

    /// Sorts the buffer and writes every line, newline-terminated, to `sink`.
    ///
    /// Returns the number of lines written.
    ///
    /// # Errors
    ///
    /// Returns any I/O error raised by `sink`.
    pub fn emit(self, sink: &mut dyn Write) -> io::Result<usize> {
        let entries = self.into_sorted();
        for entry in &entries {
            sink.write_all(&entry.line)?;
            sink.write_all(b"\n")?;
        }
        sink.flush()?;
        Ok(entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    const ALB_LINE: &str = "http 2017-09-09T00:55:00.228196Z app/albname/12a34bc6d78e9f0 111.222.10.240:57965 192.168.131.118:80 0.020 0.019 0.001 200 200 623 111603 \"GET http://wwww.host.com:80/path/?a=1&b=2&c=3 HTTP/1.1\" \"Mozilla/5.0\" - - arn:aws:elasticloadbalancing:ap-northeast-1:123456789012:targetgroup/albname/abcdefgh12345678 \"Root=1-11111be1-1110300f111111111aa1a1aa\"";

    const ELB_LINE: &str = "2017-09-09T00:55:01.000123Z my-elb 192.168.131.10:2817 10.0.0.1:80 0.000073 0.001048 0.000057 200 200 0 29 \"GET http://www.example.com:80/ HTTP/1.1\" \"curl/7.38.0\" - -";

    fn entry(secs: u32, line: &str) -> Entry {
        Entry {
            request_time: Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, secs).unwrap(),
            line: line.as_bytes().to_vec(),
        }
    }

    fn bytes(line: &str) -> Vec<u8> {
        line.as_bytes().to_vec()
    }

    #[test]
    fn test_parse_alb_line() {
        let entry = Entry::parse(bytes(ALB_LINE), LogFormat::EmbeddedGzip).unwrap();

        let expected = Utc
            .with_ymd_and_hms(2017, 9, 9, 0, 55, 0)
            .unwrap()
            .with_nanosecond(228_196_000)
            .unwrap();
        assert_eq!(entry.request_time, expected);
        assert_eq!(entry.line, ALB_LINE.as_bytes());
    }

    #[test]
    fn test_parse_elb_line() {
        let entry = Entry::parse(bytes(ELB_LINE), LogFormat::AlternateText).unwrap();

        let expected = Utc
            .with_ymd_and_hms(2017, 9, 9, 0, 55, 1)
            .unwrap()
            .with_nanosecond(123_000)
            .unwrap();
        assert_eq!(entry.request_time, expected);
    }

    #[test]
    fn test_parse_keeps_non_utf8_request_bytes() {
        let mut line = bytes("2017-09-09T00:55:01.000123Z my-elb 10.0.0.9:1 10.0.0.1:80 \"GET /");
        line.extend_from_slice(&[0xff, 0xfe]);
        line.extend_from_slice(b" HTTP/1.1\"");

        let entry = Entry::parse(line.clone(), LogFormat::AlternateText).unwrap();

        assert_eq!(entry.line, line);
        assert_eq!(entry.request_time.timestamp_subsec_micros(), 123);
    }

    #[test]
    fn test_parse_rejects_non_utf8_timestamp() {
        let line = vec![b'h', b't', b't', b'p', b' ', 0xff, b' ', b'x'];

        let reason = Entry::parse(line, LogFormat::EmbeddedGzip).unwrap_err();
        assert!(reason.contains("not valid UTF-8"));
    }

    #[test]
    fn test_parse_rejects_wrong_format() {
        // An ELB line read as ALB has a host name where the timestamp should be.
        assert!(Entry::parse(bytes(ELB_LINE), LogFormat::EmbeddedGzip).is_err());
        assert!(Entry::parse(Vec::new(), LogFormat::EmbeddedGzip).is_err());
        assert!(Entry::parse(bytes("http"), LogFormat::EmbeddedGzip)
            .unwrap_err()
            .contains("missing timestamp field 2"));
    }

    #[test]
    fn test_sort_is_chronological_and_stable() {
        let mut buffer = EntryBuffer::new();
        buffer.push(entry(5, "c"));
        buffer.push(entry(1, "a"));
        buffer.push(entry(5, "d"));
        buffer.push(entry(3, "b"));
        buffer.push(entry(1, "a2"));

        let lines: Vec<_> = buffer.into_sorted().into_iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![bytes("a"), bytes("a2"), bytes("b"), bytes("c"), bytes("d")]);
    }

    #[test]
    fn test_emit_writes_lines() {
        let mut buffer = EntryBuffer::new();
        buffer.push(entry(2, "second"));
        buffer.push(entry(1, "first"));

        let mut out = Vec::new();
        let n = buffer.emit(&mut out).unwrap();

        assert_eq!(n, 2);
        assert_eq!(String::from_utf8(out).unwrap(), "first\nsecond\n");
    }
}

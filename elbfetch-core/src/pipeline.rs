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

//! Retrieval pipeline: download, decode and route every selected object.
//!
//! Objects are processed strictly one at a time, in catalog order. Each one
//! moves through [`ObjectStage`]s:
//!
//! ```text
//! Pending -> Downloaded -> Decoded -> Routed -> Done
//! ```
//!
//! and any failure aborts the whole run. The scratch file an object is
//! downloaded into is a [`tempfile::NamedTempFile`] owned by that object's
//! step, so it is removed on every exit path.
//!
//! In file mode decoded bytes are copied to the destination chosen by the
//! [`LogFormat`]. In merged-stream mode every line is parsed into an
//! [`Entry`] and buffered; [`RetrievalPipeline::finish`] sorts the buffer and
//! writes it to the caller's sink.
//!
//! # Example
//!
//! ```rust,no_run
//! use elbfetch_core::catalog::ObjectCatalog;
//! use elbfetch_core::config::RunConfig;
//! use elbfetch_core::pipeline::RetrievalPipeline;
//! use elbfetch_core::store::MemoryObjectStore;
//!
//! # async fn example(config: RunConfig) -> Result<(), Box<dyn std::error::Error>> {
//! let store = MemoryObjectStore::new();
//! let catalog = ObjectCatalog::select(&store, &config).await?;
//!
//! let mut pipeline = RetrievalPipeline::new(&store, &config);
//! pipeline.run(&catalog).await?;
//! let summary = pipeline.finish(&mut std::io::stdout())?;
//! println!("{} objects retrieved", summary.objects);
//! # Ok(())
//! # }
//! ```

use crate::catalog::ObjectCatalog;
use crate::config::{OutputMode, RunConfig};
use crate::entry::{Entry, EntryBuffer};
use crate::error::RetrievalError;
use crate::format::{LogFormat, LogObjectKey};
use crate::metrics::{self, Timer};
use crate::store::{ObjectStore, StorageObject};
use std::fmt;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

/// Copy buffer size for file-mode routing.
const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Path reported for write failures on the merged stream.
const MERGED_STREAM_PATH: &str = "<stdout>";

/// Processing stage of one object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectStage {
    /// Selected, not yet fetched
    Pending,
    /// Bytes are in the scratch file
    Downloaded,
    /// A decoded stream is open over the scratch file
    Decoded,
    /// Destination resolved (file opened, or entry buffer chosen)
    Routed,
    /// Decoded content fully copied or buffered
    Done,
}

impl ObjectStage {
    /// Returns the stage name for logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Downloaded => "downloaded",
            Self::Decoded => "decoded",
            Self::Routed => "routed",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for ObjectStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetrievalSummary {
    /// Objects that reached [`ObjectStage::Done`]
    pub objects: usize,

    /// Bytes fetched from the store
    pub bytes_downloaded: u64,

    /// Decoded bytes written to files or buffered for the merged stream
    pub bytes_written: u64,

    /// Destination files touched, in first-use order
    pub destinations: Vec<PathBuf>,

    /// Lines emitted on the merged stream
    pub entries_emitted: usize,
}

/// Sequential retrieval of a catalog's objects.
///
/// The entry buffer used in merged-stream mode belongs to this instance, so
/// two pipelines never share state.
pub struct RetrievalPipeline<'a, S: ObjectStore + ?Sized> {
    store: &'a S,
    config: &'a RunConfig,
    scratch_dir: PathBuf,
    buffer: EntryBuffer,
    summary: RetrievalSummary,
}

impl<'a, S: ObjectStore + ?Sized> RetrievalPipeline<'a, S> {
    /// Creates a pipeline using the system temporary directory for scratch files.
    #[must_use]
    pub fn new(store: &'a S, config: &'a RunConfig) -> Self {
        Self {
            store,
            config,
            scratch_dir: std::env::temp_dir(),
            buffer: EntryBuffer::new(),
            summary: RetrievalSummary::default(),
        }
    }

    /// Places scratch files under `dir` instead.
    #[must_use]
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = dir.into();
        self
    }

    /// Retrieves every object of `catalog`, in order.
    ///
    /// Decoding and file writes are blocking I/O performed on the calling task.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by any object; objects already written
    /// are left in place.
    #[instrument(skip_all, fields(objects = catalog.len(), format = self.config.format().as_str()))]
    pub async fn run(&mut self, catalog: &ObjectCatalog) -> Result<(), RetrievalError> {
        info!("Retrieving access-log objects");

        for object in catalog.objects() {
            self.retrieve_object(object)
                .await
                .inspect_err(|e| metrics::increment_errors(e.category()))?;
        }

        info!(
            objects = self.summary.objects,
            bytes_downloaded = self.summary.bytes_downloaded,
            bytes_written = self.summary.bytes_written,
            "Retrieved access-log objects"
        );
        Ok(())
    }

    /// Completes the run, emitting buffered entries to `sink` in merged-stream
    /// mode. In file mode `sink` is not touched.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::Write`] if `sink` fails.
    pub fn finish(mut self, sink: &mut dyn Write) -> Result<RetrievalSummary, RetrievalError> {
        if self.config.output().is_merged() {
            let emitted = self
                .buffer
                .emit(sink)
                .map_err(|e| RetrievalError::write(MERGED_STREAM_PATH, e))
                .inspect_err(|e| metrics::increment_errors(e.category()))?;
            metrics::increment_entries_emitted(emitted);
            debug!(entries = emitted, "Emitted merged stream");
            self.summary.entries_emitted = emitted;
        }
        Ok(self.summary)
    }

    /// Returns the summary accumulated so far.
    #[must_use]
    pub const fn summary(&self) -> &RetrievalSummary {
        &self.summary
    }

    #[instrument(skip_all, fields(key = %object.key))]
    async fn retrieve_object(&mut self, object: &StorageObject) -> Result<(), RetrievalError> {
        let format = self.config.format();
        let _timer = Timer::new(format.as_str(), metrics::record_object_duration);

        let mut stage = ObjectStage::Pending;
        let result = self.advance(object, format, &mut stage).await;
        match &result {
            Ok(()) => {
                metrics::increment_objects_retrieved(format.as_str());
                self.summary.objects += 1;
            }
            Err(e) => warn!(%stage, error = %e, "Object retrieval aborted"),
        }
        result
    }

    async fn advance(
        &mut self,
        object: &StorageObject,
        format: LogFormat,
        stage: &mut ObjectStage,
    ) -> Result<(), RetrievalError> {
        let config = self.config;
        let key = LogObjectKey::parse(&object.key)?;

        let scratch = self.download(object, &key.suffix()).await?;
        *stage = ObjectStage::Downloaded;

        let decoded = format.decode(scratch.path(), &object.key)?;
        *stage = ObjectStage::Decoded;

        let written = match config.output() {
            OutputMode::MergedStream => {
                *stage = ObjectStage::Routed;
                self.buffer_entries(decoded, format, &object.key)?
            }
            OutputMode::Files { prefix } => {
                let path = format.destination_for(prefix, &object.key)?;
                debug!(outfile = %path.display(), "Resolved destination");
                let mut destination = format.open_destination(&path)?;
                *stage = ObjectStage::Routed;

                let written = copy_decoded(decoded, &mut destination, format, &object.key, &path)?;
                if !self.summary.destinations.contains(&path) {
                    self.summary.destinations.push(path);
                }
                written
            }
        };
        *stage = ObjectStage::Done;

        debug!(write_size = written, "Wrote object");
        metrics::record_object_written_bytes(written);
        self.summary.bytes_written += written;
        Ok(())
    }

    /// Fetches `object` into a fresh scratch file named after its key suffix.
    async fn download(
        &mut self,
        object: &StorageObject,
        suffix: &str,
    ) -> Result<NamedTempFile, RetrievalError> {
        let scratch = tempfile::Builder::new()
            .prefix(&format!("tmp_{suffix}"))
            .tempfile_in(&self.scratch_dir)
            .map_err(|e| RetrievalError::write(&self.scratch_dir, e))?;
        let handle = scratch
            .reopen()
            .map_err(|e| RetrievalError::write(scratch.path(), e))?;

        let mut file = tokio::fs::File::from_std(handle);
        let downloaded = self
            .store
            .fetch(self.config.bucket(), &object.key, &mut file)
            .await
            .map_err(|e| RetrievalError::download(&object.key, e))?;
        file.flush()
            .await
            .map_err(|e| RetrievalError::write(scratch.path(), e))?;

        debug!(download_size = downloaded, "Downloaded object");
        metrics::record_object_download_bytes(downloaded);
        self.summary.bytes_downloaded += downloaded;
        Ok(scratch)
    }

    /// Parses every non-empty decoded line into the run's entry buffer.
    ///
    /// Lines are split on `\n` as raw bytes; a trailing `\r` is dropped.
    fn buffer_entries(
        &mut self,
        decoded: Box<dyn Read + Send>,
        format: LogFormat,
        key: &str,
    ) -> Result<u64, RetrievalError> {
        let mut reader = BufReader::new(decoded);
        let mut buffered = 0u64;
        let mut line_number = 0usize;
        loop {
            let mut line = Vec::new();
            let read = reader
                .read_until(b'\n', &mut line)
                .map_err(|e| read_error(format, key, e))?;
            if read == 0 {
                break;
            }
            line_number += 1;

            if line.last() == Some(&b'\n') {
                line.pop();
            }
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            if line.is_empty() {
                continue;
            }
            buffered += line.len() as u64 + 1;

            let entry =
                Entry::parse(line, format).map_err(|reason| RetrievalError::MalformedEntry {
                    key: key.to_string(),
                    line_number,
                    reason,
                })?;
            self.buffer.push(entry);
        }
        Ok(buffered)
    }
}

/// Runs a complete retrieval of `catalog` and finishes it against `sink`.
///
/// # Errors
///
/// See [`RetrievalPipeline::run`] and [`RetrievalPipeline::finish`].
pub async fn retrieve<S>(
    store: &S,
    config: &RunConfig,
    catalog: &ObjectCatalog,
    sink: &mut (dyn Write + Send),
) -> Result<RetrievalSummary, RetrievalError>
where
    S: ObjectStore + ?Sized,
{
    let mut pipeline = RetrievalPipeline::new(store, config);
    pipeline.run(catalog).await?;
    pipeline.finish(sink)
}

/// Copies a decoded stream to a destination, telling read failures (decode)
/// apart from write failures.
fn copy_decoded(
    mut decoded: impl Read,
    destination: &mut impl Write,
    format: LogFormat,
    key: &str,
    path: &Path,
) -> Result<u64, RetrievalError> {
    let mut buf = vec![0u8; COPY_BUFFER_SIZE];
    let mut total = 0u64;
    loop {
        let n = match decoded.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(read_error(format, key, e)),
        };
        destination
            .write_all(&buf[..n])
            .map_err(|e| RetrievalError::write(path, e))?;
        total += n as u64;
    }
    destination
        .flush()
        .map_err(|e| RetrievalError::write(path, e))?;
    Ok(total)
}

fn read_error(format: LogFormat, key: &str, source: io::Error) -> RetrievalError {
    let message = if format.decompresses() {
        "failed to extract gzip, if downloading elb logs, use -elb option".to_string()
    } else {
        "failed to read downloaded object".to_string()
    };
    RetrievalError::Decode {
        key: key.to_string(),
        message,
        source: Some(source),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryObjectStore;
    use crate::window::TimeWindow;
    use chrono::{DateTime, TimeZone, Utc};
    use flate2::write::GzEncoder;
    use flate2::Compression;

    const BUCKET: &str = "logs";
    const DAY: &str = "alb/AWSLogs/123456789012/elasticloadbalancing/us-east-1/2023/01/01";

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::InvalidData, "corrupt deflate stream"))
        }
    }

    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::other("disk full"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 1, 1, 0, minute, 0).unwrap()
    }

    fn key(address: &str, tail: &str) -> String {
        format!(
            "{DAY}/123456789012_elasticloadbalancing_us-east-1_app.lb.abc_20230101T0005Z_{address}_{tail}"
        )
    }

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn config(format: LogFormat, output: OutputMode) -> RunConfig {
        RunConfig::builder()
            .bucket(BUCKET)
            .log_root("alb")
            .account_id("123456789012")
            .region("us-east-1")
            .window(TimeWindow::new(at(0), at(59)).unwrap())
            .format(format)
            .output(output)
            .build()
            .unwrap()
    }

    fn scratch_entries(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(ObjectStage::Pending.to_string(), "pending");
        assert_eq!(ObjectStage::Done.as_str(), "done");
    }

    #[test]
    fn test_copy_decoded_read_failure_is_decode_error() {
        let mut out = Vec::new();
        let err = copy_decoded(
            FailingReader,
            &mut out,
            LogFormat::EmbeddedGzip,
            "k",
            Path::new("out.log"),
        )
        .unwrap_err();

        assert!(matches!(err, RetrievalError::Decode { .. }));
        assert!(err.to_string().contains("-elb"));
    }

    #[test]
    fn test_copy_decoded_write_failure_is_write_error() {
        let err = copy_decoded(
            &b"data"[..],
            &mut FailingWriter,
            LogFormat::AlternateText,
            "k",
            Path::new("out.log"),
        )
        .unwrap_err();

        match err {
            RetrievalError::Write { path, .. } => assert_eq!(path, PathBuf::from("out.log")),
            other => panic!("expected Write, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_scratch_file_removed_after_success() {
        let scratch = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let prefix = out.path().join("alb").to_string_lossy().into_owned();

        let store = MemoryObjectStore::new().with_object(
            BUCKET,
            key("10.0.0.1", "a.log"),
            at(10),
            b"line\n".to_vec(),
        );
        let config = config(LogFormat::AlternateText, OutputMode::files(prefix));
        let catalog = ObjectCatalog::select(&store, &config).await.unwrap();

        let mut pipeline = RetrievalPipeline::new(&store, &config).with_scratch_dir(scratch.path());
        pipeline.run(&catalog).await.unwrap();

        assert_eq!(scratch_entries(scratch.path()), 0);
        assert_eq!(pipeline.summary().objects, 1);
    }

    #[tokio::test]
    async fn test_scratch_file_removed_after_decode_failure() {
        let scratch = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let prefix = out.path().join("alb").to_string_lossy().into_owned();

        // Plain text where gzip is expected
        let store = MemoryObjectStore::new().with_object(
            BUCKET,
            key("10.0.0.1", "a.log.gz"),
            at(10),
            b"2023-01-01T00:00:00.000000Z elb\n".to_vec(),
        );
        let config = config(LogFormat::EmbeddedGzip, OutputMode::files(prefix));
        let catalog = ObjectCatalog::select(&store, &config).await.unwrap();

        let mut pipeline = RetrievalPipeline::new(&store, &config).with_scratch_dir(scratch.path());
        let err = pipeline.run(&catalog).await.unwrap_err();

        assert!(matches!(err, RetrievalError::Decode { .. }));
        assert_eq!(scratch_entries(scratch.path()), 0);
        assert_eq!(scratch_entries(out.path()), 0);
    }

    #[tokio::test]
    async fn test_download_failure_aborts_run() {
        let scratch = tempfile::tempdir().unwrap();
        let store = MemoryObjectStore::new()
            .with_object(BUCKET, key("10.0.0.1", "a.log.gz"), at(10), gzip(b"x\n"))
            .with_fetch_failures();
        let config = config(LogFormat::EmbeddedGzip, OutputMode::files("/nonexistent/alb"));
        let catalog = ObjectCatalog::select(&store, &config).await.unwrap();

        let mut pipeline = RetrievalPipeline::new(&store, &config).with_scratch_dir(scratch.path());
        let err = pipeline.run(&catalog).await.unwrap_err();

        assert!(matches!(
            err,
            RetrievalError::Transfer {
                operation: "download",
                ..
            }
        ));
        assert_eq!(scratch_entries(scratch.path()), 0);
    }

    #[tokio::test]
    async fn test_invalid_key_is_rejected_before_download() {
        let store = MemoryObjectStore::new().with_object(
            BUCKET,
            format!("{DAY}/not-a-log-object"),
            at(10),
            b"x".to_vec(),
        );
        let config = config(LogFormat::AlternateText, OutputMode::MergedStream);
        let catalog = ObjectCatalog::select(&store, &config).await.unwrap();

        let mut pipeline = RetrievalPipeline::new(&store, &config);
        let err = pipeline.run(&catalog).await.unwrap_err();

        assert!(matches!(err, RetrievalError::InvalidKey { .. }));
        assert!(store.fetched_keys().await.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_line_reports_line_number() {
        let body = b"2023-01-01T00:00:01.000000Z elb a\nnot-a-timestamp elb b\n".to_vec();
        let store =
            MemoryObjectStore::new().with_object(BUCKET, key("10.0.0.1", "a.log"), at(10), body);
        let config = config(LogFormat::AlternateText, OutputMode::MergedStream);
        let catalog = ObjectCatalog::select(&store, &config).await.unwrap();

        let mut pipeline = RetrievalPipeline::new(&store, &config);
        match pipeline.run(&catalog).await.unwrap_err() {
            RetrievalError::MalformedEntry { line_number, .. } => assert_eq!(line_number, 2),
            other => panic!("expected MalformedEntry, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_file_mode_leaves_sink_untouched() {
        let out = tempfile::tempdir().unwrap();
        let prefix = out.path().join("alb").to_string_lossy().into_owned();
        let store = MemoryObjectStore::new().with_object(
            BUCKET,
            key("10.0.0.1", "a.log"),
            at(10),
            b"2023-01-01T00:00:01.000000Z elb a\n".to_vec(),
        );
        let config = config(LogFormat::AlternateText, OutputMode::files(prefix));
        let catalog = ObjectCatalog::select(&store, &config).await.unwrap();

        let mut sink = Vec::new();
        let summary = retrieve(&store, &config, &catalog, &mut sink).await.unwrap();

        assert!(sink.is_empty());
        assert_eq!(summary.entries_emitted, 0);
        assert_eq!(summary.destinations, vec![out.path().join("alb_10.0.0.1.log")]);
    }

    #[tokio::test]
    async fn test_scratch_file_removed_after_write_failure() {
        let scratch = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let prefix = out
            .path()
            .join("missing")
            .join("alb")
            .to_string_lossy()
            .into_owned();

        let store = MemoryObjectStore::new().with_object(
            BUCKET,
            key("10.0.0.1", "a.log"),
            at(10),
            b"line\n".to_vec(),
        );
        let config = config(LogFormat::AlternateText, OutputMode::files(prefix));
        let catalog = ObjectCatalog::select(&store, &config).await.unwrap();

        let mut pipeline = RetrievalPipeline::new(&store, &config).with_scratch_dir(scratch.path());
        let err = pipeline.run(&catalog).await.unwrap_err();

        assert!(matches!(err, RetrievalError::Write { .. }));
        assert_eq!(scratch_entries(scratch.path()), 0);
        assert_eq!(pipeline.summary().objects, 0);
    }

    #[tokio::test]
    async fn test_merged_stream_keeps_non_utf8_lines() {
        let mut line = b"2023-01-01T00:00:02.000000Z elb 10.0.0.9:1 10.0.0.1:80 \"GET /".to_vec();
        line.extend_from_slice(&[0xff, 0xfe]);
        line.extend_from_slice(b" HTTP/1.1\"");

        let mut body = b"2023-01-01T00:00:03.000000Z elb later\r\n\n".to_vec();
        body.extend_from_slice(&line);
        body.push(b'\n');

        let store =
            MemoryObjectStore::new().with_object(BUCKET, key("10.0.0.1", "a.log"), at(10), body);
        let config = config(LogFormat::AlternateText, OutputMode::MergedStream);
        let catalog = ObjectCatalog::select(&store, &config).await.unwrap();

        let mut sink = Vec::new();
        let summary = retrieve(&store, &config, &catalog, &mut sink).await.unwrap();

        let mut expected = line.clone();
        expected.push(b'\n');
        expected.extend_from_slice(b"2023-01-01T00:00:03.000000Z elb later\n");
        assert_eq!(sink, expected);
        assert_eq!(summary.entries_emitted, 2);
    }
}

// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Streams an analysis as a ZIP archive.
//!
//! A blocking producer writes the archive into a channel-backed writer while
//! the response body drains the channel, so the archive is never held in
//! memory as a whole. The producer stops at its first error; once any write
//! has failed nothing else reaches the sink, including the central directory
//! `ZipWriter` tries to emit when dropped.

use crate::models::analysis::{NamedArtifact, NormalizedAnalysis};
use axum::body::{Body, Bytes};
use futures::{stream, StreamExt};
use std::cell::Cell;
use std::collections::HashSet;
use std::io::{self, Write};
use thiserror::Error;
use tokio::sync::mpsc;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const ARCHIVE_FILENAME: &str = "analysis.zip";
pub const CONTENT_ENTRY: &str = "content.txt";
pub const PAYLOAD_ENTRY: &str = "engineResponse.json";

/// Chunks buffered between producer and response body.
const CHANNEL_CAPACITY: usize = 8;
/// Bytes collected before a chunk is handed to the response.
const CHUNK_SIZE: usize = 32 * 1024;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("archive write failed: {0}")]
    Io(#[from] io::Error),

    #[error("failed to serialize archive entry: {0}")]
    Json(#[from] serde_json::Error),

    #[error("archive producer stopped before writing any data")]
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveEntry {
    pub name: String,
    pub body: Vec<u8>,
}

/// Lazily yields the archive entries of an analysis, in order: the content,
/// the full engine payload, then one entry per artifact.
pub struct ArchiveEntries<'a> {
    analysis: &'a NormalizedAnalysis,
    position: usize,
    names: HashSet<String>,
}

impl<'a> ArchiveEntries<'a> {
    pub fn new(analysis: &'a NormalizedAnalysis) -> Self {
        Self {
            analysis,
            position: 0,
            names: HashSet::new(),
        }
    }

    /// ZIP entry names must be unique; later duplicates become `name (2).ext`.
    fn unique_name(&mut self, name: &str) -> String {
        if self.names.insert(name.to_string()) {
            return name.to_string();
        }

        let (stem, ext) = match name.rfind('.') {
            Some(dot) if dot > 0 => name.split_at(dot),
            _ => (name, ""),
        };
        let mut n = 2;
        loop {
            let candidate = format!("{stem} ({n}){ext}");
            if self.names.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }

    fn entry(&mut self, name: &str, body: Vec<u8>) -> ArchiveEntry {
        ArchiveEntry {
            name: self.unique_name(name),
            body,
        }
    }
}

impl Iterator for ArchiveEntries<'_> {
    type Item = Result<ArchiveEntry, ArchiveError>;

    fn next(&mut self) -> Option<Self::Item> {
        let position = self.position;
        self.position += 1;

        let analysis = self.analysis;
        let item = match position {
            0 => Ok(self.entry(CONTENT_ENTRY, analysis.content.as_bytes().to_vec())),
            1 => serde_json::to_vec_pretty(&analysis.payload)
                .map(|body| self.entry(PAYLOAD_ENTRY, body))
                .map_err(ArchiveError::from),
            n => {
                let artifact = NamedArtifact::from_value(analysis.files.get(n - 2)?);
                tracing::debug!(
                    filename = %artifact.filename,
                    mime_type = artifact.mime_type.as_deref().unwrap_or("application/json"),
                    "Adding artifact to archive"
                );
                serde_json::to_vec_pretty(&artifact.data)
                    .map(|body| self.entry(&artifact.filename, body))
                    .map_err(ArchiveError::from)
            }
        };
        Some(item)
    }
}

/// Writer that discards everything once the archive is halted, so nothing
/// reaches the sink after the first failure.
struct HaltingWriter<'a, W> {
    inner: W,
    halted: &'a Cell<bool>,
}

impl<W: Write> Write for HaltingWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.halted.get() {
            return Ok(buf.len());
        }
        self.inner.write(buf).inspect_err(|_| self.halted.set(true))
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.halted.get() {
            return Ok(());
        }
        self.inner.flush().inspect_err(|_| self.halted.set(true))
    }
}

/// Write a complete archive to `sink`, maximum deflate level for every entry.
///
/// `finish` is the only point at which the archive is declared complete.
pub fn write_archive<W, I>(sink: W, entries: I) -> Result<(), ArchiveError>
where
    W: Write,
    I: IntoIterator<Item = Result<ArchiveEntry, ArchiveError>>,
{
    let halted = Cell::new(false);
    let mut writer = HaltingWriter {
        inner: sink,
        halted: &halted,
    };
    let mut zip = ZipWriter::new_stream(&mut writer);

    if let Err(err) = append_entries(&mut zip, entries) {
        halted.set(true);
        // Closes the writer against the discarding sink; Drop has nothing left to do
        if let Err(e) = zip.finish() {
            tracing::debug!(error = %e, "Halted archive did not close cleanly");
        }
        return Err(err);
    }

    zip.finish()?;
    writer.flush()?;
    if halted.get() {
        return Err(ArchiveError::Io(io::Error::other("archive halted")));
    }
    Ok(())
}

fn append_entries<W, I>(zip: &mut ZipWriter<W>, entries: I) -> Result<(), ArchiveError>
where
    W: Write + io::Seek,
    I: IntoIterator<Item = Result<ArchiveEntry, ArchiveError>>,
{
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(9));

    for entry in entries {
        let entry = entry?;
        zip.start_file(entry.name, options)?;
        zip.write_all(&entry.body)?;
    }
    Ok(())
}

/// Sends buffered chunks to the response body from the blocking producer.
struct ChannelWriter {
    tx: mpsc::Sender<io::Result<Bytes>>,
    buffer: Vec<u8>,
}

impl ChannelWriter {
    fn new(tx: mpsc::Sender<io::Result<Bytes>>) -> Self {
        Self {
            tx,
            buffer: Vec::with_capacity(CHUNK_SIZE),
        }
    }
}

impl Write for ChannelWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        if self.buffer.len() >= CHUNK_SIZE {
            self.flush()?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let chunk = Bytes::from(std::mem::replace(
            &mut self.buffer,
            Vec::with_capacity(CHUNK_SIZE),
        ));
        self.tx
            .blocking_send(Ok(chunk))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "archive consumer went away"))
    }
}

/// Start producing the archive and return it as a response body.
///
/// Waits for the first chunk so that a failure before any byte is produced
/// can still become an error response. Later failures end the body stream
/// with an error, which aborts the transfer.
pub async fn stream_archive(analysis: NormalizedAnalysis) -> Result<Body, ArchiveError> {
    stream_with(move |sink| write_archive(sink, ArchiveEntries::new(&analysis))).await
}

async fn stream_with<F>(produce: F) -> Result<Body, ArchiveError>
where
    F: FnOnce(ChannelWriter) -> Result<(), ArchiveError> + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<io::Result<Bytes>>(CHANNEL_CAPACITY);

    tokio::task::spawn_blocking(move || {
        if let Err(err) = produce(ChannelWriter::new(tx.clone())) {
            tracing::error!(error = %err, "Zip error");
            // The consumer may already be gone; nothing left to tell it then
            let _ = tx.blocking_send(Err(io::Error::other(err.to_string())));
        }
    });

    let first = match rx.recv().await {
        Some(Ok(chunk)) => chunk,
        Some(Err(err)) => return Err(ArchiveError::Io(err)),
        None => return Err(ArchiveError::Empty),
    };

    let rest = stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|item| (item, rx))
    });
    let chunks = stream::iter([Ok::<Bytes, io::Error>(first)]).chain(rest);

    Ok(Body::from_stream(chunks))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OrchestratorError;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use serde_json::{json, Map, Value};
    use std::io::{Cursor, Read};
    use zip::ZipArchive;

    fn analysis(payload: Value) -> NormalizedAnalysis {
        let payload: Map<String, Value> = payload.as_object().unwrap().clone();
        NormalizedAnalysis::from_payload(payload, "https://example.com")
    }

    fn read_entries(bytes: Vec<u8>) -> Vec<(String, String)> {
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        (0..archive.len())
            .map(|i| {
                let mut file = archive.by_index(i).unwrap();
                let mut body = String::new();
                file.read_to_string(&mut body).unwrap();
                (file.name().to_string(), body)
            })
            .collect()
    }

    #[test]
    fn test_entries_in_order() {
        let analysis = analysis(json!({
            "summary": "S",
            "files": [{"filename": "a.json", "data": {"x": 1}}]
        }));
        let names: Vec<String> = ArchiveEntries::new(&analysis)
            .map(|e| e.unwrap().name)
            .collect();
        assert_eq!(names, vec!["content.txt", "engineResponse.json", "a.json"]);
    }

    #[test]
    fn test_duplicate_names_are_disambiguated() {
        let analysis = analysis(json!({
            "files": [
                {"filename": "report.json", "data": 1},
                {"filename": "report.json", "data": 2},
                {"data": 3},
                {"data": 4},
                {"filename": "content.txt", "data": "x"},
                {"filename": "README", "data": "y"},
                {"filename": "README", "data": "z"}
            ]
        }));
        let names: Vec<String> = ArchiveEntries::new(&analysis)
            .skip(2)
            .map(|e| e.unwrap().name)
            .collect();
        assert_eq!(
            names,
            vec![
                "report.json",
                "report (2).json",
                "file.json",
                "file (2).json",
                "content (2).txt",
                "README",
                "README (2)"
            ]
        );
    }

    #[test]
    fn test_write_archive_round_trip() {
        let analysis = analysis(json!({
            "analyzedUrl": "https://example.com",
            "summary": "S",
            "files": [{"filename": "a.json", "data": {"x": 1}}, {"filename": "raw.json"}]
        }));

        let mut bytes = Vec::new();
        write_archive(&mut bytes, ArchiveEntries::new(&analysis)).unwrap();
        let entries = read_entries(bytes);

        assert_eq!(entries.len(), 4);
        assert_eq!(entries[0], ("content.txt".to_string(), "S".to_string()));
        assert_eq!(entries[1].0, "engineResponse.json");
        let payload: Value = serde_json::from_str(&entries[1].1).unwrap();
        assert_eq!(payload, Value::Object(analysis.payload.clone()));
        assert_eq!(
            entries[2],
            (
                "a.json".to_string(),
                serde_json::to_string_pretty(&json!({"x": 1})).unwrap()
            )
        );
        // No data: the whole artifact is written
        let raw: Value = serde_json::from_str(&entries[3].1).unwrap();
        assert_eq!(raw, json!({"filename": "raw.json"}));
    }

    #[test]
    fn test_entries_are_deflated() {
        let analysis = analysis(json!({"content": "a".repeat(10_000)}));
        let mut bytes = Vec::new();
        write_archive(&mut bytes, ArchiveEntries::new(&analysis)).unwrap();
        assert!(bytes.len() < 2_000);

        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let file = archive.by_name("content.txt").unwrap();
        assert_eq!(file.compression(), CompressionMethod::Deflated);
    }

    /// Sink that accepts `limit` bytes, then fails every write.
    struct FailingSink {
        limit: usize,
        written: usize,
        attempts_after_failure: usize,
    }

    impl Write for FailingSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.written >= self.limit {
                self.attempts_after_failure += 1;
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"));
            }
            let n = buf.len().min(self.limit - self.written);
            self.written += n;
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_write_failure_is_terminal() {
        let analysis = analysis(json!({"content": "x".repeat(4_096)}));
        let mut sink = FailingSink {
            limit: 16,
            written: 0,
            attempts_after_failure: 0,
        };

        let result = write_archive(&mut sink, ArchiveEntries::new(&analysis));

        assert!(result.is_err());
        assert_eq!(sink.attempts_after_failure, 1);
    }

    #[test]
    fn test_entry_error_stops_archive() {
        let entries = vec![
            Ok(ArchiveEntry {
                name: "one.txt".to_string(),
                body: b"1".to_vec(),
            }),
            Err(ArchiveError::Empty),
            Ok(ArchiveEntry {
                name: "two.txt".to_string(),
                body: b"2".to_vec(),
            }),
        ];
        let mut bytes = Vec::new();
        let result = write_archive(&mut bytes, entries);
        assert!(matches!(result, Err(ArchiveError::Empty)));
        // No central directory was written after the failure
        assert!(ZipArchive::new(Cursor::new(bytes)).is_err());
    }

    #[tokio::test]
    async fn test_stream_archive_produces_body() {
        let analysis = analysis(json!({"summary": "S"}));
        let body = stream_archive(analysis).await.unwrap();
        let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
        let entries = read_entries(bytes.to_vec());
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].1, "S");
    }

    /// Incompressible bytes, so deflate output is about as long as the input.
    fn noise(len: usize) -> Vec<u8> {
        let mut state: u32 = 0x9E37_79B9;
        (0..len)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                state as u8
            })
            .collect()
    }

    #[tokio::test]
    async fn test_failure_before_first_chunk_is_server_error() {
        let entries: Vec<Result<ArchiveEntry, ArchiveError>> = vec![Err(ArchiveError::Empty)];

        let err = match stream_with(move |sink| write_archive(sink, entries)).await {
            Ok(_) => panic!("archive should fail before streaming"),
            Err(err) => err,
        };

        let response = OrchestratorError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers()["content-type"], "application/json");
    }

    #[tokio::test]
    async fn test_failure_after_first_chunk_aborts_body() {
        let entries: Vec<Result<ArchiveEntry, ArchiveError>> = vec![
            Ok(ArchiveEntry {
                name: "noise.bin".to_string(),
                body: noise(8 * CHUNK_SIZE),
            }),
            Err(ArchiveError::Empty),
        ];

        let body = match stream_with(move |sink| write_archive(sink, entries)).await {
            Ok(body) => body,
            Err(err) => panic!("archive failed before streaming: {err}"),
        };

        assert!(axum::body::to_bytes(body, usize::MAX).await.is_err());
    }
}

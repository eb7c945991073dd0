//! Append-only storage segments.
//!
//! A segment is one file of newline-delimited serialized events. While
//! active it carries an `.open` suffix and accepts buffered appends;
//! closing flushes, syncs, and renames it to its final name, after which
//! it is immutable: readable by a drain caller and deletable by a
//! discard caller. A restart can therefore tell closed segments from an
//! active one abandoned by a crash purely from the file name.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use beacon_common::Persistence;
use tracing::{debug, warn};

use crate::error::{Result, StoreError};

/// Suffix distinguishing the active segment file from closed ones.
pub const OPEN_SUFFIX: &str = "open";

/// File extension of closed segment files.
pub const SEGMENT_EXTENSION: &str = "log";

/// Build the closed-segment file name for an index.
pub fn segment_file_name(index: u64) -> String {
    format!("seg-{:08}.{}", index, SEGMENT_EXTENSION)
}

/// Parse a closed-segment file name back to its index.
pub fn parse_segment_index(name: &str) -> Option<u64> {
    let stem = name
        .strip_suffix(&format!(".{}", SEGMENT_EXTENSION))?
        .strip_prefix("seg-")?;
    stem.parse().ok()
}

/// An active, writable segment.
pub struct Segment {
    path: PathBuf,
    final_path: PathBuf,
    index: u64,
    writer: BufWriter<File>,
    bytes: u64,
    events: usize,
}

impl Segment {
    /// Create a fresh active segment in `dir` with the given index.
    pub fn create(dir: &Path, index: u64) -> Result<Self> {
        let final_path = dir.join(segment_file_name(index));
        let path = final_path.with_extension(format!("{}.{}", SEGMENT_EXTENSION, OPEN_SUFFIX));
        let file = OpenOptions::new()
            .create_new(true)
            .append(true)
            .open(&path)?;
        debug!(path = %path.display(), "created segment");
        Ok(Segment {
            path,
            final_path,
            index,
            writer: BufWriter::new(file),
            bytes: 0,
            events: 0,
        })
    }

    /// Append one serialized event, returning the bytes written
    /// (event length plus the newline delimiter).
    ///
    /// Events must be single-line; the caller serializes to JSON, which
    /// never embeds a raw newline.
    pub fn append(&mut self, event: &str) -> Result<u64> {
        self.writer.write_all(event.as_bytes())?;
        self.writer.write_all(b"\n")?;
        let written = event.len() as u64 + 1;
        self.bytes += written;
        self.events += 1;
        Ok(written)
    }

    /// Flush buffered bytes to the operating system.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Bytes appended so far (including delimiters).
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Events appended so far.
    pub fn events(&self) -> usize {
        self.events
    }

    /// Whether nothing has been appended yet.
    pub fn is_empty(&self) -> bool {
        self.events == 0
    }

    /// The segment's creation index within its directory.
    pub fn index(&self) -> u64 {
        self.index
    }

    /// Path of the active (`.open`) file backing this segment.
    pub fn open_path(&self) -> &Path {
        &self.path
    }

    /// Close the segment: flush, sync to durable storage, and rename to
    /// the final (closed) name. The segment no longer accepts writes.
    pub fn close(mut self, priority: Persistence) -> Result<ClosedSegment> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        std::fs::rename(&self.path, &self.final_path)?;
        debug!(path = %self.final_path.display(), bytes = self.bytes, events = self.events, "closed segment");
        Ok(ClosedSegment::new(
            std::mem::take(&mut self.final_path),
            priority,
            self.bytes,
        ))
    }
}

impl Drop for Segment {
    fn drop(&mut self) {
        // Best-effort flush so an orderly drop loses nothing buffered.
        let _ = self.writer.flush();
    }
}

/// A closed, immutable segment awaiting drain and discard.
#[derive(Debug)]
pub struct ClosedSegment {
    path: PathBuf,
    priority: Persistence,
    bytes: u64,
    leased: AtomicBool,
    discarded: AtomicBool,
}

impl ClosedSegment {
    /// Wrap an on-disk closed segment file.
    pub fn new(path: PathBuf, priority: Persistence, bytes: u64) -> Self {
        ClosedSegment {
            path,
            priority,
            bytes,
            leased: AtomicBool::new(false),
            discarded: AtomicBool::new(false),
        }
    }

    /// Backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Priority class this segment belongs to.
    pub fn priority(&self) -> Persistence {
        self.priority
    }

    /// On-disk bytes recorded at close time.
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Whether the segment has been discarded.
    pub fn is_discarded(&self) -> bool {
        self.discarded.load(Ordering::Acquire)
    }

    /// Whether the segment is currently leased to a drain caller.
    pub fn is_leased(&self) -> bool {
        self.leased.load(Ordering::Acquire)
    }

    /// Try to lease the segment for draining. Returns false if it is
    /// already leased or discarded.
    pub fn try_lease(&self) -> bool {
        if self.is_discarded() {
            return false;
        }
        !self.leased.swap(true, Ordering::AcqRel)
    }

    /// Return the segment to the drainable pool for a later retry.
    ///
    /// Called by the uploader when an upload fails: the segment stays on
    /// disk, its quota stays charged, and it becomes eligible for
    /// re-draining.
    pub fn release(&self) {
        self.leased.store(false, Ordering::Release);
    }

    /// Read back every fully-written event, in arrival order.
    ///
    /// A trailing fragment without its newline delimiter (a crash mid
    /// write) is skipped, not an error; the drain returns everything that
    /// was durably appended before it.
    pub fn drain(&self) -> Result<Vec<String>> {
        if self.is_discarded() {
            return Err(StoreError::SegmentClosed(format!(
                "segment already discarded: {}",
                self.path.display()
            )));
        }
        let raw = std::fs::read(&self.path)?;
        let mut events = Vec::new();
        let mut rest = raw.as_slice();
        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            let (line, tail) = rest.split_at(pos);
            rest = &tail[1..];
            match std::str::from_utf8(line) {
                Ok(event) => events.push(event.to_string()),
                Err(_) => {
                    warn!(path = %self.path.display(), "skipping undecodable event line");
                }
            }
        }
        if !rest.is_empty() {
            warn!(
                path = %self.path.display(),
                bytes = rest.len(),
                "skipping truncated trailing fragment"
            );
        }
        Ok(events)
    }

    /// Delete the backing file and release the segment's recorded bytes
    /// from the quota tracker. Idempotent: discarding twice is a no-op.
    pub fn discard(&self, quota: &crate::quota::QuotaTracker) -> Result<()> {
        if self.discarded.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                // Bytes stay charged while the file is still on disk.
                self.discarded.store(false, Ordering::Release);
                return Err(e.into());
            }
        }
        quota.release(self.bytes);
        debug!(path = %self.path.display(), bytes = self.bytes, "discarded segment");
        Ok(())
    }
}

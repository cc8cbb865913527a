use std::io;

/// Errors surfaced by the log buffer.
///
/// A failed append does not advance the writer cursor, so the caller may
/// retry the same record after resolving the underlying problem.
#[derive(Debug)]
#[derive(thiserror::Error)]
pub enum WalError {
    #[error(transparent)]
    SegmentIo(#[from] SegmentIoError),

    #[error(transparent)]
    Recovery(#[from] RecoveryError),

    #[error(transparent)]
    Malformed(#[from] MalformedRecord),

    #[error(transparent)]
    RecordTooLarge(#[from] RecordTooLarge),

    #[error(transparent)]
    FieldTooLong(#[from] FieldTooLong),

    #[error(transparent)]
    Locked(#[from] DirectoryLocked),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Another process already holds the WAL directory.
#[derive(Debug)]
#[derive(thiserror::Error)]
#[error("wal directory '{dir}' is locked by another process: {source}")]
pub struct DirectoryLocked {
    pub dir: String,
    #[source]
    pub source: io::Error,
}

impl DirectoryLocked {
    pub fn new(dir: impl ToString, source: io::Error) -> Self {
        Self {
            dir: dir.to_string(),
            source,
        }
    }
}

/// I/O failure on a segment file.
#[derive(Debug)]
#[derive(thiserror::Error)]
#[error("segment file {file_no} error when {when}: {source}")]
pub struct SegmentIoError {
    pub file_no: u32,
    pub when: &'static str,
    #[source]
    pub source: io::Error,
}

impl SegmentIoError {
    pub fn new(file_no: u32, when: &'static str, source: io::Error) -> Self {
        Self {
            file_no,
            when,
            source,
        }
    }
}

/// A segment required for recovery is missing or unreadable.
#[derive(Debug, Clone, PartialEq, Eq)]
#[derive(thiserror::Error)]
#[error("cannot recover from segment file {file_no}: {reason}")]
pub struct RecoveryError {
    pub file_no: u32,
    pub reason: String,
}

impl RecoveryError {
    pub fn new(file_no: u32, reason: impl ToString) -> Self {
        Self {
            file_no,
            reason: reason.to_string(),
        }
    }
}

/// A record header declares lengths that cross the valid byte range, or the
/// header itself is inconsistent.
#[derive(Debug, Clone, PartialEq, Eq)]
#[derive(thiserror::Error)]
#[error("malformed record in segment {file_no} at offset {offset}: {reason}")]
pub struct MalformedRecord {
    pub file_no: u32,
    pub offset: u32,
    pub reason: String,
}

impl MalformedRecord {
    pub fn new(file_no: u32, offset: u32, reason: impl ToString) -> Self {
        Self {
            file_no,
            offset,
            reason: reason.to_string(),
        }
    }
}

/// The encoded record would never fit in the buffer, even right after a
/// rollover.
#[derive(Debug, Clone, PartialEq, Eq)]
#[derive(thiserror::Error)]
#[error("record of {record_size} bytes exceeds buffer capacity {capacity}")]
pub struct RecordTooLarge {
    pub record_size: u64,
    pub capacity: u32,
}

impl RecordTooLarge {
    pub fn new(record_size: u64, capacity: u32) -> Self {
        Self {
            record_size,
            capacity,
        }
    }
}

/// A variable-length record field exceeds the width of its header counter.
#[derive(Debug, Clone, PartialEq, Eq)]
#[derive(thiserror::Error)]
#[error("record field '{field}' has {len} entries, max {max}")]
pub struct FieldTooLong {
    pub field: &'static str,
    pub len: usize,
    pub max: usize,
}

impl FieldTooLong {
    pub fn new(field: &'static str, len: usize, max: usize) -> Self {
        Self { field, len, max }
    }
}

/// A file in the WAL directory does not follow the `{file_no}.wal` naming.
#[derive(Debug, Clone, PartialEq, Eq)]
#[derive(thiserror::Error)]
#[error("invalid wal file name: {bad_file_name}: {reason}")]
pub struct InvalidWalFileName {
    pub bad_file_name: String,
    pub reason: String,
}

impl InvalidWalFileName {
    pub fn new(bad_file_name: impl ToString, reason: impl ToString) -> Self {
        Self {
            bad_file_name: bad_file_name.to_string(),
            reason: reason.to_string(),
        }
    }
}

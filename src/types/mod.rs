use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

pub mod error;
pub mod token;

/// One file discovered by the source walker: the local path, the object key
/// it maps to, and the size/mtime observed at enumeration time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub path: PathBuf,
    pub key: String,
    pub size: u64,
    pub modified: SystemTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub offset: u64,
    pub length: u64,
}

impl ByteRange {
    pub fn end(&self) -> u64 {
        self.offset + self.length
    }
}

/// One atomic upload operation: the whole file, or one part of a multipart
/// upload. Immutable once planned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferUnit {
    pub key: String,
    pub source_path: PathBuf,
    pub part_number: i32,
    pub range: ByteRange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadMethod {
    SingleShot,
    Multipart,
}

/// Ordered set of units covering one source file exactly once, in order,
/// without gaps or overlaps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferPlan {
    pub entry: FileEntry,
    pub method: UploadMethod,
    pub units: Vec<TransferUnit>,
}

impl TransferPlan {
    pub fn total_bytes(&self) -> u64 {
        self.units.iter().map(|unit| unit.range.length).sum()
    }
}

/// Execution state of a single transfer unit, driven by the retry
/// controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitState {
    Pending,
    InFlight,
    Retrying(u32),
    Succeeded,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Succeeded,
    Skipped,
    Failed(String),
}

/// Terminal record for one source file. Created once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobResult {
    pub key: String,
    pub status: JobStatus,
    pub bytes_transferred: u64,
    pub planned_units: u64,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UploadStatistics {
    UploadComplete { key: String },
    UploadBytes(u64),
    UploadSkip { key: String },
    UploadError { key: String },
    UploadWarning { key: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedFile {
    pub key: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub files_succeeded: u64,
    pub files_skipped: u64,
    pub files_failed: u64,
    pub planned_units: u64,
    pub bytes_transferred: u64,
    pub failed_files: Vec<FailedFile>,
}

impl RunReport {
    pub fn files_processed(&self) -> u64 {
        self.files_succeeded + self.files_skipped + self.files_failed
    }

    pub fn has_failed_files(&self) -> bool {
        self.files_failed != 0
    }
}

pub type SharedRunReport = Arc<Mutex<RunReport>>;

/// Destination parsed from an `s3://bucket[/prefix]` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetPath {
    pub bucket: String,
    pub prefix: String,
}

impl TargetPath {
    /// Object key for a source entry key, with the configured prefix
    /// applied. The prefix is treated as a directory prefix.
    pub fn object_key(&self, key: &str) -> String {
        if self.prefix.is_empty() {
            return key.to_string();
        }

        if self.prefix.ends_with('/') {
            format!("{}{}", self.prefix, key)
        } else {
            format!("{}/{}", self.prefix, key)
        }
    }
}

//! Per-file outcomes and the batch summary.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Blank,
    Duplicate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Parse,
    MissingStatementId,
    RemoteQuery,
    RemoteUpload,
    Io,
}

/// How one file ended up. Failures never escape the file they belong to.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileStatus {
    Imported,
    Skipped { reason: SkipReason },
    Failed { error: FailureKind, detail: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileReport {
    pub file: String,
    #[serde(flatten)]
    pub status: FileStatus,
}

#[derive(Debug, Default, Serialize)]
pub struct BatchReport {
    pub files: Vec<FileReport>,
}

impl BatchReport {
    pub fn push(&mut self, file: impl Into<String>, status: FileStatus) {
        self.files.push(FileReport {
            file: file.into(),
            status,
        });
    }

    pub fn imported(&self) -> usize {
        self.count(|s| matches!(s, FileStatus::Imported))
    }

    pub fn skipped(&self, reason: SkipReason) -> usize {
        self.count(|s| matches!(s, FileStatus::Skipped { reason: r } if *r == reason))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, FileStatus::Failed { .. }))
    }

    fn count(&self, pred: impl Fn(&FileStatus) -> bool) -> usize {
        self.files.iter().filter(|f| pred(&f.status)).count()
    }

    pub fn summary(&self) -> String {
        format!(
            "Processed {} file(s): {} imported, {} blank, {} duplicate, {} failed",
            self.files.len(),
            self.imported(),
            self.skipped(SkipReason::Blank),
            self.skipped(SkipReason::Duplicate),
            self.failed(),
        )
    }
}

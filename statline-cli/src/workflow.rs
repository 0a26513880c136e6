//! Directory workflows: blank triage and dedup-checked import.
//!
//! Both workflows take one directory listing up front and then handle every
//! file independently; nothing a single file does can abort the batch.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use statline_camt::inspect;
use statline_odoo::{StatementLedger, UploadRecord};
use tracing::{debug, error, info};

use crate::report::{BatchReport, FailureKind, FileStatus, SkipReason};

/// The download service names statements `camt.053*.xml`, with the case of
/// both parts varying by delivery channel.
pub fn is_camt053_filename(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.starts_with("camt.053") && lower.ends_with(".xml")
}

pub fn has_xml_extension(name: &str) -> bool {
    name.to_ascii_lowercase().ends_with(".xml")
}

fn list_file_names(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("listing {}", dir.display()))? {
        let entry = entry.with_context(|| format!("listing {}", dir.display()))?;
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    Ok(names)
}

/// Blank-detection workflow: which camt.053 files carry no transactions?
///
/// Needs no Odoo connection. Files that fail to parse are reported in the
/// log and never counted as blank.
pub fn find_blank_statements(dir: &Path) -> Result<Vec<String>> {
    let mut blank = Vec::new();
    for name in list_file_names(dir)? {
        if !is_camt053_filename(&name) {
            debug!(file = %name, "skipping non-CAMT.053 file");
            continue;
        }
        debug!(file = %name, "inspecting");
        let bytes = match fs::read(dir.join(&name)) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(file = %name, "read failed: {e}");
                continue;
            }
        };
        match inspect(&bytes) {
            Ok(doc) if doc.is_blank() => {
                info!(file = %name, "blank statement");
                blank.push(name);
            }
            Ok(_) => debug!(file = %name, "has transactions"),
            Err(e) => error!(file = %name, "parse failed: {e}"),
        }
    }
    Ok(blank)
}

/// Import workflow: classify every `.xml` file, skip what Odoo already has,
/// upload and trigger the rest.
pub async fn import_directory<L: StatementLedger>(dir: &Path, ledger: &L) -> Result<BatchReport> {
    let mut report = BatchReport::default();
    for name in list_file_names(dir)? {
        if !has_xml_extension(&name) {
            debug!(file = %name, "skipping non-XML file");
            continue;
        }
        let status = process_file(dir, &name, ledger).await;
        report.push(name, status);
    }
    Ok(report)
}

async fn process_file<L: StatementLedger>(dir: &Path, name: &str, ledger: &L) -> FileStatus {
    debug!(file = %name, "inspecting");
    let bytes = match fs::read(dir.join(name)) {
        Ok(bytes) => bytes,
        Err(e) => {
            error!(file = %name, "read failed: {e}");
            return FileStatus::Failed {
                error: FailureKind::Io,
                detail: e.to_string(),
            };
        }
    };

    let doc = match inspect(&bytes) {
        Ok(doc) => doc,
        Err(e) => {
            error!(file = %name, "parse failed: {e}");
            return FileStatus::Failed {
                error: FailureKind::Parse,
                detail: e.to_string(),
            };
        }
    };

    if doc.is_blank() {
        info!(file = %name, "skipping blank statement");
        return FileStatus::Skipped {
            reason: SkipReason::Blank,
        };
    }

    let statement_id = match doc.statement_id {
        Some(id) => id,
        None => {
            error!(file = %name, "could not extract a statement id");
            return FileStatus::Failed {
                error: FailureKind::MissingStatementId,
                detail: "statement id missing or empty".to_string(),
            };
        }
    };
    debug!(file = %name, statement_id = %statement_id, "extracted statement id");

    match ledger.statement_exists(&statement_id).await {
        Ok(true) => {
            info!(file = %name, statement_id = %statement_id, "already in Odoo, skipping");
            return FileStatus::Skipped {
                reason: SkipReason::Duplicate,
            };
        }
        Ok(false) => {}
        Err(e) => {
            error!(file = %name, statement_id = %statement_id, "existence check failed: {e}");
            return FileStatus::Failed {
                error: FailureKind::RemoteQuery,
                detail: e.to_string(),
            };
        }
    }

    let record = UploadRecord {
        file_name: name.to_string(),
        payload: BASE64.encode(&bytes),
    };
    match ledger.upload_and_import(&record).await {
        Ok(_) => {
            info!(file = %name, "uploaded and import triggered");
            FileStatus::Imported
        }
        Err(e) => {
            error!(file = %name, "upload failed: {e}");
            FileStatus::Failed {
                error: FailureKind::RemoteUpload,
                detail: e.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use statline_odoo::OdooError;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[test]
    fn blank_workflow_filename_filter() {
        assert!(is_camt053_filename("camt.053_20250301.xml"));
        assert!(is_camt053_filename("CAMT.053_2025.XML"));
        assert!(is_camt053_filename("Camt.053-weekly.Xml"));
        assert!(!is_camt053_filename("statement.xml"));
        assert!(!is_camt053_filename("camt.053_20250301.txt"));
        assert!(!is_camt053_filename("camt.054_20250301.xml"));
    }

    #[test]
    fn import_workflow_extension_filter() {
        assert!(has_xml_extension("anything.xml"));
        assert!(has_xml_extension("ANYTHING.XML"));
        assert!(!has_xml_extension("notes.txt"));
        assert!(!has_xml_extension("archive.xml.gz"));
    }

    const NS: &str = statline_camt::CAMT053_NS;

    fn camt(id: &str, entries: usize) -> String {
        let ntry = r#"<Ntry><Amt Ccy="CHF">10.00</Amt></Ntry>"#.repeat(entries);
        let id_node = if id.is_empty() {
            String::new()
        } else {
            format!("<Id>{id}</Id>")
        };
        format!(
            r#"<?xml version="1.0"?><Document xmlns="{NS}"><BkToCstmrStmt><Stmt>{id_node}{ntry}</Stmt></BkToCstmrStmt></Document>"#
        )
    }

    /// In-memory stand-in for Odoo: a set of known statement names plus a
    /// log of uploads.
    #[derive(Default)]
    struct FakeLedger {
        existing: Mutex<HashSet<String>>,
        uploads: Mutex<Vec<UploadRecord>>,
        fail_query_for: Option<String>,
        fail_upload_for: Option<String>,
    }

    impl FakeLedger {
        fn with_existing(ids: &[&str]) -> Self {
            Self {
                existing: Mutex::new(ids.iter().map(|s| s.to_string()).collect()),
                ..Self::default()
            }
        }

        fn upload_count(&self) -> usize {
            self.uploads.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl StatementLedger for FakeLedger {
        async fn statement_exists(&self, statement_id: &str) -> statline_odoo::Result<bool> {
            if self.fail_query_for.as_deref() == Some(statement_id) {
                return Err(OdooError::Protocol("query exploded".into()));
            }
            Ok(self.existing.lock().unwrap().contains(statement_id))
        }

        async fn upload_and_import(&self, record: &UploadRecord) -> statline_odoo::Result<i64> {
            if self.fail_upload_for.as_deref() == Some(record.file_name.as_str()) {
                return Err(OdooError::Protocol("upload exploded".into()));
            }
            let mut uploads = self.uploads.lock().unwrap();
            uploads.push(record.clone());
            Ok(uploads.len() as i64)
        }
    }

    fn write(dir: &TempDir, name: &str, content: &str) {
        fs::write(dir.path().join(name), content).unwrap();
    }

    #[test]
    fn blank_workflow_reports_only_blank_camt_files() {
        let dir = TempDir::new().unwrap();
        write(&dir, "camt.053_a.xml", &camt("STMT-A", 0));
        write(&dir, "camt.053_b.xml", &camt("STMT-B", 1));
        write(&dir, "statement.xml", &camt("STMT-C", 0));
        write(&dir, "camt.053_broken.xml", "<Document><Stmt></Wrong></Document>");
        write(&dir, "README.txt", "not a statement");

        let blank = find_blank_statements(dir.path()).unwrap();
        assert_eq!(blank, vec!["camt.053_a.xml".to_string()]);
    }

    #[tokio::test]
    async fn import_skips_blank_and_uploads_fresh_statement() {
        let dir = TempDir::new().unwrap();
        write(&dir, "camt.053_A.xml", &camt("STMT-000", 0));
        write(&dir, "camt.053_B.xml", &camt("STMT-001", 1));

        let ledger = FakeLedger::default();
        let report = import_directory(dir.path(), &ledger).await.unwrap();

        assert_eq!(report.skipped(SkipReason::Blank), 1);
        assert_eq!(report.imported(), 1);
        assert_eq!(ledger.upload_count(), 1);

        let uploads = ledger.uploads.lock().unwrap();
        assert_eq!(uploads[0].file_name, "camt.053_B.xml");
        // payload round-trips to the original bytes
        let decoded = BASE64.decode(&uploads[0].payload).unwrap();
        assert_eq!(decoded, camt("STMT-001", 1).into_bytes());
    }

    #[tokio::test]
    async fn second_run_finds_first_runs_upload_and_skips() {
        let dir = TempDir::new().unwrap();
        write(&dir, "camt.053_B.xml", &camt("STMT-001", 1));

        let ledger = FakeLedger::default();
        let first = import_directory(dir.path(), &ledger).await.unwrap();
        assert_eq!(first.imported(), 1);

        // Odoo now knows the statement; the next run must not re-upload.
        ledger.existing.lock().unwrap().insert("STMT-001".into());
        let second = import_directory(dir.path(), &ledger).await.unwrap();
        assert_eq!(second.imported(), 0);
        assert_eq!(second.skipped(SkipReason::Duplicate), 1);
        assert_eq!(ledger.upload_count(), 1);
    }

    #[tokio::test]
    async fn known_statement_issues_no_upload_calls() {
        let dir = TempDir::new().unwrap();
        write(&dir, "dup.xml", &camt("STMT-001", 2));

        let ledger = FakeLedger::with_existing(&["STMT-001"]);
        let report = import_directory(dir.path(), &ledger).await.unwrap();

        assert_eq!(report.skipped(SkipReason::Duplicate), 1);
        assert_eq!(ledger.upload_count(), 0);
    }

    #[tokio::test]
    async fn one_bad_file_never_stops_the_batch() {
        let dir = TempDir::new().unwrap();
        write(&dir, "a_broken.xml", "<Document><Stmt></Wrong></Document>");
        write(&dir, "b_no_id.xml", &camt("", 1));
        write(&dir, "c_good.xml", &camt("STMT-007", 1));
        write(&dir, "d_query_fails.xml", &camt("STMT-008", 1));
        write(&dir, "e_upload_fails.xml", &camt("STMT-009", 1));

        let ledger = FakeLedger {
            fail_query_for: Some("STMT-008".into()),
            fail_upload_for: Some("e_upload_fails.xml".into()),
            ..FakeLedger::default()
        };
        let report = import_directory(dir.path(), &ledger).await.unwrap();

        assert_eq!(report.files.len(), 5);
        assert_eq!(report.imported(), 1);
        assert_eq!(report.failed(), 4);

        let by_file = |name: &str| {
            report
                .files
                .iter()
                .find(|f| f.file == name)
                .unwrap()
                .status
                .clone()
        };
        assert!(matches!(
            by_file("a_broken.xml"),
            FileStatus::Failed { error: FailureKind::Parse, .. }
        ));
        assert!(matches!(
            by_file("b_no_id.xml"),
            FileStatus::Failed { error: FailureKind::MissingStatementId, .. }
        ));
        assert!(matches!(by_file("c_good.xml"), FileStatus::Imported));
        assert!(matches!(
            by_file("d_query_fails.xml"),
            FileStatus::Failed { error: FailureKind::RemoteQuery, .. }
        ));
        assert!(matches!(
            by_file("e_upload_fails.xml"),
            FileStatus::Failed { error: FailureKind::RemoteUpload, .. }
        ));

        // the query failure must not fall through to an upload
        assert_eq!(ledger.upload_count(), 1);
    }

    #[tokio::test]
    async fn non_xml_files_stay_out_of_the_report() {
        let dir = TempDir::new().unwrap();
        write(&dir, "camt.053_a.xml", &camt("STMT-010", 1));
        write(&dir, "download.log", "noise");

        let ledger = FakeLedger::default();
        let report = import_directory(dir.path(), &ledger).await.unwrap();
        assert_eq!(report.files.len(), 1);
        assert_eq!(report.files[0].file, "camt.053_a.xml");
    }
}

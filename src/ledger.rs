//! The sent ledger: durable cross-run record of delivered recipients.
//!
//! The ledger is the single source of truth for "already delivered". It is
//! append-only across all dispatcher runs: entries are flushed and fsynced
//! before the next send is attempted, so a crash between entries leaves a
//! valid prefix and never causes a duplicate future send for rows already
//! recorded. The one inconsistency the ordering cannot close is a crash
//! after a successful transmission but before its ledger write; that row is
//! re-sent on the next run (accepted tradeoff).

use snafu::prelude::*;
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::path::Path;
use tracing::debug;

use crate::error::{
    AppendLedgerSnafu, FlushLedgerSnafu, LedgerError, OpenLedgerSnafu, ReadLedgerSnafu,
    SyncLedgerSnafu,
};

/// Append-only `name,email` ledger with an in-memory set of sent emails.
pub struct SentLedger {
    sent: HashSet<String>,
    writer: csv::Writer<File>,
    sync: File,
    path: String,
}

impl SentLedger {
    /// Open (or create) the ledger, loading all previously sent emails.
    ///
    /// Writes the header row if the file is new or empty.
    pub fn open(path: &str) -> Result<Self, LedgerError> {
        let sent = load_sent_emails(path)?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .context(OpenLedgerSnafu { path })?;
        let needs_header = file
            .metadata()
            .context(OpenLedgerSnafu { path })?
            .len()
            == 0;
        let sync = file.try_clone().context(OpenLedgerSnafu { path })?;

        let writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        let mut ledger = Self {
            sent,
            writer,
            sync,
            path: path.to_string(),
        };
        if needs_header {
            ledger.write_row("name", "email")?;
        }

        debug!(
            "Loaded ledger {}: {} recipients already sent",
            ledger.path,
            ledger.sent.len()
        );
        Ok(ledger)
    }

    /// Whether this email has already received a certificate.
    pub fn contains(&self, email: &str) -> bool {
        self.sent.contains(email)
    }

    /// Number of recipients recorded as sent.
    pub fn len(&self) -> usize {
        self.sent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sent.is_empty()
    }

    /// Record a delivered recipient, durably, before the caller proceeds.
    pub fn record(&mut self, name: &str, email: &str) -> Result<(), LedgerError> {
        self.write_row(name, email)?;
        self.sent.insert(email.to_string());
        Ok(())
    }

    fn write_row(&mut self, name: &str, email: &str) -> Result<(), LedgerError> {
        self.writer
            .write_record([name, email])
            .context(AppendLedgerSnafu { path: &self.path })?;
        self.writer
            .flush()
            .context(FlushLedgerSnafu { path: &self.path })?;
        self.sync
            .sync_data()
            .context(SyncLedgerSnafu { path: &self.path })
    }
}

/// Load the email column of an existing ledger into a set.
///
/// An absent file, an empty file, or a header-only file all yield the
/// empty set.
fn load_sent_emails(path: &str) -> Result<HashSet<String>, LedgerError> {
    if !Path::new(path).exists() {
        return Ok(HashSet::new());
    }

    let mut reader = csv::Reader::from_path(path).context(ReadLedgerSnafu { path })?;
    let headers = reader.headers().context(ReadLedgerSnafu { path })?.clone();
    let Some(email_idx) = headers.iter().position(|h| h == "email") else {
        return Ok(HashSet::new());
    };

    let mut sent = HashSet::new();
    for record in reader.records() {
        let record = record.context(ReadLedgerSnafu { path })?;
        if let Some(email) = record.get(email_idx) {
            if !email.is_empty() {
                sent.insert(email.to_string());
            }
        }
    }
    Ok(sent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn ledger_path(dir: &TempDir) -> String {
        dir.path().join("sent_log.csv").display().to_string()
    }

    #[test]
    fn test_new_ledger_writes_header() {
        let dir = TempDir::new().unwrap();
        let path = ledger_path(&dir);

        let ledger = SentLedger::open(&path).unwrap();
        assert!(ledger.is_empty());
        drop(ledger);

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().next(), Some("name,email"));
    }

    #[test]
    fn test_record_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = ledger_path(&dir);

        let mut ledger = SentLedger::open(&path).unwrap();
        ledger.record("Alice", "a@x.com").unwrap();
        ledger.record("Bob", "b@x.com").unwrap();
        assert!(ledger.contains("a@x.com"));
        assert_eq!(ledger.len(), 2);
        drop(ledger);

        // Reopening sees both entries and does not rewrite the header.
        let ledger = SentLedger::open(&path).unwrap();
        assert!(ledger.contains("a@x.com"));
        assert!(ledger.contains("b@x.com"));
        assert_eq!(ledger.len(), 2);
        drop(ledger);

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 3);
    }

    #[test]
    fn test_ledger_grows_monotonically_across_runs() {
        let dir = TempDir::new().unwrap();
        let path = ledger_path(&dir);

        let mut ledger = SentLedger::open(&path).unwrap();
        ledger.record("Alice", "a@x.com").unwrap();
        drop(ledger);
        let after_first: Vec<String> = std::fs::read_to_string(&path)
            .unwrap()
            .lines()
            .map(String::from)
            .collect();

        let mut ledger = SentLedger::open(&path).unwrap();
        ledger.record("Bob", "b@x.com").unwrap();
        drop(ledger);
        let after_second: Vec<String> = std::fs::read_to_string(&path)
            .unwrap()
            .lines()
            .map(String::from)
            .collect();

        // Every line from run N survives run N+1 unchanged, in order.
        assert_eq!(&after_second[..after_first.len()], &after_first[..]);
        assert_eq!(after_second.len(), after_first.len() + 1);
    }

    #[test]
    fn test_case_sensitive_matching() {
        let dir = TempDir::new().unwrap();
        let path = ledger_path(&dir);

        let mut ledger = SentLedger::open(&path).unwrap();
        ledger.record("Alice", "Alice@X.com").unwrap();

        assert!(ledger.contains("Alice@X.com"));
        assert!(!ledger.contains("alice@x.com"));
    }

    #[test]
    fn test_empty_file_yields_empty_set() {
        let dir = TempDir::new().unwrap();
        let path = ledger_path(&dir);
        std::fs::write(&path, "").unwrap();

        let ledger = SentLedger::open(&path).unwrap();
        assert!(ledger.is_empty());
        drop(ledger);

        // Header is written into the previously empty file.
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().next(), Some("name,email"));
    }
}

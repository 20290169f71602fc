//! Append-only JSON-lines ledger on the local filesystem.
//!
//! Every operation holds an exclusive `flock` on a sibling `.lock` file, so
//! separate processes sharing one ledger file serialize their
//! compare-and-append. The kernel releases the lock when its holder exits,
//! however it exits. Appends are flushed with `sync_all` before the lock is
//! released.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use fs2::FileExt;
use tracing::{debug, warn};

use crate::error::LedgerError;
use crate::event::GovernanceEvent;
use crate::ledger::{check_append, new_entry, validate_lineage, Ledger, LedgerEntry};

const DEFAULT_LOCK_ATTEMPTS: u32 = 200;
const DEFAULT_LOCK_BACKOFF: Duration = Duration::from_millis(25);

#[derive(Clone, Debug)]
pub struct FileLedger {
    path: PathBuf,
    lock_path: PathBuf,
    lock_attempts: u32,
    lock_backoff: Duration,
}

impl FileLedger {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }
        let mut lock_path = path.clone().into_os_string();
        lock_path.push(".lock");
        Ok(Self {
            path,
            lock_path: PathBuf::from(lock_path),
            lock_attempts: DEFAULT_LOCK_ATTEMPTS,
            lock_backoff: DEFAULT_LOCK_BACKOFF,
        })
    }

    /// Override how long to wait for another writer.
    pub fn with_lock_timeout(mut self, attempts: u32, backoff: Duration) -> Self {
        self.lock_attempts = attempts.max(1);
        self.lock_backoff = backoff;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every entry in file order.
    pub async fn entries(&self) -> Result<Vec<LedgerEntry>, LedgerError> {
        let this = self.clone();
        run_blocking(move || {
            let _lock = this.lock()?;
            read_entries(&this.path)
        })
        .await
    }

    fn lock(&self) -> Result<LedgerLock, LedgerError> {
        LedgerLock::acquire(&self.lock_path, self.lock_attempts, self.lock_backoff)
    }

    fn history_blocking(&self, lineage: &str) -> Result<Vec<LedgerEntry>, LedgerError> {
        let history: Vec<LedgerEntry> = read_entries(&self.path)?
            .into_iter()
            .filter(|e| e.lineage == lineage)
            .collect();
        validate_lineage(&history)?;
        Ok(history)
    }

    fn append_blocking(
        &self,
        lineage: &str,
        expected_len: usize,
        event: GovernanceEvent,
    ) -> Result<LedgerEntry, LedgerError> {
        let _lock = self.lock()?;
        let history = self.history_blocking(lineage)?;
        check_append(lineage, &history, expected_len, &event)?;

        let entry = new_entry(lineage, history.len() as u64 + 1, event);
        let mut line =
            serde_json::to_string(&entry).map_err(|e| LedgerError::Serialization(e.to_string()))?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(io_error)?;
        file.write_all(line.as_bytes()).map_err(io_error)?;
        file.sync_all().map_err(io_error)?;

        debug!(lineage, seq = entry.seq, path = %self.path.display(), "Ledger entry appended");
        Ok(entry)
    }
}

#[async_trait]
impl Ledger for FileLedger {
    async fn lineage_history(&self, lineage: &str) -> Result<Vec<LedgerEntry>, LedgerError> {
        let this = self.clone();
        let lineage = lineage.to_string();
        run_blocking(move || {
            let _lock = this.lock()?;
            this.history_blocking(&lineage)
        })
        .await
    }

    async fn append(
        &self,
        lineage: &str,
        expected_len: usize,
        event: GovernanceEvent,
    ) -> Result<LedgerEntry, LedgerError> {
        let this = self.clone();
        let lineage = lineage.to_string();
        run_blocking(move || this.append_blocking(&lineage, expected_len, event)).await
    }
}

async fn run_blocking<T, F>(f: F) -> Result<T, LedgerError>
where
    F: FnOnce() -> Result<T, LedgerError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| LedgerError::Io(format!("ledger task failed: {e}")))?
}

fn io_error(e: std::io::Error) -> LedgerError {
    LedgerError::Io(e.to_string())
}

fn read_entries(path: &Path) -> Result<Vec<LedgerEntry>, LedgerError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(io_error(e)),
    };

    let mut entries = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(io_error)?;
        if line.trim().is_empty() {
            continue;
        }
        let entry = serde_json::from_str(&line).map_err(|e| LedgerError::Corrupt {
            line: index + 1,
            reason: e.to_string(),
        })?;
        entries.push(entry);
    }
    Ok(entries)
}

/// Exclusive advisory lock on the ledger's lock file, held while the value
/// lives. The lock file itself is never removed.
struct LedgerLock {
    _file: File,
}

impl LedgerLock {
    fn acquire(path: &Path, attempts: u32, backoff: Duration) -> Result<Self, LedgerError> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)
            .map_err(io_error)?;
        for attempt in 0..attempts {
            match FileExt::try_lock_exclusive(&file) {
                Ok(()) => return Ok(Self { _file: file }),
                Err(e) if is_contended(&e) => {
                    if attempt + 1 < attempts {
                        std::thread::sleep(backoff);
                    }
                }
                Err(e) => return Err(io_error(e)),
            }
        }
        warn!(path = %path.display(), "Ledger lock still held by another writer");
        Err(LedgerError::LockTimeout(path.to_path_buf()))
    }
}

fn is_contended(e: &std::io::Error) -> bool {
    e.kind() == ErrorKind::WouldBlock
        || e.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::ledger::test_support::{frozen, rejected};

    #[tokio::test]
    async fn persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("governance").join("ledger.jsonl");

        let ledger = FileLedger::open(&path).unwrap();
        ledger.append("checkout", 0, rejected("checkout")).await.unwrap();
        ledger.append("billing", 0, rejected("billing")).await.unwrap();

        let reopened = FileLedger::open(&path).unwrap();
        reopened.append("checkout", 1, frozen("checkout")).await.unwrap();

        let history = reopened.lineage_history("checkout").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].seq, 2);
        assert!(history[1].event.is_frozen());
        assert_eq!(reopened.entries().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn missing_file_is_empty_history() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = FileLedger::open(dir.path().join("ledger.jsonl")).unwrap();
        assert!(ledger.lineage_history("checkout").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn enforces_compare_and_append() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = FileLedger::open(dir.path().join("ledger.jsonl")).unwrap();
        ledger.append("checkout", 0, frozen("checkout")).await.unwrap();
        assert_eq!(
            ledger.append("checkout", 1, frozen("checkout")).await.unwrap_err(),
            LedgerError::AlreadyFrozen("checkout".into())
        );
        assert!(matches!(
            ledger.append("billing", 3, rejected("billing")).await.unwrap_err(),
            LedgerError::Conflict { .. }
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writers_serialize() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");
        let mut handles = Vec::new();
        for _ in 0..8 {
            let ledger = Arc::new(FileLedger::open(&path).unwrap());
            handles.push(tokio::spawn(async move {
                ledger.append("checkout", 0, frozen("checkout")).await
            }));
        }
        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        assert_eq!(FileLedger::open(&path).unwrap().entries().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn leftover_lock_file_does_not_block() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");
        std::fs::write(dir.path().join("ledger.jsonl.lock"), "4242\n").unwrap();
        let ledger = FileLedger::open(&path)
            .unwrap()
            .with_lock_timeout(2, Duration::from_millis(1));
        ledger.append("checkout", 0, rejected("checkout")).await.unwrap();
        assert_eq!(ledger.lineage_history("checkout").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn held_lock_times_out_until_its_holder_goes_away() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");
        let ledger = FileLedger::open(&path)
            .unwrap()
            .with_lock_timeout(2, Duration::from_millis(1));

        let holder = File::create(dir.path().join("ledger.jsonl.lock")).unwrap();
        FileExt::try_lock_exclusive(&holder).unwrap();
        assert!(matches!(
            ledger.lineage_history("checkout").await,
            Err(LedgerError::LockTimeout(_))
        ));

        // Closing the descriptor is what process exit does.
        drop(holder);
        assert!(ledger.lineage_history("checkout").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn corrupt_lines_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");
        std::fs::write(&path, "{not json}\n").unwrap();
        let ledger = FileLedger::open(&path).unwrap();
        assert!(matches!(
            ledger.lineage_history("checkout").await,
            Err(LedgerError::Corrupt { line: 1, .. })
        ));
    }
}

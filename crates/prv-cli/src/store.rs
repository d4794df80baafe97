//! On-disk persistence for the CLI: the ledger is kept as a JSON snapshot
//! and signing keys as hex files.
//!
//! Commands that change the ledger hold an exclusive `flock` on a sibling
//! `.lock` file from load to save, so two overlapping runs can never both
//! commit against the same snapshot.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use tracing::debug;

use prv_crypto::SigningKey;
use prv_ledger::{InMemoryLedger, LedgerConfig, LedgerSnapshot, SystemClock};

pub fn create_ledger(path: &Path, config: LedgerConfig, force: bool) -> anyhow::Result<InMemoryLedger> {
    let _lock = LedgerLock::acquire(path)?;
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    let ledger = InMemoryLedger::new(config);
    save_ledger(&ledger, path)?;
    Ok(ledger)
}

pub fn open_ledger(path: &Path, config: LedgerConfig) -> anyhow::Result<Arc<InMemoryLedger>> {
    if !path.exists() {
        bail!("no ledger at {}; run `prv init` first", path.display());
    }
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let snapshot: LedgerSnapshot = serde_json::from_str(&text)
        .with_context(|| format!("{} is not a ledger snapshot", path.display()))?;
    let ledger = InMemoryLedger::restore(config, Arc::new(SystemClock), snapshot)
        .with_context(|| format!("failed to restore {}", path.display()))?;
    debug!(path = %path.display(), slot = ledger.slot()?, "ledger opened");
    Ok(Arc::new(ledger))
}

/// Open the ledger for a read-modify-write. Fails at once if another run
/// holds it.
pub fn open_ledger_for_update(path: &Path, config: LedgerConfig) -> anyhow::Result<LockedLedger> {
    let lock = LedgerLock::acquire(path)?;
    let ledger = open_ledger(path, config)?;
    Ok(LockedLedger {
        ledger,
        path: path.to_path_buf(),
        _lock: lock,
    })
}

/// A ledger loaded under its lock. The lock is released on drop.
pub struct LockedLedger {
    pub ledger: Arc<InMemoryLedger>,
    path: PathBuf,
    _lock: LedgerLock,
}

impl LockedLedger {
    pub fn save(&self) -> anyhow::Result<()> {
        save_ledger(&self.ledger, &self.path)
    }
}

/// Exclusive advisory lock on `<ledger>.lock`.
#[derive(Debug)]
pub struct LedgerLock {
    _file: File,
}

impl LedgerLock {
    pub fn acquire(ledger_path: &Path) -> anyhow::Result<Self> {
        let path = lock_path(ledger_path);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        let acquired =
            try_flock_exclusive(&file).with_context(|| format!("failed to lock {}", path.display()))?;
        if !acquired {
            bail!(
                "{} is in use by another prv process; try again when it finishes",
                ledger_path.display()
            );
        }
        debug!(path = %path.display(), "ledger locked");
        Ok(Self { _file: file })
    }
}

fn lock_path(ledger_path: &Path) -> PathBuf {
    let mut name = ledger_path.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}

/// `Ok(false)` when another open file description holds the lock.
fn try_flock_exclusive(file: &File) -> io::Result<bool> {
    #[cfg(unix)]
    {
        use std::os::unix::io::AsRawFd;
        // SAFETY: the descriptor is owned by `file` and stays open for the call.
        let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
        if result == 0 {
            return Ok(true);
        }
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::WouldBlock {
            return Ok(false);
        }
        Err(err)
    }
    #[cfg(not(unix))]
    {
        let _ = file;
        Ok(true)
    }
}

/// Write through a sibling temp file so a crash never leaves half a ledger.
fn save_ledger(ledger: &InMemoryLedger, path: &Path) -> anyhow::Result<()> {
    let snapshot = ledger.snapshot()?;
    let json = serde_json::to_string_pretty(&snapshot)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).with_context(|| format!("failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("failed to replace {}", path.display()))?;
    debug!(path = %path.display(), slot = snapshot.slot, "ledger saved");
    Ok(())
}

pub fn write_key(key: &SigningKey, path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    fs::write(path, hex::encode(key.as_bytes()))
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

pub fn read_key(path: &Path) -> anyhow::Result<SigningKey> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read key {}; run `prv keygen` first", path.display()))?;
    SigningKey::from_hex(text.trim())
        .with_context(|| format!("{} does not hold a signing key", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_survives_a_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        create_ledger(&path, LedgerConfig::default(), false).unwrap();
        let ledger = open_ledger(&path, LedgerConfig::default()).unwrap();
        assert_eq!(ledger.slot().unwrap(), 0);
        assert!(!dir.path().join("ledger.json.tmp").exists());
    }

    #[test]
    fn create_refuses_to_clobber() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        create_ledger(&path, LedgerConfig::default(), false).unwrap();
        assert!(create_ledger(&path, LedgerConfig::default(), false).is_err());
        assert!(create_ledger(&path, LedgerConfig::default(), true).is_ok());
    }

    #[test]
    fn tampered_ledger_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        create_ledger(&path, LedgerConfig::default(), false).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        fs::write(&path, text.replace("\"slot\": 0", "\"slot\": 7")).unwrap();
        assert!(open_ledger(&path, LedgerConfig::default()).is_err());
    }

    #[test]
    fn keys_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("key.hex");
        let key = SigningKey::generate();
        write_key(&key, &path, false).unwrap();
        assert_eq!(read_key(&path).unwrap().creator_id(), key.creator_id());
        assert!(write_key(&key, &path, false).is_err());
    }

    #[test]
    fn missing_ledger_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = open_ledger(&dir.path().join("nope.json"), LedgerConfig::default())
            .err()
            .unwrap();
        assert!(err.to_string().contains("prv init"));
    }

    #[test]
    fn overlapping_updates_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        create_ledger(&path, LedgerConfig::default(), false).unwrap();

        let first = open_ledger_for_update(&path, LedgerConfig::default()).unwrap();
        let err = open_ledger_for_update(&path, LedgerConfig::default())
            .err()
            .unwrap();
        assert!(err.to_string().contains("in use"), "{err}");
        assert!(create_ledger(&path, LedgerConfig::default(), true).is_err());

        drop(first);
        assert!(open_ledger_for_update(&path, LedgerConfig::default()).is_ok());
    }

    #[test]
    fn update_saves_under_the_lock() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        create_ledger(&path, LedgerConfig::default(), false).unwrap();

        let locked = open_ledger_for_update(&path, LedgerConfig::default()).unwrap();
        locked.save().unwrap();
        assert!(dir.path().join("ledger.json.lock").exists());
        drop(locked);
        assert_eq!(open_ledger(&path, LedgerConfig::default()).unwrap().slot().unwrap(), 0);
    }
}

//! Lock Store: JSON lock files coordinating which session owns an issue.
//!
//! Creation is exclusive-create-by-rename (write to a temp file, then
//! `persist_noclobber`, so two processes racing to create the same lock
//! never both succeed). Updates and releases read-modify-write under an
//! `fs2` advisory file lock on a sidecar `.lock`-suffixed file, closing the
//! TOCTOU window *within* one process's own lifetime; the spec accepts that
//! updates across sessions are not concurrent by construction.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fs2::FileExt;
use serde::{Deserialize, Serialize};

use crate::agent_id::AgentId;
use crate::utils::{get_now, now_iso8601, parse_iso8601};

pub const DEFAULT_STALE_THRESHOLD_SECONDS: u64 = 4 * 60 * 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockFile {
    pub session_id: String,
    pub acquired_at: String,
    #[serde(default)]
    pub worktrees: BTreeMap<String, String>,
}

/// One entry in [`LockStore::list`]'s output.
#[derive(Debug, Clone, Serialize)]
pub struct LockEntry {
    pub issue_id: String,
    pub session_id: String,
    pub age_seconds: u64,
    pub worktrees: BTreeMap<String, AgentId>,
}

pub enum AcquireResult {
    Acquired,
    Contested { holder_session_id: String },
}

pub struct LockStore {
    locks_dir: PathBuf,
    stale_threshold_seconds: u64,
}

impl LockStore {
    pub fn new(repo_root: &Path) -> Self {
        LockStore {
            locks_dir: repo_root.join(".claude/cat/locks"),
            stale_threshold_seconds: DEFAULT_STALE_THRESHOLD_SECONDS,
        }
    }

    pub fn with_stale_threshold(mut self, seconds: u64) -> Self {
        self.stale_threshold_seconds = seconds;
        self
    }

    fn lock_path(&self, issue_id: &str) -> PathBuf {
        self.locks_dir.join(format!("{issue_id}.lock"))
    }

    fn sidecar_path(&self, issue_id: &str) -> PathBuf {
        self.locks_dir.join(format!("{issue_id}.lock.filelock"))
    }

    /// Create `{issueId}.lock` atomically. A non-stale existing lock is
    /// reported as `Contested`; a stale one is treated as absent and
    /// overwritten.
    pub fn acquire(&self, issue_id: &str, session_id: &str) -> Result<AcquireResult> {
        fs::create_dir_all(&self.locks_dir)
            .with_context(|| format!("creating {}", self.locks_dir.display()))?;

        let path = self.lock_path(issue_id);
        if let Some(existing) = self.read(issue_id)? {
            if !self.is_stale(&existing) {
                return Ok(AcquireResult::Contested {
                    holder_session_id: existing.session_id,
                });
            }
            // Stale: remove before the exclusive-create attempt below.
            let _ = fs::remove_file(&path);
        }

        let lock = LockFile {
            session_id: session_id.to_string(),
            acquired_at: now_iso8601(),
            worktrees: BTreeMap::new(),
        };

        match self.create_exclusive(&path, &lock) {
            Ok(()) => Ok(AcquireResult::Acquired),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                // Lost the race to another process between our staleness
                // check and our create attempt.
                let holder = self
                    .read(issue_id)?
                    .map(|l| l.session_id)
                    .unwrap_or_else(|| "unknown".to_string());
                Ok(AcquireResult::Contested {
                    holder_session_id: holder,
                })
            }
            Err(e) => Err(e).with_context(|| format!("creating lock for {issue_id}")),
        }
    }

    fn create_exclusive(&self, path: &Path, lock: &LockFile) -> std::io::Result<()> {
        let dir = path.parent().expect("lock path has a parent");
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        let body = serde_json::to_vec_pretty(lock).expect("LockFile always serializes");
        tmp.write_all(&body)?;
        tmp.flush()?;
        tmp.persist_noclobber(path)
            .map(|_| ())
            .map_err(|e| e.error)
    }

    /// Merge `{worktreePath: agentId}` into the caller's own lock.
    pub fn update(
        &self,
        issue_id: &str,
        session_id: &str,
        worktree_path: &str,
        agent_id: &AgentId,
    ) -> Result<()> {
        self.with_file_lock(issue_id, |lock| {
            if lock.session_id != session_id {
                anyhow::bail!(
                    "lock for {issue_id} is owned by {}, not {session_id}",
                    lock.session_id
                );
            }
            lock.worktrees
                .insert(worktree_path.to_string(), agent_id.to_string());
            Ok(())
        })
    }

    /// Delete the lock iff owned by `session_id`. Idempotent: a missing
    /// lock is not an error.
    pub fn release(&self, issue_id: &str, session_id: &str) -> Result<()> {
        let path = self.lock_path(issue_id);
        let Some(existing) = self.read(issue_id)? else {
            return Ok(());
        };
        if existing.session_id != session_id {
            anyhow::bail!(
                "lock for {issue_id} is owned by {}, not {session_id}",
                existing.session_id
            );
        }
        remove_if_present(&path)?;
        remove_if_present(&self.sidecar_path(issue_id))?;
        Ok(())
    }

    /// Delete the lock regardless of owner. Used only by the cleanup command.
    pub fn force_release(&self, issue_id: &str) -> Result<()> {
        remove_if_present(&self.lock_path(issue_id))?;
        remove_if_present(&self.sidecar_path(issue_id))?;
        Ok(())
    }

    /// Every lock's summary. Malformed lock files are skipped (logged at
    /// debug level), not surfaced as an error.
    pub fn list(&self) -> Result<Vec<LockEntry>> {
        let mut out = Vec::new();
        let Ok(entries) = fs::read_dir(&self.locks_dir) else {
            return Ok(out);
        };

        for entry in entries {
            let entry = entry.context("reading locks directory entry")?;
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(issue_id) = name.strip_suffix(".lock") else {
                continue;
            };

            match self.read(issue_id) {
                Ok(Some(lock)) => {
                    let worktrees = lock
                        .worktrees
                        .iter()
                        .filter_map(|(path, agent)| {
                            agent.parse::<AgentId>().ok().map(|a| (path.clone(), a))
                        })
                        .collect();
                    out.push(LockEntry {
                        issue_id: issue_id.to_string(),
                        age_seconds: self.age_seconds(&lock),
                        session_id: lock.session_id,
                        worktrees,
                    });
                }
                Ok(None) => {}
                Err(e) => {
                    log::debug!("skipping malformed lock {}: {e}", path.display());
                }
            }
        }

        out.sort_by(|a, b| a.issue_id.cmp(&b.issue_id));
        Ok(out)
    }

    /// Read and parse one lock file, returning `None` if absent.
    pub fn read(&self, issue_id: &str) -> Result<Option<LockFile>> {
        let path = self.lock_path(issue_id);
        match fs::read_to_string(&path) {
            Ok(contents) => {
                let lock = serde_json::from_str(&contents)
                    .with_context(|| format!("parsing lock file {}", path.display()))?;
                Ok(Some(lock))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("reading lock file {}", path.display())),
        }
    }

    pub fn is_stale(&self, lock: &LockFile) -> bool {
        is_stale(lock, get_now(), self.stale_threshold_seconds)
    }

    fn age_seconds(&self, lock: &LockFile) -> u64 {
        let acquired = parse_iso8601(&lock.acquired_at).unwrap_or(0);
        get_now().saturating_sub(acquired)
    }

    fn with_file_lock(
        &self,
        issue_id: &str,
        mutate: impl FnOnce(&mut LockFile) -> Result<()>,
    ) -> Result<()> {
        fs::create_dir_all(&self.locks_dir)?;
        let sidecar = self.sidecar_path(issue_id);
        let file = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&sidecar)
            .with_context(|| format!("opening lock sidecar {}", sidecar.display()))?;
        file.lock_exclusive()
            .with_context(|| format!("locking {}", sidecar.display()))?;

        let path = self.lock_path(issue_id);
        let mut lock: LockFile = {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("reading lock file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("parsing lock file {}", path.display()))?
        };

        mutate(&mut lock)?;

        let body = serde_json::to_vec_pretty(&lock)?;
        let dir = path.parent().expect("lock path has a parent");
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&body)?;
        tmp.flush()?;
        tmp.persist(&path)?;

        FileExt::unlock(&file)?;
        Ok(())
    }
}

fn is_stale(lock: &LockFile, now: u64, threshold_seconds: u64) -> bool {
    let acquired = match parse_iso8601(&lock.acquired_at) {
        Some(t) => t,
        None => return true,
    };
    now.saturating_sub(acquired) > threshold_seconds
}

fn remove_if_present(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("removing {}", path.display())),
    }
}

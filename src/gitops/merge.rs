//! `merge-and-cleanup`: fast-forward the completed issue branch into the
//! base branch and tear down its worktree and lock.

use std::path::Path;
use std::process::Command;
use std::thread::sleep;
use std::time::{Duration, Instant};

use anyhow::Result;

use crate::errors::CatError;
use crate::lock::LockStore;
use crate::process::{run, run_git, run_git_check};
use crate::repository::Repository;

const RETRY_ATTEMPTS: u32 = 3;
const RETRY_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub issue_id: String,
    pub target_branch: String,
    pub merged_commit: String,
    pub lock_released: bool,
    pub duration_seconds: f64,
}

pub fn merge_and_cleanup(
    repo: &Repository,
    locks: &LockStore,
    issue_id: &str,
    base_branch: &str,
    session_id: &str,
) -> Result<MergeOutcome, CatError> {
    let t0 = Instant::now();
    let to_error = |e: anyhow::Error| CatError::other(e.to_string());

    // 1. Locate worktree.
    let worktree_path = repo.worktree_path(issue_id);
    if !repo.worktree_exists(issue_id) {
        return Err(CatError::other(format!("no worktree found for {issue_id}")));
    }

    // 2. Refuse if dirty.
    if repo.is_dirty(&worktree_path).map_err(to_error)? {
        return Err(CatError::other(format!("worktree for {issue_id} is dirty")));
    }

    // 3. Sync base with origin.
    with_retry(|| {
        run_git(repo.root(), &["fetch", "origin", base_branch])?;
        run_git(repo.root(), &["merge", "--ff-only", &format!("origin/{base_branch}")])?;
        Ok(())
    })
    .map_err(to_error)?;

    // 4. Rebase the issue branch onto the updated base if diverged.
    let merge_base = run_git(&worktree_path, &["merge-base", base_branch, issue_id]).map_err(to_error)?;
    let base_head = run_git(repo.root(), &["rev-parse", base_branch]).map_err(to_error)?;
    if merge_base != base_head {
        let mut cmd = Command::new("git");
        cmd.current_dir(&worktree_path)
            .args(["rebase", "--onto", base_branch, &merge_base, issue_id]);
        let result = run(&mut cmd, Some("git")).map_err(to_error)?;
        if !result.success() {
            let _ = run_git(&worktree_path, &["rebase", "--abort"]);
            return Err(CatError::other(format!(
                "rebase of {issue_id} onto {base_branch} conflicted"
            )));
        }
    }

    // 5. Verify fast-forward is now possible.
    let can_ff = run_git_check(
        &worktree_path,
        &["merge-base", "--is-ancestor", base_branch, issue_id],
    )
    .unwrap_or(false);
    if !can_ff {
        return Err(CatError::other(format!(
            "{issue_id} cannot be fast-forwarded onto {base_branch}"
        )));
    }

    // 6. Fast-forward merge in the main worktree.
    with_retry(|| {
        run_git(repo.root(), &["merge", "--ff-only", issue_id])?;
        Ok(())
    })
    .map_err(to_error)?;
    let merged_commit = run_git(repo.root(), &["rev-parse", "HEAD"]).map_err(to_error)?;

    // 7. Remove worktree, delete branch, release lock.
    repo.remove_worktree(&worktree_path, true).map_err(to_error)?;
    repo.delete_branch(issue_id).map_err(to_error)?;
    locks.release(issue_id, session_id).map_err(to_error)?;

    Ok(MergeOutcome {
        issue_id: issue_id.to_string(),
        target_branch: base_branch.to_string(),
        merged_commit,
        lock_released: true,
        duration_seconds: t0.elapsed().as_secs_f64(),
    })
}

fn with_retry(mut op: impl FnMut() -> Result<()>) -> Result<()> {
    let mut last_err = None;
    for attempt in 0..RETRY_ATTEMPTS {
        match op() {
            Ok(()) => return Ok(()),
            Err(e) => {
                let contested = e.to_string().contains("index.lock");
                last_err = Some(e);
                if !contested || attempt + 1 == RETRY_ATTEMPTS {
                    break;
                }
                sleep(RETRY_BACKOFF);
            }
        }
    }
    Err(last_err.expect("loop always runs at least once"))
}

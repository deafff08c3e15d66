//! `rebase-safe`: rebase onto a target with a backup branch and explicit
//! conflict reporting instead of leaving the tree mid-rebase.

use std::path::Path;
use std::process::Command;

use anyhow::Result;

use crate::errors::CatError;
use crate::process::{run, run_checked, run_git, run_git_check};
use crate::utils::now_iso8601;

#[derive(Debug, Clone)]
pub enum RebaseOutcome {
    Ok {
        target: String,
        commits_rebased: usize,
        backup_cleaned: bool,
    },
}

pub fn rebase_safe(
    cwd: &Path,
    target: Option<&str>,
    branch_point_file: &Path,
) -> Result<RebaseOutcome, CatError> {
    let to_error = |e: anyhow::Error| CatError::other(e.to_string());

    // 1. Resolve target.
    let target = match target {
        Some(t) => t.to_string(),
        None => std::fs::read_to_string(branch_point_file)
            .map(|s| s.trim().to_string())
            .map_err(|e| CatError::other(format!("reading fork-point: {e}")))?,
    };

    // 2. Create backup branch.
    let backup_branch = format!("backup-before-rebase-{}", timestamp());
    run_git(cwd, &["branch", &backup_branch]).map_err(to_error)?;

    // 3. Rebase.
    let mut cmd = Command::new("git");
    cmd.current_dir(cwd).arg("rebase").arg(&target);
    let result = run(&mut cmd, Some("git")).map_err(|e| CatError::other(e.to_string()))?;

    if !result.success() {
        let conflicted = run_git(cwd, &["diff", "--name-only", "--diff-filter=U"])
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>();
        let _ = run_git(cwd, &["rebase", "--abort"]);

        if !conflicted.is_empty() {
            return Err(CatError::Conflict {
                target,
                backup_branch,
                files: conflicted,
            });
        }
        return Err(CatError::other(format!(
            "rebase onto {target} failed with no conflicted files; backup preserved at {backup_branch}"
        )));
    }

    // 4. Verify no content change vs. backup.
    let unchanged = run_git_check(cwd, &["diff", "--quiet", &backup_branch, "HEAD"]).unwrap_or(false);
    if !unchanged {
        let diffstat = run_git(cwd, &["diff", "--stat", &backup_branch, "HEAD"]).unwrap_or_default();
        return Err(CatError::other(format!(
            "rebase onto {target} changed content vs. backup {backup_branch}:\n{diffstat}"
        )));
    }

    // 5. Count commits rebased, delete backup.
    let count_output = run_git(cwd, &["rev-list", "--count", &format!("{target}..HEAD")])
        .map_err(to_error)?;
    let commits_rebased: usize = count_output
        .trim()
        .parse()
        .map_err(|_| CatError::other("parsing rev-list --count output"))?;

    let mut delete_cmd = Command::new("git");
    delete_cmd.current_dir(cwd).args(["branch", "-D", &backup_branch]);
    run_checked(&mut delete_cmd, Some("git")).map_err(to_error)?;

    Ok(RebaseOutcome::Ok {
        target,
        commits_rebased,
        backup_cleaned: true,
    })
}

fn timestamp() -> String {
    let digits: String = now_iso8601().chars().filter(|c| c.is_ascii_digit()).take(14).collect();
    let (date, time) = digits.split_at(8.min(digits.len()));
    format!("{date}-{time}")
}

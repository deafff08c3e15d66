//! Thin wrapper over the `git` plumbing the rest of the crate needs:
//! resolving the repository root, the worktree/branch layout under
//! `.claude/cat/`, and a handful of read-only queries used by the
//! Scheduler, Worktree Provisioner, and Git Safety Operators.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::process::{run_git, run_git_check, run_git_single_line};

pub struct Repository {
    /// The main worktree root (contains `.git` as a directory).
    root: PathBuf,
}

impl Repository {
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Repository { root: root.into() }
    }

    /// Discover the repository root by walking upward from `start` until a
    /// `.git` directory is found.
    pub fn discover(start: &Path) -> Result<Self> {
        let mut dir = start.to_path_buf();
        loop {
            if dir.join(".git").is_dir() {
                return Ok(Repository::at(dir));
            }
            if !dir.pop() {
                anyhow::bail!("no .git directory found above {}", start.display());
            }
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn cat_dir(&self) -> PathBuf {
        self.root.join(".claude/cat")
    }

    pub fn worktrees_dir(&self) -> PathBuf {
        self.cat_dir().join("worktrees")
    }

    pub fn worktree_path(&self, branch: &str) -> PathBuf {
        self.worktrees_dir().join(branch)
    }

    pub fn worktree_exists(&self, branch: &str) -> bool {
        self.worktree_path(branch).join(".git").exists()
    }

    pub fn branch_exists(&self, branch: &str) -> Result<bool> {
        run_git_check(
            &self.root,
            &["show-ref", "--verify", "--quiet", &format!("refs/heads/{branch}")],
        )
    }

    pub fn head(&self, cwd: &Path) -> Result<String> {
        run_git_single_line(cwd, &["rev-parse", "HEAD"])
    }

    pub fn current_branch(&self, cwd: &Path) -> Result<String> {
        run_git_single_line(cwd, &["rev-parse", "--abbrev-ref", "HEAD"])
    }

    pub fn create_worktree(&self, branch: &str, path: &Path, base: &str) -> Result<()> {
        if self.branch_exists(branch)? {
            run_git(&self.root, &["branch", "-D", branch])
                .with_context(|| format!("deleting stale branch {branch}"))?;
        }
        run_git(
            &self.root,
            &[
                "worktree",
                "add",
                "-b",
                branch,
                &path.to_string_lossy(),
                base,
            ],
        )
        .with_context(|| format!("creating worktree for {branch}"))?;
        Ok(())
    }

    pub fn remove_worktree(&self, path: &Path, force: bool) -> Result<()> {
        let path_str = path.to_string_lossy().to_string();
        let mut args = vec!["worktree", "remove"];
        if force {
            args.push("--force");
        }
        args.push(&path_str);
        run_git(&self.root, &args).with_context(|| format!("removing worktree {}", path.display()))?;
        Ok(())
    }

    pub fn delete_branch(&self, branch: &str) -> Result<()> {
        run_git(&self.root, &["branch", "-D", branch])
            .with_context(|| format!("deleting branch {branch}"))?;
        Ok(())
    }

    /// `cat-branch-point` sidecar file path for a worktree branch.
    pub fn branch_point_file(&self, branch: &str) -> PathBuf {
        self.root
            .join(".git/worktrees")
            .join(branch)
            .join("cat-branch-point")
    }

    pub fn record_branch_point(&self, branch: &str, commit: &str) -> Result<()> {
        let path = self.branch_point_file(branch);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        std::fs::write(&path, commit).with_context(|| format!("writing {}", path.display()))
    }

    pub fn read_branch_point(&self, branch: &str) -> Result<String> {
        std::fs::read_to_string(self.branch_point_file(branch))
            .map(|s| s.trim().to_string())
            .with_context(|| format!("reading fork-point for {branch}"))
    }

    /// Commits on `branch` ahead of `base`, newest first, up to `limit` oneline summaries.
    pub fn commits_ahead(&self, worktree: &Path, base: &str, limit: usize) -> Result<Vec<String>> {
        let output = run_git(
            worktree,
            &["log", "--oneline", &format!("{base}..HEAD"), &format!("-{limit}")],
        )?;
        Ok(output.lines().map(str::to_string).filter(|l| !l.is_empty()).collect())
    }

    pub fn count_commits_ahead(&self, worktree: &Path, base: &str) -> Result<usize> {
        let output = run_git(worktree, &["rev-list", "--count", &format!("{base}..HEAD")])?;
        output.trim().parse().context("parsing rev-list --count output")
    }

    pub fn is_dirty(&self, worktree: &Path) -> Result<bool> {
        let output = run_git(worktree, &["status", "--porcelain"])?;
        Ok(!output.trim().is_empty())
    }

    /// `git log --grep=<slug>` on `base`, returning matching subject lines.
    pub fn log_grep(&self, base: &str, pattern: &str) -> Result<Vec<String>> {
        let output = run_git(&self.root, &["log", base, "--oneline", &format!("--grep={pattern}")])?;
        Ok(output.lines().map(str::to_string).filter(|l| !l.is_empty()).collect())
    }

    /// `(commit, files touched)` for the last `count` commits on `base`.
    pub fn recent_commits_with_files(&self, base: &str, count: usize) -> Result<Vec<(String, Vec<String>)>> {
        let output = run_git(
            &self.root,
            &["log", base, &format!("-{count}"), "--name-only", "--format=%H"],
        )?;

        let mut commits = Vec::new();
        let mut current: Option<(String, Vec<String>)> = None;
        for line in output.lines() {
            if line.len() == 40 && line.chars().all(|c| c.is_ascii_hexdigit()) {
                if let Some(c) = current.take() {
                    commits.push(c);
                }
                current = Some((line.to_string(), Vec::new()));
            } else if !line.trim().is_empty() {
                if let Some((_, files)) = current.as_mut() {
                    files.push(line.trim().to_string());
                }
            }
        }
        if let Some(c) = current {
            commits.push(c);
        }
        Ok(commits)
    }
}

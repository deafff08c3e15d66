//! Argument parsing for the `catctl` binary: one subcommand per principal
//! command named in the external interface, plus the two dispatch points
//! (`hook`, `skill-output`) the host invokes directly.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "catctl", version, about = "Issue-by-issue development loop orchestrator")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Schedule the next executable issue and provision its worktree
    WorkPrepare {
        /// Qualified id or bare name; omit to schedule from all open issues
        issue: Option<String>,

        /// Glob excluded from scheduling when `issue` is omitted
        #[arg(long)]
        exclude: Option<String>,

        /// Branch the new worktree forks from
        #[arg(long, default_value = "main")]
        base_branch: String,

        /// Override the default token-budget ceiling
        #[arg(long)]
        token_limit: Option<u64>,
    },

    /// Report existing-work and suspicious-commit diagnostics for an
    /// already-provisioned worktree, without provisioning again
    ExistingWorkChecker {
        /// Issue whose worktree to inspect
        issue: String,

        #[arg(long, default_value = "main")]
        base_branch: String,
    },

    /// Amend HEAD, refusing when the commit has already been pushed
    GitAmendSafe {
        #[arg(long)]
        message: Option<String>,

        #[arg(long)]
        no_edit: bool,
    },

    /// Rebase the current worktree onto its recorded fork-point (or an
    /// explicit target), backing up the prior tip first
    GitRebaseSafe {
        /// Explicit rebase target; defaults to the branch's recorded fork-point
        target: Option<String>,

        /// Issue branch whose `cat-branch-point` sidecar to read/update
        #[arg(long)]
        branch: String,
    },

    /// Fast-forward a completed issue branch into its base and tear down
    /// the worktree and lock
    MergeAndCleanup {
        issue: String,

        #[arg(long, default_value = "main")]
        base_branch: String,
    },

    /// Inspect or mutate the issue lock table directly
    IssueLock {
        #[command(subcommand)]
        action: IssueLockAction,
    },

    /// Write the statusline entry into the project's Claude settings
    StatuslineInstall,

    /// Register a `catctl hook <event>` invocation for a lifecycle event
    RegisterHook {
        /// Lifecycle event name as the host names it (e.g. `PreToolUse`)
        event: String,
    },

    /// Read a batch of files, returning `{path: contents}`, skipping any
    /// that don't exist
    BatchRead {
        paths: Vec<String>,
    },

    /// Run the Hook Envelope for one lifecycle event, reading `HookInput`
    /// JSON from stdin and writing a `HookResponse` to stdout
    Hook {
        /// One of the dispatcher-wired event names (see `hook::dispatcher_for`)
        event: String,
    },

    /// Render a dotted skill-output type (`status`, `config.trust`, …)
    SkillOutput {
        args: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum IssueLockAction {
    Acquire { issue: String },
    Release { issue: String },
    ForceRelease { issue: String },
    Update {
        issue: String,
        worktree_path: String,
        agent_id: String,
    },
    List,
}

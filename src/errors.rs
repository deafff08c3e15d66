//! Structured error type for results that carry a `status` tag a caller must
//! surface to the user, plus a couple of process-wide error helpers.
//!
//! Most fallible code in this crate returns `anyhow::Result`; `CatError` is
//! reserved for the subset of failures that need a stable `status` string in
//! JSON output or a hand-written `Display` message (the "UserFixable" and
//! "Transient" categories from the error handling design).

use std::fmt;

/// Errors with a stable `status` tag, surfaced verbatim to the calling
/// assistant in JSON responses.
#[derive(Debug)]
pub enum CatError {
    /// A plan's token estimate exceeds the configured hard limit.
    Oversized { estimated_tokens: u64, limit: u64 },
    /// The target issue's lock is held by another session.
    Locked { issue_id: String, holder: String },
    /// A rebase hit conflicts; the backup branch is preserved.
    Conflict {
        target: String,
        backup_branch: String,
        files: Vec<String>,
    },
    /// `amend-safe` refused because HEAD was already pushed.
    AlreadyPushed { head: String },
    /// `amend-safe` detected the remote advanced past `OLD_HEAD` between the
    /// read and the amend commit.
    RaceDetected {
        old_head: String,
        new_head: String,
        recovery: String,
    },
    /// Scope ALL scheduling found nothing executable.
    NoIssues {
        blocked_issues: Vec<String>,
        locked_issues: Vec<String>,
        circular_dependencies: Vec<String>,
        closed_count: usize,
        total_count: usize,
    },
    /// A command-line argument violated a precondition the caller should
    /// have never been able to trigger (null/blank/negative inputs).
    InvariantViolation { message: String },
    /// Wraps an arbitrary lower-level failure that still needs a `status` of
    /// `ERROR` in JSON output.
    Other { message: String },
    /// A child process could not be spawned, or a filesystem operation
    /// failed in a way the caller must report rather than silently skip.
    Io {
        context: String,
        source: std::io::Error,
    },
}

impl CatError {
    /// The stable machine-readable tag placed in JSON error payloads.
    pub fn status(&self) -> &'static str {
        match self {
            CatError::Oversized { .. } => "OVERSIZED",
            CatError::Locked { .. } => "LOCKED",
            CatError::Conflict { .. } => "CONFLICT",
            CatError::AlreadyPushed { .. } => "ALREADY_PUSHED",
            CatError::RaceDetected { .. } => "RACE_DETECTED",
            CatError::NoIssues { .. } => "NO_ISSUES",
            CatError::InvariantViolation { .. } => "ERROR",
            CatError::Other { .. } => "ERROR",
            CatError::Io { .. } => "ERROR",
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        CatError::Other {
            message: message.into(),
        }
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        CatError::InvariantViolation {
            message: message.into(),
        }
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        CatError::Io {
            context: context.into(),
            source,
        }
    }

    /// Render as a JSON object with `status` and `message` fields, the
    /// user-visible failure shape mandated by the error handling design.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "status": self.status(),
            "message": self.to_string(),
        })
    }
}

impl fmt::Display for CatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use crate::styling::{ERROR_EMOJI, HINT_EMOJI, format_with_gutter};

        match self {
            CatError::Oversized {
                estimated_tokens,
                limit,
            } => write!(
                f,
                "{ERROR_EMOJI} plan estimated at {estimated_tokens} tokens, exceeding the {limit}-token limit"
            ),
            CatError::Locked { issue_id, holder } => {
                write!(f, "{ERROR_EMOJI} issue {issue_id} is locked by session {holder}")
            }
            CatError::Conflict {
                target,
                backup_branch,
                files,
            } => {
                write!(
                    f,
                    "{ERROR_EMOJI} rebase onto {target} conflicted in {} file(s):\n",
                    files.len()
                )?;
                write!(f, "{}", format_with_gutter(&files.join("\n")))?;
                write!(f, "\n{HINT_EMOJI} backup preserved at {backup_branch}")
            }
            CatError::AlreadyPushed { head } => {
                write!(f, "{ERROR_EMOJI} HEAD ({head}) is already pushed; amend refused")
            }
            CatError::RaceDetected {
                old_head,
                new_head,
                recovery,
            } => write!(
                f,
                "{ERROR_EMOJI} remote advanced past {old_head} before the amend landed at {new_head}\n{HINT_EMOJI} recover with: {recovery}"
            ),
            CatError::NoIssues {
                blocked_issues,
                locked_issues,
                circular_dependencies,
                closed_count,
                total_count,
            } => write!(
                f,
                "{ERROR_EMOJI} no executable issue found ({closed_count}/{total_count} closed; {} blocked, {} locked, {} cyclic)",
                blocked_issues.len(),
                locked_issues.len(),
                circular_dependencies.len()
            ),
            CatError::InvariantViolation { message } => {
                write!(f, "{ERROR_EMOJI} invariant violation: {message}")
            }
            CatError::Other { message } => write!(f, "{ERROR_EMOJI} {message}"),
            CatError::Io { context, source } => write!(f, "{ERROR_EMOJI} {context}: {source}"),
        }
    }
}

impl std::error::Error for CatError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CatError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

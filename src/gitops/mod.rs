//! Git Safety Operators: three idempotent state machines over plumbing
//! git commands, each returning a structured result instead of raising.

pub mod amend;
pub mod merge;
pub mod rebase;

pub use amend::{AmendInput, AmendOutcome, amend_safe};
pub use merge::{MergeOutcome, merge_and_cleanup};
pub use rebase::{RebaseOutcome, rebase_safe};

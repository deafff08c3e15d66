pub mod concatenated_commit;
pub mod rebase_target;
pub mod session_restore;
pub mod skill_marker;
pub mod status_output;
pub mod unsafe_removal;
pub mod worktree_isolation;

pub use concatenated_commit::DetectConcatenatedCommit;
pub use rebase_target::ValidateRebaseTarget;
pub use session_restore::RestoreWorktreeOnResume;
pub use skill_marker::ClearSkillMarker;
pub use status_output::EnforceStatusOutput;
pub use unsafe_removal::UnsafeRemovalGuard;
pub use worktree_isolation::EnforceWorktreePathIsolation;

//! Session Directory: transient per-session scratch state kept outside
//! the repository, under the host config root —
//! `{host_config_root}/projects/-workspace/{session-id}/`.

use std::path::{Path, PathBuf};

/// Default host config root: `~/.claude`. Callers that already know the
/// plugin root (e.g. from `CLAUDE_PLUGIN_ROOT`) should pass it explicitly
/// instead of relying on this.
pub fn default_host_config_root() -> PathBuf {
    crate::path::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".claude")
}

pub fn session_dir(host_config_root: &Path, session_id: &str) -> PathBuf {
    host_config_root.join("projects").join("-workspace").join(session_id)
}

pub fn skill_marker_path(host_config_root: &Path, session_id: &str, agent_id: &str) -> PathBuf {
    session_dir(host_config_root, session_id).join(format!("skills-loaded-{agent_id}"))
}

pub fn terminal_warning_path(host_config_root: &Path, session_id: &str) -> PathBuf {
    session_dir(host_config_root, session_id).join("terminal-warning-emitted")
}

pub fn failure_count_path(host_config_root: &Path, session_id: &str, tool: &str) -> PathBuf {
    session_dir(host_config_root, session_id).join(format!("failure-count-{tool}"))
}

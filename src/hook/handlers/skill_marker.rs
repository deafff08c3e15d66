//! SessionStart / SubagentStart: clear the skill-load marker for a fresh
//! agent so the skill preprocessor reloads for it. A resumed session keeps
//! its markers — skills already loaded stay loaded.

use std::path::PathBuf;

use crate::agent_id::AgentId;
use crate::hook::{HandlerOutput, HookInput};

pub struct ClearSkillMarker {
    host_config_root: PathBuf,
}

impl ClearSkillMarker {
    pub fn new() -> Self {
        ClearSkillMarker {
            host_config_root: crate::session::default_host_config_root(),
        }
    }

    pub fn with_host_config_root(host_config_root: PathBuf) -> Self {
        ClearSkillMarker { host_config_root }
    }
}

impl Default for ClearSkillMarker {
    fn default() -> Self {
        ClearSkillMarker::new()
    }
}

impl crate::hook::Handler for ClearSkillMarker {
    fn name(&self) -> &'static str {
        "clear-skill-marker"
    }

    fn handle(&self, input: &HookInput) -> anyhow::Result<HandlerOutput> {
        if !matches!(input.hook_event_name.as_str(), "SessionStart" | "SubagentStart") {
            return Ok(HandlerOutput::allow());
        }
        if input.hook_event_name == "SessionStart" && input.source.as_deref() == Some("resume") {
            return Ok(HandlerOutput::allow());
        }

        let agent_id = resolve_agent_id(input);
        let marker = crate::session::skill_marker_path(&self.host_config_root, &input.session_id, &agent_id.to_string());

        match std::fs::remove_file(&marker) {
            Ok(()) => Ok(HandlerOutput::allow()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HandlerOutput::allow()),
            Err(e) => Ok(HandlerOutput::warn(format!("failed to clear skill marker: {e}"))),
        }
    }
}

fn resolve_agent_id(input: &HookInput) -> AgentId {
    match input.extra.get("agent_id").and_then(|v| v.as_str()) {
        Some(sub) => AgentId::subagent(input.session_id.clone(), sub),
        None => AgentId::main(input.session_id.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hook::Handler;
    use tempfile::TempDir;

    fn input(event: &str, session_id: &str, source: Option<&str>, agent_id: Option<&str>) -> HookInput {
        let mut extra = serde_json::json!({});
        if let Some(agent_id) = agent_id {
            extra = serde_json::json!({ "agent_id": agent_id });
        }
        HookInput {
            hook_event_name: event.to_string(),
            session_id: session_id.to_string(),
            cwd: "/tmp".to_string(),
            source: source.map(str::to_string),
            tool_name: None,
            tool_input: None,
            extra,
        }
    }

    #[test]
    fn fresh_session_start_clears_main_agent_marker() {
        let root = TempDir::new().unwrap();
        let marker = crate::session::skill_marker_path(root.path(), "S1", "S1");
        std::fs::create_dir_all(marker.parent().unwrap()).unwrap();
        std::fs::write(&marker, "").unwrap();

        let handler = ClearSkillMarker::with_host_config_root(root.path().to_path_buf());
        handler.handle(&input("SessionStart", "S1", None, None)).unwrap();
        assert!(!marker.exists());
    }

    #[test]
    fn resumed_session_keeps_its_marker() {
        let root = TempDir::new().unwrap();
        let marker = crate::session::skill_marker_path(root.path(), "S1", "S1");
        std::fs::create_dir_all(marker.parent().unwrap()).unwrap();
        std::fs::write(&marker, "").unwrap();

        let handler = ClearSkillMarker::with_host_config_root(root.path().to_path_buf());
        handler
            .handle(&input("SessionStart", "S1", Some("resume"), None))
            .unwrap();
        assert!(marker.exists());
    }

    #[test]
    fn subagent_start_clears_its_own_marker() {
        let root = TempDir::new().unwrap();
        let marker = crate::session::skill_marker_path(root.path(), "S1", "S1/subagents/7");
        std::fs::create_dir_all(marker.parent().unwrap()).unwrap();
        std::fs::write(&marker, "").unwrap();

        let handler = ClearSkillMarker::with_host_config_root(root.path().to_path_buf());
        handler
            .handle(&input("SubagentStart", "S1", None, Some("7")))
            .unwrap();
        assert!(!marker.exists());
    }

    #[test]
    fn missing_marker_is_not_an_error() {
        let root = TempDir::new().unwrap();
        let handler = ClearSkillMarker::with_host_config_root(root.path().to_path_buf());
        let out = handler.handle(&input("SessionStart", "S1", None, None)).unwrap();
        assert!(out.warning.is_none());
    }
}

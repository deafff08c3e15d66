//! Stop: verify the assistant's final message carries the verbatim status
//! box whenever `/cat:status` was invoked this turn. First violation blocks
//! with guidance; a second consecutive violation blocks tersely — no more
//! chances once the failure counter has already fired once.

use std::path::PathBuf;

use serde_json::Value;

use crate::hook::{HandlerOutput, HookInput};

const STATUS_TRIGGER: &str = "/cat:status";
const STATUS_MARKER: &str = "<output type=\"status\">";
const FAILURE_COUNTER: &str = "status-output";

pub struct EnforceStatusOutput {
    host_config_root: PathBuf,
}

impl EnforceStatusOutput {
    pub fn new() -> Self {
        EnforceStatusOutput {
            host_config_root: crate::session::default_host_config_root(),
        }
    }

    pub fn with_host_config_root(host_config_root: PathBuf) -> Self {
        EnforceStatusOutput { host_config_root }
    }
}

impl Default for EnforceStatusOutput {
    fn default() -> Self {
        EnforceStatusOutput::new()
    }
}

impl crate::hook::Handler for EnforceStatusOutput {
    fn name(&self) -> &'static str {
        "enforce-status-output"
    }

    fn handle(&self, input: &HookInput) -> anyhow::Result<HandlerOutput> {
        if input.hook_event_name != "Stop" {
            return Ok(HandlerOutput::allow());
        }

        let Some(transcript_path) = input.extra.get("transcript_path").and_then(|v| v.as_str()) else {
            return Ok(HandlerOutput::allow());
        };
        let Ok(transcript) = std::fs::read_to_string(transcript_path) else {
            return Ok(HandlerOutput::allow());
        };

        if !transcript.contains(STATUS_TRIGGER) {
            return Ok(HandlerOutput::allow());
        }

        if last_assistant_text(&transcript).contains(STATUS_MARKER) {
            self.clear_failure_count(&input.session_id);
            return Ok(HandlerOutput::allow());
        }

        let count = self.bump_failure_count(&input.session_id)?;
        if count <= 1 {
            Ok(HandlerOutput::block(
                "the /cat:status skill was invoked but its status box is missing from your \
                 final message; include the verbatim <output type=\"status\"> block before stopping",
            ))
        } else {
            Ok(HandlerOutput::block(
                "status box is missing again after an earlier warning this session; stopping \
                 is refused until the verbatim status output is included",
            ))
        }
    }
}

fn last_assistant_text(transcript: &str) -> String {
    let mut last = String::new();
    for line in transcript.lines() {
        let Ok(value) = serde_json::from_str::<Value>(line) else {
            continue;
        };
        let Some(message) = value.get("message") else {
            continue;
        };
        if message.get("role").and_then(|r| r.as_str()) != Some("assistant") {
            continue;
        }
        if let Some(text) = extract_text(message) {
            last = text;
        }
    }
    last
}

fn extract_text(message: &Value) -> Option<String> {
    match message.get("content")? {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => {
            let mut out = String::new();
            for item in items {
                if item.get("type").and_then(|t| t.as_str()) == Some("text")
                    && let Some(text) = item.get("text").and_then(|t| t.as_str())
                {
                    out.push_str(text);
                }
            }
            Some(out)
        }
        _ => None,
    }
}

impl EnforceStatusOutput {
    fn bump_failure_count(&self, session_id: &str) -> anyhow::Result<u32> {
        let path = crate::session::failure_count_path(&self.host_config_root, session_id, FAILURE_COUNTER);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let current = std::fs::read_to_string(&path)
            .ok()
            .and_then(|s| s.trim().parse::<u32>().ok())
            .unwrap_or(0);
        let next = current + 1;
        std::fs::write(&path, next.to_string())?;
        Ok(next)
    }

    fn clear_failure_count(&self, session_id: &str) {
        let path = crate::session::failure_count_path(&self.host_config_root, session_id, FAILURE_COUNTER);
        let _ = std::fs::remove_file(path);
    }
}

//! Hook Envelope + Dispatcher: the glue between the host's lifecycle
//! events (JSON on stdin) and the Safety Handlers chain.

pub mod dispatcher;
pub mod handlers;
pub mod rules;

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use dispatcher::{AggregationPolicy, Dispatcher, Event};

/// Build the dispatcher registered for one lifecycle event name, matching
/// the static chains named in the Safety Handlers design: `None` for an
/// event name the registry doesn't recognize.
pub fn dispatcher_for(event_name: &str) -> Option<Dispatcher> {
    use handlers::{
        ClearSkillMarker, DetectConcatenatedCommit, EnforceStatusOutput,
        EnforceWorktreePathIsolation, RestoreWorktreeOnResume, UnsafeRemovalGuard,
        ValidateRebaseTarget,
    };

    let dispatcher = match event_name {
        "SessionStart" => Dispatcher::new(
            AggregationPolicy::ConcatenateContext,
            vec![Box::new(ClearSkillMarker::new()), Box::new(RestoreWorktreeOnResume)],
        ),
        "SubagentStart" => Dispatcher::new(
            AggregationPolicy::ConcatenateContext,
            vec![Box::new(ClearSkillMarker::new())],
        ),
        "UserPromptSubmit" => Dispatcher::new(AggregationPolicy::ConcatenateContext, vec![]),
        "PreToolUse" => Dispatcher::new(AggregationPolicy::FirstBlockWins, vec![]),
        "PreToolUseBash" => Dispatcher::new(
            AggregationPolicy::FirstBlockWins,
            vec![Box::new(UnsafeRemovalGuard)],
        ),
        "PreToolUseAskUserQuestion" => Dispatcher::new(AggregationPolicy::SingleContext, vec![]),
        "PreToolUseWrite" => Dispatcher::new(
            AggregationPolicy::FirstBlockWins,
            vec![Box::new(EnforceWorktreePathIsolation)],
        ),
        "PreToolUseRead" => Dispatcher::new(AggregationPolicy::FirstBlockWins, vec![]),
        "PostToolUse" => Dispatcher::new(AggregationPolicy::WarnOnly, vec![]),
        "PostToolUseBash" => Dispatcher::new(
            AggregationPolicy::WarnOnly,
            vec![Box::new(DetectConcatenatedCommit), Box::new(ValidateRebaseTarget)],
        ),
        "PostToolUseFailure" => Dispatcher::new(AggregationPolicy::WarnOnly, vec![]),
        "Stop" => Dispatcher::new(
            AggregationPolicy::FirstBlockWins,
            vec![Box::new(EnforceStatusOutput::new())],
        ),
        _ => return None,
    };
    Some(dispatcher)
}

/// The host's JSON hook input. Fields beyond the ones every handler needs
/// are kept in `extra` so individual handlers can pull out event-specific
/// payloads (tool name, tool input, source) without a combinatorial struct.
#[derive(Debug, Clone, Deserialize)]
pub struct HookInput {
    #[serde(rename = "hookEventName")]
    pub hook_event_name: String,
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub cwd: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub tool_name: Option<String>,
    #[serde(default)]
    pub tool_input: Option<Value>,
    #[serde(flatten)]
    pub extra: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Allow,
    Block,
}

/// One handler's contribution before the dispatcher's aggregation policy
/// combines it with its siblings.
#[derive(Debug, Clone, Default)]
pub struct HandlerOutput {
    pub decision: Option<Decision>,
    pub reason: Option<String>,
    pub additional_context: Option<String>,
    pub warning: Option<String>,
    pub hook_specific_output: Option<Value>,
}

impl HandlerOutput {
    pub fn allow() -> Self {
        HandlerOutput::default()
    }

    pub fn block(reason: impl Into<String>) -> Self {
        HandlerOutput {
            decision: Some(Decision::Block),
            reason: Some(reason.into()),
            ..Default::default()
        }
    }

    pub fn context(text: impl Into<String>) -> Self {
        HandlerOutput {
            additional_context: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn warn(text: impl Into<String>) -> Self {
        HandlerOutput {
            warning: Some(text.into()),
            ..Default::default()
        }
    }
}

/// A single safety/context handler in a dispatcher's static chain.
pub trait Handler {
    fn name(&self) -> &'static str;
    fn handle(&self, input: &HookInput) -> anyhow::Result<HandlerOutput>;
}

/// The final JSON object written to stdout.
#[derive(Debug, Clone, Serialize, Default)]
pub struct HookResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<Decision>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "reason")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "additionalContext")]
    pub additional_context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "hookSpecificOutput")]
    pub hook_specific_output: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "systemMessage")]
    pub system_message: Option<String>,
}

/// Read `HookInput` JSON from `stdin`, run `dispatcher` over it, and write
/// the `HookResponse` JSON to `stdout`. Never propagates an error: any
/// failure anywhere in this path is converted into a minimal
/// `systemMessage` response so the envelope always exits 0.
pub fn run_envelope(
    dispatcher: &Dispatcher,
    stdin: &mut impl Read,
    stdout: &mut impl Write,
    stderr: &mut impl Write,
) {
    let response = match read_input(stdin) {
        Ok(input) => dispatcher.dispatch(&input),
        Err(e) => HookResponse {
            system_message: Some(format!("cat hook envelope failed to parse input: {e}")),
            ..Default::default()
        },
    };

    for warning in response_warnings(&response) {
        let _ = writeln!(stderr, "{warning}");
    }

    let body = serde_json::to_string(&response)
        .unwrap_or_else(|_| r#"{"systemMessage":"cat hook envelope failed to serialize its response"}"#.to_string());
    let _ = writeln!(stdout, "{body}");
}

fn read_input(stdin: &mut impl Read) -> anyhow::Result<HookInput> {
    let mut buf = String::new();
    stdin.read_to_string(&mut buf)?;
    Ok(serde_json::from_str(&buf)?)
}

/// `HookResponse` carries no warning field of its own (warnings go to
/// stderr as plain lines); the dispatcher stashes them in `system_message`
/// when no block/context claimed that slot, or we simply have none to show.
fn response_warnings(response: &HookResponse) -> Vec<String> {
    response
        .system_message
        .as_ref()
        .filter(|_| response.decision.is_none() && response.additional_context.is_none())
        .cloned()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handler_output_constructors_set_expected_fields() {
        let blocked = HandlerOutput::block("nope");
        assert_eq!(blocked.decision, Some(Decision::Block));
        assert_eq!(blocked.reason.as_deref(), Some("nope"));

        let ctx = HandlerOutput::context("hello");
        assert_eq!(ctx.additional_context.as_deref(), Some("hello"));
    }

    #[test]
    fn dispatcher_for_recognizes_every_registered_event() {
        for name in [
            "SessionStart",
            "SubagentStart",
            "UserPromptSubmit",
            "PreToolUse",
            "PreToolUseBash",
            "PreToolUseAskUserQuestion",
            "PreToolUseWrite",
            "PreToolUseRead",
            "PostToolUse",
            "PostToolUseBash",
            "PostToolUseFailure",
            "Stop",
        ] {
            assert!(dispatcher_for(name).is_some(), "missing dispatcher for {name}");
        }
        assert!(dispatcher_for("NotAnEvent").is_none());
    }

    #[test]
    fn run_envelope_always_produces_valid_json_on_bad_input() {
        let dispatcher = Dispatcher::new(AggregationPolicy::WarnOnly, vec![]);
        let mut stdin = std::io::Cursor::new(b"not json".to_vec());
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        run_envelope(&dispatcher, &mut stdin, &mut stdout, &mut stderr);
        let value: Value = serde_json::from_slice(&stdout).unwrap();
        assert!(value.get("systemMessage").is_some());
    }
}

//! One dispatcher per lifecycle event: a static, ordered handler chain
//! plus the aggregation policy that combines their outputs.

use serde_json::Value;

use super::{Decision, Handler, HandlerOutput, HookInput, HookResponse};

/// The lifecycle event a dispatcher instance is wired for. Purely
/// descriptive — used in log lines and tests, not in dispatch logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    SessionStart,
    SubagentStart,
    UserPromptSubmit,
    PreToolUse,
    PreToolUseBash,
    PreToolUseAskUserQuestion,
    PreToolUseWrite,
    PreToolUseRead,
    PostToolUse,
    PostToolUseBash,
    PostToolUseFailure,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationPolicy {
    /// PreToolUse variants: first `block` wins and returns immediately;
    /// otherwise advisory warnings from every handler are combined.
    FirstBlockWins,
    /// SessionStart / SubagentStart: every handler runs; additional-context
    /// strings and warnings are concatenated.
    ConcatenateContext,
    /// PostToolUse / PostToolUseFailure: handlers cannot block; all
    /// warnings and context strings are collected.
    WarnOnly,
    /// PreAsk: return at the first handler that produces context.
    SingleContext,
}

pub struct Dispatcher {
    policy: AggregationPolicy,
    handlers: Vec<Box<dyn Handler>>,
}

impl Dispatcher {
    pub fn new(policy: AggregationPolicy, handlers: Vec<Box<dyn Handler>>) -> Self {
        Dispatcher { policy, handlers }
    }

    pub fn dispatch(&self, input: &HookInput) -> HookResponse {
        match self.policy {
            AggregationPolicy::FirstBlockWins => self.dispatch_first_block_wins(input),
            AggregationPolicy::ConcatenateContext => self.dispatch_concatenate_context(input),
            AggregationPolicy::WarnOnly => self.dispatch_warn_only(input),
            AggregationPolicy::SingleContext => self.dispatch_single_context(input),
        }
    }

    fn run_handler(&self, handler: &dyn Handler, input: &HookInput) -> HandlerOutput {
        match handler.handle(input) {
            Ok(output) => output,
            Err(e) => HandlerOutput::warn(format!("{} failed: {e}", handler.name())),
        }
    }

    fn dispatch_first_block_wins(&self, input: &HookInput) -> HookResponse {
        let mut warnings = Vec::new();
        for handler in &self.handlers {
            let output = self.run_handler(handler.as_ref(), input);
            if output.decision == Some(Decision::Block) {
                return HookResponse {
                    decision: Some(Decision::Block),
                    reason: output.reason,
                    ..Default::default()
                };
            }
            if let Some(warning) = output.warning {
                warnings.push(warning);
            }
        }
        HookResponse {
            system_message: join_nonempty(&warnings, "\n"),
            ..Default::default()
        }
    }

    fn dispatch_concatenate_context(&self, input: &HookInput) -> HookResponse {
        let mut contexts = Vec::new();
        let mut warnings = Vec::new();
        let mut hook_specific_output: Option<Value> = None;

        for handler in &self.handlers {
            let output = self.run_handler(handler.as_ref(), input);
            if let Some(ctx) = output.additional_context {
                contexts.push(ctx);
            }
            if let Some(warning) = output.warning {
                warnings.push(warning);
            }
            if output.hook_specific_output.is_some() {
                hook_specific_output = output.hook_specific_output;
            }
        }

        HookResponse {
            additional_context: join_nonempty(&contexts, "\n\n"),
            hook_specific_output,
            system_message: join_nonempty(&warnings, "\n"),
            ..Default::default()
        }
    }

    fn dispatch_warn_only(&self, input: &HookInput) -> HookResponse {
        let mut contexts = Vec::new();
        let mut warnings = Vec::new();

        for handler in &self.handlers {
            let output = self.run_handler(handler.as_ref(), input);
            if let Some(ctx) = output.additional_context {
                contexts.push(ctx);
            }
            if let Some(warning) = output.warning {
                warnings.push(warning);
            }
        }

        HookResponse {
            additional_context: join_nonempty(&contexts, "\n\n"),
            system_message: join_nonempty(&warnings, "\n"),
            ..Default::default()
        }
    }

    fn dispatch_single_context(&self, input: &HookInput) -> HookResponse {
        for handler in &self.handlers {
            let output = self.run_handler(handler.as_ref(), input);
            if let Some(ctx) = output.additional_context {
                return HookResponse {
                    additional_context: Some(ctx),
                    ..Default::default()
                };
            }
        }
        HookResponse::default()
    }
}

fn join_nonempty(parts: &[String], sep: &str) -> Option<String> {
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(sep))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Blocking;
    impl Handler for Blocking {
        fn name(&self) -> &'static str {
            "blocking"
        }
        fn handle(&self, _input: &HookInput) -> anyhow::Result<HandlerOutput> {
            Ok(HandlerOutput::block("nope"))
        }
    }

    struct Warning;
    impl Handler for Warning {
        fn name(&self) -> &'static str {
            "warning"
        }
        fn handle(&self, _input: &HookInput) -> anyhow::Result<HandlerOutput> {
            Ok(HandlerOutput::warn("heads up"))
        }
    }

    struct Failing;
    impl Handler for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }
        fn handle(&self, _input: &HookInput) -> anyhow::Result<HandlerOutput> {
            anyhow::bail!("boom")
        }
    }

    struct ContextProducer(&'static str);
    impl Handler for ContextProducer {
        fn name(&self) -> &'static str {
            "context"
        }
        fn handle(&self, _input: &HookInput) -> anyhow::Result<HandlerOutput> {
            Ok(HandlerOutput::context(self.0))
        }
    }

    fn input() -> HookInput {
        HookInput {
            hook_event_name: "Test".to_string(),
            session_id: "s1".to_string(),
            cwd: "/tmp".to_string(),
            source: None,
            tool_name: None,
            tool_input: None,
            extra: serde_json::json!({}),
        }
    }

    #[test]
    fn first_block_wins_stops_at_first_block() {
        let dispatcher = Dispatcher::new(
            AggregationPolicy::FirstBlockWins,
            vec![Box::new(Warning), Box::new(Blocking), Box::new(Warning)],
        );
        let response = dispatcher.dispatch(&input());
        assert_eq!(response.decision, Some(Decision::Block));
        assert_eq!(response.reason.as_deref(), Some("nope"));
    }

    #[test]
    fn concatenate_context_joins_every_handler() {
        let dispatcher = Dispatcher::new(
            AggregationPolicy::ConcatenateContext,
            vec![Box::new(ContextProducer("a")), Box::new(ContextProducer("b"))],
        );
        let response = dispatcher.dispatch(&input());
        assert_eq!(response.additional_context.as_deref(), Some("a\n\nb"));
    }

    #[test]
    fn single_context_stops_at_first_producer() {
        let dispatcher = Dispatcher::new(
            AggregationPolicy::SingleContext,
            vec![Box::new(ContextProducer("first")), Box::new(ContextProducer("second"))],
        );
        let response = dispatcher.dispatch(&input());
        assert_eq!(response.additional_context.as_deref(), Some("first"));
    }

    #[test]
    fn failing_handler_becomes_a_warning_not_a_crash() {
        let dispatcher = Dispatcher::new(AggregationPolicy::WarnOnly, vec![Box::new(Failing)]);
        let response = dispatcher.dispatch(&input());
        assert!(response.system_message.unwrap().contains("boom"));
    }
}

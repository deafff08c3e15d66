//! `PLAN.md` parsing: `## Goal`, `## Files to Create`/`## Files to Modify`,
//! `## Execution Steps`, `## Pre-conditions`.

use std::sync::LazyLock;

use regex::Regex;

#[derive(Debug, Clone, Default)]
pub struct Plan {
    pub goal: Option<String>,
    pub files_to_create: Vec<String>,
    pub files_to_modify: Vec<String>,
    pub execution_steps: Vec<String>,
    pub preconditions: Vec<Precondition>,
}

#[derive(Debug, Clone)]
pub struct Precondition {
    pub text: String,
    pub checked: bool,
}

static HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^##\s*(.+?)\s*$").unwrap());
static BACKTICK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"`([^`]+)`").unwrap());
static NUMBERED_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+\.\s*(.+)$").unwrap());
static CHECKBOX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-*]\s*\[( |x|X)\]\s*(.+)$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Goal,
    FilesToCreate,
    FilesToModify,
    ExecutionSteps,
    Preconditions,
    Other,
}

pub fn parse_plan(content: &str) -> Plan {
    let mut plan = Plan::default();
    let mut section = Section::None;
    let mut goal_lines: Vec<&str> = Vec::new();

    for line in content.lines() {
        if let Some(caps) = HEADER_RE.captures(line) {
            if section == Section::Goal && !goal_lines.is_empty() {
                plan.goal = Some(goal_lines.join(" ").trim().to_string());
            }
            section = match caps[1].to_ascii_lowercase().as_str() {
                "goal" => Section::Goal,
                "files to create" => Section::FilesToCreate,
                "files to modify" => Section::FilesToModify,
                "execution steps" => Section::ExecutionSteps,
                "pre-conditions" | "preconditions" => Section::Preconditions,
                _ => Section::Other,
            };
            goal_lines.clear();
            continue;
        }

        match section {
            Section::Goal => {
                if !line.trim().is_empty() {
                    goal_lines.push(line.trim());
                } else if !goal_lines.is_empty() {
                    // First blank line ends the goal paragraph.
                    plan.goal = Some(goal_lines.join(" ").trim().to_string());
                    section = Section::Other;
                }
            }
            Section::FilesToCreate => {
                if let Some(path) = extract_backticked_path(line) {
                    plan.files_to_create.push(path);
                }
            }
            Section::FilesToModify => {
                if let Some(path) = extract_backticked_path(line) {
                    plan.files_to_modify.push(path);
                }
            }
            Section::ExecutionSteps => {
                if let Some(caps) = NUMBERED_RE.captures(line.trim()) {
                    plan.execution_steps.push(caps[1].trim().to_string());
                }
            }
            Section::Preconditions => {
                if let Some(caps) = CHECKBOX_RE.captures(line.trim()) {
                    plan.preconditions.push(Precondition {
                        checked: caps[1].eq_ignore_ascii_case("x"),
                        text: caps[2].trim().to_string(),
                    });
                }
            }
            Section::None | Section::Other => {}
        }
    }

    if section == Section::Goal && !goal_lines.is_empty() {
        plan.goal = Some(goal_lines.join(" ").trim().to_string());
    }

    plan
}

fn extract_backticked_path(line: &str) -> Option<String> {
    if !line.trim_start().starts_with(['-', '*']) {
        return None;
    }
    BACKTICK_RE
        .captures(line)
        .map(|caps| caps[1].to_string())
}

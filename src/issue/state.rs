//! `STATE.md` parsing: a small set of anchored line patterns, plus the
//! `## Decomposed Into` bulleted list.

use std::sync::LazyLock;

use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Open,
    InProgress,
    Closed,
    Decomposed,
}

impl Status {
    pub fn parse(value: &str) -> Option<Status> {
        match value.trim() {
            "open" => Some(Status::Open),
            "in-progress" => Some(Status::InProgress),
            "closed" => Some(Status::Closed),
            "decomposed" => Some(Status::Decomposed),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Open => "open",
            Status::InProgress => "in-progress",
            Status::Closed => "closed",
            Status::Decomposed => "decomposed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct IssueState {
    pub status: Status,
    pub progress: Option<u8>,
    pub last_updated: Option<String>,
    pub dependencies: Vec<String>,
    pub decomposed_into: Vec<String>,
}

static STATUS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?\s*\*\*Status:\*\*\s*(\S+)").unwrap());
static PROGRESS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?\s*\*\*Progress:\*\*\s*(\d+)%").unwrap());
static LAST_UPDATED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?\s*\*\*Last Updated:\*\*\s*(.+)$").unwrap());
static DEPENDENCIES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?\s*\*\*Dependencies:\*\*\s*\[(.*)\]").unwrap());
static DECOMPOSED_HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^##\s*Decomposed Into\s*$").unwrap());
static BULLET_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[-*]\s*(.+)$").unwrap());
static HEADER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^#{1,6}\s").unwrap());

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("missing **Status:** line")]
    MissingStatus,
    #[error("unrecognized status value {0:?}")]
    InvalidStatus(String),
}

/// Parse the fields `STATE.md` is expected to contain. Invalid `status`
/// values are a hard error per the data model; everything else is optional.
pub fn parse_state(content: &str) -> Result<IssueState, ParseError> {
    let mut status = None;
    let mut progress = None;
    let mut last_updated = None;
    let mut dependencies = Vec::new();
    let mut decomposed_into = Vec::new();
    let mut in_decomposed_section = false;

    for line in content.lines() {
        if let Some(caps) = STATUS_RE.captures(line) {
            let raw = &caps[1];
            status = Some(
                Status::parse(raw).ok_or_else(|| ParseError::InvalidStatus(raw.to_string()))?,
            );
            continue;
        }
        if let Some(caps) = PROGRESS_RE.captures(line) {
            progress = caps[1].parse().ok();
            continue;
        }
        if let Some(caps) = LAST_UPDATED_RE.captures(line) {
            last_updated = Some(caps[1].trim().to_string());
            continue;
        }
        if let Some(caps) = DEPENDENCIES_RE.captures(line) {
            dependencies = split_list(&caps[1]);
            continue;
        }
        if DECOMPOSED_HEADER_RE.is_match(line) {
            in_decomposed_section = true;
            continue;
        }
        if in_decomposed_section {
            if HEADER_RE.is_match(line) {
                in_decomposed_section = false;
            } else if let Some(caps) = BULLET_RE.captures(line) {
                decomposed_into.push(caps[1].trim().to_string());
            }
        }
    }

    Ok(IssueState {
        status: status.ok_or(ParseError::MissingStatus)?,
        progress,
        last_updated,
        dependencies,
        decomposed_into,
    })
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().trim_matches(['"', '\'']).to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Rewrite the `Status`, `Progress`, and `Last Updated` lines in place,
/// preserving everything else verbatim. Idempotent: re-applying the same
/// values produces byte-identical output.
pub fn apply_transition(content: &str, status: Status, progress: u8, today: &str) -> String {
    let mut saw_status = false;
    let mut saw_progress = false;
    let mut saw_last_updated = false;

    let mut out: Vec<String> = content
        .lines()
        .map(|line| {
            if STATUS_RE.is_match(line) {
                saw_status = true;
                format!("- **Status:** {}", status.as_str())
            } else if PROGRESS_RE.is_match(line) {
                saw_progress = true;
                format!("- **Progress:** {progress}%")
            } else if LAST_UPDATED_RE.is_match(line) {
                saw_last_updated = true;
                format!("- **Last Updated:** {today}")
            } else {
                line.to_string()
            }
        })
        .collect();

    if !saw_status {
        out.push(format!("- **Status:** {}", status.as_str()));
    }
    if !saw_progress {
        out.push(format!("- **Progress:** {progress}%"));
    }
    if !saw_last_updated {
        out.push(format!("- **Last Updated:** {today}"));
    }

    let mut result = out.join("\n");
    if content.ends_with('\n') {
        result.push('\n');
    }
    result
}

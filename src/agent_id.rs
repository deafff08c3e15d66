//! The CAT agent-id: the lock's tenant identifier for a worktree.
//!
//! Of the form `{sessionId}` (the main agent) or
//! `{sessionId}/subagents/{agentId}` (a spawned subagent).

use std::fmt;
use std::str::FromStr;

const SUBAGENT_SEGMENT: &str = "/subagents/";

/// A session id, optionally qualified by a subagent id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct AgentId {
    session_id: String,
    subagent_id: Option<String>,
}

impl AgentId {
    pub fn main(session_id: impl Into<String>) -> Self {
        AgentId {
            session_id: session_id.into(),
            subagent_id: None,
        }
    }

    pub fn subagent(session_id: impl Into<String>, subagent_id: impl Into<String>) -> Self {
        AgentId {
            session_id: session_id.into(),
            subagent_id: Some(subagent_id.into()),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn subagent_id(&self) -> Option<&str> {
        self.subagent_id.as_deref()
    }

    /// True if `self` and `other` name the same session, regardless of
    /// subagent — used when a lock lists only a bare session id and the
    /// command under test names a subagent (or vice versa).
    pub fn same_session(&self, other: &AgentId) -> bool {
        self.session_id == other.session_id
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.subagent_id {
            Some(sub) => write!(f, "{}{SUBAGENT_SEGMENT}{sub}", self.session_id),
            None => write!(f, "{}", self.session_id),
        }
    }
}

impl FromStr for AgentId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err("agent-id must not be blank".to_string());
        }
        match s.split_once(SUBAGENT_SEGMENT) {
            Some((session_id, subagent_id)) if !session_id.is_empty() && !subagent_id.is_empty() => {
                Ok(AgentId {
                    session_id: session_id.to_string(),
                    subagent_id: Some(subagent_id.to_string()),
                })
            }
            _ => Ok(AgentId {
                session_id: s.to_string(),
                subagent_id: None,
            }),
        }
    }
}

impl From<AgentId> for String {
    fn from(id: AgentId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for AgentId {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_main_agent_display() {
        let id = AgentId::main("S1");
        assert_eq!(id.to_string(), "S1");
    }

    #[test]
    fn test_subagent_display() {
        let id = AgentId::subagent("S2", "7");
        assert_eq!(id.to_string(), "S2/subagents/7");
    }

    #[test]
    fn test_roundtrip_parse() {
        let id: AgentId = "S2/subagents/7".parse().unwrap();
        assert_eq!(id.session_id(), "S2");
        assert_eq!(id.subagent_id(), Some("7"));
        assert_eq!(id.to_string(), "S2/subagents/7");
    }

    #[test]
    fn test_parse_main_only() {
        let id: AgentId = "S1".parse().unwrap();
        assert_eq!(id.session_id(), "S1");
        assert_eq!(id.subagent_id(), None);
    }

    #[test]
    fn test_blank_rejected() {
        assert!("".parse::<AgentId>().is_err());
    }

    #[test]
    fn test_same_session() {
        let main = AgentId::main("S1");
        let sub = AgentId::subagent("S1", "7");
        assert!(main.same_session(&sub));
        let other = AgentId::main("S2");
        assert!(!main.same_session(&other));
    }
}

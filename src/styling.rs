//! Minimal text markers for user-facing error/hint messages.
//!
//! The host renders these messages verbatim in its own UI; this crate does
//! not own terminal color or table formatting (display formatting is an
//! explicit non-goal), so this module stays to the handful of plain-text
//! markers `CatError`'s `Display` impl needs.

/// Prefix for an error line.
pub const ERROR_EMOJI: &str = "\u{274c}"; // ❌
/// Prefix for a hint/recovery line.
pub const HINT_EMOJI: &str = "\u{1f4a1}"; // 💡

/// Indent every line of `content` with a gutter, the way a multi-line
/// diagnostic (a rebase conflict's file list, a diff stat) nests under its
/// header line.
pub fn format_with_gutter(content: &str) -> String {
    content
        .lines()
        .map(|line| format!("  | {line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

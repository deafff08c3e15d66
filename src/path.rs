//! Path resolution, normalization, and display helpers.

use std::path::{Path, PathBuf};

use normalize_path::NormalizePath;

/// Get the user's home directory.
///
/// Uses the `home` crate which handles platform-specific detection:
/// - Unix: `$HOME` environment variable
/// - Windows: `USERPROFILE` or `HOMEDRIVE`/`HOMEPATH`
pub fn home_dir() -> Option<PathBuf> {
    home::home_dir()
}

/// Format a filesystem path for user-facing output.
///
/// Replaces home directory prefix with `~` (e.g., `/Users/alex/projects/wt` -> `~/projects/wt`).
/// Paths outside home are returned unchanged.
pub fn format_path_for_display(path: &Path) -> String {
    if let Some(home) = home_dir()
        && let Ok(stripped) = path.strip_prefix(&home)
    {
        if stripped.as_os_str().is_empty() {
            return "~".to_string();
        }

        let mut display_path = PathBuf::from("~");
        display_path.push(stripped);
        return display_path.display().to_string();
    }

    path.display().to_string()
}

/// Collapse `.`/`..` components lexically, without touching the filesystem.
///
/// Unlike `Path::canonicalize`, this works on paths that don't exist yet
/// (e.g. a worktree path being computed before `git worktree add` runs).
fn normalize_lexically(path: &Path) -> PathBuf {
    path.normalize()
}

/// Expand `~`, join against `cwd` if relative, and normalize `.`/`..`.
///
/// If the resolved path exists, symlinks are resolved via `canonicalize`
/// (through `dunce` so Windows doesn't hand back a `\\?\` verbatim path);
/// otherwise the lexically-normalized path is returned as-is, since a path
/// under construction (a not-yet-created worktree) cannot be canonicalized.
pub fn resolve_path(path_arg: &str, cwd: &Path) -> PathBuf {
    let expanded = shellexpand::tilde(path_arg);
    let candidate = Path::new(expanded.as_ref());

    let joined = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        cwd.join(candidate)
    };

    let normalized = normalize_lexically(&joined);

    dunce::canonicalize(&normalized).unwrap_or(normalized)
}

/// Strict containment check: true iff `path_b` equals `path_a`, or `path_a`
/// is an ancestor of `path_b`, on normalized (not necessarily canonicalized)
/// paths. Callers doing security-sensitive comparisons (the unsafe-removal
/// guard) must canonicalize both sides first via [`resolve_path`].
pub fn is_inside_or_equal(path_a: &Path, path_b: &Path) -> bool {
    let a = normalize_lexically(path_a);
    let b = normalize_lexically(path_b);
    a == b || b.starts_with(&a)
}

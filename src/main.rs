//! `catctl` binary: parses CLI arguments and dispatches into the library.
//! Every command prints one JSON document — to stdout on success, to
//! stderr on failure — and exits 0 or 1 accordingly.

mod cli;

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use serde_json::{Value, json};

use catctl::agent_id::AgentId;
use catctl::depgraph::DependencyGraph;
use catctl::errors::CatError;
use catctl::gitops::{AmendInput, amend_safe, merge_and_cleanup, rebase_safe};
use catctl::hook::{self, run_envelope};
use catctl::issue::IssueStore;
use catctl::lock::LockStore;
use catctl::repository::Repository;
use catctl::scheduler::{Scheduler, Scope, SchedulerResult};
use catctl::skill_output;
use catctl::worktree::{self, ProvisionRequest, Ready};

use cli::{Cli, Commands, IssueLockAction};

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("off")).init();

    let cli = Cli::parse();

    // `hook` writes its own stdout/stderr per the envelope contract and
    // always exits 0; `skill-output` prints its wrapped text verbatim
    // rather than as a JSON-quoted string. Every other command follows the
    // uniform JSON-to-stdout-or-stderr contract.
    match cli.command {
        Commands::Hook { event } => {
            run_hook(&event);
            return ExitCode::SUCCESS;
        }
        Commands::SkillOutput { args } => {
            println!("{}", skill_output::dispatch(&project_dir(), &args));
            return ExitCode::SUCCESS;
        }
        command => match run(command) {
            Ok(value) => {
                println!("{value}");
                ExitCode::SUCCESS
            }
            Err(value) => {
                eprintln!("{value}");
                ExitCode::FAILURE
            }
        },
    }
}

fn run(command: Commands) -> Result<Value, Value> {
    match command {
        Commands::WorkPrepare { issue, exclude, base_branch, token_limit } => {
            work_prepare(issue, exclude, &base_branch, token_limit)
        }
        Commands::ExistingWorkChecker { issue, base_branch } => existing_work_checker(&issue, &base_branch),
        Commands::GitAmendSafe { message, no_edit } => git_amend_safe(message, no_edit),
        Commands::GitRebaseSafe { target, branch } => git_rebase_safe(target, &branch),
        Commands::MergeAndCleanup { issue, base_branch } => cmd_merge_and_cleanup(&issue, &base_branch),
        Commands::IssueLock { action } => issue_lock(action),
        Commands::StatuslineInstall => statusline_install(),
        Commands::RegisterHook { event } => register_hook(&event),
        Commands::BatchRead { paths } => Ok(batch_read(&paths)),
        Commands::Hook { .. } | Commands::SkillOutput { .. } => {
            unreachable!("handled directly in main before dispatch")
        }
    }
}

fn project_dir() -> PathBuf {
    std::env::var_os("CLAUDE_PROJECT_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::current_dir().expect("current directory is unreadable"))
}

fn session_id() -> Result<String, Value> {
    std::env::var("CLAUDE_SESSION_ID")
        .map_err(|_| error_json("CLAUDE_SESSION_ID is not set"))
}

fn error_json(message: impl Into<String>) -> Value {
    json!({ "status": "ERROR", "message": message.into() })
}

fn discover_repo() -> Result<Repository, Value> {
    Repository::discover(&project_dir()).map_err(|e| error_json(e.to_string()))
}

fn work_prepare(
    issue: Option<String>,
    exclude: Option<String>,
    base_branch: &str,
    token_limit: Option<u64>,
) -> Result<Value, Value> {
    let repo = discover_repo()?;
    let session = session_id()?;
    let store = IssueStore::load(repo.root()).map_err(|e| error_json(e.to_string()))?;
    let graph = DependencyGraph::build(&store);
    let locks = LockStore::new(repo.root());
    let worktree_exists = |id: &str| repo.worktree_exists(id);
    let scheduler = Scheduler::new(&store, &graph, &locks, &worktree_exists);

    let scope = match issue {
        Some(id) => Scope::Issue(id),
        None => Scope::All { exclude_glob: exclude },
    };

    let found = match scheduler.schedule(scope, &session) {
        SchedulerResult::Found { issue_id, issue_path, .. } => (issue_id, issue_path),
        other => return Err(scheduler_result_json(other)),
    };
    let (issue_id, issue_path) = found;

    let agent_id = AgentId::main(session.clone());
    let req = ProvisionRequest {
        issue_id: &issue_id,
        issue_path,
        base_branch,
        session_id: &session,
        agent_id: &agent_id,
        token_limit: token_limit.unwrap_or(worktree::DEFAULT_TOKEN_LIMIT),
    };

    worktree::provision(&repo, &locks, &req)
        .map(ready_json)
        .map_err(|e| e.to_json())
}

fn existing_work_checker(issue: &str, base_branch: &str) -> Result<Value, Value> {
    let repo = discover_repo()?;
    let store = IssueStore::load(repo.root()).map_err(|e| error_json(e.to_string()))?;
    let found = match store.resolve(issue) {
        catctl::issue::ResolveResult::Found(found) => found,
        catctl::issue::ResolveResult::Ambiguous(candidates) => {
            return Err(error_json(format!("{issue} is ambiguous among {}", candidates.join(", "))));
        }
        catctl::issue::ResolveResult::NotFound => return Err(error_json(format!("no issue named {issue}"))),
    };
    let issue_path = found.path.clone();

    let report = worktree::check_existing_work(&repo, issue, &issue_path, base_branch)
        .map_err(|e| error_json(e.to_string()))?;

    Ok(json!({
        "issue_id": issue,
        "commits_ahead": report.existing_work.commits_ahead,
        "recent_oneline": report.existing_work.recent_oneline,
        "suspicious_grep_matches": report.suspicious_commits.grep_matches,
        "suspicious_touched_planned_files": report.suspicious_commits.touched_planned_files,
    }))
}

fn git_amend_safe(message: Option<String>, no_edit: bool) -> Result<Value, Value> {
    let cwd = std::env::current_dir().map_err(|e| error_json(e.to_string()))?;
    let input = AmendInput { message: message.as_deref(), no_edit };
    amend_safe(&cwd, &input)
        .map(|outcome| json!({ "status": "OK", "outcome": format!("{outcome:?}") }))
        .map_err(|e| e.to_json())
}

fn git_rebase_safe(target: Option<String>, branch: &str) -> Result<Value, Value> {
    let cwd = std::env::current_dir().map_err(|e| error_json(e.to_string()))?;
    let repo = discover_repo()?;
    let branch_point_file = repo.branch_point_file(branch);
    rebase_safe(&cwd, target.as_deref(), &branch_point_file)
        .map(|outcome| json!({ "status": "OK", "outcome": format!("{outcome:?}") }))
        .map_err(|e| e.to_json())
}

fn cmd_merge_and_cleanup(issue: &str, base_branch: &str) -> Result<Value, Value> {
    let repo = discover_repo()?;
    let session = session_id()?;
    let locks = LockStore::new(repo.root());
    merge_and_cleanup(&repo, &locks, issue, base_branch, &session)
        .map(|outcome| {
            json!({
                "status": "OK",
                "issue_id": outcome.issue_id,
                "target_branch": outcome.target_branch,
                "merged_commit": outcome.merged_commit,
                "lock_released": outcome.lock_released,
                "duration_seconds": outcome.duration_seconds,
            })
        })
        .map_err(|e| e.to_json())
}

fn issue_lock(action: IssueLockAction) -> Result<Value, Value> {
    let repo = discover_repo()?;
    let locks = LockStore::new(repo.root());

    match action {
        IssueLockAction::Acquire { issue } => {
            let session = session_id()?;
            match locks.acquire(&issue, &session).map_err(|e| error_json(e.to_string()))? {
                catctl::lock::AcquireResult::Acquired => Ok(json!({ "status": "ACQUIRED", "issue_id": issue })),
                catctl::lock::AcquireResult::Contested { holder_session_id } => {
                    Err(CatError::Locked { issue_id: issue, holder: holder_session_id }.to_json())
                }
            }
        }
        IssueLockAction::Release { issue } => {
            let session = session_id()?;
            locks.release(&issue, &session).map_err(|e| error_json(e.to_string()))?;
            Ok(json!({ "status": "RELEASED", "issue_id": issue }))
        }
        IssueLockAction::ForceRelease { issue } => {
            locks.force_release(&issue).map_err(|e| error_json(e.to_string()))?;
            Ok(json!({ "status": "RELEASED", "issue_id": issue }))
        }
        IssueLockAction::Update { issue, worktree_path, agent_id } => {
            let session = session_id()?;
            let agent: AgentId = agent_id.parse().map_err(error_json)?;
            locks
                .update(&issue, &session, &worktree_path, &agent)
                .map_err(|e| error_json(e.to_string()))?;
            Ok(json!({ "status": "UPDATED", "issue_id": issue }))
        }
        IssueLockAction::List => {
            let entries = locks.list().map_err(|e| error_json(e.to_string()))?;
            Ok(json!({ "locks": entries }))
        }
    }
}

/// Merge a `statusLine` entry into `<repo>/.claude/settings.json`, creating
/// the file if absent. No business logic beyond the merge itself.
fn statusline_install() -> Result<Value, Value> {
    let repo = discover_repo()?;
    let settings_path = repo.root().join(".claude/settings.json");
    let mut settings = read_json_object(&settings_path)?;
    settings.insert(
        "statusLine".to_string(),
        json!({ "type": "command", "command": "catctl skill-output status" }),
    );
    write_json_object(&settings_path, &settings)?;
    Ok(json!({ "status": "OK", "path": settings_path.display().to_string() }))
}

/// Append a `catctl hook <event>` command registration to
/// `<repo>/.claude/settings.json`'s `hooks.<event>` array.
fn register_hook(event: &str) -> Result<Value, Value> {
    let repo = discover_repo()?;
    let settings_path = repo.root().join(".claude/settings.json");
    let mut settings = read_json_object(&settings_path)?;

    let hooks = settings
        .entry("hooks".to_string())
        .or_insert_with(|| Value::Object(Default::default()));
    let Value::Object(hooks_map) = hooks else {
        return Err(error_json("settings.json's \"hooks\" key is not an object"));
    };
    let entries = hooks_map
        .entry(event.to_string())
        .or_insert_with(|| Value::Array(Vec::new()));
    let Value::Array(array) = entries else {
        return Err(error_json(format!("settings.json's \"hooks.{event}\" key is not an array")));
    };

    let registration = json!({ "type": "command", "command": format!("catctl hook {event}") });
    if !array.contains(&registration) {
        array.push(registration);
    }

    write_json_object(&settings_path, &settings)?;
    Ok(json!({ "status": "OK", "event": event }))
}

/// Read a batch of files, returning `{path: contents}`; a missing file is
/// skipped rather than treated as a failure.
fn batch_read(paths: &[String]) -> Value {
    let mut out = serde_json::Map::new();
    for path in paths {
        if let Ok(contents) = std::fs::read_to_string(path) {
            out.insert(path.clone(), Value::String(contents));
        }
    }
    Value::Object(out)
}

/// Unrecognized event names still produce a valid envelope response (a
/// `systemMessage`, exit 0) rather than a CLI-level failure — the host
/// treats non-zero exit as a session-ending failure.
fn run_hook(event: &str) {
    let stdin = io::stdin();
    let mut stdin = stdin.lock();
    let stdout = io::stdout();
    let mut stdout = stdout.lock();
    let stderr = io::stderr();
    let mut stderr = stderr.lock();

    match hook::dispatcher_for(event) {
        Some(dispatcher) => run_envelope(&dispatcher, &mut stdin, &mut stdout, &mut stderr),
        None => {
            let body = json!({ "systemMessage": format!("no dispatcher registered for event {event}") });
            println!("{body}");
        }
    }
}

fn scheduler_result_json(result: SchedulerResult) -> Value {
    match result {
        SchedulerResult::NotFound(diag) => CatError::NoIssues {
            blocked_issues: diag.blocked_issues,
            locked_issues: diag.locked_issues,
            circular_dependencies: diag.circular_dependencies,
            closed_count: diag.closed_count,
            total_count: diag.total_count,
        }
        .to_json(),
        SchedulerResult::Locked { issue_id, holder } => CatError::Locked { issue_id, holder }.to_json(),
        SchedulerResult::Blocked { issue_id, blocking_issues } => json!({
            "status": "BLOCKED",
            "issue_id": issue_id,
            "blocking_issues": blocking_issues,
        }),
        SchedulerResult::Decomposed { issue_id } => json!({
            "status": "DECOMPOSED",
            "issue_id": issue_id,
        }),
        SchedulerResult::ExistingWorktree { issue_id, worktree_path } => json!({
            "status": "EXISTING_WORKTREE",
            "issue_id": issue_id,
            "worktree_path": worktree_path.display().to_string(),
        }),
        SchedulerResult::AlreadyComplete { issue_id } => json!({
            "status": "ALREADY_COMPLETE",
            "issue_id": issue_id,
        }),
        SchedulerResult::NotExecutable { issue_id, reason } => json!({
            "status": "NOT_EXECUTABLE",
            "issue_id": issue_id,
            "reason": reason,
        }),
        SchedulerResult::Error { message } => error_json(message),
        SchedulerResult::Found { .. } => unreachable!("Found is handled by the caller before this point"),
    }
}

fn ready_json(ready: Ready) -> Value {
    let preconditions: Vec<Value> = ready
        .preconditions
        .iter()
        .map(|p| json!({ "text": p.text, "checked": p.checked }))
        .collect();

    json!({
        "status": "READY",
        "issue_id": ready.issue_id,
        "worktree_path": ready.worktree_path.display().to_string(),
        "branch": ready.branch,
        "base_branch": ready.base_branch,
        "token_estimate": ready.token_estimate,
        "goal": ready.goal,
        "preconditions": preconditions,
        "existing_work": {
            "commits_ahead": ready.existing_work.commits_ahead,
            "recent_oneline": ready.existing_work.recent_oneline,
        },
        "suspicious_commits": {
            "grep_matches": ready.suspicious_commits.grep_matches,
            "touched_planned_files": ready.suspicious_commits.touched_planned_files,
        },
    })
}

fn read_json_object(path: &std::path::Path) -> Result<serde_json::Map<String, Value>, Value> {
    match std::fs::read_to_string(path) {
        Ok(contents) => {
            let value: Value = serde_json::from_str(&contents)
                .map_err(|e| error_json(format!("parsing {}: {e}", path.display())))?;
            match value {
                Value::Object(map) => Ok(map),
                _ => Err(error_json(format!("{} is not a JSON object", path.display()))),
            }
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(serde_json::Map::new()),
        Err(e) => Err(error_json(format!("reading {}: {e}", path.display()))),
    }
}

fn write_json_object(path: &std::path::Path, map: &serde_json::Map<String, Value>) -> Result<(), Value> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| error_json(e.to_string()))?;
    }
    let body = serde_json::to_string_pretty(map).map_err(|e| error_json(e.to_string()))?;
    std::fs::write(path, body).map_err(|e| error_json(e.to_string()))
}

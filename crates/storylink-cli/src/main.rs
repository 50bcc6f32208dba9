//! storylink - link GitHub events to Shortcut stories
//!
//! The `storylink` command exposes the rule engine for CI jobs and local
//! debugging.
//!
//! ## Commands
//!
//! - `validate`: Check a rule table and apply a failure policy
//! - `resolve`: Show which column an event would move stories to
//! - `extract`: List `[sc-<id>]` markers found in text
//! - `plan`: Run a full sync offline and print the planned updates

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};

use storylink_core::fakes::{InMemoryHost, RecordingTracker};
use storylink_core::{
    decode_event, extract_all, extract_one, load_checked, resolve_raw, BranchIdPattern,
    EventContext, FailurePolicy, RawEventDescriptor, RuleTable, Severity, StoryId, StorySync,
    SyncOutcome, TargetId, ValidationReport, DEFAULT_BRANCH_PATTERN, DEFAULT_CONFIG_PATH,
    METRICS,
};

#[derive(Parser)]
#[command(name = "storylink")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Move Shortcut stories in response to GitHub events", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a rule table
    Validate {
        /// Rule table (JSON)
        #[arg(short, long, env = "STORYLINK_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,

        /// log-only, abort-on-error or abort-on-warning
        #[arg(long, env = "STORYLINK_POLICY", default_value = "abort-on-warning")]
        policy: FailurePolicy,
    },

    /// Resolve the target column for an event
    Resolve {
        /// Rule table (JSON)
        #[arg(short, long, env = "STORYLINK_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,

        /// Event kind (push, pull_request, pull_request_review, release)
        #[arg(short, long, env = "GITHUB_EVENT_NAME")]
        event: String,

        /// Event sub-type (e.g. opened, approved, published)
        #[arg(short, long)]
        action: Option<String>,

        /// Branch the event happened on
        #[arg(short, long)]
        branch: String,
    },

    /// Extract story ids from text
    Extract {
        /// Print every marker instead of the first one
        #[arg(long)]
        all: bool,

        /// Read text from a file
        #[arg(short, long, conflicts_with = "text")]
        file: Option<PathBuf>,

        /// Text to scan (stdin when neither this nor --file is given)
        text: Option<String>,
    },

    /// Run the sync pipeline offline and print the planned updates as JSON
    Plan {
        /// Rule table (JSON)
        #[arg(short, long, env = "STORYLINK_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,

        /// Event kind, as in the X-GitHub-Event header
        #[arg(short, long, env = "GITHUB_EVENT_NAME")]
        event: String,

        /// Webhook payload (JSON)
        #[arg(short, long, env = "GITHUB_EVENT_PATH")]
        payload: PathBuf,

        /// Override the commit sha from the payload
        #[arg(long, env = "GITHUB_SHA")]
        sha: Option<String>,

        /// File holding the head commit message
        #[arg(long)]
        commit_message: Option<PathBuf>,

        /// JSON object mapping pull-request numbers to commit messages
        #[arg(long)]
        pr_commits: Option<PathBuf>,

        /// File holding the latest release body
        #[arg(long)]
        release_body: Option<PathBuf>,

        /// Current pull-request title (title annotation is skipped without it)
        #[arg(long)]
        title: Option<String>,

        /// Pattern locating the story id in a branch name
        #[arg(long, env = "STORYLINK_BRANCH_PATTERN", default_value = DEFAULT_BRANCH_PATTERN)]
        branch_pattern: String,

        /// log-only, abort-on-error or abort-on-warning
        #[arg(long, env = "STORYLINK_POLICY", default_value = "abort-on-warning")]
        policy: FailurePolicy,

        /// Do not annotate the pull-request title
        #[arg(long)]
        no_annotate: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    storylink_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Validate { config, policy } => cmd_validate(&config, policy),
        Commands::Resolve {
            config,
            event,
            action,
            branch,
        } => cmd_resolve(&config, event, action, branch),
        Commands::Extract { all, file, text } => cmd_extract(all, file.as_deref(), text),
        Commands::Plan {
            config,
            event,
            payload,
            sha,
            commit_message,
            pr_commits,
            release_body,
            title,
            branch_pattern,
            policy,
            no_annotate,
        } => {
            let inputs = PlanInputs {
                event,
                payload,
                sha,
                commit_message,
                pr_commits,
                release_body,
                title,
                branch_pattern,
                annotate: !no_annotate,
            };
            cmd_plan(&config, policy, inputs).await
        }
    }
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

fn cmd_validate(config: &Path, policy: FailurePolicy) -> Result<()> {
    let table = storylink_core::load_rule_table(config)
        .with_context(|| format!("Failed to load rule table: {:?}", config))?;
    let report = storylink_core::validate(&table);

    println!("{}", render_report(&table, &report));

    let result = report.enforce(policy);
    storylink_core::emit_config_validated(table.len(), report.findings.len(), result.is_ok());
    result.with_context(|| format!("{:?} failed validation", config))
}

fn render_report(table: &RuleTable, report: &ValidationReport) -> String {
    let mut out = format!(
        "{} rule(s), {} finding(s)",
        table.len(),
        report.findings.len()
    );
    for severity in [Severity::Error, Severity::Warning, Severity::Advisory] {
        for finding in report.findings.iter().filter(|f| f.severity == severity) {
            out.push_str(&format!("\n  {}", finding));
        }
    }
    out
}

// ---------------------------------------------------------------------------
// resolve
// ---------------------------------------------------------------------------

fn cmd_resolve(config: &Path, event: String, action: Option<String>, branch: String) -> Result<()> {
    let table = storylink_core::load_rule_table(config)
        .with_context(|| format!("Failed to load rule table: {:?}", config))?;
    let raw = RawEventDescriptor {
        kind: Some(event),
        sub_type: action,
        branch: Some(branch),
    };

    let target = resolve_raw(&raw, &table).with_context(|| {
        format!(
            "No rule matches {} on '{}'",
            raw.kind.as_deref().unwrap_or_default(),
            raw.branch.as_deref().unwrap_or_default()
        )
    })?;
    match &target.name {
        Some(name) => println!("{} ({}) via rule #{}", target.id, name, target.rule_index),
        None => println!("{} via rule #{}", target.id, target.rule_index),
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// extract
// ---------------------------------------------------------------------------

fn cmd_extract(all: bool, file: Option<&Path>, text: Option<String>) -> Result<()> {
    let text = match (file, text) {
        (Some(path), _) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read text file: {:?}", path))?,
        (None, Some(text)) => text,
        (None, None) => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            buf
        }
    };

    for id in extract_ids(&text, all) {
        println!("{}", id);
    }
    Ok(())
}

fn extract_ids(text: &str, all: bool) -> Vec<StoryId> {
    if all {
        extract_all(text)
    } else {
        extract_one(text).into_iter().collect()
    }
}

// ---------------------------------------------------------------------------
// plan
// ---------------------------------------------------------------------------

struct PlanInputs {
    event: String,
    payload: PathBuf,
    sha: Option<String>,
    commit_message: Option<PathBuf>,
    pr_commits: Option<PathBuf>,
    release_body: Option<PathBuf>,
    title: Option<String>,
    branch_pattern: String,
    annotate: bool,
}

#[derive(Debug, Serialize)]
struct PlanOutput {
    event: EventContext,
    outcome: SyncOutcome,
    moves: Vec<(StoryId, TargetId)>,
}

async fn cmd_plan(config: &Path, policy: FailurePolicy, inputs: PlanInputs) -> Result<()> {
    let (table, _report) = load_checked(config, policy)
        .with_context(|| format!("Failed to load rule table: {:?}", config))?;

    let plan = build_plan(table, inputs).await?;
    println!("{}", serde_json::to_string_pretty(&plan)?);
    METRICS.flush();
    Ok(())
}

async fn build_plan(table: RuleTable, inputs: PlanInputs) -> Result<PlanOutput> {
    let payload = std::fs::read(&inputs.payload)
        .with_context(|| format!("Failed to read payload: {:?}", inputs.payload))?;
    let mut ctx = decode_event(&inputs.event, &payload)
        .with_context(|| format!("Invalid {} payload", inputs.event))?;
    if let Some(sha) = inputs.sha {
        ctx.sha = Some(sha);
    }
    let pattern = BranchIdPattern::new(&inputs.branch_pattern)?;

    let mut host = InMemoryHost::new();
    if let (Some(sha), Some(path)) = (ctx.sha.as_deref(), inputs.commit_message.as_ref()) {
        let message = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read commit message: {:?}", path))?;
        host = host.with_commit(sha, message);
    }

    let pr_commits: BTreeMap<u64, Vec<String>> = match &inputs.pr_commits {
        Some(path) => read_json_file(path)?,
        None => BTreeMap::new(),
    };
    if let Some(sha) = ctx.sha.as_deref() {
        host = host.with_pull_requests(sha, pr_commits.keys().copied().collect());
    }
    for (number, messages) in &pr_commits {
        let title = if ctx.pull_request == Some(*number) {
            inputs.title.clone().unwrap_or_default()
        } else {
            String::new()
        };
        let messages: Vec<&str> = messages.iter().map(String::as_str).collect();
        host = host.with_pull_request(*number, title, &messages);
    }
    if let (Some(number), Some(title)) = (ctx.pull_request, inputs.title.as_ref()) {
        if !pr_commits.contains_key(&number) {
            host = host.with_pull_request(number, title.clone(), &[]);
        }
    }

    if let Some(path) = &inputs.release_body {
        let body = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read release body: {:?}", path))?;
        host = host.with_release_body(body);
    }

    let tracker = Arc::new(RecordingTracker::new());
    let sync = StorySync::new(Arc::new(host), tracker.clone(), table)
        .with_branch_pattern(pattern)
        .with_title_annotation(inputs.annotate && inputs.title.is_some());

    let outcome = sync.run(&ctx).await;
    info!(
        target_column = ?outcome.target().map(|t| t.id.to_string()),
        "plan complete"
    );

    Ok(PlanOutput {
        event: ctx,
        outcome,
        moves: tracker.moves(),
    })
}

fn read_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read JSON file: {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {:?}", path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use storylink_core::TitleUpdate;

    const TABLE: &str = r#"{"validEvents": [
        {"events": [{"eventName": "push"}], "branches": ["staging"], "columnId": "500000009"},
        {"events": [{"eventName": "pull_request"}], "branches": ["feature/*"], "columnId": "500001600"}
    ]}"#;

    fn write(dir: &tempfile::TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn inputs(event: &str, payload: PathBuf) -> PlanInputs {
        PlanInputs {
            event: event.to_string(),
            payload,
            sha: None,
            commit_message: None,
            pr_commits: None,
            release_body: None,
            title: None,
            branch_pattern: DEFAULT_BRANCH_PATTERN.to_string(),
            annotate: true,
        }
    }

    #[test]
    fn cli_parses_global_flags() {
        let cli = Cli::try_parse_from([
            "storylink",
            "--verbose",
            "resolve",
            "--config",
            "rules.json",
            "--event",
            "push",
            "--branch",
            "staging",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Resolve { event, branch, .. } => {
                assert_eq!(event, "push");
                assert_eq!(branch, "staging");
            }
            _ => panic!("Expected Resolve"),
        }
    }

    #[test]
    fn cli_rejects_unknown_policy() {
        let result = Cli::try_parse_from(["storylink", "validate", "--policy", "sometimes"]);
        assert!(result.is_err());
    }

    #[test]
    fn extract_first_or_all() {
        let text = "a [sc-1] b [sc-2]";
        assert_eq!(extract_ids(text, false), vec![StoryId(1)]);
        assert_eq!(extract_ids(text, true), vec![StoryId(1), StoryId(2)]);
        assert!(extract_ids("nothing", true).is_empty());
    }

    #[test]
    fn validate_passes_clean_table() {
        let dir = tempfile::tempdir().unwrap();
        let config = write(&dir, "rules.json", TABLE);
        assert!(cmd_validate(&config, FailurePolicy::AbortOnWarning).is_ok());
    }

    #[test]
    fn validate_fails_empty_table() {
        let dir = tempfile::tempdir().unwrap();
        let config = write(&dir, "rules.json", r#"{"validEvents": []}"#);
        assert!(cmd_validate(&config, FailurePolicy::AbortOnError).is_err());
        assert!(cmd_validate(&config, FailurePolicy::LogOnly).is_ok());
    }

    #[test]
    fn resolve_reports_missing_target() {
        let dir = tempfile::tempdir().unwrap();
        let config = write(&dir, "rules.json", TABLE);
        assert!(cmd_resolve(&config, "push".into(), None, "staging".into()).is_ok());
        assert!(cmd_resolve(&config, "push".into(), None, "nowhere".into()).is_err());
    }

    #[tokio::test]
    async fn plan_push_uses_pull_request_commits() {
        let dir = tempfile::tempdir().unwrap();
        let payload = write(
            &dir,
            "event.json",
            r#"{"ref": "refs/heads/staging", "after": "abc"}"#,
        );
        let commits = write(&dir, "commits.json", r#"{"7": ["one [sc-10]", "two [sc-11]"]}"#);
        let message = write(&dir, "message.txt", "merge [sc-1]");

        let mut inputs = inputs("push", payload);
        inputs.pr_commits = Some(commits);
        inputs.commit_message = Some(message);

        let plan = build_plan(RuleTable::from_json_str(TABLE).unwrap(), inputs)
            .await
            .unwrap();
        let staging = TargetId::new("500000009");
        assert_eq!(
            plan.moves,
            vec![
                (StoryId(1), staging.clone()),
                (StoryId(10), staging.clone()),
                (StoryId(11), staging),
            ]
        );
    }

    #[tokio::test]
    async fn plan_pull_request_annotates_given_title() {
        let dir = tempfile::tempdir().unwrap();
        let payload = write(
            &dir,
            "event.json",
            r#"{"action": "opened", "pull_request": {"number": 4, "head": {"ref": "feature/sc-5-x"}}}"#,
        );
        let mut inputs = inputs("pull_request", payload);
        inputs.title = Some("Add x".to_string());

        let plan = build_plan(RuleTable::from_json_str(TABLE).unwrap(), inputs)
            .await
            .unwrap();
        match plan.outcome {
            SyncOutcome::Updated(report) => assert_eq!(
                report.title,
                TitleUpdate::Updated {
                    title: "Add x [sc-5]".to_string()
                }
            ),
            other => panic!("Expected Updated, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn plan_rejects_invalid_branch_pattern() {
        let dir = tempfile::tempdir().unwrap();
        let payload = write(&dir, "event.json", r#"{"ref": "refs/heads/staging"}"#);
        let mut inputs = inputs("push", payload);
        inputs.branch_pattern = "sc-\\d+".to_string();

        assert!(build_plan(RuleTable::from_json_str(TABLE).unwrap(), inputs)
            .await
            .is_err());
    }
}

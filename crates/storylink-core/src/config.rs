//! Runtime settings and rule-table loading.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::branch::{BranchIdPattern, DEFAULT_BRANCH_PATTERN};
use crate::domain::error::{ConfigError, PatternError};
use crate::domain::rule::RuleTable;
use crate::obs;
use crate::validator::{validate, FailurePolicy, ValidationReport};

/// Rule-table location used when none is configured.
pub const DEFAULT_CONFIG_PATH: &str = ".github/shortcut_configuration.json";

/// Settings shared by every entry point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub config_path: PathBuf,
    pub branch_pattern: String,
    pub policy: FailurePolicy,
    pub annotate_titles: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
            branch_pattern: DEFAULT_BRANCH_PATTERN.to_string(),
            policy: FailurePolicy::default(),
            annotate_titles: true,
        }
    }
}

impl Settings {
    /// Compile the configured branch id pattern.
    pub fn branch_id_pattern(&self) -> Result<BranchIdPattern, PatternError> {
        BranchIdPattern::new(&self.branch_pattern)
    }

    /// Load the rule table at `config_path` and enforce `policy` on it.
    pub fn load_checked(&self) -> Result<(RuleTable, ValidationReport), ConfigError> {
        load_checked(&self.config_path, self.policy)
    }
}

/// Read and decode the rule table at `path`.
///
/// # Errors
///
/// - `ConfigError::Read`: the file cannot be read.
/// - `ConfigError::Decode`: the file is not a rule table.
pub fn load_rule_table(path: impl AsRef<Path>) -> Result<RuleTable, ConfigError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let table = RuleTable::from_json_slice(&bytes)?;
    tracing::debug!(path = %path.display(), rules = table.len(), "rule table loaded");
    Ok(table)
}

/// Load the rule table at `path`, validate it, and apply `policy`.
///
/// The report is returned alongside the table so callers can print it.
pub fn load_checked(
    path: impl AsRef<Path>,
    policy: FailurePolicy,
) -> Result<(RuleTable, ValidationReport), ConfigError> {
    let table = load_rule_table(path)?;
    let report = validate(&table);
    let outcome = report.enforce(policy);
    obs::emit_config_validated(table.len(), report.findings.len(), outcome.is_ok());
    outcome?;
    Ok((table, report))
}

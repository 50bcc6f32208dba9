//! Domain-level error taxonomy for storylink.

/// Errors produced while decoding an event into a typed descriptor.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EventError {
    #[error("unknown event kind: {kind} (valid kinds are: {valid})")]
    UnknownEventKind { kind: String, valid: String },

    #[error("the type {sub_type} on {kind} is not supported (valid types are: {valid})")]
    UnsupportedSubType {
        kind: String,
        sub_type: String,
        valid: String,
    },

    #[error("event kind must not be empty")]
    MissingKind,

    #[error("ref {0} is a tag, not a branch")]
    TagRef(String),

    #[error("malformed {kind} payload: {reason}")]
    MalformedPayload { kind: String, reason: String },
}

/// Errors produced by the rule matcher's precondition checks.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MatchError {
    #[error("a branch name is required")]
    MissingBranch,
}

/// Errors produced when building a branch id pattern.
#[derive(Debug, thiserror::Error)]
pub enum PatternError {
    #[error("invalid branch pattern '{pattern}': {source}")]
    Invalid {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("branch pattern '{pattern}' must have exactly one capture group, found {groups}")]
    CaptureGroups { pattern: String, groups: usize },
}

/// Errors produced while loading or enforcing the rule table.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration is not a valid rule table: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("configuration rejected: {count} finding(s) at or above {threshold}: {summary}")]
    Rejected {
        count: usize,
        threshold: String,
        summary: String,
    },
}

/// Errors reported by external collaborators (version-control host, tracker).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollaboratorError {
    #[error("{operation} failed: {reason}")]
    Request { operation: String, reason: String },

    #[error("{0} not found")]
    NotFound(String),
}

impl CollaboratorError {
    pub fn request(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Request {
            operation: operation.into(),
            reason: reason.into(),
        }
    }
}

/// storylink errors.
#[derive(Debug, thiserror::Error)]
pub enum StorylinkError {
    #[error("event error: {0}")]
    Event(#[from] EventError),

    #[error("match error: {0}")]
    Match(#[from] MatchError),

    #[error("pattern error: {0}")]
    Pattern(#[from] PatternError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("collaborator error: {0}")]
    Collaborator(#[from] CollaboratorError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for storylink operations.
pub type Result<T> = std::result::Result<T, StorylinkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_sub_type_names_valid_options() {
        let err = EventError::UnsupportedSubType {
            kind: "pull_request".to_string(),
            sub_type: "published".to_string(),
            valid: "opened, closed".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("published"));
        assert!(msg.contains("pull_request"));
        assert!(msg.contains("opened, closed"));
    }

    #[test]
    fn test_rejected_config_display() {
        let err = ConfigError::Rejected {
            count: 2,
            threshold: "warning".to_string(),
            summary: "rule #0: branches is empty".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("2 finding(s)"));
        assert!(msg.contains("rule #0"));
    }

    #[test]
    fn test_collaborator_error_wraps_into_storylink_error() {
        let err: StorylinkError = CollaboratorError::request("get commit", "502").into();
        assert!(err.to_string().contains("get commit failed: 502"));
    }

    #[test]
    fn test_match_and_event_errors_wrap_separately() {
        let err: StorylinkError = MatchError::MissingBranch.into();
        assert!(matches!(err, StorylinkError::Match(MatchError::MissingBranch)));

        let err: StorylinkError = EventError::MissingKind.into();
        assert!(matches!(err, StorylinkError::Event(EventError::MissingKind)));
    }
}

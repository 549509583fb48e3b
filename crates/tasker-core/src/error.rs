//! Typed failure kinds for a task run.
//!
//! Every variant carries plain strings so a settled outcome can be memoized
//! and handed out again on repeated `execute()` calls.

/// Errors a task run can settle with.
///
/// `MissingTaskName` and `TaskNotFound` fire before any side effect (no
/// subscription, no launch). `LaunchFailed` and `PrimerFailed` fire after
/// subscriptions were made; those are released before the error surfaces.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RunError {
    #[error("no task name given")]
    MissingTaskName,

    #[error("no task named '{0}' found")]
    TaskNotFound(String),

    #[error("host rejected launch of task '{name}': {reason}")]
    LaunchFailed { name: String, reason: String },

    #[error("primer task failed to launch: {0}")]
    PrimerFailed(String),

    /// The host failed a request that is not itself a launch (currently only
    /// task enumeration). The host's message is passed through unchanged.
    #[error("host request failed: {0}")]
    HostFailure(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(RunError::MissingTaskName.to_string(), "no task name given");
        assert_eq!(
            RunError::TaskNotFound("build".to_string()).to_string(),
            "no task named 'build' found"
        );
        assert_eq!(
            RunError::LaunchFailed {
                name: "build".to_string(),
                reason: "busy".to_string()
            }
            .to_string(),
            "host rejected launch of task 'build': busy"
        );
    }

    #[test]
    fn errors_are_cloneable() {
        let err = RunError::PrimerFailed("boom".to_string());
        assert_eq!(err.clone(), err);
    }
}

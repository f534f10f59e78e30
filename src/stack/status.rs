// ABOUTME: Live stack status with derived predicates.
// ABOUTME: Maps a status name to the rollback action it calls for.

use std::fmt;

/// What a rollback should do for a stack in a given status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollbackChoice {
    /// The stack is not paused in a failed state.
    None,
    /// `CREATE_FAILED` / `UPDATE_FAILED` with rollback disabled.
    StartRollback,
    /// `UPDATE_ROLLBACK_FAILED`: continue, possibly skipping resources.
    ContinueUpdateRollback,
    /// `ROLLBACK_FAILED`: nothing left to do but delete.
    RollbackFailed,
}

/// A stack status name and its reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackStatus {
    name: String,
    reason: Option<String>,
}

impl StackStatus {
    pub fn new(name: impl Into<String>, reason: Option<String>) -> Self {
        Self {
            name: name.into(),
            reason,
        }
    }

    /// Status of a stack that does not exist.
    pub fn not_found() -> Self {
        Self::new("NOT_FOUND", Some("Stack not found during lookup".to_string()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn is_not_found(&self) -> bool {
        self.name == "NOT_FOUND"
    }

    /// The stack was created and immediately rolled back.
    pub fn is_creation_failure(&self) -> bool {
        matches!(self.name.as_str(), "ROLLBACK_COMPLETE" | "ROLLBACK_FAILED")
    }

    pub fn is_deleted(&self) -> bool {
        self.name.starts_with("DELETE_COMPLETE")
    }

    pub fn is_failure(&self) -> bool {
        self.name.ends_with("FAILED")
    }

    pub fn is_review_in_progress(&self) -> bool {
        self.name == "REVIEW_IN_PROGRESS"
    }

    /// An operation is still running. A stack awaiting change set review is not.
    pub fn is_in_progress(&self) -> bool {
        self.name.ends_with("_IN_PROGRESS") && !self.is_review_in_progress()
    }

    pub fn is_deploy_success(&self) -> bool {
        matches!(
            self.name.as_str(),
            "CREATE_COMPLETE" | "UPDATE_COMPLETE" | "IMPORT_COMPLETE"
        )
    }

    pub fn is_rollback_success(&self) -> bool {
        matches!(
            self.name.as_str(),
            "ROLLBACK_COMPLETE" | "UPDATE_ROLLBACK_COMPLETE"
        )
    }

    pub fn rollback_choice(&self) -> RollbackChoice {
        match self.name.as_str() {
            "CREATE_FAILED" | "UPDATE_FAILED" => RollbackChoice::StartRollback,
            "UPDATE_ROLLBACK_FAILED" => RollbackChoice::ContinueUpdateRollback,
            "ROLLBACK_FAILED" => RollbackChoice::RollbackFailed,
            _ => RollbackChoice::None,
        }
    }

    /// A rollback call can make progress from this status.
    pub fn is_rollbackable(&self) -> bool {
        matches!(
            self.rollback_choice(),
            RollbackChoice::StartRollback | RollbackChoice::ContinueUpdateRollback
        )
    }
}

impl fmt::Display for StackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            Some(reason) => write!(f, "{} ({})", self.name, reason),
            None => write!(f, "{}", self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(name: &str) -> StackStatus {
        StackStatus::new(name, None)
    }

    #[test]
    fn rollback_choice_table() {
        let cases = [
            ("CREATE_FAILED", RollbackChoice::StartRollback),
            ("UPDATE_FAILED", RollbackChoice::StartRollback),
            ("UPDATE_ROLLBACK_FAILED", RollbackChoice::ContinueUpdateRollback),
            ("ROLLBACK_FAILED", RollbackChoice::RollbackFailed),
            ("UPDATE_COMPLETE", RollbackChoice::None),
            ("CREATE_IN_PROGRESS", RollbackChoice::None),
            ("DELETE_FAILED", RollbackChoice::None),
        ];
        for (name, expected) in cases {
            assert_eq!(status(name).rollback_choice(), expected, "{name}");
        }
    }

    #[test]
    fn review_in_progress_is_not_in_progress() {
        assert!(status("UPDATE_IN_PROGRESS").is_in_progress());
        assert!(status("UPDATE_COMPLETE_CLEANUP_IN_PROGRESS").is_in_progress());
        assert!(!status("REVIEW_IN_PROGRESS").is_in_progress());
        assert!(status("REVIEW_IN_PROGRESS").is_review_in_progress());
    }

    #[test]
    fn creation_failure_statuses() {
        assert!(status("ROLLBACK_COMPLETE").is_creation_failure());
        assert!(status("ROLLBACK_FAILED").is_creation_failure());
        assert!(!status("UPDATE_ROLLBACK_COMPLETE").is_creation_failure());
    }

    #[test]
    fn success_predicates() {
        assert!(status("IMPORT_COMPLETE").is_deploy_success());
        assert!(!status("UPDATE_ROLLBACK_COMPLETE").is_deploy_success());
        assert!(status("UPDATE_ROLLBACK_COMPLETE").is_rollback_success());
        assert!(status("UPDATE_ROLLBACK_FAILED").is_failure());
        assert!(status("UPDATE_ROLLBACK_FAILED").is_rollbackable());
        assert!(!status("ROLLBACK_FAILED").is_rollbackable());
    }

    #[test]
    fn not_found_status() {
        let s = StackStatus::not_found();
        assert!(s.is_not_found());
        assert!(!s.is_deploy_success());
        assert_eq!(s.rollback_choice(), RollbackChoice::None);
    }

    #[test]
    fn display_includes_reason() {
        let s = StackStatus::new("UPDATE_FAILED", Some("boom".to_string()));
        assert_eq!(s.to_string(), "UPDATE_FAILED (boom)");
    }
}

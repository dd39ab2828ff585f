//! Deriving status conditions from the remote issue and merging them into the stored status.

use chrono::{DateTime, Utc};

use crate::ports::issues::RemoteIssue;
use crate::resource::{
    Condition, ConditionStatus, IssueStatus, CONDITION_ISSUE_HAS_PR, CONDITION_ISSUE_IS_OPEN,
};

/// The conditions derived from one remote issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueConditions {
    /// Whether the issue is open.
    pub issue_is_open: Condition,
    /// Whether a pull request is linked to the issue.
    pub issue_has_pr: Condition,
}

impl IssueConditions {
    /// Consumes the pair in a fixed order.
    #[must_use]
    pub fn into_vec(self) -> Vec<Condition> {
        vec![self.issue_is_open, self.issue_has_pr]
    }
}

/// Computes the conditions for `remote`. Pure.
#[must_use]
pub fn compute_conditions(remote: &RemoteIssue) -> IssueConditions {
    let issue_is_open = if remote.is_open() {
        Condition::new(
            CONDITION_ISSUE_IS_OPEN,
            ConditionStatus::True,
            "IssueIsOpen",
            "Issue is open",
        )
    } else {
        Condition::new(
            CONDITION_ISSUE_IS_OPEN,
            ConditionStatus::False,
            format!("IssueIs{}", remote.state),
            format!("Issue is {}", remote.state),
        )
    };

    let issue_has_pr = if remote.has_linked_change {
        Condition::new(
            CONDITION_ISSUE_HAS_PR,
            ConditionStatus::True,
            "IssueHasPR",
            "Issue has an open PR",
        )
    } else {
        Condition::new(CONDITION_ISSUE_HAS_PR, ConditionStatus::False, "IssueHasNoPR", "Issue has no PR")
    };

    IssueConditions { issue_is_open, issue_has_pr }
}

/// Merges `condition` into `status` when its status value differs from the
/// existing condition of the same type, or when that type is missing.
///
/// Reason and message alone never trigger a rewrite. On a rewrite the
/// transition time is set to `now` and the list stays sorted by type.
/// Returns whether anything changed.
pub fn apply_if_changed(status: &mut IssueStatus, mut condition: Condition, now: DateTime<Utc>) -> bool {
    match status.conditions.iter_mut().find(|c| c.type_ == condition.type_) {
        Some(existing) if existing.status == condition.status => false,
        Some(existing) => {
            condition.last_transition_time = Some(now);
            *existing = condition;
            true
        }
        None => {
            condition.last_transition_time = Some(now);
            let at = status.conditions.partition_point(|c| c.type_ < condition.type_);
            status.conditions.insert(at, condition);
            true
        }
    }
}

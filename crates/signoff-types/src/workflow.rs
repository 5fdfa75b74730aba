//! Workflow templates: ordered approver stages.
//!
//! A workflow is a flat chain of stages numbered from 1. The same user may
//! hold several stages; the chain advances one stage per signature, so
//! such a user signs once per stage they hold.

use crate::error::{SignoffError, SignoffResult};
use crate::id::{UserId, WorkflowId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Stages ───────────────────────────────────────────────────────────

/// One approver position in a workflow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowStage {
    /// Position in the chain, starting at 1.
    pub order: i32,
    /// The user who must sign at this position.
    pub approver: UserId,
}

impl WorkflowStage {
    pub fn new(order: i32, approver: UserId) -> Self {
        Self { order, approver }
    }
}

/// Validate a proposed stage list: non-empty, orders exactly `1..=N`.
///
/// Signing advances the chain by exactly one position, so a gap or a
/// duplicate order would leave stages that can never be reached or that
/// shadow each other. Both are rejected when the template is written.
pub fn validate_stages(stages: &[WorkflowStage]) -> SignoffResult<()> {
    if stages.is_empty() {
        return Err(SignoffError::Validation(
            "workflow must have at least one stage".to_string(),
        ));
    }

    let mut orders: Vec<i32> = stages.iter().map(|s| s.order).collect();
    orders.sort_unstable();
    for (index, order) in orders.iter().enumerate() {
        if *order != index as i32 + 1 {
            return Err(SignoffError::Validation(format!(
                "stage orders must run 1..={} without gaps or duplicates",
                stages.len()
            )));
        }
    }

    Ok(())
}

// ── Workflow definition ──────────────────────────────────────────────

/// A workflow template with its full stage chain.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub id: WorkflowId,
    pub name: String,
    /// Stages sorted by ascending order.
    pub stages: Vec<WorkflowStage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowDefinition {
    /// The terminal stage number. `finalize` is only legal here.
    pub fn max_order(&self) -> i32 {
        self.stages.iter().map(|s| s.order).max().unwrap_or(0)
    }

    /// The approver holding the given stage, if the stage exists.
    pub fn approver_at(&self, order: i32) -> Option<UserId> {
        self.stages
            .iter()
            .find(|s| s.order == order)
            .map(|s| s.approver)
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// All approver ids in stage order, including repeats.
    pub fn approvers(&self) -> Vec<UserId> {
        self.stages.iter().map(|s| s.approver).collect()
    }

    /// Validate the stored stage chain.
    pub fn validate(&self) -> SignoffResult<()> {
        validate_stages(&self.stages)
    }
}

// ── Listing DTO ──────────────────────────────────────────────────────

/// Workflow listing row: name plus chain length, without the stages.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowSummary {
    pub id: WorkflowId,
    pub name: String,
    pub stage_count: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stages(orders: &[(i32, i64)]) -> Vec<WorkflowStage> {
        orders
            .iter()
            .map(|(order, user)| WorkflowStage::new(*order, UserId::new(*user)))
            .collect()
    }

    #[test]
    fn contiguous_stages_validate() {
        assert!(validate_stages(&stages(&[(1, 10), (2, 11), (3, 10)])).is_ok());
    }

    #[test]
    fn empty_stage_list_is_rejected() {
        assert!(matches!(
            validate_stages(&[]),
            Err(SignoffError::Validation(_))
        ));
    }

    #[test]
    fn gapped_orders_are_rejected() {
        assert!(validate_stages(&stages(&[(1, 10), (3, 11)])).is_err());
    }

    #[test]
    fn duplicate_orders_are_rejected() {
        assert!(validate_stages(&stages(&[(1, 10), (1, 11), (2, 12)])).is_err());
    }

    #[test]
    fn orders_not_starting_at_one_are_rejected() {
        assert!(validate_stages(&stages(&[(2, 10), (3, 11)])).is_err());
    }

    #[test]
    fn approver_lookup_and_terminal_stage() {
        let def = WorkflowDefinition {
            id: WorkflowId::new(1),
            name: "release".to_string(),
            stages: stages(&[(1, 10), (2, 11), (3, 10)]),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        assert_eq!(def.max_order(), 3);
        assert_eq!(def.approver_at(2), Some(UserId::new(11)));
        assert_eq!(def.approver_at(3), Some(UserId::new(10)));
        assert_eq!(def.approver_at(4), None);
        assert_eq!(def.stage_count(), 3);
    }
}

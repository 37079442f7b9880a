//! Minimal-diff reconciliation of a parent's attached role set.
//!
//! The number of remote calls is proportional to the symmetric difference
//! between the declared and observed sets; unchanged members cost nothing.
//! Application is idempotent per edge, so a partially applied run is safe to
//! repeat.

use std::collections::BTreeSet;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use warpgate_client::services::gateway::{Attach, Detach};
use warpgate_client::{ClientError, RoleRelations};

use crate::models::ProvisionWarning;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleSetDiff {
    pub to_add: BTreeSet<Uuid>,
    pub to_remove: BTreeSet<Uuid>,
}

impl RoleSetDiff {
    pub fn between(desired: &BTreeSet<Uuid>, observed: &BTreeSet<Uuid>) -> Self {
        Self {
            to_add: desired.difference(observed).copied().collect(),
            to_remove: observed.difference(desired).copied().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

/// Create has no meaningful observed state, so grants go out first; on
/// Update removals run first because a failed removal is recoverable (the
/// edge can be re-removed next run) while a failed grant must surface
/// immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOrder {
    AdditionsFirst,
    RemovalsFirst,
}

#[derive(Debug, Default)]
pub struct ReconcileReport {
    pub added: Vec<Uuid>,
    pub removed: Vec<Uuid>,
    pub warnings: Vec<ProvisionWarning>,
}

impl ReconcileReport {
    /// The attached set after this application, starting from `observed`.
    /// Edges whose removal conflicted are still present.
    pub fn resulting_set(&self, observed: &BTreeSet<Uuid>) -> BTreeSet<Uuid> {
        let mut result = observed.clone();
        result.extend(self.added.iter().copied());
        for role_id in &self.removed {
            result.remove(role_id);
        }
        result
    }
}

pub async fn apply(
    relations: &dyn RoleRelations,
    cancel: &CancellationToken,
    diff: &RoleSetDiff,
    order: ApplyOrder,
) -> Result<ReconcileReport, ClientError> {
    let mut report = ReconcileReport::default();

    match order {
        ApplyOrder::AdditionsFirst => {
            add_all(relations, cancel, &diff.to_add, &mut report).await?;
            remove_all(relations, cancel, &diff.to_remove, &mut report).await?;
        }
        ApplyOrder::RemovalsFirst => {
            remove_all(relations, cancel, &diff.to_remove, &mut report).await?;
            add_all(relations, cancel, &diff.to_add, &mut report).await?;
        }
    }

    if !diff.is_empty() {
        tracing::info!(
            parent_id = %relations.parent_id(),
            added = report.added.len(),
            removed = report.removed.len(),
            warnings = report.warnings.len(),
            "Reconciled role set"
        );
    }

    Ok(report)
}

async fn add_all(
    relations: &dyn RoleRelations,
    cancel: &CancellationToken,
    role_ids: &BTreeSet<Uuid>,
    report: &mut ReconcileReport,
) -> Result<(), ClientError> {
    for role_id in role_ids {
        // "Already present" is the desired postcondition, fold it in.
        match relations.attach(cancel, *role_id).await? {
            Attach::Added | Attach::AlreadyPresent => report.added.push(*role_id),
        }
    }
    Ok(())
}

async fn remove_all(
    relations: &dyn RoleRelations,
    cancel: &CancellationToken,
    role_ids: &BTreeSet<Uuid>,
    report: &mut ReconcileReport,
) -> Result<(), ClientError> {
    for role_id in role_ids {
        match relations.detach(cancel, *role_id).await? {
            Detach::Removed => report.removed.push(*role_id),
            Detach::Conflict => {
                tracing::warn!(
                    parent_id = %relations.parent_id(),
                    role_id = %role_id,
                    "Could not detach role, remote reported a conflict"
                );
                report.warnings.push(ProvisionWarning::RemovalConflict {
                    parent_id: relations.parent_id(),
                    role_id: *role_id,
                });
            }
        }
    }
    Ok(())
}

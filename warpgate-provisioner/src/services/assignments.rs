//! Standalone role-assignment declarations.
//!
//! A `RoleAssignmentSpec` pins the full role set of one parent without
//! owning the parent record itself. Edges are never addressed by an
//! identifier of their own; existence of the (parent, role) pair is the
//! whole state.

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use warpgate_client::{parse_identifier, RoleRelations, WarpgateGateway};

use crate::error::ProvisionError;
use crate::models::{Applied, ProvisionWarning, RoleAssignmentSpec, RoleAssignmentState};
use crate::services::reconcile::{self, ApplyOrder, RoleSetDiff};
use crate::services::{ids_as_strings, parse_role_ids};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentKind {
    Target,
    User,
}

pub struct RoleAssignmentController {
    gateway: Arc<WarpgateGateway>,
    parent_kind: ParentKind,
}

impl RoleAssignmentController {
    pub fn new(gateway: Arc<WarpgateGateway>, parent_kind: ParentKind) -> Self {
        Self {
            gateway,
            parent_kind,
        }
    }

    pub fn for_targets(gateway: Arc<WarpgateGateway>) -> Self {
        Self::new(gateway, ParentKind::Target)
    }

    pub fn for_users(gateway: Arc<WarpgateGateway>) -> Self {
        Self::new(gateway, ParentKind::User)
    }

    fn relations(&self, parent_id: Uuid) -> Box<dyn RoleRelations + '_> {
        match self.parent_kind {
            ParentKind::Target => Box::new(self.gateway.target_roles(parent_id)),
            ParentKind::User => Box::new(self.gateway.user_roles(parent_id)),
        }
    }

    pub async fn create(
        &self,
        cancel: &CancellationToken,
        spec: &RoleAssignmentSpec,
    ) -> Result<Applied<RoleAssignmentState>, ProvisionError> {
        self.reconcile(cancel, spec, ApplyOrder::AdditionsFirst)
            .await
    }

    pub async fn read(
        &self,
        cancel: &CancellationToken,
        parent_id: &str,
    ) -> Result<RoleAssignmentState, ProvisionError> {
        let parent = parse_identifier(parent_id)?;
        let relations = self.relations(parent);
        let observed = relations.observed(cancel).await?;

        Ok(RoleAssignmentState {
            parent_id: parent.to_string(),
            role_ids: observed.iter().map(|role| role.id.to_string()).collect(),
        })
    }

    pub async fn update(
        &self,
        cancel: &CancellationToken,
        spec: &RoleAssignmentSpec,
    ) -> Result<Applied<RoleAssignmentState>, ProvisionError> {
        self.reconcile(cancel, spec, ApplyOrder::RemovalsFirst)
            .await
    }

    /// Detach every declared edge. Conflicts are reported, not failed on,
    /// since the parent or role may already be gone.
    pub async fn delete(
        &self,
        cancel: &CancellationToken,
        spec: &RoleAssignmentSpec,
    ) -> Result<Vec<ProvisionWarning>, ProvisionError> {
        let parent = parse_identifier(&spec.parent_id)?;
        let declared = parse_role_ids(&spec.role_ids)?;

        let diff = RoleSetDiff {
            to_add: BTreeSet::new(),
            to_remove: declared,
        };
        let relations = self.relations(parent);
        let report =
            reconcile::apply(relations.as_ref(), cancel, &diff, ApplyOrder::RemovalsFirst).await?;

        Ok(report.warnings)
    }

    async fn reconcile(
        &self,
        cancel: &CancellationToken,
        spec: &RoleAssignmentSpec,
        order: ApplyOrder,
    ) -> Result<Applied<RoleAssignmentState>, ProvisionError> {
        let parent = parse_identifier(&spec.parent_id)?;
        let desired = parse_role_ids(&spec.role_ids)?;

        let relations = self.relations(parent);
        let observed: BTreeSet<Uuid> = relations
            .observed(cancel)
            .await?
            .iter()
            .map(|role| role.id)
            .collect();

        let diff = RoleSetDiff::between(&desired, &observed);
        let report = reconcile::apply(relations.as_ref(), cancel, &diff, order).await?;

        Ok(Applied {
            state: RoleAssignmentState {
                parent_id: parent.to_string(),
                role_ids: ids_as_strings(&report.resulting_set(&observed)),
            },
            warnings: report.warnings,
        })
    }
}

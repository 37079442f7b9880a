//! A common seam over the two many-to-many role endpoints.
//!
//! Targets and users both attach roles through the same verb shapes; the
//! reconciler is written once against this trait and does not care which
//! parent kind it is working on.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::ClientError;
use crate::services::gateway::{Attach, Detach, WarpgateGateway};
use crate::wire::RoleRecord;

#[async_trait]
pub trait RoleRelations: Send + Sync {
    fn parent_id(&self) -> Uuid;

    /// Fetch the currently attached roles from the remote.
    async fn observed(&self, cancel: &CancellationToken) -> Result<Vec<RoleRecord>, ClientError>;

    async fn attach(
        &self,
        cancel: &CancellationToken,
        role_id: Uuid,
    ) -> Result<Attach, ClientError>;

    async fn detach(
        &self,
        cancel: &CancellationToken,
        role_id: Uuid,
    ) -> Result<Detach, ClientError>;
}

pub struct TargetRoleRelations<'a> {
    gateway: &'a WarpgateGateway,
    target_id: Uuid,
}

impl<'a> TargetRoleRelations<'a> {
    pub(crate) fn new(gateway: &'a WarpgateGateway, target_id: Uuid) -> Self {
        Self { gateway, target_id }
    }
}

#[async_trait]
impl RoleRelations for TargetRoleRelations<'_> {
    fn parent_id(&self) -> Uuid {
        self.target_id
    }

    async fn observed(&self, cancel: &CancellationToken) -> Result<Vec<RoleRecord>, ClientError> {
        self.gateway.list_target_roles(cancel, self.target_id).await
    }

    async fn attach(
        &self,
        cancel: &CancellationToken,
        role_id: Uuid,
    ) -> Result<Attach, ClientError> {
        self.gateway
            .add_target_role(cancel, self.target_id, role_id)
            .await
    }

    async fn detach(
        &self,
        cancel: &CancellationToken,
        role_id: Uuid,
    ) -> Result<Detach, ClientError> {
        self.gateway
            .remove_target_role(cancel, self.target_id, role_id)
            .await
    }
}

pub struct UserRoleRelations<'a> {
    gateway: &'a WarpgateGateway,
    user_id: Uuid,
}

impl<'a> UserRoleRelations<'a> {
    pub(crate) fn new(gateway: &'a WarpgateGateway, user_id: Uuid) -> Self {
        Self { gateway, user_id }
    }
}

#[async_trait]
impl RoleRelations for UserRoleRelations<'_> {
    fn parent_id(&self) -> Uuid {
        self.user_id
    }

    async fn observed(&self, cancel: &CancellationToken) -> Result<Vec<RoleRecord>, ClientError> {
        self.gateway.list_user_roles(cancel, self.user_id).await
    }

    async fn attach(
        &self,
        cancel: &CancellationToken,
        role_id: Uuid,
    ) -> Result<Attach, ClientError> {
        self.gateway
            .add_user_role(cancel, self.user_id, role_id)
            .await
    }

    async fn detach(
        &self,
        cancel: &CancellationToken,
        role_id: Uuid,
    ) -> Result<Detach, ClientError> {
        self.gateway
            .remove_user_role(cancel, self.user_id, role_id)
            .await
    }
}

//! Lifecycle of a declared role. Roles have no options and no relations of
//! their own, so this is the plain shape of the state machine.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use validator::Validate;

use warpgate_client::wire::RoleDataRequest;
use warpgate_client::{parse_identifier, WarpgateGateway};

use crate::error::ProvisionError;
use crate::models::{Applied, ProvisionWarning, ReadOutcome, RoleSpec, RoleState};

pub struct RoleController {
    gateway: Arc<WarpgateGateway>,
}

impl RoleController {
    pub fn new(gateway: Arc<WarpgateGateway>) -> Self {
        Self { gateway }
    }

    pub async fn create(
        &self,
        cancel: &CancellationToken,
        spec: &RoleSpec,
    ) -> Result<RoleState, ProvisionError> {
        spec.validate()?;

        let request = RoleDataRequest {
            name: spec.name.clone(),
        };
        let record = self.gateway.create_role(cancel, &request).await?;
        tracing::info!(role_id = %record.id, name = %record.name, "Created role");

        Ok(RoleState {
            id: record.id.to_string(),
            name: record.name,
        })
    }

    pub async fn read(
        &self,
        cancel: &CancellationToken,
        id: &str,
    ) -> Result<ReadOutcome<RoleState>, ProvisionError> {
        let id = parse_identifier(id)?;

        match self.gateway.get_role(cancel, id).await? {
            None => {
                tracing::warn!(role_id = %id, "Role deleted out-of-band, dropping local record");
                Ok(ReadOutcome::Drifted)
            }
            Some(record) => Ok(ReadOutcome::Live(RoleState {
                id: record.id.to_string(),
                name: record.name,
            })),
        }
    }

    pub async fn update(
        &self,
        cancel: &CancellationToken,
        spec: &RoleSpec,
    ) -> Result<Applied<RoleState>, ProvisionError> {
        spec.validate()?;
        let id = spec
            .id
            .as_deref()
            .ok_or(ProvisionError::MissingIdentifier { entity: "role" })?;
        let id = parse_identifier(id)?;

        let request = RoleDataRequest {
            name: spec.name.clone(),
        };
        let record = self.gateway.update_role(cancel, id, &request).await?;

        let mut warnings = Vec::new();
        if record.id != id || record.name != spec.name {
            tracing::warn!(
                requested_id = %id,
                requested_name = %spec.name,
                returned_id = %record.id,
                returned_name = %record.name,
                "Updated role differs from requested"
            );
            warnings.push(ProvisionWarning::EchoMismatch {
                expected_id: id,
                expected_name: spec.name.clone(),
                returned_id: record.id,
                returned_name: record.name.clone(),
            });
        }

        Ok(Applied {
            state: RoleState {
                id: id.to_string(),
                name: record.name,
            },
            warnings,
        })
    }

    pub async fn delete(
        &self,
        cancel: &CancellationToken,
        id: &str,
    ) -> Result<(), ProvisionError> {
        let id = parse_identifier(id)?;
        self.gateway.delete_role(cancel, id).await?;
        tracing::info!(role_id = %id, "Deleted role");
        Ok(())
    }

    pub async fn list(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<RoleState>, ProvisionError> {
        let records = self.gateway.list_roles(cancel).await?;
        Ok(records
            .into_iter()
            .map(|record| RoleState {
                id: record.id.to_string(),
                name: record.name,
            })
            .collect())
    }
}

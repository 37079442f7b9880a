//! Lifecycle of a declared target.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use validator::Validate;

use warpgate_client::models::TargetOptions;
use warpgate_client::wire::{DecodeError, TargetDataRequest, TargetOptionsRecord, TargetRecord};
use warpgate_client::{parse_identifier, ClientError, WarpgateGateway};

use crate::error::ProvisionError;
use crate::models::{Applied, ProvisionWarning, ReadOutcome, TargetSpec, TargetState};
use crate::services::reconcile::{self, ApplyOrder, RoleSetDiff};
use crate::services::{ids_as_strings, parse_role_ids};

pub struct TargetController {
    gateway: Arc<WarpgateGateway>,
}

impl TargetController {
    pub fn new(gateway: Arc<WarpgateGateway>) -> Self {
        Self { gateway }
    }

    pub async fn create(
        &self,
        cancel: &CancellationToken,
        spec: &TargetSpec,
    ) -> Result<Applied<TargetState>, ProvisionError> {
        spec.validate()?;
        spec.options.validate()?;
        let desired_roles = parse_role_ids(&spec.allow_roles)?;

        let request = TargetDataRequest {
            name: spec.name.clone(),
            options: TargetOptionsRecord::from(&spec.options),
        };
        let record = self.gateway.create_target(cancel, &request).await?;
        tracing::info!(target_id = %record.id, name = %record.name, "Created target");

        let id = record.id;
        let options = TargetOptions::try_from(record.options).map_err(ClientError::from)?;

        // The remote may grant roles of its own on creation.
        let observed = parse_role_ids(&record.allow_roles)?;
        let diff = RoleSetDiff::between(&desired_roles, &observed);
        let relations = self.gateway.target_roles(id);
        let report =
            reconcile::apply(&relations, cancel, &diff, ApplyOrder::AdditionsFirst).await?;

        Ok(Applied {
            state: TargetState {
                id: id.to_string(),
                name: record.name,
                allow_roles: ids_as_strings(&report.resulting_set(&observed)),
                options,
            },
            warnings: report.warnings,
        })
    }

    pub async fn read(
        &self,
        cancel: &CancellationToken,
        id: &str,
    ) -> Result<ReadOutcome<TargetState>, ProvisionError> {
        let id = parse_identifier(id)?;

        match self.gateway.get_target(cancel, id).await? {
            None => {
                tracing::warn!(target_id = %id, "Target deleted out-of-band, dropping local record");
                Ok(ReadOutcome::Drifted)
            }
            Some(record) => {
                // An uninterpretable payload on this authoritative path is fatal.
                let options =
                    TargetOptions::try_from(record.options).map_err(ClientError::from)?;
                Ok(ReadOutcome::Live(TargetState {
                    id: record.id.to_string(),
                    name: record.name,
                    allow_roles: record.allow_roles.into_iter().collect(),
                    options,
                }))
            }
        }
    }

    /// Full-replace update of the base record, then a separate reconciliation
    /// of the attached roles. Removals run first; a removal conflict is a
    /// warning while a failed grant aborts.
    pub async fn update(
        &self,
        cancel: &CancellationToken,
        spec: &TargetSpec,
    ) -> Result<Applied<TargetState>, ProvisionError> {
        spec.validate()?;
        spec.options.validate()?;
        let id = spec
            .id
            .as_deref()
            .ok_or(ProvisionError::MissingIdentifier { entity: "target" })?;
        let id = parse_identifier(id)?;
        let desired_roles = parse_role_ids(&spec.allow_roles)?;

        let request = TargetDataRequest {
            name: spec.name.clone(),
            options: TargetOptionsRecord::from(&spec.options),
        };
        let record = self.gateway.update_target(cancel, id, &request).await?;

        let mut warnings = Vec::new();
        if record.id != id || record.name != spec.name {
            tracing::warn!(
                requested_id = %id,
                requested_name = %spec.name,
                returned_id = %record.id,
                returned_name = %record.name,
                "Updated target differs from requested"
            );
            warnings.push(ProvisionWarning::EchoMismatch {
                expected_id: id,
                expected_name: spec.name.clone(),
                returned_id: record.id,
                returned_name: record.name.clone(),
            });
        }

        let TargetRecord {
            name,
            allow_roles,
            options,
            ..
        } = record;
        let options = TargetOptions::try_from(options).map_err(ClientError::from)?;

        let observed = parse_role_ids(&allow_roles)?;
        let diff = RoleSetDiff::between(&desired_roles, &observed);
        let relations = self.gateway.target_roles(id);
        let mut report =
            reconcile::apply(&relations, cancel, &diff, ApplyOrder::RemovalsFirst).await?;
        warnings.append(&mut report.warnings);

        Ok(Applied {
            state: TargetState {
                id: id.to_string(),
                name,
                allow_roles: ids_as_strings(&report.resulting_set(&observed)),
                options,
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
        self.gateway.delete_target(cancel, id).await?;
        tracing::info!(target_id = %id, "Deleted target");
        Ok(())
    }

    /// All targets speaking SSH. Targets of kinds this client does not model
    /// are filtered out, not failed on.
    pub async fn list_ssh(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<TargetState>, ProvisionError> {
        self.list_by_kind(cancel, "Ssh").await
    }

    /// All targets speaking HTTP.
    pub async fn list_http(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<TargetState>, ProvisionError> {
        self.list_by_kind(cancel, "Http").await
    }

    async fn list_by_kind(
        &self,
        cancel: &CancellationToken,
        kind: &'static str,
    ) -> Result<Vec<TargetState>, ProvisionError> {
        let records = self.gateway.list_targets(cancel).await?;

        let mut states = Vec::new();
        for record in records {
            let options = match TargetOptions::try_from(record.options) {
                Ok(options) => options,
                // Not an error here: the list is heterogeneous and we are
                // filtering for one protocol. A malformed record of a known
                // kind still fails below.
                Err(DecodeError::UnknownVariant { record: "target options", kind: found }) => {
                    tracing::debug!(target_id = %record.id, kind = %found, "Skipping target of unmodeled kind");
                    continue;
                }
                Err(err) => return Err(ClientError::from(err).into()),
            };
            if options.kind() != kind {
                continue;
            }
            states.push(TargetState {
                id: record.id.to_string(),
                name: record.name,
                allow_roles: record.allow_roles.into_iter().collect(),
                options,
            });
        }
        Ok(states)
    }
}

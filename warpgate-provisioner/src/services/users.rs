//! Lifecycle of a declared user: base record with its credential set, plus
//! role membership reconciled separately from the record itself.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use validator::Validate;

use warpgate_client::models::UserCredential;
use warpgate_client::wire::{UserCredentialRecord, UserDataRequest, UserRecord};
use warpgate_client::{parse_identifier, ClientError, WarpgateGateway};

use crate::error::ProvisionError;
use crate::models::{Applied, ProvisionWarning, ReadOutcome, UserSpec, UserState};
use crate::services::reconcile::{self, ApplyOrder, RoleSetDiff};
use crate::services::{ids_as_strings, parse_role_ids};

pub struct UserController {
    gateway: Arc<WarpgateGateway>,
}

impl UserController {
    pub fn new(gateway: Arc<WarpgateGateway>) -> Self {
        Self { gateway }
    }

    pub async fn create(
        &self,
        cancel: &CancellationToken,
        spec: &UserSpec,
    ) -> Result<Applied<UserState>, ProvisionError> {
        spec.validate()?;
        let desired_roles = parse_role_ids(&spec.roles)?;

        let request = UserDataRequest {
            username: spec.username.clone(),
            credentials: encode_credentials(&spec.credentials),
        };
        let record = self.gateway.create_user(cancel, &request).await?;
        tracing::info!(user_id = %record.id, username = %record.username, "Created user");

        let id = record.id;
        let credentials = decode_credentials(record.credentials)?;

        let observed = parse_role_ids(&record.roles)?;
        let diff = RoleSetDiff::between(&desired_roles, &observed);
        let relations = self.gateway.user_roles(id);
        let report =
            reconcile::apply(&relations, cancel, &diff, ApplyOrder::AdditionsFirst).await?;

        Ok(Applied {
            state: UserState {
                id: id.to_string(),
                username: record.username,
                roles: ids_as_strings(&report.resulting_set(&observed)),
                credentials,
            },
            warnings: report.warnings,
        })
    }

    pub async fn read(
        &self,
        cancel: &CancellationToken,
        id: &str,
    ) -> Result<ReadOutcome<UserState>, ProvisionError> {
        let id = parse_identifier(id)?;

        match self.gateway.get_user(cancel, id).await? {
            None => {
                tracing::warn!(user_id = %id, "User deleted out-of-band, dropping local record");
                Ok(ReadOutcome::Drifted)
            }
            Some(record) => {
                let credentials = decode_credentials(record.credentials)?;
                Ok(ReadOutcome::Live(UserState {
                    id: record.id.to_string(),
                    username: record.username,
                    roles: record.roles.into_iter().collect(),
                    credentials,
                }))
            }
        }
    }

    /// Full-replace update: the declared credential set overwrites whatever
    /// the remote holds, shrinking it when the declaration shrank.
    pub async fn update(
        &self,
        cancel: &CancellationToken,
        spec: &UserSpec,
    ) -> Result<Applied<UserState>, ProvisionError> {
        spec.validate()?;
        let id = spec
            .id
            .as_deref()
            .ok_or(ProvisionError::MissingIdentifier { entity: "user" })?;
        let id = parse_identifier(id)?;
        let desired_roles = parse_role_ids(&spec.roles)?;

        let request = UserDataRequest {
            username: spec.username.clone(),
            credentials: encode_credentials(&spec.credentials),
        };
        let record = self.gateway.update_user(cancel, id, &request).await?;

        let mut warnings = Vec::new();
        if record.id != id || record.username != spec.username {
            tracing::warn!(
                requested_id = %id,
                requested_username = %spec.username,
                returned_id = %record.id,
                returned_username = %record.username,
                "Updated user differs from requested"
            );
            warnings.push(ProvisionWarning::EchoMismatch {
                expected_id: id,
                expected_name: spec.username.clone(),
                returned_id: record.id,
                returned_name: record.username.clone(),
            });
        }

        let UserRecord {
            username,
            credentials,
            roles,
            ..
        } = record;
        let credentials = decode_credentials(credentials)?;

        let observed = parse_role_ids(&roles)?;
        let diff = RoleSetDiff::between(&desired_roles, &observed);
        let relations = self.gateway.user_roles(id);
        let mut report =
            reconcile::apply(&relations, cancel, &diff, ApplyOrder::RemovalsFirst).await?;
        warnings.append(&mut report.warnings);

        Ok(Applied {
            state: UserState {
                id: id.to_string(),
                username,
                roles: ids_as_strings(&report.resulting_set(&observed)),
                credentials,
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
        self.gateway.delete_user(cancel, id).await?;
        tracing::info!(user_id = %id, "Deleted user");
        Ok(())
    }
}

fn encode_credentials(credentials: &[UserCredential]) -> Vec<UserCredentialRecord> {
    credentials.iter().map(UserCredentialRecord::from).collect()
}

/// The response is authoritative, so any credential the codec cannot
/// interpret fails the operation.
fn decode_credentials(
    records: Vec<UserCredentialRecord>,
) -> Result<Vec<UserCredential>, ProvisionError> {
    records
        .into_iter()
        .map(|record| UserCredential::try_from(record).map_err(|err| ClientError::from(err).into()))
        .collect()
}

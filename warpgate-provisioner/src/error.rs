use thiserror::Error;

use warpgate_client::wire::DecodeError;
use warpgate_client::ClientError;

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("declared record failed validation: {0}")]
    Validation(#[from] validator::ValidationErrors),

    /// The operation needs a remote identifier but the declared record was
    /// never created (or its id was cleared after drift).
    #[error("declared {entity} record has no identifier")]
    MissingIdentifier { entity: &'static str },
}

impl From<DecodeError> for ProvisionError {
    fn from(err: DecodeError) -> Self {
        Self::Client(ClientError::Decode(err))
    }
}

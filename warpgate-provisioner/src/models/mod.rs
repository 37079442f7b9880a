//! Declared records and the states the controllers hand back.
//!
//! A spec is what the caller wants to exist; a state is what the remote
//! confirmed. Identifiers in specs are opaque strings and are validated as
//! UUIDs before any call leaves the process.

use std::collections::BTreeSet;
use std::fmt;

use uuid::Uuid;
use validator::Validate;

use warpgate_client::models::{TargetOptions, UserCredential};

// ============================================================================
// Declared records
// ============================================================================

#[derive(Debug, Clone, Validate)]
pub struct TargetSpec {
    /// Remote-assigned identifier; `None` until Create succeeds.
    pub id: Option<String>,
    #[validate(length(min = 1))]
    pub name: String,
    /// Ids of the roles that must be attached to this target.
    pub allow_roles: BTreeSet<String>,
    pub options: TargetOptions,
}

#[derive(Debug, Clone, Validate)]
pub struct RoleSpec {
    pub id: Option<String>,
    #[validate(length(min = 1))]
    pub name: String,
}

#[derive(Debug, Clone, Validate)]
pub struct UserSpec {
    pub id: Option<String>,
    #[validate(length(min = 1))]
    pub username: String,
    /// Ids of the roles the user must belong to.
    pub roles: BTreeSet<String>,
    /// A user may hold several credentials at once, at most one declaration
    /// per kind is not required.
    pub credentials: Vec<UserCredential>,
}

/// A standalone declaration of the role set attached to one parent. The
/// assignment has no identity of its own beyond the parent it names.
#[derive(Debug, Clone)]
pub struct RoleAssignmentSpec {
    pub parent_id: String,
    pub role_ids: BTreeSet<String>,
}

// ============================================================================
// Confirmed states
// ============================================================================

#[derive(Debug, Clone)]
pub struct TargetState {
    pub id: String,
    pub name: String,
    pub allow_roles: BTreeSet<String>,
    pub options: TargetOptions,
}

#[derive(Debug, Clone)]
pub struct RoleState {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct UserState {
    pub id: String,
    pub username: String,
    pub roles: BTreeSet<String>,
    pub credentials: Vec<UserCredential>,
}

#[derive(Debug, Clone)]
pub struct RoleAssignmentState {
    pub parent_id: String,
    pub role_ids: BTreeSet<String>,
}

/// Result of a refresh. A 404 from the remote is not a failure: the object
/// went away out-of-band and the caller should drop its local record.
#[derive(Debug)]
pub enum ReadOutcome<T> {
    Live(T),
    Drifted,
}

impl<T> ReadOutcome<T> {
    pub fn into_live(self) -> Option<T> {
        match self {
            Self::Live(state) => Some(state),
            Self::Drifted => None,
        }
    }

    pub fn is_drifted(&self) -> bool {
        matches!(self, Self::Drifted)
    }
}

/// A state plus the non-fatal findings collected while producing it.
#[derive(Debug)]
pub struct Applied<T> {
    pub state: T,
    pub warnings: Vec<ProvisionWarning>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionWarning {
    /// The remote echoed a different id or name than requested. Some backends
    /// normalize names, so this is reported rather than failed.
    EchoMismatch {
        expected_id: Uuid,
        expected_name: String,
        returned_id: Uuid,
        returned_name: String,
    },
    /// A remove-relation call conflicted, usually because the edge raced with
    /// deletion of the role itself. Re-running the operation converges.
    RemovalConflict { parent_id: Uuid, role_id: Uuid },
}

impl fmt::Display for ProvisionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EchoMismatch {
                expected_id,
                expected_name,
                returned_id,
                returned_name,
            } => write!(
                f,
                "remote echoed ({returned_id}, {returned_name}), requested ({expected_id}, {expected_name})"
            ),
            Self::RemovalConflict { parent_id, role_id } => write!(
                f,
                "could not detach role {role_id} from {parent_id}: conflict reported by remote"
            ),
        }
    }
}

//! Declarative provisioning of Warpgate resources.
//!
//! Callers describe targets, roles, users, and role assignments as plain
//! records; the controllers here drive the remote admin API to match, detect
//! drift on read, and reconcile role sets with the minimal number of calls.

pub mod error;
pub mod models;
pub mod services;

pub use error::ProvisionError;
pub use models::{
    Applied, ProvisionWarning, ReadOutcome, RoleAssignmentSpec, RoleAssignmentState, RoleSpec,
    RoleState, TargetSpec, TargetState, UserSpec, UserState,
};
pub use services::assignments::{ParentKind, RoleAssignmentController};
pub use services::reconcile::{ApplyOrder, ReconcileReport, RoleSetDiff};
pub use services::roles::RoleController;
pub use services::targets::TargetController;
pub use services::users::UserController;

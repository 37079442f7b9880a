pub mod assignments;
pub mod reconcile;
pub mod roles;
pub mod targets;
pub mod users;

use std::collections::BTreeSet;

use uuid::Uuid;

use warpgate_client::{parse_identifier, ClientError};

/// Parse every declared role id up front so no call is issued when any of
/// them is malformed.
pub(crate) fn parse_role_ids<'a, I>(ids: I) -> Result<BTreeSet<Uuid>, ClientError>
where
    I: IntoIterator<Item = &'a String>,
{
    ids.into_iter()
        .map(|id| parse_identifier(id))
        .collect()
}

pub(crate) fn ids_as_strings(ids: &BTreeSet<Uuid>) -> BTreeSet<String> {
    ids.iter().map(Uuid::to_string).collect()
}

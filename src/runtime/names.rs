//! Container name matching.
//!
//! Chat commands can't contain `-` in the combined `/stop_my_app` form, so
//! hyphens and underscores are treated as the same character when a requested
//! name is matched against the runtime's container names.

use super::{ContainerGateway, ContainerSummary, GatewayError};

/// Separator-insensitive form of a container name.
pub fn canonical(name: &str) -> String {
    name.trim().replace('_', "-")
}

/// Name as it appears in a combined command token, e.g. `/logs_my_app`.
pub fn command_token(name: &str) -> String {
    name.replace('-', "_")
}

/// Resolve a user-supplied name to the container the runtime knows.
///
/// An exact name wins. Otherwise the inventory is searched for a single
/// container whose canonical name matches; no match or several matches is
/// reported as not found.
pub async fn resolve(
    gateway: &dyn ContainerGateway,
    requested: &str,
) -> Result<ContainerSummary, GatewayError> {
    match gateway.get_container(requested).await {
        Err(GatewayError::NotFound(_)) => {}
        other => return other,
    }

    let wanted = canonical(requested);
    let mut matches = gateway
        .list_containers(true)
        .await?
        .into_iter()
        .filter(|c| canonical(&c.name) == wanted);

    match (matches.next(), matches.next()) {
        (Some(found), None) => {
            log::debug!("Resolved '{requested}' to container '{}'", found.name);
            Ok(found)
        }
        (Some(_), Some(_)) => {
            log::warn!("Container name '{requested}' is ambiguous");
            Err(GatewayError::NotFound(requested.to_string()))
        }
        (None, _) => Err(GatewayError::NotFound(requested.to_string())),
    }
}

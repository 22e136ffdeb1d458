//! Route assignment for declared GraphQL sub-servers.
//!
//! Every sub-server mounts at a route derived from its name, so the name
//! set must be collision-free before anything registers. A duplicate name
//! would otherwise silently collide in route space with no deterministic
//! winner; it is rejected here, before any listener exists.

use std::collections::HashSet;

use crate::artifact::SubServerDeclaration;
use crate::config::LISTEN_HOST;
use crate::error::ServerError;

/// A sub-server with its derived routes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubServerDescriptor {
    /// User-declared name, validated unique.
    pub server_name: String,
    /// Upstream URL the proxy forwards to.
    pub upstream_url: String,
    /// Derived mount path: `/gqls/{server_name}/graphql`.
    pub route_url: String,
    /// Derived public URL on this listener.
    pub public_url: String,
}

/// Validates all declarations and derives their routes.
///
/// Validation is a pure pass over the declaration list: deterministic, and
/// any duplicate fails wherever it sits.
///
/// # Errors
///
/// Returns [`ServerError::DuplicateServerName`] on the first repeated name
/// and [`ServerError::InvalidServerName`] for names that cannot form a
/// route path.
pub fn assign_routes(
    declared: &[SubServerDeclaration],
    port: u16,
) -> Result<Vec<SubServerDescriptor>, ServerError> {
    let mut seen = HashSet::new();
    for declaration in declared {
        let name = declaration.server_name.as_str();
        if name.is_empty() || name.contains(['/', '{', '}']) {
            return Err(ServerError::InvalidServerName(name.to_string()));
        }
        if !seen.insert(name) {
            return Err(ServerError::DuplicateServerName(name.to_string()));
        }
    }

    Ok(declared
        .iter()
        .map(|declaration| {
            let route_url = format!("/gqls/{}/graphql", declaration.server_name);
            let public_url = format!("http://{LISTEN_HOST}:{port}{route_url}");
            SubServerDescriptor {
                server_name: declaration.server_name.clone(),
                upstream_url: declaration.upstream_url.clone(),
                route_url,
                public_url,
            }
        })
        .collect())
}

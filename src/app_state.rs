//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::artifact::LoadedConfiguration;
use crate::client::InternalClientFactory;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
///
/// Both fields are immutable after startup and read-shared across all
/// concurrent requests; no locking is needed.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The validated generated configuration.
    pub configuration: Arc<LoadedConfiguration>,
    /// Factory producing per-request internal clients.
    pub client_factory: InternalClientFactory,
}

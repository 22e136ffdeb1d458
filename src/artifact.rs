//! Generated gateway configuration artifact.
//!
//! The gateway build step writes `generated/gateway.config.json` into the
//! working directory. This module parses that artifact and enforces its
//! required shape. Every failure here is fatal and never retried: the
//! artifact is produced by an out-of-band generator the server does not
//! control, so retrying without re-running the generator cannot succeed.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Artifact path relative to the working directory.
pub const ARTIFACT_RELATIVE_PATH: &str = "generated/gateway.config.json";

/// Fatal configuration failures, detected at startup before any listener
/// exists.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// `GATEWAY_DIR` is unset while the server is enabled.
    #[error("the environment variable `GATEWAY_DIR` is required")]
    WorkingDirMissing,

    /// The artifact could not be read from disk.
    #[error("could not load {path}: {source}. Did you forget to run the gateway generator?")]
    Unreadable {
        /// Path that failed to read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The artifact is not valid JSON of the expected shape.
    #[error("could not parse {path}: {source}. Try re-running the gateway generator")]
    Malformed {
        /// Path that failed to parse.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },

    /// The artifact parsed but has no API descriptor, so the internal
    /// client cannot be built.
    #[error("the generated configuration has no api descriptor. Try re-running the gateway generator")]
    Incomplete,
}

/// Kind of a generated gateway operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    /// Read operation.
    Query,
    /// Write operation.
    Mutation,
    /// Streaming operation.
    Subscription,
}

impl OperationType {
    /// Lowercase label used in diagnostics.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Mutation => "mutation",
            Self::Subscription => "subscription",
        }
    }
}

/// One generated API operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationDescriptor {
    /// Operation name, unique within the API.
    pub name: String,
    /// Operation kind.
    pub operation_type: OperationType,
}

/// One declared webhook receiver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookDescriptor {
    /// Webhook name; its route is `/webhooks/{name}`.
    pub name: String,
}

/// The generated API descriptor: operations and webhook declarations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiDescriptor {
    /// All generated operations.
    #[serde(default)]
    pub operations: Vec<OperationDescriptor>,
    /// All declared webhook receivers.
    #[serde(default)]
    pub webhooks: Vec<WebhookDescriptor>,
}

/// Global lifecycle hooks on the HTTP transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GlobalHookKind {
    /// Invoked before a request is sent to an origin.
    OnOriginRequest,
    /// Invoked after a response is received from an origin.
    OnOriginResponse,
}

impl GlobalHookKind {
    /// Route segment for this hook.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OnOriginRequest => "onOriginRequest",
            Self::OnOriginResponse => "onOriginResponse",
        }
    }
}

/// Authentication lifecycle hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AuthenticationHookKind {
    /// Invoked after a user authenticates.
    PostAuthentication,
    /// Invoked after authentication, may rewrite the user.
    MutatingPostAuthentication,
    /// Invoked when a session is revalidated.
    RevalidateAuthentication,
}

impl AuthenticationHookKind {
    /// Route segment for this hook.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PostAuthentication => "postAuthentication",
            Self::MutatingPostAuthentication => "mutatingPostAuthentication",
            Self::RevalidateAuthentication => "revalidateAuthentication",
        }
    }
}

/// Hooks around a single named operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OperationHookKind {
    /// Before the operation resolves.
    PreResolve,
    /// Before the operation resolves, may rewrite the input.
    MutatingPreResolve,
    /// After the operation resolves.
    PostResolve,
    /// After the operation resolves, may rewrite the response.
    MutatingPostResolve,
    /// Replaces the operation's resolver entirely.
    CustomResolve,
}

impl OperationHookKind {
    /// Route segment for this hook.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PreResolve => "preResolve",
            Self::MutatingPreResolve => "mutatingPreResolve",
            Self::PostResolve => "postResolve",
            Self::MutatingPostResolve => "mutatingPostResolve",
            Self::CustomResolve => "customResolve",
        }
    }
}

/// Declared hooks for one named operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationHooksDeclaration {
    /// The operation these hooks wrap. Must name a generated operation.
    pub operation_name: String,
    /// Which hook kinds are declared.
    #[serde(default)]
    pub kinds: Vec<OperationHookKind>,
}

/// All hook declarations the generator emitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HooksDeclaration {
    /// Global HTTP transport hooks.
    #[serde(default)]
    pub global: Vec<GlobalHookKind>,
    /// Authentication lifecycle hooks.
    #[serde(default)]
    pub authentication: Vec<AuthenticationHookKind>,
    /// Per-operation hooks.
    #[serde(default)]
    pub operations: Vec<OperationHooksDeclaration>,
}

/// One declared GraphQL sub-server, before route derivation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubServerDeclaration {
    /// User-declared name. Must be unique across all sub-servers.
    pub server_name: String,
    /// Upstream URL the proxy forwards execution requests to.
    pub upstream_url: String,
}

/// Raw generated configuration as written by the gateway generator.
///
/// `api` is optional here because the generator writes the artifact even
/// when the API descriptor failed to build; [`GatewayConfiguration::load`]
/// rejects that case so downstream code never re-checks it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfiguration {
    /// Generated API name.
    pub api_name: String,
    /// Generated deployment name.
    pub deployment_name: String,
    /// The API descriptor. Absence is fatal.
    #[serde(default)]
    pub api: Option<ApiDescriptor>,
    /// Hook declarations.
    #[serde(default)]
    pub hooks: HooksDeclaration,
    /// GraphQL sub-server declarations.
    #[serde(default)]
    pub graphql_servers: Vec<SubServerDeclaration>,
}

/// A validated configuration: the API descriptor is guaranteed present.
///
/// Immutable after load; shared by reference across all components for
/// the process lifetime.
#[derive(Debug, Clone)]
pub struct LoadedConfiguration {
    /// Generated API name.
    pub api_name: String,
    /// Generated deployment name.
    pub deployment_name: String,
    /// The API descriptor.
    pub api: ApiDescriptor,
    /// Hook declarations.
    pub hooks: HooksDeclaration,
    /// GraphQL sub-server declarations.
    pub graphql_servers: Vec<SubServerDeclaration>,
}

impl GatewayConfiguration {
    /// Reads and validates the artifact under `working_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Unreadable`] if the file cannot be read,
    /// [`ConfigError::Malformed`] if it cannot be parsed, and
    /// [`ConfigError::Incomplete`] if it lacks the API descriptor.
    pub fn load(working_dir: &Path) -> Result<LoadedConfiguration, ConfigError> {
        let path = working_dir.join(ARTIFACT_RELATIVE_PATH);
        let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::Unreadable {
            path: path.clone(),
            source,
        })?;
        let parsed: Self = serde_json::from_str(&raw)
            .map_err(|source| ConfigError::Malformed { path, source })?;
        parsed.into_loaded()
    }

    /// Validates the parsed configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Incomplete`] if the API descriptor is absent.
    pub fn into_loaded(self) -> Result<LoadedConfiguration, ConfigError> {
        let api = self.api.ok_or(ConfigError::Incomplete)?;
        Ok(LoadedConfiguration {
            api_name: self.api_name,
            deployment_name: self.deployment_name,
            api,
            hooks: self.hooks,
            graphql_servers: self.graphql_servers,
        })
    }
}

//! Plugin registration pipeline.
//!
//! Plugins register in a strict order (hooks, then webhooks, then each
//! GraphQL sub-server in declaration order), and each step is awaited to
//! completion before the next begins. Later steps rely on decoration the
//! hooks step provides, and the diagnostic log mirrors registration order,
//! so the order is a hard guarantee. Any step failing aborts startup; there
//! is no partial-success mode.

pub mod graphql;
pub mod hooks;
pub mod webhooks;

use std::fmt;
use std::sync::Arc;

use axum::Router;
use axum::http::Method;

use crate::app_state::AppState;
use crate::artifact::{HooksDeclaration, LoadedConfiguration, WebhookDescriptor};
use crate::error::ServerError;
use crate::subserver::SubServerDescriptor;

use hooks::HookDispatcher;

/// What a registered route is for. A closed set: the diagnostic observer
/// pattern-matches these instead of probing attached metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteKind {
    /// A lifecycle hook route. `operation_name` is set for operation
    /// hooks and absent for global/authentication hooks.
    Hook {
        /// Wrapped operation, if this is an operation hook.
        operation_name: Option<String>,
    },
    /// A webhook receiver route.
    Webhook {
        /// Declared webhook name.
        webhook_name: String,
    },
}

/// Ephemeral record of one route registration.
///
/// Used only for diagnostic logging during startup; not retained after
/// the listener is up.
#[derive(Debug, Clone)]
pub struct RouteRegistration {
    /// HTTP method the route answers.
    pub method: Method,
    /// Mount path.
    pub path: String,
    /// What the route is for.
    pub kind: RouteKind,
}

impl RouteRegistration {
    /// Emits one diagnostic line for this registration.
    pub fn log(&self) {
        match &self.kind {
            RouteKind::Hook {
                operation_name: Some(operation),
            } => {
                tracing::debug!(
                    operation = %operation,
                    method = %self.method,
                    path = %self.path,
                    "registered operation hook"
                );
            }
            RouteKind::Hook {
                operation_name: None,
            } => {
                tracing::debug!(method = %self.method, path = %self.path, "registered global hook");
            }
            RouteKind::Webhook { webhook_name } => {
                tracing::debug!(
                    webhook = %webhook_name,
                    method = %self.method,
                    path = %self.path,
                    "registered webhook"
                );
            }
        }
    }
}

/// Registration pipeline state. Transitions are strictly sequential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrarState {
    /// Nothing registered yet.
    Unregistered,
    /// The hooks plugin is mounted.
    HooksRegistered,
    /// The webhooks plugin is mounted.
    WebhooksRegistered,
    /// All GraphQL sub-servers are mounted; carries how many.
    GraphqlServersRegistered(usize),
    /// The route space is sealed; the listener binds next.
    Listening,
}

/// Ordered, fail-fast plugin registrar.
///
/// Owns the growing route space and a registration observer that logs
/// every hook/webhook route as it is mounted. The observer is pure
/// diagnostics: it never filters or reorders registrations.
pub struct PluginRegistrar {
    state: RegistrarState,
    router: Router<AppState>,
    registrations: Vec<RouteRegistration>,
    graphql_routes: Vec<String>,
    observer: Box<dyn Fn(&RouteRegistration) + Send>,
}

impl fmt::Debug for PluginRegistrar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistrar")
            .field("state", &self.state)
            .field("registrations", &self.registrations.len())
            .field("graphql_routes", &self.graphql_routes)
            .finish_non_exhaustive()
    }
}

impl PluginRegistrar {
    /// Creates a registrar with the given route observer.
    #[must_use]
    pub fn new(observer: impl Fn(&RouteRegistration) + Send + 'static) -> Self {
        Self {
            state: RegistrarState::Unregistered,
            router: Router::new(),
            registrations: Vec::new(),
            graphql_routes: Vec::new(),
            observer: Box::new(observer),
        }
    }

    /// Current pipeline state.
    #[must_use]
    pub fn state(&self) -> RegistrarState {
        self.state
    }

    /// All hook/webhook registrations so far, in registration order.
    #[must_use]
    pub fn registrations(&self) -> &[RouteRegistration] {
        &self.registrations
    }

    /// Mounted GraphQL proxy routes, in declaration order.
    #[must_use]
    pub fn graphql_routes(&self) -> &[String] {
        &self.graphql_routes
    }

    /// Registers the hooks plugin. Always the first step.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::RegistrationOrder`] if anything registered
    /// before it, and [`ServerError::Registration`] if the plugin fails.
    pub async fn register_hooks(
        &mut self,
        hooks: &HooksDeclaration,
        configuration: &LoadedConfiguration,
        dispatcher: &Arc<dyn HookDispatcher>,
    ) -> Result<(), ServerError> {
        if self.state != RegistrarState::Unregistered {
            return Err(ServerError::RegistrationOrder(
                "hooks must be the first plugin to register",
            ));
        }
        let (fragment, routes) =
            hooks::register(hooks, configuration, dispatcher).map_err(|source| {
                ServerError::Registration {
                    plugin: "hooks",
                    source,
                }
            })?;
        self.mount(fragment, routes);
        self.state = RegistrarState::HooksRegistered;
        tracing::info!("hooks plugin registered");
        Ok(())
    }

    /// Registers the webhooks plugin. Only called when the API descriptor
    /// declares webhook entries.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::RegistrationOrder`] unless hooks registered
    /// first, and [`ServerError::Registration`] if the plugin fails.
    pub async fn register_webhooks(
        &mut self,
        webhooks: &[WebhookDescriptor],
    ) -> Result<(), ServerError> {
        if self.state != RegistrarState::HooksRegistered {
            return Err(ServerError::RegistrationOrder(
                "webhooks must register after hooks and before graphql servers",
            ));
        }
        let (fragment, routes) =
            webhooks::register(webhooks).map_err(|source| ServerError::Registration {
                plugin: "webhooks",
                source,
            })?;
        self.mount(fragment, routes);
        self.state = RegistrarState::WebhooksRegistered;
        tracing::info!("webhooks plugin registered");
        Ok(())
    }

    /// Registers one GraphQL proxy per sub-server, in declaration order.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::RegistrationOrder`] unless hooks (and
    /// webhooks, when declared) registered first, and
    /// [`ServerError::Registration`] if any proxy fails; the remaining
    /// sub-servers are not registered.
    pub async fn register_graphql_servers(
        &mut self,
        servers: &[SubServerDescriptor],
    ) -> Result<(), ServerError> {
        match self.state {
            RegistrarState::HooksRegistered | RegistrarState::WebhooksRegistered => {}
            _ => {
                return Err(ServerError::RegistrationOrder(
                    "graphql servers must register after hooks and webhooks",
                ));
            }
        }
        for server in servers {
            let fragment =
                graphql::register(server).map_err(|source| ServerError::Registration {
                    plugin: "graphql",
                    source,
                })?;
            self.mount(fragment, Vec::new());
            self.graphql_routes.push(server.route_url.clone());
            tracing::info!(server = %server.server_name, "graphql plugin registered");
            tracing::info!(
                server = %server.server_name,
                url = %server.public_url,
                "graphql server listening"
            );
        }
        self.state = RegistrarState::GraphqlServersRegistered(servers.len());
        Ok(())
    }

    /// Seals the route space and hands it to the bootstrap, which binds
    /// the listener immediately after.
    #[must_use]
    pub fn finish(mut self) -> (Router<AppState>, Vec<RouteRegistration>) {
        self.state = RegistrarState::Listening;
        (self.router, self.registrations)
    }

    /// Merges a plugin's route fragment and runs the observer over its
    /// registrations, preserving order.
    fn mount(&mut self, fragment: Router<AppState>, routes: Vec<RouteRegistration>) {
        self.router = std::mem::take(&mut self.router).merge(fragment);
        for registration in routes {
            (self.observer)(&registration);
            self.registrations.push(registration);
        }
    }
}

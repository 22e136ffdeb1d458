//! Server bootstrap: registration pipeline, route space assembly, and the
//! listener.
//!
//! `prepare` runs the whole startup sequence short of binding: internal
//! client factory, route assignment, ordered plugin registration, request
//! decoration, and the ambient middleware stack. `serve` binds the
//! listener and runs it under the selected shutdown policy. Nothing binds
//! until every registration step has succeeded, so a failed startup never
//! leaves a partially registered server listening.

use std::any::Any;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router, middleware};
use chrono::Utc;
use serde::Serialize;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;
use crate::artifact::LoadedConfiguration;
use crate::client::InternalClientFactory;
use crate::config::ServerSettings;
use crate::context;
use crate::error::{ErrorBody, ErrorResponse, ServerError};
use crate::plugins::hooks::HookDispatcher;
use crate::plugins::{PluginRegistrar, RouteRegistration};
use crate::shutdown::{self, ShutdownPolicy};
use crate::subserver;

/// A fully registered server, ready to bind.
pub struct PreparedServer {
    router: Router,
    addr: SocketAddr,
    policy: ShutdownPolicy,
    registrations: Vec<RouteRegistration>,
    graphql_routes: Vec<String>,
}

impl fmt::Debug for PreparedServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreparedServer")
            .field("addr", &self.addr)
            .field("policy", &self.policy)
            .field("registrations", &self.registrations.len())
            .field("graphql_routes", &self.graphql_routes)
            .finish_non_exhaustive()
    }
}

impl PreparedServer {
    /// Address the listener will bind.
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Selected shutdown policy.
    #[must_use]
    pub fn policy(&self) -> ShutdownPolicy {
        self.policy
    }

    /// Hook/webhook registrations, in registration order.
    #[must_use]
    pub fn registrations(&self) -> &[RouteRegistration] {
        &self.registrations
    }

    /// Mounted GraphQL proxy routes, in declaration order.
    #[must_use]
    pub fn graphql_routes(&self) -> &[String] {
        &self.graphql_routes
    }

    /// Consumes the prepared server, yielding its router. Test seam.
    #[must_use]
    pub fn into_router(self) -> Router {
        self.router
    }
}

/// Runs the startup sequence up to, but not including, binding the
/// listener.
///
/// # Errors
///
/// Returns a [`ServerError`] if route assignment fails (duplicate or
/// invalid sub-server names) or any plugin registration step fails. No
/// plugin registers after the first failure.
pub async fn prepare(
    settings: &ServerSettings,
    configuration: LoadedConfiguration,
    dispatcher: Arc<dyn HookDispatcher>,
) -> Result<PreparedServer, ServerError> {
    let client_factory = InternalClientFactory::new(
        configuration.api_name.clone(),
        configuration.deployment_name.clone(),
        configuration.api.operations.clone(),
        settings.gateway_url.clone(),
    );

    // Names are validated before any registration; a duplicate aborts
    // here, with nothing mounted and nothing listening.
    let sub_servers = subserver::assign_routes(&configuration.graphql_servers, settings.port)?;

    let mut registrar = PluginRegistrar::new(RouteRegistration::log);
    registrar
        .register_hooks(&configuration.hooks, &configuration, &dispatcher)
        .await?;
    if !configuration.api.webhooks.is_empty() {
        registrar.register_webhooks(&configuration.api.webhooks).await?;
    }
    registrar.register_graphql_servers(&sub_servers).await?;

    let graphql_routes = registrar.graphql_routes().to_vec();
    let (router, registrations) = registrar.finish();

    let state = AppState {
        configuration: Arc::new(configuration),
        client_factory,
    };
    let router = router
        .merge(system_routes())
        .layer(middleware::from_fn_with_state(state.clone(), context::populate))
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(CorsLayer::permissive())
        .with_state(state);

    Ok(PreparedServer {
        router,
        addr: settings.listen_addr(),
        policy: ShutdownPolicy::for_environment(settings.environment),
        registrations,
        graphql_routes,
    })
}

/// Binds the listener and serves until shutdown.
///
/// # Errors
///
/// Returns [`ServerError::Bind`] if the address cannot be bound and
/// [`ServerError::Serve`] on listener failures.
pub async fn serve(prepared: PreparedServer) -> Result<(), ServerError> {
    let addr = prepared.addr;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    tracing::info!(%addr, "hooks server listening");

    match prepared.policy {
        ShutdownPolicy::Graceful => {
            axum::serve(listener, prepared.router)
                .with_graceful_shutdown(shutdown::wait_for_signal())
                .await
        }
        ShutdownPolicy::Immediate => axum::serve(listener, prepared.router).await,
    }
    .map_err(ServerError::Serve)
}

/// Full startup: prepare, then bind and serve.
///
/// # Errors
///
/// Returns a [`ServerError`] on any startup or listener failure.
pub async fn start(
    settings: &ServerSettings,
    configuration: LoadedConfiguration,
    dispatcher: Arc<dyn HookDispatcher>,
) -> Result<(), ServerError> {
    let prepared = prepare(settings, configuration, dispatcher).await?;
    serve(prepared).await
}

/// Health check response.
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: String,
    version: &'static str,
}

/// `GET /health`: service health status.
async fn health_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy",
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}

/// System routes outside the plugin route space; not part of the
/// registration diagnostics.
fn system_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_handler))
}

/// Post-boot fault monitor: a panicking handler is logged and answered
/// with 500; the process keeps serving already-accepted traffic.
fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("panic");
    tracing::error!(panic = detail, "request handler panicked");

    let body = ErrorResponse {
        error: ErrorBody {
            code: 3000,
            message: "internal error".to_string(),
        },
    };
    let mut response = Json(body).into_response();
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response
}

#[cfg(test)]
pub(crate) mod tests_support {
    //! Shared fixtures for router-level tests.

    use super::*;
    use crate::artifact::{ApiDescriptor, HooksDeclaration};

    pub(crate) fn minimal_configuration() -> LoadedConfiguration {
        LoadedConfiguration {
            api_name: "app".to_string(),
            deployment_name: "main".to_string(),
            api: ApiDescriptor::default(),
            hooks: HooksDeclaration::default(),
            graphql_servers: Vec::new(),
        }
    }

    pub(crate) fn make_state() -> AppState {
        AppState {
            configuration: Arc::new(minimal_configuration()),
            client_factory: InternalClientFactory::new(
                "app".to_string(),
                "main".to_string(),
                Vec::new(),
                "http://127.0.0.1:9991".to_string(),
            ),
        }
    }
}

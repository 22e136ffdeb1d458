//! Per-request context decoration.
//!
//! Every inbound request gets a [`RequestContext`] before it reaches any
//! handler: the original client request data, an optional authenticated
//! user (absent until authentication hook logic populates it), a
//! request-scoped tracing span, and a shared [`InternalClient`]. The
//! context is owned by the request and discarded when the response
//! completes; it is never shared across requests.

use axum::extract::{Request, State};
use axum::http::{HeaderMap, Method, Uri};
use axum::middleware::Next;
use axum::response::Response;
use serde::{Deserialize, Serialize};
use tracing::Instrument;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::client::{InternalClient, forwardable_headers};

/// Authenticated user identity, as authentication hooks populate it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Identity provider that authenticated the user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Provider-scoped user id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Email address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Assigned roles.
    #[serde(default)]
    pub roles: Vec<String>,
}

/// The original client request as hook logic sees it.
///
/// Headers are owned by this context, so hook logic may rewrite them
/// before they are replayed upstream.
#[derive(Debug, Clone)]
pub struct ClientRequest {
    /// HTTP method.
    pub method: Method,
    /// Request target.
    pub request_uri: Uri,
    /// Client request headers, mutable for downstream hook logic.
    pub headers: HeaderMap,
}

/// Per-request bundle handed to hook logic.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Request id, also attached to the request span.
    pub request_id: Uuid,
    /// Authenticated user, if any. Empty at request creation; populated by
    /// authentication hook logic.
    pub user: Option<User>,
    /// The original client request.
    pub client_request: ClientRequest,
    /// Shared internal operations client.
    pub internal_client: InternalClient,
}

/// Middleware decorating every request with a [`RequestContext`] and a
/// request-scoped span.
///
/// Installed once over the whole route space, so hooks, webhooks, and
/// GraphQL proxies all see the same decoration.
pub async fn populate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let request_id = Uuid::new_v4();
    let client_request = ClientRequest {
        method: request.method().clone(),
        request_uri: request.uri().clone(),
        headers: request.headers().clone(),
    };
    let internal_client = state
        .client_factory
        .client(forwardable_headers(request.headers()));

    let span = tracing::info_span!(
        "request",
        id = %request_id,
        method = %client_request.method,
        uri = %client_request.request_uri,
    );

    request.extensions_mut().insert(RequestContext {
        request_id,
        user: None,
        client_request,
        internal_client,
    });

    next.run(request).instrument(span).await
}

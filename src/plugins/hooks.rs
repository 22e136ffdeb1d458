//! Hooks plugin: mounts one route per declared lifecycle hook.
//!
//! Always the first plugin to register. Receives the hook declarations,
//! the loaded configuration, and a [`HookDispatcher`] that carries the
//! user-defined hook logic; this module only wires routes and the
//! invocation envelope, the hook business logic lives behind the
//! dispatcher seam.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::bail;
use axum::http::Method;
use axum::routing::post;
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::app_state::AppState;
use crate::artifact::{HooksDeclaration, LoadedConfiguration};
use crate::context::{ClientRequest, RequestContext, User};
use crate::error::HandlerError;
use crate::plugins::{RouteKind, RouteRegistration};

/// One hook invocation, as handed to user-defined hook logic.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HookInvocation {
    /// Hook kind, e.g. `preResolve` or `onOriginRequest`.
    pub hook: String,
    /// Wrapped operation, for operation hooks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,
    /// Authenticated user from the request context, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    /// The original client request. Headers are owned by the invocation,
    /// so hook logic may rewrite them.
    #[serde(skip)]
    pub client_request: ClientRequest,
    /// Hook input payload.
    pub input: Value,
}

/// Seam for user-defined hook logic. Execution semantics are out of this
/// server's scope; it only delivers the invocation and relays the result.
pub trait HookDispatcher: Send + Sync {
    /// Runs the user-defined logic for one hook invocation. The invocation
    /// is mutable so hook logic can rewrite the client request headers.
    ///
    /// # Errors
    ///
    /// Returns a [`HandlerError`] that is relayed to the caller as a
    /// structured error response.
    fn dispatch(&self, invocation: &mut HookInvocation) -> Result<Value, HandlerError>;
}

/// Default dispatcher: returns the input unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoDispatcher;

impl HookDispatcher for EchoDispatcher {
    fn dispatch(&self, invocation: &mut HookInvocation) -> Result<Value, HandlerError> {
        Ok(invocation.input.clone())
    }
}

/// Wire payload for a hook invocation request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookPayload {
    /// Hook input, defaults to null.
    #[serde(default)]
    pub input: Value,
}

/// Wire envelope for a hook invocation response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HookResponse {
    /// Wrapped operation, for operation hooks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub op: Option<String>,
    /// Hook kind that ran.
    pub hook: String,
    /// Dispatcher result.
    pub response: Value,
}

/// Builds the hooks route fragment and its registration records.
///
/// Fails fast when an operation hook names an operation that cannot form a
/// route path or that the API does not declare; the generated artifact is
/// internally consistent, so a mismatch means a stale or hand-edited
/// artifact.
pub(crate) fn register(
    hooks: &HooksDeclaration,
    configuration: &LoadedConfiguration,
    dispatcher: &Arc<dyn HookDispatcher>,
) -> anyhow::Result<(Router<AppState>, Vec<RouteRegistration>)> {
    for declaration in &hooks.operations {
        let name = declaration.operation_name.as_str();
        if name.is_empty() || name.contains(['/', '{', '}']) {
            bail!("invalid operation name '{name}'");
        }
        let known = configuration
            .api
            .operations
            .iter()
            .any(|op| op.name == declaration.operation_name);
        if !known {
            bail!(
                "operation hook references unknown operation '{}'",
                declaration.operation_name
            );
        }
    }

    let mut router = Router::new();
    let mut routes = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for kind in &hooks.global {
        let path = format!("/global/httpTransport/{}", kind.as_str());
        if !seen.insert(path.clone()) {
            continue;
        }
        router = mount_hook(router, &path, dispatcher, kind.as_str(), None);
        routes.push(RouteRegistration {
            method: Method::POST,
            path,
            kind: RouteKind::Hook {
                operation_name: None,
            },
        });
    }

    for kind in &hooks.authentication {
        let path = format!("/authentication/{}", kind.as_str());
        if !seen.insert(path.clone()) {
            continue;
        }
        router = mount_hook(router, &path, dispatcher, kind.as_str(), None);
        routes.push(RouteRegistration {
            method: Method::POST,
            path,
            kind: RouteKind::Hook {
                operation_name: None,
            },
        });
    }

    for declaration in &hooks.operations {
        for kind in &declaration.kinds {
            let path = format!("/operation/{}/{}", declaration.operation_name, kind.as_str());
            if !seen.insert(path.clone()) {
                continue;
            }
            router = mount_hook(
                router,
                &path,
                dispatcher,
                kind.as_str(),
                Some(declaration.operation_name.clone()),
            );
            routes.push(RouteRegistration {
                method: Method::POST,
                path,
                kind: RouteKind::Hook {
                    operation_name: Some(declaration.operation_name.clone()),
                },
            });
        }
    }

    Ok((router, routes))
}

/// Mounts one POST hook route whose handler relays through the dispatcher.
fn mount_hook(
    router: Router<AppState>,
    path: &str,
    dispatcher: &Arc<dyn HookDispatcher>,
    hook: &'static str,
    operation_name: Option<String>,
) -> Router<AppState> {
    let dispatcher = Arc::clone(dispatcher);
    let handler = move |Extension(ctx): Extension<RequestContext>,
                        Json(payload): Json<HookPayload>| {
        let dispatcher = Arc::clone(&dispatcher);
        let operation_name = operation_name.clone();
        async move { run_hook(dispatcher.as_ref(), &ctx, hook, operation_name, payload) }
    };
    router.route(path, post(handler))
}

/// Builds the invocation envelope, runs the dispatcher, and wraps the
/// result in the response envelope.
fn run_hook(
    dispatcher: &dyn HookDispatcher,
    ctx: &RequestContext,
    hook: &'static str,
    operation_name: Option<String>,
    payload: HookPayload,
) -> Result<Json<HookResponse>, HandlerError> {
    let mut invocation = HookInvocation {
        hook: hook.to_string(),
        operation_name: operation_name.clone(),
        user: ctx.user.clone(),
        client_request: ctx.client_request.clone(),
        input: payload.input,
    };
    let response = dispatcher.dispatch(&mut invocation)?;
    Ok(Json(HookResponse {
        op: operation_name,
        hook: hook.to_string(),
        response,
    }))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::artifact::{
        ApiDescriptor, AuthenticationHookKind, GlobalHookKind, OperationDescriptor,
        OperationHookKind, OperationHooksDeclaration, OperationType,
    };
    use crate::client::InternalClientFactory;
    use crate::context::ClientRequest;
    use axum::body::Body;
    use axum::http::{HeaderMap, Request, StatusCode, Uri};
    use tower::ServiceExt;
    use uuid::Uuid;

    fn make_configuration(hooks: HooksDeclaration) -> LoadedConfiguration {
        LoadedConfiguration {
            api_name: "app".to_string(),
            deployment_name: "main".to_string(),
            api: ApiDescriptor {
                operations: vec![OperationDescriptor {
                    name: "Dragons".to_string(),
                    operation_type: OperationType::Query,
                }],
                webhooks: Vec::new(),
            },
            hooks,
            graphql_servers: Vec::new(),
        }
    }

    fn make_context() -> RequestContext {
        let factory = InternalClientFactory::new(
            "app".to_string(),
            "main".to_string(),
            Vec::new(),
            "http://127.0.0.1:9991".to_string(),
        );
        RequestContext {
            request_id: Uuid::new_v4(),
            user: None,
            client_request: ClientRequest {
                method: Method::POST,
                request_uri: Uri::from_static("/"),
                headers: HeaderMap::new(),
            },
            internal_client: factory.client(HeaderMap::new()),
        }
    }

    fn dispatcher() -> Arc<dyn HookDispatcher> {
        Arc::new(EchoDispatcher)
    }

    #[test]
    fn registers_declared_routes_only() {
        let hooks = HooksDeclaration {
            global: vec![GlobalHookKind::OnOriginRequest],
            authentication: vec![AuthenticationHookKind::PostAuthentication],
            operations: vec![OperationHooksDeclaration {
                operation_name: "Dragons".to_string(),
                kinds: vec![
                    OperationHookKind::PreResolve,
                    OperationHookKind::MutatingPostResolve,
                ],
            }],
        };
        let configuration = make_configuration(hooks.clone());
        let Ok((_router, routes)) = register(&hooks, &configuration, &dispatcher()) else {
            panic!("registration failed");
        };
        let paths: Vec<&str> = routes.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(
            paths,
            [
                "/global/httpTransport/onOriginRequest",
                "/authentication/postAuthentication",
                "/operation/Dragons/preResolve",
                "/operation/Dragons/mutatingPostResolve",
            ]
        );
        assert!(routes.iter().all(|r| r.method == Method::POST));
    }

    #[test]
    fn duplicate_declarations_collapse() {
        let hooks = HooksDeclaration {
            global: vec![
                GlobalHookKind::OnOriginRequest,
                GlobalHookKind::OnOriginRequest,
            ],
            authentication: Vec::new(),
            operations: Vec::new(),
        };
        let configuration = make_configuration(hooks.clone());
        let Ok((_router, routes)) = register(&hooks, &configuration, &dispatcher()) else {
            panic!("registration failed");
        };
        assert_eq!(routes.len(), 1);
    }

    #[test]
    fn unroutable_operation_name_fails_registration() {
        let hooks = HooksDeclaration {
            global: Vec::new(),
            authentication: Vec::new(),
            operations: vec![OperationHooksDeclaration {
                operation_name: "bad{name".to_string(),
                kinds: vec![OperationHookKind::PreResolve],
            }],
        };
        let configuration = make_configuration(hooks.clone());
        let result = register(&hooks, &configuration, &dispatcher());
        let Err(err) = result else {
            panic!("expected registration failure");
        };
        assert!(err.to_string().contains("bad{name"));
    }

    #[test]
    fn unknown_operation_reference_fails_registration() {
        let hooks = HooksDeclaration {
            global: Vec::new(),
            authentication: Vec::new(),
            operations: vec![OperationHooksDeclaration {
                operation_name: "Missing".to_string(),
                kinds: vec![OperationHookKind::PreResolve],
            }],
        };
        let configuration = make_configuration(HooksDeclaration::default());
        let result = register(&hooks, &configuration, &dispatcher());
        let Err(err) = result else {
            panic!("expected registration failure");
        };
        assert!(err.to_string().contains("Missing"));
    }

    #[tokio::test]
    async fn dispatcher_sees_and_rewrites_the_client_request() {
        use axum::http::HeaderValue;

        #[derive(Debug)]
        struct InspectingDispatcher;

        impl HookDispatcher for InspectingDispatcher {
            fn dispatch(&self, invocation: &mut HookInvocation) -> Result<Value, HandlerError> {
                invocation
                    .client_request
                    .headers
                    .insert("x-rewritten", HeaderValue::from_static("1"));
                Ok(serde_json::json!({
                    "method": invocation.client_request.method.as_str(),
                    "uri": invocation.client_request.request_uri.to_string(),
                    "rewritten": invocation.client_request.headers.contains_key("x-rewritten"),
                }))
            }
        }

        let hooks = HooksDeclaration {
            global: vec![GlobalHookKind::OnOriginRequest],
            authentication: Vec::new(),
            operations: Vec::new(),
        };
        let configuration = make_configuration(hooks.clone());
        let dispatcher: Arc<dyn HookDispatcher> = Arc::new(InspectingDispatcher);
        let Ok((router, _routes)) = register(&hooks, &configuration, &dispatcher) else {
            panic!("registration failed");
        };
        let app = router
            .layer(Extension(make_context()))
            .with_state(crate::app_state::AppState {
                configuration: std::sync::Arc::new(configuration),
                client_factory: InternalClientFactory::new(
                    "app".to_string(),
                    "main".to_string(),
                    Vec::new(),
                    "http://127.0.0.1:9991".to_string(),
                ),
            });

        let Ok(request) = Request::builder()
            .method(Method::POST)
            .uri("/global/httpTransport/onOriginRequest")
            .header("content-type", "application/json")
            .body(Body::from("{}"))
        else {
            panic!("could not build request");
        };
        let Ok(response) = app.oneshot(request).await else {
            panic!("request failed");
        };
        assert_eq!(response.status(), StatusCode::OK);

        let Ok(bytes) = axum::body::to_bytes(response.into_body(), usize::MAX).await else {
            panic!("could not read body");
        };
        let Ok(body) = serde_json::from_slice::<serde_json::Value>(&bytes) else {
            panic!("body is not json");
        };
        assert_eq!(
            body.pointer("/response/method").and_then(|v| v.as_str()),
            Some("POST")
        );
        assert_eq!(
            body.pointer("/response/rewritten")
                .and_then(serde_json::Value::as_bool),
            Some(true)
        );
    }

    #[tokio::test]
    async fn hook_route_relays_through_dispatcher() {
        let hooks = HooksDeclaration {
            global: Vec::new(),
            authentication: Vec::new(),
            operations: vec![OperationHooksDeclaration {
                operation_name: "Dragons".to_string(),
                kinds: vec![OperationHookKind::PreResolve],
            }],
        };
        let configuration = make_configuration(hooks.clone());
        let Ok((router, _routes)) = register(&hooks, &configuration, &dispatcher()) else {
            panic!("registration failed");
        };
        let app = router
            .layer(Extension(make_context()))
            .with_state(crate::app_state::AppState {
                configuration: std::sync::Arc::new(configuration),
                client_factory: InternalClientFactory::new(
                    "app".to_string(),
                    "main".to_string(),
                    Vec::new(),
                    "http://127.0.0.1:9991".to_string(),
                ),
            });

        let Ok(request) = Request::builder()
            .method(Method::POST)
            .uri("/operation/Dragons/preResolve")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"input":{"limit":3}}"#))
        else {
            panic!("could not build request");
        };

        let Ok(response) = app.oneshot(request).await else {
            panic!("request failed");
        };
        assert_eq!(response.status(), StatusCode::OK);

        let Ok(bytes) = axum::body::to_bytes(response.into_body(), usize::MAX).await else {
            panic!("could not read body");
        };
        let Ok(body) = serde_json::from_slice::<serde_json::Value>(&bytes) else {
            panic!("body is not json");
        };
        assert_eq!(body.get("op").and_then(|v| v.as_str()), Some("Dragons"));
        assert_eq!(body.get("hook").and_then(|v| v.as_str()), Some("preResolve"));
        assert_eq!(
            body.pointer("/response/limit").and_then(serde_json::Value::as_i64),
            Some(3)
        );
    }
}

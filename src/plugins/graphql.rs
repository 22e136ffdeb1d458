//! GraphQL proxy plugin: mounts one proxy route per declared sub-server.
//!
//! Each sub-server's execution requests arrive on this listener at the
//! derived route and are forwarded to its upstream URL. Query execution
//! semantics live entirely upstream; the proxy passes status and body
//! through unchanged.

use anyhow::Context;
use axum::Router;
use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, header};
use axum::response::Response;
use axum::routing::post;

use crate::app_state::AppState;
use crate::client::forwardable_headers;
use crate::error::HandlerError;
use crate::subserver::SubServerDescriptor;

/// Pass-through proxy to one sub-server's upstream.
#[derive(Debug, Clone)]
struct GraphqlProxy {
    upstream: reqwest::Url,
    client: reqwest::Client,
}

impl GraphqlProxy {
    /// Forwards one execution request and relays the upstream response.
    async fn forward(&self, headers: HeaderMap, body: Bytes) -> Result<Response, HandlerError> {
        let upstream_response = self
            .client
            .post(self.upstream.clone())
            .headers(forwardable_headers(&headers))
            .body(body)
            .send()
            .await
            .map_err(|err| HandlerError::Upstream(err.to_string()))?;

        let status = upstream_response.status();
        let content_type = upstream_response.headers().get(header::CONTENT_TYPE).cloned();
        let bytes = upstream_response
            .bytes()
            .await
            .map_err(|err| HandlerError::Upstream(err.to_string()))?;

        let mut builder = Response::builder().status(status);
        if let Some(content_type) = content_type {
            builder = builder.header(header::CONTENT_TYPE, content_type);
        }
        builder
            .body(Body::from(bytes))
            .map_err(|err| HandlerError::Internal(err.to_string()))
    }
}

/// Builds one proxy route fragment for a sub-server.
///
/// Fails when the upstream URL does not parse; detected here, at
/// registration time, rather than on first request.
pub(crate) fn register(server: &SubServerDescriptor) -> anyhow::Result<Router<AppState>> {
    let upstream: reqwest::Url = server.upstream_url.parse().with_context(|| {
        format!(
            "invalid upstream url '{}' for graphql server '{}'",
            server.upstream_url, server.server_name
        )
    })?;
    let client = reqwest::Client::builder()
        .build()
        .context("could not build graphql proxy client")?;

    let proxy = GraphqlProxy { upstream, client };
    let handler = move |headers: HeaderMap, body: Bytes| {
        let proxy = proxy.clone();
        async move { proxy.forward(headers, body).await }
    };
    Ok(Router::new().route(&server.route_url, post(handler)))
}

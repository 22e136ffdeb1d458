//! Webhooks plugin: mounts one receiver route per declared webhook.
//!
//! Registered after hooks, and only when the API descriptor declares
//! webhook entries. Delivery handling and signature verification are
//! delegated concerns; this plugin acknowledges receipt so the declared
//! route space exists and is observable.

use std::collections::HashSet;

use anyhow::bail;
use axum::http::Method;
use axum::routing::post;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::app_state::AppState;
use crate::artifact::WebhookDescriptor;
use crate::plugins::{RouteKind, RouteRegistration};

/// Acknowledgement body returned by every webhook receiver.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookAck {
    /// Declared webhook name.
    pub webhook: String,
    /// Always `"received"`.
    pub status: &'static str,
    /// Server-side receipt time.
    pub received_at: DateTime<Utc>,
}

/// Builds the webhook route fragment and its registration records.
pub(crate) fn register(
    webhooks: &[WebhookDescriptor],
) -> anyhow::Result<(Router<AppState>, Vec<RouteRegistration>)> {
    let mut router = Router::new();
    let mut routes = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();

    for webhook in webhooks {
        let name = webhook.name.as_str();
        if name.is_empty() || name.contains(['/', '{', '}']) {
            bail!("invalid webhook name '{name}'");
        }
        if !seen.insert(name) {
            continue;
        }

        let path = format!("/webhooks/{name}");
        let webhook_name = webhook.name.clone();
        let handler = move || {
            let webhook = webhook_name.clone();
            async move {
                Json(WebhookAck {
                    webhook,
                    status: "received",
                    received_at: Utc::now(),
                })
            }
        };
        router = router.route(&path, post(handler));
        routes.push(RouteRegistration {
            method: Method::POST,
            path,
            kind: RouteKind::Webhook {
                webhook_name: webhook.name.clone(),
            },
        });
    }

    Ok((router, routes))
}

//! Internal operations client.
//!
//! The gateway engine exposes every generated operation on an internal
//! endpoint. Hook logic calls back into those operations through an
//! [`InternalClient`], produced per request by the process-wide
//! [`InternalClientFactory`]. The factory is built exactly once, after the
//! artifact loads; the operation table is shared, never copied.

use std::sync::Arc;

use axum::http::{HeaderMap, header};
use serde_json::Value;

use crate::artifact::{OperationDescriptor, OperationType};
use crate::error::HandlerError;

#[derive(Debug)]
struct ClientCore {
    api_name: String,
    deployment_name: String,
    operations: Vec<OperationDescriptor>,
    base_url: String,
    http: reqwest::Client,
}

/// Factory bound to the generated API identity and operation table.
///
/// Cheap to clone; all clones share one [`ClientCore`].
#[derive(Debug, Clone)]
pub struct InternalClientFactory {
    core: Arc<ClientCore>,
}

impl InternalClientFactory {
    /// Builds the factory. No I/O happens here; the factory only binds the
    /// three identity inputs and the base URL.
    #[must_use]
    pub fn new(
        api_name: String,
        deployment_name: String,
        operations: Vec<OperationDescriptor>,
        base_url: String,
    ) -> Self {
        Self {
            core: Arc::new(ClientCore {
                api_name,
                deployment_name,
                operations,
                base_url,
                http: reqwest::Client::new(),
            }),
        }
    }

    /// Generated API name this factory is bound to.
    #[must_use]
    pub fn api_name(&self) -> &str {
        &self.core.api_name
    }

    /// Generated deployment name this factory is bound to.
    #[must_use]
    pub fn deployment_name(&self) -> &str {
        &self.core.deployment_name
    }

    /// The shared operation table.
    #[must_use]
    pub fn operations(&self) -> &[OperationDescriptor] {
        &self.core.operations
    }

    /// Produces a client scoped to one request, forwarding the given
    /// headers to the gateway engine.
    #[must_use]
    pub fn client(&self, forwarded_headers: HeaderMap) -> InternalClient {
        InternalClient {
            core: Arc::clone(&self.core),
            forwarded_headers,
        }
    }
}

/// Request-scoped handle for invoking generated operations.
#[derive(Debug, Clone)]
pub struct InternalClient {
    core: Arc<ClientCore>,
    forwarded_headers: HeaderMap,
}

impl InternalClient {
    /// Invokes a generated query operation.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError::UnknownOperation`] if the API does not
    /// declare `name`, [`HandlerError::OperationKindMismatch`] if `name` is
    /// not a query, and [`HandlerError::Upstream`] on transport failures.
    pub async fn query(&self, name: &str, input: Value) -> Result<Value, HandlerError> {
        self.execute(name, OperationType::Query, input).await
    }

    /// Invokes a generated mutation operation.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError::UnknownOperation`] if the API does not
    /// declare `name`, [`HandlerError::OperationKindMismatch`] if `name` is
    /// not a mutation, and [`HandlerError::Upstream`] on transport failures.
    pub async fn mutate(&self, name: &str, input: Value) -> Result<Value, HandlerError> {
        self.execute(name, OperationType::Mutation, input).await
    }

    /// Validates the operation against the shared table, then POSTs the
    /// input envelope to the gateway engine's internal endpoint.
    async fn execute(
        &self,
        name: &str,
        expected: OperationType,
        input: Value,
    ) -> Result<Value, HandlerError> {
        let operation = self
            .core
            .operations
            .iter()
            .find(|op| op.name == name)
            .ok_or_else(|| HandlerError::UnknownOperation(name.to_string()))?;

        if operation.operation_type != expected {
            return Err(HandlerError::OperationKindMismatch {
                name: name.to_string(),
                expected: expected.label(),
                actual: operation.operation_type.label(),
            });
        }

        let url = format!(
            "{}/internal/operations/{name}",
            self.core.base_url.trim_end_matches('/')
        );
        let response = self
            .core
            .http
            .post(url)
            .headers(self.forwarded_headers.clone())
            .json(&serde_json::json!({ "input": input }))
            .send()
            .await
            .map_err(|err| HandlerError::Upstream(err.to_string()))?;

        response
            .json()
            .await
            .map_err(|err| HandlerError::Upstream(err.to_string()))
    }
}

/// Strips headers that must not be replayed to an upstream request.
#[must_use]
pub fn forwardable_headers(headers: &HeaderMap) -> HeaderMap {
    let mut forwarded = HeaderMap::new();
    for (name, value) in headers {
        if name == header::HOST
            || name == header::CONTENT_LENGTH
            || name == header::CONNECTION
            || name == header::TRANSFER_ENCODING
        {
            continue;
        }
        forwarded.append(name.clone(), value.clone());
    }
    forwarded
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn make_factory() -> InternalClientFactory {
        InternalClientFactory::new(
            "app".to_string(),
            "main".to_string(),
            vec![
                OperationDescriptor {
                    name: "Dragons".to_string(),
                    operation_type: OperationType::Query,
                },
                OperationDescriptor {
                    name: "CreateDragon".to_string(),
                    operation_type: OperationType::Mutation,
                },
            ],
            "http://127.0.0.1:9991".to_string(),
        )
    }

    #[test]
    fn factory_binds_identity() {
        let factory = make_factory();
        assert_eq!(factory.api_name(), "app");
        assert_eq!(factory.deployment_name(), "main");
        assert_eq!(factory.operations().len(), 2);
    }

    #[tokio::test]
    async fn unknown_operation_fails_before_any_io() {
        let client = make_factory().client(HeaderMap::new());
        let result = client.query("Nope", Value::Null).await;
        let Err(HandlerError::UnknownOperation(name)) = result else {
            panic!("expected unknown operation error");
        };
        assert_eq!(name, "Nope");
    }

    #[tokio::test]
    async fn kind_mismatch_fails_before_any_io() {
        let client = make_factory().client(HeaderMap::new());
        let result = client.mutate("Dragons", Value::Null).await;
        let Err(HandlerError::OperationKindMismatch {
            expected, actual, ..
        }) = result
        else {
            panic!("expected kind mismatch error");
        };
        assert_eq!(expected, "mutation");
        assert_eq!(actual, "query");
    }

    #[test]
    fn forwardable_headers_strip_hop_by_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("example.com"));
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("42"));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer x"));

        let forwarded = forwardable_headers(&headers);
        assert!(forwarded.get(header::HOST).is_none());
        assert!(forwarded.get(header::CONTENT_LENGTH).is_none());
        assert!(forwarded.get(header::AUTHORIZATION).is_some());
    }
}

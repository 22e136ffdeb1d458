//! # hooks-gateway
//!
//! Middleware hooks server for generated API gateways. Sits between a
//! build-time generated gateway configuration and user-defined extension
//! points: lifecycle hooks, webhook receivers, and proxied GraphQL
//! sub-servers.
//!
//! ## Architecture
//!
//! ```text
//! Gateway engine (HTTP clients)
//!     │
//!     ├── Hook routes        (plugins/hooks)
//!     ├── Webhook routes     (plugins/webhooks)
//!     ├── GraphQL proxies    (plugins/graphql)
//!     │
//!     ├── PluginRegistrar    (plugins)      ordered, fail-fast registration
//!     ├── RequestContext     (context)      per-request decoration
//!     │
//!     ├── Generated artifact (artifact)     gateway.config.json
//!     ├── InternalClient     (client)       shared operation client
//!     └── Shutdown policy    (shutdown)     graceful in production
//! ```
//!
//! Startup is strictly sequential: the environment gate is evaluated, the
//! generated artifact is loaded and validated, the internal client factory
//! is built, sub-server routes are derived and collision-checked, plugins
//! register in order (hooks, then webhooks, then GraphQL servers in
//! declaration order), and only then does the listener bind. Any failure
//! aborts the process before it accepts traffic.

pub mod app_state;
pub mod artifact;
pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod plugins;
pub mod server;
pub mod shutdown;
pub mod subserver;

//! Loads a kubeconfig, pulls the current context's credentials out of it and
//! builds an HTTP client that reaches in-cluster services through the API
//! server's service proxy.

pub mod auth;
pub mod cache;
pub mod client;
pub mod direct;
mod error;
pub mod loader;

pub use auth::{extract_auth, AuthMaterial, BasicAuth};
pub use cache::{cache_cleanup, cache_get, cache_key, cache_put, ConfigCache};
pub use client::{client_from_auth, client_from_document, new_client, HttpClient, TlsMode};
pub use direct::{
    ClusterEntry, ClusterInfo, ConfigDocument, ContextEntry, ContextInfo, UserEntry, UserInfo,
    DEFAULT_TTL,
};
pub use error::{Error, Result};
pub use loader::{kube_dir, load_cached, load_kubeconfig, resolve_path, KUBECONFIG};

/// Service-proxy path of the cost API as deployed by the metrics adapter.
pub const DEFAULT_COST_PROXY_PATH: &str =
    "/api/v1/namespaces/kube-system/services/ack-metrics-adapter-api-service:8080/proxy";

//! HTTP client for the control plane.
//!
//! Implements every cluster collaborator over the control plane's JSON API:
//!
//! - `GET  /v1/nodes`
//! - `GET  /v1/namespaces/{ns}/leases/{name}` (404 means absent)
//! - `GET  /v1/namespaces/{ns}/pods`
//! - `GET  /v1/node-groups/{group}`
//! - `PUT  /v1/node-groups/{group}/size`

use anyhow::{Context, Result};
use async_trait::async_trait;
use nodelease_cluster::{
    ClusterError, Lease, LeaseRegistry, Node, NodeGroupScaler, NodeLister, NodeSet, Pod, PodLister,
};
use nodelease_id::{GroupName, Namespace, NodeName};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use crate::config::Config;

/// Control plane client.
#[derive(Debug, Clone)]
pub struct ControlPlaneClient {
    client: reqwest::Client,
    base_url: String,
}

impl ControlPlaneClient {
    /// Create a new client from config.
    pub fn new(config: &Config) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = &config.token {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", token))
                    .context("Invalid token format")?,
            );
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: config.api_url().trim_end_matches('/').to_string(),
        })
    }

    /// Build a URL for an endpoint.
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// GET a resource that must exist.
    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClusterError> {
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(transport)?;

        if response.status().is_success() {
            decode(response).await
        } else {
            Err(error_from(response).await)
        }
    }

    /// GET a resource whose absence is a normal answer.
    async fn get_optional<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<Option<T>, ClusterError> {
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(transport)?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => decode(response).await.map(Some),
            _ => Err(error_from(response).await),
        }
    }

    /// PUT a JSON body, ignoring the response body.
    async fn put<B: Serialize>(&self, path: &str, body: &B) -> Result<(), ClusterError> {
        let response = self
            .client
            .put(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(transport)?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(error_from(response).await)
        }
    }
}

fn transport(e: reqwest::Error) -> ClusterError {
    ClusterError::Transport(e.to_string())
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClusterError> {
    response
        .json()
        .await
        .map_err(|e| ClusterError::Decode(e.to_string()))
}

/// Map an error response to a cluster error.
async fn error_from(response: reqwest::Response) -> ClusterError {
    let status = response.status().as_u16();

    // Try to parse error response
    let body: ApiErrorResponse = response.json().await.unwrap_or_else(|_| ApiErrorResponse {
        code: "unknown".to_string(),
        message: "Unknown error".to_string(),
    });

    match (status, body.code.as_str()) {
        (404, _) => ClusterError::NotFound(body.message),
        (409, _) | (_, "rejected") => ClusterError::Rejected(body.message),
        _ => ClusterError::api(status, body.message),
    }
}

/// API error response structure.
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    code: String,
    message: String,
}

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct NodeGroupResponse {
    #[allow(dead_code)]
    name: GroupName,
    #[allow(dead_code)]
    target_size: u32,
    current_size: u32,
}

#[derive(Debug, Serialize)]
struct ResizeRequest {
    target_size: u32,
}

#[async_trait]
impl LeaseRegistry for ControlPlaneClient {
    async fn get_lease(
        &self,
        namespace: &Namespace,
        node: &NodeName,
    ) -> Result<Option<Lease>, ClusterError> {
        self.get_optional(&format!("/v1/namespaces/{namespace}/leases/{node}"))
            .await
    }
}

#[async_trait]
impl NodeLister for ControlPlaneClient {
    async fn list_ready_schedulable_nodes(&self) -> Result<NodeSet, ClusterError> {
        let response: ListResponse<Node> = self.get("/v1/nodes").await?;
        let total = response.items.len();
        let nodes: NodeSet = response
            .items
            .into_iter()
            .filter(Node::is_ready_and_schedulable)
            .collect();
        debug!(total, ready = nodes.len(), "Listed nodes");
        Ok(nodes)
    }
}

#[async_trait]
impl NodeGroupScaler for ControlPlaneClient {
    async fn resize(&self, group: &GroupName, size: u32) -> Result<(), ClusterError> {
        self.put(
            &format!("/v1/node-groups/{group}/size"),
            &ResizeRequest { target_size: size },
        )
        .await
    }

    async fn group_size(&self, group: &GroupName) -> Result<u32, ClusterError> {
        let response: NodeGroupResponse = self.get(&format!("/v1/node-groups/{group}")).await?;
        Ok(response.current_size)
    }
}

#[async_trait]
impl PodLister for ControlPlaneClient {
    async fn list_pods(&self, namespace: &Namespace) -> Result<Vec<Pod>, ClusterError> {
        let response: ListResponse<Pod> =
            self.get(&format!("/v1/namespaces/{namespace}/pods")).await?;
        Ok(response.items)
    }
}

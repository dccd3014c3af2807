//! Kubernetes REST implementation of [`ClusterAccess`].

use std::time::Duration;

use async_trait::async_trait;
use mapicheck_model::{
    GroupResource, LabelSelector, Machine, MachineSet, Node, ResourceKind, Scale,
};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::wire::{
    replay_scale, scale_from_value, List, ScaleUpdate, StatusBody, WireMachine, WireMachineSet,
    WireNode,
};
use crate::{ClusterAccess, ClusterError};

/// Connection settings for [`HttpCluster`].
#[derive(Debug, Clone)]
pub struct HttpClusterConfig {
    /// API server URL (example: https://api.cluster.example:6443).
    pub api_url: String,

    /// Bearer token, if the API server requires one.
    pub token: Option<String>,

    /// Skip TLS certificate verification.
    pub insecure_skip_tls_verify: bool,

    /// Per-request timeout.
    pub request_timeout: Duration,

    /// API group serving machines and machine-sets.
    pub machine_api_group: String,

    /// Version of the machine API group.
    pub machine_api_version: String,
}

impl Default for HttpClusterConfig {
    fn default() -> Self {
        Self {
            api_url: "https://127.0.0.1:6443".to_string(),
            token: None,
            insecure_skip_tls_verify: false,
            request_timeout: Duration::from_secs(30),
            machine_api_group: "machine.openshift.io".to_string(),
            machine_api_version: "v1beta1".to_string(),
        }
    }
}

/// Cluster access over the Kubernetes REST API.
#[derive(Debug, Clone)]
pub struct HttpCluster {
    client: reqwest::Client,
    base_url: String,
    machine_api_group: String,
    machine_api_version: String,
}

impl HttpCluster {
    /// Create a new client.
    pub fn new(config: &HttpClusterConfig) -> Result<Self, ClusterError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        if let Some(token) = &config.token {
            let value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
                ClusterError::Config("bearer token contains invalid header characters".to_string())
            })?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .danger_accept_invalid_certs(config.insecure_skip_tls_verify)
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            machine_api_group: config.machine_api_group.clone(),
            machine_api_version: config.machine_api_version.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Collection path for a namespaced resource of `group` (empty = core).
    fn namespaced_path(&self, group: &str, version: &str, namespace: &str, resource: &str) -> String {
        if group.is_empty() {
            format!("/api/{version}/namespaces/{namespace}/{resource}")
        } else {
            format!("/apis/{group}/{version}/namespaces/{namespace}/{resource}")
        }
    }

    fn machines_path(&self, namespace: &str) -> String {
        self.namespaced_path(
            &self.machine_api_group,
            &self.machine_api_version,
            namespace,
            "machines",
        )
    }

    fn scale_path(&self, resource: &GroupResource, namespace: &str, name: &str) -> String {
        let version = if resource.group == self.machine_api_group {
            self.machine_api_version.as_str()
        } else {
            "v1"
        };
        let collection = self.namespaced_path(&resource.group, version, namespace, &resource.resource);
        format!("{collection}/{name}/scale")
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        kind: ResourceKind,
        name: &str,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ClusterError> {
        debug!(kind = %kind, path, "GET");
        let response = self.client.get(self.url(path)).query(query).send().await?;
        decode(kind, name, response).await
    }
}

async fn decode<T: DeserializeOwned>(
    kind: ResourceKind,
    name: &str,
    response: reqwest::Response,
) -> Result<T, ClusterError> {
    let response = check_status(kind, name, response).await?;
    let body = response.bytes().await?;
    serde_json::from_slice(&body).map_err(|e| ClusterError::Decode {
        kind,
        message: e.to_string(),
    })
}

fn decode_scale(value: serde_json::Value) -> Result<Scale, ClusterError> {
    scale_from_value(value).map_err(|e| ClusterError::Decode {
        kind: ResourceKind::Scale,
        message: e.to_string(),
    })
}

async fn check_status(
    kind: ResourceKind,
    name: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, ClusterError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(ClusterError::not_found(kind, name));
    }

    let body: StatusBody = response.json().await.unwrap_or_default();
    warn!(
        kind = %kind,
        name,
        status = status.as_u16(),
        reason = %body.reason,
        "API request failed"
    );
    Err(ClusterError::Api {
        status: status.as_u16(),
        reason: body.reason,
        message: body.message,
    })
}

#[async_trait]
impl ClusterAccess for HttpCluster {
    async fn list_nodes(&self, selector: &LabelSelector) -> Result<Vec<Node>, ClusterError> {
        let mut query = Vec::new();
        if !selector.is_empty() {
            query.push(("labelSelector", selector.to_string()));
        }
        let list: List<WireNode> = self
            .get_json(ResourceKind::Node, "", "/api/v1/nodes", &query)
            .await?;
        Ok(list.items.into_iter().map(Node::from).collect())
    }

    async fn get_node(&self, name: &str) -> Result<Node, ClusterError> {
        let path = format!("/api/v1/nodes/{name}");
        let node: WireNode = self.get_json(ResourceKind::Node, name, &path, &[]).await?;
        Ok(node.into())
    }

    async fn list_machines(&self, namespace: &str) -> Result<Vec<Machine>, ClusterError> {
        let path = self.machines_path(namespace);
        let list: List<WireMachine> = self
            .get_json(ResourceKind::Machine, "", &path, &[])
            .await?;
        Ok(list.items.into_iter().map(Machine::from).collect())
    }

    async fn get_machine(&self, namespace: &str, name: &str) -> Result<Machine, ClusterError> {
        let path = format!("{}/{}", self.machines_path(namespace), name);
        let machine: WireMachine = self
            .get_json(ResourceKind::Machine, name, &path, &[])
            .await?;
        Ok(machine.into())
    }

    async fn delete_machine(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        let path = format!("{}/{}", self.machines_path(namespace), name);
        debug!(path, "DELETE");
        let response = self.client.delete(self.url(&path)).send().await?;
        check_status(ResourceKind::Machine, name, response).await?;
        Ok(())
    }

    async fn list_machine_sets(&self, namespace: &str) -> Result<Vec<MachineSet>, ClusterError> {
        let path = self.namespaced_path(
            &self.machine_api_group,
            &self.machine_api_version,
            namespace,
            "machinesets",
        );
        let list: List<WireMachineSet> = self
            .get_json(ResourceKind::MachineSet, "", &path, &[])
            .await?;
        Ok(list.items.into_iter().map(MachineSet::from).collect())
    }

    async fn get_scale(
        &self,
        resource: &GroupResource,
        namespace: &str,
        name: &str,
    ) -> Result<Scale, ClusterError> {
        let path = self.scale_path(resource, namespace, name);
        let value: serde_json::Value = self.get_json(ResourceKind::Scale, name, &path, &[]).await?;
        decode_scale(value)
    }

    async fn update_scale(
        &self,
        resource: &GroupResource,
        scale: &Scale,
    ) -> Result<Scale, ClusterError> {
        let path = self.scale_path(resource, &scale.namespace, &scale.name);
        debug!(path, replicas = scale.replicas, "PUT");
        let request = self.client.put(self.url(&path));
        let request = match replay_scale(scale) {
            Some(body) => request.json(&body),
            None => request.json(&ScaleUpdate::from(scale)),
        };
        let response = request.send().await?;
        let stored: serde_json::Value = decode(ResourceKind::Scale, &scale.name, response).await?;
        decode_scale(stored)
    }
}

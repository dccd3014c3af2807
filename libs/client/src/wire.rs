//! Kubernetes JSON shapes and their conversion into model records.

use std::collections::BTreeMap;

use mapicheck_model::{
    Machine, MachineSet, Node, NodeCondition, ObjectRef, OwnerReference, Scale,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub(crate) struct List<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ObjectMeta {
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(default)]
    pub resource_version: Option<String>,
    #[serde(default)]
    pub labels: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub annotations: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub owner_references: Option<Vec<OwnerReference>>,
}

// =============================================================================
// Nodes
// =============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct WireNode {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: NodeSpec,
    #[serde(default)]
    pub status: NodeStatus,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct NodeSpec {
    #[serde(default)]
    pub unschedulable: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct NodeStatus {
    #[serde(default)]
    pub conditions: Option<Vec<NodeCondition>>,
}

impl From<WireNode> for Node {
    fn from(wire: WireNode) -> Self {
        Self {
            name: wire.metadata.name,
            labels: wire.metadata.labels.unwrap_or_default(),
            annotations: wire.metadata.annotations.unwrap_or_default(),
            unschedulable: wire.spec.unschedulable.unwrap_or(false),
            conditions: wire.status.conditions.unwrap_or_default(),
        }
    }
}

// =============================================================================
// Machines
// =============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct WireMachine {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub status: MachineStatus,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MachineStatus {
    #[serde(default)]
    pub node_ref: Option<ObjectRef>,
}

impl From<WireMachine> for Machine {
    fn from(wire: WireMachine) -> Self {
        Self {
            namespace: wire.metadata.namespace.unwrap_or_default(),
            name: wire.metadata.name,
            labels: wire.metadata.labels.unwrap_or_default(),
            owner_references: wire.metadata.owner_references.unwrap_or_default(),
            node_ref: wire.status.node_ref,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireMachineSet {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: MachineSetSpec,
    #[serde(default)]
    pub status: MachineSetStatus,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct MachineSetSpec {
    #[serde(default)]
    pub replicas: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MachineSetStatus {
    #[serde(default)]
    pub ready_replicas: Option<i32>,
    #[serde(default)]
    pub available_replicas: Option<i32>,
}

impl From<WireMachineSet> for MachineSet {
    fn from(wire: WireMachineSet) -> Self {
        Self {
            namespace: wire.metadata.namespace.unwrap_or_default(),
            name: wire.metadata.name,
            uid: wire.metadata.uid.unwrap_or_default(),
            replicas: wire.spec.replicas,
            ready_replicas: wire.status.ready_replicas.unwrap_or(0),
            available_replicas: wire.status.available_replicas.unwrap_or(0),
        }
    }
}

// =============================================================================
// Scale sub-resource
// =============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct WireScale {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: ScaleSpec,
    #[serde(default)]
    pub status: ScaleStatus,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct ScaleSpec {
    #[serde(default)]
    pub replicas: i32,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct ScaleStatus {
    #[serde(default)]
    pub replicas: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
}

impl From<WireScale> for Scale {
    fn from(wire: WireScale) -> Self {
        Self {
            namespace: wire.metadata.namespace.unwrap_or_default(),
            name: wire.metadata.name,
            replicas: wire.spec.replicas,
            observed_replicas: wire.status.replicas,
            selector: wire.status.selector,
            resource_version: wire.metadata.resource_version,
            raw: None,
        }
    }
}

/// Decode a scale and keep the full object for the later update.
pub(crate) fn scale_from_value(value: Value) -> Result<Scale, serde_json::Error> {
    let wire: WireScale = serde_json::from_value(value.clone())?;
    Ok(Scale {
        raw: Some(value),
        ..Scale::from(wire)
    })
}

/// Update body built from the object read earlier, with only the desired
/// replicas (and the resource version guarding the write) replaced.
///
/// Returns `None` when the scale carries no usable raw object.
pub(crate) fn replay_scale(scale: &Scale) -> Option<Value> {
    let mut body = scale.raw.clone()?;
    let object = body.as_object_mut()?;

    object
        .entry("apiVersion")
        .or_insert_with(|| Value::from("autoscaling/v1"));
    object.entry("kind").or_insert_with(|| Value::from("Scale"));
    set_field(object, "spec", "replicas", Value::from(scale.replicas));
    if let Some(version) = &scale.resource_version {
        set_field(object, "metadata", "resourceVersion", Value::from(version.as_str()));
    }
    Some(body)
}

fn set_field(object: &mut Map<String, Value>, section: &str, field: &str, value: Value) {
    let section = object
        .entry(section)
        .or_insert_with(|| Value::Object(Map::new()));
    if !section.is_object() {
        *section = Value::Object(Map::new());
    }
    if let Some(section) = section.as_object_mut() {
        section.insert(field.to_string(), value);
    }
}

/// Request body for a scale update (`autoscaling/v1` `Scale`).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ScaleUpdate<'a> {
    pub api_version: &'static str,
    pub kind: &'static str,
    pub metadata: ScaleUpdateMeta<'a>,
    pub spec: ScaleSpec,
    pub status: ScaleStatus,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ScaleUpdateMeta<'a> {
    pub name: &'a str,
    pub namespace: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<&'a str>,
}

impl<'a> From<&'a Scale> for ScaleUpdate<'a> {
    fn from(scale: &'a Scale) -> Self {
        Self {
            api_version: "autoscaling/v1",
            kind: "Scale",
            metadata: ScaleUpdateMeta {
                name: &scale.name,
                namespace: &scale.namespace,
                resource_version: scale.resource_version.as_deref(),
            },
            spec: ScaleSpec {
                replicas: scale.replicas,
            },
            status: ScaleStatus {
                replicas: scale.observed_replicas,
                selector: scale.selector.clone(),
            },
        }
    }
}

/// `metav1.Status` body returned with API errors.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct StatusBody {
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub message: String,
}

//! Cluster resource records.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::key::MachineKey;

/// Condition type that marks a node as able to run workloads.
pub const NODE_READY_CONDITION: &str = "Ready";

/// Kinds of resource the verifier reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Node,
    Machine,
    MachineSet,
    Scale,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Node => "node",
            Self::Machine => "machine",
            Self::MachineSet => "machineset",
            Self::Scale => "scale",
        };
        f.write_str(s)
    }
}

// =============================================================================
// Nodes
// =============================================================================

/// Status of a node condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

impl fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::True => "True",
            Self::False => "False",
            Self::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// One entry of a node's condition set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeCondition {
    #[serde(rename = "type")]
    pub kind: String,
    pub status: ConditionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<DateTime<Utc>>,
}

impl NodeCondition {
    pub fn new(kind: impl Into<String>, status: ConditionStatus) -> Self {
        Self {
            kind: kind.into(),
            status,
            reason: None,
            message: None,
            last_transition_time: None,
        }
    }
}

impl fmt::Display for NodeCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.kind, self.status)?;
        if let Some(reason) = &self.reason {
            write!(f, " ({reason})")?;
        }
        Ok(())
    }
}

/// A cluster node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub name: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub unschedulable: bool,
    #[serde(default)]
    pub conditions: Vec<NodeCondition>,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            labels: BTreeMap::new(),
            annotations: BTreeMap::new(),
            unschedulable: false,
            conditions: Vec::new(),
        }
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(String::as_str)
    }

    pub fn has_label(&self, key: &str) -> bool {
        self.labels.contains_key(key)
    }

    /// The `Ready` condition, if the node reports one.
    pub fn ready_condition(&self) -> Option<&NodeCondition> {
        self.conditions
            .iter()
            .find(|c| c.kind == NODE_READY_CONDITION)
    }

    /// Returns true if the `Ready` condition is `True`.
    pub fn is_ready(&self) -> bool {
        self.ready_condition()
            .is_some_and(|c| c.status == ConditionStatus::True)
    }

    /// Compact `Type=Status` rendering of every condition.
    pub fn conditions_summary(&self) -> String {
        if self.conditions.is_empty() {
            return "<none>".to_string();
        }
        self.conditions
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

// =============================================================================
// Machines
// =============================================================================

/// Reference to another object by namespace and name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRef {
    #[serde(default)]
    pub namespace: String,
    pub name: String,
}

impl ObjectRef {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

/// Ownership link from a dependent to its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerReference {
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub controller: bool,
}

/// A machine record: one unit of desired infrastructure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Machine {
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub owner_references: Vec<OwnerReference>,
    /// Set once the machine is backed by a node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_ref: Option<ObjectRef>,
}

impl Machine {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            labels: BTreeMap::new(),
            owner_references: Vec::new(),
            node_ref: None,
        }
    }

    /// The machine's own `namespace/name` identity.
    pub fn key(&self) -> MachineKey {
        MachineKey::new(&self.namespace, &self.name)
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    /// The owner reference flagged as controller, if any.
    pub fn controller(&self) -> Option<&OwnerReference> {
        self.owner_references.iter().find(|r| r.controller)
    }

    /// Returns true if `set` is this machine's controlling owner.
    ///
    /// Matches on uid when both sides have one, otherwise on kind and name
    /// within the same namespace.
    pub fn is_controlled_by(&self, set: &MachineSet) -> bool {
        let Some(owner) = self.controller() else {
            return false;
        };
        if !owner.uid.is_empty() && !set.uid.is_empty() {
            return owner.uid == set.uid;
        }
        owner.kind == MachineSet::KIND && owner.name == set.name && self.namespace == set.namespace
    }
}

// =============================================================================
// Machine sets
// =============================================================================

/// A group of identical machines kept at a replica count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineSet {
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub uid: String,
    /// Desired replicas; `None` when the spec leaves it unset.
    #[serde(default)]
    pub replicas: Option<i32>,
    #[serde(default)]
    pub ready_replicas: i32,
    #[serde(default)]
    pub available_replicas: i32,
}

impl MachineSet {
    pub const KIND: &'static str = "MachineSet";

    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            uid: String::new(),
            replicas: None,
            ready_replicas: 0,
            available_replicas: 0,
        }
    }

    /// Desired replicas, falling back to `default` when unset.
    pub fn desired_replicas(&self, default: i32) -> i32 {
        self.replicas.unwrap_or(default)
    }
}

/// The scale sub-resource of a scalable resource.
///
/// Everything read is carried into the update; only `replicas` is meant to
/// change. `resource_version` lets the cluster reject a stale write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scale {
    pub namespace: String,
    pub name: String,
    /// Desired replicas (`spec.replicas`).
    pub replicas: i32,
    /// Observed replicas (`status.replicas`).
    #[serde(default)]
    pub observed_replicas: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
    /// The object exactly as the server returned it. Updates are written on
    /// top of it so fields not named above survive the round trip.
    #[serde(skip)]
    pub raw: Option<serde_json::Value>,
}

impl Scale {
    /// A copy with the desired replica count changed and nothing else.
    pub fn with_replicas(&self, replicas: i32) -> Self {
        Self {
            replicas,
            ..self.clone()
        }
    }
}

/// API group plus resource name, e.g. `machinesets.machine.openshift.io`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupResource {
    pub group: String,
    pub resource: String,
}

impl GroupResource {
    pub fn new(group: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            resource: resource.into(),
        }
    }
}

impl fmt::Display for GroupResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}", self.resource)
        } else {
            write!(f, "{}.{}", self.resource, self.group)
        }
    }
}

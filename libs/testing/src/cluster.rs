//! In-memory cluster.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use mapicheck_client::{ClusterAccess, ClusterError};
use mapicheck_model::{
    GroupResource, LabelSelector, Machine, MachineSet, Node, ResourceKind, Scale,
};

use crate::fixtures;

/// Number of calls made to each [`ClusterAccess`] operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub list_nodes: u32,
    pub get_node: u32,
    pub list_machines: u32,
    pub get_machine: u32,
    pub delete_machine: u32,
    pub list_machine_sets: u32,
    pub get_scale: u32,
    pub update_scale: u32,
}

#[derive(Debug, Default)]
struct State {
    nodes: BTreeMap<String, Node>,
    machines: BTreeMap<(String, String), Machine>,
    machine_sets: BTreeMap<(String, String), MachineSet>,
    scales: BTreeMap<(String, String), Scale>,
    scale_updates: Vec<Scale>,
    calls: CallCounts,
    failing_node_lists: u32,
    failing_machine_lists: u32,
    failing_machine_set_lists: bool,
    failing_deletes: bool,
}

/// In-memory [`ClusterAccess`] for tests.
///
/// Mutations made through the setters are visible to the next read, which is
/// how tests simulate the cluster converging in the background.
#[derive(Debug, Default)]
pub struct FakeCluster {
    state: Mutex<State>,
}

impl FakeCluster {
    /// An empty cluster.
    pub fn new() -> Self {
        Self::default()
    }

    /// A cluster with `size` linked machine/node pairs in `namespace`.
    ///
    /// Machines are named `machine-0`, `machine-1`, ...
    pub fn converged(namespace: &str, size: usize) -> Self {
        let cluster = Self::new();
        for i in 0..size {
            cluster.add_linked_pair(namespace, &format!("machine-{i}"));
        }
        cluster
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn add_node(&self, node: Node) {
        self.lock().nodes.insert(node.name.clone(), node);
    }

    pub fn remove_node(&self, name: &str) -> Option<Node> {
        self.lock().nodes.remove(name)
    }

    /// Apply `f` to the named node, if present.
    pub fn update_node(&self, name: &str, f: impl FnOnce(&mut Node)) {
        if let Some(node) = self.lock().nodes.get_mut(name) {
            f(node);
        }
    }

    pub fn add_machine(&self, machine: Machine) {
        let key = (machine.namespace.clone(), machine.name.clone());
        self.lock().machines.insert(key, machine);
    }

    /// Apply `f` to the named machine, if present.
    pub fn update_machine(&self, namespace: &str, name: &str, f: impl FnOnce(&mut Machine)) {
        let key = (namespace.to_string(), name.to_string());
        if let Some(machine) = self.lock().machines.get_mut(&key) {
            f(machine);
        }
    }

    /// Add a ready machine/node pair linked in both directions.
    pub fn add_linked_pair(&self, namespace: &str, machine_name: &str) {
        let (machine, node) = fixtures::linked_pair(namespace, machine_name);
        self.add_machine(machine);
        self.add_node(node);
    }

    /// Add a machine-set together with its scale sub-resource.
    pub fn add_machine_set(&self, set: MachineSet) {
        let key = (set.namespace.clone(), set.name.clone());
        let replicas = set.replicas.unwrap_or(0);
        let scale = Scale {
            namespace: set.namespace.clone(),
            name: set.name.clone(),
            replicas,
            observed_replicas: set.ready_replicas,
            selector: Some(format!("machine.openshift.io/cluster-api-machineset={}", set.name)),
            resource_version: Some("1".to_string()),
            raw: None,
        };

        let mut state = self.lock();
        state.scales.insert(key.clone(), scale);
        state.machine_sets.insert(key, set);
    }

    /// Make the next `n` node lists fail with a 503.
    pub fn fail_next_node_lists(&self, n: u32) {
        self.lock().failing_node_lists = n;
    }

    /// Make the next `n` machine lists fail with a 503.
    pub fn fail_next_machine_lists(&self, n: u32) {
        self.lock().failing_machine_lists = n;
    }

    /// Make every machine-set list fail with a 503.
    pub fn fail_machine_set_lists(&self) {
        self.lock().failing_machine_set_lists = true;
    }

    /// Make every machine delete fail with a 403.
    pub fn fail_deletes(&self) {
        self.lock().failing_deletes = true;
    }

    pub fn calls(&self) -> CallCounts {
        self.lock().calls
    }

    pub fn node_count(&self) -> usize {
        self.lock().nodes.len()
    }

    pub fn machine(&self, namespace: &str, name: &str) -> Option<Machine> {
        let key = (namespace.to_string(), name.to_string());
        self.lock().machines.get(&key).cloned()
    }

    pub fn scale(&self, namespace: &str, name: &str) -> Option<Scale> {
        let key = (namespace.to_string(), name.to_string());
        self.lock().scales.get(&key).cloned()
    }

    /// Every scale value written through `update_scale`, in order.
    pub fn scale_updates(&self) -> Vec<Scale> {
        self.lock().scale_updates.clone()
    }
}

fn take_failure(counter: &mut u32, what: &str) -> Result<(), ClusterError> {
    if *counter > 0 {
        *counter -= 1;
        return Err(ClusterError::unavailable(format!("injected {what} failure")));
    }
    Ok(())
}

#[async_trait]
impl ClusterAccess for FakeCluster {
    async fn list_nodes(&self, selector: &LabelSelector) -> Result<Vec<Node>, ClusterError> {
        let mut state = self.lock();
        state.calls.list_nodes += 1;
        take_failure(&mut state.failing_node_lists, "node list")?;
        Ok(state
            .nodes
            .values()
            .filter(|n| selector.matches(&n.labels))
            .cloned()
            .collect())
    }

    async fn get_node(&self, name: &str) -> Result<Node, ClusterError> {
        let mut state = self.lock();
        state.calls.get_node += 1;
        state
            .nodes
            .get(name)
            .cloned()
            .ok_or_else(|| ClusterError::not_found(ResourceKind::Node, name))
    }

    async fn list_machines(&self, namespace: &str) -> Result<Vec<Machine>, ClusterError> {
        let mut state = self.lock();
        state.calls.list_machines += 1;
        take_failure(&mut state.failing_machine_lists, "machine list")?;
        Ok(state
            .machines
            .values()
            .filter(|m| m.namespace == namespace)
            .cloned()
            .collect())
    }

    async fn get_machine(&self, namespace: &str, name: &str) -> Result<Machine, ClusterError> {
        let mut state = self.lock();
        state.calls.get_machine += 1;
        state
            .machines
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| ClusterError::not_found(ResourceKind::Machine, name))
    }

    async fn delete_machine(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        let mut state = self.lock();
        state.calls.delete_machine += 1;
        if state.failing_deletes {
            return Err(ClusterError::Api {
                status: 403,
                reason: "Forbidden".to_string(),
                message: format!("machines {name:?} is forbidden"),
            });
        }
        state
            .machines
            .remove(&(namespace.to_string(), name.to_string()))
            .map(|_| ())
            .ok_or_else(|| ClusterError::not_found(ResourceKind::Machine, name))
    }

    async fn list_machine_sets(&self, namespace: &str) -> Result<Vec<MachineSet>, ClusterError> {
        let mut state = self.lock();
        state.calls.list_machine_sets += 1;
        if state.failing_machine_set_lists {
            return Err(ClusterError::unavailable("injected machine-set list failure"));
        }
        Ok(state
            .machine_sets
            .values()
            .filter(|s| s.namespace == namespace)
            .cloned()
            .collect())
    }

    async fn get_scale(
        &self,
        _resource: &GroupResource,
        namespace: &str,
        name: &str,
    ) -> Result<Scale, ClusterError> {
        let mut state = self.lock();
        state.calls.get_scale += 1;
        state
            .scales
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| ClusterError::not_found(ResourceKind::Scale, name))
    }

    async fn update_scale(
        &self,
        _resource: &GroupResource,
        scale: &Scale,
    ) -> Result<Scale, ClusterError> {
        let mut state = self.lock();
        state.calls.update_scale += 1;
        state.scale_updates.push(scale.clone());

        let key = (scale.namespace.clone(), scale.name.clone());
        let Some(current) = state.scales.get(&key) else {
            return Err(ClusterError::not_found(ResourceKind::Scale, &scale.name));
        };
        if scale.resource_version.is_some() && scale.resource_version != current.resource_version {
            return Err(ClusterError::Api {
                status: 409,
                reason: "Conflict".to_string(),
                message: "the object has been modified".to_string(),
            });
        }

        let next_version = current
            .resource_version
            .as_deref()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0)
            + 1;
        let stored = Scale {
            resource_version: Some(next_version.to_string()),
            ..scale.clone()
        };
        state.scales.insert(key.clone(), stored.clone());
        if let Some(set) = state.machine_sets.get_mut(&key) {
            set.replicas = Some(stored.replicas);
        }
        Ok(stored)
    }
}

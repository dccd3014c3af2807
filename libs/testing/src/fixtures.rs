//! Builders for cluster records.
//!
//! Defaults follow the machine API conventions in
//! [`mapicheck_model::well_known`].

use mapicheck_model::well_known::{
    MACHINE_ANNOTATION, MACHINE_API_NAMESPACE, MACHINE_ROLE_LABEL, NODE_WORKER_ROLE_LABEL,
};
use mapicheck_model::{
    ConditionStatus, Machine, MachineSet, Node, NodeCondition, ObjectRef, OwnerReference,
    NODE_READY_CONDITION,
};

/// Namespace used by fixtures unless stated otherwise.
pub const NAMESPACE: &str = MACHINE_API_NAMESPACE;

/// A worker node reporting `Ready=True`.
pub fn ready_node(name: &str) -> Node {
    let mut node = Node::new(name);
    node.labels
        .insert(NODE_WORKER_ROLE_LABEL.to_string(), String::new());
    node.conditions.push(NodeCondition::new(
        NODE_READY_CONDITION,
        ConditionStatus::True,
    ));
    node
}

/// A worker node whose `Ready` condition has the given status.
pub fn node_with_ready(name: &str, status: ConditionStatus) -> Node {
    let mut node = ready_node(name);
    node.conditions[0].status = status;
    node
}

/// A worker machine without a node yet.
pub fn machine(namespace: &str, name: &str) -> Machine {
    let mut machine = Machine::new(namespace, name);
    machine
        .labels
        .insert(MACHINE_ROLE_LABEL.to_string(), "worker".to_string());
    machine
}

/// A machine owned by `set`.
pub fn owned_machine(set: &MachineSet, name: &str) -> Machine {
    let mut machine = machine(&set.namespace, name);
    machine.owner_references.push(OwnerReference {
        kind: MachineSet::KIND.to_string(),
        name: set.name.clone(),
        uid: set.uid.clone(),
        controller: true,
    });
    machine
}

/// Link `machine` and `node` in both directions.
pub fn link(machine: &mut Machine, node: &mut Node) {
    machine.node_ref = Some(ObjectRef::new("", &node.name));
    node.annotations
        .insert(MACHINE_ANNOTATION.to_string(), machine.key().to_string());
}

/// A machine and its ready node, linked in both directions.
///
/// The node is named after the machine with a `-node` suffix.
pub fn linked_pair(namespace: &str, machine_name: &str) -> (Machine, Node) {
    let mut m = machine(namespace, machine_name);
    let mut n = ready_node(&format!("{machine_name}-node"));
    link(&mut m, &mut n);
    (m, n)
}

/// A machine-set with a uid and the given desired replicas.
pub fn machine_set(namespace: &str, name: &str, replicas: i32) -> MachineSet {
    let mut set = MachineSet::new(namespace, name);
    set.uid = format!("uid-{name}");
    set.replicas = Some(replicas);
    set
}

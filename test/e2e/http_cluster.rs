//! The verifier against a Kubernetes-shaped HTTP API.
//!
//! A wiremock server plays the API server, so these tests cover the whole
//! path: verifier → reader → `HttpCluster` → JSON on the wire.

use std::sync::Arc;

use mapicheck_client::{HttpCluster, HttpClusterConfig};
use mapicheck_verify::{ClusterVerifier, VerifierConfig};
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MACHINES: &str = "/apis/machine.openshift.io/v1beta1/namespaces/openshift-machine-api/machines";
const MACHINE_SETS: &str =
    "/apis/machine.openshift.io/v1beta1/namespaces/openshift-machine-api/machinesets";

fn node(name: &str, machine: &str, ready: &str) -> Value {
    json!({
        "metadata": {
            "name": name,
            "labels": { "node-role.kubernetes.io/worker": "" },
            "annotations": {
                "machine.openshift.io/machine": format!("openshift-machine-api/{machine}")
            }
        },
        "spec": {},
        "status": {
            "conditions": [
                { "type": "MemoryPressure", "status": "False" },
                { "type": "Ready", "status": ready, "reason": "KubeletReady" }
            ]
        }
    })
}

fn machine(name: &str, node: &str) -> Value {
    json!({
        "metadata": {
            "name": name,
            "namespace": "openshift-machine-api",
            "labels": { "machine.openshift.io/cluster-api-machine-role": "worker" },
            "ownerReferences": [
                { "kind": "MachineSet", "name": "workers", "uid": "uid-workers", "controller": true }
            ]
        },
        "status": { "nodeRef": { "name": node } }
    })
}

async fn cluster_with(nodes: Vec<Value>, machines: Vec<Value>) -> (MockServer, ClusterVerifier) {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/nodes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": nodes })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(MACHINES))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": machines })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(MACHINE_SETS))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{
                "metadata": { "name": "workers", "namespace": "openshift-machine-api", "uid": "uid-workers" },
                "spec": { "replicas": 2 },
                "status": { "readyReplicas": 2, "availableReplicas": 2 }
            }]
        })))
        .mount(&server)
        .await;

    let http = HttpCluster::new(&HttpClusterConfig {
        api_url: server.uri(),
        token: Some("e2e-token".to_string()),
        ..HttpClusterConfig::default()
    })
    .unwrap();
    let verifier = ClusterVerifier::new(Arc::new(http), VerifierConfig::default());
    (server, verifier)
}

#[tokio::test]
async fn converged_cluster_passes_every_stage() {
    let (_server, verifier) = cluster_with(
        vec![
            node("worker-a", "workers-a", "True"),
            node("worker-b", "workers-b", "True"),
        ],
        vec![machine("workers-a", "worker-a"), machine("workers-b", "worker-b")],
    )
    .await;

    let elapsed = verifier.wait_for_cluster_size(2).await.unwrap();
    assert!(elapsed < std::time::Duration::from_secs(1));
    assert!(verifier.check_one_machine_per_node("openshift-machine-api").await);

    let snapshot = verifier.snapshot().await.unwrap();
    assert_eq!(snapshot.machine_sets[0].desired, 2);
    assert_eq!(snapshot.nodes.len(), 2);
    assert!(snapshot.nodes.iter().all(|n| n.ready && !n.unschedulable));
}

#[tokio::test]
async fn worker_node_resolves_to_its_machine() {
    let (server, verifier) = cluster_with(
        vec![node("worker-a", "workers-a", "True")],
        vec![machine("workers-a", "worker-a")],
    )
    .await;
    Mock::given(method("GET"))
        .and(path(format!("{MACHINES}/workers-a")))
        .respond_with(ResponseTemplate::new(200).set_body_json(machine("workers-a", "worker-a")))
        .expect(1)
        .mount(&server)
        .await;

    let worker = verifier.get_worker_node().await.unwrap();
    assert_eq!(worker.name, "worker-a");
    assert_eq!(worker.conditions_summary(), "MemoryPressure=False, Ready=True (KubeletReady)");

    let machine = verifier.reader().machine_for_node(&worker).await.unwrap();
    assert_eq!(machine.name, "workers-a");
    assert_eq!(machine.node_ref.unwrap().name, "worker-a");
}

#[tokio::test]
async fn scale_round_trips_through_the_scale_subresource() {
    let (server, verifier) = cluster_with(vec![], vec![]).await;
    let scale_path = format!("{MACHINE_SETS}/workers/scale");

    Mock::given(method("GET"))
        .and(path(scale_path.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "metadata": {
                "name": "workers",
                "namespace": "openshift-machine-api",
                "uid": "uid-workers",
                "resourceVersion": "7",
                "labels": { "team": "infra" }
            },
            "spec": { "replicas": 2 },
            "status": { "replicas": 2, "selector": "machine.openshift.io/cluster-api-machineset=workers" }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(scale_path.as_str()))
        .and(body_partial_json(json!({
            "metadata": { "uid": "uid-workers", "resourceVersion": "7", "labels": { "team": "infra" } },
            "spec": { "replicas": 4 },
            "status": { "selector": "machine.openshift.io/cluster-api-machineset=workers" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "metadata": { "name": "workers", "namespace": "openshift-machine-api", "resourceVersion": "8" },
            "spec": { "replicas": 4 },
            "status": { "replicas": 2 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let scale = verifier.scale_machine_set("workers", 4).await.unwrap();
    assert_eq!(scale.replicas, 4);
    assert_eq!(scale.resource_version.as_deref(), Some("8"));
}

#[tokio::test]
async fn unready_node_is_reported() {
    let (_server, verifier) = cluster_with(
        vec![
            node("worker-a", "workers-a", "True"),
            node("worker-b", "workers-b", "Unknown"),
        ],
        vec![],
    )
    .await;

    let nodes = verifier.reader().list_nodes().await.unwrap();
    assert!(!verifier.nodes_are_ready(&nodes));
}

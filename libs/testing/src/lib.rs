//! Test support for the verifier.
//!
//! - [`FakeCluster`]: an in-memory [`ClusterAccess`](mapicheck_client::ClusterAccess)
//!   with call counters and failure injection
//! - [`fixtures`]: builders for linked machine/node pairs

mod cluster;
pub mod fixtures;

pub use cluster::{CallCounts, FakeCluster};

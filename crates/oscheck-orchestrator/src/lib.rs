//! NFV orchestrator and experiment-tracking clients
//!
//! The workload checker needs two collaborators beyond the cloud APIs: the
//! orchestration control plane (NFVO) that owns network service records, and
//! the experiment-tracking service that knows which experimenters and
//! resources are legitimately registered. Both are consumed through narrow
//! traits so the engine can run against in-memory fakes.

pub mod error;
pub mod nfvo;
pub mod tracking;
pub mod types;

pub use error::{OrchestratorError, Result};
pub use nfvo::{NfvoClient, OpenBatonClient};
pub use tracking::{ExperimentTracker, HttpExperimentTracker};
pub use types::{
    ExperimentResource, NetworkServiceRecord, ResourceUse, VirtualDeploymentUnit,
    VirtualNetworkFunctionRecord, VnfcInstance,
};

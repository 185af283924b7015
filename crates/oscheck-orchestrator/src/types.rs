//! Control-plane and tracking-service payload types

use crate::error::{OrchestratorError, Result};
use serde::Deserialize;

/// A running network service, as the NFVO reports it
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkServiceRecord {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// The NSD this record was instantiated from
    pub descriptor_reference: String,
    #[serde(default)]
    pub vnfr: Vec<VirtualNetworkFunctionRecord>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VirtualNetworkFunctionRecord {
    #[serde(default)]
    pub vdu: Vec<VirtualDeploymentUnit>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VirtualDeploymentUnit {
    #[serde(default)]
    pub vnfc_instance: Vec<VnfcInstance>,
}

/// A deployed component instance, carrying the cloud server ID
#[derive(Debug, Clone, Deserialize)]
pub struct VnfcInstance {
    pub vc_id: String,
}

impl NetworkServiceRecord {
    /// All cloud server IDs this record still references
    /// (record → function record → deployment unit → component instance)
    pub fn instance_ids(&self) -> impl Iterator<Item = &str> {
        self.vnfr
            .iter()
            .flat_map(|vnfr| vnfr.vdu.iter())
            .flat_map(|vdu| vdu.vnfc_instance.iter())
            .map(|vnfc| vnfc.vc_id.as_str())
    }
}

/// A resource registration from the experiment-tracking service
#[derive(Debug, Clone, Deserialize)]
pub struct ExperimentResource {
    pub username: String,
    pub node_type: String,
    /// JSON-encoded payload whose shape depends on `node_type`
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub resource_id: Option<String>,
    #[serde(default)]
    pub experiment_id: Option<String>,
}

/// What a registered resource contributes to the keep-sets
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceUse {
    /// An NSR that must survive the garbage-collection pass
    KeepNsr(String),
    /// A server instance to keep, possibly pinned to one testbed
    KeepVm { id: String, testbed: Option<String> },
    /// Node types the checker does not act on
    Unrelated,
}

#[derive(Debug, Deserialize)]
struct NfvValue {
    nsr_id: String,
}

#[derive(Debug, Deserialize)]
struct MonitoringValue {
    vm_id: String,
    #[serde(default)]
    testbed: Option<String>,
}

impl ExperimentResource {
    /// Classify this registration for the keep-set computation.
    ///
    /// NFV and security resources both resolve to an NSR to keep; monitoring
    /// resources resolve to a VM, pinned to the testbed they were deployed
    /// on when the registration says so. An unparseable `value` is an error
    /// the caller logs and skips (spec: never fatal).
    pub fn classify(&self) -> Result<ResourceUse> {
        match self.node_type.as_str() {
            "NfvResource" | "SecurityResource" => {
                let value: NfvValue = serde_json::from_str(&self.value).map_err(|e| {
                    OrchestratorError::MalformedResource(format!(
                        "{} of '{}': {}",
                        self.node_type, self.username, e
                    ))
                })?;
                Ok(ResourceUse::KeepNsr(value.nsr_id))
            }
            "MonitoringResource" => {
                let value: MonitoringValue = serde_json::from_str(&self.value).map_err(|e| {
                    OrchestratorError::MalformedResource(format!(
                        "MonitoringResource of '{}': {}",
                        self.username, e
                    ))
                })?;
                Ok(ResourceUse::KeepVm {
                    id: value.vm_id,
                    testbed: value.testbed,
                })
            }
            _ => Ok(ResourceUse::Unrelated),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource(node_type: &str, value: &str) -> ExperimentResource {
        ExperimentResource {
            username: "alice".into(),
            node_type: node_type.into(),
            value: value.into(),
            status: None,
            resource_id: None,
            experiment_id: None,
        }
    }

    #[test]
    fn nfv_resource_keeps_nsr() {
        let r = resource("NfvResource", r#"{"nsr_id": "nsr-1"}"#);
        assert_eq!(r.classify().unwrap(), ResourceUse::KeepNsr("nsr-1".into()));
    }

    #[test]
    fn security_resource_keeps_nsr() {
        let r = resource("SecurityResource", r#"{"nsr_id": "nsr-fw"}"#);
        assert_eq!(r.classify().unwrap(), ResourceUse::KeepNsr("nsr-fw".into()));
    }

    #[test]
    fn monitoring_resource_keeps_vm_with_testbed() {
        let r = resource(
            "MonitoringResource",
            r#"{"vm_id": "vm-9", "testbed": "berlin"}"#,
        );
        assert_eq!(
            r.classify().unwrap(),
            ResourceUse::KeepVm {
                id: "vm-9".into(),
                testbed: Some("berlin".into())
            }
        );
    }

    #[test]
    fn unknown_node_type_is_unrelated() {
        let r = resource("PhysicalResource", "whatever");
        assert_eq!(r.classify().unwrap(), ResourceUse::Unrelated);
    }

    #[test]
    fn malformed_value_is_an_error() {
        let r = resource("NfvResource", "not json");
        assert!(matches!(
            r.classify(),
            Err(OrchestratorError::MalformedResource(_))
        ));
    }

    #[test]
    fn instance_ids_traverse_the_record() {
        let nsr: NetworkServiceRecord = serde_json::from_str(
            r#"{
                "id": "nsr-1",
                "descriptor_reference": "nsd-1",
                "vnfr": [
                    {"vdu": [{"vnfc_instance": [{"vc_id": "vm-a"}, {"vc_id": "vm-b"}]}]},
                    {"vdu": [{"vnfc_instance": [{"vc_id": "vm-c"}]}, {"vnfc_instance": []}]}
                ]
            }"#,
        )
        .unwrap();
        let ids: Vec<_> = nsr.instance_ids().collect();
        assert_eq!(ids, vec!["vm-a", "vm-b", "vm-c"]);
    }
}

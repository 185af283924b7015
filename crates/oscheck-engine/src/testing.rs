//! In-memory fakes for the client traits, shared by the checker and driver
//! tests. Mutating calls are recorded so tests can assert exactly which
//! corrective actions were attempted.

use async_trait::async_trait;
use oscheck_cloud::{
    CloudClient, CloudError, FloatingIp, Image, Network, Project, SecurityGroup, Server,
};
use oscheck_orchestrator::{
    ExperimentResource, ExperimentTracker, NetworkServiceRecord, NfvoClient, OrchestratorError,
};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub fn project(id: &str, name: &str) -> Project {
    Project {
        id: id.into(),
        name: name.into(),
    }
}

pub fn image(name: &str) -> Image {
    Image {
        id: format!("img-{name}"),
        name: name.into(),
    }
}

pub fn fip(id: &str, address: &str, fixed_ip: Option<&str>) -> FloatingIp {
    FloatingIp {
        id: id.into(),
        address: address.into(),
        fixed_ip: fixed_ip.map(str::to_string),
    }
}

/// Build an NSR with the given descriptor and referenced server IDs
pub fn nsr(id: &str, nsd: &str, vm_ids: &[&str]) -> NetworkServiceRecord {
    serde_json::from_value(serde_json::json!({
        "id": id,
        "descriptor_reference": nsd,
        "vnfr": [{
            "vdu": [{
                "vnfc_instance": vm_ids.iter().map(|vm| serde_json::json!({"vc_id": vm}))
                    .collect::<Vec<_>>()
            }]
        }]
    }))
    .unwrap()
}

#[derive(Default)]
pub struct MockCloud {
    pub name: String,
    pub tenants: Vec<Project>,
    pub images: BTreeMap<String, Vec<Image>>,
    pub security_groups: BTreeMap<String, Vec<SecurityGroup>>,
    pub networks: BTreeMap<String, Vec<Network>>,
    pub floating_ips: BTreeMap<String, Vec<FloatingIp>>,
    pub servers: BTreeMap<String, Vec<Server>>,
    /// Project IDs on which every call fails with `Unauthorized`
    pub unauthorized: BTreeSet<String>,
    pub fail_tenants: bool,
    pub uploads: Mutex<Vec<(String, String, PathBuf)>>,
    pub releases: Mutex<Vec<(String, Vec<String>)>>,
    pub deleted_servers: Mutex<Vec<(String, String)>>,
}

impl MockCloud {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    fn authorize(&self, project_id: &str) -> Result<(), CloudError> {
        if self.unauthorized.contains(project_id) {
            return Err(CloudError::Unauthorized(format!(
                "no role on {project_id}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl CloudClient for MockCloud {
    fn testbed_name(&self) -> &str {
        &self.name
    }

    async fn list_tenants(&self) -> oscheck_cloud::Result<Vec<Project>> {
        if self.fail_tenants {
            return Err(CloudError::ApiError("tenant listing failed".into()));
        }
        Ok(self.tenants.clone())
    }

    async fn list_images(&self, project_id: &str) -> oscheck_cloud::Result<Vec<Image>> {
        self.authorize(project_id)?;
        Ok(self.images.get(project_id).cloned().unwrap_or_default())
    }

    async fn upload_image(
        &self,
        project_id: &str,
        name: &str,
        source: &Path,
    ) -> oscheck_cloud::Result<Image> {
        self.authorize(project_id)?;
        self.uploads.lock().unwrap().push((
            project_id.to_string(),
            name.to_string(),
            source.to_path_buf(),
        ));
        Ok(image(name))
    }

    async fn list_security_groups(
        &self,
        project_id: &str,
    ) -> oscheck_cloud::Result<Vec<SecurityGroup>> {
        self.authorize(project_id)?;
        Ok(self
            .security_groups
            .get(project_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_networks(&self, project_id: &str) -> oscheck_cloud::Result<Vec<Network>> {
        self.authorize(project_id)?;
        Ok(self.networks.get(project_id).cloned().unwrap_or_default())
    }

    async fn list_floating_ips(&self, project_id: &str) -> oscheck_cloud::Result<Vec<FloatingIp>> {
        self.authorize(project_id)?;
        Ok(self
            .floating_ips
            .get(project_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn release_floating_ips(
        &self,
        project_id: &str,
        keep_ids: &[String],
    ) -> oscheck_cloud::Result<Vec<String>> {
        self.authorize(project_id)?;
        self.releases
            .lock()
            .unwrap()
            .push((project_id.to_string(), keep_ids.to_vec()));
        Ok(self
            .floating_ips
            .get(project_id)
            .map(|fips| {
                fips.iter()
                    .filter(|f| !keep_ids.contains(&f.id))
                    .map(|f| f.address.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn list_servers(&self, project_id: &str) -> oscheck_cloud::Result<Vec<Server>> {
        self.authorize(project_id)?;
        Ok(self.servers.get(project_id).cloned().unwrap_or_default())
    }

    async fn delete_server(&self, project_id: &str, server_id: &str) -> oscheck_cloud::Result<()> {
        self.authorize(project_id)?;
        self.deleted_servers
            .lock()
            .unwrap()
            .push((project_id.to_string(), server_id.to_string()));
        Ok(())
    }
}

#[derive(Default)]
pub struct MockNfvo {
    /// project name → control-plane project id
    pub projects: BTreeMap<String, String>,
    /// control-plane project id → NSRs
    pub nsrs: BTreeMap<String, Vec<NetworkServiceRecord>>,
    pub fail_list: bool,
    /// NSR IDs whose deletion fails
    pub fail_delete: BTreeSet<String>,
    pub deleted_nsrs: Mutex<Vec<String>>,
    pub deleted_nsds: Mutex<Vec<String>>,
}

#[async_trait]
impl NfvoClient for MockNfvo {
    async fn find_project(&self, name: &str) -> oscheck_orchestrator::Result<Option<String>> {
        Ok(self.projects.get(name).cloned())
    }

    async fn list_network_service_records(
        &self,
        project_id: &str,
    ) -> oscheck_orchestrator::Result<Vec<NetworkServiceRecord>> {
        if self.fail_list {
            return Err(OrchestratorError::ApiError("NSR listing failed".into()));
        }
        Ok(self.nsrs.get(project_id).cloned().unwrap_or_default())
    }

    async fn delete_network_service_record(
        &self,
        _project_id: &str,
        nsr_id: &str,
    ) -> oscheck_orchestrator::Result<()> {
        if self.fail_delete.contains(nsr_id) {
            return Err(OrchestratorError::ApiError(format!(
                "cannot delete {nsr_id}"
            )));
        }
        self.deleted_nsrs.lock().unwrap().push(nsr_id.to_string());
        Ok(())
    }

    async fn delete_network_service_descriptor(
        &self,
        _project_id: &str,
        nsd_id: &str,
    ) -> oscheck_orchestrator::Result<()> {
        self.deleted_nsds.lock().unwrap().push(nsd_id.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct MockTracker {
    pub experimenters: Vec<String>,
    pub resources: Vec<ExperimentResource>,
}

#[async_trait]
impl ExperimentTracker for MockTracker {
    async fn list_experimenters(&self) -> oscheck_orchestrator::Result<Vec<String>> {
        Ok(self.experimenters.clone())
    }

    async fn list_resources(&self) -> oscheck_orchestrator::Result<Vec<ExperimentResource>> {
        Ok(self.resources.clone())
    }
}

//! NFVO (orchestration control plane) client

use crate::error::{OrchestratorError, Result};
use crate::types::NetworkServiceRecord;
use async_trait::async_trait;
use serde::Deserialize;

/// Control-plane abstraction used by the workload checker
#[async_trait]
pub trait NfvoClient: Send + Sync {
    /// Resolve a cloud project name to the control plane's project ID.
    /// `None` means the project is unknown there and must be skipped.
    async fn find_project(&self, name: &str) -> Result<Option<String>>;

    /// All NSRs the control plane tracks for a project
    async fn list_network_service_records(
        &self,
        project_id: &str,
    ) -> Result<Vec<NetworkServiceRecord>>;

    async fn delete_network_service_record(&self, project_id: &str, nsr_id: &str) -> Result<()>;

    async fn delete_network_service_descriptor(&self, project_id: &str, nsd_id: &str)
    -> Result<()>;
}

/// Open Baton-style HTTP implementation
pub struct OpenBatonClient {
    base_url: String,
    username: String,
    password: String,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct NfvoProject {
    id: String,
    name: String,
}

impl OpenBatonClient {
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            username: username.into(),
            password: password.into(),
            http,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1/{}", self.base_url, path)
    }

    async fn check(&self, response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(OrchestratorError::ApiError(format!("{}: {}", status, body)))
    }
}

#[async_trait]
impl NfvoClient for OpenBatonClient {
    async fn find_project(&self, name: &str) -> Result<Option<String>> {
        let response = self
            .http
            .get(self.url("projects"))
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await?;
        let response = self.check(response).await?;
        let projects: Vec<NfvoProject> = response.json().await?;
        let found = projects.into_iter().find(|p| p.name == name).map(|p| p.id);
        tracing::debug!("Control-plane lookup of '{}': {:?}", name, found);
        Ok(found)
    }

    async fn list_network_service_records(
        &self,
        project_id: &str,
    ) -> Result<Vec<NetworkServiceRecord>> {
        let response = self
            .http
            .get(self.url("ns-records"))
            .basic_auth(&self.username, Some(&self.password))
            .header("project-id", project_id)
            .send()
            .await?;
        let response = self.check(response).await?;
        Ok(response.json().await?)
    }

    async fn delete_network_service_record(&self, project_id: &str, nsr_id: &str) -> Result<()> {
        let response = self
            .http
            .delete(self.url(&format!("ns-records/{}", nsr_id)))
            .basic_auth(&self.username, Some(&self.password))
            .header("project-id", project_id)
            .send()
            .await?;
        self.check(response).await?;
        Ok(())
    }

    async fn delete_network_service_descriptor(
        &self,
        project_id: &str,
        nsd_id: &str,
    ) -> Result<()> {
        let response = self
            .http
            .delete(self.url(&format!("ns-descriptors/{}", nsd_id)))
            .basic_auth(&self.username, Some(&self.password))
            .header("project-id", project_id)
            .send()
            .await?;
        self.check(response).await?;
        Ok(())
    }
}

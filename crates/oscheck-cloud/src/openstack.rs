//! OpenStack API client
//!
//! Speaks Keystone v3 (identity), Glance (image), Neutron (network) and Nova
//! (compute) directly over HTTP. Tokens are requested per project scope and
//! cached for the lifetime of the client; the service catalog returned with
//! the token provides the per-service endpoints.

use crate::client::CloudClient;
use crate::error::{CloudError, Result};
use crate::types::{FloatingIp, Image, Network, Project, SecurityGroup, Server};
use async_trait::async_trait;
use oscheck_config::Testbed;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::Mutex;

const PUBLIC_INTERFACE: &str = "public";

/// Concrete testbed client backed by the OpenStack HTTP APIs
pub struct OpenStackClient {
    name: String,
    testbed: Testbed,
    http: reqwest::Client,
    /// Scoped tokens keyed by project id ("" for the unscoped token)
    tokens: Mutex<HashMap<String, ScopedToken>>,
}

#[derive(Debug, Clone)]
struct ScopedToken {
    token: String,
    image_endpoint: Option<String>,
    network_endpoint: Option<String>,
    compute_endpoint: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: TokenBody,
}

#[derive(Debug, Deserialize)]
struct TokenBody {
    #[serde(default)]
    catalog: Vec<CatalogEntry>,
}

#[derive(Debug, Deserialize)]
struct CatalogEntry {
    #[serde(rename = "type")]
    service_type: String,
    #[serde(default)]
    endpoints: Vec<CatalogEndpoint>,
}

#[derive(Debug, Deserialize)]
struct CatalogEndpoint {
    interface: String,
    url: String,
    #[serde(default)]
    region: Option<String>,
}

/// Pick the public endpoint for a service type, honoring the region filter
fn public_endpoint(
    catalog: &[CatalogEntry],
    service_type: &str,
    region: Option<&str>,
) -> Option<String> {
    catalog
        .iter()
        .filter(|entry| entry.service_type == service_type)
        .flat_map(|entry| entry.endpoints.iter())
        .find(|ep| {
            ep.interface == PUBLIC_INTERFACE
                && region.is_none_or(|r| ep.region.as_deref() == Some(r))
        })
        .map(|ep| ep.url.trim_end_matches('/').to_string())
}

impl OpenStackClient {
    pub fn new(name: impl Into<String>, testbed: Testbed) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()?;
        Ok(Self {
            name: name.into(),
            testbed,
            http,
            tokens: Mutex::new(HashMap::new()),
        })
    }

    /// Request a token, scoped to a project when one is given
    async fn authenticate(&self, project_id: Option<&str>) -> Result<ScopedToken> {
        let identity = serde_json::json!({
            "methods": ["password"],
            "password": {
                "user": {
                    "name": self.testbed.username,
                    "domain": {"name": self.testbed.user_domain},
                    "password": self.testbed.password,
                }
            }
        });
        let auth = match project_id {
            Some(id) => serde_json::json!({
                "identity": identity,
                "scope": {"project": {"id": id}},
            }),
            None => serde_json::json!({"identity": identity}),
        };

        let url = format!("{}/auth/tokens", self.testbed.auth_url.trim_end_matches('/'));
        let response = self
            .http
            .post(&url)
            .json(&serde_json::json!({"auth": auth}))
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(CloudError::AuthenticationFailed(format!(
                "Keystone rejected user '{}' on testbed '{}'",
                self.testbed.username, self.name
            )));
        }
        let response = check_status(response).await?;

        let token = response
            .headers()
            .get("X-Subject-Token")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                CloudError::UnexpectedPayload("Keystone response without X-Subject-Token".into())
            })?;
        let body: TokenResponse = response.json().await?;

        let region = self.testbed.region.as_deref();
        Ok(ScopedToken {
            token,
            image_endpoint: public_endpoint(&body.token.catalog, "image", region),
            network_endpoint: public_endpoint(&body.token.catalog, "network", region),
            compute_endpoint: public_endpoint(&body.token.catalog, "compute", region),
        })
    }

    async fn token_for(&self, project_id: Option<&str>) -> Result<ScopedToken> {
        let key = project_id.unwrap_or_default().to_string();
        let mut tokens = self.tokens.lock().await;
        if let Some(cached) = tokens.get(&key) {
            return Ok(cached.clone());
        }
        let token = self.authenticate(project_id).await?;
        tokens.insert(key, token.clone());
        Ok(token)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str, token: &str) -> Result<T> {
        let response = self
            .http
            .get(url)
            .header("X-Auth-Token", token)
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }

    fn image_endpoint(&self, token: &ScopedToken) -> Result<String> {
        token
            .image_endpoint
            .clone()
            .ok_or_else(|| CloudError::ApiError(self.missing_service("image")))
    }

    fn network_endpoint(&self, token: &ScopedToken) -> Result<String> {
        token
            .network_endpoint
            .clone()
            .ok_or_else(|| CloudError::ApiError(self.missing_service("network")))
    }

    fn compute_endpoint(&self, token: &ScopedToken) -> Result<String> {
        token
            .compute_endpoint
            .clone()
            .ok_or_else(|| CloudError::ApiError(self.missing_service("compute")))
    }

    fn missing_service(&self, service: &str) -> String {
        format!(
            "No public '{}' endpoint in the catalog of testbed '{}'",
            service, self.name
        )
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    match status {
        reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => {
            Err(CloudError::Unauthorized(body))
        }
        reqwest::StatusCode::NOT_FOUND => Err(CloudError::ResourceNotFound(body)),
        _ => Err(CloudError::ApiError(format!("{}: {}", status, body))),
    }
}

#[derive(Debug, Deserialize)]
struct ProjectsResponse {
    projects: Vec<ApiProject>,
}

#[derive(Debug, Deserialize)]
struct ApiProject {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct ImagesResponse {
    images: Vec<ApiImage>,
}

#[derive(Debug, Deserialize)]
struct ApiImage {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct SecurityGroupsResponse {
    security_groups: Vec<ApiSecurityGroup>,
}

#[derive(Debug, Deserialize)]
struct ApiSecurityGroup {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct NetworksResponse {
    networks: Vec<ApiNetwork>,
}

#[derive(Debug, Deserialize)]
struct ApiNetwork {
    id: String,
    name: String,
    #[serde(default)]
    shared: bool,
    #[serde(rename = "router:external", default)]
    external: bool,
}

#[derive(Debug, Deserialize)]
struct FloatingIpsResponse {
    floatingips: Vec<ApiFloatingIp>,
}

#[derive(Debug, Deserialize)]
struct ApiFloatingIp {
    id: String,
    floating_ip_address: String,
    #[serde(default)]
    fixed_ip_address: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ServersResponse {
    servers: Vec<ApiServer>,
}

#[derive(Debug, Deserialize)]
struct ApiServer {
    id: String,
    name: String,
}

#[async_trait]
impl CloudClient for OpenStackClient {
    fn testbed_name(&self) -> &str {
        &self.name
    }

    async fn list_tenants(&self) -> Result<Vec<Project>> {
        let token = self.token_for(None).await?;
        let url = format!("{}/projects", self.testbed.auth_url.trim_end_matches('/'));
        let body: ProjectsResponse = self.get_json(&url, &token.token).await?;
        Ok(body
            .projects
            .into_iter()
            .map(|p| Project {
                id: p.id,
                name: p.name,
            })
            .collect())
    }

    async fn list_images(&self, project_id: &str) -> Result<Vec<Image>> {
        let token = self.token_for(Some(project_id)).await?;
        let url = format!("{}/v2/images", self.image_endpoint(&token)?);
        let body: ImagesResponse = self.get_json(&url, &token.token).await?;
        Ok(body
            .images
            .into_iter()
            .map(|i| Image {
                id: i.id,
                name: i.name,
            })
            .collect())
    }

    async fn upload_image(&self, project_id: &str, name: &str, source: &Path) -> Result<Image> {
        let token = self.token_for(Some(project_id)).await?;
        let endpoint = self.image_endpoint(&token)?;

        let create_url = format!("{}/v2/images", endpoint);
        let response = self
            .http
            .post(&create_url)
            .header("X-Auth-Token", &token.token)
            .json(&serde_json::json!({
                "name": name,
                "disk_format": "qcow2",
                "container_format": "bare",
                "visibility": "private",
            }))
            .send()
            .await?;
        let response = check_status(response).await?;
        let image: ApiImage = response.json().await?;

        let payload = tokio::fs::read(source).await?;
        tracing::debug!(
            "Uploading {} bytes for image '{}' to testbed '{}'",
            payload.len(),
            name,
            self.name
        );
        let upload_url = format!("{}/v2/images/{}/file", endpoint, image.id);
        let response = self
            .http
            .put(&upload_url)
            .header("X-Auth-Token", &token.token)
            .header("Content-Type", "application/octet-stream")
            .body(payload)
            .send()
            .await?;
        check_status(response).await?;

        Ok(Image {
            id: image.id,
            name: image.name,
        })
    }

    async fn list_security_groups(&self, project_id: &str) -> Result<Vec<SecurityGroup>> {
        let token = self.token_for(Some(project_id)).await?;
        let url = format!(
            "{}/v2.0/security-groups?tenant_id={}",
            self.network_endpoint(&token)?,
            project_id
        );
        let body: SecurityGroupsResponse = self.get_json(&url, &token.token).await?;
        Ok(body
            .security_groups
            .into_iter()
            .map(|g| SecurityGroup {
                id: g.id,
                name: g.name,
            })
            .collect())
    }

    async fn list_networks(&self, project_id: &str) -> Result<Vec<Network>> {
        let token = self.token_for(Some(project_id)).await?;
        let url = format!("{}/v2.0/networks", self.network_endpoint(&token)?);
        let body: NetworksResponse = self.get_json(&url, &token.token).await?;
        Ok(body
            .networks
            .into_iter()
            .map(|n| Network {
                id: n.id,
                name: n.name,
                shared: n.shared,
                external: n.external,
            })
            .collect())
    }

    async fn list_floating_ips(&self, project_id: &str) -> Result<Vec<FloatingIp>> {
        let token = self.token_for(Some(project_id)).await?;
        let url = format!(
            "{}/v2.0/floatingips?tenant_id={}",
            self.network_endpoint(&token)?,
            project_id
        );
        let body: FloatingIpsResponse = self.get_json(&url, &token.token).await?;
        Ok(body
            .floatingips
            .into_iter()
            .map(|f| FloatingIp {
                id: f.id,
                address: f.floating_ip_address,
                fixed_ip: f.fixed_ip_address,
            })
            .collect())
    }

    async fn release_floating_ips(
        &self,
        project_id: &str,
        keep_ids: &[String],
    ) -> Result<Vec<String>> {
        let token = self.token_for(Some(project_id)).await?;
        let endpoint = self.network_endpoint(&token)?;

        let mut released = Vec::new();
        for fip in self.list_floating_ips(project_id).await? {
            if keep_ids.contains(&fip.id) {
                continue;
            }
            let url = format!("{}/v2.0/floatingips/{}", endpoint, fip.id);
            let response = self
                .http
                .delete(&url)
                .header("X-Auth-Token", &token.token)
                .send()
                .await?;
            check_status(response).await?;
            tracing::debug!("Released floating IP {} on '{}'", fip.address, self.name);
            released.push(fip.address);
        }
        Ok(released)
    }

    async fn list_servers(&self, project_id: &str) -> Result<Vec<Server>> {
        let token = self.token_for(Some(project_id)).await?;
        let url = format!("{}/servers", self.compute_endpoint(&token)?);
        let body: ServersResponse = self.get_json(&url, &token.token).await?;
        Ok(body
            .servers
            .into_iter()
            .map(|s| Server {
                id: s.id,
                name: s.name,
            })
            .collect())
    }

    async fn delete_server(&self, project_id: &str, server_id: &str) -> Result<()> {
        let token = self.token_for(Some(project_id)).await?;
        let url = format!("{}/servers/{}", self.compute_endpoint(&token)?, server_id);
        let response = self
            .http
            .delete(&url)
            .header("X-Auth-Token", &token.token)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}

//! Cloud client trait definition

use crate::error::Result;
use crate::types::{FloatingIp, Image, Network, Project, SecurityGroup, Server};
use async_trait::async_trait;
use std::path::Path;

/// Testbed client abstraction
///
/// One instance per testbed. Every operation is scoped to a project where the
/// API allows it; the engine never caches results across calls.
#[async_trait]
pub trait CloudClient: Send + Sync {
    /// The testbed this client is bound to
    fn testbed_name(&self) -> &str;

    /// List all tenant projects visible to the configured user
    async fn list_tenants(&self) -> Result<Vec<Project>>;

    /// List images visible to a project
    async fn list_images(&self, project_id: &str) -> Result<Vec<Image>>;

    /// Upload an image from a local file into a project
    async fn upload_image(&self, project_id: &str, name: &str, source: &Path) -> Result<Image>;

    /// List security groups owned by a project
    async fn list_security_groups(&self, project_id: &str) -> Result<Vec<SecurityGroup>>;

    /// List networks visible to a project
    async fn list_networks(&self, project_id: &str) -> Result<Vec<Network>>;

    /// List floating IPs allocated to a project
    async fn list_floating_ips(&self, project_id: &str) -> Result<Vec<FloatingIp>>;

    /// Release every floating IP of the project except the given IDs.
    /// Returns the addresses actually released.
    async fn release_floating_ips(
        &self,
        project_id: &str,
        keep_ids: &[String],
    ) -> Result<Vec<String>>;

    /// List server instances owned by a project
    async fn list_servers(&self, project_id: &str) -> Result<Vec<Server>>;

    /// Delete a server instance
    async fn delete_server(&self, project_id: &str, server_id: &str) -> Result<()>;
}

//! Credential and desired-state configuration for oscheck
//!
//! Two JSON files drive a run: a credentials file mapping testbed names to
//! Keystone endpoints, and a desired-state file declaring what each testbed
//! (or the special `"any"` scope, applying to all of them) must look like.
//!
//! All scope merging goes through pure functions that build a fresh
//! collection per call. The loaded config is never mutated, so reusing the
//! same [`DesiredState`] across projects and testbeds cannot leak entries
//! between iterations.

pub mod error;

pub use error::{ConfigError, Result};

use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Scope key whose entries apply to every testbed
pub const ANY_SCOPE: &str = "any";

fn default_domain() -> String {
    "Default".to_string()
}

fn default_admin_project() -> String {
    "admin".to_string()
}

/// Connection settings for one testbed, loaded once at startup
#[derive(Debug, Clone, Deserialize)]
pub struct Testbed {
    /// Keystone v3 endpoint, e.g. `https://keystone.example.org:5000/v3`
    pub auth_url: String,
    pub username: String,
    pub password: String,
    #[serde(default = "default_domain")]
    pub user_domain: String,
    #[serde(default = "default_domain")]
    pub project_domain: String,
    /// Administrative project, always skipped by the checkers
    #[serde(default = "default_admin_project")]
    pub admin_project: String,
    #[serde(default)]
    pub region: Option<String>,
}

/// An image that must exist on every project in scope
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DesiredImage {
    pub name: String,
    /// Local file the image is uploaded from when missing
    pub path: String,
}

/// A network that must exist, matched on all three fields
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DesiredNetwork {
    pub name: String,
    pub shared: bool,
    pub external: bool,
}

/// Endpoints and keep-lists for the workload (zombie) check
#[derive(Debug, Clone, Deserialize)]
pub struct WorkloadConfig {
    /// Experiment-tracking service base URL
    pub tracking_url: String,
    /// NFVO (orchestrator) base URL
    pub nfvo_url: String,
    pub nfvo_username: String,
    pub nfvo_password: String,
    /// Server instance IDs never deleted, whatever the keep-set says
    #[serde(default)]
    pub keep_vms: Vec<String>,
    /// NSR IDs never deleted
    #[serde(default)]
    pub keep_nsrs: Vec<String>,
}

/// The declared desired state, keyed by testbed name or [`ANY_SCOPE`]
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DesiredState {
    #[serde(default)]
    pub images: BTreeMap<String, Vec<DesiredImage>>,
    #[serde(default)]
    pub security_groups: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub networks: BTreeMap<String, Vec<DesiredNetwork>>,
    #[serde(default)]
    pub ignore_floating_ips: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub ignore_projects: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub workloads: Option<WorkloadConfig>,
}

impl DesiredState {
    /// Images required on `testbed`: the `"any"` scope merged with the
    /// testbed scope, testbed entries winning on name collision.
    pub fn images_for(&self, testbed: &str) -> Vec<DesiredImage> {
        let mut by_name: BTreeMap<String, DesiredImage> = BTreeMap::new();
        for scope in [ANY_SCOPE, testbed] {
            if let Some(images) = self.images.get(scope) {
                for image in images {
                    by_name.insert(image.name.clone(), image.clone());
                }
            }
        }
        by_name.into_values().collect()
    }

    /// Security group names required on `testbed` (union of both scopes)
    pub fn security_groups_for(&self, testbed: &str) -> BTreeSet<String> {
        self.union_of(&self.security_groups, testbed)
    }

    /// Networks required on `testbed`, testbed entries winning on name
    pub fn networks_for(&self, testbed: &str) -> Vec<DesiredNetwork> {
        let mut by_name: BTreeMap<String, DesiredNetwork> = BTreeMap::new();
        for scope in [ANY_SCOPE, testbed] {
            if let Some(networks) = self.networks.get(scope) {
                for network in networks {
                    by_name.insert(network.name.clone(), network.clone());
                }
            }
        }
        by_name.into_values().collect()
    }

    /// Floating IP addresses that must never be released on `testbed`
    pub fn ignored_floating_ips_for(&self, testbed: &str) -> BTreeSet<String> {
        self.union_of(&self.ignore_floating_ips, testbed)
    }

    /// Project names the checkers must skip on `testbed`
    pub fn ignored_projects_for(&self, testbed: &str) -> BTreeSet<String> {
        self.union_of(&self.ignore_projects, testbed)
    }

    fn union_of(&self, map: &BTreeMap<String, Vec<String>>, testbed: &str) -> BTreeSet<String> {
        let mut merged = BTreeSet::new();
        for scope in [ANY_SCOPE, testbed] {
            if let Some(entries) = map.get(scope) {
                merged.extend(entries.iter().cloned());
            }
        }
        merged
    }

    /// Validate the loaded state against the known testbed names.
    ///
    /// Duplicate image names within one scope are an error (the merge would
    /// silently pick one of the two paths); scopes that match no testbed are
    /// only warned about, since credentials files evolve independently.
    pub fn validate(&self, testbed_names: &BTreeSet<String>) -> Result<()> {
        for (scope, images) in &self.images {
            let mut seen = BTreeSet::new();
            for image in images {
                if !seen.insert(image.name.as_str()) {
                    return Err(ConfigError::DuplicateImage {
                        scope: scope.clone(),
                        name: image.name.clone(),
                    });
                }
            }
        }

        let scoped_maps: [&BTreeMap<String, Vec<String>>; 3] = [
            &self.security_groups,
            &self.ignore_floating_ips,
            &self.ignore_projects,
        ];
        let image_scopes = self.images.keys();
        let network_scopes = self.networks.keys();
        let other_scopes = scoped_maps.iter().flat_map(|m| m.keys());
        for scope in image_scopes.chain(network_scopes).chain(other_scopes) {
            if scope != ANY_SCOPE && !testbed_names.contains(scope) {
                tracing::warn!("Desired-state scope '{}' matches no testbed", scope);
            }
        }

        Ok(())
    }
}

/// Load the credentials file (map of testbed name to connection settings)
pub fn load_credentials(path: &Path) -> Result<BTreeMap<String, Testbed>> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let testbeds: BTreeMap<String, Testbed> =
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
    if testbeds.is_empty() {
        return Err(ConfigError::NoTestbeds);
    }
    Ok(testbeds)
}

/// Load and validate the desired-state file
pub fn load_desired_state(
    path: &Path,
    testbed_names: &BTreeSet<String>,
) -> Result<DesiredState> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let state: DesiredState =
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
    state.validate(testbed_names)?;
    Ok(state)
}

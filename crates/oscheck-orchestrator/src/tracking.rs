//! Experiment-tracking service client

use crate::error::{OrchestratorError, Result};
use crate::types::ExperimentResource;
use async_trait::async_trait;
use serde::Deserialize;

/// Read-only view of the experiment-tracking service
#[async_trait]
pub trait ExperimentTracker: Send + Sync {
    /// Registered experimenter usernames (the valid project owners)
    async fn list_experimenters(&self) -> Result<Vec<String>>;

    /// Every resource declared across all running experiments
    async fn list_resources(&self) -> Result<Vec<ExperimentResource>>;
}

/// HTTP implementation against the tracking service's REST API
pub struct HttpExperimentTracker {
    base_url: String,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct Experimenter {
    username: String,
}

impl HttpExperimentTracker {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}/{}", self.base_url, path);
        let response = self.http.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OrchestratorError::ApiError(format!("{}: {}", status, body)));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl ExperimentTracker for HttpExperimentTracker {
    async fn list_experimenters(&self) -> Result<Vec<String>> {
        let experimenters: Vec<Experimenter> = self.get_json("api/experimenters").await?;
        Ok(experimenters.into_iter().map(|e| e.username).collect())
    }

    async fn list_resources(&self) -> Result<Vec<ExperimentResource>> {
        self.get_json("api/resources").await
    }
}

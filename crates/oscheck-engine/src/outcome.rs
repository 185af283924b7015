//! Outcome and report types
//!
//! Every checker returns the same tagged [`CheckOutcome`]; the workload pass
//! additionally records each deletion attempt on its own, since partial
//! success within a project is the expected case there. Outcomes are never
//! mutated after creation and the report is the sole input to the exit
//! decision.

use serde::Serialize;
use std::collections::BTreeMap;

/// Result of one checker run for one (testbed, project)
#[derive(Debug, Clone, Serialize)]
pub struct CheckOutcome {
    pub testbed: String,
    pub project: String,
    pub successful: bool,
    /// Affected resource identifiers (uploaded images, missing groups,
    /// released addresses, ...)
    pub details: Vec<String>,
    pub error: Option<String>,
}

impl CheckOutcome {
    pub fn success(
        testbed: impl Into<String>,
        project: impl Into<String>,
        details: Vec<String>,
    ) -> Self {
        Self {
            testbed: testbed.into(),
            project: project.into(),
            successful: true,
            details,
            error: None,
        }
    }

    pub fn failure(
        testbed: impl Into<String>,
        project: impl Into<String>,
        details: Vec<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            testbed: testbed.into(),
            project: project.into(),
            successful: false,
            details,
            error: Some(error.into()),
        }
    }
}

/// What kind of object a workload deletion targeted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletionKind {
    NetworkServiceRecord,
    NetworkServiceDescriptor,
    Server,
}

impl std::fmt::Display for DeletionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeletionKind::NetworkServiceRecord => write!(f, "NSR"),
            DeletionKind::NetworkServiceDescriptor => write!(f, "NSD"),
            DeletionKind::Server => write!(f, "server"),
        }
    }
}

/// One deletion attempt inside a workload pass
#[derive(Debug, Clone, Serialize)]
pub struct DeletionRecord {
    pub kind: DeletionKind,
    pub id: String,
    pub success: bool,
    pub error: Option<String>,
}

impl DeletionRecord {
    pub fn ok(kind: DeletionKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            success: true,
            error: None,
        }
    }

    pub fn failed(kind: DeletionKind, id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Result of the workload (zombie) pass for one project.
///
/// `error` is set when a step of the pass truncated the remaining steps; the
/// deletions recorded before that point are still valid partial results.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WorkloadOutcome {
    pub deletions: Vec<DeletionRecord>,
    pub error: Option<String>,
}

impl WorkloadOutcome {
    pub fn successful(&self) -> bool {
        self.error.is_none() && self.deletions.iter().all(|d| d.success)
    }
}

/// Everything one run produced, immutable once the driver returns it
#[derive(Debug, Clone, Default, Serialize)]
pub struct AggregateReport {
    /// Run-global lists, in processing order
    pub images: Vec<CheckOutcome>,
    pub security_groups: Vec<CheckOutcome>,
    pub networks: Vec<CheckOutcome>,
    /// testbed → project → outcome
    pub floating_ips: BTreeMap<String, BTreeMap<String, CheckOutcome>>,
    pub workloads: BTreeMap<String, BTreeMap<String, WorkloadOutcome>>,
    /// Failures that took out a whole testbed (client construction, tenant
    /// listing, unreachable control plane)
    pub testbed_errors: BTreeMap<String, Vec<String>>,
}

impl AggregateReport {
    /// True iff no recorded outcome failed and no testbed-level error occurred
    pub fn succeeded(&self) -> bool {
        self.testbed_errors.is_empty()
            && self
                .images
                .iter()
                .chain(&self.security_groups)
                .chain(&self.networks)
                .all(|o| o.successful)
            && self
                .floating_ips
                .values()
                .flat_map(|projects| projects.values())
                .all(|o| o.successful)
            && self
                .workloads
                .values()
                .flat_map(|projects| projects.values())
                .all(|o| o.successful())
    }

    pub fn record_testbed_error(&mut self, testbed: &str, error: impl Into<String>) {
        self.testbed_errors
            .entry(testbed.to_string())
            .or_default()
            .push(error.into());
    }

    pub fn record_floating_ips(&mut self, outcome: CheckOutcome) {
        self.floating_ips
            .entry(outcome.testbed.clone())
            .or_default()
            .insert(outcome.project.clone(), outcome);
    }

    pub fn record_workload(&mut self, testbed: &str, project: &str, outcome: WorkloadOutcome) {
        self.workloads
            .entry(testbed.to_string())
            .or_default()
            .insert(project.to_string(), outcome);
    }
}

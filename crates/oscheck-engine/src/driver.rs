//! Reconciliation driver
//!
//! Walks testbeds, then projects, then the enabled checkers, strictly in
//! sequence. Failures are contained at the smallest scope that keeps the run
//! meaningful: a project failure becomes a failed outcome, a testbed failure
//! becomes a testbed-level error entry, and in both cases the run continues.

use crate::checkers::{
    WorkloadContext, check_floating_ips, check_images, check_networks, check_security_groups,
    check_workloads,
};
use crate::outcome::AggregateReport;
use async_trait::async_trait;
use oscheck_cloud::{CloudClient, OpenStackClient, Project};
use oscheck_config::{DesiredState, Testbed, WorkloadConfig};
use oscheck_orchestrator::{
    ExperimentResource, ExperimentTracker, HttpExperimentTracker, NfvoClient, OpenBatonClient,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

/// Delay between destructive control-plane calls, for eventual consistency
const DELETION_PACING: Duration = Duration::from_secs(2);

/// The resource types a run can be asked to reconcile
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CheckKind {
    Images,
    SecurityGroups,
    Networks,
    FloatingIps,
    Workloads,
}

impl std::fmt::Display for CheckKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckKind::Images => write!(f, "images"),
            CheckKind::SecurityGroups => write!(f, "security-groups"),
            CheckKind::Networks => write!(f, "networks"),
            CheckKind::FloatingIps => write!(f, "floating-ips"),
            CheckKind::Workloads => write!(f, "workloads"),
        }
    }
}

/// What to run and how
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub checks: BTreeSet<CheckKind>,
    /// Compute and report all corrective actions without performing them
    pub dry_run: bool,
    /// Restrict the run to a single testbed
    pub testbed: Option<String>,
    /// Restrict the run to the projects of a single experimenter
    pub experimenter: Option<String>,
}

/// Builds one cloud client per testbed; swapped out for fakes in tests
#[async_trait]
pub trait ClientFactory: Send + Sync {
    async fn create(
        &self,
        name: &str,
        testbed: &Testbed,
    ) -> oscheck_cloud::Result<Arc<dyn CloudClient>>;
}

/// Default factory producing [`OpenStackClient`]s
pub struct OpenStackFactory;

#[async_trait]
impl ClientFactory for OpenStackFactory {
    async fn create(
        &self,
        name: &str,
        testbed: &Testbed,
    ) -> oscheck_cloud::Result<Arc<dyn CloudClient>> {
        let client = OpenStackClient::new(name, testbed.clone())?;
        Ok(Arc::new(client))
    }
}

/// Builds the control-plane and tracking clients for the workload check
pub trait OrchestratorFactory: Send + Sync {
    fn nfvo(&self, config: &WorkloadConfig) -> oscheck_orchestrator::Result<Arc<dyn NfvoClient>>;
    fn tracker(
        &self,
        config: &WorkloadConfig,
    ) -> oscheck_orchestrator::Result<Arc<dyn ExperimentTracker>>;
}

/// Default factory producing the HTTP clients
pub struct HttpOrchestratorFactory;

impl OrchestratorFactory for HttpOrchestratorFactory {
    fn nfvo(&self, config: &WorkloadConfig) -> oscheck_orchestrator::Result<Arc<dyn NfvoClient>> {
        let client = OpenBatonClient::new(
            &config.nfvo_url,
            &config.nfvo_username,
            &config.nfvo_password,
        )?;
        Ok(Arc::new(client))
    }

    fn tracker(
        &self,
        config: &WorkloadConfig,
    ) -> oscheck_orchestrator::Result<Arc<dyn ExperimentTracker>> {
        let client = HttpExperimentTracker::new(&config.tracking_url)?;
        Ok(Arc::new(client))
    }
}

/// State fetched once per testbed for the workload pass
struct WorkloadState<'b> {
    config: &'b WorkloadConfig,
    nfvo: Arc<dyn NfvoClient>,
    experimenters: BTreeSet<String>,
    resources: Vec<ExperimentResource>,
}

pub struct Driver<'a> {
    clients: &'a dyn ClientFactory,
    orchestrators: &'a dyn OrchestratorFactory,
    pacing: Duration,
}

impl<'a> Driver<'a> {
    pub fn new(clients: &'a dyn ClientFactory, orchestrators: &'a dyn OrchestratorFactory) -> Self {
        Self {
            clients,
            orchestrators,
            pacing: DELETION_PACING,
        }
    }

    #[cfg(test)]
    fn without_pacing(mut self) -> Self {
        self.pacing = Duration::ZERO;
        self
    }

    /// Run the enabled checks over all (selected) testbeds and projects.
    /// Never fails as a whole; every problem ends up inside the report.
    pub async fn run(
        &self,
        testbeds: &BTreeMap<String, Testbed>,
        desired: &DesiredState,
        options: &RunOptions,
    ) -> AggregateReport {
        let mut report = AggregateReport::default();

        for (name, testbed) in testbeds {
            if options.testbed.as_deref().is_some_and(|t| t != name) {
                continue;
            }
            tracing::info!("Checking testbed '{}'", name);

            let client = match self.clients.create(name, testbed).await {
                Ok(client) => client,
                Err(e) => {
                    tracing::warn!("Skipping testbed '{}': {}", name, e);
                    report.record_testbed_error(name, format!("client construction failed: {e}"));
                    continue;
                }
            };

            self.run_testbed(name, testbed, client.as_ref(), desired, options, &mut report)
                .await;
        }

        report
    }

    async fn run_testbed(
        &self,
        name: &str,
        testbed: &Testbed,
        client: &dyn CloudClient,
        desired: &DesiredState,
        options: &RunOptions,
        report: &mut AggregateReport,
    ) {
        let projects = match client.list_tenants().await {
            Ok(projects) => projects,
            Err(e) => {
                tracing::warn!("Cannot list tenants of '{}': {}", name, e);
                report.record_testbed_error(name, format!("tenant listing failed: {e}"));
                return;
            }
        };

        let ignored_projects = desired.ignored_projects_for(name);
        let workload = if options.checks.contains(&CheckKind::Workloads) {
            self.prepare_workloads(name, desired, report).await
        } else {
            None
        };

        for project in &projects {
            if project.name == testbed.admin_project {
                tracing::debug!("Skipping administrative project '{}'", project.name);
                continue;
            }
            if ignored_projects.contains(&project.name) {
                tracing::info!("Ignoring project '{}' on '{}'", project.name, name);
                continue;
            }
            if options
                .experimenter
                .as_deref()
                .is_some_and(|e| e != project.name)
            {
                continue;
            }
            tracing::info!("Checking project '{}' ({})", project.name, project.id);

            self.run_project(name, client, desired, options, workload.as_ref(), project, report)
                .await;
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_project(
        &self,
        name: &str,
        client: &dyn CloudClient,
        desired: &DesiredState,
        options: &RunOptions,
        workload: Option<&WorkloadState<'_>>,
        project: &Project,
        report: &mut AggregateReport,
    ) {
        if options.checks.contains(&CheckKind::Images) {
            let images = desired.images_for(name);
            if images.is_empty() {
                tracing::debug!("No desired images for '{}'", name);
            } else {
                report
                    .images
                    .push(check_images(client, project, &images, options.dry_run).await);
            }
        }

        if options.checks.contains(&CheckKind::SecurityGroups) {
            let required = desired.security_groups_for(name);
            if required.is_empty() {
                tracing::debug!("No desired security groups for '{}'", name);
            } else {
                report
                    .security_groups
                    .push(check_security_groups(client, project, &required).await);
            }
        }

        if options.checks.contains(&CheckKind::Networks) {
            let networks = desired.networks_for(name);
            if networks.is_empty() {
                tracing::debug!("No desired networks for '{}'", name);
            } else {
                report
                    .networks
                    .push(check_networks(client, project, &networks).await);
            }
        }

        if options.checks.contains(&CheckKind::FloatingIps) {
            // Derived fresh per project; the config itself is never mutated.
            let ignored = desired.ignored_floating_ips_for(name);
            let outcome = check_floating_ips(client, project, &ignored, options.dry_run).await;
            report.record_floating_ips(outcome);
        }

        if let Some(state) = workload {
            if !state.experimenters.contains(&project.name) {
                tracing::debug!(
                    "Project '{}' is not experimenter-owned, skipping workload pass",
                    project.name
                );
                return;
            }
            let resources: Vec<ExperimentResource> = state
                .resources
                .iter()
                .filter(|r| r.username == project.name)
                .cloned()
                .collect();
            let ctx = WorkloadContext {
                cloud: client,
                nfvo: state.nfvo.as_ref(),
                config: state.config,
                dry_run: options.dry_run,
                pacing: self.pacing,
            };
            if let Some(outcome) = check_workloads(&ctx, project, &resources).await {
                report.record_workload(name, &project.name, outcome);
            }
        }
    }

    /// Connect to the control plane and tracking service and pull the global
    /// keep-set inputs, once per testbed. Any failure here records a
    /// testbed-level error and disables the workload pass for this testbed.
    async fn prepare_workloads<'b>(
        &self,
        name: &str,
        desired: &'b DesiredState,
        report: &mut AggregateReport,
    ) -> Option<WorkloadState<'b>> {
        let Some(config) = &desired.workloads else {
            report.record_testbed_error(name, "workload check enabled without workload config");
            return None;
        };

        let nfvo = match self.orchestrators.nfvo(config) {
            Ok(nfvo) => nfvo,
            Err(e) => {
                report.record_testbed_error(name, format!("NFVO client construction failed: {e}"));
                return None;
            }
        };
        let tracker = match self.orchestrators.tracker(config) {
            Ok(tracker) => tracker,
            Err(e) => {
                report.record_testbed_error(
                    name,
                    format!("tracking client construction failed: {e}"),
                );
                return None;
            }
        };

        let experimenters = match tracker.list_experimenters().await {
            Ok(experimenters) => experimenters.into_iter().collect(),
            Err(e) => {
                tracing::warn!("Experiment tracker unreachable for '{}': {}", name, e);
                report.record_testbed_error(name, format!("experimenter listing failed: {e}"));
                return None;
            }
        };
        let resources = match tracker.list_resources().await {
            Ok(resources) => resources,
            Err(e) => {
                report.record_testbed_error(name, format!("resource listing failed: {e}"));
                return None;
            }
        };

        Some(WorkloadState {
            config,
            nfvo,
            experimenters,
            resources,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockCloud, MockNfvo, MockTracker, fip, image, nsr, project};
    use oscheck_cloud::CloudError;

    /// Factory serving pre-built mock clients by testbed name
    #[derive(Default)]
    struct MockFactory {
        clouds: BTreeMap<String, Arc<MockCloud>>,
        broken: BTreeSet<String>,
    }

    #[async_trait]
    impl ClientFactory for MockFactory {
        async fn create(
            &self,
            name: &str,
            _testbed: &Testbed,
        ) -> oscheck_cloud::Result<Arc<dyn CloudClient>> {
            if self.broken.contains(name) {
                return Err(CloudError::AuthenticationFailed("bad credentials".into()));
            }
            let cloud = self
                .clouds
                .get(name)
                .cloned()
                .ok_or_else(|| CloudError::ApiError(format!("no mock for {name}")))?;
            Ok(cloud)
        }
    }

    #[derive(Default)]
    struct MockOrchestrators {
        nfvo: Arc<MockNfvo>,
        tracker: Arc<MockTracker>,
    }

    impl OrchestratorFactory for MockOrchestrators {
        fn nfvo(
            &self,
            _config: &WorkloadConfig,
        ) -> oscheck_orchestrator::Result<Arc<dyn NfvoClient>> {
            Ok(self.nfvo.clone())
        }

        fn tracker(
            &self,
            _config: &WorkloadConfig,
        ) -> oscheck_orchestrator::Result<Arc<dyn ExperimentTracker>> {
            Ok(self.tracker.clone())
        }
    }

    fn testbed() -> Testbed {
        serde_json::from_str(
            r#"{
                "auth_url": "https://keystone.example:5000/v3",
                "username": "checker",
                "password": "secret"
            }"#,
        )
        .unwrap()
    }

    fn testbeds(names: &[&str]) -> BTreeMap<String, Testbed> {
        names.iter().map(|n| (n.to_string(), testbed())).collect()
    }

    fn desired(json: &str) -> DesiredState {
        serde_json::from_str(json).unwrap()
    }

    fn options(checks: &[CheckKind]) -> RunOptions {
        RunOptions {
            checks: checks.iter().copied().collect(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn broken_testbed_is_isolated_from_the_rest() {
        let mut berlin = MockCloud::named("berlin");
        berlin.tenants = vec![project("p1", "alice")];
        berlin.images.insert("p1".into(), vec![image("cirros")]);

        let factory = MockFactory {
            clouds: BTreeMap::from([("berlin".to_string(), Arc::new(berlin))]),
            broken: BTreeSet::from(["paris".to_string()]),
        };
        let orchestrators = MockOrchestrators::default();
        let driver = Driver::new(&factory, &orchestrators).without_pacing();

        let state = desired(
            r#"{"images": {"any": [{"name": "cirros", "path": "/imgs/cirros.img"}]}}"#,
        );
        let report = driver
            .run(
                &testbeds(&["berlin", "paris"]),
                &state,
                &options(&[CheckKind::Images]),
            )
            .await;

        // paris contributes exactly one testbed error and zero outcomes;
        // berlin was still processed and succeeded.
        assert_eq!(report.testbed_errors.len(), 1);
        assert!(report.testbed_errors.contains_key("paris"));
        assert_eq!(report.images.len(), 1);
        assert!(report.images[0].successful);
        assert!(!report.succeeded());
    }

    #[tokio::test]
    async fn ignored_and_admin_projects_are_skipped() {
        let mut berlin = MockCloud::named("berlin");
        berlin.tenants = vec![
            project("p0", "admin"),
            project("p1", "alice"),
            project("p2", "bob"),
        ];

        let factory = MockFactory {
            clouds: BTreeMap::from([("berlin".to_string(), Arc::new(berlin))]),
            ..Default::default()
        };
        let orchestrators = MockOrchestrators::default();
        let driver = Driver::new(&factory, &orchestrators).without_pacing();

        let state = desired(
            r#"{
                "images": {"any": [{"name": "cirros", "path": "/imgs/cirros.img"}]},
                "ignore_projects": {"berlin": ["bob"]}
            }"#,
        );
        let report = driver
            .run(&testbeds(&["berlin"]), &state, &options(&[CheckKind::Images]))
            .await;

        assert_eq!(report.images.len(), 1);
        assert_eq!(report.images[0].project, "alice");
    }

    #[tokio::test]
    async fn outcomes_accumulate_across_testbeds() {
        let mut berlin = MockCloud::named("berlin");
        berlin.tenants = vec![project("p1", "alice")];
        let mut paris = MockCloud::named("paris");
        paris.tenants = vec![project("p2", "bob")];

        let factory = MockFactory {
            clouds: BTreeMap::from([
                ("berlin".to_string(), Arc::new(berlin)),
                ("paris".to_string(), Arc::new(paris)),
            ]),
            ..Default::default()
        };
        let orchestrators = MockOrchestrators::default();
        let driver = Driver::new(&factory, &orchestrators).without_pacing();

        let state = desired(r#"{"security_groups": {"any": ["default"]}}"#);
        let report = driver
            .run(
                &testbeds(&["berlin", "paris"]),
                &state,
                &options(&[CheckKind::SecurityGroups]),
            )
            .await;

        // One global list over both testbeds, in processing order.
        assert_eq!(report.security_groups.len(), 2);
        assert_eq!(report.security_groups[0].testbed, "berlin");
        assert_eq!(report.security_groups[1].testbed, "paris");
    }

    #[tokio::test]
    async fn floating_ip_outcomes_are_testbed_indexed() {
        let mut berlin = MockCloud::named("berlin");
        berlin.tenants = vec![project("p1", "alice")];
        berlin
            .floating_ips
            .insert("p1".into(), vec![fip("f1", "10.0.0.2", None)]);

        let factory = MockFactory {
            clouds: BTreeMap::from([("berlin".to_string(), Arc::new(berlin))]),
            ..Default::default()
        };
        let orchestrators = MockOrchestrators::default();
        let driver = Driver::new(&factory, &orchestrators).without_pacing();

        let report = driver
            .run(
                &testbeds(&["berlin"]),
                &desired("{}"),
                &options(&[CheckKind::FloatingIps]),
            )
            .await;

        let outcome = &report.floating_ips["berlin"]["alice"];
        assert!(outcome.successful);
        assert_eq!(outcome.details, vec!["10.0.0.2"]);
    }

    #[tokio::test]
    async fn testbed_filter_restricts_the_run() {
        let mut berlin = MockCloud::named("berlin");
        berlin.tenants = vec![project("p1", "alice")];

        let factory = MockFactory {
            clouds: BTreeMap::from([("berlin".to_string(), Arc::new(berlin))]),
            // paris would fail if it were visited
            broken: BTreeSet::from(["paris".to_string()]),
        };
        let orchestrators = MockOrchestrators::default();
        let driver = Driver::new(&factory, &orchestrators).without_pacing();

        let mut opts = options(&[CheckKind::SecurityGroups]);
        opts.testbed = Some("berlin".into());
        let state = desired(r#"{"security_groups": {"any": ["default"]}}"#);
        let report = driver
            .run(&testbeds(&["berlin", "paris"]), &state, &opts)
            .await;

        assert!(report.testbed_errors.is_empty());
        assert_eq!(report.security_groups.len(), 1);
    }

    #[tokio::test]
    async fn experimenter_filter_restricts_projects() {
        let mut berlin = MockCloud::named("berlin");
        berlin.tenants = vec![project("p1", "alice"), project("p2", "bob")];

        let factory = MockFactory {
            clouds: BTreeMap::from([("berlin".to_string(), Arc::new(berlin))]),
            ..Default::default()
        };
        let orchestrators = MockOrchestrators::default();
        let driver = Driver::new(&factory, &orchestrators).without_pacing();

        let mut opts = options(&[CheckKind::SecurityGroups]);
        opts.experimenter = Some("bob".into());
        let state = desired(r#"{"security_groups": {"any": ["default"]}}"#);
        let report = driver.run(&testbeds(&["berlin"]), &state, &opts).await;

        assert_eq!(report.security_groups.len(), 1);
        assert_eq!(report.security_groups[0].project, "bob");
    }

    #[tokio::test]
    async fn workload_pass_only_for_experimenter_owned_projects() {
        let mut berlin = MockCloud::named("berlin");
        berlin.tenants = vec![project("p1", "alice"), project("p2", "intruder")];
        berlin.servers.insert(
            "p2".into(),
            vec![oscheck_cloud::Server {
                id: "vm-x".into(),
                name: "x".into(),
            }],
        );

        let mut nfvo = MockNfvo::default();
        nfvo.projects.insert("alice".into(), "ob-alice".into());
        nfvo.projects.insert("intruder".into(), "ob-intruder".into());
        let tracker = MockTracker {
            experimenters: vec!["alice".into()],
            resources: vec![],
        };

        let factory = MockFactory {
            clouds: BTreeMap::from([("berlin".to_string(), Arc::new(berlin))]),
            ..Default::default()
        };
        let orchestrators = MockOrchestrators {
            nfvo: Arc::new(nfvo),
            tracker: Arc::new(tracker),
        };
        let driver = Driver::new(&factory, &orchestrators).without_pacing();

        let state = desired(
            r#"{"workloads": {
                "tracking_url": "http://tracker",
                "nfvo_url": "http://nfvo",
                "nfvo_username": "admin",
                "nfvo_password": "pw"
            }}"#,
        );
        let report = driver
            .run(
                &testbeds(&["berlin"]),
                &state,
                &options(&[CheckKind::Workloads]),
            )
            .await;

        // Only alice got a workload pass; the intruder project was skipped,
        // so its server survived.
        assert!(report.workloads["berlin"].contains_key("alice"));
        assert!(!report.workloads["berlin"].contains_key("intruder"));
        assert!(
            orchestrators
                .nfvo
                .deleted_nsrs
                .lock()
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn failed_workload_pass_does_not_block_later_projects() {
        let mut berlin = MockCloud::named("berlin");
        berlin.tenants = vec![project("p1", "alice"), project("p2", "bob")];
        // alice's server listing fails after her orchestration cleanup ran
        berlin.unauthorized = BTreeSet::from(["p1".to_string()]);
        berlin.servers.insert(
            "p2".into(),
            vec![oscheck_cloud::Server {
                id: "vm-z".into(),
                name: "z".into(),
            }],
        );
        let berlin = Arc::new(berlin);

        let mut nfvo = MockNfvo::default();
        nfvo.projects.insert("alice".into(), "ob-alice".into());
        nfvo.projects.insert("bob".into(), "ob-bob".into());
        nfvo.nsrs
            .insert("ob-alice".into(), vec![nsr("nsr-stale", "nsd-1", &["vm-a"])]);
        let tracker = MockTracker {
            experimenters: vec!["alice".into(), "bob".into()],
            resources: vec![],
        };

        let factory = MockFactory {
            clouds: BTreeMap::from([("berlin".to_string(), berlin.clone())]),
            ..Default::default()
        };
        let orchestrators = MockOrchestrators {
            nfvo: Arc::new(nfvo),
            tracker: Arc::new(tracker),
        };
        let driver = Driver::new(&factory, &orchestrators).without_pacing();

        let state = desired(
            r#"{"workloads": {
                "tracking_url": "http://tracker",
                "nfvo_url": "http://nfvo",
                "nfvo_username": "admin",
                "nfvo_password": "pw"
            }}"#,
        );
        let report = driver
            .run(
                &testbeds(&["berlin"]),
                &state,
                &options(&[CheckKind::Workloads]),
            )
            .await;

        // alice's pass was truncated mid-way, yet the deletions it made
        // before failing are in the report.
        let alice = &report.workloads["berlin"]["alice"];
        assert!(alice.error.is_some());
        assert_eq!(alice.deletions.len(), 2);
        assert!(alice.deletions.iter().all(|d| d.success));

        // bob was still processed and his zombie server removed.
        let bob = &report.workloads["berlin"]["bob"];
        assert!(bob.successful());
        assert_eq!(
            *berlin.deleted_servers.lock().unwrap(),
            vec![("p2".to_string(), "vm-z".to_string())]
        );
        assert!(!report.succeeded());
    }

    #[tokio::test]
    async fn workload_check_without_config_is_a_testbed_error() {
        let mut berlin = MockCloud::named("berlin");
        berlin.tenants = vec![project("p1", "alice")];

        let factory = MockFactory {
            clouds: BTreeMap::from([("berlin".to_string(), Arc::new(berlin))]),
            ..Default::default()
        };
        let orchestrators = MockOrchestrators::default();
        let driver = Driver::new(&factory, &orchestrators).without_pacing();

        let report = driver
            .run(
                &testbeds(&["berlin"]),
                &desired("{}"),
                &options(&[CheckKind::Workloads]),
            )
            .await;

        assert!(!report.succeeded());
        assert!(report.testbed_errors.contains_key("berlin"));
    }
}

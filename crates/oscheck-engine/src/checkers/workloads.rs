//! Workload checker: garbage-collects orchestration state and zombie VMs.
//!
//! A project pass runs through fixed stages, never backwards:
//! discover registered resources, build the keep-sets, list the NSRs the
//! control plane still tracks, remove stale NSRs, remove descriptors no kept
//! NSR references, expand kept NSRs into the server IDs they still use, and
//! finally delete every server the project runs that nothing accounts for.
//! An error in a stage truncates the rest of the pass for that project only;
//! deletions recorded before the truncation stay in the outcome.

use crate::outcome::{DeletionKind, DeletionRecord, WorkloadOutcome};
use oscheck_cloud::{CloudClient, Project};
use oscheck_config::WorkloadConfig;
use oscheck_orchestrator::{ExperimentResource, NetworkServiceRecord, NfvoClient, ResourceUse};
use std::collections::BTreeSet;
use std::time::Duration;

pub struct WorkloadContext<'a> {
    pub cloud: &'a dyn CloudClient,
    pub nfvo: &'a dyn NfvoClient,
    pub config: &'a WorkloadConfig,
    pub dry_run: bool,
    /// Delay between destructive calls, giving the control plane time to
    /// settle. Not a retry mechanism.
    pub pacing: Duration,
}

impl WorkloadContext<'_> {
    async fn pace(&self) {
        if !self.dry_run && !self.pacing.is_zero() {
            tokio::time::sleep(self.pacing).await;
        }
    }
}

/// Run the workload pass for one project.
///
/// `resources` must already be filtered to the registrations of this
/// project's owner. Returns `None` when the control plane does not know the
/// project (skip, not a failure).
pub async fn check_workloads(
    ctx: &WorkloadContext<'_>,
    project: &Project,
    resources: &[ExperimentResource],
) -> Option<WorkloadOutcome> {
    let testbed = ctx.cloud.testbed_name();
    let mut outcome = WorkloadOutcome::default();

    // CLASSIFY_KEEP_SET
    let mut keep_nsrs: BTreeSet<String> = ctx.config.keep_nsrs.iter().cloned().collect();
    let mut keep_vms: BTreeSet<String> = ctx.config.keep_vms.iter().cloned().collect();
    for resource in resources {
        match resource.classify() {
            Ok(ResourceUse::KeepNsr(id)) => {
                keep_nsrs.insert(id);
            }
            Ok(ResourceUse::KeepVm { id, testbed: pinned }) => {
                // A monitoring VM pinned to another testbed does not protect
                // anything here.
                if pinned.as_deref().is_none_or(|t| t == testbed) {
                    keep_vms.insert(id);
                }
            }
            Ok(ResourceUse::Unrelated) => {}
            Err(e) => {
                tracing::warn!(
                    "Skipping malformed resource registration of '{}': {}",
                    resource.username,
                    e
                );
            }
        }
    }

    let nfvo_project = match ctx.nfvo.find_project(&project.name).await {
        Ok(Some(id)) => id,
        Ok(None) => {
            tracing::debug!(
                "Project '{}' unknown on the control plane, skipping workload pass",
                project.name
            );
            return None;
        }
        Err(e) => {
            outcome.error = Some(format!("control-plane project lookup failed: {e}"));
            return Some(outcome);
        }
    };

    // LIST_NSRS
    let records = match ctx.nfvo.list_network_service_records(&nfvo_project).await {
        Ok(records) => records,
        Err(e) => {
            outcome.error = Some(format!("NSR listing failed: {e}"));
            return Some(outcome);
        }
    };
    let (to_keep, to_remove): (Vec<&NetworkServiceRecord>, Vec<&NetworkServiceRecord>) =
        records.iter().partition(|nsr| keep_nsrs.contains(&nsr.id));
    let kept_descriptors: BTreeSet<&str> = to_keep
        .iter()
        .map(|nsr| nsr.descriptor_reference.as_str())
        .collect();

    // REMOVE_STALE_NSRS
    let mut removed_descriptors: BTreeSet<&str> = BTreeSet::new();
    let mut surviving_descriptors: BTreeSet<&str> = BTreeSet::new();
    for nsr in &to_remove {
        let descriptor = nsr.descriptor_reference.as_str();
        if ctx.dry_run {
            tracing::info!(
                "[dry-run] Would delete NSR {} of project '{}'",
                nsr.id,
                project.name
            );
            outcome
                .deletions
                .push(DeletionRecord::ok(DeletionKind::NetworkServiceRecord, &nsr.id));
            removed_descriptors.insert(descriptor);
            continue;
        }
        match ctx
            .nfvo
            .delete_network_service_record(&nfvo_project, &nsr.id)
            .await
        {
            Ok(()) => {
                tracing::info!("Deleted NSR {} of project '{}'", nsr.id, project.name);
                outcome.deletions.push(DeletionRecord::ok(
                    DeletionKind::NetworkServiceRecord,
                    &nsr.id,
                ));
                removed_descriptors.insert(descriptor);
                ctx.pace().await;
            }
            Err(e) => {
                tracing::warn!("Deleting NSR {} failed: {}", nsr.id, e);
                outcome.deletions.push(DeletionRecord::failed(
                    DeletionKind::NetworkServiceRecord,
                    &nsr.id,
                    e.to_string(),
                ));
                // The record is still live, so its descriptor must survive.
                surviving_descriptors.insert(descriptor);
            }
        }
    }

    // REMOVE_ORPHAN_NSDS: only descriptors no live NSR references anymore,
    // neither a kept record nor one whose deletion just failed.
    for descriptor in &removed_descriptors {
        if kept_descriptors.contains(descriptor) || surviving_descriptors.contains(descriptor) {
            continue;
        }
        if ctx.dry_run {
            tracing::info!("[dry-run] Would delete NSD {}", descriptor);
            outcome.deletions.push(DeletionRecord::ok(
                DeletionKind::NetworkServiceDescriptor,
                *descriptor,
            ));
            continue;
        }
        match ctx
            .nfvo
            .delete_network_service_descriptor(&nfvo_project, descriptor)
            .await
        {
            Ok(()) => {
                tracing::info!("Deleted NSD {}", descriptor);
                outcome.deletions.push(DeletionRecord::ok(
                    DeletionKind::NetworkServiceDescriptor,
                    *descriptor,
                ));
                ctx.pace().await;
            }
            Err(e) => {
                tracing::warn!("Deleting NSD {} failed: {}", descriptor, e);
                outcome.deletions.push(DeletionRecord::failed(
                    DeletionKind::NetworkServiceDescriptor,
                    *descriptor,
                    e.to_string(),
                ));
            }
        }
    }

    // EXPAND_VM_KEEPSET
    for nsr in &to_keep {
        keep_vms.extend(nsr.instance_ids().map(str::to_string));
    }

    // REMOVE_STALE_VMS
    let servers = match ctx.cloud.list_servers(&project.id).await {
        Ok(servers) => servers,
        Err(e) => {
            outcome.error = Some(format!("server listing failed: {e}"));
            return Some(outcome);
        }
    };
    for server in servers {
        if keep_vms.contains(&server.id) {
            continue;
        }
        if ctx.dry_run {
            tracing::info!(
                "[dry-run] Would delete server {} ({}) of project '{}'",
                server.id,
                server.name,
                project.name
            );
            outcome
                .deletions
                .push(DeletionRecord::ok(DeletionKind::Server, &server.id));
            continue;
        }
        match ctx.cloud.delete_server(&project.id, &server.id).await {
            Ok(()) => {
                tracing::info!(
                    "Deleted zombie server {} ({}) of project '{}'",
                    server.id,
                    server.name,
                    project.name
                );
                outcome
                    .deletions
                    .push(DeletionRecord::ok(DeletionKind::Server, &server.id));
                ctx.pace().await;
            }
            Err(e) => {
                tracing::warn!("Deleting server {} failed: {}", server.id, e);
                outcome.deletions.push(DeletionRecord::failed(
                    DeletionKind::Server,
                    &server.id,
                    e.to_string(),
                ));
            }
        }
    }

    Some(outcome)
}

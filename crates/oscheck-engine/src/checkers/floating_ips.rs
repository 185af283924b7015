//! Floating-IP checker: release every allocation that is neither on the
//! ignore lists nor bound to a fixed IP. A bound floating IP is in active
//! use and is always preserved, whatever the ignore lists say.

use crate::outcome::CheckOutcome;
use oscheck_cloud::{CloudClient, Project};
use std::collections::BTreeSet;

pub async fn check_floating_ips(
    client: &dyn CloudClient,
    project: &Project,
    ignored_addresses: &BTreeSet<String>,
    dry_run: bool,
) -> CheckOutcome {
    let testbed = client.testbed_name();

    let allocated = match client.list_floating_ips(&project.id).await {
        Ok(fips) => fips,
        Err(e) => {
            tracing::warn!(
                "Cannot list floating IPs of project '{}' on '{}': {}",
                project.name,
                testbed,
                e
            );
            return CheckOutcome::failure(testbed, &project.name, vec![], e.to_string());
        }
    };

    let (keep, candidates): (Vec<_>, Vec<_>) = allocated
        .iter()
        .partition(|fip| fip.in_use() || ignored_addresses.contains(&fip.address));

    if candidates.is_empty() {
        tracing::debug!(
            "No releasable floating IPs in project '{}' on '{}'",
            project.name,
            testbed
        );
        return CheckOutcome::success(testbed, &project.name, vec![]);
    }

    if dry_run {
        let addresses: Vec<String> = candidates.iter().map(|f| f.address.clone()).collect();
        tracing::info!(
            "[dry-run] Would release floating IPs of project '{}': {}",
            project.name,
            addresses.join(", ")
        );
        return CheckOutcome::success(testbed, &project.name, addresses);
    }

    let keep_ids: Vec<String> = keep.iter().map(|f| f.id.clone()).collect();
    match client.release_floating_ips(&project.id, &keep_ids).await {
        Ok(released) => {
            tracing::info!(
                "Released floating IPs of project '{}' on '{}': {}",
                project.name,
                testbed,
                released.join(", ")
            );
            CheckOutcome::success(testbed, &project.name, released)
        }
        Err(e) => {
            tracing::warn!(
                "Releasing floating IPs of project '{}' on '{}' failed: {}",
                project.name,
                testbed,
                e
            );
            CheckOutcome::failure(testbed, &project.name, vec![], e.to_string())
        }
    }
}

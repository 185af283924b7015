//! Security-group checker: detection only.
//!
//! Creating a group would need a tenant-scoped owner identity this tool does
//! not have, so a missing group is reported as a failure and left for the
//! testbed operator.

use crate::outcome::CheckOutcome;
use oscheck_cloud::{CloudClient, Project};
use std::collections::BTreeSet;

pub async fn check_security_groups(
    client: &dyn CloudClient,
    project: &Project,
    required: &BTreeSet<String>,
) -> CheckOutcome {
    let testbed = client.testbed_name();

    let observed: BTreeSet<String> = match client.list_security_groups(&project.id).await {
        Ok(groups) => groups.into_iter().map(|g| g.name).collect(),
        Err(e) => {
            tracing::warn!(
                "Cannot list security groups of project '{}' on '{}': {}",
                project.name,
                testbed,
                e
            );
            return CheckOutcome::failure(testbed, &project.name, vec![], e.to_string());
        }
    };

    let missing: Vec<String> = required.difference(&observed).cloned().collect();
    if missing.is_empty() {
        return CheckOutcome::success(testbed, &project.name, vec![]);
    }

    tracing::warn!(
        "Project '{}' on '{}' is missing security groups: {}",
        project.name,
        testbed,
        missing.join(", ")
    );
    let error = format!("missing security groups: {}", missing.join(", "));
    CheckOutcome::failure(testbed, &project.name, missing, error)
}

//! Network checker: detection only.
//!
//! A desired network matches an observed one on name, `shared` and
//! `external` together. Creation is out of scope: the desired-state schema
//! cannot express the required topology (subnets, routers, allocation
//! pools), so an unmatched network is reported, never created.

use crate::outcome::CheckOutcome;
use oscheck_cloud::{CloudClient, Project};
use oscheck_config::DesiredNetwork;

pub async fn check_networks(
    client: &dyn CloudClient,
    project: &Project,
    desired: &[DesiredNetwork],
) -> CheckOutcome {
    let testbed = client.testbed_name();

    let observed = match client.list_networks(&project.id).await {
        Ok(networks) => networks,
        Err(e) => {
            tracing::warn!(
                "Cannot list networks of project '{}' on '{}': {}",
                project.name,
                testbed,
                e
            );
            return CheckOutcome::failure(testbed, &project.name, vec![], e.to_string());
        }
    };

    let unmatched: Vec<String> = desired
        .iter()
        .filter(|want| {
            !observed.iter().any(|have| {
                have.name == want.name
                    && have.shared == want.shared
                    && have.external == want.external
            })
        })
        .map(|want| want.name.clone())
        .collect();

    if unmatched.is_empty() {
        return CheckOutcome::success(testbed, &project.name, vec![]);
    }

    tracing::warn!(
        "Project '{}' on '{}' has no match for networks: {}",
        project.name,
        testbed,
        unmatched.join(", ")
    );
    let error = format!("networks not found: {}", unmatched.join(", "));
    CheckOutcome::failure(testbed, &project.name, unmatched, error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockCloud, project};
    use oscheck_cloud::Network;

    fn wanted(name: &str, shared: bool, external: bool) -> DesiredNetwork {
        DesiredNetwork {
            name: name.into(),
            shared,
            external,
        }
    }

    fn observed(name: &str, shared: bool, external: bool) -> Network {
        Network {
            id: format!("net-{name}"),
            name: name.into(),
            shared,
            external,
        }
    }

    #[tokio::test]
    async fn exact_triple_match_succeeds() {
        let mut cloud = MockCloud::named("berlin");
        cloud
            .networks
            .insert("p1".into(), vec![observed("net1", true, false)]);

        let outcome = check_networks(
            &cloud,
            &project("p1", "alice"),
            &[wanted("net1", true, false)],
        )
        .await;
        assert!(outcome.successful);
    }

    #[tokio::test]
    async fn attribute_mismatch_is_not_found() {
        let mut cloud = MockCloud::named("berlin");
        // Same name, but shared flag differs.
        cloud
            .networks
            .insert("p1".into(), vec![observed("net1", false, false)]);

        let outcome = check_networks(
            &cloud,
            &project("p1", "alice"),
            &[wanted("net1", true, false)],
        )
        .await;

        assert!(!outcome.successful);
        assert_eq!(outcome.details, vec!["net1"]);
    }

    #[tokio::test]
    async fn absent_network_is_not_found() {
        let cloud = MockCloud::named("berlin");
        let outcome = check_networks(
            &cloud,
            &project("p1", "alice"),
            &[wanted("net1", true, false)],
        )
        .await;
        assert!(!outcome.successful);
    }
}

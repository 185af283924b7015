//! Image checker: every desired image must exist in the project; missing
//! ones are uploaded from their declared source file.

use crate::outcome::CheckOutcome;
use oscheck_cloud::{CloudClient, Project};
use oscheck_config::DesiredImage;
use std::collections::BTreeSet;
use std::path::Path;

pub async fn check_images(
    client: &dyn CloudClient,
    project: &Project,
    desired: &[DesiredImage],
    dry_run: bool,
) -> CheckOutcome {
    let testbed = client.testbed_name();

    let observed: BTreeSet<String> = match client.list_images(&project.id).await {
        Ok(images) => images.into_iter().map(|i| i.name).collect(),
        Err(e) => {
            tracing::warn!(
                "Cannot list images of project '{}' on '{}': {}",
                project.name,
                testbed,
                e
            );
            return CheckOutcome::failure(testbed, &project.name, vec![], e.to_string());
        }
    };

    let missing: Vec<&DesiredImage> = desired
        .iter()
        .filter(|image| !observed.contains(&image.name))
        .collect();

    let mut details = Vec::new();
    for image in missing {
        if dry_run {
            tracing::info!(
                "[dry-run] Would upload image '{}' from {} to project '{}'",
                image.name,
                image.path,
                project.name
            );
            details.push(format!("would upload {} ({})", image.name, image.path));
            continue;
        }
        match client
            .upload_image(&project.id, &image.name, Path::new(&image.path))
            .await
        {
            Ok(_) => {
                tracing::info!(
                    "Uploaded image '{}' from {} to project '{}'",
                    image.name,
                    image.path,
                    project.name
                );
                details.push(format!("uploaded {} ({})", image.name, image.path));
            }
            Err(e) => {
                tracing::warn!(
                    "Upload of image '{}' to project '{}' failed: {}",
                    image.name,
                    project.name,
                    e
                );
                return CheckOutcome::failure(testbed, &project.name, details, e.to_string());
            }
        }
    }

    CheckOutcome::success(testbed, &project.name, details)
}

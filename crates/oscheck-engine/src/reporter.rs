//! Report rendering
//!
//! Pure functions from the aggregate report to a human-readable summary;
//! the pass/fail signal itself lives on [`AggregateReport::succeeded`].

use crate::outcome::{AggregateReport, CheckOutcome};
use std::fmt::Write;

fn push_outcome(out: &mut String, outcome: &CheckOutcome) {
    let status = if outcome.successful { "ok" } else { "FAILED" };
    let _ = write!(
        out,
        "  [{}] {}/{}",
        status, outcome.testbed, outcome.project
    );
    if !outcome.details.is_empty() {
        let _ = write!(out, ": {}", outcome.details.join(", "));
    }
    if let Some(error) = &outcome.error {
        let _ = write!(out, " ({error})");
    }
    out.push('\n');
}

fn push_section(out: &mut String, title: &str, outcomes: &[CheckOutcome]) {
    if outcomes.is_empty() {
        return;
    }
    let _ = writeln!(out, "{title}:");
    for outcome in outcomes {
        push_outcome(out, outcome);
    }
}

/// Render the whole report, grouped by resource type and, for the richer
/// outcomes, by testbed and project.
pub fn render_report(report: &AggregateReport) -> String {
    let mut out = String::new();

    push_section(&mut out, "Images", &report.images);
    push_section(&mut out, "Security groups", &report.security_groups);
    push_section(&mut out, "Networks", &report.networks);

    if !report.floating_ips.is_empty() {
        out.push_str("Floating IPs:\n");
        for projects in report.floating_ips.values() {
            for outcome in projects.values() {
                push_outcome(&mut out, outcome);
            }
        }
    }

    if !report.workloads.is_empty() {
        out.push_str("Workloads:\n");
        for (testbed, projects) in &report.workloads {
            for (project, outcome) in projects {
                let status = if outcome.successful() { "ok" } else { "FAILED" };
                let _ = writeln!(&mut out, "  [{status}] {testbed}/{project}");
                for deletion in &outcome.deletions {
                    let mark = if deletion.success { "deleted" } else { "failed" };
                    match &deletion.error {
                        Some(error) => {
                            let _ = writeln!(
                                &mut out,
                                "    {} {} {}: {}",
                                mark, deletion.kind, deletion.id, error
                            );
                        }
                        None => {
                            let _ =
                                writeln!(&mut out, "    {} {} {}", mark, deletion.kind, deletion.id);
                        }
                    }
                }
                if let Some(error) = &outcome.error {
                    let _ = writeln!(&mut out, "    pass truncated: {error}");
                }
            }
        }
    }

    if !report.testbed_errors.is_empty() {
        out.push_str("Testbed errors:\n");
        for (testbed, errors) in &report.testbed_errors {
            for error in errors {
                let _ = writeln!(&mut out, "  {testbed}: {error}");
            }
        }
    }

    if out.is_empty() {
        out.push_str("Nothing checked.\n");
    }
    out
}

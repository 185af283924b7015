//! Reconciliation engine
//!
//! Compares live testbed state against the declared desired state and
//! corrects drift where that is safe. One checker per resource type, a
//! sequential driver that isolates failures at the smallest useful scope
//! (resource, project, testbed), and a reporter that turns the aggregated
//! outcomes into a summary and a single pass/fail signal.
//!
//! Dry-run and apply mode share every decision; the dry-run flag only gates
//! the corrective calls themselves.

pub mod checkers;
pub mod driver;
pub mod outcome;
pub mod reporter;

#[cfg(test)]
pub(crate) mod testing;

pub use driver::{
    CheckKind, ClientFactory, Driver, HttpOrchestratorFactory, OpenStackFactory,
    OrchestratorFactory, RunOptions,
};
pub use outcome::{
    AggregateReport, CheckOutcome, DeletionKind, DeletionRecord, WorkloadOutcome,
};
pub use reporter::render_report;

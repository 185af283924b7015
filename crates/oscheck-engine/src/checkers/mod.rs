//! One checker per resource type.
//!
//! Each checker computes its delta first and acts second, so dry-run and
//! apply mode always reach the same decisions. A checker never propagates
//! client errors: everything ends up in the outcome it returns.

pub mod floating_ips;
pub mod images;
pub mod networks;
pub mod security_groups;
pub mod workloads;

pub use floating_ips::check_floating_ips;
pub use images::check_images;
pub use networks::check_networks;
pub use security_groups::check_security_groups;
pub use workloads::{WorkloadContext, check_workloads};

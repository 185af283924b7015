//! Resource DTOs returned by a testbed client

use serde::{Deserialize, Serialize};

/// A tenant project on a testbed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
}

/// A Glance image, reduced to what the image checker compares on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Image {
    pub id: String,
    pub name: String,
}

/// A Neutron security group (existence check only, no rule comparison)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityGroup {
    pub id: String,
    pub name: String,
}

/// A Neutron network with the attributes the desired state can express
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Network {
    pub id: String,
    pub name: String,
    pub shared: bool,
    /// Neutron's `router:external`
    pub external: bool,
}

/// A Neutron floating IP
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FloatingIp {
    pub id: String,
    pub address: String,
    /// Non-null while the floating IP is bound to a port. A bound IP is in
    /// active use and must never be released.
    pub fixed_ip: Option<String>,
}

impl FloatingIp {
    pub fn in_use(&self) -> bool {
        self.fixed_ip.is_some()
    }
}

/// A Nova server instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    pub id: String,
    pub name: String,
}

//! OpenStack client abstraction for oscheck
//!
//! The reconciliation engine only ever talks to a testbed through the
//! [`CloudClient`] trait; the concrete [`OpenStackClient`] speaks Keystone v3,
//! Glance, Neutron and Nova over HTTP. Keeping the trait narrow is what makes
//! the engine testable against in-memory fakes.

pub mod client;
pub mod error;
pub mod openstack;
pub mod types;

pub use client::CloudClient;
pub use error::{CloudError, Result};
pub use openstack::OpenStackClient;
pub use types::{FloatingIp, Image, Network, Project, SecurityGroup, Server};

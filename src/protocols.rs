//! The protocol layers of the stack and shared utilities for implementing
//! them.

pub mod arp;
pub mod ethernet;
pub mod ipv4;
pub mod udp;
pub mod utility;

pub use arp::Arp;
pub use ethernet::Ethernet;
pub use ipv4::Ipv4;
pub use udp::Udp;

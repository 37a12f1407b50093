//! Sideband information that travels with a message up the receive path.

use crate::{network::Mac, protocols::ipv4::Ipv4Address};

/// Addressing information a lower layer learned while parsing its header and
/// that an upper layer may need. Ethernet records the source MAC for ARP and
/// IP; IP records the source address for the transport checksum and for
/// delivery to the application.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Control {
    /// The link-level address the frame came from.
    pub remote_mac: Option<Mac>,
    /// The network-level address the datagram came from.
    pub remote_ip: Option<Ipv4Address>,
}

impl Control {
    pub fn new() -> Self {
        Self::default()
    }

    /// Control carrying a source link address.
    pub fn with_remote_mac(mac: Mac) -> Self {
        Self {
            remote_mac: Some(mac),
            remote_ip: None,
        }
    }

    /// Returns a copy with the source network address filled in.
    pub fn and_remote_ip(mut self, ip: Ipv4Address) -> Self {
        self.remote_ip = Some(ip);
        self
    }
}

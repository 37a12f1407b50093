//! The per-instance context tying the layers together.

use crate::{
    network::{Driver, Mac},
    protocol::{ProtocolMap, UnreachableSink},
    protocols::{
        arp::{self, Arp},
        ethernet::Ethernet,
        ipv4::{self, Ipv4, Ipv4Address},
        udp::{self, Listener, OpenError, Udp},
        utility::Endpoint,
    },
};
use rand::{rngs::SmallRng, Rng, SeedableRng};
use std::{cell::Cell, rc::Rc};

/// The addresses identifying the local interface, set once at initialization
/// and read thereafter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interface {
    /// The link-level address of the interface.
    pub mac: Mac,
    /// The network-level address of the interface.
    pub ip: Ipv4Address,
}

/// One instance of the protocol stack over a single network interface.
///
/// The stack bundles the dispatch registry, each layer with its tables, the
/// local identity, the fragment identification counter, and the collaborator
/// seams. Nothing lives in global state, so multiple independent instances
/// can coexist; the whole instance runs single threaded and every receive or
/// send step runs to completion.
pub struct Stack {
    interface: Interface,
    driver: Rc<dyn Driver>,
    unreachable: Rc<dyn UnreachableSink>,
    protocols: ProtocolMap,
    ethernet: Ethernet,
    arp: Rc<Arp>,
    ipv4: Rc<Ipv4>,
    udp: Rc<Udp>,
    next_identification: Cell<u16>,
}

impl Stack {
    /// Brings up a stack over `driver` with the given identity, registering
    /// the built-in protocols and announcing the local address to the link.
    pub fn new(
        interface: Interface,
        driver: Rc<dyn Driver>,
        unreachable: Rc<dyn UnreachableSink>,
    ) -> Self {
        let arp = Rc::new(Arp::new());
        let ipv4 = Rc::new(Ipv4::new());
        let udp = Rc::new(Udp::new());

        let protocols = ProtocolMap::new();
        protocols.register(arp::ETHERTYPE, arp.clone());
        protocols.register(ipv4::ETHERTYPE, ipv4.clone());
        protocols.register(udp::PROTOCOL_NUMBER, udp.clone());

        let mut rng = SmallRng::from_entropy();
        let stack = Self {
            interface,
            driver,
            unreachable,
            protocols,
            ethernet: Ethernet::new(),
            arp,
            ipv4,
            udp,
            next_identification: Cell::new(rng.gen()),
        };
        stack.arp.announce(&stack);
        stack
    }

    /// Receives at most one frame from the driver and drives it through the
    /// layers to completion. Returns whether a frame was available.
    pub fn poll(&self) -> bool {
        match self.driver.receive() {
            Some(frame) => {
                if let Err(e) = self.ethernet.frame_in(frame, self) {
                    tracing::debug!("Dropped an incoming frame: {e}");
                }
                true
            }
            None => false,
        }
    }

    /// Binds `listener` to a local UDP port.
    pub fn open(&self, port: u16, listener: Rc<dyn Listener>) -> Result<(), OpenError> {
        self.udp.open(port, listener)
    }

    /// Releases a local UDP port.
    pub fn close(&self, port: u16) {
        self.udp.close(port);
    }

    /// Sends `data` over UDP from `source_port` to `remote`.
    pub fn send(&self, data: &[u8], source_port: u16, remote: Endpoint) {
        self.udp.send(data, source_port, remote, self);
    }

    /// The local link-level address.
    pub fn mac(&self) -> Mac {
        self.interface.mac
    }

    /// The local network-level address.
    pub fn ip(&self) -> Ipv4Address {
        self.interface.ip
    }

    /// The protocol dispatch registry.
    pub fn protocols(&self) -> &ProtocolMap {
        &self.protocols
    }

    /// The frame driver under the stack.
    pub fn driver(&self) -> &dyn Driver {
        self.driver.as_ref()
    }

    /// Where undeliverable datagrams are reported.
    pub fn unreachable_sink(&self) -> &dyn UnreachableSink {
        self.unreachable.as_ref()
    }

    pub fn ethernet(&self) -> &Ethernet {
        &self.ethernet
    }

    pub fn arp(&self) -> &Arp {
        &self.arp
    }

    pub fn ipv4(&self) -> &Ipv4 {
        &self.ipv4
    }

    pub fn udp(&self) -> &Udp {
        &self.udp
    }

    /// Draws the identification value for the next outbound datagram. The
    /// counter is seeded randomly per instance and increments once per
    /// datagram; all fragments of one datagram share the drawn value.
    pub(crate) fn next_identification(&self) -> u16 {
        let id = self.next_identification.get();
        self.next_identification.set(id.wrapping_add(1));
        id
    }
}

#[cfg(test)]
pub(crate) fn testing_stack() -> Stack {
    use crate::{network::Loopback, protocol::Discard};

    let interface = Interface {
        mac: Mac::new([2, 0, 0, 0, 0, 1]),
        ip: Ipv4Address::new([10, 0, 0, 1]),
    };
    Stack::new(interface, Rc::new(Loopback::new()), Rc::new(Discard))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocols::arp::arp_parsing::{ArpPacket, Operation};
    use crate::protocols::ethernet::ethernet_parsing::EthernetHeader;

    #[test]
    fn announces_on_startup() {
        let stack = testing_stack();
        let frame = stack.driver().receive().expect("no announcement sent");
        let header = EthernetHeader::from_bytes(frame.iter()).unwrap();
        assert_eq!(header.destination, Mac::BROADCAST);
        assert_eq!(header.ethertype, arp::ETHERTYPE);
        let packet = ArpPacket::from_bytes(frame.iter().skip(EthernetHeader::SIZE)).unwrap();
        assert_eq!(packet.oper, Operation::Request);
        assert_eq!(packet.sender_ip, stack.ip());
        assert_eq!(packet.target_ip, stack.ip());
    }

    #[test]
    fn identification_increments_per_datagram() {
        let stack = testing_stack();
        let first = stack.next_identification();
        let second = stack.next_identification();
        assert_eq!(second, first.wrapping_add(1));
    }
}

//! An implementation of the [User Datagram
//! Protocol](https://www.ietf.org/rfc/rfc768.txt).

use crate::{
    protocol::{DemuxError, Protocol, ProtocolId, Unreachable},
    protocols::utility::Endpoint,
    ttl_map::TtlMap,
    Control, Message, Stack,
};
use std::{cell::RefCell, rc::Rc};

pub mod udp_parsing;
use udp_parsing::{build_udp_header, UdpHeader};

/// The IP protocol number under which UDP registers with the network layer.
pub const PROTOCOL_NUMBER: ProtocolId = 17;

/// The size of a UDP header in bytes.
const HEADER_OCTETS: usize = 8;

/// The size of the IPv4 header a received datagram arrived under, re-exposed
/// when a port-unreachable report needs the offending datagram.
const IPV4_HEADER_OCTETS: usize = 20;

/// An application's end of an open port.
pub trait Listener {
    /// Called with the payload of each datagram delivered to the port and
    /// the address and port it was sent from.
    fn receive(&self, payload: Message, remote: Endpoint);
}

impl<F: Fn(Message, Endpoint)> Listener for F {
    fn receive(&self, payload: Message, remote: Endpoint) {
        self(payload, remote)
    }
}

/// An implementation of the User Datagram Protocol.
pub struct Udp {
    /// Maps open local ports to the handler bound to each.
    ports: RefCell<TtlMap<u16, Rc<dyn Listener>>>,
}

impl Udp {
    /// Creates a new instance of the protocol.
    pub fn new() -> Self {
        Self {
            ports: RefCell::new(TtlMap::new(None)),
        }
    }

    /// Binds `listener` to a local port. A port can hold only one binding at
    /// a time; binding an occupied port fails.
    pub fn open(&self, port: u16, listener: Rc<dyn Listener>) -> Result<(), OpenError> {
        let mut ports = self.ports.borrow_mut();
        if ports.contains(&port) {
            return Err(OpenError::PortInUse(port));
        }
        ports.set(port, listener);
        Ok(())
    }

    /// Removes the binding for a local port, if any.
    pub fn close(&self, port: u16) {
        self.ports.borrow_mut().remove(&port);
    }

    /// Prepends a UDP header with a freshly computed pseudo-header checksum
    /// and hands the datagram to the network layer.
    pub fn datagram_out(
        &self,
        mut message: Message,
        source_port: u16,
        remote: Endpoint,
        stack: &Stack,
    ) {
        let header = build_udp_header(
            stack.ip(),
            source_port,
            remote.address,
            remote.port,
            message.iter(),
            message.len(),
        );
        let header = match header {
            Ok(header) => header,
            Err(e) => {
                tracing::error!("{}", e);
                return;
            }
        };
        message.header(header);
        stack
            .ipv4()
            .datagram_out(message, remote.address, PROTOCOL_NUMBER as u8, stack);
    }

    /// Convenience send: copies `data` into a fresh message and sends it
    /// from `source_port` to `remote`.
    pub fn send(&self, data: &[u8], source_port: u16, remote: Endpoint, stack: &Stack) {
        self.datagram_out(Message::new(data), source_port, remote, stack);
    }
}

impl Protocol for Udp {
    fn demux(&self, mut message: Message, control: Control, stack: &Stack) -> Result<(), DemuxError> {
        let remote_ip = control.remote_ip.ok_or(DemuxError::MissingControl)?;

        if message.len() < HEADER_OCTETS {
            tracing::trace!("Dropping a datagram shorter than the UDP header");
            return Err(DemuxError::Header);
        }
        let header = match UdpHeader::from_bytes_ipv4(
            message.iter(),
            message.len(),
            remote_ip,
            stack.ip(),
        ) {
            Ok(header) => header,
            Err(e) => {
                tracing::debug!("{}", e);
                Err(DemuxError::Header)?
            }
        };

        let listener = self.ports.borrow().get(&header.destination).cloned();
        match listener {
            Some(listener) => {
                message.remove_front(HEADER_OCTETS);
                listener.receive(message, Endpoint::new(remote_ip, header.source));
                Ok(())
            }
            None => {
                // Grow the message back over the IPv4 header it arrived
                // under so the report carries the offending datagram.
                message.expand_front(IPV4_HEADER_OCTETS);
                stack
                    .unreachable_sink()
                    .unreachable(message, remote_ip, Unreachable::Port);
                Ok(())
            }
        }
    }
}

impl Default for Udp {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
pub enum OpenError {
    #[error("The port is already bound: {0}")]
    PortInUse(u16),
}

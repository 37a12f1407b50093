//! An implementation of the [Internet Protocol version
//! 4](https://datatracker.ietf.org/doc/html/rfc791) over a single local
//! interface.
//!
//! Datagrams are fragmented on the send path when they exceed the link MTU.
//! There is no inbound reassembly: received fragments are validated and
//! dispatched to the upper layer independently, and reassembly is left to
//! whoever extends this stack.

use crate::{
    network::MTU,
    protocol::{DemuxError, Protocol, ProtocolId, Unreachable},
    Control, Message, Stack,
};

pub mod ipv4_parsing;
use ipv4_parsing::{Ipv4Header, Ipv4HeaderBuilder};

mod ipv4_address;
pub use ipv4_address::Ipv4Address;

/// The ethertype under which IPv4 registers with the link layer.
pub const ETHERTYPE: ProtocolId = 0x0800;

/// The size of an IPv4 header without options, in bytes.
const HEADER_OCTETS: usize = 20;

/// The most payload bytes a single fragment can carry. Kept a multiple of 8
/// so fragment offsets stay expressible in 8-byte blocks.
const MAX_FRAGMENT_PAYLOAD: usize = MTU as usize - HEADER_OCTETS;

/// An implementation of the Internet Protocol.
pub struct Ipv4;

impl Ipv4 {
    pub fn new() -> Self {
        Self
    }

    /// Prepends an IPv4 header describing one fragment and hands the result
    /// to address resolution. `fragment_offset` is in units of 8 bytes;
    /// `more_fragments` is set on every fragment but the last.
    pub fn fragment_out(
        &self,
        mut message: Message,
        destination: Ipv4Address,
        protocol: u8,
        identification: u16,
        fragment_offset: u16,
        more_fragments: bool,
        stack: &Stack,
    ) {
        let header = Ipv4HeaderBuilder::new(
            stack.ip(),
            destination,
            protocol,
            message.len() as u16,
        )
        .identification(identification)
        .fragment_offset(fragment_offset)
        .more_fragments(more_fragments)
        .build();
        let header = match header {
            Ok(header) => header,
            Err(e) => {
                tracing::error!("{}", e);
                return;
            }
        };
        message.header(header);
        stack.arp().resolve_and_send(message, destination, stack);
    }

    /// Sends a datagram, splitting it into fragments when it exceeds the
    /// link MTU. All fragments of one call share a single identification
    /// value drawn from the stack's counter.
    pub fn datagram_out(
        &self,
        mut message: Message,
        destination: Ipv4Address,
        protocol: u8,
        stack: &Stack,
    ) {
        let identification = stack.next_identification();
        let mut offset_blocks = 0u16;
        while message.len() > MAX_FRAGMENT_PAYLOAD {
            let fragment = message.cut(MAX_FRAGMENT_PAYLOAD);
            self.fragment_out(
                fragment,
                destination,
                protocol,
                identification,
                offset_blocks,
                true,
                stack,
            );
            offset_blocks += (MAX_FRAGMENT_PAYLOAD / 8) as u16;
        }
        self.fragment_out(
            message,
            destination,
            protocol,
            identification,
            offset_blocks,
            false,
            stack,
        );
    }
}

impl Protocol for Ipv4 {
    fn demux(&self, mut message: Message, _control: Control, stack: &Stack) -> Result<(), DemuxError> {
        if message.len() < HEADER_OCTETS {
            tracing::trace!("Dropping a datagram shorter than the IPv4 header");
            return Err(DemuxError::Header);
        }

        // Kept untouched so an unreachable report can carry the offending
        // datagram.
        let original = message.clone();

        let header = match Ipv4Header::from_bytes(message.iter()) {
            Ok(header) => header,
            Err(e) => {
                tracing::debug!("{}", e);
                Err(DemuxError::Header)?
            }
        };
        if header.total_length as usize > message.len() {
            tracing::debug!("Dropping a datagram truncated below its declared length");
            return Err(DemuxError::Header);
        }
        if (header.total_length as usize) < header.ihl as usize * 4 {
            tracing::debug!("Dropping a datagram whose declared length cannot hold its header");
            return Err(DemuxError::Header);
        }
        if header.destination != stack.ip() {
            tracing::trace!("Dropping a datagram addressed to {}", header.destination);
            return Err(DemuxError::Header);
        }

        // Anything past the declared total length is link-layer padding.
        message.trim_back(message.len() - header.total_length as usize);
        message.remove_front(header.ihl as usize * 4);

        let control = Control::new().and_remote_ip(header.source);
        match stack
            .protocols()
            .demux(header.protocol as ProtocolId, message, control, stack)
        {
            Err(DemuxError::MissingHandler(_)) => {
                stack
                    .unreachable_sink()
                    .unreachable(original, header.source, Unreachable::Protocol);
                Ok(())
            }
            other => other,
        }
    }
}

impl Default for Ipv4 {
    fn default() -> Self {
        Self::new()
    }
}

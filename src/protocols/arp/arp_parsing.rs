//! Building ARP packets and decomposing them into IPs and MACs.
//!
//! Packets follow IPv4-over-Ethernet ARP:
//! <https://en.wikipedia.org/wiki/Address_Resolution_Protocol#Packet_structure>

use crate::{network::Mac, protocols::ipv4::Ipv4Address, protocols::utility::BytesExt};
use thiserror::Error as ThisError;

/// The network link protocol type for Ethernet.
const HTYPE: u16 = 1;
/// The internetwork protocol type for IPv4.
const PTYPE: u16 = 0x0800;
/// Ethernet address length in octets.
const HLEN: u8 = 6;
/// IPv4 address length in octets.
const PLEN: u8 = 4;

/// An IPv4-over-Ethernet ARP packet. Incoming packets whose fixed fields do
/// not match this link and network pair are rejected at parse time.
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub struct ArpPacket {
    /// The operation that the sender is performing.
    pub oper: Operation,
    /// The MAC address of the sender.
    pub sender_mac: Mac,
    /// The IPv4 address of the sender.
    pub sender_ip: Ipv4Address,
    /// The MAC address of the target.
    pub target_mac: Mac,
    /// The IPv4 address of the target.
    pub target_ip: Ipv4Address,
}

impl ArpPacket {
    /// The size of an ARP packet in bytes (28).
    pub const SIZE: usize = 28;

    /// Initializes an ARP request. The target MAC is what the exchange is
    /// meant to discover, so it goes out zeroed.
    pub fn new_request(sender_mac: Mac, sender_ip: Ipv4Address, target_ip: Ipv4Address) -> Self {
        Self {
            oper: Operation::Request,
            sender_mac,
            sender_ip,
            target_mac: Mac::default(),
            target_ip,
        }
    }

    /// Initializes an ARP reply.
    pub fn new_reply(
        sender_mac: Mac,
        sender_ip: Ipv4Address,
        target_mac: Mac,
        target_ip: Ipv4Address,
    ) -> Self {
        Self {
            oper: Operation::Reply,
            sender_mac,
            sender_ip,
            target_mac,
            target_ip,
        }
    }

    /// Creates a serialized ARP packet from the configuration provided.
    pub fn build(&self) -> Vec<u8> {
        let mut out: Vec<u8> = Vec::with_capacity(Self::SIZE);
        out.extend_from_slice(&HTYPE.to_be_bytes());
        out.extend_from_slice(&PTYPE.to_be_bytes());
        out.push(HLEN);
        out.push(PLEN);
        out.extend_from_slice(&(self.oper as u16).to_be_bytes());
        out.extend_from_slice(&self.sender_mac.to_bytes());
        out.extend_from_slice(&self.sender_ip.to_bytes());
        out.extend_from_slice(&self.target_mac.to_bytes());
        out.extend_from_slice(&self.target_ip.to_bytes());
        out
    }

    /// Parses an ARP packet from a byte iterator.
    pub fn from_bytes(mut bytes: impl Iterator<Item = u8>) -> Result<Self, ParseError> {
        const HTS: ParseError = ParseError::HeaderTooShort;

        let htype = bytes.next_u16_be().ok_or(HTS)?;
        let ptype = bytes.next_u16_be().ok_or(HTS)?;
        let hlen = bytes.next_u8().ok_or(HTS)?;
        let plen = bytes.next_u8().ok_or(HTS)?;
        if htype != HTYPE || ptype != PTYPE || hlen != HLEN || plen != PLEN {
            return Err(ParseError::UnsupportedAddressTypes);
        }

        let oper = bytes.next_u16_be().ok_or(HTS)?;
        let oper: Operation = match oper {
            1 => Operation::Request,
            2 => Operation::Reply,
            _ => return Err(ParseError::InvalidOperation),
        };

        let sender_mac = bytes.next_mac().ok_or(HTS)?;
        let sender_ip = bytes.next_ipv4addr().ok_or(HTS)?;
        let target_mac = bytes.next_mac().ok_or(HTS)?;
        let target_ip = bytes.next_ipv4addr().ok_or(HTS)?;
        Ok(Self {
            oper,
            sender_mac,
            sender_ip,
            target_mac,
            target_ip,
        })
    }
}

#[derive(Debug, ThisError, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    #[error("The ARP packet is incomplete")]
    HeaderTooShort,
    #[error("The packet is not IPv4-over-Ethernet ARP")]
    UnsupportedAddressTypes,
    #[error("Invalid operation: should be 1 for request, 2 for reply")]
    InvalidOperation,
}

/// Represents a request or reply operation of an ARP packet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    Request = 1,
    Reply = 2,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_unbuild() -> anyhow::Result<()> {
        let old = ArpPacket::new_reply(
            Mac::new([0, 0, 0, 0x05, 0x39, 0x01]),
            Ipv4Address::new([127, 0, 0, 1]),
            Mac::new([0x40, 0, 0, 0, 0, 0]),
            Ipv4Address::new([10, 11, 12, 13]),
        );

        let bytes = old.build();
        assert_eq!(bytes.len(), ArpPacket::SIZE);
        let new = ArpPacket::from_bytes(bytes.iter().cloned())?;
        assert_eq!(old, new);
        Ok(())
    }

    #[test]
    fn too_short() {
        let short_packet: Vec<u8> = vec![0, 1, 8, 0, 6, 4, 0, 1];
        ArpPacket::from_bytes(short_packet.iter().cloned())
            .expect_err("packet was too short; should not have been built");
    }

    #[test]
    fn rejects_foreign_address_types() {
        let mut bytes = ArpPacket::new_request(
            Mac::new([1, 2, 3, 4, 5, 6]),
            Ipv4Address::new([10, 0, 0, 1]),
            Ipv4Address::new([10, 0, 0, 2]),
        )
        .build();
        bytes[1] = 6; // hardware type: IEEE 802
        assert_eq!(
            ArpPacket::from_bytes(bytes.iter().cloned()),
            Err(ParseError::UnsupportedAddressTypes)
        );
    }

    #[test]
    fn rejects_unknown_operation() {
        let mut bytes = ArpPacket::new_request(
            Mac::new([1, 2, 3, 4, 5, 6]),
            Ipv4Address::new([10, 0, 0, 1]),
            Ipv4Address::new([10, 0, 0, 2]),
        )
        .build();
        bytes[7] = 9;
        assert_eq!(
            ArpPacket::from_bytes(bytes.iter().cloned()),
            Err(ParseError::InvalidOperation)
        );
    }
}

use crate::{
    network::Mac,
    protocol::ProtocolId,
    protocols::utility::BytesExt,
};
use thiserror::Error as ThisError;

/// An Ethernet II frame header: destination and source hardware addresses
/// followed by the ethertype of the payload, all in network byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EthernetHeader {
    /// The hardware address the frame is for.
    pub destination: Mac,
    /// The hardware address the frame came from.
    pub source: Mac,
    /// Identifies the upper-layer protocol carried in the payload.
    pub ethertype: ProtocolId,
}

impl EthernetHeader {
    /// The size of the header in bytes.
    pub const SIZE: usize = 14;

    /// Parses a header from a byte iterator.
    pub fn from_bytes(mut bytes: impl Iterator<Item = u8>) -> Result<Self, ParseError> {
        const HTS: ParseError = ParseError::HeaderTooShort;

        let destination = bytes.next_mac().ok_or(HTS)?;
        let source = bytes.next_mac().ok_or(HTS)?;
        let ethertype = bytes.next_u16_be().ok_or(HTS)?;
        Ok(Self {
            destination,
            source,
            ethertype,
        })
    }

    /// Creates a serialized header from the configuration provided.
    pub fn build(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::SIZE);
        out.extend_from_slice(&self.destination.to_bytes());
        out.extend_from_slice(&self.source.to_bytes());
        out.extend_from_slice(&self.ethertype.to_be_bytes());
        out
    }
}

#[derive(Debug, ThisError, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    #[error("The Ethernet header is incomplete")]
    HeaderTooShort,
}

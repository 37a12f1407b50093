//! The link-level framing layer.
//!
//! Ethernet sits directly on the frame driver. On receive it strips the link
//! header and dispatches by ethertype; on send it pads short payloads to the
//! link minimum, prepends the header, and hands the frame to the driver.

use crate::{
    network::Mac,
    protocol::{DemuxError, ProtocolId},
    Control, Message, Stack,
};

pub mod ethernet_parsing;
use ethernet_parsing::EthernetHeader;

/// The smallest payload a frame may carry. Shorter payloads are zero padded
/// up to this size before the header is added; the receiver relies on an
/// inner length field to take the padding back off.
pub const MIN_PAYLOAD: usize = 46;

/// The link-level framing layer for the single attached interface.
pub struct Ethernet;

impl Ethernet {
    pub fn new() -> Self {
        Self
    }

    /// Handles one frame from the driver: strips the link header and hands
    /// the payload to whichever protocol claims the ethertype. Truncated
    /// frames and unclaimed ethertypes are dropped.
    pub fn frame_in(&self, mut message: Message, stack: &Stack) -> Result<(), DemuxError> {
        if message.len() < EthernetHeader::SIZE {
            tracing::trace!("Dropping a frame shorter than the link header");
            return Err(DemuxError::Header);
        }
        let header = EthernetHeader::from_bytes(message.iter()).map_err(|_| DemuxError::Header)?;
        message.remove_front(EthernetHeader::SIZE);
        match stack.protocols().demux(
            header.ethertype,
            message,
            Control::with_remote_mac(header.source),
            stack,
        ) {
            Err(DemuxError::MissingHandler(ethertype)) => {
                tracing::trace!("Dropping a frame with unclaimed ethertype {ethertype:#06x}");
                Ok(())
            }
            other => other,
        }
    }

    /// Frames `message` for `destination` and hands it to the driver. The
    /// driver's outcome is not inspected.
    pub fn frame_out(
        &self,
        mut message: Message,
        destination: Mac,
        ethertype: ProtocolId,
        stack: &Stack,
    ) {
        if message.len() < MIN_PAYLOAD {
            message.pad(MIN_PAYLOAD - message.len());
        }
        let header = EthernetHeader {
            destination,
            source: stack.mac(),
            ethertype,
        };
        message.header(header.build());
        stack.driver().send(message);
    }
}

impl Default for Ethernet {
    fn default() -> Self {
        Self::new()
    }
}

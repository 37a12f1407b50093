//! The [`Protocol`] trait, the dispatch registry, and supporting types.

use crate::{protocols::ipv4::Ipv4Address, Control, Message, Stack};
use rustc_hash::FxHashMap;
use std::{cell::RefCell, rc::Rc};

/// A numeric protocol identifier as carried on the wire: an ethertype when
/// dispatching out of Ethernet, an IP protocol number when dispatching out of
/// IP. The two value ranges do not overlap, so one registry serves both
/// layers.
pub type ProtocolId = u16;

/// A member of the protocol stack that can receive demultiplexed packets.
///
/// When demultiplexing a message, a protocol will typically parse and strip
/// its header, record addressing information from the header in the
/// [`Control`], and hand the remainder to the next layer up through the
/// stack's registry.
pub trait Protocol {
    /// Handles one packet addressed to this protocol. `control` carries the
    /// addressing the lower layers learned on the way up.
    fn demux(&self, message: Message, control: Control, stack: &Stack) -> Result<(), DemuxError>;
}

/// Maps protocol identifiers to the handler for each, with at most one
/// handler per identifier. The last registration for an identifier wins.
#[derive(Default)]
pub struct ProtocolMap {
    handlers: RefCell<FxHashMap<ProtocolId, Rc<dyn Protocol>>>,
}

impl ProtocolMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `id`, replacing any previous registration.
    pub fn register(&self, id: ProtocolId, handler: Rc<dyn Protocol>) {
        self.handlers.borrow_mut().insert(id, handler);
    }

    /// Delivers `message` to the handler registered for `id`.
    ///
    /// A missing handler is reported as [`DemuxError::MissingHandler`],
    /// distinct from handler failures, so the caller can decide whether to
    /// signal unreachability.
    pub fn demux(
        &self,
        id: ProtocolId,
        message: Message,
        control: Control,
        stack: &Stack,
    ) -> Result<(), DemuxError> {
        let handler = self.handlers.borrow().get(&id).cloned();
        match handler {
            Some(handler) => handler.demux(message, control, stack),
            None => Err(DemuxError::MissingHandler(id)),
        }
    }
}

#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
pub enum DemuxError {
    #[error("No handler is registered for protocol {0:#06x}")]
    MissingHandler(ProtocolId),
    #[error("Data expected through the control was missing")]
    MissingControl,
    #[error("Failed to parse a header during demux")]
    Header,
}

/// Why a datagram could not be delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Unreachable {
    /// No upper-layer protocol is registered for the datagram's protocol
    /// number.
    Protocol,
    /// No handler is bound to the datagram's destination port.
    Port,
}

/// The collaborator that turns undeliverable datagrams into diagnostic
/// replies, typically ICMP destination unreachable messages. Wire
/// construction happens on the other side of this seam.
pub trait UnreachableSink {
    /// Reports that `original` could not be delivered. `remote` is the
    /// address the diagnostic should go back to, taken from the offending
    /// datagram's source field.
    fn unreachable(&self, original: Message, remote: Ipv4Address, reason: Unreachable);
}

/// A sink that drops every report on the floor, for embedders that do not
/// speak ICMP.
pub struct Discard;

impl UnreachableSink for Discard {
    fn unreachable(&self, _original: Message, remote: Ipv4Address, reason: Unreachable) {
        tracing::debug!("Discarding {reason:?} unreachable report for {remote}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Recorder(RefCell<Vec<ProtocolId>>);

    impl Protocol for Recorder {
        fn demux(
            &self,
            _message: Message,
            _control: Control,
            _stack: &Stack,
        ) -> Result<(), DemuxError> {
            self.0.borrow_mut().push(0);
            Ok(())
        }
    }

    #[test]
    fn missing_handler_is_a_sentinel() {
        let registry = ProtocolMap::new();
        let stack = crate::stack::testing_stack();
        let result = registry.demux(0x0800, Message::new(b""), Control::new(), &stack);
        assert_eq!(result, Err(DemuxError::MissingHandler(0x0800)));
    }

    #[test]
    fn last_registration_wins() {
        let registry = ProtocolMap::new();
        let stack = crate::stack::testing_stack();
        let first = Rc::new(Recorder(RefCell::new(Vec::new())));
        let second = Rc::new(Recorder(RefCell::new(Vec::new())));
        registry.register(17, first.clone());
        registry.register(17, second.clone());
        registry
            .demux(17, Message::new(b""), Control::new(), &stack)
            .unwrap();
        assert!(first.0.borrow().is_empty());
        assert_eq!(second.0.borrow().len(), 1);
    }
}

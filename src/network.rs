//! Link-level types: addresses, the MTU, and the frame driver seam.

use crate::Message;
use std::{cell::RefCell, collections::VecDeque, fmt};

/// The maximum transmission unit of the network, the largest frame payload
/// the link will carry unfragmented.
pub type Mtu = u16;

/// The MTU of the single attached link.
pub const MTU: Mtu = 1500;

/// A link-level hardware address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Mac([u8; 6]);

impl Mac {
    /// The address that delivers a frame to every machine on the link.
    pub const BROADCAST: Mac = Mac([0xff; 6]);

    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    pub const fn to_bytes(self) -> [u8; 6] {
        self.0
    }
}

impl From<[u8; 6]> for Mac {
    fn from(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for Mac {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

/// The raw frame driver the stack sits on top of.
///
/// Sending is fire and forget: the stack never inspects driver failures.
/// Receiving never blocks beyond whatever the driver itself does; `None`
/// means no frame is available right now.
pub trait Driver {
    /// Transmits one frame.
    fn send(&self, frame: Message);

    /// Returns the next available frame, if any.
    fn receive(&self) -> Option<Message>;
}

/// A driver that delivers every transmitted frame back to its own receive
/// queue. Useful for exercising a full send-then-receive path through the
/// stack without any physical link.
#[derive(Debug, Default)]
pub struct Loopback {
    queue: RefCell<VecDeque<Message>>,
}

impl Loopback {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Driver for Loopback {
    fn send(&self, frame: Message) {
        self.queue.borrow_mut().push_back(frame);
    }

    fn receive(&self) -> Option<Message> {
        self.queue.borrow_mut().pop_front()
    }
}

//! Address resolution protocol (ARP) associates IP addresses with MAC
//! addresses on the local link.
//!
//! The subsystem keeps two tables keyed by IP address: a resolution cache
//! whose entries age out, and a pending-send buffer holding at most one
//! outbound message per destination while a request is outstanding. The
//! pending buffer turns the asynchronous resolution exchange into a
//! synchronous-looking send call: the first send for an unresolved address
//! queues the message and broadcasts a request, and the matching reply
//! flushes the queue. There is no retry timer; if no reply arrives before
//! the pending entry's short lifetime lapses, that message is lost and a
//! later send starts the exchange over.

use crate::{
    network::Mac,
    protocol::{DemuxError, Protocol, ProtocolId},
    protocols::ipv4::{self, Ipv4Address},
    ttl_map::TtlMap,
    Control, Message, Stack,
};
use std::{
    cell::RefCell,
    time::{Duration, Instant},
};

pub mod arp_parsing;
use arp_parsing::{ArpPacket, Operation};

/// The ethertype under which ARP registers with the link layer.
pub const ETHERTYPE: ProtocolId = 0x0806;

/// How long a cache entry stays valid after it was last refreshed.
const CACHE_TTL: Duration = Duration::from_secs(60);

/// How long a pending entry suppresses duplicate requests for its address.
const PENDING_TTL: Duration = Duration::from_secs(1);

/// The address resolution subsystem.
pub struct Arp {
    /// Maps IP addresses to the MACs they were last seen with.
    table: RefCell<TtlMap<Ipv4Address, Mac>>,
    /// The single outbound message waiting on resolution, per destination.
    pending: RefCell<TtlMap<Ipv4Address, Message>>,
}

impl Arp {
    /// Creates a new instance of the protocol.
    pub fn new() -> Self {
        Self {
            table: RefCell::new(TtlMap::new(Some(CACHE_TTL))),
            pending: RefCell::new(TtlMap::new(Some(PENDING_TTL))),
        }
    }

    /// Broadcasts a request for the MAC that holds `target_ip`.
    pub fn request(&self, target_ip: Ipv4Address, stack: &Stack) {
        let packet = ArpPacket::new_request(stack.mac(), stack.ip(), target_ip);
        stack.ethernet().frame_out(
            Message::new(packet.build()),
            Mac::BROADCAST,
            ETHERTYPE,
            stack,
        );
    }

    /// Unicasts a reply claiming the local address to `target`.
    pub fn reply(&self, target_ip: Ipv4Address, target_mac: Mac, stack: &Stack) {
        let packet = ArpPacket::new_reply(stack.mac(), stack.ip(), target_mac, target_ip);
        stack
            .ethernet()
            .frame_out(Message::new(packet.build()), target_mac, ETHERTYPE, stack);
    }

    /// Announces the local address unsolicited so neighbors can pre-populate
    /// their caches. Called once at stack initialization.
    pub(crate) fn announce(&self, stack: &Stack) {
        self.request(stack.ip(), stack);
    }

    /// Sends `message` to `destination`, resolving its MAC first if needed.
    ///
    /// A live cache entry sends immediately. An unresolved destination with
    /// no outstanding request queues a copy of the message and broadcasts
    /// one request. An unresolved destination that already has an
    /// outstanding request drops the message: at most one buffer waits per
    /// address, and the newcomer loses.
    pub fn resolve_and_send(&self, message: Message, destination: Ipv4Address, stack: &Stack) {
        self.resolve_and_send_at(message, destination, Instant::now(), stack);
    }

    /// [`Arp::resolve_and_send`] evaluated at the supplied point in time, so
    /// cache and pending entries can be aged out on demand.
    pub fn resolve_and_send_at(
        &self,
        message: Message,
        destination: Ipv4Address,
        now: Instant,
        stack: &Stack,
    ) {
        let cached = self.table.borrow().get_at(&destination, now).copied();
        if let Some(mac) = cached {
            stack
                .ethernet()
                .frame_out(message, mac, ipv4::ETHERTYPE, stack);
            return;
        }
        if self.pending.borrow().get_at(&destination, now).is_some() {
            tracing::debug!("Dropping a send to {destination} while resolution is outstanding");
            return;
        }
        self.pending.borrow_mut().set_at(destination, message, now);
        self.request(destination, stack);
    }

    /// The MAC currently cached for `ip`, if the entry is live.
    pub fn cached(&self, ip: Ipv4Address) -> Option<Mac> {
        self.table.borrow().get(&ip).copied()
    }

    /// Visits every live cache entry in unspecified order, for diagnostics.
    pub fn for_each_cached(&self, mut visit: impl FnMut(Ipv4Address, Mac)) {
        self.table.borrow().for_each(|ip, mac| visit(*ip, *mac));
    }
}

impl Protocol for Arp {
    /// Handles one ARP packet from the link. Any valid packet refreshes the
    /// cache entry for its sender; a refreshed entry flushes the pending
    /// message waiting on that sender, and requests for the local address
    /// are answered with a reply.
    fn demux(&self, message: Message, _control: Control, stack: &Stack) -> Result<(), DemuxError> {
        let packet = match ArpPacket::from_bytes(message.iter()) {
            Ok(packet) => packet,
            Err(e) => {
                tracing::debug!("{}", e);
                Err(DemuxError::Header)?
            }
        };

        self.table
            .borrow_mut()
            .set(packet.sender_ip, packet.sender_mac);

        let waiting = self.pending.borrow_mut().remove(&packet.sender_ip);
        if let Some(waiting) = waiting {
            stack
                .ethernet()
                .frame_out(waiting, packet.sender_mac, ipv4::ETHERTYPE, stack);
        } else if packet.oper == Operation::Request && packet.target_ip == stack.ip() {
            self.reply(packet.sender_ip, packet.sender_mac, stack);
        }
        Ok(())
    }
}

impl Default for Arp {
    fn default() -> Self {
        Self::new()
    }
}

//! A minimal layered protocol stack for a single network interface: Ethernet
//! framing, ARP resolution, best-effort IPv4 datagram delivery, and
//! connectionless UDP transport between a raw frame driver and application
//! code.
//!
//! # Organization
//!
//! - [`Message`] and [`Control`] provide basic utilities common to most
//!   protocols
//! - [`Protocol`] and the registry in [`protocol`] route incoming packets to
//!   the layer above
//! - [`Stack`] bundles the layers, their tables, and the local identity into
//!   one instance and drives the poll loop
//!
//! # Model
//!
//! Everything is single threaded and run to completion: one [`Stack::poll`]
//! receives at most one frame and carries it synchronously through every
//! layer up to the application handler before returning. Sending mirrors
//! that, with the one exception that a datagram for an unresolved destination
//! waits in the ARP pending buffer until the resolution reply arrives. Table
//! expiry is evaluated lazily at lookup time.
//!
//! The raw frame driver and the construction of unreachable diagnostics live
//! behind the [`network::Driver`] and [`protocol::UnreachableSink`] seams and
//! are supplied by the embedder.

pub mod message;
pub use message::Message;

pub mod control;
pub use control::Control;

pub mod protocol;
pub use protocol::Protocol;

pub mod network;

pub mod ttl_map;
pub use ttl_map::TtlMap;

pub mod stack;
pub use stack::{Interface, Stack};

pub mod protocols;

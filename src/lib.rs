//! Wire-level core of a multicast DNS (mDNS) / DNS-SD responder.
//!
//! The crate decodes incoming DNS messages (including label compression),
//! matches questions against the local host name and a set of registered
//! services, and encodes reply messages with correct section counts and
//! compression back-references. The multicast transport and host address
//! lookup are supplied by the caller through the [`Transport`] and
//! [`HostAddresses`] traits.

mod bytes;
mod message;
mod name;
mod reply;
mod resource;
mod responder;
mod service;

pub use bytes::Cursor;
pub use message::{Answer, Header, Message, Question};
pub use name::Name;
pub use reply::{NameRef, RecordHandle, Reply, Section, TxtRecordHandle};
pub use resource::{Aaaa, Hinfo, Ptr, ResourceType, Srv, Txt, A};
pub use responder::{HostAddresses, Responder, Transport};
pub use service::{Host, Protocol, Service};

/// The DNS class for Internet records.
pub const CLASS_IN: u16 = 1;

/// Default time-to-live for outgoing records, in seconds.
pub const DEFAULT_TTL: u32 = 120;

/// The domain suffix all mDNS names live under.
pub const DOT_LOCAL: &str = ".local";

/// The well-known DNS-SD service enumeration name.
pub const SERVICES_ENUMERATION: &str = "_services._dns-sd._udp.local";

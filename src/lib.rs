//! A minimal Ethernet/ARP/IPv4/ICMP/UDP network stack in Rust.
//!
//! The stack runs against a poll-style link driver — a Linux TAP device in
//! the demos, an in-memory queue pair in the tests — and provides:
//! - Ethernet II framing with minimum-frame padding
//! - ARP resolution with an expiring cache and a one-packet pending queue
//! - IPv4 receive validation and outbound fragmentation
//! - ICMP echo replies and destination-unreachable signaling
//! - UDP demultiplexing over a port handler table
//!
//! Everything hangs off [`NetStack`]: construct it over a [`LinkDriver`],
//! bind UDP ports with [`NetStack::udp_open`], then call
//! [`NetStack::poll`] in a loop.

pub mod buffer;
pub mod driver;
pub mod error;
pub mod iface;
pub mod link;
pub mod map;
pub mod network;
pub mod transport;

// Re-export commonly used types
pub use buffer::PacketBuf;
pub use driver::{LinkDriver, QueueDriver, TapDriver};
pub use error::NetError;
pub use iface::registry::Registry;
pub use iface::stack::{NetStack, StackConfig};
pub use link::arp::ArpPacket;
pub use link::ethernet::{EthernetHeader, MacAddr};
pub use map::TtlMap;
pub use network::icmp::IcmpHeader;
pub use network::ipv4::Ipv4Header;
pub use transport::udp::UdpHeader;

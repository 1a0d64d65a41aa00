//! Link layer: Ethernet framing and ARP address resolution.

pub mod arp;
pub mod ethernet;

pub use arp::{ArpPacket, ARP_OP_REPLY, ARP_OP_REQUEST};
pub use ethernet::{EthernetHeader, MacAddr, ETHERTYPE_ARP, ETHERTYPE_IPV4};

//! Transport layer: UDP demultiplexing.

pub mod udp;

pub use udp::{UdpHandler, UdpHeader, UDP_HEADER_LEN};

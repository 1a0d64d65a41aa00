//! Ethernet II framing.
//!
//! Frames and deframes packets, enforces the minimum frame size by zero
//! padding, and hands inbound payloads to the EtherType registry.

use std::fmt;

use byteorder::{BigEndian, ByteOrder};
use log::trace;

use crate::buffer::PacketBuf;
use crate::driver::LinkDriver;
use crate::error::NetError;
use crate::iface::stack::NetStack;

/// Ethernet header length in bytes.
pub const ETHERNET_HEADER_LEN: usize = 14;

/// Minimum payload carried by a frame: the 64-byte minimum frame length
/// less the 14-byte header and the 4-byte FCS the driver appends.
pub const ETHERNET_MIN_PAYLOAD: usize = 46;

/// EtherType values this stack dispatches on.
pub const ETHERTYPE_IPV4: u16 = 0x0800;
pub const ETHERTYPE_ARP: u16 = 0x0806;

/// A 48-bit Ethernet hardware address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    /// The broadcast address, FF:FF:FF:FF:FF:FF.
    pub const BROADCAST: MacAddr = MacAddr([0xFF; 6]);

    /// The all-zero address used as the unknown target in ARP requests.
    pub const ZERO: MacAddr = MacAddr([0; 6]);

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl From<[u8; 6]> for MacAddr {
    fn from(octets: [u8; 6]) -> Self {
        MacAddr(octets)
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

/// Ethernet II frame header.
#[derive(Debug, Clone, Copy)]
pub struct EthernetHeader {
    pub dst: MacAddr,
    pub src: MacAddr,
    pub ethertype: u16,
}

impl EthernetHeader {
    /// Parse a frame header from the start of `data`.
    ///
    /// Returns None if the data is too short to contain a full header.
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < ETHERNET_HEADER_LEN {
            return None;
        }
        Some(EthernetHeader {
            dst: MacAddr(data[0..6].try_into().unwrap()),
            src: MacAddr(data[6..12].try_into().unwrap()),
            ethertype: BigEndian::read_u16(&data[12..14]),
        })
    }

    /// Serialize the header to its 14-byte wire form.
    pub fn to_bytes(&self) -> [u8; ETHERNET_HEADER_LEN] {
        let mut bytes = [0u8; ETHERNET_HEADER_LEN];
        bytes[0..6].copy_from_slice(&self.dst.0);
        bytes[6..12].copy_from_slice(&self.src.0);
        BigEndian::write_u16(&mut bytes[12..14], self.ethertype);
        bytes
    }
}

impl<D: LinkDriver> NetStack<D> {
    /// Process one received frame.
    ///
    /// Drops frames shorter than the header, records the source MAC, strips
    /// the header, and dispatches by EtherType. Frames carrying an
    /// unregistered EtherType are dropped without a response.
    pub(crate) fn ethernet_in(&mut self, buf: &mut PacketBuf) -> Result<(), NetError> {
        let header = match EthernetHeader::from_bytes(buf.data()) {
            Some(header) => header,
            None => return Ok(()),
        };
        buf.pop_header(ETHERNET_HEADER_LEN);

        if !self.dispatch_ethertype(header.ethertype, buf, header.src)? {
            trace!(
                "dropping frame from {} with unknown ethertype {:#06x}",
                header.src,
                header.ethertype
            );
        }
        Ok(())
    }

    /// Frame a payload and hand it to the driver.
    ///
    /// Payloads shorter than the minimum transport unit are zero-padded
    /// first, then the header is prepended in the buffer's headroom.
    pub(crate) fn ethernet_out(
        &mut self,
        buf: &mut PacketBuf,
        dst: MacAddr,
        ethertype: u16,
    ) -> Result<(), NetError> {
        if buf.len() < ETHERNET_MIN_PAYLOAD {
            buf.pad_to(ETHERNET_MIN_PAYLOAD);
        }
        let header = EthernetHeader {
            dst,
            src: self.config.mac,
            ethertype,
        };
        buf.push_header(ETHERNET_HEADER_LEN)
            .copy_from_slice(&header.to_bytes());

        self.driver.send(buf.data())?;
        Ok(())
    }
}

//! IPv4: header codec, receive validation, and outbound fragmentation.
//!
//! Receive-side fragment reassembly is deliberately absent: the
//! more-fragments flag and fragment offset are never consulted, so each
//! inbound fragment is handed upward as if it were a complete packet. See
//! DESIGN.md.

use std::net::Ipv4Addr;

use byteorder::{BigEndian, ByteOrder};
use log::trace;

use crate::buffer::PacketBuf;
use crate::driver::LinkDriver;
use crate::error::NetError;
use crate::iface::stack::NetStack;
use crate::link::ethernet::MacAddr;
use crate::network::checksum16;
use crate::network::icmp::ICMP_CODE_PROTOCOL_UNREACHABLE;

/// Length of a base IPv4 header without options.
pub const IPV4_HEADER_LEN: usize = 20;

pub const IPV4_VERSION: u8 = 4;
const DEFAULT_IHL: u8 = 5;
const DEFAULT_TTL: u8 = 64;
const DEFAULT_TOS: u8 = 0;

/// IP protocol numbers this stack dispatches on.
pub const IP_PROTOCOL_ICMP: u8 = 1;
pub const IP_PROTOCOL_UDP: u8 = 17;

/// More-fragments bit in the flags/fragment-offset word.
pub const IP_FLAG_MORE_FRAGMENTS: u16 = 0x2000;
/// Mask of the fragment offset (in 8-byte units) within the same word.
pub const IP_FRAGMENT_OFFSET_MASK: u16 = 0x1FFF;

/// IPv4 packet header.
#[derive(Debug, Clone, Copy)]
pub struct Ipv4Header {
    pub version: u8,
    pub ihl: u8,
    pub tos: u8,
    pub total_len: u16,
    pub id: u16,
    pub flags_frag_offset: u16,
    pub ttl: u8,
    pub protocol: u8,
    pub checksum: u16,
    pub src_addr: Ipv4Addr,
    pub dst_addr: Ipv4Addr,
}

impl Ipv4Header {
    /// Parse a header from the start of `data`.
    ///
    /// Returns None if the data cannot hold a base header or the version
    /// field is not 4. Field-range and checksum validation stay with the
    /// receive path, which has the full packet in hand.
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < IPV4_HEADER_LEN {
            return None;
        }
        let version = (data[0] & 0xF0) >> 4;
        if version != IPV4_VERSION {
            return None;
        }

        Some(Ipv4Header {
            version,
            ihl: data[0] & 0x0F,
            tos: data[1],
            total_len: BigEndian::read_u16(&data[2..4]),
            id: BigEndian::read_u16(&data[4..6]),
            flags_frag_offset: BigEndian::read_u16(&data[6..8]),
            ttl: data[8],
            protocol: data[9],
            checksum: BigEndian::read_u16(&data[10..12]),
            src_addr: Ipv4Addr::new(data[12], data[13], data[14], data[15]),
            dst_addr: Ipv4Addr::new(data[16], data[17], data[18], data[19]),
        })
    }

    /// Serialize the base 20-byte header (options are never emitted).
    pub fn to_bytes(&self) -> [u8; IPV4_HEADER_LEN] {
        let mut bytes = [0u8; IPV4_HEADER_LEN];
        bytes[0] = (self.version << 4) | self.ihl;
        bytes[1] = self.tos;
        BigEndian::write_u16(&mut bytes[2..4], self.total_len);
        BigEndian::write_u16(&mut bytes[4..6], self.id);
        BigEndian::write_u16(&mut bytes[6..8], self.flags_frag_offset);
        bytes[8] = self.ttl;
        bytes[9] = self.protocol;
        BigEndian::write_u16(&mut bytes[10..12], self.checksum);
        bytes[12..16].copy_from_slice(&self.src_addr.octets());
        bytes[16..20].copy_from_slice(&self.dst_addr.octets());
        bytes
    }

    /// Header length in bytes as declared by the IHL field.
    pub fn header_len(&self) -> usize {
        (self.ihl as usize) * 4
    }

    /// Declared payload length (total length minus header length).
    pub fn payload_len(&self) -> usize {
        self.total_len as usize - self.header_len()
    }

    pub fn more_fragments(&self) -> bool {
        self.flags_frag_offset & IP_FLAG_MORE_FRAGMENTS != 0
    }

    /// Fragment offset in bytes.
    pub fn fragment_offset(&self) -> usize {
        ((self.flags_frag_offset & IP_FRAGMENT_OFFSET_MASK) as usize) * 8
    }
}

impl<D: LinkDriver> NetStack<D> {
    /// Process one received IP packet.
    ///
    /// Validates the header (length bounds, version, IHL range, total
    /// length, checksum), filters by destination address, strips trailing
    /// link padding and the header, and dispatches by protocol number.
    /// An unhandled protocol gets the header re-attached and answered with
    /// ICMP protocol-unreachable; every other failure is a silent drop.
    pub(crate) fn ip_in(&mut self, buf: &mut PacketBuf, _src_mac: MacAddr) -> Result<(), NetError> {
        let header = match Ipv4Header::from_bytes(buf.data()) {
            Some(header) => header,
            None => return Ok(()),
        };

        // IHL is a 4-bit field, so only the lower bound can be violated.
        if header.ihl < DEFAULT_IHL {
            return Ok(());
        }
        let header_len = header.header_len();
        let total_len = header.total_len as usize;
        if total_len > buf.len() || total_len < header_len {
            return Ok(());
        }

        // Verify the header checksum over a scratch copy with the checksum
        // field zeroed; the wire bytes stay untouched.
        let mut scratch = buf.data()[..header_len].to_vec();
        scratch[10..12].fill(0);
        if checksum16(&scratch) != header.checksum {
            trace!("ip: header checksum mismatch from {}", header.src_addr);
            return Ok(());
        }

        if header.dst_addr != self.config.ip {
            return Ok(());
        }

        if buf.len() > total_len {
            buf.trim_to(total_len);
        }
        buf.pop_header(header_len);

        if !self.dispatch_ip_protocol(header.protocol, buf, header.src_addr)? {
            buf.push_header(header_len);
            self.icmp_unreachable(buf, header.src_addr, ICMP_CODE_PROTOCOL_UNREACHABLE)?;
        }
        Ok(())
    }

    /// Send an upper-layer payload to `dst_ip`, fragmenting when it exceeds
    /// what one frame can carry.
    ///
    /// All fragments of one datagram share a freshly allocated identifier;
    /// every fragment except the last carries the more-fragments flag and a
    /// byte offset in 8-byte units.
    pub fn ip_out(
        &mut self,
        buf: &mut PacketBuf,
        dst_ip: Ipv4Addr,
        protocol: u8,
    ) -> Result<(), NetError> {
        // Fragment payloads must sit on 8-byte boundaries.
        let max_payload = (self.config.mtu - IPV4_HEADER_LEN) & !7;
        let id = self.next_ip_ident();

        if buf.len() <= max_payload {
            return self.ip_fragment_out(buf, dst_ip, protocol, id, 0, false);
        }

        let payload = buf.data().to_vec();
        let mut offset = 0;
        while payload.len() - offset > max_payload {
            let mut fragment = PacketBuf::with_payload(&payload[offset..offset + max_payload]);
            self.ip_fragment_out(&mut fragment, dst_ip, protocol, id, offset, true)?;
            offset += max_payload;
        }
        let mut fragment = PacketBuf::with_payload(&payload[offset..]);
        self.ip_fragment_out(&mut fragment, dst_ip, protocol, id, offset, false)
    }

    /// Prepend a full IP header to one fragment and hand it to ARP
    /// resolution. `frag_offset` is in bytes and must be a multiple of 8.
    pub(crate) fn ip_fragment_out(
        &mut self,
        buf: &mut PacketBuf,
        dst_ip: Ipv4Addr,
        protocol: u8,
        id: u16,
        frag_offset: usize,
        more_fragments: bool,
    ) -> Result<(), NetError> {
        debug_assert_eq!(frag_offset % 8, 0);

        let mut flags_frag_offset = (frag_offset / 8) as u16 & IP_FRAGMENT_OFFSET_MASK;
        if more_fragments {
            flags_frag_offset |= IP_FLAG_MORE_FRAGMENTS;
        }

        let header = Ipv4Header {
            version: IPV4_VERSION,
            ihl: DEFAULT_IHL,
            tos: DEFAULT_TOS,
            total_len: (IPV4_HEADER_LEN + buf.len()) as u16,
            id,
            flags_frag_offset,
            ttl: DEFAULT_TTL,
            protocol,
            checksum: 0,
            src_addr: self.config.ip,
            dst_addr: dst_ip,
        };
        let mut bytes = header.to_bytes();
        let sum = checksum16(&bytes);
        BigEndian::write_u16(&mut bytes[10..12], sum);
        buf.push_header(IPV4_HEADER_LEN).copy_from_slice(&bytes);

        self.arp_out(buf, dst_ip)
    }
}

//! ICMP: echo replies and destination-unreachable signaling.

use std::net::Ipv4Addr;

use byteorder::{BigEndian, ByteOrder};

use crate::buffer::PacketBuf;
use crate::driver::LinkDriver;
use crate::error::NetError;
use crate::iface::stack::NetStack;
use crate::network::checksum16;
use crate::network::ipv4::IP_PROTOCOL_ICMP;

/// ICMP header length in bytes.
pub const ICMP_HEADER_LEN: usize = 8;

/// ICMP message types.
pub const ICMP_TYPE_ECHO_REPLY: u8 = 0;
pub const ICMP_TYPE_UNREACHABLE: u8 = 3;
pub const ICMP_TYPE_ECHO_REQUEST: u8 = 8;

/// Destination-unreachable codes.
pub const ICMP_CODE_PROTOCOL_UNREACHABLE: u8 = 2;
pub const ICMP_CODE_PORT_UNREACHABLE: u8 = 3;

/// ICMP message header.
///
/// The trailing four bytes are type-specific: identifier and sequence
/// number for echo messages, unused (zero) for unreachable messages.
#[derive(Debug, Clone, Copy)]
pub struct IcmpHeader {
    pub msg_type: u8,
    pub msg_code: u8,
    pub checksum: u16,
    pub rest: [u8; 4],
}

impl IcmpHeader {
    /// Parse a header from the start of `data`.
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < ICMP_HEADER_LEN {
            return None;
        }
        Some(IcmpHeader {
            msg_type: data[0],
            msg_code: data[1],
            checksum: BigEndian::read_u16(&data[2..4]),
            rest: data[4..8].try_into().unwrap(),
        })
    }

    pub fn to_bytes(&self) -> [u8; ICMP_HEADER_LEN] {
        let mut bytes = [0u8; ICMP_HEADER_LEN];
        bytes[0] = self.msg_type;
        bytes[1] = self.msg_code;
        BigEndian::write_u16(&mut bytes[2..4], self.checksum);
        bytes[4..8].copy_from_slice(&self.rest);
        bytes
    }

    /// Identifier field of an echo message.
    pub fn identifier(&self) -> u16 {
        BigEndian::read_u16(&self.rest[0..2])
    }

    /// Sequence number field of an echo message.
    pub fn sequence(&self) -> u16 {
        BigEndian::read_u16(&self.rest[2..4])
    }
}

impl<D: LinkDriver> NetStack<D> {
    /// Process a received ICMP message.
    ///
    /// Only echo requests are handled; every other type is ignored.
    pub(crate) fn icmp_in(&mut self, buf: &mut PacketBuf, src_ip: Ipv4Addr) -> Result<(), NetError> {
        let header = match IcmpHeader::from_bytes(buf.data()) {
            Some(header) => header,
            None => return Ok(()),
        };
        if header.msg_type != ICMP_TYPE_ECHO_REQUEST {
            return Ok(());
        }
        self.icmp_echo_reply(buf, src_ip)
    }

    /// Answer an echo request: copy the whole message, flip the type,
    /// recompute the checksum, send it back to the requester.
    fn icmp_echo_reply(&mut self, request: &PacketBuf, src_ip: Ipv4Addr) -> Result<(), NetError> {
        let mut buf = PacketBuf::with_payload(request.data());
        let msg = buf.data_mut();
        msg[0] = ICMP_TYPE_ECHO_REPLY;
        msg[1] = 0;
        msg[2..4].fill(0);
        let sum = checksum16(buf.data());
        BigEndian::write_u16(&mut buf.data_mut()[2..4], sum);

        self.ip_out(&mut buf, src_ip, IP_PROTOCOL_ICMP)
    }

    /// Send a destination-unreachable message to `dst_ip`.
    ///
    /// `original` must start at the offending packet's IP header; the
    /// message embeds that header (its actual IHL length) plus the first 8
    /// bytes of its payload, zero-padded when the payload is shorter.
    pub(crate) fn icmp_unreachable(
        &mut self,
        original: &PacketBuf,
        dst_ip: Ipv4Addr,
        code: u8,
    ) -> Result<(), NetError> {
        let data = original.data();
        let ip_header_len = ((data[0] & 0x0F) as usize) * 4;
        let copy_len = 8.min(data.len().saturating_sub(ip_header_len));

        let msg_len = ICMP_HEADER_LEN + ip_header_len + 8;
        let mut buf = PacketBuf::with_capacity(msg_len.max(64));
        buf.pad_to(msg_len);

        let msg = buf.data_mut();
        msg[0] = ICMP_TYPE_UNREACHABLE;
        msg[1] = code;
        // Bytes 2..8 stay zero: checksum placeholder and the unused field.
        msg[ICMP_HEADER_LEN..ICMP_HEADER_LEN + ip_header_len]
            .copy_from_slice(&data[..ip_header_len]);
        msg[ICMP_HEADER_LEN + ip_header_len..ICMP_HEADER_LEN + ip_header_len + copy_len]
            .copy_from_slice(&data[ip_header_len..ip_header_len + copy_len]);

        let sum = checksum16(buf.data());
        BigEndian::write_u16(&mut buf.data_mut()[2..4], sum);

        self.ip_out(&mut buf, dst_ip, IP_PROTOCOL_ICMP)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trip() {
        let header = IcmpHeader {
            msg_type: ICMP_TYPE_ECHO_REQUEST,
            msg_code: 0,
            checksum: 0xABCD,
            rest: [0x00, 0x01, 0x00, 0x2A],
        };
        let parsed = IcmpHeader::from_bytes(&header.to_bytes()).unwrap();
        assert_eq!(parsed.msg_type, ICMP_TYPE_ECHO_REQUEST);
        assert_eq!(parsed.checksum, 0xABCD);
        assert_eq!(parsed.identifier(), 1);
        assert_eq!(parsed.sequence(), 42);
    }

    #[test]
    fn short_data_rejected() {
        assert!(IcmpHeader::from_bytes(&[0u8; 7]).is_none());
    }
}

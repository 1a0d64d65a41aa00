//! UDP: datagram validation and port demultiplexing.

use std::net::Ipv4Addr;

use byteorder::{BigEndian, ByteOrder};
use log::trace;

use crate::buffer::PacketBuf;
use crate::driver::LinkDriver;
use crate::error::NetError;
use crate::iface::stack::NetStack;
use crate::network::icmp::ICMP_CODE_PORT_UNREACHABLE;
use crate::network::ipv4::{IPV4_HEADER_LEN, IP_PROTOCOL_UDP};
use crate::network::transport_checksum;

/// UDP header length in bytes.
pub const UDP_HEADER_LEN: usize = 8;

/// Application callback bound to a UDP port.
///
/// Invoked with the datagram payload, the sender's address, and the
/// sender's port. Replies go back out through
/// [`NetStack::udp_send`](crate::NetStack::udp_send) after the poll call
/// returns.
pub type UdpHandler = Box<dyn FnMut(&[u8], Ipv4Addr, u16)>;

/// UDP datagram header.
#[derive(Debug, Clone, Copy)]
pub struct UdpHeader {
    pub src_port: u16,
    pub dst_port: u16,
    /// Length of header plus data.
    pub length: u16,
    pub checksum: u16,
}

impl UdpHeader {
    /// Parse a header from the start of `data`.
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < UDP_HEADER_LEN {
            return None;
        }
        Some(UdpHeader {
            src_port: BigEndian::read_u16(&data[0..2]),
            dst_port: BigEndian::read_u16(&data[2..4]),
            length: BigEndian::read_u16(&data[4..6]),
            checksum: BigEndian::read_u16(&data[6..8]),
        })
    }

    pub fn to_bytes(&self) -> [u8; UDP_HEADER_LEN] {
        let mut bytes = [0u8; UDP_HEADER_LEN];
        BigEndian::write_u16(&mut bytes[0..2], self.src_port);
        BigEndian::write_u16(&mut bytes[2..4], self.dst_port);
        BigEndian::write_u16(&mut bytes[4..6], self.length);
        BigEndian::write_u16(&mut bytes[6..8], self.checksum);
        bytes
    }
}

impl<D: LinkDriver> NetStack<D> {
    /// Process a received UDP datagram.
    ///
    /// Validates the declared length against the received bytes, trims
    /// trailing padding, verifies the checksum (zeroing the field,
    /// recomputing over the pseudo-header, restoring it), and demultiplexes
    /// by destination port. A datagram to an unbound port gets the IP
    /// header re-attached and answered with ICMP port-unreachable.
    pub(crate) fn udp_in(&mut self, buf: &mut PacketBuf, src_ip: Ipv4Addr) -> Result<(), NetError> {
        let header = match UdpHeader::from_bytes(buf.data()) {
            Some(header) => header,
            None => return Ok(()),
        };
        let total_len = header.length as usize;
        if total_len < UDP_HEADER_LEN || total_len > buf.len() {
            return Ok(());
        }
        if buf.len() > total_len {
            buf.trim_to(total_len);
        }

        let orig_checksum = header.checksum;
        buf.data_mut()[6..8].fill(0);
        let calc = transport_checksum(IP_PROTOCOL_UDP, buf.data(), src_ip, self.config.ip);
        BigEndian::write_u16(&mut buf.data_mut()[6..8], orig_checksum);
        // A computed checksum of zero goes on the wire as all-ones.
        let valid = calc == orig_checksum || (orig_checksum == 0xFFFF && calc == 0);
        if !valid {
            trace!(
                "udp: checksum mismatch from {src_ip}:{} (got {orig_checksum:#06x}, want {calc:#06x})",
                header.src_port
            );
            return Ok(());
        }

        if self.udp_ports.get(&header.dst_port).is_none() {
            // Re-expose the base IP header the IP layer stripped, so the
            // unreachable message can embed it.
            buf.push_header(IPV4_HEADER_LEN);
            return self.icmp_unreachable(buf, src_ip, ICMP_CODE_PORT_UNREACHABLE);
        }

        buf.pop_header(UDP_HEADER_LEN);
        if let Some(handler) = self.udp_ports.get_mut(&header.dst_port) {
            handler(buf.data(), src_ip, header.src_port);
        }
        Ok(())
    }

    /// Prepend a UDP header to the payload in `buf` and send it.
    pub fn udp_out(
        &mut self,
        buf: &mut PacketBuf,
        src_port: u16,
        dst_ip: Ipv4Addr,
        dst_port: u16,
    ) -> Result<(), NetError> {
        buf.push_header(UDP_HEADER_LEN);
        let total_len = buf.len() as u16;
        let header = buf.data_mut();
        BigEndian::write_u16(&mut header[0..2], src_port);
        BigEndian::write_u16(&mut header[2..4], dst_port);
        BigEndian::write_u16(&mut header[4..6], total_len);
        header[6..8].fill(0);

        let mut sum = transport_checksum(IP_PROTOCOL_UDP, buf.data(), self.config.ip, dst_ip);
        if sum == 0 {
            sum = 0xFFFF;
        }
        BigEndian::write_u16(&mut buf.data_mut()[6..8], sum);

        self.ip_out(buf, dst_ip, IP_PROTOCOL_UDP)
    }

    /// Send `data` as one UDP datagram.
    pub fn udp_send(
        &mut self,
        data: &[u8],
        src_port: u16,
        dst_ip: Ipv4Addr,
        dst_port: u16,
    ) -> Result<(), NetError> {
        let mut buf = PacketBuf::with_payload(data);
        self.udp_out(&mut buf, src_port, dst_ip, dst_port)
    }

    /// Bind a handler to a local port. Rebinding a bound port replaces the
    /// previous handler.
    pub fn udp_open(
        &mut self,
        port: u16,
        handler: impl FnMut(&[u8], Ipv4Addr, u16) + 'static,
    ) -> Result<(), NetError> {
        self.udp_ports.set(port, Box::new(handler))
    }

    /// Unbind a local port. Unbound ports answer with port-unreachable.
    pub fn udp_close(&mut self, port: u16) {
        self.udp_ports.remove(&port);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trip() {
        let header = UdpHeader {
            src_port: 5353,
            dst_port: 7,
            length: 19,
            checksum: 0x1234,
        };
        let parsed = UdpHeader::from_bytes(&header.to_bytes()).unwrap();
        assert_eq!(parsed.src_port, 5353);
        assert_eq!(parsed.dst_port, 7);
        assert_eq!(parsed.length, 19);
        assert_eq!(parsed.checksum, 0x1234);
    }

    #[test]
    fn short_data_rejected() {
        assert!(UdpHeader::from_bytes(&[0u8; 7]).is_none());
    }
}

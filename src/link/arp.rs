//! ARP address resolution.
//!
//! Maintains the IP-to-MAC cache and the one-packet-per-destination pending
//! queue. Resolution is the only asynchronous step in an otherwise
//! synchronous send path: a cache miss parks the outbound packet, issues a
//! broadcast request, and the matching reply releases it.

use std::net::Ipv4Addr;

use byteorder::{BigEndian, ByteOrder};
use log::{debug, trace};

use crate::buffer::PacketBuf;
use crate::driver::LinkDriver;
use crate::error::NetError;
use crate::iface::stack::NetStack;
use crate::link::ethernet::{MacAddr, ETHERTYPE_ARP, ETHERTYPE_IPV4};

/// ARP packet length on the wire (Ethernet/IPv4 flavor).
pub const ARP_PACKET_LEN: usize = 28;

/// Hardware type for Ethernet.
pub const ARP_HW_ETHERNET: u16 = 1;

/// Operation codes.
pub const ARP_OP_REQUEST: u16 = 1;
pub const ARP_OP_REPLY: u16 = 2;

/// An ARP request or reply for Ethernet/IPv4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArpPacket {
    pub opcode: u16,
    pub sender_mac: MacAddr,
    pub sender_ip: Ipv4Addr,
    pub target_mac: MacAddr,
    pub target_ip: Ipv4Addr,
}

impl ArpPacket {
    /// Build a request asking who holds `target_ip`.
    pub fn request(sender_mac: MacAddr, sender_ip: Ipv4Addr, target_ip: Ipv4Addr) -> Self {
        ArpPacket {
            opcode: ARP_OP_REQUEST,
            sender_mac,
            sender_ip,
            target_mac: MacAddr::ZERO,
            target_ip,
        }
    }

    /// Build a reply answering `target` with our binding.
    pub fn reply(
        sender_mac: MacAddr,
        sender_ip: Ipv4Addr,
        target_mac: MacAddr,
        target_ip: Ipv4Addr,
    ) -> Self {
        ArpPacket {
            opcode: ARP_OP_REPLY,
            sender_mac,
            sender_ip,
            target_mac,
            target_ip,
        }
    }

    /// Parse and validate an ARP packet.
    ///
    /// Returns None unless the fixed fields identify an Ethernet/IPv4
    /// request or reply: hardware type 1, protocol type 0x0800, address
    /// lengths 6 and 4, opcode 1 or 2.
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < ARP_PACKET_LEN {
            return None;
        }
        if BigEndian::read_u16(&data[0..2]) != ARP_HW_ETHERNET {
            return None;
        }
        if BigEndian::read_u16(&data[2..4]) != ETHERTYPE_IPV4 {
            return None;
        }
        if data[4] != 6 || data[5] != 4 {
            return None;
        }
        let opcode = BigEndian::read_u16(&data[6..8]);
        if opcode != ARP_OP_REQUEST && opcode != ARP_OP_REPLY {
            return None;
        }

        Some(ArpPacket {
            opcode,
            sender_mac: MacAddr(data[8..14].try_into().unwrap()),
            sender_ip: Ipv4Addr::new(data[14], data[15], data[16], data[17]),
            target_mac: MacAddr(data[18..24].try_into().unwrap()),
            target_ip: Ipv4Addr::new(data[24], data[25], data[26], data[27]),
        })
    }

    /// Serialize to the 28-byte wire form.
    pub fn to_bytes(&self) -> [u8; ARP_PACKET_LEN] {
        let mut bytes = [0u8; ARP_PACKET_LEN];
        BigEndian::write_u16(&mut bytes[0..2], ARP_HW_ETHERNET);
        BigEndian::write_u16(&mut bytes[2..4], ETHERTYPE_IPV4);
        bytes[4] = 6;
        bytes[5] = 4;
        BigEndian::write_u16(&mut bytes[6..8], self.opcode);
        bytes[8..14].copy_from_slice(&self.sender_mac.0);
        bytes[14..18].copy_from_slice(&self.sender_ip.octets());
        bytes[18..24].copy_from_slice(&self.target_mac.0);
        bytes[24..28].copy_from_slice(&self.target_ip.octets());
        bytes
    }

    pub fn is_request(&self) -> bool {
        self.opcode == ARP_OP_REQUEST
    }

    pub fn is_reply(&self) -> bool {
        self.opcode == ARP_OP_REPLY
    }
}

impl<D: LinkDriver> NetStack<D> {
    /// Broadcast a request for `target_ip`.
    pub(crate) fn arp_req(&mut self, target_ip: Ipv4Addr) -> Result<(), NetError> {
        let request = ArpPacket::request(self.config.mac, self.config.ip, target_ip);
        let mut buf = PacketBuf::with_payload(&request.to_bytes());
        self.ethernet_out(&mut buf, MacAddr::BROADCAST, ETHERTYPE_ARP)
    }

    /// Unicast a reply with our binding to `target`.
    pub(crate) fn arp_resp(&mut self, target_ip: Ipv4Addr, target_mac: MacAddr) -> Result<(), NetError> {
        let reply = ArpPacket::reply(self.config.mac, self.config.ip, target_mac, target_ip);
        let mut buf = PacketBuf::with_payload(&reply.to_bytes());
        self.ethernet_out(&mut buf, target_mac, ETHERTYPE_ARP)
    }

    /// Process a received ARP packet.
    ///
    /// Any packet passing fixed-field validation refreshes the cache with
    /// the sender's binding, solicited or not. A refreshed binding releases
    /// the pending packet parked for that IP, if any; otherwise requests
    /// addressed to our IP get a reply. Everything else is dropped.
    pub(crate) fn arp_in(&mut self, buf: &mut PacketBuf, _src_mac: MacAddr) -> Result<(), NetError> {
        let packet = match ArpPacket::from_bytes(buf.data()) {
            Some(packet) => packet,
            None => return Ok(()),
        };

        if self
            .arp_cache
            .set(packet.sender_ip, packet.sender_mac)
            .is_err()
        {
            debug!("arp cache full, not learning {}", packet.sender_ip);
        }

        if let Some(mut pending) = self.arp_pending.remove(&packet.sender_ip) {
            trace!("arp: releasing pending packet for {}", packet.sender_ip);
            return self.ethernet_out(&mut pending, packet.sender_mac, ETHERTYPE_IPV4);
        }

        if packet.is_request() && packet.target_ip == self.config.ip {
            return self.arp_resp(packet.sender_ip, packet.sender_mac);
        }
        Ok(())
    }

    /// Resolve `dst_ip` and send `buf` as an IPv4 frame.
    ///
    /// Cache hit: frame directly. Miss with no request outstanding: park a
    /// copy of the packet and broadcast a request. Miss with a request
    /// already outstanding: drop the packet — at most one packet is
    /// buffered per destination, upper layers retry.
    pub(crate) fn arp_out(&mut self, buf: &mut PacketBuf, dst_ip: Ipv4Addr) -> Result<(), NetError> {
        if let Some(mac) = self.arp_cache.get(&dst_ip).copied() {
            return self.ethernet_out(buf, mac, ETHERTYPE_IPV4);
        }

        if self.arp_pending.get(&dst_ip).is_some() {
            trace!("arp: request for {dst_ip} outstanding, dropping packet");
            return Ok(());
        }

        if self.arp_pending.set(dst_ip, buf.clone()).is_err() {
            debug!("arp pending queue full, dropping packet for {dst_ip}");
            return Ok(());
        }
        self.arp_req(dst_ip)
    }

    /// Log every live cache entry with its age.
    pub fn log_arp_table(&self) {
        self.arp_cache.for_each(|ip, mac, stamp| {
            debug!("arp: {ip} -> {mac} (age {:?})", stamp.elapsed());
        });
    }
}

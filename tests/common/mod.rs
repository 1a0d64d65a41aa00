//! Shared fixtures: a stack over the in-memory driver and wire-format
//! builders for inbound frames.

#![allow(dead_code)]

use std::net::Ipv4Addr;

use tapstack::link::ethernet::ETHERTYPE_ARP;
use tapstack::network::ipv4::IPV4_HEADER_LEN;
use tapstack::network::{checksum16, transport_checksum};
use tapstack::{
    ArpPacket, EthernetHeader, Ipv4Header, MacAddr, NetStack, QueueDriver, StackConfig,
};

pub const STACK_MAC: MacAddr = MacAddr([0x02, 0x00, 0x00, 0x00, 0x00, 0x01]);
pub const STACK_IP: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 1);
pub const PEER_MAC: MacAddr = MacAddr([0x02, 0x00, 0x00, 0x00, 0x00, 0x02]);
pub const PEER_IP: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 2);

/// Bring up a stack on a fresh queue driver, discarding the gratuitous ARP
/// announcement it sends at construction.
pub fn new_stack() -> (NetStack<QueueDriver>, QueueDriver) {
    let handle = QueueDriver::new();
    let stack = NetStack::new(handle.clone(), StackConfig::new(STACK_MAC, STACK_IP)).unwrap();
    handle.transmitted().expect("gratuitous arp announcement");
    (stack, handle)
}

/// Teach the stack the peer's binding with an unsolicited ARP reply, so
/// outbound packets to the peer go straight to Ethernet.
pub fn resolve_peer(stack: &mut NetStack<QueueDriver>, handle: &QueueDriver) {
    let reply = ArpPacket::reply(PEER_MAC, PEER_IP, STACK_MAC, STACK_IP);
    handle.inject(&eth_frame(STACK_MAC, PEER_MAC, ETHERTYPE_ARP, &reply.to_bytes()));
    stack.poll().unwrap();
    assert_eq!(handle.transmitted_len(), 0, "unsolicited reply needs no answer");
}

pub fn eth_frame(dst: MacAddr, src: MacAddr, ethertype: u16, payload: &[u8]) -> Vec<u8> {
    let header = EthernetHeader {
        dst,
        src,
        ethertype,
    };
    let mut frame = header.to_bytes().to_vec();
    frame.extend_from_slice(payload);
    frame
}

/// A valid IPv4 packet: base header with correct checksum, then payload.
pub fn ipv4_packet(src: Ipv4Addr, dst: Ipv4Addr, protocol: u8, payload: &[u8]) -> Vec<u8> {
    let header = Ipv4Header {
        version: 4,
        ihl: 5,
        tos: 0,
        total_len: (IPV4_HEADER_LEN + payload.len()) as u16,
        id: 0x0042,
        flags_frag_offset: 0,
        ttl: 64,
        protocol,
        checksum: 0,
        src_addr: src,
        dst_addr: dst,
    };
    let mut bytes = header.to_bytes();
    let sum = checksum16(&bytes);
    bytes[10..12].copy_from_slice(&sum.to_be_bytes());

    let mut packet = bytes.to_vec();
    packet.extend_from_slice(payload);
    packet
}

/// A UDP segment with a correct pseudo-header checksum (0 sent as 0xFFFF).
pub fn udp_segment(
    src_ip: Ipv4Addr,
    dst_ip: Ipv4Addr,
    src_port: u16,
    dst_port: u16,
    payload: &[u8],
) -> Vec<u8> {
    let mut segment = Vec::with_capacity(8 + payload.len());
    segment.extend_from_slice(&src_port.to_be_bytes());
    segment.extend_from_slice(&dst_port.to_be_bytes());
    segment.extend_from_slice(&((8 + payload.len()) as u16).to_be_bytes());
    segment.extend_from_slice(&[0, 0]);
    segment.extend_from_slice(payload);

    let mut sum = transport_checksum(17, &segment, src_ip, dst_ip);
    if sum == 0 {
        sum = 0xFFFF;
    }
    segment[6..8].copy_from_slice(&sum.to_be_bytes());
    segment
}

/// An ICMP echo request with a correct checksum.
pub fn icmp_echo_request(id: u16, seq: u16, data: &[u8]) -> Vec<u8> {
    let mut message = vec![8, 0, 0, 0];
    message.extend_from_slice(&id.to_be_bytes());
    message.extend_from_slice(&seq.to_be_bytes());
    message.extend_from_slice(data);
    let sum = checksum16(&message);
    message[2..4].copy_from_slice(&sum.to_be_bytes());
    message
}

/// Split a transmitted frame into its IP header and declared IP payload.
pub fn parse_ip_frame(frame: &[u8]) -> (Ipv4Header, Vec<u8>) {
    let header = Ipv4Header::from_bytes(&frame[14..]).expect("ip header");
    let start = 14 + header.header_len();
    let end = 14 + header.total_len as usize;
    (header, frame[start..end].to_vec())
}

mod common;

use common::*;
use tapstack::link::ethernet::{ETHERNET_HEADER_LEN, ETHERNET_MIN_PAYLOAD};
use tapstack::{EthernetHeader, Ipv4Header};

#[test]
fn drops_frames_shorter_than_the_header() {
    let (mut stack, handle) = new_stack();

    handle.inject(&[0u8; 10]);
    assert!(stack.poll().unwrap(), "frame was consumed");
    assert_eq!(handle.transmitted_len(), 0);
}

#[test]
fn drops_unknown_ethertypes_silently() {
    let (mut stack, handle) = new_stack();

    // An IPv6 frame: valid Ethernet, no registered handler.
    handle.inject(&eth_frame(STACK_MAC, PEER_MAC, 0x86DD, &[0u8; 40]));
    stack.poll().unwrap();

    assert_eq!(handle.transmitted_len(), 0, "no unreachable at this layer");
}

#[test]
fn pads_outbound_frames_to_the_minimum() {
    let (mut stack, handle) = new_stack();
    resolve_peer(&mut stack, &handle);

    // IP (20) + UDP (8) + 1 payload byte is well under the minimum
    // transport unit.
    stack.udp_send(b"x", 1000, PEER_IP, 2000).unwrap();
    let frame = handle.transmitted().expect("padded frame");
    assert_eq!(frame.len(), ETHERNET_HEADER_LEN + ETHERNET_MIN_PAYLOAD);

    // Everything past the declared IP total length is zero padding.
    let header = Ipv4Header::from_bytes(&frame[ETHERNET_HEADER_LEN..]).unwrap();
    let declared_end = ETHERNET_HEADER_LEN + header.total_len as usize;
    assert!(frame[declared_end..].iter().all(|&b| b == 0));
}

#[test]
fn outbound_frames_carry_our_source_mac() {
    let (mut stack, handle) = new_stack();
    resolve_peer(&mut stack, &handle);

    stack.udp_send(b"payload", 1000, PEER_IP, 2000).unwrap();
    let frame = handle.transmitted().unwrap();
    let header = EthernetHeader::from_bytes(&frame).unwrap();
    assert_eq!(header.src, STACK_MAC);
    assert_eq!(header.dst, PEER_MAC);
}

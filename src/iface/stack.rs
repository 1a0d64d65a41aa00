//! The stack context object and the poll-driven receive pipeline.
//!
//! `NetStack` owns everything with process lifetime: the link driver, the
//! interface configuration, both dispatch registries, the ARP cache and
//! pending queue, and the UDP port table. All protocol entry points are
//! methods on it, implemented next to their codecs in the protocol modules.
//!
//! Everything is single-threaded and synchronous: one `poll` call runs one
//! received frame through the whole pipeline before returning.

use std::net::Ipv4Addr;
use std::time::Duration;

use log::info;

use crate::buffer::PacketBuf;
use crate::driver::LinkDriver;
use crate::error::NetError;
use crate::iface::registry::Registry;
use crate::link::ethernet::{MacAddr, ETHERNET_HEADER_LEN, ETHERTYPE_ARP, ETHERTYPE_IPV4};
use crate::map::TtlMap;
use crate::network::ipv4::{IP_PROTOCOL_ICMP, IP_PROTOCOL_UDP};
use crate::transport::udp::UdpHandler;

/// Bounds on the process-lifetime tables.
const ARP_CACHE_CAPACITY: usize = 32;
const ARP_PENDING_CAPACITY: usize = 32;
const UDP_PORT_CAPACITY: usize = 64;

/// Interface configuration.
#[derive(Debug, Clone, Copy)]
pub struct StackConfig {
    /// Our hardware address.
    pub mac: MacAddr,
    /// Our IPv4 address; inbound packets to any other address are dropped.
    pub ip: Ipv4Addr,
    /// Largest IP packet a single frame carries; larger payloads fragment.
    pub mtu: usize,
    /// Lifetime of a learned ARP cache entry.
    pub arp_cache_ttl: Duration,
    /// Minimum interval between ARP requests for one destination.
    pub arp_retry_interval: Duration,
}

impl StackConfig {
    /// Configuration with the conventional defaults: MTU 1500, 60-second
    /// ARP cache lifetime, 1-second request interval.
    pub fn new(mac: MacAddr, ip: Ipv4Addr) -> Self {
        StackConfig {
            mac,
            ip,
            mtu: 1500,
            arp_cache_ttl: Duration::from_secs(60),
            arp_retry_interval: Duration::from_secs(1),
        }
    }
}

/// Link-layer payload handlers, keyed by EtherType.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EtherHandler {
    Arp,
    Ipv4,
}

/// IP payload handlers, keyed by protocol number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpHandler {
    Icmp,
    Udp,
}

/// A network stack instance bound to one link driver and one address pair.
pub struct NetStack<D: LinkDriver> {
    pub(crate) driver: D,
    pub(crate) config: StackConfig,
    pub(crate) ethertypes: Registry<u16, EtherHandler>,
    pub(crate) ip_protocols: Registry<u8, IpHandler>,
    pub(crate) arp_cache: TtlMap<Ipv4Addr, MacAddr>,
    pub(crate) arp_pending: TtlMap<Ipv4Addr, PacketBuf>,
    pub(crate) udp_ports: TtlMap<u16, UdpHandler>,
    ip_ident: u16,
    rx_frame: Box<[u8]>,
}

impl<D: LinkDriver> NetStack<D> {
    /// Bring up a stack on `driver`.
    ///
    /// Registers the protocol handlers and announces our address binding
    /// with a gratuitous ARP request before any traffic flows.
    pub fn new(driver: D, config: StackConfig) -> Result<Self, NetError> {
        let mut stack = NetStack {
            driver,
            ethertypes: Registry::new(),
            ip_protocols: Registry::new(),
            arp_cache: TtlMap::new(ARP_CACHE_CAPACITY, Some(config.arp_cache_ttl)),
            arp_pending: TtlMap::new(ARP_PENDING_CAPACITY, Some(config.arp_retry_interval)),
            udp_ports: TtlMap::new(UDP_PORT_CAPACITY, None),
            ip_ident: 0,
            rx_frame: vec![0u8; config.mtu + ETHERNET_HEADER_LEN].into_boxed_slice(),
            config,
        };

        stack.ethertypes.register(ETHERTYPE_ARP, EtherHandler::Arp);
        stack.ethertypes.register(ETHERTYPE_IPV4, EtherHandler::Ipv4);
        stack.ip_protocols.register(IP_PROTOCOL_ICMP, IpHandler::Icmp);
        stack.ip_protocols.register(IP_PROTOCOL_UDP, IpHandler::Udp);

        info!("stack up: {} / {}", stack.config.mac, stack.config.ip);
        stack.arp_req(config.ip)?;
        Ok(stack)
    }

    /// One receive poll: if the driver has a frame waiting, run it through
    /// the whole pipeline. Returns whether a frame was processed.
    pub fn poll(&mut self) -> Result<bool, NetError> {
        let n = self.driver.recv(&mut self.rx_frame)?;
        if n == 0 {
            return Ok(false);
        }
        let mut buf = PacketBuf::with_payload(&self.rx_frame[..n]);
        self.ethernet_in(&mut buf)?;
        Ok(true)
    }

    pub fn config(&self) -> &StackConfig {
        &self.config
    }

    /// Current ARP binding for `ip`, if learned and not expired.
    pub fn arp_lookup(&mut self, ip: Ipv4Addr) -> Option<MacAddr> {
        self.arp_cache.get(&ip).copied()
    }

    /// Dispatch a link-layer payload by EtherType. Returns whether a
    /// handler was registered for it.
    pub(crate) fn dispatch_ethertype(
        &mut self,
        ethertype: u16,
        buf: &mut PacketBuf,
        src_mac: MacAddr,
    ) -> Result<bool, NetError> {
        match self.ethertypes.lookup(&ethertype).copied() {
            Some(EtherHandler::Arp) => self.arp_in(buf, src_mac).map(|_| true),
            Some(EtherHandler::Ipv4) => self.ip_in(buf, src_mac).map(|_| true),
            None => Ok(false),
        }
    }

    /// Dispatch an IP payload by protocol number. Returns whether a handler
    /// was registered for it.
    pub(crate) fn dispatch_ip_protocol(
        &mut self,
        protocol: u8,
        buf: &mut PacketBuf,
        src_ip: Ipv4Addr,
    ) -> Result<bool, NetError> {
        match self.ip_protocols.lookup(&protocol).copied() {
            Some(IpHandler::Icmp) => self.icmp_in(buf, src_ip).map(|_| true),
            Some(IpHandler::Udp) => self.udp_in(buf, src_ip).map(|_| true),
            None => Ok(false),
        }
    }

    /// Allocate the identifier for one outbound datagram; all of its
    /// fragments share it.
    pub(crate) fn next_ip_ident(&mut self) -> u16 {
        let id = self.ip_ident;
        self.ip_ident = self.ip_ident.wrapping_add(1);
        id
    }
}

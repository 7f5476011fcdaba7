//! Link sender: binds a raw packet socket to an interface, resolves the gateway's MAC via ARP
//! broadcast, and transmits arbitrary IPv4 payloads inside Ethernet II frames addressed to the
//! gateway.

mod arp;
pub mod ethernet;

use std::mem;
use std::net::Ipv4Addr;
use std::os::fd::RawFd;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::config::Config;
use crate::error::{RawNetError, Result};
use crate::host::HostContext;
use crate::types::{ether_type, ip_protocol, MacAddr};

/// A raw `AF_PACKET` socket bound to one interface, with ARP resolution of the gateway's MAC.
///
/// Invariant: `gateway_mac` is populated during construction, before any frame carrying an IPv4
/// payload can be sent.
pub struct LinkSender {
    fd: RawFd,
    local_mac: MacAddr,
    local_ip: Ipv4Addr,
    gateway_ip: Ipv4Addr,
    gateway_mac: MacAddr,
    config: Config,
}

impl LinkSender {
    pub fn new(host: &HostContext, config: Config) -> Result<Self> {
        let fd = open_raw_packet_socket()?;
        let ifindex = interface_index(&host.interface)?;
        set_recv_timeout(fd, Duration::from_millis(10))?;
        bind_to_interface(fd, ifindex)?;

        let mut sender = LinkSender {
            fd,
            local_mac: host.local_mac,
            local_ip: host.local_ip,
            gateway_ip: host.gateway_ip,
            gateway_mac: MacAddr::ZERO,
            config,
        };
        sender.resolve_gateway()?;
        Ok(sender)
    }

    pub fn gateway_mac(&self) -> MacAddr {
        self.gateway_mac
    }

    /// Resolves `gateway_ip`'s MAC address, retrying the ARP request up to
    /// `config.arp_retries` times.
    fn resolve_gateway(&mut self) -> Result<()> {
        for attempt in 1..=self.config.arp_retries {
            debug!(
                "ARP: resolving {} (attempt {attempt}/{})",
                self.gateway_ip, self.config.arp_retries
            );
            self.send_arp_request()?;
            if let Some(mac) = self.recv_arp_reply(self.config.arp_timeout)? {
                info!("ARP: {} is at {}", self.gateway_ip, mac);
                self.gateway_mac = mac;
                return Ok(());
            }
            warn!("ARP: no reply for {} on attempt {attempt}", self.gateway_ip);
        }
        Err(RawNetError::ArpUnresolved {
            gateway: self.gateway_ip.to_string(),
            attempts: self.config.arp_retries,
        })
    }

    fn send_arp_request(&self) -> Result<()> {
        let packet = arp::ArpPacket::request(self.local_mac, self.local_ip, self.gateway_ip).build();
        let frame = ethernet::build_frame(
            MacAddr::BROADCAST,
            self.local_mac,
            ether_type::ARP,
            &packet,
            self.config.link_frame_min_bytes,
        );
        send_raw(self.fd, &frame)
    }

    fn recv_arp_reply(&self, timeout: Duration) -> Result<Option<MacAddr>> {
        let deadline = Instant::now() + timeout;
        let mut buf = [0u8; 1514];
        while Instant::now() < deadline {
            let (n, pkttype) = match recv_raw(self.fd, &mut buf) {
                Ok(v) => v,
                Err(_) => continue,
            };
            if pkttype != libc::PACKET_HOST as u8 {
                continue;
            }
            let Some((eth, rest)) = ethernet::EthernetHeader::parse(&buf[..n]) else {
                continue;
            };
            if eth.ethertype != ether_type::ARP {
                continue;
            }
            let Some(reply) = arp::ArpPacket::parse(rest) else {
                continue;
            };
            if reply.op != arp::OP_REPLY || reply.sender_ip != self.gateway_ip {
                continue;
            }
            return Ok(Some(reply.sender_mac));
        }
        Ok(None)
    }

    /// Sends `data` (an IPv4 datagram) to the gateway inside an Ethernet II frame.
    ///
    /// Fails with `PayloadTooLarge` if `data` cannot fit an Ethernet frame; the IP layer's
    /// fragmentation is responsible for keeping datagrams under this limit.
    pub fn ip_send(&self, data: &[u8]) -> Result<()> {
        const MAX_ETHERNET_PAYLOAD: usize = 1500;
        if data.len() > MAX_ETHERNET_PAYLOAD {
            return Err(RawNetError::PayloadTooLarge { len: data.len() });
        }
        let frame = ethernet::build_frame(
            self.gateway_mac,
            self.local_mac,
            ether_type::IPV4,
            data,
            self.config.link_frame_min_bytes,
        );
        send_raw(self.fd, &frame)
    }
}

impl Drop for LinkSender {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.fd);
        }
    }
}

fn open_raw_packet_socket() -> Result<RawFd> {
    let proto = (ether_type_all() as u16).to_be() as i32;
    let fd = unsafe { libc::socket(libc::AF_PACKET, libc::SOCK_RAW, proto) };
    if fd < 0 {
        return Err(RawNetError::Io(std::io::Error::last_os_error()));
    }
    Ok(fd)
}

/// `ETH_P_ALL`, sent in network byte order per `socket(7)`.
fn ether_type_all() -> u16 {
    0x0003
}

fn interface_index(name: &str) -> Result<i32> {
    let cname = std::ffi::CString::new(name)
        .map_err(|_| RawNetError::InterfaceNotFound(name.to_string()))?;
    let idx = unsafe { libc::if_nametoindex(cname.as_ptr()) };
    if idx == 0 {
        return Err(RawNetError::InterfaceNotFound(name.to_string()));
    }
    Ok(idx as i32)
}

fn bind_to_interface(fd: RawFd, ifindex: i32) -> Result<()> {
    let mut addr: libc::sockaddr_ll = unsafe { mem::zeroed() };
    addr.sll_family = libc::AF_PACKET as u16;
    addr.sll_protocol = (ether_type_all() as u16).to_be();
    addr.sll_ifindex = ifindex;

    let ret = unsafe {
        libc::bind(
            fd,
            &addr as *const libc::sockaddr_ll as *const libc::sockaddr,
            mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t,
        )
    };
    if ret < 0 {
        return Err(RawNetError::Io(std::io::Error::last_os_error()));
    }
    Ok(())
}

fn set_recv_timeout(fd: RawFd, timeout: Duration) -> Result<()> {
    let tv = libc::timeval {
        tv_sec: timeout.as_secs() as libc::time_t,
        tv_usec: timeout.subsec_micros() as libc::suseconds_t,
    };
    let ret = unsafe {
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_RCVTIMEO,
            &tv as *const libc::timeval as *const libc::c_void,
            mem::size_of::<libc::timeval>() as libc::socklen_t,
        )
    };
    if ret < 0 {
        return Err(RawNetError::Io(std::io::Error::last_os_error()));
    }
    Ok(())
}

fn send_raw(fd: RawFd, frame: &[u8]) -> Result<()> {
    let ret = unsafe { libc::send(fd, frame.as_ptr() as *const libc::c_void, frame.len(), 0) };
    if ret < 0 {
        return Err(RawNetError::Io(std::io::Error::last_os_error()));
    }
    Ok(())
}

/// Receives one frame along with its `sockaddr_ll` packet type, so callers can distinguish
/// `PACKET_HOST` (addressed to us) from `PACKET_BROADCAST`/`PACKET_OTHERHOST` traffic the kernel
/// still hands to an `AF_PACKET` socket in promiscuous-adjacent setups.
fn recv_raw(fd: RawFd, buf: &mut [u8]) -> Result<(usize, u8)> {
    let mut addr: libc::sockaddr_ll = unsafe { mem::zeroed() };
    let mut addrlen = mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t;
    let ret = unsafe {
        libc::recvfrom(
            fd,
            buf.as_mut_ptr() as *mut libc::c_void,
            buf.len(),
            0,
            &mut addr as *mut libc::sockaddr_ll as *mut libc::sockaddr,
            &mut addrlen,
        )
    };
    if ret < 0 {
        return Err(RawNetError::Io(std::io::Error::last_os_error()));
    }
    Ok((ret as usize, addr.sll_pkttype))
}

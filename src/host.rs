//! Host-environment discovery: the one external collaborator this binary cannot avoid talking
//! to. Gathered once at startup into an immutable [`HostContext`] instead of the lazy per-call
//! subprocess spawns of the source, per the design notes.

use std::net::Ipv4Addr;
use std::process::Command;

use log::debug;

use crate::error::{RawNetError, Result};
use crate::types::MacAddr;

/// Everything the link layer needs to know about the machine it is running on.
#[derive(Debug, Clone)]
pub struct HostContext {
    pub interface: String,
    pub local_mac: MacAddr,
    pub local_ip: Ipv4Addr,
    pub gateway_ip: Ipv4Addr,
}

impl HostContext {
    /// Discovers the default route, the interface that owns it, and that interface's MAC.
    /// `interface_override` skips route-table interface discovery and binds to the named
    /// interface directly, still discovering its IPv4 address and the default gateway.
    pub fn discover(interface_override: Option<&str>) -> Result<Self> {
        let gateway_ip = default_gateway()?;
        let (interface, local_ip) = match interface_override {
            Some(iface) => (iface.to_string(), local_ipv4_for(iface)?),
            None => default_route_interface()?,
        };
        let local_mac = interface_mac(&interface)?;
        debug!(
            "host context: iface={interface} mac={local_mac} local_ip={local_ip} gateway={gateway_ip}"
        );
        Ok(HostContext {
            interface,
            local_mac,
            local_ip,
            gateway_ip,
        })
    }
}

/// Parses `ip route list 0/0` to find the gateway address of the default route.
///
/// Expected output: `default via 192.168.1.1 dev eth0 ...`.
fn default_gateway() -> Result<Ipv4Addr> {
    let output = Command::new("ip")
        .args(["route", "list", "0/0"])
        .output()?;
    let text = String::from_utf8_lossy(&output.stdout);
    let fields: Vec<&str> = text.split_whitespace().collect();
    let via = fields
        .iter()
        .position(|&w| w == "via")
        .and_then(|i| fields.get(i + 1))
        .ok_or_else(|| RawNetError::InterfaceNotFound("no default route".into()))?;
    via.parse::<Ipv4Addr>()
        .map_err(|_| RawNetError::InterfaceNotFound(format!("unparsable gateway: {via}")))
}

/// Parses `ip route list 0/0` for the outgoing interface name, then `ip -4 addr show <iface>`
/// for that interface's IPv4 address.
fn default_route_interface() -> Result<(String, Ipv4Addr)> {
    let route_output = Command::new("ip")
        .args(["route", "list", "0/0"])
        .output()?;
    let route_text = String::from_utf8_lossy(&route_output.stdout);
    let fields: Vec<&str> = route_text.split_whitespace().collect();
    let iface = fields
        .iter()
        .position(|&w| w == "dev")
        .and_then(|i| fields.get(i + 1))
        .ok_or_else(|| RawNetError::InterfaceNotFound("no default route".into()))?
        .to_string();

    let local_ip = local_ipv4_for(&iface)?;
    Ok((iface, local_ip))
}

/// Parses `ip -4 addr show <ifname>` for that interface's IPv4 address.
fn local_ipv4_for(ifname: &str) -> Result<Ipv4Addr> {
    let addr_output = Command::new("ip")
        .args(["-4", "addr", "show", ifname])
        .output()?;
    let addr_text = String::from_utf8_lossy(&addr_output.stdout);
    for line in addr_text.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("inet ") {
            let cidr = rest.split_whitespace().next().unwrap_or("");
            let ip = cidr.split('/').next().unwrap_or("");
            if let Ok(ip) = ip.parse::<Ipv4Addr>() {
                return Ok(ip);
            }
        }
    }
    Err(RawNetError::InterfaceNotFound(ifname.into()))
}

/// Reads the hardware address of `ifname` via the `SIOCGIFHWADDR` ioctl, the same call the
/// source used through Python's `fcntl`.
fn interface_mac(ifname: &str) -> Result<MacAddr> {
    if ifname.len() >= libc::IFNAMSIZ {
        return Err(RawNetError::InterfaceNotFound(ifname.into()));
    }

    // A throwaway UDP socket is the conventional fd to issue interface ioctls against; it is
    // never bound or connected.
    let fd = unsafe { libc::socket(libc::AF_INET, libc::SOCK_DGRAM, 0) };
    if fd < 0 {
        return Err(RawNetError::Io(std::io::Error::last_os_error()));
    }

    let mut req: libc::ifreq = unsafe { std::mem::zeroed() };
    for (dst, src) in req.ifr_name.iter_mut().zip(ifname.bytes()) {
        *dst = src as libc::c_char;
    }

    let result = unsafe { libc::ioctl(fd, libc::SIOCGIFHWADDR, &mut req) };
    unsafe { libc::close(fd) };
    if result < 0 {
        return Err(RawNetError::Io(std::io::Error::last_os_error()));
    }

    let sa_data = unsafe { req.ifr_ifru.ifru_hwaddr.sa_data };
    let mac = [
        sa_data[0] as u8,
        sa_data[1] as u8,
        sa_data[2] as u8,
        sa_data[3] as u8,
        sa_data[4] as u8,
        sa_data[5] as u8,
    ];
    Ok(MacAddr(mac))
}

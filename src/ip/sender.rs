//! IP sender: fragments a byte payload into IPv4 datagrams and hands each to the link layer.

use std::net::Ipv4Addr;

use rand::Rng;

use crate::config::Config;
use crate::error::Result;
use crate::ip::header::Ipv4Header;
use crate::link::LinkSender;

/// Fragments outgoing TCP segments into IPv4 datagrams. Holds no socket itself — `send` is
/// handed the `LinkSender` to transmit through, so the engine can own the link sender directly
/// instead of threading a self-referential borrow through the TCP engine.
pub struct IpSender {
    local_ip: Ipv4Addr,
    mtu_payload_bytes: usize,
}

impl IpSender {
    pub fn new(local_ip: Ipv4Addr, config: &Config) -> Self {
        debug_assert_eq!(
            config.mtu_payload_bytes % 8,
            0,
            "fragment MTU must be a multiple of 8 so offsets stay valid"
        );
        IpSender {
            local_ip,
            mtu_payload_bytes: config.mtu_payload_bytes,
        }
    }

    /// Fragments `data` into IPv4 datagrams addressed to `dst` and transmits each in turn.
    pub fn send(&self, link: &LinkSender, data: &[u8], dst: Ipv4Addr) -> Result<()> {
        let id: u16 = rand::thread_rng().gen();
        let mut start = 0;
        while start < data.len() {
            let end = (start + self.mtu_payload_bytes).min(data.len());
            let fragment = &data[start..end];
            let more = end < data.len();

            let header = Ipv4Header::build(
                id,
                more,
                (start / 8) as u16,
                fragment.len(),
                self.local_ip,
                dst,
            );
            let mut datagram = header.to_vec();
            datagram.extend_from_slice(fragment);
            link.ip_send(&datagram)?;

            start = end;
        }
        Ok(())
    }
}

//! ARP request/reply construction and parsing (htype=1/Ethernet, ptype=0x0800/IPv4, 28 bytes).

use std::net::Ipv4Addr;

use crate::types::MacAddr;

pub const LEN: usize = 28;
const HTYPE_ETHERNET: u16 = 1;
const PTYPE_IPV4: u16 = 0x0800;
const HLEN: u8 = 6;
const PLEN: u8 = 4;

pub const OP_REQUEST: u16 = 1;
pub const OP_REPLY: u16 = 2;

#[derive(Debug, Clone, Copy)]
pub struct ArpPacket {
    pub op: u16,
    pub sender_mac: MacAddr,
    pub sender_ip: Ipv4Addr,
    pub target_mac: MacAddr,
    pub target_ip: Ipv4Addr,
}

impl ArpPacket {
    pub fn request(sender_mac: MacAddr, sender_ip: Ipv4Addr, target_ip: Ipv4Addr) -> Self {
        ArpPacket {
            op: OP_REQUEST,
            sender_mac,
            sender_ip,
            target_mac: MacAddr::ZERO,
            target_ip,
        }
    }

    pub fn build(&self) -> [u8; LEN] {
        let mut buf = [0u8; LEN];
        buf[0..2].copy_from_slice(&HTYPE_ETHERNET.to_be_bytes());
        buf[2..4].copy_from_slice(&PTYPE_IPV4.to_be_bytes());
        buf[4] = HLEN;
        buf[5] = PLEN;
        buf[6..8].copy_from_slice(&self.op.to_be_bytes());
        buf[8..14].copy_from_slice(&self.sender_mac.octets());
        buf[14..18].copy_from_slice(&self.sender_ip.octets());
        buf[18..24].copy_from_slice(&self.target_mac.octets());
        buf[24..28].copy_from_slice(&self.target_ip.octets());
        buf
    }

    /// Parses an ARP packet, rejecting anything that is not Ethernet/IPv4.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < LEN {
            return None;
        }
        let htype = u16::from_be_bytes([bytes[0], bytes[1]]);
        let ptype = u16::from_be_bytes([bytes[2], bytes[3]]);
        if htype != HTYPE_ETHERNET || ptype != PTYPE_IPV4 {
            return None;
        }
        if bytes[4] != HLEN || bytes[5] != PLEN {
            return None;
        }
        let op = u16::from_be_bytes([bytes[6], bytes[7]]);
        let sender_mac = MacAddr([bytes[8], bytes[9], bytes[10], bytes[11], bytes[12], bytes[13]]);
        let sender_ip = Ipv4Addr::new(bytes[14], bytes[15], bytes[16], bytes[17]);
        let target_mac = MacAddr([bytes[18], bytes[19], bytes[20], bytes[21], bytes[22], bytes[23]]);
        let target_ip = Ipv4Addr::new(bytes[24], bytes[25], bytes[26], bytes[27]);
        Some(ArpPacket {
            op,
            sender_mac,
            sender_ip,
            target_mac,
            target_ip,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::ethernet;
    use crate::types::ether_type;

    /// S4: ARP request frame is exactly 60 bytes, broadcast destination, correct ethertype and
    /// ARP layout.
    #[test]
    fn s4_boundary_arp_request_frame() {
        let sender_mac = MacAddr::new(0xde, 0xad, 0xbe, 0xef, 0x00, 0x01);
        let sender_ip = Ipv4Addr::new(192, 168, 1, 50);
        let gateway_ip = Ipv4Addr::new(192, 168, 1, 1);

        let arp = ArpPacket::request(sender_mac, sender_ip, gateway_ip).build();
        let frame = ethernet::build_frame(MacAddr::BROADCAST, sender_mac, ether_type::ARP, &arp, 60);

        assert_eq!(frame.len(), 60);
        assert_eq!(&frame[0..6], &[0xFF; 6]);
        assert_eq!(&frame[12..14], &[0x08, 0x06]);

        let parsed = ArpPacket::parse(&frame[14..42]).unwrap();
        assert_eq!(parsed.op, OP_REQUEST);
        assert_eq!(parsed.sender_mac, sender_mac);
        assert_eq!(parsed.sender_ip, sender_ip);
        assert_eq!(parsed.target_ip, gateway_ip);
    }

    #[test]
    fn build_then_parse_round_trips() {
        let sender_mac = MacAddr::new(1, 2, 3, 4, 5, 6);
        let reply = ArpPacket {
            op: OP_REPLY,
            sender_mac,
            sender_ip: Ipv4Addr::new(10, 0, 0, 1),
            target_mac: MacAddr::new(6, 5, 4, 3, 2, 1),
            target_ip: Ipv4Addr::new(10, 0, 0, 2),
        };
        let bytes = reply.build();
        let parsed = ArpPacket::parse(&bytes).unwrap();
        assert_eq!(parsed.op, OP_REPLY);
        assert_eq!(parsed.sender_mac, sender_mac);
    }
}

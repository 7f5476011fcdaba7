//! IPv4 header build/parse: standard 20-byte header, no options.

use std::net::Ipv4Addr;

use crate::checksum;
use crate::types::ip_protocol;

pub const HEADER_LEN: usize = 20;
const MORE_FRAGMENTS_BIT: u16 = 1 << 13;
const FRAGMENT_OFFSET_MASK: u16 = (1 << 13) - 1;

#[derive(Debug, Clone, Copy)]
pub struct Ipv4Header {
    pub id: u16,
    pub more_fragments: bool,
    pub fragment_offset_units: u16,
    pub total_length: u16,
    pub protocol: u8,
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
}

impl Ipv4Header {
    /// Builds a 20-byte IPv4 header with a correct checksum for `payload_len` bytes of payload
    /// that will follow it.
    pub fn build(
        id: u16,
        more_fragments: bool,
        fragment_offset_units: u16,
        payload_len: usize,
        src: Ipv4Addr,
        dst: Ipv4Addr,
    ) -> [u8; HEADER_LEN] {
        let total_length = (HEADER_LEN + payload_len) as u16;
        let mut flags_offset = fragment_offset_units & FRAGMENT_OFFSET_MASK;
        if more_fragments {
            flags_offset |= MORE_FRAGMENTS_BIT;
        }

        let header_with_zero_checksum =
            raw_header(total_length, id, flags_offset, ip_protocol::TCP, 0, src, dst);
        let cksum = checksum::checksum(&header_with_zero_checksum);
        raw_header(
            total_length,
            id,
            flags_offset,
            ip_protocol::TCP,
            u16::from_be_bytes(cksum),
            src,
            dst,
        )
    }

    /// Parses and validates a 20-byte IPv4 header (no options supported), returning the header
    /// and the remaining datagram bytes. Rejects bad version, short IHL, bad checksum, or a
    /// Total Length field that disagrees with the actual datagram length.
    pub fn parse(datagram: &[u8]) -> Option<(Self, &[u8])> {
        if datagram.len() < HEADER_LEN {
            return None;
        }
        let version_ihl = datagram[0];
        let version = version_ihl >> 4;
        let ihl = (version_ihl & 0x0f) as usize;
        if version != 4 || ihl < 5 {
            return None;
        }
        let header_len = ihl * 4;
        if datagram.len() < header_len {
            return None;
        }
        if !checksum::verify(&datagram[..header_len]) {
            return None;
        }

        let total_length = u16::from_be_bytes([datagram[2], datagram[3]]);
        if total_length as usize != datagram.len() {
            return None;
        }

        let id = u16::from_be_bytes([datagram[4], datagram[5]]);
        let flags_offset = u16::from_be_bytes([datagram[6], datagram[7]]);
        let more_fragments = flags_offset & MORE_FRAGMENTS_BIT != 0;
        let fragment_offset_units = flags_offset & FRAGMENT_OFFSET_MASK;
        let protocol = datagram[9];
        let src = Ipv4Addr::new(datagram[12], datagram[13], datagram[14], datagram[15]);
        let dst = Ipv4Addr::new(datagram[16], datagram[17], datagram[18], datagram[19]);

        Some((
            Ipv4Header {
                id,
                more_fragments,
                fragment_offset_units,
                total_length,
                protocol,
                src,
                dst,
            },
            &datagram[header_len..],
        ))
    }
}

#[allow(clippy::too_many_arguments)]
fn raw_header(
    total_length: u16,
    id: u16,
    flags_offset: u16,
    protocol: u8,
    checksum_field: u16,
    src: Ipv4Addr,
    dst: Ipv4Addr,
) -> [u8; HEADER_LEN] {
    let mut buf = [0u8; HEADER_LEN];
    buf[0] = (4 << 4) | 5; // version=4, IHL=5
    buf[1] = 0; // TOS
    buf[2..4].copy_from_slice(&total_length.to_be_bytes());
    buf[4..6].copy_from_slice(&id.to_be_bytes());
    buf[6..8].copy_from_slice(&flags_offset.to_be_bytes());
    buf[8] = 64; // TTL
    buf[9] = protocol;
    buf[10..12].copy_from_slice(&checksum_field.to_be_bytes());
    buf[12..16].copy_from_slice(&src.octets());
    buf[16..20].copy_from_slice(&dst.octets());
    buf
}

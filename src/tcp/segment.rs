//! TCP segment header build/parse: standard 20-byte header, no options, canonical 9-bit flags
//! layout.
//!
//! The original implementation this crate is derived from packed only 6 flag bits into the low
//! half of one byte, which is not wire-conformant. This rewrite uses the canonical layout
//! (3 reserved bits, then NS/CWR/ECE/URG/ACK/PSH/RST/SYN/FIN) and always keeps NS/CWR/ECE clear.

use std::net::Ipv4Addr;

use bitflags::bitflags;

use crate::checksum;
use crate::types::ip_protocol;

pub const HEADER_LEN: usize = 20;

bitflags! {
    /// TCP control bits, canonical layout. Only the low six bits are ever set by this crate.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TcpFlags: u16 {
        const FIN = 0b0000_0001;
        const SYN = 0b0000_0010;
        const RST = 0b0000_0100;
        const PSH = 0b0000_1000;
        const ACK = 0b0001_0000;
        const URG = 0b0010_0000;
        const ECE = 0b0100_0000;
        const CWR = 0b1000_0000;
        const NS  = 0b1_0000_0000;
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TcpHeader {
    pub src_port: u16,
    pub dst_port: u16,
    pub seq: u32,
    pub ack: u32,
    pub flags: TcpFlags,
    pub window: u16,
}

impl TcpHeader {
    /// Builds a full TCP segment (header + payload) with a correct checksum computed over the
    /// pseudo-header, this header, and `payload`.
    pub fn build_segment(
        src_port: u16,
        dst_port: u16,
        seq: u32,
        ack: u32,
        flags: TcpFlags,
        window: u16,
        src_ip: Ipv4Addr,
        dst_ip: Ipv4Addr,
        payload: &[u8],
    ) -> Vec<u8> {
        let header_zero_checksum = raw_header(src_port, dst_port, seq, ack, flags, window, 0);
        let pseudo = pseudo_header(src_ip, dst_ip, (HEADER_LEN + payload.len()) as u16);

        let mut covered = pseudo;
        covered.extend_from_slice(&header_zero_checksum);
        covered.extend_from_slice(payload);
        let cksum = checksum::checksum(&covered);

        let header = raw_header(src_port, dst_port, seq, ack, flags, window, u16::from_be_bytes(cksum));
        let mut segment = header.to_vec();
        segment.extend_from_slice(payload);
        segment
    }

    /// Parses a TCP segment, verifying its checksum against the pseudo-header built from
    /// `src_ip`/`dst_ip`. Returns the header and the payload slice.
    pub fn parse(segment: &[u8], src_ip: Ipv4Addr, dst_ip: Ipv4Addr) -> Option<(Self, &[u8])> {
        if segment.len() < HEADER_LEN {
            return None;
        }
        let data_offset = ((segment[12] >> 4) as usize) * 4;
        if data_offset < HEADER_LEN || segment.len() < data_offset {
            return None;
        }

        let pseudo = pseudo_header(src_ip, dst_ip, segment.len() as u16);
        let mut covered = pseudo;
        covered.extend_from_slice(segment);
        if !checksum::verify(&covered) {
            return None;
        }

        let src_port = u16::from_be_bytes([segment[0], segment[1]]);
        let dst_port = u16::from_be_bytes([segment[2], segment[3]]);
        let seq = u32::from_be_bytes([segment[4], segment[5], segment[6], segment[7]]);
        let ack = u32::from_be_bytes([segment[8], segment[9], segment[10], segment[11]]);
        let flag_bits = u16::from_be_bytes([segment[12] & 0x01, segment[13]]);
        let flags = TcpFlags::from_bits_truncate(flag_bits);
        let window = u16::from_be_bytes([segment[14], segment[15]]);

        Some((
            TcpHeader {
                src_port,
                dst_port,
                seq,
                ack,
                flags,
                window,
            },
            &segment[data_offset..],
        ))
    }
}

fn raw_header(
    src_port: u16,
    dst_port: u16,
    seq: u32,
    ack: u32,
    flags: TcpFlags,
    window: u16,
    checksum_field: u16,
) -> [u8; HEADER_LEN] {
    let mut buf = [0u8; HEADER_LEN];
    buf[0..2].copy_from_slice(&src_port.to_be_bytes());
    buf[2..4].copy_from_slice(&dst_port.to_be_bytes());
    buf[4..8].copy_from_slice(&seq.to_be_bytes());
    buf[8..12].copy_from_slice(&ack.to_be_bytes());
    let data_offset_and_ns = (5u8 << 4) | (if flags.contains(TcpFlags::NS) { 1 } else { 0 });
    buf[12] = data_offset_and_ns;
    buf[13] = (flags.bits() & 0x00FF) as u8;
    buf[14..16].copy_from_slice(&window.to_be_bytes());
    buf[16..18].copy_from_slice(&checksum_field.to_be_bytes());
    buf[18..20].copy_from_slice(&0u16.to_be_bytes()); // urgent pointer
    buf
}

fn pseudo_header(src: Ipv4Addr, dst: Ipv4Addr, tcp_length: u16) -> Vec<u8> {
    let mut buf = Vec::with_capacity(12);
    buf.extend_from_slice(&src.octets());
    buf.extend_from_slice(&dst.octets());
    buf.push(0);
    buf.push(ip_protocol::TCP);
    buf.extend_from_slice(&tcp_length.to_be_bytes());
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_then_parse_round_trips() {
        let src_ip = Ipv4Addr::new(192, 168, 1, 50);
        let dst_ip = Ipv4Addr::new(93, 184, 216, 34);
        let payload = b"GET / HTTP/1.1\r\n\r\n";

        let segment = TcpHeader::build_segment(
            12345,
            80,
            1000,
            2000,
            TcpFlags::ACK | TcpFlags::PSH,
            65535,
            src_ip,
            dst_ip,
            payload,
        );

        let (header, data) = TcpHeader::parse(&segment, src_ip, dst_ip).unwrap();
        assert_eq!(header.src_port, 12345);
        assert_eq!(header.dst_port, 80);
        assert_eq!(header.seq, 1000);
        assert_eq!(header.ack, 2000);
        assert_eq!(header.flags, TcpFlags::ACK | TcpFlags::PSH);
        assert_eq!(data, payload);
    }

    #[test]
    fn syn_flag_round_trips() {
        let src_ip = Ipv4Addr::new(10, 0, 0, 1);
        let dst_ip = Ipv4Addr::new(10, 0, 0, 2);
        let segment =
            TcpHeader::build_segment(1, 2, 0, 0, TcpFlags::SYN, 65535, src_ip, dst_ip, &[]);
        let (header, data) = TcpHeader::parse(&segment, src_ip, dst_ip).unwrap();
        assert_eq!(header.flags, TcpFlags::SYN);
        assert!(data.is_empty());
    }

    #[test]
    fn corrupted_checksum_is_rejected() {
        let src_ip = Ipv4Addr::new(10, 0, 0, 1);
        let dst_ip = Ipv4Addr::new(10, 0, 0, 2);
        let mut segment =
            TcpHeader::build_segment(1, 2, 0, 0, TcpFlags::SYN, 65535, src_ip, dst_ip, &[]);
        segment[0] ^= 0xFF;
        assert!(TcpHeader::parse(&segment, src_ip, dst_ip).is_none());
    }
}

//! Ethernet II framing: 6-byte destination, 6-byte source, 2-byte ethertype, no preamble, no FCS
//! (the kernel or NIC appends the latter).

use crate::types::MacAddr;

pub const HEADER_LEN: usize = 14;

#[derive(Debug, Clone, Copy)]
pub struct EthernetHeader {
    pub dst: MacAddr,
    pub src: MacAddr,
    pub ethertype: u16,
}

impl EthernetHeader {
    pub fn parse(bytes: &[u8]) -> Option<(Self, &[u8])> {
        if bytes.len() < HEADER_LEN {
            return None;
        }
        let dst = MacAddr([
            bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5],
        ]);
        let src = MacAddr([
            bytes[6], bytes[7], bytes[8], bytes[9], bytes[10], bytes[11],
        ]);
        let ethertype = u16::from_be_bytes([bytes[12], bytes[13]]);
        Some((
            EthernetHeader {
                dst,
                src,
                ethertype,
            },
            &bytes[HEADER_LEN..],
        ))
    }
}

/// Builds a full Ethernet II frame carrying `payload`, zero-padded up to `min_len` bytes.
pub fn build_frame(dst: MacAddr, src: MacAddr, ethertype: u16, payload: &[u8], min_len: usize) -> Vec<u8> {
    let mut frame = Vec::with_capacity(min_len.max(HEADER_LEN + payload.len()));
    frame.extend_from_slice(&dst.octets());
    frame.extend_from_slice(&src.octets());
    frame.extend_from_slice(&ethertype.to_be_bytes());
    frame.extend_from_slice(payload);
    if frame.len() < min_len {
        frame.resize(min_len, 0);
    }
    frame
}

//! IP receiver: a raw IPv4/TCP socket plus fragment reassembly.

use std::collections::{HashMap, VecDeque};
use std::mem;
use std::net::Ipv4Addr;
use std::os::fd::RawFd;
use std::time::{Duration, Instant};

use log::{trace, warn};

use crate::config::Config;
use crate::error::{RawNetError, Result};
use crate::ip::header::Ipv4Header;
use crate::types::ip_protocol;

/// Reassembly state for one IP identification value.
///
/// Invariant: the slot is complete iff `total_length` is `Some` and the fragments, sorted by
/// offset, cover `[0, total_length)` with no gaps and no overlap.
#[derive(Default)]
pub struct ReassemblySlot {
    total_length: Option<usize>,
    fragments: Vec<(usize, Vec<u8>)>,
}

impl ReassemblySlot {
    /// Records one fragment at `offset_bytes`; `more` is the IPv4 MF flag (clear on the last
    /// fragment, which also fixes the slot's total length).
    pub fn insert(&mut self, more: bool, offset_bytes: usize, data: &[u8]) {
        self.fragments.push((offset_bytes, data.to_vec()));
        if !more {
            self.total_length = Some(offset_bytes + data.len());
        }
    }

    /// `Some(payload)` iff the last fragment has arrived and the fragments, sorted by offset,
    /// cover `[0, total_length)` with no gap and no overlap.
    pub fn assembled(&self) -> Option<Vec<u8>> {
        let total_length = self.total_length?;
        let mut sorted = self.fragments.clone();
        sorted.sort_by_key(|(offset, _)| *offset);
        let mut covered = 0usize;
        for (offset, data) in &sorted {
            if *offset != covered {
                return None; // gap or overlap
            }
            covered += data.len();
        }
        if covered != total_length {
            return None;
        }
        let mut out = Vec::with_capacity(total_length);
        for (_, data) in sorted {
            out.extend_from_slice(&data);
        }
        Some(out)
    }
}

pub struct IpReceiver {
    fd: RawFd,
    local_ip: Ipv4Addr,
    slots: HashMap<u16, ReassemblySlot>,
    ready: VecDeque<Vec<u8>>,
    last_recv: Instant,
    stall_timeout: Duration,
}

impl IpReceiver {
    pub fn new(local_ip: Ipv4Addr, config: &Config) -> Result<Self> {
        let fd = open_raw_tcp_socket()?;
        set_recv_timeout(fd, Duration::from_micros(100))?;
        Ok(IpReceiver {
            fd,
            local_ip,
            slots: HashMap::new(),
            ready: VecDeque::new(),
            last_recv: Instant::now(),
            stall_timeout: config.stall_timeout,
        })
    }

    /// Pumps the raw socket for up to `timeout`, reassembling complete datagrams into the ready
    /// queue. Returns an error only for the fatal stall condition; bad packets are dropped
    /// silently.
    pub fn recv(&mut self, expected_src: Ipv4Addr, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let mut buf = [0u8; 65535];
        loop {
            if Instant::now() >= deadline {
                return Ok(());
            }
            let n = match recv_raw(self.fd, &mut buf) {
                Ok(n) => n,
                Err(_) => continue,
            };

            if self.last_recv.elapsed() > self.stall_timeout {
                return Err(RawNetError::ConnectionStalled(self.stall_timeout));
            }

            let Some((header, data)) = Ipv4Header::parse(&buf[..n]) else {
                trace!("IP: dropping malformed datagram");
                continue;
            };
            if header.protocol != ip_protocol::TCP {
                continue;
            }
            if header.src != expected_src || header.dst != self.local_ip {
                continue;
            }

            self.last_recv = Instant::now();
            self.consume(header.id, header.more_fragments, header.fragment_offset_units, data);
        }
    }

    fn consume(&mut self, id: u16, more: bool, offset_units: u16, data: &[u8]) {
        let offset_bytes = offset_units as usize * 8;
        let slot = self.slots.entry(id).or_default();
        slot.insert(more, offset_bytes, data);
        if let Some(assembled) = slot.assembled() {
            self.ready.push_back(assembled);
            self.slots.remove(&id);
        }
    }

    /// Pops one fully reassembled TCP-bearing payload, if any are ready.
    pub fn pop_ready(&mut self) -> Option<Vec<u8>> {
        self.ready.pop_front()
    }
}

impl Drop for IpReceiver {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.fd);
        }
        if !self.slots.is_empty() {
            warn!("IP: dropping {} incomplete reassembly slot(s)", self.slots.len());
        }
    }
}

fn open_raw_tcp_socket() -> Result<RawFd> {
    let fd = unsafe { libc::socket(libc::AF_INET, libc::SOCK_RAW, libc::IPPROTO_TCP) };
    if fd < 0 {
        return Err(RawNetError::Io(std::io::Error::last_os_error()));
    }
    Ok(fd)
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

fn recv_raw(fd: RawFd, buf: &mut [u8]) -> Result<usize> {
    let ret = unsafe { libc::recv(fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len(), 0) };
    if ret < 0 {
        return Err(RawNetError::Io(std::io::Error::last_os_error()));
    }
    Ok(ret as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(offset_bytes: usize, data: &[u8], more: bool) -> (bool, usize, Vec<u8>) {
        (more, offset_bytes, data.to_vec())
    }

    /// S3: 2000-byte payload at MTU 800 reassembles correctly regardless of arrival order.
    #[test]
    fn s3_boundary_fragment_reassembly_out_of_order() {
        let payload: Vec<u8> = (0..2000u32).map(|i| (i % 251) as u8).collect();
        let frags = [
            fragment(0, &payload[0..800], true),
            fragment(800, &payload[800..1600], true),
            fragment(1600, &payload[1600..2000], false),
        ];

        let mut slot = ReassemblySlot::default();
        // deliver third, then first, then second
        for idx in [2, 0, 1] {
            let (more, offset, data) = &frags[idx];
            slot.insert(*more, *offset, data);
        }

        let assembled = slot.assembled().expect("slot should be complete");
        assert_eq!(assembled, payload);
    }

    #[test]
    fn incomplete_slot_is_not_assembled() {
        let mut slot = ReassemblySlot::default();
        slot.insert(true, 0, &[1, 2, 3]);
        assert!(slot.assembled().is_none());
    }

    #[test]
    fn gap_is_rejected() {
        let mut slot = ReassemblySlot::default();
        slot.insert(true, 0, &[1, 2, 3]);
        slot.insert(false, 10, &[4, 5, 6]); // gap between byte 3 and byte 10
        assert!(slot.assembled().is_none());
    }
}

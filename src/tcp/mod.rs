//! TCP engine: three-way handshake, sequence/ACK bookkeeping with 32-bit wrap-around, in-order
//! reassembly, AIMD congestion window, retransmission, and FIN-based teardown.

pub mod segment;
pub mod send_buffer;
pub mod seq;

use std::collections::{HashMap, VecDeque};
use std::net::Ipv4Addr;
use std::time::Duration;

use log::{debug, info, trace, warn};
use rand::Rng;

use crate::config::Config;
use crate::error::{RawNetError, Result};
use crate::host::HostContext;
use crate::ip::{IpReceiver, IpSender};
use crate::link::LinkSender;
use segment::{TcpFlags, TcpHeader};
use send_buffer::{SendBuffer, SentSegment};

/// Seam between the engine and the IP layer. Production code drives [`RealTransport`]; tests
/// substitute an in-memory scripted-peer transport (see `tests/tcp_engine.rs`) so invariants 5
/// and 6 can be checked without raw sockets.
pub trait Transport {
    fn send(&mut self, bytes: &[u8]) -> Result<()>;
    fn recv(&mut self, timeout: Duration) -> Result<Vec<Vec<u8>>>;
}

/// The real transport: link sender + IP fragmentation/reassembly over raw sockets.
pub struct RealTransport {
    link: LinkSender,
    ip_sender: IpSender,
    ip_receiver: IpReceiver,
    remote_ip: Ipv4Addr,
}

impl RealTransport {
    pub fn new(host: &HostContext, remote_ip: Ipv4Addr, config: &Config) -> Result<Self> {
        let link = LinkSender::new(host, config.clone())?;
        let ip_sender = IpSender::new(host.local_ip, config);
        let ip_receiver = IpReceiver::new(host.local_ip, config)?;
        Ok(RealTransport {
            link,
            ip_sender,
            ip_receiver,
            remote_ip,
        })
    }
}

impl Transport for RealTransport {
    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.ip_sender.send(&self.link, bytes, self.remote_ip)
    }

    fn recv(&mut self, timeout: Duration) -> Result<Vec<Vec<u8>>> {
        self.ip_receiver.recv(self.remote_ip, timeout)?;
        let mut out = Vec::new();
        while let Some(datagram) = self.ip_receiver.pop_ready() {
            out.push(datagram);
        }
        Ok(out)
    }
}

/// One incoming segment buffered for in-order delivery: its lifted ACK number (meaningful only
/// if the ACK flag is set), flags, and payload.
struct PendingSegment {
    ack: u64,
    flags: TcpFlags,
    payload: Vec<u8>,
}

pub struct TcpEngine<T: Transport> {
    transport: T,
    config: Config,
    local_ip: Ipv4Addr,
    remote_ip: Ipv4Addr,
    local_port: u16,
    remote_port: u16,

    my_seq: u64,
    my_ack: u64,
    server_seq: u64,
    server_ack: u64,
    my_fin_sent: bool,
    server_fin_seen: bool,
    cwnd: u32,
    next_ack: u64,

    send_buf: SendBuffer,
    recv_buf: HashMap<u64, PendingSegment>,
}

impl<T: Transport> TcpEngine<T> {
    pub fn new(
        transport: T,
        config: Config,
        local_ip: Ipv4Addr,
        remote_ip: Ipv4Addr,
        remote_port: u16,
    ) -> Self {
        let local_port = rand::thread_rng().gen_range(5000..=65535);
        let retransmit_threshold = config.retransmit_threshold;
        let cwnd_initial = config.cwnd_initial;
        TcpEngine {
            transport,
            config,
            local_ip,
            remote_ip,
            local_port,
            remote_port,
            my_seq: 0,
            my_ack: 0,
            server_seq: 0,
            server_ack: 0,
            my_fin_sent: false,
            server_fin_seen: false,
            cwnd: cwnd_initial,
            next_ack: 0,
            send_buf: SendBuffer::new(retransmit_threshold),
            recv_buf: HashMap::new(),
        }
    }

    fn send_segment(&mut self, flags: TcpFlags, seq: u64, ack: u64, payload: &[u8]) -> Result<()> {
        let segment = TcpHeader::build_segment(
            self.local_port,
            self.remote_port,
            seq as u32,
            ack as u32,
            flags,
            self.config.recv_window,
            self.local_ip,
            self.remote_ip,
            payload,
        );
        self.transport.send(&segment)
    }

    fn parse_incoming<'a>(&self, bytes: &'a [u8]) -> Option<(TcpHeader, &'a [u8])> {
        TcpHeader::parse(bytes, self.remote_ip, self.local_ip)
    }

    /// Our next unsent sequence number.
    pub fn my_seq(&self) -> u64 {
        self.my_seq
    }

    /// The peer's next expected sequence number, as last observed.
    pub fn server_seq(&self) -> u64 {
        self.server_seq
    }

    /// The ack number we have last announced to the peer.
    pub fn my_ack(&self) -> u64 {
        self.my_ack
    }

    /// Performs the three-way handshake, retrying the SYN up to `config.handshake_retries`
    /// times.
    pub fn connect(&mut self) -> Result<()> {
        self.my_seq = rand::thread_rng().gen::<u32>() as u64;
        self.my_ack = 0;

        for attempt in 1..=self.config.handshake_retries {
            debug!(
                "TCP: sending SYN to {}:{} (attempt {attempt}/{})",
                self.remote_ip, self.remote_port, self.config.handshake_retries
            );
            self.send_segment(TcpFlags::SYN, self.my_seq, 0, &[])?;

            if self.await_syn_ack()? {
                self.send_segment(TcpFlags::ACK, self.my_seq, self.my_ack, &[])?;
                info!(
                    "TCP: handshake with {}:{} complete (my_seq={} server_seq={})",
                    self.remote_ip, self.remote_port, self.my_seq, self.server_seq
                );
                return Ok(());
            }
            warn!("TCP: handshake attempt {attempt} timed out");
        }

        Err(RawNetError::HandshakeFailed {
            peer: format!("{}:{}", self.remote_ip, self.remote_port),
            attempts: self.config.handshake_retries,
        })
    }

    fn await_syn_ack(&mut self) -> Result<bool> {
        let deadline = std::time::Instant::now() + self.config.handshake_timeout;
        while std::time::Instant::now() < deadline {
            let remaining = deadline.saturating_duration_since(std::time::Instant::now());
            let slice = remaining.min(Duration::from_millis(50));
            for bytes in self.transport.recv(slice)? {
                let Some((header, _)) = self.parse_incoming(&bytes) else {
                    continue;
                };
                if header.src_port != self.remote_port || header.dst_port != self.local_port {
                    continue;
                }
                if !header.flags.contains(TcpFlags::SYN) || !header.flags.contains(TcpFlags::ACK) {
                    continue;
                }
                if header.ack as u64 != (self.my_seq + 1) & 0xFFFF_FFFF {
                    continue;
                }
                self.server_seq = header.seq as u64 + 1;
                self.my_ack = self.server_seq;
                self.my_seq += 1;
                self.next_ack = self.server_seq;
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn done(&self, pending_sends: &VecDeque<Vec<u8>>) -> bool {
        self.my_fin_sent
            && self.server_fin_seen
            && self.my_ack >= self.next_ack
            && pending_sends.is_empty()
            && self.send_buf.size() == 0
    }

    /// Connects, sends `request`, and returns the concatenated, in-order bytes the peer sent
    /// back before both sides closed.
    pub fn fetch(&mut self, request: &[u8]) -> Result<Vec<u8>> {
        self.connect()?;

        let mut pending_sends: VecDeque<Vec<u8>> = request
            .chunks(self.config.mtu_payload_bytes.max(1))
            .map(|c| c.to_vec())
            .collect();
        let mut result = Vec::new();

        while !self.done(&pending_sends) {
            self.transmit_phase(&mut pending_sends)?;
            self.fin_phase(&pending_sends)?;
            self.retransmit_phase()?;
            self.receive_phase(&mut result)?;
        }

        info!("TCP: connection to {} closed, {} bytes received", self.remote_ip, result.len());
        Ok(result)
    }

    fn transmit_phase(&mut self, pending_sends: &mut VecDeque<Vec<u8>>) -> Result<()> {
        while !pending_sends.is_empty() && self.send_buf.size() < self.cwnd as usize {
            let payload = pending_sends.pop_front().unwrap();
            self.send_segment(TcpFlags::ACK, self.my_seq, self.my_ack, &payload)?;
            if !payload.is_empty() {
                let expected_ack = self.my_seq + payload.len() as u64;
                self.send_buf.push(
                    expected_ack,
                    SentSegment {
                        seq: self.my_seq,
                        payload: payload.clone(),
                        flags: TcpFlags::ACK,
                    },
                );
                self.my_seq += payload.len() as u64;
            }
        }

        if self.my_ack < self.next_ack {
            self.send_segment(TcpFlags::ACK, self.my_seq, self.next_ack, &[])?;
            self.my_ack = self.next_ack;
        }
        Ok(())
    }

    fn fin_phase(&mut self, pending_sends: &VecDeque<Vec<u8>>) -> Result<()> {
        if pending_sends.is_empty() && !self.my_fin_sent {
            let flags = TcpFlags::FIN | TcpFlags::ACK;
            self.send_segment(flags, self.my_seq, self.my_ack, &[])?;
            self.send_buf.push(
                self.my_seq + 1,
                SentSegment {
                    seq: self.my_seq,
                    payload: vec![],
                    flags,
                },
            );
            self.my_seq += 1;
            self.my_fin_sent = true;
            debug!("TCP: FIN sent, my_seq now {}", self.my_seq);
        }
        Ok(())
    }

    fn retransmit_phase(&mut self) -> Result<()> {
        loop {
            let both_fins_pending_drain =
                self.my_fin_sent && self.server_fin_seen && self.send_buf.size() > 0;
            if !self.send_buf.should_send() && !both_fins_pending_drain {
                break;
            }
            let Some((expected_ack, seg)) = self.send_buf.get() else {
                break;
            };
            if self.server_ack >= expected_ack {
                self.send_buf.confirm(expected_ack);
                continue;
            }
            self.cwnd = self.config.cwnd_initial;
            trace!("TCP: retransmitting seq={} ({} bytes)", seg.seq, seg.payload.len());
            self.send_segment(seg.flags, seg.seq, self.my_ack, &seg.payload)?;
        }
        Ok(())
    }

    fn receive_phase(&mut self, result: &mut Vec<u8>) -> Result<()> {
        for bytes in self.transport.recv(self.config.recv_slice)? {
            let Some((header, payload)) = self.parse_incoming(&bytes) else {
                trace!("TCP: dropping unparseable segment");
                continue;
            };
            if header.src_port != self.remote_port || header.dst_port != self.local_port {
                continue;
            }

            let seq = seq::lift(header.seq, self.server_seq);
            if seq >= self.server_seq {
                let ack = seq::lift(header.ack, self.server_ack);
                self.recv_buf.insert(
                    seq,
                    PendingSegment {
                        ack,
                        flags: header.flags,
                        payload: payload.to_vec(),
                    },
                );
            } else {
                // Duplicate retransmission of data already consumed: nudge ourselves to
                // re-announce our ACK on the next transmit phase.
                self.my_ack = self.my_ack.saturating_sub(1);
            }
        }

        while let Some(seg) = self.recv_buf.remove(&self.server_seq) {
            if !seg.payload.is_empty() {
                result.extend_from_slice(&seg.payload);
            }
            self.server_seq += seg.payload.len() as u64;

            if seg.flags.contains(TcpFlags::ACK) {
                self.server_ack = self.server_ack.max(seg.ack);
                self.send_buf.confirm(seg.ack);
                self.cwnd = (self.cwnd + 1).min(self.config.cwnd_max);
            }
            if seg.flags.contains(TcpFlags::FIN) {
                self.server_seq += 1;
                self.server_fin_seen = true;
                debug!("TCP: FIN seen from peer, server_seq now {}", self.server_seq);
            }
            self.next_ack = self.next_ack.max(self.server_seq);
        }
        Ok(())
    }
}

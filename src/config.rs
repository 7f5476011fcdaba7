use std::time::Duration;

/// Tunable constants for the stack, gathered in one place instead of scattered magic numbers.
///
/// Defaults mirror the literal values called out in the component design; callers that just
/// want "the spec's behavior" can use [`Config::default`] unmodified.
#[derive(Debug, Clone)]
pub struct Config {
    /// IPv4 fragmentation MTU, in payload bytes per fragment. Must be a multiple of 8.
    pub mtu_payload_bytes: usize,
    /// Minimum Ethernet frame size; shorter frames are zero-padded.
    pub link_frame_min_bytes: usize,
    /// How long the link layer waits for an ARP reply before retrying.
    pub arp_timeout: Duration,
    /// Number of ARP request attempts before giving up.
    pub arp_retries: u32,
    /// How long to wait for a SYN-ACK before retrying the handshake.
    pub handshake_timeout: Duration,
    /// Number of SYN attempts before giving up.
    pub handshake_retries: u32,
    /// How long without any accepted datagram before the connection is declared dead.
    pub stall_timeout: Duration,
    /// How long an unacknowledged segment sits in the send buffer before it is resent.
    pub retransmit_threshold: Duration,
    /// Initial and minimum congestion window, in outstanding segments.
    pub cwnd_initial: u32,
    /// Congestion window ceiling.
    pub cwnd_max: u32,
    /// Advertised receive window, in bytes.
    pub recv_window: u16,
    /// Local raw-socket receive slice per data-loop iteration.
    pub recv_slice: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            mtu_payload_bytes: 800,
            link_frame_min_bytes: 60,
            arp_timeout: Duration::from_millis(500),
            arp_retries: 3,
            handshake_timeout: Duration::from_secs(3),
            handshake_retries: 3,
            stall_timeout: Duration::from_secs(180),
            retransmit_threshold: Duration::from_secs(60),
            cwnd_initial: 1,
            cwnd_max: 1000,
            recv_window: 65535,
            recv_slice: Duration::from_millis(1),
        }
    }
}

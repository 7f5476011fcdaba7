use std::process::ExitCode;
use std::time::Duration;

/// All errors produced by rawnet.
///
/// Variants are split into two categories:
/// - **Fatal** errors abort the whole fetch: ARP/handshake/stall failures, bad HTTP responses.
/// - **Packet-level** errors (`BadPacket`) are dropped silently by callers and never bubble up
///   past the layer that detected them; the variant exists so that layer can log at `trace`
///   without forcing every caller to match on a string.
#[derive(thiserror::Error, Debug)]
pub enum RawNetError {
    #[error("ARP resolution of {gateway} failed after {attempts} attempts")]
    ArpUnresolved { gateway: String, attempts: u32 },

    #[error("TCP handshake with {peer} failed after {attempts} attempts")]
    HandshakeFailed { peer: String, attempts: u32 },

    #[error("connection stalled: no data received for {0:?}")]
    ConnectionStalled(Duration),

    #[error("malformed packet: {0}")]
    BadPacket(&'static str),

    #[error("payload of {len} bytes exceeds Ethernet frame capacity")]
    PayloadTooLarge { len: usize },

    #[error("HTTP response status was not 200: {0}")]
    HttpNon200(String),

    #[error("malformed chunked transfer encoding: {0}")]
    BadChunked(&'static str),

    #[error("malformed URL: {0}")]
    Url(String),

    #[error("no network interface carries address {0}")]
    InterfaceNotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RawNetError {
    /// Maps each variant to a distinct process exit code, so scripts driving this binary can
    /// tell network-layer failures apart from a non-200 response without parsing stderr.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::ArpUnresolved { .. } => ExitCode::from(10),
            Self::HandshakeFailed { .. } => ExitCode::from(11),
            Self::ConnectionStalled(_) => ExitCode::from(12),
            Self::BadPacket(_) => ExitCode::from(13),
            Self::PayloadTooLarge { .. } => ExitCode::from(14),
            Self::HttpNon200(_) => ExitCode::from(20),
            Self::BadChunked(_) => ExitCode::from(21),
            Self::Url(_) => ExitCode::from(22),
            Self::InterfaceNotFound(_) => ExitCode::from(30),
            Self::Io(_) => ExitCode::from(31),
        }
    }
}

pub type Result<T> = std::result::Result<T, RawNetError>;

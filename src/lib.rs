//! rawnet: a minimal user-space TCP/IP stack for fetching one HTTP resource over a raw
//! link-layer socket, with no kernel assistance above the Ethernet layer.
//!
//! The stack is organized into:
//!
//! - `checksum`: RFC 1071 one's-complement checksum
//! - `link`: Ethernet framing, ARP resolution, raw `AF_PACKET` socket
//! - `ip`: IPv4 header build/parse, fragmentation, reassembly
//! - `tcp`: hand-rolled TCP engine (handshake, congestion window, retransmission)
//! - `http`: thin GET client built on top of the TCP engine

pub mod checksum;
pub mod config;
pub mod error;
pub mod host;
pub mod http;
pub mod ip;
pub mod link;
pub mod tcp;
pub mod types;

pub use config::Config;
pub use error::{RawNetError, Result};
pub use host::HostContext;
pub use http::url::Url;
pub use tcp::{RealTransport, TcpEngine, Transport};

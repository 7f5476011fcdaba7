//! Minimal `http://` URL parsing: scheme, host, optional port, path.

use crate::error::{RawNetError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Url {
    pub host: String,
    pub port: u16,
    pub path: String,
}

impl Url {
    /// Parses `http://host[:port][/path]`. Only the `http` scheme is accepted.
    pub fn parse(raw: &str) -> Result<Self> {
        let rest = raw
            .strip_prefix("http://")
            .ok_or_else(|| RawNetError::Url(format!("unsupported scheme: {raw}")))?;
        if rest.is_empty() {
            return Err(RawNetError::Url("empty host".to_string()));
        }

        let (authority, path) = match rest.find('/') {
            Some(idx) => (&rest[..idx], &rest[idx..]),
            None => (rest, "/"),
        };
        if authority.is_empty() {
            return Err(RawNetError::Url("empty host".to_string()));
        }

        let (host, port) = match authority.split_once(':') {
            Some((host, port_str)) => {
                let port: u16 = port_str
                    .parse()
                    .map_err(|_| RawNetError::Url(format!("bad port: {port_str}")))?;
                (host.to_string(), port)
            }
            None => (authority.to_string(), 80),
        };

        let path = if path.is_empty() { "/".to_string() } else { path.to_string() };

        Ok(Url { host, port, path })
    }

    /// The last non-empty path segment, used as the default output filename.
    pub fn output_filename(&self) -> String {
        match self.path.trim_end_matches('/').rsplit('/').next() {
            Some(segment) if !segment.is_empty() => segment.to_string(),
            _ => "index.html".to_string(),
        }
    }
}

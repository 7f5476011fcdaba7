//! Thin HTTP/1.1 GET client: builds the request, drives a [`TcpEngine`], and decodes the
//! response body (content-length or chunked) from the concatenated bytes it returns.

pub mod url;

use std::net::{Ipv4Addr, ToSocketAddrs};

use log::info;

use crate::config::Config;
use crate::error::{RawNetError, Result};
use crate::host::HostContext;
use crate::tcp::{RealTransport, TcpEngine};
use url::Url;

/// Resolves `host` to an IPv4 address: a dotted-quad parses directly, anything else goes
/// through the host resolver.
pub fn resolve_host(host: &str) -> Result<Ipv4Addr> {
    if let Ok(ip) = host.parse::<Ipv4Addr>() {
        return Ok(ip);
    }
    (host, 0u16)
        .to_socket_addrs()?
        .find_map(|addr| match addr.ip() {
            std::net::IpAddr::V4(v4) => Some(v4),
            std::net::IpAddr::V6(_) => None,
        })
        .ok_or_else(|| RawNetError::Url(format!("could not resolve {host} to an IPv4 address")))
}

fn build_request(url: &Url) -> Vec<u8> {
    format!(
        "GET {} HTTP/1.1\r\nHost: {}\r\nconnection: keep-alive\r\ncontent-length: 0\r\n\r\n",
        url.path, url.host
    )
    .into_bytes()
}

/// Splits a raw response into `(header_block, body)` at the first blank line.
fn split_headers(response: &[u8]) -> Result<(&str, &[u8])> {
    let marker = b"\r\n\r\n";
    let split_at = response
        .windows(marker.len())
        .position(|w| w == marker)
        .ok_or(RawNetError::BadPacket("no header/body separator in HTTP response"))?;
    let headers = std::str::from_utf8(&response[..split_at])
        .map_err(|_| RawNetError::BadPacket("HTTP headers are not valid UTF-8"))?;
    Ok((headers, &response[split_at + marker.len()..]))
}

fn header_value<'a>(headers: &'a str, name: &str) -> Option<&'a str> {
    headers.lines().skip(1).find_map(|line| {
        let (key, value) = line.split_once(':')?;
        key.trim().eq_ignore_ascii_case(name).then(|| value.trim())
    })
}

fn status_is_200(headers: &str) -> bool {
    headers.lines().next().map(|line| line.contains("200")).unwrap_or(false)
}

/// Decodes an HTTP/1.1 chunked-transfer-encoded body: `<hex length>\r\n<bytes>\r\n`, repeated
/// until a zero-length chunk.
pub fn decode_chunked(mut body: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    loop {
        let line_end = body
            .windows(2)
            .position(|w| w == b"\r\n")
            .ok_or(RawNetError::BadChunked("missing chunk-size line"))?;
        let size_line = std::str::from_utf8(&body[..line_end])
            .map_err(|_| RawNetError::BadChunked("chunk-size line is not valid UTF-8"))?;
        let size_str = size_line.split(';').next().unwrap_or(size_line).trim();
        let size = usize::from_str_radix(size_str, 16)
            .map_err(|_| RawNetError::BadChunked("chunk-size is not valid hex"))?;

        body = &body[line_end + 2..];
        if size == 0 {
            return Ok(out);
        }
        if body.len() < size + 2 {
            return Err(RawNetError::BadChunked("chunk body shorter than declared size"));
        }
        out.extend_from_slice(&body[..size]);
        if &body[size..size + 2] != b"\r\n" {
            return Err(RawNetError::BadChunked("chunk not terminated by CRLF"));
        }
        body = &body[size + 2..];
    }
}

/// Fetches `url` over a fresh TCP connection and returns the decoded response body.
pub fn fetch(url: &Url, host: &HostContext, config: &Config) -> Result<Vec<u8>> {
    let remote_ip = resolve_host(&url.host)?;
    info!("HTTP: GET http://{}:{}{} ({})", url.host, url.port, url.path, remote_ip);

    let transport = RealTransport::new(host, remote_ip, config)?;
    let mut engine = TcpEngine::new(transport, config.clone(), host.local_ip, remote_ip, url.port);
    let request = build_request(url);
    let response = engine.fetch(&request)?;

    let (headers, body) = split_headers(&response)?;
    if !status_is_200(headers) {
        let status_line = headers.lines().next().unwrap_or("").to_string();
        return Err(RawNetError::HttpNon200(status_line));
    }

    if header_value(headers, "Transfer-Encoding")
        .map(|v| v.eq_ignore_ascii_case("chunked"))
        .unwrap_or(false)
    {
        decode_chunked(body)
    } else {
        Ok(body.to_vec())
    }
}

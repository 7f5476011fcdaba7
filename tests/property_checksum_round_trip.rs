//! Invariant 1: for any byte string, appending its checksum makes it verify.

use proptest::prelude::*;
use rawnet::checksum;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn checksum_then_verify_round_trips(data in prop::collection::vec(any::<u8>(), 0..2048)) {
        let sum = checksum::checksum(&data);
        let mut covered = data.clone();
        covered.extend_from_slice(&sum);
        prop_assert!(checksum::verify(&covered));
    }

}

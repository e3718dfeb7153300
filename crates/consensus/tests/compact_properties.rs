//! Property tests for compact difficulty encoding and verification.

use proptest::prelude::*;
use sealchain_consensus::{compact_to_target, target_to_compact, verify, U256};
use sealchain_core::Hash;

const SIGN_BIT: u64 = 1 << 55;
const MANTISSA_MASK: u64 = SIGN_BIT - 1;

proptest! {
    #[test]
    fn encoding_never_raises_the_target(bytes in any::<[u8; 32]>()) {
        let target = U256::from_big_endian(&bytes);
        let bits = target_to_compact(target);
        prop_assert_eq!(bits & SIGN_BIT, 0);

        let decoded = compact_to_target(bits).unwrap();
        prop_assert!(decoded <= target);
        prop_assert_eq!(target_to_compact(decoded), bits);
    }

    #[test]
    fn verify_matches_integer_comparison(
        hash in any::<[u8; 32]>(),
        exponent in 0u64..=0xFF,
        mantissa in 0u64..=MANTISSA_MASK,
    ) {
        let bits = (exponent << 56) | mantissa;
        let target = compact_to_target(bits).unwrap();
        let value = U256::from_big_endian(&hash);
        prop_assert_eq!(verify(&Hash(hash), bits), value <= target);
    }

    #[test]
    fn negative_targets_reject_every_hash(
        hash in any::<[u8; 32]>(),
        exponent in 0u64..=0xFF,
        mantissa in 0u64..=MANTISSA_MASK,
    ) {
        let bits = (exponent << 56) | SIGN_BIT | mantissa;
        prop_assert_eq!(compact_to_target(bits), None);
        prop_assert!(!verify(&Hash(hash), bits));
        prop_assert!(!verify(&Hash::ZERO, bits));
    }

    #[test]
    fn higher_exponent_never_lowers_target(
        exponent in 0u64..0xFF,
        mantissa in 0u64..=MANTISSA_MASK,
    ) {
        let lower = compact_to_target((exponent << 56) | mantissa).unwrap();
        let higher = compact_to_target(((exponent + 1) << 56) | mantissa).unwrap();
        prop_assert!(higher >= lower);
    }
}

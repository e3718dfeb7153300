//! Compact difficulty encoding.
//!
//! A `bits` value packs a 256-bit target into 64 bits:
//!
//! ```text
//!  63        56 55 54                                    0
//! +------------+--+---------------------------------------+
//! |  exponent  |s |               mantissa                |
//! +------------+--+---------------------------------------+
//! ```
//!
//! `target = mantissa * 256^(exponent - 3)`. A set sign bit encodes a
//! negative target, which no hash can meet; it decodes to `None`.

use primitive_types::U256;
use sealchain_core::Hash;

const SIGN_BIT: u64 = 1 << 55;
const MANTISSA_MASK: u64 = SIGN_BIT - 1;

/// Decode compact bits into a target. Overflowing targets saturate.
///
/// Returns `None` for a negative target.
pub fn compact_to_target(bits: u64) -> Option<U256> {
    if bits & SIGN_BIT != 0 {
        return None;
    }

    let exponent = (bits >> 56) as usize;
    let mantissa = bits & MANTISSA_MASK;
    if mantissa == 0 {
        return Some(U256::zero());
    }

    if exponent <= 3 {
        return Some(U256::from(mantissa >> (8 * (3 - exponent))));
    }

    let shift = 8 * (exponent - 3);
    let mantissa = U256::from(mantissa);
    if mantissa.bits() + shift > 256 {
        Some(U256::MAX)
    } else {
        Some(mantissa << shift)
    }
}

/// Encode a target as compact bits, keeping its three most significant bytes.
pub fn target_to_compact(target: U256) -> u64 {
    if target.is_zero() {
        return 0;
    }

    let size = (target.bits() + 7) / 8;
    let mantissa = if size <= 3 {
        target.low_u64() << (8 * (3 - size))
    } else {
        (target >> (8 * (size - 3))).low_u64()
    };

    ((size as u64) << 56) | (mantissa & MANTISSA_MASK)
}

/// Interpret a hash as a big-endian integer.
pub fn hash_to_u256(hash: &Hash) -> U256 {
    U256::from_big_endian(hash.as_bytes())
}

/// Check a hash against an already decoded target.
pub fn meets_target(hash: &Hash, target: &U256) -> bool {
    hash_to_u256(hash) <= *target
}

/// True iff `hash`, read big-endian, is at most the target encoded by `bits`.
pub fn verify(hash: &Hash, bits: u64) -> bool {
    compact_to_target(bits).is_some_and(|target| meets_target(hash, &target))
}

#[cfg(test)]
mod tests {
    use super::*;

    const GENESIS_BITS: u64 = 2_161_727_821_138_738_707;

    fn bits(exponent: u64, mantissa: u64) -> u64 {
        (exponent << 56) | mantissa
    }

    fn target(bits: u64) -> U256 {
        compact_to_target(bits).unwrap()
    }

    #[test]
    fn test_small_exponents_shift_right() {
        assert_eq!(target(bits(3, 0x12_3456)), U256::from(0x12_3456));
        assert_eq!(target(bits(2, 0x12_3456)), U256::from(0x1234));
        assert_eq!(target(bits(1, 0x12_3456)), U256::from(0x12));
        assert_eq!(target(bits(0, 0x12_3456)), U256::zero());
    }

    #[test]
    fn test_large_exponents_shift_left() {
        assert_eq!(target(bits(4, 0x12_3456)), U256::from(0x1234_5600u64));
        assert_eq!(target(bits(32, 1)), U256::one() << 232);
    }

    #[test]
    fn test_zero_mantissa_is_zero_target() {
        assert!(target(bits(30, 0)).is_zero());
        let mut one = [0u8; 32];
        one[31] = 1;
        assert!(verify(&Hash::ZERO, bits(30, 0)));
        assert!(!verify(&Hash(one), bits(30, 0)));
    }

    #[test]
    fn test_negative_target_rejects_every_hash() {
        assert_eq!(compact_to_target(bits(30, 0xDBE13) | SIGN_BIT), None);
        assert_eq!(compact_to_target(bits(3, 0) | SIGN_BIT), None);
        assert!(!verify(&Hash::ZERO, bits(3, 1) | SIGN_BIT));
        assert!(!verify(&Hash::ZERO, bits(0xFF, MANTISSA_MASK) | SIGN_BIT));
    }

    #[test]
    fn test_full_mantissa_is_decoded() {
        assert_eq!(target(bits(3, MANTISSA_MASK)), U256::from(MANTISSA_MASK));
        let shifted = U256::from(MANTISSA_MASK) << 8;
        assert_eq!(target(bits(4, MANTISSA_MASK)), shifted);
        // 55 mantissa bits shifted by 200 still fit; by 208 they do not.
        assert_eq!(
            target(bits(28, MANTISSA_MASK)),
            U256::from(MANTISSA_MASK) << 200
        );
        assert_eq!(target(bits(29, MANTISSA_MASK)), U256::MAX);
    }

    #[test]
    fn test_overflow_saturates() {
        assert_eq!(target(bits(0xFF, 0x12_3456)), U256::MAX);
        assert_eq!(target(bits(35, 0x01)), U256::MAX);
    }

    #[test]
    fn test_genesis_bits() {
        assert_eq!(GENESIS_BITS, 0x1E00_0000_000D_BE13);
        let decoded = target(GENESIS_BITS);
        assert_eq!(decoded, U256::from(0xDBE13u64) << 216);
        assert_eq!(target_to_compact(decoded), GENESIS_BITS);
    }

    #[test]
    fn test_target_decreases_with_difficulty() {
        let easy = target(bits(32, 0xFFFF));
        let hard = target(bits(30, 0xFFFF));
        assert!(hard < easy);
    }

    #[test]
    fn test_target_to_compact_small() {
        assert_eq!(target_to_compact(U256::zero()), 0);
        assert_eq!(target_to_compact(U256::from(0x12)), bits(1, 0x12_0000));
        assert_eq!(target(bits(1, 0x12_0000)), U256::from(0x12));
    }

    #[test]
    fn test_target_to_compact_never_sets_sign_bit() {
        assert_eq!(target_to_compact(U256::MAX) & SIGN_BIT, 0);
        assert_eq!(target_to_compact(U256::from(0xFF_FFFFu64)) & SIGN_BIT, 0);
    }

    #[test]
    fn test_verify_boundaries() {
        let mut max = [0xFFu8; 32];
        assert!(verify(&Hash::ZERO, GENESIS_BITS));
        assert!(!verify(&Hash(max), GENESIS_BITS));

        // A hash exactly equal to the target passes.
        let decoded = target(GENESIS_BITS);
        decoded.to_big_endian(&mut max);
        assert!(verify(&Hash(max), GENESIS_BITS));
        (decoded + 1).to_big_endian(&mut max);
        assert!(!verify(&Hash(max), GENESIS_BITS));
    }
}

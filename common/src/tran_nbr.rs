//! Deterministic derivation of the gateway's `TRAN_NBR` field from a
//! transaction UUID (spec §6: "a numeric string ≤10 digits... MUST be
//! deterministically derived from the transaction UUID (FNV-1a 32-bit
//! fits the space)").

use uuid::Uuid;

const FNV_OFFSET_BASIS: u32 = 0x811c9dc5;
const FNV_PRIME: u32 = 0x01000193;

fn fnv1a_32(bytes: &[u8]) -> u32 {
    let mut hash = FNV_OFFSET_BASIS;
    for &byte in bytes {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// FNV-1a over the UUID's 16 raw bytes, formatted as a decimal string.
/// `u32::MAX` is 4294967295 (10 digits), so the result always fits the
/// gateway's ≤10-digit `TRAN_NBR` field without truncation.
pub fn tran_nbr_from_uuid(id: Uuid) -> String {
    let hash = fnv1a_32(id.as_bytes());
    hash.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_for_same_uuid() {
        let id = Uuid::new_v4();
        assert_eq!(tran_nbr_from_uuid(id), tran_nbr_from_uuid(id));
    }

    #[test]
    fn fits_ten_digits() {
        for _ in 0..10_000 {
            let id = Uuid::new_v4();
            assert!(tran_nbr_from_uuid(id).len() <= 10);
        }
    }

    #[test]
    fn differs_for_different_uuids() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_ne!(tran_nbr_from_uuid(a), tran_nbr_from_uuid(b));
    }
}

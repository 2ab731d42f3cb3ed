//! Deterministic mapping of correlation keys to partitions.
//!
//! Every broker computing the partition for the same correlation-key bytes
//! must reach the same answer, so the hash is defined over raw bytes and
//! never depends on platform or process state.

use crate::PartitionId;

/// Hash of a correlation key, stable across partitions and processes.
///
/// Bytes are treated as signed, matching the subscription protocol's
/// definition of the hash.
pub fn subscription_hash_code(correlation_key: &[u8]) -> i32 {
    let mut hash: i32 = 0;
    for &byte in correlation_key {
        hash = hash.wrapping_mul(31).wrapping_add(byte as i8 as i32);
    }
    hash
}

/// Index into an ordered partition id list for a given hash.
///
/// Widening to 64 bits keeps `i32::MIN` from escaping the valid range.
pub(crate) fn partition_index(hash: i32, partition_count: usize) -> usize {
    debug_assert!(partition_count > 0);
    (i64::from(hash).abs() % partition_count as i64) as usize
}

/// Partition owning a correlation key, given the shared ordered id list.
pub fn partition_for_correlation_key(
    partition_ids: &[PartitionId],
    correlation_key: &[u8],
) -> PartitionId {
    let hash = subscription_hash_code(correlation_key);
    partition_ids[partition_index(hash, partition_ids.len())]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_deterministic() {
        let key = b"order-42";
        assert_eq!(subscription_hash_code(key), subscription_hash_code(key));
    }

    #[test]
    fn test_hash_is_byte_level() {
        // Keys that differ in one byte hash differently
        assert_ne!(
            subscription_hash_code(b"order-42"),
            subscription_hash_code(b"order-43")
        );
        // High-bit bytes are treated as signed
        assert_eq!(
            subscription_hash_code(&[0x80]),
            i32::from(0x80u8 as i8)
        );
    }

    #[test]
    fn test_empty_key_is_safe() {
        assert_eq!(subscription_hash_code(b""), 0);
        assert_eq!(partition_for_correlation_key(&[1, 3, 5], b""), 1);
    }

    #[test]
    fn test_index_always_in_range() {
        for hash in [i32::MIN, i32::MIN + 1, -31, -1, 0, 1, 31, i32::MAX] {
            for count in [1usize, 2, 3, 7] {
                let index = partition_index(hash, count);
                assert!(index < count, "hash {} count {} gave {}", hash, count, index);
            }
        }
    }

    #[test]
    fn test_same_key_same_partition() {
        let partition_ids = [1, 3, 5];
        let first = partition_for_correlation_key(&partition_ids, b"order-42");
        let second = partition_for_correlation_key(&partition_ids, b"order-42");
        assert_eq!(first, second);
        assert!(partition_ids.contains(&first));
    }
}

use txstream_common::Key;

/// Canonical acquisition order for a key set: ascending, duplicates removed
///
/// Every protocol that claims keys one at a time walks them in this order so
/// two claimants never wait on each other in a cycle.
pub fn lock_order(keys: &[Key]) -> Vec<Key> {
    let mut ordered = keys.to_vec();
    ordered.sort_unstable();
    ordered.dedup();
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_order() {
        assert_eq!(lock_order(&[9, 2, 5, 2, 9]), vec![2, 5, 9]);
        assert!(lock_order(&[]).is_empty());
    }
}

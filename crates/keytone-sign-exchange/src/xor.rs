//! Repeating-key XOR.

/// XOR `data` with `key` repeated. Applying it twice restores the input.
///
/// An empty key leaves the data unchanged.
pub fn xor_crypt(data: &[u8], key: &[u8]) -> Vec<u8> {
    if key.is_empty() {
        return data.to_vec();
    }
    data.iter()
        .zip(key.iter().cycle())
        .map(|(d, k)| d ^ k)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_known_value() {
        assert_eq!(xor_crypt(b"\x00\x01\x02", b"\x01"), b"\x01\x00\x03");
    }

    proptest! {
        #[test]
        fn prop_involution(data in prop::collection::vec(any::<u8>(), 0..256),
                           key in prop::collection::vec(any::<u8>(), 1..40)) {
            prop_assert_eq!(xor_crypt(&xor_crypt(&data, &key), &key), data);
        }
    }
}

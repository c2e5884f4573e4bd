//! Property-based test for the shuffle roundtrip invariant (spec section 8,
//! testable property 1): for any buffer and any supported element size,
//! `unshuffle(shuffle(x)) == x`. `proptest` generates buffer contents and
//! lengths the fixed-size unit tests in `src/shuffle.rs` wouldn't think to
//! try.

use proptest::prelude::*;
use qs2::shuffle::{shuffle, unshuffle, SUPPORTED_TYPE_SIZES};

proptest! {
    #[test]
    fn shuffle_unshuffle_roundtrip(
        buf in prop::collection::vec(any::<u8>(), 0..4096),
        type_size_idx in 0..SUPPORTED_TYPE_SIZES.len(),
    ) {
        let type_size = SUPPORTED_TYPE_SIZES[type_size_idx];
        let mut shuffled = vec![0u8; buf.len()];
        shuffle(&mut shuffled, &buf, type_size);
        let mut restored = vec![0u8; buf.len()];
        unshuffle(&mut restored, &shuffled, type_size);
        prop_assert_eq!(restored, buf);
    }
}

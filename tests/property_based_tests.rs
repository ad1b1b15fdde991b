use presamples::{
    indexing::{fix_supply_use, index_with_arrays},
    IdMapping, IndexArray, Indexer, SampleArray, Seed, MISSING_INDEX,
};
use proptest::prelude::*;
use std::fs;
use tempfile::TempDir;

fn mapping_strategy() -> impl Strategy<Value = IdMapping> {
    prop::collection::hash_map(0i64..50, 0i64..1000, 0..30)
}

fn exchange_type_strategy() -> impl Strategy<Value = i64> {
    0i64..4
}

proptest! {
    /// Property: Arbitrary file contents are rejected with an error, never a panic
    #[test]
    fn arbitrary_bytes_never_panic_npy_readers(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.npy");
        fs::write(&path, &bytes).unwrap();
        let _ = SampleArray::read(&path);
        let _ = IndexArray::read(&path);
    }

    /// Property: A valid magic string followed by garbage is still handled gracefully
    #[test]
    fn garbage_after_magic_never_panics(
        version in 1u8..4,
        header in "\\PC{0,80}",
        tail in prop::collection::vec(any::<u8>(), 0..64),
    ) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.npy");
        let mut bytes = b"\x93NUMPY".to_vec();
        bytes.extend([version, 0]);
        let len = header.len();
        if version == 1 {
            bytes.extend((len as u16).to_le_bytes());
        } else {
            bytes.extend((len as u32).to_le_bytes());
        }
        bytes.extend(header.as_bytes());
        bytes.extend(tail);
        fs::write(&path, &bytes).unwrap();
        let _ = SampleArray::read(&path);
        let _ = IndexArray::read(&path);
    }

    /// Property: Seeded indexers stay in bounds and repeat for the same seed
    #[test]
    fn seeded_indexers_are_bounded_and_reproducible(ncols in 1usize..500, seed in any::<u64>()) {
        let first: Vec<usize> = Indexer::new(ncols, Seed::Fixed(seed)).unwrap().take(50).collect();
        let second: Vec<usize> = Indexer::new(ncols, Seed::Fixed(seed)).unwrap().take(50).collect();
        prop_assert!(first.iter().all(|index| *index < ncols));
        prop_assert_eq!(first, second);
    }

    /// Property: Sequential indexers visit columns in order and wrap around
    #[test]
    fn sequential_indexers_wrap(ncols in 1usize..50, draws in 1usize..200) {
        let mut indexer = Indexer::new(ncols, Seed::Sequential).unwrap();
        prop_assert_eq!(indexer.index(), 0);
        for step in 1..draws {
            prop_assert_eq!(indexer.advance(), step % ncols);
        }
    }

    /// Property: Every id is either mapped or marked missing, and the count matches
    #[test]
    fn index_with_arrays_maps_or_marks_missing(
        mapping in mapping_strategy(),
        ids in prop::collection::vec(0i64..60, 0..40),
    ) {
        let mut slots = vec![-1; ids.len()];
        let missing = index_with_arrays(&ids, &mut slots, &mapping);

        let mut counted = 0;
        for (id, slot) in ids.iter().zip(&slots) {
            match mapping.get(id) {
                Some(index) => prop_assert_eq!(slot, index),
                None => {
                    prop_assert_eq!(*slot, MISSING_INDEX);
                    counted += 1;
                }
            }
        }
        prop_assert_eq!(missing, counted);
    }

    /// Property: Only technosphere exchanges change sign, so applying twice restores the input
    #[test]
    fn fix_supply_use_is_an_involution(
        rows in prop::collection::vec((exchange_type_strategy(), -1e6f64..1e6), 0..40),
    ) {
        let (types, original): (Vec<i64>, Vec<f64>) = rows.into_iter().unzip();
        let mut values = original.clone();

        fix_supply_use(&types, &mut values);
        for ((kind, before), after) in types.iter().zip(&original).zip(&values) {
            if *kind == 1 {
                prop_assert_eq!(*after, -*before);
            } else {
                prop_assert_eq!(after, before);
            }
        }

        fix_supply_use(&types, &mut values);
        prop_assert_eq!(values, original);
    }
}

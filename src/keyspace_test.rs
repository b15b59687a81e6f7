use std::collections::HashSet;

use rand::rngs::SmallRng;
use rand::SeedableRng;

use crate::keyspace::*;

#[test]
fn padded_keys_are_fixed_width() {
    let enc = KeyEncoding::Padded { width: 16 };
    assert_eq!(enc.encode(0), "0000000000000000");
    assert_eq!(enc.encode(42), "0000000000000042");
    assert_eq!(enc.encode(9_999_999), "0000000009999999");
}

#[test]
fn plain_and_prefixed_keys() {
    assert_eq!(KeyEncoding::Plain.encode(1234), "1234");
    let enc = KeyEncoding::Prefixed {
        prefix: "key",
        width: 8,
    };
    assert_eq!(enc.encode(7), "key00000007");
}

#[test]
fn encode_into_reuses_buffer() {
    let enc = KeyEncoding::Padded { width: 4 };
    let mut buf = String::from("garbage that is long");
    enc.encode_into(12, &mut buf);
    assert_eq!(buf, "0012");
}

#[test]
fn padded_keys_are_injective_and_sorted() {
    let enc = KeyEncoding::Padded { width: 5 };
    let keys: Vec<String> = (0..20_000).map(|i| enc.encode(i)).collect();

    let unique: HashSet<&String> = keys.iter().collect();
    assert_eq!(unique.len(), keys.len());
    assert!(keys.windows(2).all(|w| w[0] < w[1]));
    assert!(enc.preserves_order(20_000));
}

#[test]
fn plain_keys_do_not_preserve_order() {
    assert!(KeyEncoding::Plain.encode(10) < KeyEncoding::Plain.encode(9));
    assert!(!KeyEncoding::Plain.preserves_order(11));
    assert!(KeyEncoding::Plain.preserves_order(10));
    assert!(!KeyEncoding::Padded { width: 2 }.preserves_order(101));
}

#[test]
fn random_value_is_lowercase_and_sized() {
    let mut rng = SmallRng::seed_from_u64(7);
    for size in [1usize, 2, 8, 100, 4096] {
        let v = random_value(size, &mut rng);
        assert_eq!(v.len(), size - 1);
        assert!(v.bytes().all(|b| b.is_ascii_lowercase()));
    }
    assert_eq!(random_value(0, &mut rng), "");
}

#[test]
fn random_value_is_reproducible_per_seed() {
    let a = random_value(64, &mut SmallRng::seed_from_u64(worker_seed(0, 'w', 3)));
    let b = random_value(64, &mut SmallRng::seed_from_u64(worker_seed(0, 'w', 3)));
    let c = random_value(64, &mut SmallRng::seed_from_u64(worker_seed(0, 'w', 4)));
    assert_eq!(a, b);
    assert_ne!(a, c);
}

#[test]
fn random_value_covers_alphabet() {
    let mut rng = SmallRng::seed_from_u64(1);
    let v = random_value(10_001, &mut rng);
    let seen: HashSet<u8> = v.bytes().collect();
    assert_eq!(seen.len(), 26);
}

fn assert_partition(
    entry_count: u64,
    workers: usize,
) {
    let ranges = partition(entry_count, workers);
    assert_eq!(ranges.len(), workers);

    let per = entry_count.div_ceil(workers as u64);
    let mut next = 0;
    for (i, r) in ranges.iter().enumerate() {
        assert_eq!(r.start, next.min(entry_count));
        if r.end < entry_count {
            assert_eq!(r.end - r.start, per, "range {i} of {entry_count}/{workers}");
        }
        assert!(r.end - r.start <= per);
        next = r.end;
    }
    assert_eq!(next, entry_count);
    let total: u64 = ranges.iter().map(|r| r.end - r.start).sum();
    assert_eq!(total, entry_count);
}

#[test]
fn partition_covers_keyspace_disjointly() {
    for (n, w) in [(1000, 4), (1000, 3), (10, 4), (5, 4), (1, 1), (1, 8), (7, 7), (0, 3)] {
        assert_partition(n, w);
    }
}

#[test]
fn partition_truncates_last_range() {
    assert_eq!(partition(10, 4), vec![0..3, 3..6, 6..9, 9..10]);
    assert_eq!(partition(5, 4), vec![0..2, 2..4, 4..5, 5..5]);
    assert!(partition(10, 0).is_empty());
}

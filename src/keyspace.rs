//! Key and value synthesis, and splitting the keyspace between loaders.
//!
//! Keys are integers in `[0, entry_count)` rendered as strings. The padded
//! encoding keeps lexicographic order equal to numeric order, which is what the
//! bulk loader relies on.

use std::fmt::Write;
use std::ops::Range;

use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEncoding {
    /// `%0{width}d`
    Padded { width: usize },
    /// `%d`; not order preserving
    Plain,
    /// `{prefix}%0{width}d`
    Prefixed { prefix: &'static str, width: usize },
}

impl KeyEncoding {
    pub fn encode(
        &self,
        index: u64,
    ) -> String {
        let mut buf = String::new();
        self.encode_into(index, &mut buf);
        buf
    }

    /// Overwrites `buf` with the encoding of `index`.
    pub fn encode_into(
        &self,
        index: u64,
        buf: &mut String,
    ) {
        buf.clear();
        // writing into a String cannot fail
        let _ = match *self {
            KeyEncoding::Padded { width } => write!(buf, "{index:0width$}"),
            KeyEncoding::Plain => write!(buf, "{index}"),
            KeyEncoding::Prefixed { prefix, width } => write!(buf, "{prefix}{index:0width$}"),
        };
    }

    /// Whether string order matches numeric order for keys below `entry_count`.
    pub fn preserves_order(
        &self,
        entry_count: u64,
    ) -> bool {
        let widest = entry_count.saturating_sub(1).to_string().len();
        match *self {
            KeyEncoding::Padded { width } | KeyEncoding::Prefixed { width, .. } => width >= widest,
            KeyEncoding::Plain => entry_count <= 10,
        }
    }
}

const ALPHABET_LEN: u8 = b'z' - b'a' + 1;

/// `size - 1` characters drawn uniformly from `[a-z]`.
///
/// The last byte of a `size`-byte buffer is reserved for a terminator, so the
/// payload is one shorter than `size`.
pub fn random_value<R: Rng + ?Sized>(
    size: usize,
    rng: &mut R,
) -> String {
    let mut buf = String::with_capacity(size);
    fill_random_value(&mut buf, size, rng);
    buf
}

/// Overwrites `buf` with a fresh value; see [`random_value`].
pub fn fill_random_value<R: Rng + ?Sized>(
    buf: &mut String,
    size: usize,
    rng: &mut R,
) {
    buf.clear();
    buf.extend((0..size.saturating_sub(1)).map(|_| (b'a' + rng.gen_range(0..ALPHABET_LEN)) as char));
}

/// Splits `[0, entry_count)` into `workers` contiguous ranges of
/// `ceil(entry_count / workers)` keys, the last one truncated.
///
/// Always returns exactly `workers` ranges; trailing ranges are empty when
/// there are fewer keys than the rounding needs.
pub fn partition(
    entry_count: u64,
    workers: usize,
) -> Vec<Range<u64>> {
    if workers == 0 {
        return Vec::new();
    }
    let per_worker = entry_count.div_ceil(workers as u64);
    (0..workers as u64)
        .map(|i| {
            let start = per_worker.saturating_mul(i).min(entry_count);
            let end = per_worker.saturating_mul(i + 1).min(entry_count);
            start..end
        })
        .collect()
}

/// Seed for worker `index` of a role tagged `tag`.
///
/// Fixed per worker, so a rerun with the same configuration replays the same
/// key and value streams.
pub fn worker_seed(
    base: u64,
    tag: char,
    index: usize,
) -> u64 {
    base.wrapping_add(tag as u64).wrapping_add(index as u64)
}

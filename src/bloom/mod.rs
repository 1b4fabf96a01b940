//! Bloom filter decoding and bit-exact membership testing.
//!
//! Filters are produced by an external writer (the bundle converter), so
//! the hash must match that writer's 32-bit wrap-around arithmetic exactly,
//! not just "a" good hash function.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize)]
struct FilterPayload {
    buckets: Vec<i32>,
    #[serde(rename = "numHashFunctions")]
    num_hash_functions: i32,
}

/// A decoded filter, ready for repeated `contains` calls.
pub struct BloomFilter {
    buckets: Vec<i32>,
    m: i32,
    k: i32,
}

impl BloomFilter {
    /// Decodes a gzip-wrapped `{buckets, numHashFunctions}` JSON payload.
    pub fn decode(encoded: &[u8]) -> Result<Self> {
        let mut decoder = flate2::read::GzDecoder::new(encoded);
        let mut raw = Vec::new();
        decoder
            .read_to_end(&mut raw)
            .context("failed to gunzip bloom filter payload")?;

        let payload: FilterPayload =
            serde_json::from_slice(&raw).context("failed to parse bloom filter JSON")?;

        let m = payload.buckets.len() as i32 * 32;
        Ok(Self {
            buckets: payload.buckets,
            m,
            k: payload.num_hash_functions,
        })
    }

    /// Tests membership of `identifier`. `true` may be a false positive;
    /// `false` is a guarantee of absence.
    pub fn contains(&self, identifier: &str) -> bool {
        for bit in locations(identifier, self.m, self.k) {
            let word = self.buckets[(bit / 32) as usize];
            if word & (1 << (bit.rem_euclid(32))) == 0 {
                return false;
            }
        }
        true
    }
}

/// Convenience one-shot entry point mirroring the original's
/// `decodeAndTestFilter`.
pub fn test(encoded_filter: &[u8], identifier: &str) -> Result<bool> {
    Ok(BloomFilter::decode(encoded_filter)?.contains(identifier))
}

/// Produces the `k` bit indices for `v` via double hashing
/// (http://willwhim.wpengine.com/2011/09/03/producing-n-hash-functions-by-hashing-only-once/).
fn locations(v: &str, m: i32, k: i32) -> Vec<i32> {
    let a = fnv_1a(v, 0);
    let b = fnv_1a(v, 1576284489);

    let mut x = a.wrapping_rem(m);
    let mut r = Vec::with_capacity(k.max(0) as usize);
    for _ in 0..k {
        r.push(if x < 0 { x + m } else { x });
        x = (x.wrapping_add(b)).wrapping_rem(m);
    }
    r
}

/// Fowler/Noll/Vo hashing, seeded variant: the seed XORs into the offset
/// basis before the first byte is folded in.
fn fnv_1a(v: &str, seed: i32) -> i32 {
    let q: i32 = 2166136261u32 as i32;
    let mut a: i64 = (q ^ seed) as i64;

    for r in utf16_runes(v) {
        let c = r as i64;
        let d = c & 0xff00;
        if d != 0 {
            a = fnv_multiply((a ^ (d >> 8)) as i32);
        }
        a = fnv_multiply((a as i32) ^ ((c & 0xff) as i32));
    }

    fnv_mix(a as i32)
}

/// `a * 16777619 mod 2**32`, expressed as the sum-of-shifts identity the
/// original encoder uses (kept for bit-exact overflow behavior).
fn fnv_multiply(a: i32) -> i64 {
    (a as i64)
        .wrapping_add((a as i64) << 1)
        .wrapping_add((a as i64) << 4)
        .wrapping_add((a as i64) << 7)
        .wrapping_add((a as i64) << 8)
        .wrapping_add((a as i64) << 24)
}

fn fnv_mix(a: i32) -> i32 {
    let mut a = a;
    a = a.wrapping_add(a << 13);
    a ^= ((a as u32) >> 7) as i32;
    a = a.wrapping_add(a << 3);
    a ^= ((a as u32) >> 17) as i32;
    a = a.wrapping_add(a << 5);
    a
}

/// Encodes `v` to UTF-16 code units, one rune per unit unless the scalar
/// requires a surrogate pair.
fn utf16_runes(v: &str) -> Vec<u16> {
    v.encode_utf16().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    fn encode_filter(buckets: &[i32], num_hash_functions: i32) -> Vec<u8> {
        let payload = serde_json::json!({
            "buckets": buckets,
            "numHashFunctions": num_hash_functions,
        });
        let json = serde_json::to_vec(&payload).unwrap();
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&json).unwrap();
        encoder.finish().unwrap()
    }

    /// Sets every bit that `locations` would address for `v`, mirroring
    /// what the external encoder does, so tests don't depend on an
    /// external filter fixture.
    fn build_filter(values: &[&str], m: i32, k: i32) -> BloomFilter {
        let mut buckets = vec![0i32; (m / 32) as usize];
        for v in values {
            for bit in locations(v, m, k) {
                let word = &mut buckets[(bit / 32) as usize];
                *word |= 1 << (bit.rem_euclid(32));
            }
        }
        BloomFilter { buckets, m, k }
    }

    #[test]
    fn accepts_inserted_values() {
        let filter = build_filter(&["apple", "banana", "cherry"], 256, 4);
        assert!(filter.contains("banana"));
    }

    #[test]
    fn rejects_absent_value_when_no_false_positive() {
        let filter = build_filter(&["apple", "banana", "cherry"], 256, 4);
        assert!(!filter.contains("durian"));
    }

    #[test]
    fn handles_non_bmp_surrogate_pairs() {
        let filter = build_filter(&["\u{1F34E}"], 256, 4);
        assert!(filter.contains("\u{1F34E}"));
        assert!(!filter.contains("?"));
    }

    #[test]
    fn decodes_gzip_json_envelope() {
        let m = 256;
        let k = 4;
        let values = ["apple", "banana", "cherry"];
        let mut buckets = vec![0i32; (m / 32) as usize];
        for v in values.iter() {
            for bit in locations(v, m, k) {
                buckets[(bit / 32) as usize] |= 1 << (bit.rem_euclid(32));
            }
        }

        let encoded = encode_filter(&buckets, k);
        let filter = BloomFilter::decode(&encoded).unwrap();
        assert!(filter.contains("apple"));
    }

    #[test]
    fn decode_propagates_invalid_gzip() {
        let result = BloomFilter::decode(b"not gzip data");
        assert!(result.is_err());
    }
}

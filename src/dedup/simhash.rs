//! 64-bit SimHash over 3-word shingles.
//!
//! Token hashing uses FNV-1a with its standard offset basis, so fingerprints
//! are deterministic across runs and machines. Long documents are sampled
//! down to ~250 shingles before voting; the fingerprint stays stable because
//! sampling is positional, not random.

use std::hash::Hasher;

use fnv::FnvHasher;

const HASH_BITS: usize = 64;

/// Shingle width in words.
const SHINGLE_SIZE: usize = 3;

/// Above this many words, shingles are sampled instead of exhaustive.
const SAMPLE_ABOVE_WORDS: usize = 500;
const SAMPLE_TARGET: usize = 250;

/// Deterministic 64-bit hash of an arbitrary string.
pub fn hash64(token: &str) -> u64 {
    let mut hasher = FnvHasher::default();
    hasher.write(token.as_bytes());
    hasher.finish()
}

/// Number of differing bit positions between two fingerprints.
pub fn hamming(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}

/// Compute the SimHash fingerprint of whitespace-normalized text.
///
/// Texts shorter than one shingle fall back to a plain hash of the whole
/// string; there is no structure to fingerprint.
pub fn simhash64(text: &str) -> u64 {
    let words: Vec<&str> = text.split_whitespace().collect();

    if words.len() < SHINGLE_SIZE {
        return hash64(text);
    }

    let last_start = words.len() - (SHINGLE_SIZE - 1);
    let step = if words.len() > SAMPLE_ABOVE_WORDS {
        (words.len() / SAMPLE_TARGET).max(1)
    } else {
        1
    };

    let mut votes = [0i32; HASH_BITS];
    let mut i = 0;
    while i < last_start {
        let shingle = words[i..i + SHINGLE_SIZE].join(" ");
        let h = hash64(&shingle);
        for (bit, vote) in votes.iter_mut().enumerate() {
            if h & (1u64 << bit) != 0 {
                *vote += 1;
            } else {
                *vote -= 1;
            }
        }
        i += step;
    }

    let mut fingerprint = 0u64;
    for (bit, vote) in votes.iter().enumerate() {
        if *vote > 0 {
            fingerprint |= 1u64 << bit;
        }
    }
    fingerprint
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simhash_is_deterministic() {
        let text = "the quick brown fox jumps over the lazy dog near the river bank";
        assert_eq!(simhash64(text), simhash64(text));
        assert_eq!(hash64("token"), hash64("token"));
    }

    #[test]
    fn test_self_distance_is_zero() {
        let text = "alpha beta gamma delta epsilon zeta eta theta";
        assert_eq!(hamming(simhash64(text), simhash64(text)), 0);
    }

    #[test]
    fn test_short_text_falls_back_to_plain_hash() {
        assert_eq!(simhash64("two words"), hash64("two words"));
        assert_eq!(simhash64(""), hash64(""));
    }

    #[test]
    fn test_similar_texts_are_close_dissimilar_far() {
        // 400 distinct words; the variant changes exactly one of them, which
        // perturbs three shingles out of ~400.
        let words: Vec<String> = (0..400).map(|i| format!("w{}", i)).collect();
        let base = words.join(" ");
        let mut changed = words.clone();
        changed[200] = "changed".to_string();
        let near = changed.join(" ");

        let far = "completely unrelated content about campus parking permits fee \
                   schedules shuttle routes and visitor information desks "
            .repeat(5);
        let dept = "the department of computer science offers a broad range of \
                    undergraduate and graduate courses in algorithms systems and \
                    theory with opportunities for research "
            .repeat(5);

        let d_near = hamming(simhash64(&base), simhash64(&near));
        let d_far = hamming(simhash64(&dept), simhash64(&far));
        assert!(d_near <= 10, "near-duplicate distance was {}", d_near);
        assert!(d_far > 10, "unrelated distance was {}", d_far);
    }

    #[test]
    fn test_long_text_sampling_still_stable() {
        let long: String = (0..2000).map(|i| format!("word{} ", i)).collect();
        let a = simhash64(&long);
        let b = simhash64(&long);
        assert_eq!(a, b);
        assert_ne!(a, 0);
    }
}

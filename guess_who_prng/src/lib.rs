// Deterministic, portable candidate selection.
//
// Implements the Mulberry32 generator (a 32-bit counter-based mixer) and a
// Fisher-Yates shuffle driven by it. `select_candidates` shuffles the full
// catalog name list and keeps the first `CANDIDATE_SET_SIZE` entries; this is
// how every participant derives the same 30-card board from one shared seed.
//
// **Critical constraint: cross-participant determinism.** Every participant
// (including non-Rust peers running the browser client) must derive
// byte-identical orderings for the same seed and catalog ordering. The
// generator therefore reproduces the exact 32-bit wrapping arithmetic of the
// reference formula, and `next_f64` divides by 2^32 exactly as the reference
// does so the swap index `floor(r * (i + 1))` lands on the same slot. Do not
// "improve" the shuffle (e.g. rejection sampling): that changes the ordering.
//
// The golden vectors in the tests were produced by the reference formula and
// are the compatibility contract.

use serde::{Deserialize, Serialize};

/// Number of cards on every board.
pub const CANDIDATE_SET_SIZE: usize = 30;

/// Additive constant applied to the state on every draw.
const MULBERRY_INCREMENT: u32 = 0x6D2B_79F5;

/// Mulberry32 PRNG: 32 bits of state, one wrapping add per draw followed by
/// two multiply/xor-shift mixing passes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mulberry32 {
    state: u32,
}

impl Mulberry32 {
    /// Create a generator whose first draw mixes `seed + 0x6D2B79F5`.
    pub fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    /// Generate the next raw 32-bit output.
    pub fn next_u32(&mut self) -> u32 {
        self.state = self.state.wrapping_add(MULBERRY_INCREMENT);
        let mut t = self.state;
        t = (t ^ (t >> 15)).wrapping_mul(t | 1);
        t ^= t.wrapping_add((t ^ (t >> 7)).wrapping_mul(t | 61));
        t ^ (t >> 14)
    }

    /// Generate a uniform `f64` in [0, 1).
    ///
    /// The division by 2^32 is exact in an f64, so peers computing in double
    /// precision agree bit for bit.
    pub fn next_f64(&mut self) -> f64 {
        f64::from(self.next_u32()) / 4_294_967_296.0
    }

    /// Uniform index in `[0, bound)` computed as `floor(next_f64() * bound)`.
    ///
    /// Panics if `bound` is zero.
    pub fn index_below(&mut self, bound: usize) -> usize {
        assert!(bound > 0, "index_below: bound must be positive");
        // bound never exceeds the catalog length, far below 2^53, so the f64
        // product is exact enough to floor onto the same slot as the reference.
        (self.next_f64() * bound as f64) as usize
    }
}

/// In-place Fisher-Yates shuffle, walking from the last element down to
/// index 1 and swapping each with `index_below(i + 1)`.
pub fn shuffle<T>(items: &mut [T], rng: &mut Mulberry32) {
    for i in (1..items.len()).rev() {
        let j = rng.index_below(i + 1);
        items.swap(i, j);
    }
}

/// Shuffle a copy of `catalog` with a generator seeded by `seed` and keep the
/// first `CANDIDATE_SET_SIZE` entries (fewer if the catalog is smaller).
///
/// Pure: the same seed and catalog ordering always yield the same sequence.
pub fn select_candidates<T: Clone>(seed: u32, catalog: &[T]) -> Vec<T> {
    let mut rng = Mulberry32::new(seed);
    let mut shuffled = catalog.to_vec();
    shuffle(&mut shuffled, &mut rng);
    shuffled.truncate(CANDIDATE_SET_SIZE);
    shuffled
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    /// Synthetic catalog `card-000` .. `card-149`, the ordering the golden
    /// selections were computed against.
    fn synthetic_catalog() -> Vec<String> {
        (0..150).map(|i| format!("card-{i:03}")).collect()
    }

    #[test]
    fn raw_draws_match_reference_seed_zero() {
        let mut rng = Mulberry32::new(0);
        let draws: Vec<u32> = (0..5).map(|_| rng.next_u32()).collect();
        assert_eq!(
            draws,
            vec![1_144_304_738, 1_416_247, 958_946_056, 627_933_444, 2_007_157_716]
        );
    }

    #[test]
    fn raw_draws_match_reference_seed_12345() {
        let mut rng = Mulberry32::new(12345);
        let draws: Vec<u32> = (0..5).map(|_| rng.next_u32()).collect();
        assert_eq!(
            draws,
            vec![
                4_207_900_869,
                1_317_490_944,
                2_079_646_450,
                3_513_001_552,
                2_187_978_186
            ]
        );
    }

    #[test]
    fn golden_selection_seed_12345() {
        let selected = select_candidates(12345, &synthetic_catalog());
        let expected = [
            106, 69, 27, 105, 135, 114, 8, 107, 14, 4, 53, 19, 18, 60, 44, 92, 99, 28, 110,
            42, 58, 41, 93, 15, 32, 95, 77, 2, 72, 87,
        ];
        let expected: Vec<String> = expected.iter().map(|i| format!("card-{i:03}")).collect();
        assert_eq!(selected, expected);
    }

    #[test]
    fn golden_selection_seed_42() {
        let selected = select_candidates(42, &synthetic_catalog());
        let expected = [
            18, 146, 99, 38, 15, 80, 2, 16, 111, 93, 10, 49, 104, 120, 119, 44, 101, 50, 125,
            82, 121, 36, 30, 105, 79, 77, 115, 132, 138, 131,
        ];
        let expected: Vec<String> = expected.iter().map(|i| format!("card-{i:03}")).collect();
        assert_eq!(selected, expected);
    }

    #[test]
    fn determinism_same_seed_same_selection() {
        let catalog = synthetic_catalog();
        for seed in [0, 1, 7, 999_999, u32::MAX] {
            assert_eq!(
                select_candidates(seed, &catalog),
                select_candidates(seed, &catalog)
            );
        }
    }

    #[test]
    fn selection_is_thirty_distinct_catalog_entries() {
        let catalog = synthetic_catalog();
        for seed in 0..200 {
            let selected = select_candidates(seed, &catalog);
            assert_eq!(selected.len(), CANDIDATE_SET_SIZE);
            let distinct: BTreeSet<&String> = selected.iter().collect();
            assert_eq!(distinct.len(), CANDIDATE_SET_SIZE, "seed {seed} repeated a card");
            assert!(selected.iter().all(|c| catalog.contains(c)));
        }
    }

    #[test]
    fn different_seeds_different_orderings() {
        let catalog = synthetic_catalog();
        let orderings: BTreeSet<Vec<String>> =
            (0..50).map(|seed| select_candidates(seed, &catalog)).collect();
        // Not a constant permutation: practically every seed differs.
        assert!(orderings.len() > 45, "only {} distinct orderings", orderings.len());
    }

    #[test]
    fn small_catalog_keeps_everything() {
        let catalog: Vec<u32> = (0..10).collect();
        let selected = select_candidates(5, &catalog);
        assert_eq!(selected.len(), 10);
        let distinct: BTreeSet<u32> = selected.into_iter().collect();
        assert_eq!(distinct.len(), 10);
    }

    #[test]
    fn empty_and_singleton_catalogs() {
        assert!(select_candidates::<String>(1, &[]).is_empty());
        assert_eq!(select_candidates(1, &["only"]), vec!["only"]);
    }

    #[test]
    fn f64_in_unit_range() {
        let mut rng = Mulberry32::new(12345);
        for _ in 0..10_000 {
            let v = rng.next_f64();
            assert!((0.0..1.0).contains(&v), "f64 out of range: {v}");
        }
    }

    #[test]
    fn index_below_within_bounds() {
        let mut rng = Mulberry32::new(777);
        for bound in 1..200 {
            let v = rng.index_below(bound);
            assert!(v < bound, "index_below({bound}) returned {v}");
        }
    }

    #[test]
    fn serialization_roundtrip_preserves_stream() {
        let mut rng = Mulberry32::new(42);
        for _ in 0..100 {
            rng.next_u32();
        }
        let json = serde_json::to_string(&rng).unwrap();
        let mut restored: Mulberry32 = serde_json::from_str(&json).unwrap();
        for _ in 0..100 {
            assert_eq!(rng.next_u32(), restored.next_u32());
        }
    }
}

//! Host-side reference results the device output is checked against.
//!
//! All arithmetic wraps at 32 bits, the same as OpenCL C `int`/`uint`.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Smallest value `random_input` produces; doubling it cannot overflow.
pub const RANDOM_MIN: i32 = i32::MIN / 2 + 1;
pub const RANDOM_MAX: i32 = i32::MAX / 2 - 1;

/// `n!` modulo 2^32, reinterpreted as `i32`.
pub fn factorial(n: u32) -> i32 {
    (1..=n).fold(1u32, |acc, i| acc.wrapping_mul(i)) as i32
}

/// `out[i] = i + n!`
pub fn index_fill(out: &mut [i32], n: u32) {
    let fact = factorial(n) as u32;
    for (i, v) in out.iter_mut().enumerate() {
        *v = (i as u32).wrapping_add(fact) as i32;
    }
}

/// `out[i] = i`
pub fn index_identity(len: usize) -> Vec<i32> {
    (0..len).map(|i| i as i32).collect()
}

/// `out[i] = input[i] * 2`
pub fn scale(input: &[i32], out: &mut [i32]) {
    for (o, &x) in out.iter_mut().zip(input) {
        *o = x.wrapping_mul(2);
    }
}

/// Uniform integers in `[RANDOM_MIN, RANDOM_MAX]`.
pub fn random_input(len: usize, seed: Option<u64>) -> Vec<i32> {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    (0..len).map(|_| rng.gen_range(RANDOM_MIN..=RANDOM_MAX)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn small_factorials() {
        assert_eq!(factorial(0), 1);
        assert_eq!(factorial(1), 1);
        assert_eq!(factorial(10), 3_628_800);
        assert_eq!(factorial(12), 479_001_600);
    }

    #[test]
    fn factorial_wraps_like_device_int() {
        // 13! = 6_227_020_800 ≡ 1_932_053_504 (mod 2^32)
        assert_eq!(factorial(13), 1_932_053_504);
        // 100! carries far more than 32 factors of two
        assert_eq!(factorial(100), 0);
    }

    #[test]
    fn index_fill_adds_factorial() {
        let mut out = vec![0; 5];
        index_fill(&mut out, 3);
        assert_eq!(out, vec![6, 7, 8, 9, 10]);
    }

    #[test]
    fn index_identity_counts_up() {
        assert_eq!(index_identity(4), vec![0, 1, 2, 3]);
        assert!(index_identity(0).is_empty());
    }

    #[test]
    fn seeded_input_is_reproducible() {
        assert_eq!(random_input(64, Some(7)), random_input(64, Some(7)));
    }

    proptest! {
        #[test]
        fn random_input_stays_in_range(len in 0usize..512, seed in any::<u64>()) {
            let input = random_input(len, Some(seed));
            prop_assert_eq!(input.len(), len);
            prop_assert!(input.iter().all(|v| (RANDOM_MIN..=RANDOM_MAX).contains(v)));
        }

        #[test]
        fn scale_never_overflows_on_random_range(x in RANDOM_MIN..=RANDOM_MAX) {
            let mut out = [0];
            scale(&[x], &mut out);
            prop_assert_eq!(out[0] as i64, x as i64 * 2);
        }
    }
}

//! Property tests for the stream operations.
//!
//! Covered invariants:
//!
//! 1. **copy** — after `write_arrays` then `copy`, `c` equals the original `a` exactly.
//! 2. **mul** — `b[i] == 0.3 * c[i]` within tolerance.
//! 3. **add** — `c[i] == a[i] + b[i]` within tolerance.
//! 4. **triad** — `a[i] == b[i] + 0.3 * c[i]` within tolerance.
//! 5. **dot** — within a small relative tolerance of an independent
//!    left-to-right host sum, for randomized arrays of at least one full
//!    work-group.
//! 6. Construction rejects array sizes that are not work-group multiples.

use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use streammark::{HostStream, StreamOps, GROUP_SIZE};

/// Deterministic random arrays of `groups` full work-groups.
fn random_arrays(groups: usize, seed: u64) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let n = groups * GROUP_SIZE;
    let mut rng = StdRng::seed_from_u64(seed);
    let mut draw = |_| rng.gen_range(-1.0..1.0);
    let a: Vec<f64> = (0..n).map(&mut draw).collect();
    let b: Vec<f64> = (0..n).map(&mut draw).collect();
    let c: Vec<f64> = (0..n).map(&mut draw).collect();
    (a, b, c)
}

fn read_back(stream: &mut HostStream<f64>, n: usize) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let (mut a, mut b, mut c) = (vec![0.0; n], vec![0.0; n], vec![0.0; n]);
    stream.read_arrays(&mut a, &mut b, &mut c).unwrap();
    (a, b, c)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// `copy` writes `a` into `c` bit-exactly.
    #[test]
    fn prop_copy_is_exact(groups in 1usize..4, seed in any::<u64>()) {
        let n = groups * GROUP_SIZE;
        let (a, b, c) = random_arrays(groups, seed);
        let mut stream = HostStream::new(n).unwrap();
        stream.write_arrays(&a, &b, &c).unwrap();
        stream.copy().unwrap();

        let (_, _, rc) = read_back(&mut stream, n);
        prop_assert_eq!(rc, a);
    }

    /// `mul` scales `c` by 0.3 into `b`.
    #[test]
    fn prop_mul_scales_by_scalar(groups in 1usize..4, seed in any::<u64>()) {
        let n = groups * GROUP_SIZE;
        let (a, b, c) = random_arrays(groups, seed);
        let mut stream = HostStream::new(n).unwrap();
        stream.write_arrays(&a, &b, &c).unwrap();
        stream.mul().unwrap();

        let (_, rb, rc) = read_back(&mut stream, n);
        for i in 0..n {
            prop_assert!(
                (rb[i] - 0.3 * rc[i]).abs() < 1e-12,
                "b[{}] = {} != 0.3 * {}", i, rb[i], rc[i]
            );
        }
    }

    /// `add` sums `a` and `b` into `c`.
    #[test]
    fn prop_add_sums_elementwise(groups in 1usize..4, seed in any::<u64>()) {
        let n = groups * GROUP_SIZE;
        let (a, b, c) = random_arrays(groups, seed);
        let mut stream = HostStream::new(n).unwrap();
        stream.write_arrays(&a, &b, &c).unwrap();
        stream.add().unwrap();

        let (ra, rb, rc) = read_back(&mut stream, n);
        for i in 0..n {
            prop_assert!(
                (rc[i] - (ra[i] + rb[i])).abs() < 1e-12,
                "c[{}] = {} != {} + {}", i, rc[i], ra[i], rb[i]
            );
        }
    }

    /// `triad` writes `b + 0.3 * c` into `a`.
    #[test]
    fn prop_triad_formula(groups in 1usize..4, seed in any::<u64>()) {
        let n = groups * GROUP_SIZE;
        let (a, b, c) = random_arrays(groups, seed);
        let mut stream = HostStream::new(n).unwrap();
        stream.write_arrays(&a, &b, &c).unwrap();
        stream.triad().unwrap();

        let (ra, rb, rc) = read_back(&mut stream, n);
        for i in 0..n {
            prop_assert!(
                (ra[i] - (rb[i] + 0.3 * rc[i])).abs() < 1e-12,
                "a[{}] = {} != {} + 0.3 * {}", i, ra[i], rb[i], rc[i]
            );
        }
    }

    /// `dot` agrees with an independent left-to-right sum within relative
    /// tolerance, despite the different accumulation order.
    #[test]
    fn prop_dot_matches_naive_within_tolerance(groups in 1usize..6, seed in any::<u64>()) {
        let n = groups * GROUP_SIZE;
        let (a, b, c) = random_arrays(groups, seed);
        let mut stream = HostStream::new(n).unwrap();
        stream.write_arrays(&a, &b, &c).unwrap();

        let naive: f64 = a.iter().zip(&b).map(|(&x, &y)| x * y).sum();
        let dot = stream.dot().unwrap();

        let tolerance = naive.abs().max(1.0) * 1e-8;
        prop_assert!(
            (dot - naive).abs() < tolerance,
            "dot {} vs naive {}", dot, naive
        );
    }

    /// Sizes that are not work-group multiples are rejected at construction.
    #[test]
    fn prop_unaligned_sizes_rejected(offset in 1usize..GROUP_SIZE) {
        prop_assert!(HostStream::<f64>::new(GROUP_SIZE + offset).is_err());
    }
}

#[test]
fn dot_on_single_work_group_randomized() {
    let mut rng = StdRng::seed_from_u64(7);
    let a: Vec<f32> = (0..GROUP_SIZE).map(|_| rng.gen_range(-2.0..2.0)).collect();
    let b: Vec<f32> = (0..GROUP_SIZE).map(|_| rng.gen_range(-2.0..2.0)).collect();
    let c = vec![0.0f32; GROUP_SIZE];

    let mut stream = HostStream::<f32>::new(GROUP_SIZE).unwrap();
    stream.write_arrays(&a, &b, &c).unwrap();

    // Reference sum in f64 to bound the f32 accumulation error.
    let naive: f64 = a.iter().zip(&b).map(|(&x, &y)| f64::from(x) * f64::from(y)).sum();
    let dot = f64::from(stream.dot().unwrap());
    assert!(
        (dot - naive).abs() < naive.abs().max(1.0) * 1e-4,
        "dot {dot} vs naive {naive}"
    );
}

#[test]
fn stream_benchmark_sequence_stays_finite() {
    // The driver's copy → mul → add → triad sequence, repeated.
    let n = GROUP_SIZE * 2;
    let mut stream = HostStream::<f64>::new(n).unwrap();
    let init = vec![0.1; n];
    stream.write_arrays(&init, &vec![0.2; n], &vec![0.0; n]).unwrap();

    for _ in 0..10 {
        stream.copy().unwrap();
        stream.mul().unwrap();
        stream.add().unwrap();
        stream.triad().unwrap();
    }

    let (mut a, mut b, mut c) = (vec![0.0; n], vec![0.0; n], vec![0.0; n]);
    stream.read_arrays(&mut a, &mut b, &mut c).unwrap();
    for i in 0..n {
        assert!(a[i].is_finite() && b[i].is_finite() && c[i].is_finite(), "index {i}");
    }
}

use crate::config::{Number, EPSILON};
use wide::f32x8;

const LANES: usize = 8;

#[inline]
fn lane(chunk: &[Number]) -> f32x8 {
    f32x8::new([
        chunk[0], chunk[1], chunk[2], chunk[3], chunk[4], chunk[5], chunk[6], chunk[7],
    ])
}

/// Squared Euclidean distance using SIMD lanes of eight, with a scalar tail.
/// Callers validate that `a` and `b` have the same length.
pub fn squared_euclidean_simd(a: &[Number], b: &[Number]) -> Number {
    debug_assert_eq!(a.len(), b.len());

    let mut acc = f32x8::splat(0.0);
    let a_lanes = a.chunks_exact(LANES);
    let b_lanes = b.chunks_exact(LANES);
    let (a_tail, b_tail) = (a_lanes.remainder(), b_lanes.remainder());

    for (ca, cb) in a_lanes.zip(b_lanes) {
        let diff = lane(ca) - lane(cb);
        acc += diff * diff;
    }

    let tail: Number = a_tail
        .iter()
        .zip(b_tail)
        .map(|(&x, &y)| (x - y) * (x - y))
        .sum();

    acc.reduce_add() + tail
}

/// Dot product using SIMD lanes of eight, with a scalar tail.
pub fn dot_simd(a: &[Number], b: &[Number]) -> Number {
    debug_assert_eq!(a.len(), b.len());

    let mut acc = f32x8::splat(0.0);
    let a_lanes = a.chunks_exact(LANES);
    let b_lanes = b.chunks_exact(LANES);
    let (a_tail, b_tail) = (a_lanes.remainder(), b_lanes.remainder());

    for (ca, cb) in a_lanes.zip(b_lanes) {
        acc += lane(ca) * lane(cb);
    }

    let tail: Number = a_tail.iter().zip(b_tail).map(|(&x, &y)| x * y).sum();
    acc.reduce_add() + tail
}

pub fn normalize_vector(vector: &mut [Number]) {
    let magnitude: Number = vector.iter().map(|&x| x * x).sum::<Number>().sqrt();
    if magnitude > EPSILON {
        for x in vector.iter_mut() {
            *x /= magnitude;
        }
    }
}

use crate::config::Number;
use wide::f32x8;

const LANES: usize = 8;

/// Compute cosine similarity between two raw (not pre-normalized) vectors using SIMD operations.
///
/// Returns `None` when the lengths differ. A vector with zero magnitude yields a
/// similarity of 0; the result is otherwise clamped to `[-1, 1]`.
pub fn compute_cosine_similarity_simd(a: &[Number], b: &[Number]) -> Option<Number> {
    if a.len() != b.len() {
        return None;
    }

    let mut dot_product = f32x8::splat(0.0);
    let mut mag_a = f32x8::splat(0.0);
    let mut mag_b = f32x8::splat(0.0);

    let len = a.len();
    let simd_len = len - (len % LANES);

    // SIMD loop
    for i in (0..simd_len).step_by(LANES) {
        let va = f32x8::new([
            a[i],
            a[i + 1],
            a[i + 2],
            a[i + 3],
            a[i + 4],
            a[i + 5],
            a[i + 6],
            a[i + 7],
        ]);
        let vb = f32x8::new([
            b[i],
            b[i + 1],
            b[i + 2],
            b[i + 3],
            b[i + 4],
            b[i + 5],
            b[i + 6],
            b[i + 7],
        ]);
        dot_product += va * vb;
        mag_a += va * va;
        mag_b += vb * vb;
    }

    let mut scalar_dot_product = dot_product.reduce_add();
    let mut scalar_mag_a = mag_a.reduce_add();
    let mut scalar_mag_b = mag_b.reduce_add();

    // Handle remaining elements
    for i in simd_len..len {
        scalar_dot_product += a[i] * b[i];
        scalar_mag_a += a[i] * a[i];
        scalar_mag_b += b[i] * b[i];
    }

    if scalar_mag_a == 0.0 || scalar_mag_b == 0.0 {
        return Some(0.0);
    }

    let similarity = scalar_dot_product / (scalar_mag_a.sqrt() * scalar_mag_b.sqrt());
    if similarity.is_nan() {
        Some(0.0)
    } else {
        Some(similarity.clamp(-1.0, 1.0))
    }
}

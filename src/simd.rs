//! Exact squared-L2 distance kernels.
//!
//! Two families, selected by data type:
//!
//! - **Float kernel** ([`l2_sqr`]): processes 16 floats per outer iteration
//!   in the AVX path (two 8-lane subtract/multiply/accumulate steps), or
//!   four 4-lane steps in the SSE path, then horizontally reduces the lane
//!   accumulator. Any remainder below the chunk width is handled by a
//!   scalar tail, so every slice length is computed exactly.
//! - **Byte kernel** ([`l2_sqr_u8`]): integer sum of squared differences,
//!   unrolled four components at a time. Exact, since no floating-point
//!   rounding is involved.
//!
//! All kernels are pure functions: no allocation, no side effects, and the
//! same inputs always produce the same output. If the two slices differ in
//! length, the distance is computed over the shorter length; the space
//! implementations in this crate check dimensions before calling down.

/// Squared Euclidean distance between two float vectors.
///
/// Dispatches to the widest SIMD path available on the running CPU and
/// falls back to [`l2_sqr_portable`] elsewhere.
#[inline]
#[must_use]
pub fn l2_sqr(a: &[f32], b: &[f32]) -> f32 {
    let n = a.len().min(b.len());
    let (a, b) = (&a[..n], &b[..n]);

    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("avx") {
            // SAFETY: AVX support verified at runtime.
            return unsafe { x86_64::l2_sqr_avx(a, b) };
        }
        // SAFETY: SSE2 is part of the x86_64 baseline.
        return unsafe { x86_64::l2_sqr_sse(a, b) };
    }

    #[cfg(not(target_arch = "x86_64"))]
    l2_sqr_portable(a, b)
}

/// Portable scalar squared Euclidean distance.
///
/// Reference implementation; the SIMD paths must agree with this within
/// floating-point tolerance.
#[inline]
#[must_use]
pub fn l2_sqr_portable(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// Squared distance between two byte vectors, as an exact integer.
///
/// Scalar accumulation unrolled four components at a time, with a
/// remainder loop for lengths that are not a multiple of four.
#[inline]
#[must_use]
pub fn l2_sqr_u8(a: &[u8], b: &[u8]) -> u32 {
    let n = a.len().min(b.len());
    let (a, b) = (&a[..n], &b[..n]);

    let mut res: u32 = 0;
    let mut chunks_a = a.chunks_exact(4);
    let mut chunks_b = b.chunks_exact(4);
    for (x, y) in (&mut chunks_a).zip(&mut chunks_b) {
        let d0 = x[0] as i32 - y[0] as i32;
        let d1 = x[1] as i32 - y[1] as i32;
        let d2 = x[2] as i32 - y[2] as i32;
        let d3 = x[3] as i32 - y[3] as i32;
        res += (d0 * d0 + d1 * d1 + d2 * d2 + d3 * d3) as u32;
    }
    for (&x, &y) in chunks_a
        .remainder()
        .iter()
        .zip(chunks_b.remainder().iter())
    {
        let d = x as i32 - y as i32;
        res += (d * d) as u32;
    }
    res
}

#[cfg(target_arch = "x86_64")]
mod x86_64 {
    //! AVX/SSE implementations of the float kernel.

    use std::arch::x86_64::{
        __m128, __m256, _mm256_add_ps, _mm256_loadu_ps, _mm256_mul_ps, _mm256_setzero_ps,
        _mm256_storeu_ps, _mm256_sub_ps, _mm_add_ps, _mm_loadu_ps, _mm_mul_ps, _mm_setzero_ps,
        _mm_storeu_ps, _mm_sub_ps,
    };

    /// AVX path: 16 floats per outer iteration, 8-lane accumulator.
    ///
    /// # Safety
    ///
    /// Requires AVX. Caller must verify via runtime detection.
    #[target_feature(enable = "avx")]
    pub unsafe fn l2_sqr_avx(a: &[f32], b: &[f32]) -> f32 {
        debug_assert_eq!(a.len(), b.len());

        let chunks = a.len() / 16;
        let mut pa = a.as_ptr();
        let mut pb = b.as_ptr();
        let mut sum: __m256 = _mm256_setzero_ps();

        for _ in 0..chunks {
            let v1 = _mm256_loadu_ps(pa);
            let v2 = _mm256_loadu_ps(pb);
            let diff = _mm256_sub_ps(v1, v2);
            sum = _mm256_add_ps(sum, _mm256_mul_ps(diff, diff));

            let v1 = _mm256_loadu_ps(pa.add(8));
            let v2 = _mm256_loadu_ps(pb.add(8));
            let diff = _mm256_sub_ps(v1, v2);
            sum = _mm256_add_ps(sum, _mm256_mul_ps(diff, diff));

            pa = pa.add(16);
            pb = pb.add(16);
        }

        let mut lanes = [0.0f32; 8];
        _mm256_storeu_ps(lanes.as_mut_ptr(), sum);
        let mut res = lanes.iter().sum::<f32>();

        for i in (chunks * 16)..a.len() {
            let d = a[i] - b[i];
            res += d * d;
        }
        res
    }

    /// SSE path: 4-lane accumulator over 4-float chunks.
    ///
    /// # Safety
    ///
    /// Requires SSE, which is part of the x86_64 baseline.
    #[target_feature(enable = "sse")]
    pub unsafe fn l2_sqr_sse(a: &[f32], b: &[f32]) -> f32 {
        debug_assert_eq!(a.len(), b.len());

        let chunks = a.len() / 4;
        let mut pa = a.as_ptr();
        let mut pb = b.as_ptr();
        let mut sum: __m128 = _mm_setzero_ps();

        for _ in 0..chunks {
            let v1 = _mm_loadu_ps(pa);
            let v2 = _mm_loadu_ps(pb);
            let diff = _mm_sub_ps(v1, v2);
            sum = _mm_add_ps(sum, _mm_mul_ps(diff, diff));
            pa = pa.add(4);
            pb = pb.add(4);
        }

        let mut lanes = [0.0f32; 4];
        _mm_storeu_ps(lanes.as_mut_ptr(), sum);
        let mut res = lanes.iter().sum::<f32>();

        for i in (chunks * 4)..a.len() {
            let d = a[i] - b[i];
            res += d * d;
        }
        res
    }
}

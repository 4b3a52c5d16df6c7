/// Scalar model of `TDPBSSD` on host buffers.
///
/// This is what the tile unit computes, written out as loops. Use it as the
/// correctness baseline for both backends.
///
/// # Arguments
///
/// * `dst` - Accumulator (m × n i32), row-major, accumulated into
/// * `lhs` - Left operand (m × k i8), row-major
/// * `rhs_packed` - Right operand in VNNI layout ((k/4) × (n·4) i8), see
///   [`pack_vnni`](crate::matrix::vnni::pack_vnni)
/// * `m` - Rows of `lhs` and `dst`
/// * `n` - Columns of `dst`
/// * `k` - Contraction length in bytes, a multiple of 4
pub fn dpbssd_reference(dst: &mut [i32], lhs: &[i8], rhs_packed: &[i8], m: usize, n: usize, k: usize) {
    for i in 0..m {
        for j in 0..n {
            let mut acc = dst[i * n + j];
            for group in 0..k / 4 {
                for byte in 0..4 {
                    let a = lhs[i * k + group * 4 + byte] as i32;
                    let b = rhs_packed[group * n * 4 + j * 4 + byte] as i32;
                    acc = acc.wrapping_add(a * b);
                }
            }
            dst[i * n + j] = acc;
        }
    }
}

/// Plain i8 matrix multiply: C += A × B, i-k-j order.
///
/// # Arguments
///
/// * `a` - Matrix A (m × k), row-major
/// * `b` - Matrix B (k × n), row-major
/// * `c` - Matrix C (m × n), row-major, accumulated into
pub fn matmul_i8_reference(a: &[i8], b: &[i8], c: &mut [i32], m: usize, n: usize, k: usize) {
    for i in 0..m {
        for p in 0..k {
            let a_ip = a[i * k + p] as i32;
            for j in 0..n {
                c[i * n + j] = c[i * n + j].wrapping_add(a_ip * b[p * n + j] as i32);
            }
        }
    }
}

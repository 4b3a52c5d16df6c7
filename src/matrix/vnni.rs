/// Repack a row-major K×N i8 matrix into the layout `TDPBSSD` reads.
///
/// The instruction consumes B four K-rows at a time: row `r` of the packed
/// tile holds, for every column `j`, the bytes `B[4r..4r+4][j]` side by side.
/// After packing, a tile multiply gives the same result as a plain matmul.
///
/// `k` must be a multiple of 4.
///
/// # Example
///
/// ```
/// use amxtile::matrix::vnni::pack_vnni;
///
/// // 4×2 matrix, columns are [1,2,3,4] and [5,6,7,8]
/// let b: Vec<i8> = vec![1, 5,
///                       2, 6,
///                       3, 7,
///                       4, 8];
///
/// assert_eq!(pack_vnni(&b, 4, 2), vec![1, 2, 3, 4, 5, 6, 7, 8]);
/// ```
pub fn pack_vnni(b: &[i8], k: usize, n: usize) -> Vec<i8> {
    assert_eq!(b.len(), k * n, "B: expected {}x{}={} elements", k, n, k * n);
    assert_eq!(k % 4, 0, "K must be a multiple of 4, got {}", k);

    let mut packed = vec![0i8; k * n];
    for p in 0..k {
        for j in 0..n {
            packed[(p / 4) * n * 4 + j * 4 + p % 4] = b[p * n + j];
        }
    }
    packed
}

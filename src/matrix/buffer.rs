//! Filling and printing host buffers for the demo.

use std::fmt::{Display, Write};

/// Sets every element of `buf` to `value`.
pub fn fill_buffer<T: Copy>(buf: &mut [T], value: T) {
    buf.fill(value);
}

/// Formats the first `rows × cols` elements as space-separated rows.
pub fn format_buffer<T: Display>(buf: &[T], rows: usize, cols: usize) -> String {
    let mut out = String::new();
    if cols == 0 {
        return out;
    }
    for row in buf.chunks(cols).take(rows) {
        for value in row {
            let _ = write!(out, "{} ", value);
        }
        out.push('\n');
    }
    out
}

//! Bitmap and little-endian helpers shared by the IPC decoders.
//!
//! Arrow validity bitmaps and boolean value buffers are LSB0 bit-packed:
//! bit `i` of the bitmap is bit `i % 8` of byte `i / 8`.

/// Number of bytes needed to hold `len` packed bits.
#[inline(always)]
pub fn bitmap_len(len: usize) -> usize {
    len.div_ceil(8)
}

/// Unpacks an LSB0 bit-packed buffer into exactly `len` booleans.
///
/// Bits past `len` in the final byte are ignored. Returns `None` when `buf`
/// holds fewer than `len` bits.
pub fn unpack_bits(buf: &[u8], len: usize) -> Option<Vec<bool>> {
    if buf.len() < bitmap_len(len) {
        return None;
    }
    Some((0..len).map(|i| ((buf[i / 8] >> (i % 8)) & 1) != 0).collect())
}

/// Builds a per-row validity vector from an Arrow validity buffer.
///
/// An empty buffer or a zero `null_count` means every row is valid, which is
/// how writers omit the bitmap. Returns `None` when a non-empty bitmap is too
/// short for `len` rows.
pub fn validity_from_bitmap(bitmap: &[u8], len: usize, null_count: usize) -> Option<Vec<bool>> {
    if bitmap.is_empty() || null_count == 0 {
        return Some(vec![true; len]);
    }
    unpack_bits(bitmap, len)
}

/// Packs a sequence of bools into a bit-packed buffer (LSB0).
/// Returns a new Vec<u8>.
pub fn pack_bits<I>(iter: I, len: usize) -> Vec<u8>
where
    I: Iterator<Item = bool>,
{
    let mut buf = vec![0u8; bitmap_len(len)];
    for (i, v) in iter.enumerate().take(len) {
        if v {
            buf[i / 8] |= 1 << (i % 8);
        }
    }
    buf
}

/// Reads a little-endian `u32` from the first four bytes of `buf`.
///
/// Caller guarantees `buf.len() >= 4`.
#[inline(always)]
pub fn read_u32_le(buf: &[u8]) -> u32 {
    u32::from_le_bytes(le_array::<4>(buf))
}

/// Copies the first `N` bytes of `buf` into an array.
///
/// Caller guarantees `buf.len() >= N`.
#[inline(always)]
pub(crate) fn le_array<const N: usize>(buf: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&buf[..N]);
    out
}

//! Lossless conversion between primitive slices and raw byte buffers.

use byteorder::{BigEndian, ByteOrder as _, LittleEndian};

/// Byte order of a serialized value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ByteOrder {
    LittleEndian,
    BigEndian,
}

impl ByteOrder {
    /// The byte order of the host platform.
    pub const fn native() -> Self {
        #[cfg(target_endian = "little")]
        {
            Self::LittleEndian
        }
        #[cfg(target_endian = "big")]
        {
            Self::BigEndian
        }
    }
}

macro_rules! impl_codec {
    ($ty:ty, $size:expr, $to:ident, $from:ident, $copy_to:ident, $copy_from:ident,
     $write_into:ident, $read_into:ident) => {
        /// Serializes the values into a freshly allocated byte buffer.
        pub fn $to(values: &[$ty], order: ByteOrder) -> Vec<u8> {
            let mut out = vec![0; values.len() * $size];
            $copy_to(values, &mut out, 0, order);
            out
        }

        /// Deserializes a whole byte buffer; the length must be a multiple
        /// of the element size.
        pub fn $from(bytes: &[u8], order: ByteOrder) -> Vec<$ty> {
            assert!(bytes.len() % $size == 0, "buffer length {} not a multiple of {}", bytes.len(), $size);
            let mut out = vec![Default::default(); bytes.len() / $size];
            $copy_from(bytes, 0, &mut out, order);
            out
        }

        /// Serializes into a caller-provided buffer at a byte offset,
        /// without intermediate allocations.
        pub fn $copy_to(values: &[$ty], out: &mut [u8], offset: usize, order: ByteOrder) {
            let dst = &mut out[offset..offset + values.len() * $size];
            match order {
                ByteOrder::LittleEndian => LittleEndian::$write_into(values, dst),
                ByteOrder::BigEndian => BigEndian::$write_into(values, dst),
            }
        }

        /// Deserializes from a byte offset into a caller-provided slice.
        pub fn $copy_from(bytes: &[u8], offset: usize, out: &mut [$ty], order: ByteOrder) {
            let src = &bytes[offset..offset + out.len() * $size];
            match order {
                ByteOrder::LittleEndian => LittleEndian::$read_into(src, out),
                ByteOrder::BigEndian => BigEndian::$read_into(src, out),
            }
        }
    };
}

impl_codec!(i16, 2, i16_to_bytes, i16_from_bytes, copy_i16_to_bytes, copy_i16_from_bytes,
    write_i16_into, read_i16_into);
impl_codec!(i32, 4, i32_to_bytes, i32_from_bytes, copy_i32_to_bytes, copy_i32_from_bytes,
    write_i32_into, read_i32_into);
impl_codec!(i64, 8, i64_to_bytes, i64_from_bytes, copy_i64_to_bytes, copy_i64_from_bytes,
    write_i64_into, read_i64_into);
impl_codec!(u16, 2, u16_to_bytes, u16_from_bytes, copy_u16_to_bytes, copy_u16_from_bytes,
    write_u16_into, read_u16_into);
impl_codec!(u32, 4, u32_to_bytes, u32_from_bytes, copy_u32_to_bytes, copy_u32_from_bytes,
    write_u32_into, read_u32_into);
impl_codec!(u64, 8, u64_to_bytes, u64_from_bytes, copy_u64_to_bytes, copy_u64_from_bytes,
    write_u64_into, read_u64_into);
impl_codec!(f32, 4, f32_to_bytes, f32_from_bytes, copy_f32_to_bytes, copy_f32_from_bytes,
    write_f32_into, read_f32_into);
impl_codec!(f64, 8, f64_to_bytes, f64_from_bytes, copy_f64_to_bytes, copy_f64_from_bytes,
    write_f64_into, read_f64_into);

// Single-byte values have no byte order but keep the same signatures so
// the call sites stay uniform.

pub fn i8_to_bytes(values: &[i8], _order: ByteOrder) -> Vec<u8> {
    values.iter().map(|&v| v as u8).collect()
}

pub fn i8_from_bytes(bytes: &[u8], _order: ByteOrder) -> Vec<i8> {
    bytes.iter().map(|&b| b as i8).collect()
}

pub fn copy_i8_to_bytes(values: &[i8], out: &mut [u8], offset: usize, _order: ByteOrder) {
    for (dst, &v) in out[offset..offset + values.len()].iter_mut().zip(values) {
        *dst = v as u8;
    }
}

pub fn copy_i8_from_bytes(bytes: &[u8], offset: usize, out: &mut [i8], _order: ByteOrder) {
    for (dst, &b) in out.iter_mut().zip(&bytes[offset..offset + out.len()]) {
        *dst = b as i8;
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    #[test]
    pub fn test_roundtrip_fixed_order() {
        let xs: Vec<i32> = vec![0, -1, 1, i32::MIN, i32::MAX, 42];
        for order in [ByteOrder::LittleEndian, ByteOrder::BigEndian] {
            assert_eq!(i32_from_bytes(&i32_to_bytes(&xs, order), order), xs);
        }
        let fs: Vec<f64> = vec![0.0, -0.5, 1e300, f64::MIN_POSITIVE];
        for order in [ByteOrder::LittleEndian, ByteOrder::BigEndian] {
            assert_eq!(f64_from_bytes(&f64_to_bytes(&fs, order), order), fs);
        }
    }

    #[test]
    pub fn test_known_encoding() {
        assert_eq!(i16_to_bytes(&[0x0102], ByteOrder::LittleEndian), vec![0x02, 0x01]);
        assert_eq!(i16_to_bytes(&[0x0102], ByteOrder::BigEndian), vec![0x01, 0x02]);
        assert_eq!(
            i64_to_bytes(&[0x0102_0304_0506_0708], ByteOrder::BigEndian),
            vec![1, 2, 3, 4, 5, 6, 7, 8]
        );
    }

    #[test]
    pub fn test_offset_variants() {
        let mut buf = vec![0xffu8; 12];
        copy_i32_to_bytes(&[1, 2], &mut buf, 4, ByteOrder::LittleEndian);
        assert_eq!(&buf[..4], &[0xff; 4]);
        let mut out = [0i32; 2];
        copy_i32_from_bytes(&buf, 4, &mut out, ByteOrder::LittleEndian);
        assert_eq!(out, [1, 2]);
    }

    #[test]
    pub fn test_i8_passthrough() {
        let xs: Vec<i8> = vec![-128, -1, 0, 1, 127];
        let bytes = i8_to_bytes(&xs, ByteOrder::LittleEndian);
        assert_eq!(i8_from_bytes(&bytes, ByteOrder::BigEndian), xs);
    }

    #[test]
    pub fn test_random_roundtrip() {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        let xs: Vec<i64> = (0..257).map(|_| rng.gen()).collect();
        for order in [ByteOrder::LittleEndian, ByteOrder::BigEndian] {
            assert_eq!(i64_from_bytes(&i64_to_bytes(&xs, order), order), xs);
        }
    }
}

//! The datatype descriptor model: a native description of every on-disk
//! datatype kind the library understands.

use crate::bytes::ByteOrder;
use crate::string::CharacterEncoding;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum IntSize {
    U1 = 1,
    U2 = 2,
    U4 = 4,
    U8 = 8,
}

impl IntSize {
    pub fn from_int(size: usize) -> Option<Self> {
        match size {
            1 => Some(Self::U1),
            2 => Some(Self::U2),
            4 => Some(Self::U4),
            8 => Some(Self::U8),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum FloatSize {
    U4 = 4,
    U8 = 8,
}

impl FloatSize {
    pub fn from_int(size: usize) -> Option<Self> {
        match size {
            4 => Some(Self::U4),
            8 => Some(Self::U8),
            _ => None,
        }
    }
}

/// Definition of an enumeration type: an ordered list of value names.
/// Ordinals are the list positions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnumDef {
    pub name: String,
    pub values: Vec<String>,
}

impl EnumDef {
    pub fn new(name: impl Into<String>, values: &[&str]) -> Self {
        Self { name: name.into(), values: values.iter().map(|&v| v.into()).collect() }
    }

    pub fn cardinality(&self) -> usize {
        self.values.len()
    }

    pub fn index_of(&self, value: &str) -> Option<usize> {
        self.values.iter().position(|v| v == value)
    }

    /// The smallest signed integer storage that holds every ordinal.
    /// The boundaries are strict: 127 values already require 2 bytes and
    /// 32767 values require 4, and the same bound is applied during
    /// ordinal validation.
    pub fn storage_size(&self) -> IntSize {
        if self.cardinality() < i8::MAX as usize {
            IntSize::U1
        } else if self.cardinality() < i16::MAX as usize {
            IntSize::U2
        } else {
            IntSize::U4
        }
    }
}

/// One member of a compound datatype; `offset` is the byte position of
/// the member inside the packed record.
#[derive(Clone, Debug, PartialEq)]
pub struct CompoundMemberDesc {
    pub name: String,
    pub offset: usize,
    pub ty: TypeDescriptor,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CompoundDesc {
    pub members: Vec<CompoundMemberDesc>,
    pub size: usize,
}

/// A native description of an HDF5 datatype.
#[derive(Clone, Debug, PartialEq)]
pub enum TypeDescriptor {
    Integer { size: IntSize, signed: bool, order: ByteOrder },
    Float { size: FloatSize, order: ByteOrder },
    /// Fixed-length string; `len` is the cell size in bytes including
    /// the NUL terminator.
    FixedString { len: usize, encoding: CharacterEncoding },
    VariableString { encoding: CharacterEncoding },
    Enumeration(EnumDef),
    /// A packed bit field stored as `words` 64-bit words.
    BitField { words: usize },
    Opaque { tag: String, len: usize },
    /// An array datatype. Always wraps a scalar element kind, never
    /// another array.
    Array { elem: Box<TypeDescriptor>, dims: Vec<usize> },
    Compound(CompoundDesc),
    /// An object reference (region references are not supported).
    Reference,
}

impl TypeDescriptor {
    /// The on-disk size of one element of this type, in bytes.
    pub fn size(&self) -> usize {
        match *self {
            Self::Integer { size, .. } => size as usize,
            Self::Float { size, .. } => size as usize,
            Self::FixedString { len, .. } => len,
            Self::VariableString { .. } => std::mem::size_of::<*const u8>(),
            Self::Enumeration(ref def) => def.storage_size() as usize,
            Self::BitField { words } => words * 8,
            Self::Opaque { len, .. } => len,
            Self::Array { ref elem, ref dims } => elem.size() * dims.iter().product::<usize>(),
            Self::Compound(ref desc) => desc.size,
            Self::Reference => 8,
        }
    }

    pub fn storage_class(&self) -> StorageClass {
        match *self {
            Self::Integer { .. } => StorageClass::Integer,
            Self::Float { .. } => StorageClass::Float,
            Self::FixedString { .. } | Self::VariableString { .. } => StorageClass::String,
            Self::Enumeration(_) => StorageClass::Enum,
            Self::BitField { .. } => StorageClass::BitField,
            Self::Opaque { .. } => StorageClass::Opaque,
            Self::Array { .. } => StorageClass::Array,
            Self::Compound(_) => StorageClass::Compound,
            Self::Reference => StorageClass::Reference,
        }
    }
}

/// The coarse on-disk class of a datatype, mirroring the classes the
/// library reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageClass {
    Integer,
    Float,
    String,
    BitField,
    Opaque,
    Enum,
    Array,
    Compound,
    Reference,
}

/// A semantic annotation stored alongside a dataset or compound member,
/// independent of the bit layout.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TypeVariant {
    #[default]
    None,
    TimestampMillisecondsSinceEpoch,
    Utf8String,
    Bitfield,
}

impl TypeVariant {
    /// Stable value names, in ordinal order; this is the member list of
    /// the committed type-variant enumeration.
    pub fn names() -> &'static [&'static str] {
        &["NONE", "TIMESTAMP_MILLISECONDS_SINCE_EPOCH", "STRING_UTF8", "BITFIELD"]
    }

    pub fn ordinal(self) -> usize {
        match self {
            Self::None => 0,
            Self::TimestampMillisecondsSinceEpoch => 1,
            Self::Utf8String => 2,
            Self::Bitfield => 3,
        }
    }

    pub fn from_ordinal(ordinal: usize) -> Option<Self> {
        match ordinal {
            0 => Some(Self::None),
            1 => Some(Self::TimestampMillisecondsSinceEpoch),
            2 => Some(Self::Utf8String),
            3 => Some(Self::Bitfield),
            _ => None,
        }
    }
}

/// The host-side kind of a value, used to dispatch compound member
/// factories.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HostKind {
    Bool,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    String,
    Date,
    BitField,
    Opaque,
    Enum,
    /// Escape hatch for externally registered factories.
    Custom(&'static str),
}

/// A primitive element type of the typed I/O surface.
///
/// # Safety
///
/// `type_descriptor()` must describe the exact memory layout of `Self`,
/// since buffers of `Self` are handed to the binding for raw I/O.
pub unsafe trait PrimitiveKind: Copy + Default + PartialEq + std::fmt::Debug + 'static {
    /// The little-endian storage descriptor for this type.
    fn type_descriptor() -> TypeDescriptor;
}

macro_rules! impl_primitive {
    ($ty:ty, Integer, $size:ident) => {
        unsafe impl PrimitiveKind for $ty {
            fn type_descriptor() -> TypeDescriptor {
                TypeDescriptor::Integer {
                    size: IntSize::$size,
                    signed: true,
                    order: ByteOrder::LittleEndian,
                }
            }
        }
    };
    ($ty:ty, Float, $size:ident) => {
        unsafe impl PrimitiveKind for $ty {
            fn type_descriptor() -> TypeDescriptor {
                TypeDescriptor::Float { size: FloatSize::$size, order: ByteOrder::LittleEndian }
            }
        }
    };
}

impl_primitive!(i8, Integer, U1);
impl_primitive!(i16, Integer, U2);
impl_primitive!(i32, Integer, U4);
impl_primitive!(i64, Integer, U8);
impl_primitive!(f32, Float, U4);
impl_primitive!(f64, Float, U8);

#[cfg(test)]
pub mod tests {
    use super::TypeDescriptor as TD;
    use super::*;

    #[test]
    pub fn test_scalar_sizes() {
        assert_eq!(i8::type_descriptor().size(), 1);
        assert_eq!(i16::type_descriptor().size(), 2);
        assert_eq!(i32::type_descriptor().size(), 4);
        assert_eq!(i64::type_descriptor().size(), 8);
        assert_eq!(f32::type_descriptor().size(), 4);
        assert_eq!(f64::type_descriptor().size(), 8);
    }

    #[test]
    pub fn test_composite_sizes() {
        assert_eq!(TD::FixedString { len: 16, encoding: Default::default() }.size(), 16);
        assert_eq!(TD::BitField { words: 3 }.size(), 24);
        assert_eq!(TD::Opaque { tag: "blob".into(), len: 10 }.size(), 10);
        let arr = TD::Array { elem: Box::new(f64::type_descriptor()), dims: vec![2, 3] };
        assert_eq!(arr.size(), 48);
        assert_eq!(arr.storage_class(), StorageClass::Array);
    }

    #[test]
    pub fn test_enum_storage_size() {
        let def = |n: usize| EnumDef {
            name: "e".into(),
            values: (0..n).map(|i| i.to_string()).collect(),
        };
        assert_eq!(def(2).storage_size(), IntSize::U1);
        assert_eq!(def(126).storage_size(), IntSize::U1);
        assert_eq!(def(127).storage_size(), IntSize::U2);
        assert_eq!(def(32766).storage_size(), IntSize::U2);
        assert_eq!(def(32767).storage_size(), IntSize::U4);
    }

    #[test]
    pub fn test_type_variant_ordinals() {
        for (i, _) in TypeVariant::names().iter().enumerate() {
            assert_eq!(TypeVariant::from_ordinal(i).unwrap().ordinal(), i);
        }
        assert_eq!(TypeVariant::from_ordinal(99), None);
    }

    #[test]
    pub fn test_enum_lookup() {
        let def = EnumDef::new("Color", &["RED", "GREEN", "BLUE"]);
        assert_eq!(def.index_of("GREEN"), Some(1));
        assert_eq!(def.index_of("green"), None);
        assert_eq!(def.cardinality(), 3);
    }
}

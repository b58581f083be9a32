//! Datatype descriptors and value containers for the `ezhdf5` crate.
//!
//! This crate contains everything that does not require the HDF5 library
//! itself: the datatype descriptor model, the dense N-dimensional array
//! model, endian-aware byte codecs, bit-field packing, enumeration value
//! containers, and the compound record byteifyer.

#![cfg_attr(not(test), allow(dead_code))]

pub mod bitset;
pub mod bytes;
pub mod byteify;
pub mod enums;
pub mod h5type;
pub mod mdarray;
pub mod record;
pub mod string;

pub use self::bitset::BitField;
pub use self::byteify::{
    CompoundLayout, MemberEncoder, MemberError, MemberFactory, MemberFactoryRegistry, MemberKind,
    MemberMapping,
};
pub use self::bytes::ByteOrder;
pub use self::enums::{EnumArray, EnumError, EnumValue, OrdinalStorage};
pub use self::h5type::{
    CompoundDesc, CompoundMemberDesc, EnumDef, FloatSize, HostKind, IntSize, PrimitiveKind,
    StorageClass, TypeDescriptor, TypeVariant,
};
pub use self::mdarray::{MDArray, ShapeError};
pub use self::record::{
    AccessMode, ArrayedRecord, BoundRecord, CompoundRecord, FieldAccess, FieldValue, ListedRecord,
    MappedRecord, MemberSlot, RecordAccess,
};
pub use self::string::CharacterEncoding;

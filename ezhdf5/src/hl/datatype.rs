use std::fmt::{self, Debug};

use hdf5_sys::h5::H5free_memory;
use hdf5_sys::h5t::{
    H5T_class_t, H5T_cset_t, H5T_order_t, H5T_sign_t, H5Tarray_create2, H5Tcopy, H5Tcreate,
    H5Tenum_create, H5Tenum_insert, H5Tequal, H5Tget_array_dims2, H5Tget_array_ndims,
    H5Tget_class, H5Tget_cset, H5Tget_member_name, H5Tget_member_offset, H5Tget_member_type,
    H5Tget_native_type, H5Tget_nmembers, H5Tget_order, H5Tget_sign, H5Tget_size, H5Tget_super,
    H5Tget_tag, H5Tinsert, H5Tis_variable_str, H5Tset_cset, H5Tset_size, H5Tset_tag,
    H5T_direction_t, H5T_VARIABLE,
};

use crate::globals::*;
use crate::internal_prelude::*;

/// Represents the HDF5 datatype object.
#[repr(transparent)]
#[derive(Clone)]
pub struct Datatype(Handle);

impl ObjectClass for Datatype {
    const NAME: &'static str = "datatype";
    const VALID_TYPES: &'static [H5I_type_t] = &[H5I_DATATYPE];

    fn from_handle(handle: Handle) -> Self {
        Self(handle)
    }

    fn handle(&self) -> &Handle {
        &self.0
    }

    fn short_repr(&self) -> Option<String> {
        self.to_descriptor().ok().map(|desc| format!("{desc:?}"))
    }
}

impl Debug for Datatype {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.debug_fmt(f)
    }
}

impl PartialEq for Datatype {
    fn eq(&self, other: &Self) -> bool {
        h5call!(H5Tequal(self.id(), other.id())).map(|eq| eq > 0).unwrap_or(false)
    }
}

/// Returns the pre-defined native (memory) type id of a primitive kind.
/// The returned id is a library constant and must not be closed.
pub(crate) fn native_primitive_id<T: PrimitiveKind>() -> hid_t {
    match T::type_descriptor() {
        TypeDescriptor::Integer { size: IntSize::U1, .. } => *H5T_NATIVE_INT8,
        TypeDescriptor::Integer { size: IntSize::U2, .. } => *H5T_NATIVE_INT16,
        TypeDescriptor::Integer { size: IntSize::U4, .. } => *H5T_NATIVE_INT32,
        TypeDescriptor::Integer { size: IntSize::U8, .. } => *H5T_NATIVE_INT64,
        TypeDescriptor::Float { size: FloatSize::U4, .. } => *H5T_NATIVE_FLOAT,
        TypeDescriptor::Float { size: FloatSize::U8, .. } => *H5T_NATIVE_DOUBLE,
        _ => H5I_INVALID_HID,
    }
}

/// Returns the pre-defined little-endian storage type id of a primitive
/// kind. The returned id is a library constant and must not be closed.
pub(crate) fn storage_primitive_id<T: PrimitiveKind>() -> hid_t {
    match T::type_descriptor() {
        TypeDescriptor::Integer { size: IntSize::U1, .. } => *H5T_STD_I8LE,
        TypeDescriptor::Integer { size: IntSize::U2, .. } => *H5T_STD_I16LE,
        TypeDescriptor::Integer { size: IntSize::U4, .. } => *H5T_STD_I32LE,
        TypeDescriptor::Integer { size: IntSize::U8, .. } => *H5T_STD_I64LE,
        TypeDescriptor::Float { size: FloatSize::U4, .. } => *H5T_IEEE_F32LE,
        TypeDescriptor::Float { size: FloatSize::U8, .. } => *H5T_IEEE_F64LE,
        _ => H5I_INVALID_HID,
    }
}

fn integer_type_id(size: IntSize, signed: bool, order: ByteOrder) -> hid_t {
    match (order, signed, size) {
        (ByteOrder::LittleEndian, true, IntSize::U1) => *H5T_STD_I8LE,
        (ByteOrder::LittleEndian, true, IntSize::U2) => *H5T_STD_I16LE,
        (ByteOrder::LittleEndian, true, IntSize::U4) => *H5T_STD_I32LE,
        (ByteOrder::LittleEndian, true, IntSize::U8) => *H5T_STD_I64LE,
        (ByteOrder::LittleEndian, false, IntSize::U1) => *H5T_STD_U8LE,
        (ByteOrder::LittleEndian, false, IntSize::U2) => *H5T_STD_U16LE,
        (ByteOrder::LittleEndian, false, IntSize::U4) => *H5T_STD_U32LE,
        (ByteOrder::LittleEndian, false, IntSize::U8) => *H5T_STD_U64LE,
        (ByteOrder::BigEndian, true, IntSize::U1) => *H5T_STD_I8BE,
        (ByteOrder::BigEndian, true, IntSize::U2) => *H5T_STD_I16BE,
        (ByteOrder::BigEndian, true, IntSize::U4) => *H5T_STD_I32BE,
        (ByteOrder::BigEndian, true, IntSize::U8) => *H5T_STD_I64BE,
        // unsigned big-endian storage is not produced by this library
        (ByteOrder::BigEndian, false, IntSize::U1) => *H5T_STD_U8LE,
        (ByteOrder::BigEndian, false, IntSize::U2) => *H5T_STD_U16LE,
        (ByteOrder::BigEndian, false, IntSize::U4) => *H5T_STD_U32LE,
        (ByteOrder::BigEndian, false, IntSize::U8) => *H5T_STD_U64LE,
    }
}

fn enum_base_id(size: IntSize, native: bool) -> hid_t {
    match (native, size) {
        (true, IntSize::U1) => *H5T_NATIVE_INT8,
        (true, IntSize::U2) => *H5T_NATIVE_INT16,
        (false, IntSize::U1) => *H5T_STD_I8LE,
        (false, IntSize::U2) => *H5T_STD_I16LE,
        (true, _) => *H5T_NATIVE_INT32,
        (false, _) => *H5T_STD_I32LE,
    }
}

impl Datatype {
    /// Compiles a descriptor into a fresh datatype object in its
    /// storage (on-disk) form.
    pub fn from_descriptor(desc: &TypeDescriptor) -> Result<Self> {
        h5lock_s!(Self::from_id(unsafe { Self::compile(desc, false) }?))
    }

    /// Compiles a descriptor into a fresh datatype object in its native
    /// (memory) form.
    pub fn from_descriptor_native(desc: &TypeDescriptor) -> Result<Self> {
        h5lock_s!(Self::from_id(unsafe { Self::compile(desc, true) }?))
    }

    unsafe fn compile(desc: &TypeDescriptor, native: bool) -> Result<hid_t> {
        match *desc {
            TypeDescriptor::Integer { size, signed, order } => {
                let base = if native {
                    match size {
                        IntSize::U1 => *H5T_NATIVE_INT8,
                        IntSize::U2 => *H5T_NATIVE_INT16,
                        IntSize::U4 => *H5T_NATIVE_INT32,
                        IntSize::U8 => *H5T_NATIVE_INT64,
                    }
                } else {
                    integer_type_id(size, signed, order)
                };
                h5check(H5Tcopy(base))
            }
            TypeDescriptor::Float { size, order } => {
                let base = match (native, size, order) {
                    (true, FloatSize::U4, _) => *H5T_NATIVE_FLOAT,
                    (true, FloatSize::U8, _) => *H5T_NATIVE_DOUBLE,
                    (false, FloatSize::U4, ByteOrder::LittleEndian) => *H5T_IEEE_F32LE,
                    (false, FloatSize::U8, ByteOrder::LittleEndian) => *H5T_IEEE_F64LE,
                    (false, FloatSize::U4, ByteOrder::BigEndian) => *H5T_IEEE_F32BE,
                    (false, FloatSize::U8, ByteOrder::BigEndian) => *H5T_IEEE_F64BE,
                };
                h5check(H5Tcopy(base))
            }
            TypeDescriptor::FixedString { len, encoding } => {
                let id = h5check(H5Tcopy(*H5T_C_S1))?;
                h5check(H5Tset_size(id, len))?;
                if encoding == CharacterEncoding::Utf8 {
                    h5check(H5Tset_cset(id, H5T_cset_t::H5T_CSET_UTF8))?;
                }
                Ok(id)
            }
            TypeDescriptor::VariableString { encoding } => {
                let id = h5check(H5Tcopy(*H5T_C_S1))?;
                h5check(H5Tset_size(id, H5T_VARIABLE))?;
                if encoding == CharacterEncoding::Utf8 {
                    h5check(H5Tset_cset(id, H5T_cset_t::H5T_CSET_UTF8))?;
                }
                Ok(id)
            }
            TypeDescriptor::Enumeration(ref def) => {
                let size = def.storage_size();
                let id = h5check(H5Tenum_create(enum_base_id(size, native)))?;
                for (ordinal, value) in def.values.iter().enumerate() {
                    let name = to_cstring(value.as_str())?;
                    // the inserted value must have the base type's width
                    let v8 = ordinal as i8;
                    let v16 = ordinal as i16;
                    let v32 = ordinal as i32;
                    let ptr: *const c_void = match size {
                        IntSize::U1 => (&v8 as *const i8).cast(),
                        IntSize::U2 => (&v16 as *const i16).cast(),
                        _ => (&v32 as *const i32).cast(),
                    };
                    h5check(H5Tenum_insert(id, name.as_ptr(), ptr))?;
                }
                Ok(id)
            }
            TypeDescriptor::BitField { words } => {
                let base = if native { *H5T_NATIVE_B64 } else { *H5T_STD_B64LE };
                if words == 1 {
                    h5check(H5Tcopy(base))
                } else {
                    let dims = [words as hsize_t];
                    h5check(H5Tarray_create2(base, 1, dims.as_ptr()))
                }
            }
            TypeDescriptor::Opaque { ref tag, len } => {
                let id = h5check(H5Tcreate(H5T_class_t::H5T_OPAQUE, len))?;
                let tag = to_cstring(tag.as_str())?;
                h5check(H5Tset_tag(id, tag.as_ptr()))?;
                Ok(id)
            }
            TypeDescriptor::Array { ref elem, ref dims } => {
                let arena = Arena::new();
                let elem_id = arena.adopt(Self::compile(elem, native)?)?;
                let dims: Vec<hsize_t> = dims.iter().map(|&d| d as _).collect();
                h5check(H5Tarray_create2(elem_id, dims.len() as _, dims.as_ptr()))
            }
            TypeDescriptor::Compound(ref compound) => {
                let id = h5check(H5Tcreate(H5T_class_t::H5T_COMPOUND, compound.size))?;
                let arena = Arena::new();
                for member in &compound.members {
                    let member_id = arena.adopt(Self::compile(&member.ty, native)?)?;
                    let name = to_cstring(member.name.as_str())?;
                    h5check(H5Tinsert(id, name.as_ptr(), member.offset, member_id))?;
                }
                Ok(id)
            }
            TypeDescriptor::Reference => h5check(H5Tcopy(*H5T_STD_REF_OBJ)),
        }
    }

    /// Parses the datatype back into a descriptor.
    pub fn to_descriptor(&self) -> Result<TypeDescriptor> {
        h5lock_s!(unsafe { Self::parse(self.id()) })
    }

    unsafe fn parse(type_id: hid_t) -> Result<TypeDescriptor> {
        let class = H5Tget_class(type_id);
        let size = h5check(H5Tget_size(type_id))? as usize;
        match class {
            H5T_class_t::H5T_INTEGER => {
                let signed = H5Tget_sign(type_id) == H5T_sign_t::H5T_SGN_2;
                let order = parse_order(H5Tget_order(type_id));
                let size = IntSize::from_int(size)
                    .ok_or_else(|| Error::TypeMismatch(format!("bad integer size: {size}")))?;
                Ok(TypeDescriptor::Integer { size, signed, order })
            }
            H5T_class_t::H5T_FLOAT => {
                let order = parse_order(H5Tget_order(type_id));
                let size = FloatSize::from_int(size)
                    .ok_or_else(|| Error::TypeMismatch(format!("bad float size: {size}")))?;
                Ok(TypeDescriptor::Float { size, order })
            }
            H5T_class_t::H5T_STRING => {
                let encoding = match H5Tget_cset(type_id) {
                    H5T_cset_t::H5T_CSET_UTF8 => CharacterEncoding::Utf8,
                    _ => CharacterEncoding::Ascii,
                };
                if h5check(H5Tis_variable_str(type_id))? > 0 {
                    Ok(TypeDescriptor::VariableString { encoding })
                } else {
                    Ok(TypeDescriptor::FixedString { len: size, encoding })
                }
            }
            H5T_class_t::H5T_BITFIELD => {
                Ok(TypeDescriptor::BitField { words: (size + 7) / 8 })
            }
            H5T_class_t::H5T_OPAQUE => {
                let tag_ptr = H5Tget_tag(type_id);
                let tag = string_from_cstr(tag_ptr);
                if !tag_ptr.is_null() {
                    H5free_memory(tag_ptr.cast());
                }
                Ok(TypeDescriptor::Opaque { tag, len: size })
            }
            H5T_class_t::H5T_ENUM => {
                let n = h5check(H5Tget_nmembers(type_id))? as usize;
                let mut values = Vec::with_capacity(n);
                for i in 0..n {
                    let name_ptr = H5Tget_member_name(type_id, i as _);
                    ensure!(!name_ptr.is_null(), "unable to get enum member name");
                    values.push(string_from_cstr(name_ptr));
                    H5free_memory(name_ptr.cast());
                }
                Ok(TypeDescriptor::Enumeration(EnumDef { name: String::new(), values }))
            }
            H5T_class_t::H5T_ARRAY => {
                let ndims = h5check(H5Tget_array_ndims(type_id))? as usize;
                let mut dims = vec![0 as hsize_t; ndims];
                h5check(H5Tget_array_dims2(type_id, dims.as_mut_ptr()))?;
                let arena = Arena::new();
                let super_id = arena.adopt(h5check(H5Tget_super(type_id))?)?;
                let elem = Self::parse(super_id)?;
                // a b64 array is the storage form of a multi-word bit field
                if let TypeDescriptor::BitField { words: 1 } = elem {
                    if ndims == 1 {
                        return Ok(TypeDescriptor::BitField { words: dims[0] as usize });
                    }
                }
                Ok(TypeDescriptor::Array {
                    elem: Box::new(elem),
                    dims: dims.into_iter().map(|d| d as _).collect(),
                })
            }
            H5T_class_t::H5T_COMPOUND => {
                let n = h5check(H5Tget_nmembers(type_id))? as usize;
                let mut members = Vec::with_capacity(n);
                let arena = Arena::new();
                for i in 0..n {
                    let name_ptr = H5Tget_member_name(type_id, i as _);
                    ensure!(!name_ptr.is_null(), "unable to get compound member name");
                    let name = string_from_cstr(name_ptr);
                    H5free_memory(name_ptr.cast());
                    let offset = H5Tget_member_offset(type_id, i as _) as usize;
                    let member_id = arena.adopt(h5check(H5Tget_member_type(type_id, i as _))?)?;
                    let ty = Self::parse(member_id)?;
                    members.push(ezhdf5_types::CompoundMemberDesc { name, offset, ty });
                }
                Ok(TypeDescriptor::Compound(CompoundDesc { members, size }))
            }
            H5T_class_t::H5T_REFERENCE => Ok(TypeDescriptor::Reference),
            _ => Err(Error::TypeMismatch(format!("unsupported datatype class: {class:?}"))),
        }
    }

    pub fn size(&self) -> usize {
        h5call!(H5Tget_size(self.id())).unwrap_or(0) as _
    }

    pub(crate) fn class(&self) -> H5T_class_t {
        h5lock!(H5Tget_class(self.id()))
    }

    pub fn is_variable_string(&self) -> bool {
        h5call!(H5Tis_variable_str(self.id())).map(|v| v > 0).unwrap_or(false)
    }

    /// The native (memory) counterpart of this datatype.
    pub fn to_native(&self) -> Result<Self> {
        Self::from_id(h5call!(H5Tget_native_type(
            self.id(),
            H5T_direction_t::H5T_DIR_DEFAULT
        ))?)
    }
}

fn parse_order(order: H5T_order_t) -> ByteOrder {
    match order {
        H5T_order_t::H5T_ORDER_BE => ByteOrder::BigEndian,
        _ => ByteOrder::LittleEndian,
    }
}

#[cfg(test)]
pub mod tests {
    use super::Datatype;
    use crate::internal_prelude::*;

    #[test]
    pub fn test_primitive_roundtrip() {
        for desc in [
            i8::type_descriptor(),
            i16::type_descriptor(),
            i32::type_descriptor(),
            i64::type_descriptor(),
            f32::type_descriptor(),
            f64::type_descriptor(),
        ] {
            let dtype = Datatype::from_descriptor(&desc).unwrap();
            assert_eq!(dtype.to_descriptor().unwrap(), desc);
            assert_eq!(dtype.size(), desc.size());
        }
    }

    #[test]
    pub fn test_string_types() {
        let desc = TypeDescriptor::FixedString { len: 16, encoding: CharacterEncoding::Utf8 };
        let dtype = Datatype::from_descriptor(&desc).unwrap();
        assert_eq!(dtype.size(), 16);
        assert_eq!(dtype.to_descriptor().unwrap(), desc);

        let desc = TypeDescriptor::VariableString { encoding: CharacterEncoding::Utf8 };
        let dtype = Datatype::from_descriptor(&desc).unwrap();
        assert!(dtype.is_variable_string());
        assert_eq!(dtype.to_descriptor().unwrap(), desc);
    }

    #[test]
    pub fn test_enum_type() {
        let desc = TypeDescriptor::Enumeration(EnumDef::new("Color", &["RED", "GREEN", "BLUE"]));
        let dtype = Datatype::from_descriptor(&desc).unwrap();
        assert_eq!(dtype.size(), 1);
        match dtype.to_descriptor().unwrap() {
            TypeDescriptor::Enumeration(def) => {
                assert_eq!(def.values, vec!["RED", "GREEN", "BLUE"]);
            }
            other => panic!("expected enum, got {other:?}"),
        }
    }

    #[test]
    pub fn test_compound_type() {
        let members = vec![
            ezhdf5_types::CompoundMemberDesc {
                name: "id".into(),
                offset: 0,
                ty: i32::type_descriptor(),
            },
            ezhdf5_types::CompoundMemberDesc {
                name: "value".into(),
                offset: 4,
                ty: f64::type_descriptor(),
            },
        ];
        let desc = TypeDescriptor::Compound(CompoundDesc { members, size: 12 });
        let dtype = Datatype::from_descriptor(&desc).unwrap();
        assert_eq!(dtype.size(), 12);
        match dtype.to_descriptor().unwrap() {
            TypeDescriptor::Compound(parsed) => {
                assert_eq!(parsed.size, 12);
                assert_eq!(parsed.members[1].name, "value");
                assert_eq!(parsed.members[1].offset, 4);
            }
            other => panic!("expected compound, got {other:?}"),
        }
    }

    #[test]
    pub fn test_bitfield_and_array() {
        let desc = TypeDescriptor::BitField { words: 1 };
        let dtype = Datatype::from_descriptor(&desc).unwrap();
        assert_eq!(dtype.size(), 8);
        assert_eq!(dtype.to_descriptor().unwrap(), desc);

        let desc = TypeDescriptor::BitField { words: 3 };
        let dtype = Datatype::from_descriptor(&desc).unwrap();
        assert_eq!(dtype.to_descriptor().unwrap(), desc);

        let desc = TypeDescriptor::Array {
            elem: Box::new(f32::type_descriptor()),
            dims: vec![2, 5],
        };
        let dtype = Datatype::from_descriptor(&desc).unwrap();
        assert_eq!(dtype.size(), 40);
        assert_eq!(dtype.to_descriptor().unwrap(), desc);
    }

    #[test]
    pub fn test_opaque_type() {
        let desc = TypeDescriptor::Opaque { tag: "image/raw".into(), len: 32 };
        let dtype = Datatype::from_descriptor(&desc).unwrap();
        assert_eq!(dtype.to_descriptor().unwrap(), desc);
    }

    #[test]
    pub fn test_equality() {
        let a = Datatype::from_descriptor(&i32::type_descriptor()).unwrap();
        let b = Datatype::from_descriptor(&i32::type_descriptor()).unwrap();
        let c = Datatype::from_descriptor(&i64::type_descriptor()).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}

//! Typed, path-addressed reading and writing of HDF5 files.
//!
//! This crate provides a high-level, ease-of-use oriented API over the
//! `HDF5` library:
//!
//! - Path-addressed readers and writers for scalars, 1-D arrays,
//!   matrices and N-dimensional arrays of all primitive kinds, plus
//!   strings, booleans, bit fields, opaque blobs, enumerations and
//!   compound records.
//! - Block-wise I/O with hyperslab planning and natural (chunk-sized)
//!   block iteration for streaming large datasets.
//! - A per-file registry of committed named datatypes with
//!   deduplication and compatibility checking.
//! - Automatic storage layout selection (compact / contiguous /
//!   chunked), gzip compression and in-place extension of existing
//!   datasets.
//!
//! Thread-safety with non-threadsafe `HDF5` builds is guaranteed via a
//! global reentrant mutex. Direct low-level bindings are provided by the
//! `hdf5-sys` crate.

#![cfg_attr(not(test), allow(dead_code))]
#![allow(clippy::missing_safety_doc)]

mod export {
    pub use crate::{
        arena::Arena,
        error::{silence_errors, Error, ErrorFrame, ErrorStack, ExpandedErrorStack, Result},
        hl::{
            blocks::{DataBlock, MDDataBlock, NaturalBlockIndex, NaturalBlocks},
            compound::CompoundType,
            datatype::Datatype,
            dataspace::Dataspace,
            enums::EnumType,
            file::{File, FileBuilder, OpenMode},
            info::{DatasetInfo, LinkKind, ObjectKind, StorageLayout},
            reader::{ArrayBlocks, MDArrayBlocks, Reader},
            writer::{Writer, WriterBuilder, DEFAULT_DEFLATE_LEVEL},
        },
    };

    pub use ezhdf5_types::field_access;

    pub mod types {
        pub use ezhdf5_types::*;
    }
}

pub use crate::export::*;

#[macro_use]
mod macros;
#[macro_use]
mod class;

mod arena;
mod error;
#[doc(hidden)]
pub mod globals;
mod handle;
#[doc(hidden)]
pub mod sync;
mod util;

mod hl;

mod internal_prelude {
    pub use libc::size_t;
    pub use std::os::raw::{c_char, c_int, c_uint, c_void};

    pub use hdf5_sys::{
        h5::{haddr_t, hbool_t, herr_t, hsize_t},
        h5i::H5I_type_t::{self, *},
        h5i::{hid_t, H5I_INVALID_HID},
        h5p::H5P_DEFAULT,
        h5s::{H5S_ALL, H5S_UNLIMITED},
    };

    pub use crate::{
        arena::Arena,
        class::ObjectClass,
        error::{h5check, H5ErrorCode},
        export::*,
        handle::Handle,
        sync::sync,
        util::{get_h5_str, string_from_cstr, to_cstring},
    };

    pub use ezhdf5_types::{
        BitField, ByteOrder, CharacterEncoding, CompoundDesc, CompoundLayout, EnumArray, EnumDef,
        EnumValue, FloatSize, HostKind, IntSize, MDArray, PrimitiveKind, StorageClass,
        TypeDescriptor, TypeVariant,
    };

    #[cfg(test)]
    pub use crate::test::{with_tmp_file, with_tmp_path};
}

#[cfg(test)]
pub mod test;

/// Returns the runtime version of the HDF5 library.
pub fn library_version() -> (u8, u8, u8) {
    use self::internal_prelude::c_uint;
    use hdf5_sys::h5::H5get_libversion;
    let mut v: (c_uint, c_uint, c_uint) = (0, 0, 0);
    h5call!(H5get_libversion(&mut v.0, &mut v.1, &mut v.2))
        .map(|_| (v.0 as _, v.1 as _, v.2 as _))
        .unwrap_or((0, 0, 0))
}

#[cfg(test)]
pub mod tests {
    use crate::library_version;

    #[test]
    pub fn test_library_version() {
        assert!(library_version() >= (1, 8, 4));
    }
}

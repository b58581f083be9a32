#![allow(dead_code)]

use hdf5_sys::{h5p, h5t};

pub struct H5GlobalConstant(
    #[cfg(msvc_dll_indirection)] &'static usize,
    #[cfg(not(msvc_dll_indirection))] &'static hdf5_sys::h5i::hid_t,
);

impl std::ops::Deref for H5GlobalConstant {
    type Target = hdf5_sys::h5i::hid_t;
    fn deref(&self) -> &Self::Target {
        lazy_static::initialize(&crate::sync::LIBRARY_INIT);
        cfg_if::cfg_if! {
            if #[cfg(msvc_dll_indirection)] {
                let dll_ptr = self.0 as *const usize;
                let ptr: *const *const hdf5_sys::h5i::hid_t = dll_ptr.cast();
                unsafe {
                    &**ptr
                }
            } else {
                self.0
            }
        }
    }
}

macro_rules! link_hid {
    ($rust_name:ident, $c_name:path) => {
        pub static $rust_name: H5GlobalConstant = H5GlobalConstant($c_name);
    };
}

// Storage datatypes (little-endian on-disk forms)
link_hid!(H5T_STD_I8LE, h5t::H5T_STD_I8LE);
link_hid!(H5T_STD_I16LE, h5t::H5T_STD_I16LE);
link_hid!(H5T_STD_I32LE, h5t::H5T_STD_I32LE);
link_hid!(H5T_STD_I64LE, h5t::H5T_STD_I64LE);
link_hid!(H5T_STD_U8LE, h5t::H5T_STD_U8LE);
link_hid!(H5T_STD_U16LE, h5t::H5T_STD_U16LE);
link_hid!(H5T_STD_U32LE, h5t::H5T_STD_U32LE);
link_hid!(H5T_STD_U64LE, h5t::H5T_STD_U64LE);
link_hid!(H5T_STD_I8BE, h5t::H5T_STD_I8BE);
link_hid!(H5T_STD_I16BE, h5t::H5T_STD_I16BE);
link_hid!(H5T_STD_I32BE, h5t::H5T_STD_I32BE);
link_hid!(H5T_STD_I64BE, h5t::H5T_STD_I64BE);
link_hid!(H5T_IEEE_F32LE, h5t::H5T_IEEE_F32LE);
link_hid!(H5T_IEEE_F64LE, h5t::H5T_IEEE_F64LE);
link_hid!(H5T_IEEE_F32BE, h5t::H5T_IEEE_F32BE);
link_hid!(H5T_IEEE_F64BE, h5t::H5T_IEEE_F64BE);
link_hid!(H5T_STD_B64LE, h5t::H5T_STD_B64LE);
link_hid!(H5T_STD_REF_OBJ, h5t::H5T_STD_REF_OBJ);
link_hid!(H5T_C_S1, h5t::H5T_C_S1);

// Native (memory) datatypes
link_hid!(H5T_NATIVE_INT8, h5t::H5T_NATIVE_INT8);
link_hid!(H5T_NATIVE_INT16, h5t::H5T_NATIVE_INT16);
link_hid!(H5T_NATIVE_INT32, h5t::H5T_NATIVE_INT32);
link_hid!(H5T_NATIVE_INT64, h5t::H5T_NATIVE_INT64);
link_hid!(H5T_NATIVE_UINT8, h5t::H5T_NATIVE_UINT8);
link_hid!(H5T_NATIVE_UINT16, h5t::H5T_NATIVE_UINT16);
link_hid!(H5T_NATIVE_UINT32, h5t::H5T_NATIVE_UINT32);
link_hid!(H5T_NATIVE_UINT64, h5t::H5T_NATIVE_UINT64);
link_hid!(H5T_NATIVE_FLOAT, h5t::H5T_NATIVE_FLOAT);
link_hid!(H5T_NATIVE_DOUBLE, h5t::H5T_NATIVE_DOUBLE);
link_hid!(H5T_NATIVE_B64, h5t::H5T_NATIVE_B64);

// Property list classes
link_hid!(H5P_ROOT, h5p::H5P_CLS_ROOT);
link_hid!(H5P_FILE_CREATE, h5p::H5P_CLS_FILE_CREATE);
link_hid!(H5P_FILE_ACCESS, h5p::H5P_CLS_FILE_ACCESS);
link_hid!(H5P_DATASET_CREATE, h5p::H5P_CLS_DATASET_CREATE);
link_hid!(H5P_LINK_CREATE, h5p::H5P_CLS_LINK_CREATE);

#[cfg(test)]
mod tests {
    use hdf5_sys::h5i::H5I_INVALID_HID;

    use super::{H5P_DATASET_CREATE, H5P_ROOT, H5T_IEEE_F64LE, H5T_NATIVE_INT32};

    #[test]
    pub fn test_lazy_globals() {
        assert_ne!(*H5T_IEEE_F64LE, H5I_INVALID_HID);
        assert_ne!(*H5T_NATIVE_INT32, H5I_INVALID_HID);
        assert_ne!(*H5P_ROOT, H5I_INVALID_HID);
        assert_ne!(*H5P_DATASET_CREATE, H5I_INVALID_HID);
    }
}

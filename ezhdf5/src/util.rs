use std::ffi::{CStr, CString};

use crate::internal_prelude::*;

/// Converts a Rust string to a NUL-terminated C string, failing on
/// interior NULs.
pub fn to_cstring<S: AsRef<str>>(string: S) -> Result<CString> {
    let string = string.as_ref();
    CString::new(string).map_err(|_| format!("null byte in string: {string:?}").into())
}

pub fn string_from_cstr(string: *const c_char) -> String {
    if string.is_null() {
        String::new()
    } else {
        unsafe { CStr::from_ptr(string) }.to_string_lossy().into_owned()
    }
}

/// Reads a string from a C API of the `get(buf, size)` shape: the
/// closure is first called with a null buffer to obtain the length and
/// then again with an allocated buffer.
pub fn get_h5_str<T, F>(func: F) -> Result<String>
where
    F: Fn(*mut c_char, size_t) -> T,
    T: H5ErrorCode + TryInto<i64>,
{
    let len = h5check(func(std::ptr::null_mut(), 0))?;
    let len: i64 = len.try_into().map_err(|_| Error::Internal("bad string length".into()))?;
    ensure!(len >= 0, "bad string length");
    let mut buf = vec![0u8; len as usize + 1];
    h5check(func(buf.as_mut_ptr().cast(), buf.len()))?;
    Ok(string_from_cstr(buf.as_ptr().cast()))
}

//! Link management and object-reference encoding.

use std::mem::MaybeUninit;

use hdf5_sys::h5l::{
    H5L_info_t, H5L_type_t, H5Lcreate_external, H5Lcreate_hard, H5Lcreate_soft, H5Ldelete,
    H5Lexists, H5Lget_info, H5Lget_val, H5Lunpack_elink_val,
};
use hdf5_sys::h5p::{H5Pcreate, H5Pset_create_intermediate_group};
use hdf5_sys::h5r::{hobj_ref_t, H5R_type_t, H5Rcreate, H5Rget_name};

use crate::globals::H5P_LINK_CREATE;
use crate::internal_prelude::*;

/// Prefix marker of the serialized form of an external link.
pub(crate) const EXTERNAL_LINK_PREFIX: &str = "EXTERNAL::";

const LINK_VAL_BUF: usize = 4096;

/// Creates a link-creation property list with intermediate group
/// creation enabled.
pub(crate) fn intermediate_lcpl(arena: &Arena) -> Result<hid_t> {
    let lcpl = arena.adopt(h5call!(H5Pcreate(*H5P_LINK_CREATE))?)?;
    h5call!(H5Pset_create_intermediate_group(lcpl, 1))?;
    Ok(lcpl)
}

/// Whether a link exists at the path. Intermediate components are
/// checked first, so a deep path over a missing group answers `false`
/// instead of failing.
pub(crate) fn exists(file_id: hid_t, path: &str) -> Result<bool> {
    let path = path.trim_end_matches('/');
    if path.is_empty() {
        return Ok(true); // the root group always exists
    }
    let mut partial = String::new();
    for component in path.split('/').filter(|c| !c.is_empty()) {
        partial.push('/');
        partial.push_str(component);
        let cpath = to_cstring(partial.as_str())?;
        if h5call!(H5Lexists(file_id, cpath.as_ptr(), H5P_DEFAULT))? <= 0 {
            return Ok(false);
        }
    }
    Ok(true)
}

pub(crate) fn delete(file_id: hid_t, path: &str) -> Result<()> {
    let cpath = to_cstring(path)?;
    h5call!(H5Ldelete(file_id, cpath.as_ptr(), H5P_DEFAULT)).and(Ok(()))
}

pub(crate) fn create_hard(file_id: hid_t, target: &str, link: &str) -> Result<()> {
    let arena = Arena::new();
    let lcpl = intermediate_lcpl(&arena)?;
    let target = to_cstring(target)?;
    let link = to_cstring(link)?;
    h5call!(H5Lcreate_hard(
        file_id,
        target.as_ptr(),
        file_id,
        link.as_ptr(),
        lcpl,
        H5P_DEFAULT
    ))
    .and(Ok(()))
}

pub(crate) fn create_soft(file_id: hid_t, target: &str, link: &str) -> Result<()> {
    let arena = Arena::new();
    let lcpl = intermediate_lcpl(&arena)?;
    let target = to_cstring(target)?;
    let link = to_cstring(link)?;
    h5call!(H5Lcreate_soft(target.as_ptr(), file_id, link.as_ptr(), lcpl, H5P_DEFAULT))
        .and(Ok(()))
}

pub(crate) fn create_external(
    file_id: hid_t, target_file: &str, target_path: &str, link: &str,
) -> Result<()> {
    let arena = Arena::new();
    let lcpl = intermediate_lcpl(&arena)?;
    let target_file = to_cstring(target_file)?;
    let target_path = to_cstring(target_path)?;
    let link = to_cstring(link)?;
    h5call!(H5Lcreate_external(
        target_file.as_ptr(),
        target_path.as_ptr(),
        file_id,
        link.as_ptr(),
        lcpl,
        H5P_DEFAULT
    ))
    .and(Ok(()))
}

/// Inspects the link at a path.
pub(crate) fn link_info(file_id: hid_t, path: &str) -> Result<LinkKind> {
    let cpath = to_cstring(path)?;
    let info = h5lock_s!({
        let mut info = MaybeUninit::<H5L_info_t>::uninit();
        h5check(unsafe {
            H5Lget_info(file_id, cpath.as_ptr(), info.as_mut_ptr(), H5P_DEFAULT)
        })?;
        Ok::<_, Error>(unsafe { info.assume_init() })
    })?;
    match info.type_ {
        H5L_type_t::H5L_TYPE_SOFT => {
            let mut buf = vec![0u8; LINK_VAL_BUF];
            h5call!(H5Lget_val(
                file_id,
                cpath.as_ptr(),
                buf.as_mut_ptr().cast(),
                buf.len(),
                H5P_DEFAULT
            ))?;
            Ok(LinkKind::Soft { target: string_from_cstr(buf.as_ptr().cast()) })
        }
        H5L_type_t::H5L_TYPE_EXTERNAL => {
            let (file_name, object_path) = h5lock_s!({
                let mut buf = vec![0u8; LINK_VAL_BUF];
                h5check(unsafe {
                    H5Lget_val(
                        file_id,
                        cpath.as_ptr(),
                        buf.as_mut_ptr().cast(),
                        buf.len(),
                        H5P_DEFAULT,
                    )
                })?;
                let mut flags: c_uint = 0;
                let mut file_ptr: *const c_char = std::ptr::null();
                let mut path_ptr: *const c_char = std::ptr::null();
                h5check(unsafe {
                    H5Lunpack_elink_val(
                        buf.as_ptr().cast(),
                        buf.len(),
                        &mut flags,
                        &mut file_ptr,
                        &mut path_ptr,
                    )
                })?;
                Ok::<_, Error>((string_from_cstr(file_ptr), string_from_cstr(path_ptr)))
            })?;
            Ok(LinkKind::External { file_name, object_path })
        }
        _ => Ok(LinkKind::Hard),
    }
}

/// Serializes an external link target as `EXTERNAL::<file>::<path>`.
pub(crate) fn encode_external(file_name: &str, object_path: &str) -> String {
    format!("{EXTERNAL_LINK_PREFIX}{file_name}::{object_path}")
}

/// Parses the `EXTERNAL::<file>::<path>` form.
pub(crate) fn decode_external(encoded: &str) -> Option<(&str, &str)> {
    encoded.strip_prefix(EXTERNAL_LINK_PREFIX)?.split_once("::")
}

/// Creates an object reference to the target path, as the raw address
/// value the reference type stores.
pub(crate) fn create_reference(file_id: hid_t, target: &str) -> Result<hobj_ref_t> {
    let target = to_cstring(target)?;
    h5lock_s!({
        let mut reference: hobj_ref_t = 0;
        h5check(unsafe {
            H5Rcreate(
                (&mut reference as *mut hobj_ref_t).cast(),
                file_id,
                target.as_ptr(),
                H5R_type_t::H5R_OBJECT,
                -1,
            )
        })?;
        Ok(reference)
    })
}

/// Resolves a stored object reference back to a path.
pub(crate) fn resolve_reference(file_id: hid_t, reference: hobj_ref_t) -> Result<String> {
    h5lock_s!(get_h5_str(|m, s| unsafe {
        H5Rget_name(
            file_id,
            H5R_type_t::H5R_OBJECT,
            (&reference as *const hobj_ref_t).cast(),
            m,
            s,
        )
    }))
}

/// The string form of a raw reference: a NUL byte followed by the
/// decimal address, distinguishing it from a regular path.
pub(crate) fn encode_reference(reference: hobj_ref_t) -> String {
    format!("\0{reference}")
}

pub(crate) fn decode_reference(encoded: &str) -> Result<hobj_ref_t> {
    let digits = encoded
        .strip_prefix('\0')
        .ok_or_else(|| Error::NotAReference(encoded.to_owned()))?;
    digits.parse().map_err(|_| Error::NotAReference(encoded.to_owned()))
}

#[cfg(test)]
pub mod tests {
    use super::*;

    #[test]
    pub fn test_external_encoding() {
        let encoded = encode_external("other.h5", "/data/x");
        assert_eq!(encoded, "EXTERNAL::other.h5::/data/x");
        assert_eq!(decode_external(&encoded), Some(("other.h5", "/data/x")));
        assert_eq!(decode_external("not a link"), None);
    }

    #[test]
    pub fn test_reference_encoding() {
        let encoded = encode_reference(1400);
        assert!(encoded.starts_with('\0'));
        assert_eq!(decode_reference(&encoded).unwrap(), 1400);
        assert!(matches!(decode_reference("/plain/path"), Err(Error::NotAReference(_))));
    }
}

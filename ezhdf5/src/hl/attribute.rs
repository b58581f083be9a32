//! Raw attribute plumbing shared by the reader and writer surfaces.

use std::ptr::addr_of_mut;

use hdf5_sys::h5::{H5_index_t, H5_iter_order_t};
use hdf5_sys::h5a::{
    H5A_info_t, H5A_operator2_t, H5Acreate2, H5Adelete, H5Aexists, H5Aget_space, H5Aget_type,
    H5Aiterate2, H5Aopen, H5Aread, H5Awrite,
};

use crate::hl::dataspace::Dataspace;
use crate::internal_prelude::*;

pub(crate) fn exists(obj_id: hid_t, name: &str) -> Result<bool> {
    let name = to_cstring(name)?;
    h5call!(H5Aexists(obj_id, name.as_ptr())).map(|v| v > 0)
}

pub(crate) fn open(arena: &Arena, obj_id: hid_t, name: &str) -> Result<hid_t> {
    let cname = to_cstring(name)?;
    arena.adopt(h5call!(H5Aopen(obj_id, cname.as_ptr(), H5P_DEFAULT))?)
}

/// Opens the attribute for overwriting if it exists, otherwise creates
/// it with the given type and dataspace; additions are idempotent.
pub(crate) fn open_or_create(
    arena: &Arena, obj_id: hid_t, name: &str, type_id: hid_t, space: &Dataspace,
) -> Result<hid_t> {
    if exists(obj_id, name)? {
        // recreate if the stored type no longer matches the value shape
        let attr_id = open(arena, obj_id, name)?;
        let stored = Datatype::from_id(h5call!(H5Aget_type(attr_id))?)?;
        let requested = Datatype::from_id(h5call!(hdf5_sys::h5t::H5Tcopy(type_id))?)?;
        if stored == requested && space_matches(attr_id, space)? {
            return Ok(attr_id);
        }
        delete(obj_id, name)?;
    }
    let cname = to_cstring(name)?;
    arena.adopt(h5call!(H5Acreate2(
        obj_id,
        cname.as_ptr(),
        type_id,
        space.id(),
        H5P_DEFAULT,
        H5P_DEFAULT,
    ))?)
}

fn space_matches(attr_id: hid_t, space: &Dataspace) -> Result<bool> {
    let stored = Dataspace::from_id(h5call!(H5Aget_space(attr_id))?)?;
    Ok(stored.dims() == space.dims())
}

pub(crate) fn delete(obj_id: hid_t, name: &str) -> Result<()> {
    let name = to_cstring(name)?;
    h5call!(H5Adelete(obj_id, name.as_ptr())).and(Ok(()))
}

pub(crate) fn attr_type(arena: &Arena, attr_id: hid_t) -> Result<hid_t> {
    arena.adopt(h5call!(H5Aget_type(attr_id))?)
}

pub(crate) fn attr_dims(attr_id: hid_t) -> Result<Vec<usize>> {
    Ok(Dataspace::from_id(h5call!(H5Aget_space(attr_id))?)?.dims())
}

pub(crate) fn read_raw(attr_id: hid_t, mem_type_id: hid_t, buf: *mut c_void) -> Result<()> {
    h5call!(H5Aread(attr_id, mem_type_id, buf)).and(Ok(()))
}

pub(crate) fn write_raw(attr_id: hid_t, mem_type_id: hid_t, buf: *const c_void) -> Result<()> {
    h5call!(H5Awrite(attr_id, mem_type_id, buf)).and(Ok(()))
}

/// Returns the names of all attributes attached to an object.
pub(crate) fn attr_names(obj_id: hid_t) -> Result<Vec<String>> {
    extern "C" fn attributes_callback(
        _id: hid_t, attr_name: *const c_char, _info: *const H5A_info_t, op_data: *mut c_void,
    ) -> herr_t {
        std::panic::catch_unwind(|| {
            let names: &mut Vec<String> =
                unsafe { &mut *(op_data.cast::<std::vec::Vec<std::string::String>>()) };
            names.push(string_from_cstr(attr_name));
            0 // Continue iteration
        })
        .unwrap_or(-1)
    }

    let callback_fn: H5A_operator2_t = Some(attributes_callback);
    let iteration_position: *mut hsize_t = &mut { 0_u64 };
    let mut result: Vec<String> = Vec::new();
    let other_data: *mut c_void = addr_of_mut!(result).cast();

    h5call!(H5Aiterate2(
        obj_id,
        H5_index_t::H5_INDEX_NAME,
        H5_iter_order_t::H5_ITER_INC,
        iteration_position,
        callback_fn,
        other_data
    ))?;

    Ok(result)
}

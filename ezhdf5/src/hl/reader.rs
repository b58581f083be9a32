//! The read surface: typed, path-addressed access to datasets,
//! attributes and object structure.

use std::marker::PhantomData;
use std::mem::MaybeUninit;
use std::path::Path;

use ndarray::Array2;

use hdf5_sys::h5d::{H5D_layout_t, H5Dget_create_plist, H5Dget_type, H5Dread};
use hdf5_sys::h5g::{H5G_info_t, H5Gget_info};
use hdf5_sys::h5i::{H5Iget_name, H5Iget_type};
use hdf5_sys::h5l::H5Lget_name_by_idx;
use hdf5_sys::h5o::H5Oopen;
use hdf5_sys::h5p::{H5Pget_chunk, H5Pget_layout};
use hdf5_sys::h5r::hobj_ref_t;
use hdf5_sys::h5t::{
    H5T_class_t, H5T_direction_t, H5Tarray_create2, H5Tcopy, H5Tget_array_dims2,
    H5Tget_array_ndims, H5Tget_native_type, H5Tget_super, H5Tset_size, H5T_VARIABLE,
};
use hdf5_sys::h5::{H5_index_t, H5_iter_order_t};

use ezhdf5_types::{CompoundRecord, MemberFactoryRegistry, OrdinalStorage};

use crate::globals::{H5T_NATIVE_B64, H5T_STD_REF_OBJ};
use crate::hl::attribute;
use crate::hl::blocks::NaturalBlocks;
use crate::hl::compound::{self, CompoundType};
use crate::hl::dataspace::{Dataspace, SpaceParams};
use crate::hl::datatype::native_primitive_id;
use crate::hl::links;
use crate::hl::registry::{self, TypeRegistry};
use crate::internal_prelude::*;

/// The read request shapes the planner understands.
enum Request<'a> {
    Full,
    Slice1D { offset: u64, block_size: usize },
    BlockND { offset: &'a [u64], block_dims: &'a [usize] },
}

/// A typed reader over one HDF5 file.
pub struct Reader {
    file: File,
    registry: TypeRegistry,
    factories: MemberFactoryRegistry,
}

impl Reader {
    /// Opens a file for reading.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::from_file(File::open(path)?))
    }

    pub fn from_file(file: File) -> Self {
        Self { file, registry: TypeRegistry::new(), factories: MemberFactoryRegistry::new() }
    }

    pub fn file(&self) -> &File {
        &self.file
    }

    pub(crate) fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub(crate) fn factories(&self) -> &MemberFactoryRegistry {
        &self.factories
    }

    /// Registers a custom compound member factory; it is consulted
    /// after the built-in ones.
    pub fn register_member_factory(&mut self, factory: Box<dyn ezhdf5_types::MemberFactory>) {
        self.factories.register(factory);
    }

    // ------------------------------------------------------------------
    // Objects and links
    // ------------------------------------------------------------------

    /// Whether an object or link exists at the path.
    pub fn exists(&self, path: &str) -> Result<bool> {
        links::exists(self.file.id(), path)
    }

    pub(crate) fn open_object(&self, arena: &Arena, path: &str) -> Result<hid_t> {
        if !self.exists(path)? {
            fail!(Error::NoSuchObject(path.to_owned()));
        }
        let cpath = to_cstring(path)?;
        arena.adopt(h5call!(H5Oopen(self.file.id(), cpath.as_ptr(), H5P_DEFAULT))?)
    }

    pub(crate) fn open_dataset(&self, arena: &Arena, path: &str) -> Result<hid_t> {
        let obj_id = self.open_object(arena, path)?;
        if h5lock!(H5Iget_type(obj_id)) != H5I_DATASET {
            fail!(Error::NotADataset(path.to_owned()));
        }
        Ok(obj_id)
    }

    fn open_group(&self, arena: &Arena, path: &str) -> Result<hid_t> {
        let obj_id = self.open_object(arena, path)?;
        let kind = h5lock!(H5Iget_type(obj_id));
        if kind != H5I_GROUP && kind != H5I_FILE {
            fail!(Error::NotAGroup(path.to_owned()));
        }
        Ok(obj_id)
    }

    /// The basic kind of the object at the path.
    pub fn object_kind(&self, path: &str) -> Result<ObjectKind> {
        let arena = Arena::new();
        let obj_id = self.open_object(&arena, path)?;
        Ok(match h5lock!(H5Iget_type(obj_id)) {
            H5I_FILE | H5I_GROUP => ObjectKind::Group,
            H5I_DATASET => ObjectKind::Dataset,
            H5I_DATATYPE => ObjectKind::Datatype,
            _ => ObjectKind::Other,
        })
    }

    pub fn is_group(&self, path: &str) -> Result<bool> {
        Ok(self.object_kind(path)? == ObjectKind::Group)
    }

    /// Kind and target of the link at the path.
    pub fn link_info(&self, path: &str) -> Result<LinkKind> {
        if !self.exists(path)? {
            fail!(Error::NoSuchObject(path.to_owned()));
        }
        links::link_info(self.file.id(), path)
    }

    /// Names of the members of a group, with internal names (starting
    /// with `__`) filtered out.
    pub fn group_members(&self, path: &str) -> Result<Vec<String>> {
        let mut members = self.all_group_members(path)?;
        members.retain(|name| !name.starts_with("__"));
        Ok(members)
    }

    /// Names of all members of a group, including internal ones.
    pub fn all_group_members(&self, path: &str) -> Result<Vec<String>> {
        h5lock_s!({
            let arena = Arena::new();
            let group_id = self.open_group(&arena, path)?;
            let mut info = MaybeUninit::<H5G_info_t>::uninit();
            h5check(unsafe { H5Gget_info(group_id, info.as_mut_ptr()) })?;
            let nlinks = unsafe { info.assume_init() }.nlinks;
            let dot = to_cstring(".")?;
            let mut members = Vec::with_capacity(nlinks as usize);
            for i in 0..nlinks {
                members.push(get_h5_str(|m, s| unsafe {
                    H5Lget_name_by_idx(
                        group_id,
                        dot.as_ptr(),
                        H5_index_t::H5_INDEX_NAME,
                        H5_iter_order_t::H5_ITER_INC,
                        i,
                        m,
                        s,
                        H5P_DEFAULT,
                    )
                })?);
            }
            Ok(members)
        })
    }

    /// Names of the attributes attached to the object at the path.
    pub fn attr_names(&self, path: &str) -> Result<Vec<String>> {
        let arena = Arena::new();
        let obj_id = self.open_object(&arena, path)?;
        attribute::attr_names(obj_id)
    }

    pub fn has_attr(&self, path: &str, name: &str) -> Result<bool> {
        let arena = Arena::new();
        let obj_id = self.open_object(&arena, path)?;
        attribute::exists(obj_id, name)
    }

    /// Shape, layout and type information of the dataset at the path.
    pub fn dataset_info(&self, path: &str) -> Result<DatasetInfo> {
        h5lock_s!({
            let arena = Arena::new();
            let ds = self.open_dataset(&arena, path)?;
            let space = Dataspace::from_dataset(ds)?;
            let dims = space.dims();
            let max_dims = space.max_dims();
            let dcpl = arena.adopt(h5call!(H5Dget_create_plist(ds))?)?;
            let layout = match h5lock!(H5Pget_layout(dcpl)) {
                H5D_layout_t::H5D_COMPACT => StorageLayout::Compact,
                H5D_layout_t::H5D_CHUNKED => StorageLayout::Chunked,
                _ => StorageLayout::Contiguous,
            };
            let chunk = if layout == StorageLayout::Chunked {
                let rank = dims.len();
                let mut chunk_dims = vec![0 as hsize_t; rank.max(1)];
                h5call!(H5Pget_chunk(dcpl, rank.max(1) as _, chunk_dims.as_mut_ptr()))?;
                Some(chunk_dims.into_iter().take(rank).map(|d| d as _).collect())
            } else {
                None
            };
            let type_id = arena.adopt(h5call!(H5Dget_type(ds))?)?;
            let type_desc = Datatype::from_id(h5call!(H5Tcopy(type_id))?)?.to_descriptor()?;
            let variant = self.object_type_variant(ds)?;
            Ok(DatasetInfo { dims, max_dims, layout, chunk, type_desc, variant })
        })
    }

    // ------------------------------------------------------------------
    // Primitive reads
    // ------------------------------------------------------------------

    fn plan(&self, ds: hid_t, request: &Request) -> Result<SpaceParams> {
        match *request {
            Request::Full => SpaceParams::full(ds),
            Request::Slice1D { offset, block_size } => SpaceParams::slice_1d(ds, offset, block_size),
            Request::BlockND { offset, block_dims } => SpaceParams::block_nd(ds, offset, block_dims),
        }
    }

    fn check_numeric_class(&self, path: &str, class: H5T_class_t) -> Result<()> {
        match class {
            H5T_class_t::H5T_INTEGER | H5T_class_t::H5T_FLOAT | H5T_class_t::H5T_ENUM
            | H5T_class_t::H5T_BITFIELD => Ok(()),
            other => Err(Error::TypeMismatch(format!(
                "data set '{path}' of class {other:?} cannot be read as a number"
            ))),
        }
    }

    fn read_primitive<T: PrimitiveKind>(
        &self, path: &str, request: Request,
    ) -> Result<(Vec<T>, Vec<usize>)> {
        h5lock_s!({
            let arena = Arena::new();
            let ds = self.open_dataset(&arena, path)?;
            let type_id = arena.adopt(h5call!(H5Dget_type(ds))?)?;
            let class = h5lock!(hdf5_sys::h5t::H5Tget_class(type_id));
            if class == H5T_class_t::H5T_ARRAY && matches!(request, Request::Full) {
                return self.read_primitive_array_type::<T>(&arena, ds, type_id);
            }
            self.check_numeric_class(path, class)?;
            let params = self.plan(ds, &request)?;
            let mut data = vec![T::default(); params.block_size];
            h5check(unsafe {
                H5Dread(
                    ds,
                    native_primitive_id::<T>(),
                    params.memory_space_id(),
                    params.file_space_id(),
                    H5P_DEFAULT,
                    data.as_mut_ptr().cast(),
                )
            })?;
            Ok((data, params.dims))
        })
    }

    /// Reads a dataset whose on-disk type is an array datatype over a
    /// scalar dataspace, the second representation of multi-dimensional
    /// data; a matching memory array type is synthesized.
    fn read_primitive_array_type<T: PrimitiveKind>(
        &self, arena: &Arena, ds: hid_t, type_id: hid_t,
    ) -> Result<(Vec<T>, Vec<usize>)> {
        h5lock_s!({
            let ndims = h5call!(H5Tget_array_ndims(type_id))? as usize;
            let mut dims = vec![0 as hsize_t; ndims];
            h5call!(H5Tget_array_dims2(type_id, dims.as_mut_ptr()))?;
            let elem_id = arena.adopt(h5call!(H5Tget_super(type_id))?)?;
            self.check_numeric_class("<array element>", h5lock!(hdf5_sys::h5t::H5Tget_class(elem_id)))?;
            let mem_type = arena.adopt(h5call!(H5Tarray_create2(
                native_primitive_id::<T>(),
                ndims as _,
                dims.as_ptr()
            ))?)?;
            let dims: Vec<usize> = dims.into_iter().map(|d| d as _).collect();
            let mut data = vec![T::default(); dims.iter().product()];
            h5check(unsafe {
                H5Dread(ds, mem_type, H5S_ALL, H5S_ALL, H5P_DEFAULT, data.as_mut_ptr().cast())
            })?;
            Ok((data, dims))
        })
    }

    /// Reads a scalar value.
    pub fn read<T: PrimitiveKind>(&self, path: &str) -> Result<T> {
        let (data, _) = self.read_primitive::<T>(path, Request::Full)?;
        ensure!(
            data.len() == 1,
            Error::ShapeMismatch(format!("data set '{path}' is not scalar"))
        );
        Ok(data[0])
    }

    /// Reads the whole dataset as a flat array.
    pub fn read_array<T: PrimitiveKind>(&self, path: &str) -> Result<Vec<T>> {
        Ok(self.read_primitive::<T>(path, Request::Full)?.0)
    }

    /// Reads block number `block_number` of size `block_size` of a 1-D
    /// dataset; the last block may come back shorter.
    pub fn read_array_block<T: PrimitiveKind>(
        &self, path: &str, block_size: usize, block_number: u64,
    ) -> Result<Vec<T>> {
        self.read_array_block_with_offset(path, block_size, block_number * block_size as u64)
    }

    /// Reads `block_size` elements of a 1-D dataset starting at
    /// `offset`, clamped to the end of the dataset.
    pub fn read_array_block_with_offset<T: PrimitiveKind>(
        &self, path: &str, block_size: usize, offset: u64,
    ) -> Result<Vec<T>> {
        Ok(self.read_primitive::<T>(path, Request::Slice1D { offset, block_size })?.0)
    }

    /// Reads the whole dataset as an N-dimensional array.
    pub fn read_md_array<T: PrimitiveKind>(&self, path: &str) -> Result<MDArray<T>> {
        let (data, dims) = self.read_primitive::<T>(path, Request::Full)?;
        MDArray::new(data, dims).map_err(Into::into)
    }

    /// Reads one block of an N-dimensional dataset by block number.
    pub fn read_md_array_block<T: PrimitiveKind>(
        &self, path: &str, block_dims: &[usize], block_number: &[u64],
    ) -> Result<MDArray<T>> {
        ensure!(
            block_dims.len() == block_number.len(),
            Error::RankMismatch { expected: block_dims.len(), actual: block_number.len() }
        );
        let offset: Vec<u64> =
            block_number.iter().zip(block_dims).map(|(&n, &d)| n * d as u64).collect();
        self.read_md_array_block_with_offset(path, block_dims, &offset)
    }

    /// Reads one block of an N-dimensional dataset at an element
    /// offset, clamped per axis to the dataset extent.
    pub fn read_md_array_block_with_offset<T: PrimitiveKind>(
        &self, path: &str, block_dims: &[usize], offset: &[u64],
    ) -> Result<MDArray<T>> {
        let (data, dims) =
            self.read_primitive::<T>(path, Request::BlockND { offset, block_dims })?;
        MDArray::new(data, dims).map_err(Into::into)
    }

    /// Reads into a hyperslab of a caller-provided array, starting at
    /// `mem_offset`; returns the dimensions actually transferred.
    pub fn read_to_md_array_with_offset<T: PrimitiveKind>(
        &self, path: &str, array: &mut MDArray<T>, mem_offset: &[usize],
    ) -> Result<Vec<usize>> {
        self.read_to_md_impl(path, array, mem_offset, None)
    }

    /// Like [`read_to_md_array_with_offset`](Self::read_to_md_array_with_offset),
    /// additionally selecting a file-side block.
    pub fn read_to_md_array_block_with_offset<T: PrimitiveKind>(
        &self, path: &str, array: &mut MDArray<T>, block_dims: &[usize], offset: &[u64],
        mem_offset: &[usize],
    ) -> Result<Vec<usize>> {
        self.read_to_md_impl(path, array, mem_offset, Some((offset, block_dims)))
    }

    fn read_to_md_impl<T: PrimitiveKind>(
        &self, path: &str, array: &mut MDArray<T>, mem_offset: &[usize],
        file_block: Option<(&[u64], &[usize])>,
    ) -> Result<Vec<usize>> {
        h5lock_s!({
            let arena = Arena::new();
            let ds = self.open_dataset(&arena, path)?;
            let type_id = arena.adopt(h5call!(H5Dget_type(ds))?)?;
            self.check_numeric_class(path, h5lock!(hdf5_sys::h5t::H5Tget_class(type_id)))?;
            let params =
                SpaceParams::with_memory_offset(ds, array.dims(), mem_offset, file_block)?;
            h5check(unsafe {
                H5Dread(
                    ds,
                    native_primitive_id::<T>(),
                    params.memory_space_id(),
                    params.file_space_id(),
                    H5P_DEFAULT,
                    array.as_mut_slice().as_mut_ptr().cast(),
                )
            })?;
            Ok(params.dims)
        })
    }

    /// Reads the whole dataset as a rank-2 array.
    pub fn read_matrix<T: PrimitiveKind>(&self, path: &str) -> Result<Array2<T>> {
        Array2::try_from(self.read_md_array::<T>(path)?).map_err(Into::into)
    }

    pub fn read_matrix_block<T: PrimitiveKind>(
        &self, path: &str, block_size_y: usize, block_size_x: usize, block_number_y: u64,
        block_number_x: u64,
    ) -> Result<Array2<T>> {
        let block = self.read_md_array_block::<T>(
            path,
            &[block_size_y, block_size_x],
            &[block_number_y, block_number_x],
        )?;
        Array2::try_from(block).map_err(Into::into)
    }

    pub fn read_matrix_block_with_offset<T: PrimitiveKind>(
        &self, path: &str, block_size_y: usize, block_size_x: usize, offset_y: u64, offset_x: u64,
    ) -> Result<Array2<T>> {
        let block = self.read_md_array_block_with_offset::<T>(
            path,
            &[block_size_y, block_size_x],
            &[offset_y, offset_x],
        )?;
        Array2::try_from(block).map_err(Into::into)
    }

    // ------------------------------------------------------------------
    // Natural blocks
    // ------------------------------------------------------------------

    /// Streams a 1-D dataset in its natural (chunk-sized) blocks.
    pub fn natural_blocks<T: PrimitiveKind>(&self, path: &str) -> Result<ArrayBlocks<'_, T>> {
        let info = self.dataset_info(path)?;
        if info.rank() != 1 {
            fail!(Error::RankMismatch { expected: 1, actual: info.rank() });
        }
        let plan = NaturalBlocks::new(&info.dims, &info.natural_block_dims());
        Ok(ArrayBlocks { reader: self, path: path.to_owned(), plan, _marker: PhantomData })
    }

    /// Streams an N-dimensional dataset in its natural blocks.
    pub fn md_natural_blocks<T: PrimitiveKind>(
        &self, path: &str,
    ) -> Result<MDArrayBlocks<'_, T>> {
        let info = self.dataset_info(path)?;
        let plan = NaturalBlocks::new(&info.dims, &info.natural_block_dims());
        Ok(MDArrayBlocks { reader: self, path: path.to_owned(), plan, _marker: PhantomData })
    }

    // ------------------------------------------------------------------
    // Strings
    // ------------------------------------------------------------------

    fn read_strings(&self, path: &str) -> Result<(Vec<String>, Vec<usize>)> {
        h5lock_s!({
            let arena = Arena::new();
            let ds = self.open_dataset(&arena, path)?;
            let type_id = arena.adopt(h5call!(H5Dget_type(ds))?)?;
            let desc = Datatype::from_id(h5call!(H5Tcopy(type_id))?)?.to_descriptor()?;
            let params = SpaceParams::full(ds)?;
            match desc {
                TypeDescriptor::FixedString { len, encoding } => {
                    let mut buf = vec![0u8; len * params.block_size];
                    let mem_type = arena.adopt(h5call!(H5Tcopy(type_id))?)?;
                    h5check(unsafe {
                        H5Dread(ds, mem_type, H5S_ALL, H5S_ALL, H5P_DEFAULT, buf.as_mut_ptr().cast())
                    })?;
                    let strings = (0..params.block_size)
                        .map(|i| {
                            ezhdf5_types::string::from_bytes_0term_at(
                                &buf,
                                i * len,
                                (i + 1) * len,
                                encoding,
                            )
                        })
                        .collect();
                    Ok((strings, params.dims))
                }
                TypeDescriptor::VariableString { .. } => {
                    let mem_type = arena.adopt(h5call!(H5Tcopy(*crate::globals::H5T_C_S1))?)?;
                    h5call!(H5Tset_size(mem_type, H5T_VARIABLE))?;
                    let mut ptrs: Vec<*mut c_char> = vec![std::ptr::null_mut(); params.block_size];
                    h5check(unsafe {
                        H5Dread(
                            ds,
                            mem_type,
                            H5S_ALL,
                            H5S_ALL,
                            H5P_DEFAULT,
                            ptrs.as_mut_ptr().cast(),
                        )
                    })?;
                    let strings = ptrs
                        .iter()
                        .map(|&p| {
                            let s = string_from_cstr(p);
                            if !p.is_null() {
                                unsafe { libc::free(p.cast()) };
                            }
                            s
                        })
                        .collect();
                    Ok((strings, params.dims))
                }
                other => Err(Error::TypeMismatch(format!(
                    "data set '{path}' of type {other:?} cannot be read as a string"
                ))),
            }
        })
    }

    /// Reads a scalar string (fixed- or variable-length).
    pub fn read_string(&self, path: &str) -> Result<String> {
        let (mut strings, _) = self.read_strings(path)?;
        ensure!(
            strings.len() == 1,
            Error::ShapeMismatch(format!("data set '{path}' is not scalar"))
        );
        Ok(strings.remove(0))
    }

    pub fn read_string_array(&self, path: &str) -> Result<Vec<String>> {
        Ok(self.read_strings(path)?.0)
    }

    // ------------------------------------------------------------------
    // Booleans, bit fields, opaque data
    // ------------------------------------------------------------------

    /// Reads a scalar boolean stored as the committed `{FALSE, TRUE}`
    /// enumeration; value decoding is name-based and case-insensitive.
    pub fn read_bool(&self, path: &str) -> Result<bool> {
        let value = self.read_enum(path)?;
        bool_from_name(value.name())
            .ok_or_else(|| Error::TypeMismatch(format!("data set '{path}' is not a boolean")))
    }

    /// Reads a bit field stored as an array of 64-bit words.
    pub fn read_bit_field(&self, path: &str) -> Result<BitField> {
        h5lock_s!({
            let arena = Arena::new();
            let ds = self.open_dataset(&arena, path)?;
            let params = SpaceParams::full(ds)?;
            let mut words = vec![0u64; params.block_size];
            h5check(unsafe {
                H5Dread(
                    ds,
                    *H5T_NATIVE_B64,
                    H5S_ALL,
                    H5S_ALL,
                    H5P_DEFAULT,
                    words.as_mut_ptr().cast(),
                )
            })?;
            Ok(BitField::from_storage_form(&words))
        })
    }

    /// Reads an opaque dataset: its tag and raw bytes.
    pub fn read_opaque(&self, path: &str) -> Result<(String, Vec<u8>)> {
        h5lock_s!({
            let arena = Arena::new();
            let ds = self.open_dataset(&arena, path)?;
            let type_id = arena.adopt(h5call!(H5Dget_type(ds))?)?;
            let desc = Datatype::from_id(h5call!(H5Tcopy(type_id))?)?.to_descriptor()?;
            let (tag, len) = match desc {
                TypeDescriptor::Opaque { tag, len } => (tag, len),
                other => {
                    fail!(Error::TypeMismatch(format!(
                        "data set '{path}' of type {other:?} is not opaque"
                    )));
                }
            };
            let params = SpaceParams::full(ds)?;
            let mut data = vec![0u8; len * params.block_size];
            let mem_type = arena.adopt(h5call!(H5Tcopy(type_id))?)?;
            h5check(unsafe {
                H5Dread(ds, mem_type, H5S_ALL, H5S_ALL, H5P_DEFAULT, data.as_mut_ptr().cast())
            })?;
            Ok((tag, data))
        })
    }

    // ------------------------------------------------------------------
    // Enumerations
    // ------------------------------------------------------------------

    /// The committed enumeration type `name`; fails with
    /// `EnumIncompatible` when `check` is set and the stored values
    /// differ from the given ones.
    pub fn enum_type(&self, name: &str, values: &[&str], check: bool) -> Result<EnumType> {
        let dtype = self.registry.enum_type(&self.file, name, values, check, false)?;
        EnumType::new(EnumDef::new(name, values), dtype)
    }

    fn committed_enum_name(&self, type_id: hid_t) -> String {
        let path = h5lock_s!(
            get_h5_str(|m, s| unsafe { H5Iget_name(type_id, m, s) }).unwrap_or_default()
        );
        path.rsplit('/')
            .next()
            .and_then(|base| base.strip_prefix(registry::ENUM_PREFIX))
            .unwrap_or_default()
            .to_owned()
    }

    fn read_enum_impl(&self, path: &str, request: Request) -> Result<EnumArray> {
        h5lock_s!({
            let arena = Arena::new();
            let ds = self.open_dataset(&arena, path)?;
            let type_id = arena.adopt(h5call!(H5Dget_type(ds))?)?;
            let mut def = match Datatype::from_id(h5call!(H5Tcopy(type_id))?)?.to_descriptor()? {
                TypeDescriptor::Enumeration(def) => def,
                other => {
                    fail!(Error::TypeMismatch(format!(
                        "data set '{path}' of type {other:?} is not an enumeration"
                    )));
                }
            };
            def.name = self.committed_enum_name(type_id);
            let params = self.plan(ds, &request)?;
            let native = arena.adopt(h5call!(H5Tget_native_type(
                type_id,
                H5T_direction_t::H5T_DIR_DEFAULT
            ))?)?;
            let dims = params.dims.clone();
            let storage = match def.storage_size() {
                IntSize::U1 => {
                    let mut data = vec![0i8; params.block_size];
                    h5check(unsafe {
                        H5Dread(
                            ds,
                            native,
                            params.memory_space_id(),
                            params.file_space_id(),
                            H5P_DEFAULT,
                            data.as_mut_ptr().cast(),
                        )
                    })?;
                    OrdinalStorage::I8(MDArray::new(data, dims)?)
                }
                IntSize::U2 => {
                    let mut data = vec![0i16; params.block_size];
                    h5check(unsafe {
                        H5Dread(
                            ds,
                            native,
                            params.memory_space_id(),
                            params.file_space_id(),
                            H5P_DEFAULT,
                            data.as_mut_ptr().cast(),
                        )
                    })?;
                    OrdinalStorage::I16(MDArray::new(data, dims)?)
                }
                _ => {
                    let mut data = vec![0i32; params.block_size];
                    h5check(unsafe {
                        H5Dread(
                            ds,
                            native,
                            params.memory_space_id(),
                            params.file_space_id(),
                            H5P_DEFAULT,
                            data.as_mut_ptr().cast(),
                        )
                    })?;
                    OrdinalStorage::I32(MDArray::new(data, dims)?)
                }
            };
            EnumArray::from_storage(def, storage).map_err(Into::into)
        })
    }

    /// Reads an N-dimensional enumeration array.
    pub fn read_enum_array(&self, path: &str) -> Result<EnumArray> {
        self.read_enum_impl(path, Request::Full)
    }

    /// Reads a scalar enumeration value.
    pub fn read_enum(&self, path: &str) -> Result<EnumValue> {
        let array = self.read_enum_array(path)?;
        ensure!(
            array.size() == 1,
            Error::ShapeMismatch(format!("data set '{path}' is not scalar"))
        );
        EnumValue::new(array.def().clone(), array.ordinal(0)).map_err(Into::into)
    }

    /// Reads a scalar enumeration value as its name.
    pub fn read_enum_as_string(&self, path: &str) -> Result<String> {
        Ok(self.read_enum(path)?.name().to_owned())
    }

    // ------------------------------------------------------------------
    // Compounds
    // ------------------------------------------------------------------

    /// Builds a compound type from the on-disk type of a dataset,
    /// honoring per-member type-variant attributes.
    pub fn compound_type_for_dataset(&self, path: &str) -> Result<CompoundType> {
        h5lock_s!({
            let arena = Arena::new();
            let ds = self.open_dataset(&arena, path)?;
            let type_id = arena.adopt(h5call!(H5Dget_type(ds))?)?;
            let storage = Datatype::from_id(h5call!(H5Tcopy(type_id))?)?;
            let desc = match storage.to_descriptor()? {
                TypeDescriptor::Compound(desc) => desc,
                other => {
                    fail!(Error::TypeMismatch(format!(
                        "data set '{path}' of type {other:?} is not a compound"
                    )));
                }
            };
            let mappings = compound::mappings_from_compound(&self.factories, &desc, |member| {
                self.member_type_variant(ds, member).unwrap_or(TypeVariant::None)
            })?;
            let layout = self.factories.create_encoders(None, &mappings)?;
            CompoundType::with_storage("", layout, storage)
        })
    }

    fn read_compound_impl<R: CompoundRecord>(
        &self, path: &str, ctype: &CompoundType, request: Request,
    ) -> Result<(Vec<R>, Vec<usize>)> {
        h5lock_s!({
            let arena = Arena::new();
            let ds = self.open_dataset(&arena, path)?;
            let params = self.plan(ds, &request)?;
            let mut buf = vec![0u8; ctype.record_size() * params.block_size];
            h5check(unsafe {
                H5Dread(
                    ds,
                    ctype.native_id(),
                    params.memory_space_id(),
                    params.file_space_id(),
                    H5P_DEFAULT,
                    buf.as_mut_ptr().cast(),
                )
            })?;
            let records = ctype.layout().read_records(&buf, params.block_size)?;
            Ok((records, params.dims))
        })
    }

    /// Reads a scalar compound record.
    pub fn read_compound<R: CompoundRecord>(
        &self, path: &str, ctype: &CompoundType,
    ) -> Result<R> {
        let (mut records, _) = self.read_compound_impl::<R>(path, ctype, Request::Full)?;
        ensure!(
            records.len() == 1,
            Error::ShapeMismatch(format!("data set '{path}' is not scalar"))
        );
        Ok(records.remove(0))
    }

    /// Reads a whole compound dataset as a flat record array.
    pub fn read_compound_array<R: CompoundRecord>(
        &self, path: &str, ctype: &CompoundType,
    ) -> Result<Vec<R>> {
        Ok(self.read_compound_impl::<R>(path, ctype, Request::Full)?.0)
    }

    /// Reads a block of a 1-D compound dataset starting at `offset`.
    pub fn read_compound_array_block_with_offset<R: CompoundRecord>(
        &self, path: &str, ctype: &CompoundType, block_size: usize, offset: u64,
    ) -> Result<Vec<R>> {
        Ok(self
            .read_compound_impl::<R>(path, ctype, Request::Slice1D { offset, block_size })?
            .0)
    }

    // ------------------------------------------------------------------
    // References
    // ------------------------------------------------------------------

    /// Reads a scalar object reference. With `resolve` set the target
    /// path is returned, otherwise the encoded `\0<address>` form.
    pub fn read_object_reference(&self, path: &str, resolve: bool) -> Result<String> {
        h5lock_s!({
            let arena = Arena::new();
            let ds = self.open_dataset(&arena, path)?;
            let type_id = arena.adopt(h5call!(H5Dget_type(ds))?)?;
            if h5lock!(hdf5_sys::h5t::H5Tget_class(type_id)) != H5T_class_t::H5T_REFERENCE {
                fail!(Error::NotAReference(path.to_owned()));
            }
            let mut reference: hobj_ref_t = 0;
            h5check(unsafe {
                H5Dread(
                    ds,
                    *H5T_STD_REF_OBJ,
                    H5S_ALL,
                    H5S_ALL,
                    H5P_DEFAULT,
                    (&mut reference as *mut hobj_ref_t).cast(),
                )
            })?;
            if resolve {
                links::resolve_reference(self.file.id(), reference)
            } else {
                Ok(links::encode_reference(reference))
            }
        })
    }

    // ------------------------------------------------------------------
    // Attributes
    // ------------------------------------------------------------------

    fn read_attr_primitive<T: PrimitiveKind>(
        &self, path: &str, name: &str,
    ) -> Result<(Vec<T>, Vec<usize>)> {
        h5lock_s!({
            let arena = Arena::new();
            let obj_id = self.open_object(&arena, path)?;
            let attr_id = attribute::open(&arena, obj_id, name)?;
            let type_id = attribute::attr_type(&arena, attr_id)?;
            if h5lock!(hdf5_sys::h5t::H5Tget_class(type_id)) == H5T_class_t::H5T_ARRAY {
                // an array datatype over a scalar attribute space
                let ndims = h5call!(H5Tget_array_ndims(type_id))? as usize;
                let mut dims = vec![0 as hsize_t; ndims];
                h5call!(H5Tget_array_dims2(type_id, dims.as_mut_ptr()))?;
                let mem_type = arena.adopt(h5call!(H5Tarray_create2(
                    native_primitive_id::<T>(),
                    ndims as _,
                    dims.as_ptr()
                ))?)?;
                let dims: Vec<usize> = dims.into_iter().map(|d| d as _).collect();
                let mut data = vec![T::default(); dims.iter().product()];
                attribute::read_raw(attr_id, mem_type, data.as_mut_ptr().cast())?;
                return Ok((data, dims));
            }
            let dims = attribute::attr_dims(attr_id)?;
            let mut data = vec![T::default(); dims.iter().product()];
            attribute::read_raw(attr_id, native_primitive_id::<T>(), data.as_mut_ptr().cast())?;
            Ok((data, dims))
        })
    }

    /// Reads a scalar attribute of the object at the path.
    pub fn attr<T: PrimitiveKind>(&self, path: &str, name: &str) -> Result<T> {
        let (data, _) = self.read_attr_primitive::<T>(path, name)?;
        ensure!(
            data.len() == 1,
            Error::ShapeMismatch(format!("attribute '{name}' of '{path}' is not scalar"))
        );
        Ok(data[0])
    }

    /// Reads a 1-D attribute.
    pub fn attr_array<T: PrimitiveKind>(&self, path: &str, name: &str) -> Result<Vec<T>> {
        Ok(self.read_attr_primitive::<T>(path, name)?.0)
    }

    /// Reads an N-dimensional attribute.
    pub fn attr_md_array<T: PrimitiveKind>(
        &self, path: &str, name: &str,
    ) -> Result<MDArray<T>> {
        let (data, dims) = self.read_attr_primitive::<T>(path, name)?;
        MDArray::new(data, dims).map_err(Into::into)
    }

    /// Reads a string attribute (fixed- or variable-length).
    pub fn string_attr(&self, path: &str, name: &str) -> Result<String> {
        h5lock_s!({
            let arena = Arena::new();
            let obj_id = self.open_object(&arena, path)?;
            let attr_id = attribute::open(&arena, obj_id, name)?;
            let type_id = attribute::attr_type(&arena, attr_id)?;
            let desc = Datatype::from_id(h5call!(H5Tcopy(type_id))?)?.to_descriptor()?;
            match desc {
                TypeDescriptor::FixedString { len, encoding } => {
                    let mut buf = vec![0u8; len];
                    let mem_type = arena.adopt(h5call!(H5Tcopy(type_id))?)?;
                    attribute::read_raw(attr_id, mem_type, buf.as_mut_ptr().cast())?;
                    Ok(ezhdf5_types::string::from_bytes_0term(&buf, encoding))
                }
                TypeDescriptor::VariableString { .. } => {
                    let mem_type = arena.adopt(h5call!(H5Tcopy(*crate::globals::H5T_C_S1))?)?;
                    h5call!(H5Tset_size(mem_type, H5T_VARIABLE))?;
                    let mut ptr: *mut c_char = std::ptr::null_mut();
                    attribute::read_raw(attr_id, mem_type, (&mut ptr as *mut *mut c_char).cast())?;
                    let s = string_from_cstr(ptr);
                    if !ptr.is_null() {
                        unsafe { libc::free(ptr.cast()) };
                    }
                    Ok(s)
                }
                other => Err(Error::TypeMismatch(format!(
                    "attribute '{name}' of type {other:?} is not a string"
                ))),
            }
        })
    }

    fn read_enum_ordinal_attr(&self, arena: &Arena, attr_id: hid_t) -> Result<(EnumDef, i64)> {
        let type_id = attribute::attr_type(arena, attr_id)?;
        let def = match Datatype::from_id(h5call!(H5Tcopy(type_id))?)?.to_descriptor()? {
            TypeDescriptor::Enumeration(def) => def,
            other => {
                fail!(Error::TypeMismatch(format!("attribute type {other:?} is not an enum")));
            }
        };
        let native = arena.adopt(h5call!(H5Tget_native_type(
            type_id,
            H5T_direction_t::H5T_DIR_DEFAULT
        ))?)?;
        let ordinal = match def.storage_size() {
            IntSize::U1 => {
                let mut v = [0i8];
                attribute::read_raw(attr_id, native, v.as_mut_ptr().cast())?;
                v[0] as i64
            }
            IntSize::U2 => {
                let mut v = [0i16];
                attribute::read_raw(attr_id, native, v.as_mut_ptr().cast())?;
                v[0] as i64
            }
            _ => {
                let mut v = [0i32];
                attribute::read_raw(attr_id, native, v.as_mut_ptr().cast())?;
                v[0] as i64
            }
        };
        Ok((def, ordinal))
    }

    /// Reads an enumeration attribute.
    pub fn enum_attr(&self, path: &str, name: &str) -> Result<EnumValue> {
        h5lock_s!({
            let arena = Arena::new();
            let obj_id = self.open_object(&arena, path)?;
            let attr_id = attribute::open(&arena, obj_id, name)?;
            let (def, ordinal) = self.read_enum_ordinal_attr(&arena, attr_id)?;
            let cardinality = def.cardinality();
            usize::try_from(ordinal)
                .ok()
                .filter(|&o| o < cardinality)
                .map(|o| EnumValue::new(def, o).map_err(Into::into))
                .unwrap_or_else(|| Err(Error::OrdinalOutOfRange { ordinal, cardinality }))
        })
    }

    /// Reads a boolean attribute stored as the committed boolean enum.
    pub fn bool_attr(&self, path: &str, name: &str) -> Result<bool> {
        let value = self.enum_attr(path, name)?;
        bool_from_name(value.name()).ok_or_else(|| {
            Error::TypeMismatch(format!("attribute '{name}' of '{path}' is not a boolean"))
        })
    }

    /// The type variant attached to the object, or `TypeVariant::None`.
    pub fn type_variant(&self, path: &str) -> Result<TypeVariant> {
        let arena = Arena::new();
        let obj_id = self.open_object(&arena, path)?;
        self.object_type_variant(obj_id)
    }

    fn object_type_variant(&self, obj_id: hid_t) -> Result<TypeVariant> {
        self.variant_from_attr(obj_id, registry::TYPE_VARIANT_ATTRIBUTE)
    }

    pub(crate) fn member_type_variant(&self, obj_id: hid_t, member: &str) -> Result<TypeVariant> {
        self.variant_from_attr(obj_id, &registry::member_variant_attribute(member))
    }

    fn variant_from_attr(&self, obj_id: hid_t, attr_name: &str) -> Result<TypeVariant> {
        if !attribute::exists(obj_id, attr_name)? {
            return Ok(TypeVariant::None);
        }
        let arena = Arena::new();
        let attr_id = attribute::open(&arena, obj_id, attr_name)?;
        let (_, ordinal) = self.read_enum_ordinal_attr(&arena, attr_id)?;
        Ok(usize::try_from(ordinal)
            .ok()
            .and_then(TypeVariant::from_ordinal)
            .unwrap_or(TypeVariant::None))
    }
}

pub(crate) fn bool_from_name(name: &str) -> Option<bool> {
    if name.eq_ignore_ascii_case("true") {
        Some(true)
    } else if name.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// Iterator over the natural blocks of a 1-D dataset; each step
/// performs one read round-trip.
pub struct ArrayBlocks<'r, T> {
    reader: &'r Reader,
    path: String,
    plan: NaturalBlocks,
    _marker: PhantomData<T>,
}

impl<'r, T: PrimitiveKind> Iterator for ArrayBlocks<'r, T> {
    type Item = Result<DataBlock<T>>;

    fn next(&mut self) -> Option<Self::Item> {
        let block = self.plan.next()?;
        let result = self
            .reader
            .read_array_block_with_offset::<T>(&self.path, block.dims[0], block.offset[0])
            .map(|data| DataBlock { data, index: block.index[0], offset: block.offset[0] });
        Some(result)
    }
}

/// Iterator over the natural blocks of an N-dimensional dataset.
pub struct MDArrayBlocks<'r, T> {
    reader: &'r Reader,
    path: String,
    plan: NaturalBlocks,
    _marker: PhantomData<T>,
}

impl<'r, T: PrimitiveKind> Iterator for MDArrayBlocks<'r, T> {
    type Item = Result<MDDataBlock<T>>;

    fn next(&mut self) -> Option<Self::Item> {
        let block = self.plan.next()?;
        let result = self
            .reader
            .read_md_array_block_with_offset::<T>(&self.path, &block.dims, &block.offset)
            .map(|data| MDDataBlock { data, index: block.index, offset: block.offset });
        Some(result)
    }
}

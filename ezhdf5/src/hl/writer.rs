//! The write surface: dataset creation, overwrite-vs-extend handling,
//! storage layout selection and all typed write operations.

use std::ops::Deref;
use std::path::Path;

use ndarray::Array2;

use hdf5_sys::h5d::{H5D_layout_t, H5Dcreate2, H5Dset_extent, H5Dwrite};
use hdf5_sys::h5g::H5Gcreate2;
use hdf5_sys::h5p::{H5Pcreate, H5Pset_chunk, H5Pset_deflate, H5Pset_layout};
use hdf5_sys::h5r::hobj_ref_t;

use ezhdf5_types::{FieldAccess, MemberMapping, RecordAccess};

use crate::globals::{H5P_DATASET_CREATE, H5T_STD_B64LE, H5T_STD_REF_OBJ};
use crate::hl::attribute;
use crate::hl::compound::CompoundType;
use crate::hl::dataspace::Dataspace;
use crate::hl::datatype::{native_primitive_id, storage_primitive_id};
use crate::hl::enums::EnumType;
use crate::hl::links;
use crate::hl::registry::{self, COMPOUND_PREFIX};
use crate::hl::reader::Reader;
use crate::internal_prelude::*;

/// Default gzip deflate level.
pub const DEFAULT_DEFLATE_LEVEL: u8 = 6;

/// Datasets smaller than this many bytes get the compact layout.
const COMPACT_LAYOUT_THRESHOLD: usize = 256;

/// Target byte size of automatically derived chunks.
const DEFAULT_CHUNK_TARGET_BYTES: usize = 64 * 1024;

/// Everything needed to create one dataset.
struct DatasetSpec {
    storage_type: hid_t,
    native_type: hid_t,
    dims: Vec<usize>,
    deflate: Option<u8>,
    chunk: Option<Vec<usize>>,
    compact: bool,
    elem_size: usize,
}

/// A typed writer over one HDF5 file. Every read operation is
/// available through deref to [`Reader`].
pub struct Writer {
    reader: Reader,
    use_extendable: bool,
    latest_format: bool,
}

impl Deref for Writer {
    type Target = Reader;

    fn deref(&self) -> &Reader {
        &self.reader
    }
}

/// Configures how a writer opens its file.
#[derive(Clone, Debug, Default)]
pub struct WriterBuilder {
    overwrite: bool,
    latest_format: bool,
    no_extendable: bool,
}

impl WriterBuilder {
    /// Truncate the file if it already exists.
    pub fn overwrite(mut self) -> Self {
        self.overwrite = true;
        self
    }

    /// Produce a file in the latest available file format; required for
    /// external links.
    pub fn latest_format(mut self) -> Self {
        self.latest_format = true;
        self
    }

    /// Use data types which can not be extended later on. This may
    /// reduce the initial size of the file.
    pub fn dont_use_extendable_datasets(mut self) -> Self {
        self.no_extendable = true;
        self
    }

    pub fn open<P: AsRef<Path>>(&self, path: P) -> Result<Writer> {
        let mode = if self.overwrite { OpenMode::Truncate } else { OpenMode::ReadWrite };
        let file = File::with_options().latest_format(self.latest_format).open_as(path, mode)?;
        Ok(Writer {
            reader: Reader::from_file(file),
            use_extendable: !self.no_extendable,
            latest_format: self.latest_format,
        })
    }
}

impl Writer {
    /// Opens a file for reading and writing with default options,
    /// creating it if missing.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::with_options().open(path)
    }

    pub fn with_options() -> WriterBuilder {
        WriterBuilder::default()
    }

    pub fn reader(&self) -> &Reader {
        &self.reader
    }

    /// Returns `true` if new datasets are created extendable.
    pub fn uses_extendable_datasets(&self) -> bool {
        self.use_extendable
    }

    /// Flushes the file to disk without discarding caches.
    pub fn flush(&self) -> Result<()> {
        self.file().flush()
    }

    // ------------------------------------------------------------------
    // Dataset creation and the core write path
    // ------------------------------------------------------------------

    fn default_chunk(
        &self, dims: &[usize], elem_size: usize, deflate: bool, extendable: bool,
    ) -> Option<Vec<usize>> {
        if (!deflate && !extendable) || dims.is_empty() {
            return None;
        }
        let mut chunk: Vec<usize> = dims.iter().map(|&d| d.max(1)).collect();
        // halve the largest axis until the chunk hits the byte target
        loop {
            let bytes = chunk.iter().product::<usize>() * elem_size;
            if bytes <= DEFAULT_CHUNK_TARGET_BYTES {
                break;
            }
            let axis = chunk
                .iter()
                .enumerate()
                .max_by_key(|&(_, &c)| c)
                .map(|(i, _)| i)
                .expect("chunk is non-empty");
            if chunk[axis] == 1 {
                break;
            }
            chunk[axis] /= 2;
        }
        Some(chunk)
    }

    fn effective_chunk(&self, spec: &DatasetSpec) -> Option<Vec<usize>> {
        let empty = spec.dims.iter().any(|&d| d == 0);
        if empty {
            // empty datasets are always created chunked so they can grow
            self.default_chunk(&spec.dims, spec.elem_size, spec.deflate.is_some(), true)
        } else if spec.compact {
            None
        } else if let Some(chunk) = &spec.chunk {
            Some(chunk.iter().map(|&c| c.max(1)).collect())
        } else {
            self.default_chunk(
                &spec.dims,
                spec.elem_size,
                spec.deflate.is_some(),
                self.use_extendable,
            )
        }
    }

    fn determine_layout(&self, spec: &DatasetSpec, chunk: &Option<Vec<usize>>) -> StorageLayout {
        if chunk.is_some() {
            return StorageLayout::Chunked;
        }
        let total_bytes = spec.dims.iter().product::<usize>() * spec.elem_size;
        if spec.compact || total_bytes < COMPACT_LAYOUT_THRESHOLD {
            StorageLayout::Compact
        } else {
            StorageLayout::Contiguous
        }
    }

    fn create_dataset(&self, arena: &Arena, path: &str, spec: &DatasetSpec) -> Result<hid_t> {
        h5lock_s!({
            let chunk = self.effective_chunk(spec);
            let layout = self.determine_layout(spec, &chunk);
            let space = if spec.dims.is_empty() {
                Dataspace::try_new_scalar()?
            } else if layout == StorageLayout::Chunked {
                let max_dims = vec![None; spec.dims.len()];
                Dataspace::try_new_simple(&spec.dims, Some(&max_dims))?
            } else {
                Dataspace::try_new_simple(&spec.dims, None)?
            };
            let dcpl = match layout {
                StorageLayout::Chunked => {
                    let dcpl = arena.adopt(h5call!(H5Pcreate(*H5P_DATASET_CREATE))?)?;
                    let chunk = chunk.expect("chunked layout implies a chunk shape");
                    let chunk_dims: Vec<hsize_t> = chunk.iter().map(|&c| c as _).collect();
                    h5call!(H5Pset_chunk(dcpl, chunk_dims.len() as _, chunk_dims.as_ptr()))?;
                    if let Some(level) = spec.deflate {
                        h5call!(H5Pset_deflate(dcpl, level.min(9) as _))?;
                    }
                    dcpl
                }
                StorageLayout::Compact => {
                    let dcpl = arena.adopt(h5call!(H5Pcreate(*H5P_DATASET_CREATE))?)?;
                    h5call!(H5Pset_layout(dcpl, H5D_layout_t::H5D_COMPACT))?;
                    dcpl
                }
                StorageLayout::Contiguous => H5P_DEFAULT,
            };
            let lcpl = links::intermediate_lcpl(arena)?;
            let cpath = to_cstring(path)?;
            arena.adopt(h5call!(H5Dcreate2(
                self.file().id(),
                cpath.as_ptr(),
                spec.storage_type,
                space.id(),
                lcpl,
                dcpl,
                H5P_DEFAULT
            ))?)
        })
    }

    /// Brings an existing dataset into shape for a full overwrite:
    /// extends it in place when the new shape fits the stored maximum
    /// dimensions, replaces it otherwise (shrinking always replaces).
    /// Growing beyond fixed maximum dimensions fails with
    /// `ShapeMismatch` unless the latest file format is in use.
    fn prepare_overwrite(
        &self, arena: &Arena, path: &str, ds: hid_t, spec: &DatasetSpec,
    ) -> Result<hid_t> {
        h5lock_s!({
            let space = Dataspace::from_dataset(ds)?;
            let current = space.dims();
            let max_dims = space.max_dims();
            if current == spec.dims {
                // flush before rewriting a contiguous dataset, or the
                // subsequent write may not overwrite the data
                if self.dataset_layout(arena, ds)? == StorageLayout::Contiguous {
                    self.file().flush()?;
                }
                return Ok(ds);
            }
            let rank_match = current.len() == spec.dims.len();
            let shrink =
                rank_match && spec.dims.iter().zip(&current).any(|(n, c)| n < c);
            let in_bounds = rank_match
                && spec.dims.iter().zip(&max_dims).all(|(n, m)| m.map_or(true, |m| *n <= m));
            if rank_match && !shrink && in_bounds {
                let dims: Vec<hsize_t> = spec.dims.iter().map(|&d| d as _).collect();
                h5call!(H5Dset_extent(ds, dims.as_ptr()))?;
                // flush before rewriting a contiguous dataset, or the
                // subsequent write may not overwrite the data
                if self.dataset_layout(arena, ds)? == StorageLayout::Contiguous {
                    self.file().flush()?;
                }
                Ok(ds)
            } else if !rank_match || shrink || self.latest_format {
                links::delete(self.file().id(), path)?;
                self.create_dataset(arena, path, spec)
            } else {
                Err(Error::ShapeMismatch(format!(
                    "new shape {:?} of '{path}' exceeds stored maximum {max_dims:?}",
                    spec.dims
                )))
            }
        })
    }

    fn dataset_layout(&self, arena: &Arena, ds: hid_t) -> Result<StorageLayout> {
        let dcpl = arena.adopt(h5call!(hdf5_sys::h5d::H5Dget_create_plist(ds))?)?;
        Ok(match h5lock!(hdf5_sys::h5p::H5Pget_layout(dcpl)) {
            H5D_layout_t::H5D_COMPACT => StorageLayout::Compact,
            H5D_layout_t::H5D_CHUNKED => StorageLayout::Chunked,
            _ => StorageLayout::Contiguous,
        })
    }

    /// The core write path: creates, extends or replaces the dataset as
    /// needed, then transfers the data (if any). Block writes require
    /// the dataset to exist.
    fn prim_write(
        &self, path: &str, spec: &DatasetSpec, slab: Option<(&[u64], &[usize])>,
        data: Option<*const c_void>,
    ) -> Result<()> {
        h5lock_s!({
            let arena = Arena::new();
            let block_write = slab.is_some();
            let ds = if block_write {
                self.open_dataset(&arena, path)?
            } else if self.exists(path)? {
                let ds = self.open_dataset(&arena, path)?;
                self.prepare_overwrite(&arena, path, ds, spec)?
            } else {
                self.create_dataset(&arena, path, spec)?
            };
            if let Some(buf) = data {
                if let Some((offset, count)) = slab {
                    let file_space = Dataspace::from_dataset(ds)?;
                    file_space.select_hyperslab(offset, count)?;
                    let memory_space = Dataspace::try_new_simple(count, None)?;
                    h5check(unsafe {
                        H5Dwrite(
                            ds,
                            spec.native_type,
                            memory_space.id(),
                            file_space.id(),
                            H5P_DEFAULT,
                            buf,
                        )
                    })?;
                } else {
                    h5check(unsafe {
                        H5Dwrite(ds, spec.native_type, H5S_ALL, H5S_ALL, H5P_DEFAULT, buf)
                    })?;
                }
            }
            Ok(())
        })
    }

    fn primitive_spec<T: PrimitiveKind>(
        &self, dims: Vec<usize>, deflate: Option<u8>, chunk: Option<Vec<usize>>, compact: bool,
    ) -> DatasetSpec {
        DatasetSpec {
            storage_type: storage_primitive_id::<T>(),
            native_type: native_primitive_id::<T>(),
            dims,
            deflate,
            chunk,
            compact,
            elem_size: T::type_descriptor().size(),
        }
    }

    // ------------------------------------------------------------------
    // Primitive writes
    // ------------------------------------------------------------------

    /// Writes a scalar value.
    pub fn write<T: PrimitiveKind>(&self, path: &str, value: T) -> Result<()> {
        let spec = self.primitive_spec::<T>(vec![], None, None, false);
        self.prim_write(path, &spec, None, Some((&value as *const T).cast()))
    }

    /// Writes a 1-D array.
    pub fn write_array<T: PrimitiveKind>(&self, path: &str, data: &[T]) -> Result<()> {
        let spec = self.primitive_spec::<T>(vec![data.len()], None, None, false);
        self.prim_write(path, &spec, None, Some(data.as_ptr().cast()))
    }

    /// Writes a 1-D array compressed with the default deflate level.
    pub fn write_array_deflate<T: PrimitiveKind>(&self, path: &str, data: &[T]) -> Result<()> {
        let spec =
            self.primitive_spec::<T>(vec![data.len()], Some(DEFAULT_DEFLATE_LEVEL), None, false);
        self.prim_write(path, &spec, None, Some(data.as_ptr().cast()))
    }

    /// Writes a 1-D array with a compact storage layout; only suitable
    /// for small data.
    pub fn write_array_compact<T: PrimitiveKind>(&self, path: &str, data: &[T]) -> Result<()> {
        let spec = self.primitive_spec::<T>(vec![data.len()], None, None, true);
        self.prim_write(path, &spec, None, Some(data.as_ptr().cast()))
    }

    /// Creates an empty 1-D dataset of `size` elements, chunked by
    /// `block_size` for block-wise writing.
    pub fn create_array<T: PrimitiveKind>(
        &self, path: &str, size: usize, block_size: usize,
    ) -> Result<()> {
        let chunk = (block_size > 0).then(|| vec![block_size]);
        let spec = self.primitive_spec::<T>(vec![size], None, chunk, false);
        self.prim_write(path, &spec, None, None)
    }

    /// Like [`create_array`](Self::create_array), with deflate
    /// compression enabled.
    pub fn create_array_deflate<T: PrimitiveKind>(
        &self, path: &str, size: usize, block_size: usize,
    ) -> Result<()> {
        let chunk = (block_size > 0).then(|| vec![block_size]);
        let spec = self.primitive_spec::<T>(vec![size], Some(DEFAULT_DEFLATE_LEVEL), chunk, false);
        self.prim_write(path, &spec, None, None)
    }

    /// Writes block number `block_number` of an existing 1-D dataset.
    pub fn write_block<T: PrimitiveKind>(
        &self, path: &str, data: &[T], block_number: u64,
    ) -> Result<()> {
        self.write_block_with_offset(path, data, block_number * data.len() as u64)
    }

    /// Writes `data` into an existing 1-D dataset at `offset`.
    pub fn write_block_with_offset<T: PrimitiveKind>(
        &self, path: &str, data: &[T], offset: u64,
    ) -> Result<()> {
        let spec = self.primitive_spec::<T>(vec![data.len()], None, None, false);
        self.prim_write(
            path,
            &spec,
            Some((&[offset], &[data.len()])),
            Some(data.as_ptr().cast()),
        )
    }

    /// Writes an N-dimensional array.
    pub fn write_md_array<T: PrimitiveKind>(&self, path: &str, data: &MDArray<T>) -> Result<()> {
        let spec = self.primitive_spec::<T>(data.dims().to_vec(), None, None, false);
        self.prim_write(path, &spec, None, Some(data.as_slice().as_ptr().cast()))
    }

    pub fn write_md_array_deflate<T: PrimitiveKind>(
        &self, path: &str, data: &MDArray<T>,
    ) -> Result<()> {
        let spec = self.primitive_spec::<T>(
            data.dims().to_vec(),
            Some(DEFAULT_DEFLATE_LEVEL),
            None,
            false,
        );
        self.prim_write(path, &spec, None, Some(data.as_slice().as_ptr().cast()))
    }

    pub fn write_md_array_compact<T: PrimitiveKind>(
        &self, path: &str, data: &MDArray<T>,
    ) -> Result<()> {
        let spec = self.primitive_spec::<T>(data.dims().to_vec(), None, None, true);
        self.prim_write(path, &spec, None, Some(data.as_slice().as_ptr().cast()))
    }

    /// Creates an empty N-dimensional dataset with the given chunk
    /// geometry.
    pub fn create_md_array<T: PrimitiveKind>(
        &self, path: &str, dims: &[usize], chunk: &[usize],
    ) -> Result<()> {
        ensure!(
            chunk.is_empty() || chunk.len() == dims.len(),
            Error::RankMismatch { expected: dims.len(), actual: chunk.len() }
        );
        let chunk = (!chunk.is_empty()).then(|| chunk.to_vec());
        let spec = self.primitive_spec::<T>(dims.to_vec(), None, chunk, false);
        self.prim_write(path, &spec, None, None)
    }

    pub fn create_md_array_deflate<T: PrimitiveKind>(
        &self, path: &str, dims: &[usize], chunk: &[usize],
    ) -> Result<()> {
        ensure!(
            chunk.is_empty() || chunk.len() == dims.len(),
            Error::RankMismatch { expected: dims.len(), actual: chunk.len() }
        );
        let chunk = (!chunk.is_empty()).then(|| chunk.to_vec());
        let spec =
            self.primitive_spec::<T>(dims.to_vec(), Some(DEFAULT_DEFLATE_LEVEL), chunk, false);
        self.prim_write(path, &spec, None, None)
    }

    /// Writes one block of an existing N-dimensional dataset by block
    /// number.
    pub fn write_md_array_block<T: PrimitiveKind>(
        &self, path: &str, data: &MDArray<T>, block_number: &[u64],
    ) -> Result<()> {
        ensure!(
            block_number.len() == data.rank(),
            Error::RankMismatch { expected: data.rank(), actual: block_number.len() }
        );
        let offset: Vec<u64> =
            block_number.iter().zip(data.dims()).map(|(&n, &d)| n * d as u64).collect();
        self.write_md_array_block_with_offset(path, data, &offset)
    }

    /// Writes one block of an existing N-dimensional dataset at an
    /// element offset.
    pub fn write_md_array_block_with_offset<T: PrimitiveKind>(
        &self, path: &str, data: &MDArray<T>, offset: &[u64],
    ) -> Result<()> {
        ensure!(
            offset.len() == data.rank(),
            Error::RankMismatch { expected: data.rank(), actual: offset.len() }
        );
        let spec = self.primitive_spec::<T>(data.dims().to_vec(), None, None, false);
        self.prim_write(
            path,
            &spec,
            Some((offset, data.dims())),
            Some(data.as_slice().as_ptr().cast()),
        )
    }

    /// Writes a rank-2 array.
    pub fn write_matrix<T: PrimitiveKind>(&self, path: &str, data: &Array2<T>) -> Result<()> {
        self.write_md_array(path, &MDArray::from(data))
    }

    pub fn write_matrix_deflate<T: PrimitiveKind>(
        &self, path: &str, data: &Array2<T>,
    ) -> Result<()> {
        self.write_md_array_deflate(path, &MDArray::from(data))
    }

    /// Creates an empty matrix with the given chunk geometry.
    pub fn create_matrix<T: PrimitiveKind>(
        &self, path: &str, size_y: usize, size_x: usize, chunk_y: usize, chunk_x: usize,
    ) -> Result<()> {
        self.create_md_array::<T>(path, &[size_y, size_x], &[chunk_y, chunk_x])
    }

    pub fn write_matrix_block<T: PrimitiveKind>(
        &self, path: &str, data: &Array2<T>, block_number_y: u64, block_number_x: u64,
    ) -> Result<()> {
        self.write_md_array_block(path, &MDArray::from(data), &[block_number_y, block_number_x])
    }

    pub fn write_matrix_block_with_offset<T: PrimitiveKind>(
        &self, path: &str, data: &Array2<T>, offset_y: u64, offset_x: u64,
    ) -> Result<()> {
        self.write_md_array_block_with_offset(path, &MDArray::from(data), &[offset_y, offset_x])
    }

    // ------------------------------------------------------------------
    // Strings
    // ------------------------------------------------------------------

    fn string_spec(&self, cell_bytes: usize, dims: Vec<usize>, deflate: Option<u8>) -> Result<(Datatype, DatasetSpec)> {
        let desc = TypeDescriptor::FixedString {
            len: cell_bytes,
            encoding: CharacterEncoding::Utf8,
        };
        let dtype = Datatype::from_descriptor(&desc)?;
        let spec = DatasetSpec {
            storage_type: dtype.id(),
            native_type: dtype.id(),
            dims,
            deflate,
            chunk: None,
            compact: false,
            elem_size: cell_bytes,
        };
        Ok((dtype, spec))
    }

    /// Writes a scalar fixed-length string sized to the value.
    pub fn write_string(&self, path: &str, value: &str) -> Result<()> {
        self.write_string_fixed(path, value, value.len())
    }

    /// Writes a scalar fixed-length string with space for `max_bytes`
    /// bytes (plus the terminator); longer values are truncated.
    pub fn write_string_fixed(&self, path: &str, value: &str, max_bytes: usize) -> Result<()> {
        let cell = max_bytes + 1;
        let (_dtype, spec) = self.string_spec(cell, vec![], None)?;
        let bytes =
            ezhdf5_types::string::to_padded_bytes(value, cell, CharacterEncoding::Utf8);
        self.prim_write(path, &spec, None, Some(bytes.as_ptr().cast()))
    }

    /// Writes a 1-D array of fixed-length strings with a common cell
    /// size of `max_bytes` bytes plus the terminator.
    pub fn write_string_array<S: AsRef<str>>(
        &self, path: &str, values: &[S], max_bytes: usize,
    ) -> Result<()> {
        let cell = max_bytes + 1;
        let (_dtype, spec) = self.string_spec(cell, vec![values.len()], None)?;
        let mut buf = Vec::with_capacity(cell * values.len());
        for value in values {
            buf.extend(ezhdf5_types::string::to_padded_bytes(
                value.as_ref(),
                cell,
                CharacterEncoding::Utf8,
            ));
        }
        self.prim_write(path, &spec, None, Some(buf.as_ptr().cast()))
    }

    /// Writes a scalar variable-length string using the file's
    /// committed variable-length string type.
    pub fn write_string_var(&self, path: &str, value: &str) -> Result<()> {
        let dtype = self.registry().variable_string_type(self.file(), true)?;
        let native = dtype.to_native()?;
        let spec = DatasetSpec {
            storage_type: dtype.id(),
            native_type: native.id(),
            dims: vec![],
            deflate: None,
            chunk: None,
            compact: false,
            elem_size: dtype.size(),
        };
        let value = to_cstring(value)?;
        let ptr = value.as_ptr();
        self.prim_write(path, &spec, None, Some((&ptr as *const *const c_char).cast()))
    }

    // ------------------------------------------------------------------
    // Booleans, bit fields, opaque data
    // ------------------------------------------------------------------

    /// Writes a scalar boolean as the committed `{FALSE, TRUE}`
    /// enumeration.
    pub fn write_bool(&self, path: &str, value: bool) -> Result<()> {
        let dtype = self.registry().boolean_type(self.file(), true)?;
        let native = dtype.to_native()?;
        let spec = DatasetSpec {
            storage_type: dtype.id(),
            native_type: native.id(),
            dims: vec![],
            deflate: None,
            chunk: None,
            compact: false,
            elem_size: 1,
        };
        let ordinal = value as i8;
        self.prim_write(path, &spec, None, Some((&ordinal as *const i8).cast()))
    }

    fn bit_field_spec(&self, words: usize, deflate: Option<u8>, compact: bool) -> DatasetSpec {
        DatasetSpec {
            storage_type: *H5T_STD_B64LE,
            native_type: *crate::globals::H5T_NATIVE_B64,
            dims: vec![words],
            deflate,
            chunk: None,
            compact,
            elem_size: 8,
        }
    }

    /// Writes a bit field as a 1-D dataset of 64-bit words with the
    /// trailing zero words trimmed.
    pub fn write_bit_field(&self, path: &str, data: &BitField) -> Result<()> {
        let words = data.to_storage_form();
        let spec = self.bit_field_spec(words.len(), None, false);
        self.prim_write(path, &spec, None, Some(words.as_ptr().cast()))
    }

    pub fn write_bit_field_deflate(&self, path: &str, data: &BitField) -> Result<()> {
        let words = data.to_storage_form();
        let spec = self.bit_field_spec(words.len(), Some(DEFAULT_DEFLATE_LEVEL), false);
        self.prim_write(path, &spec, None, Some(words.as_ptr().cast()))
    }

    pub fn write_bit_field_compact(&self, path: &str, data: &BitField) -> Result<()> {
        let words = data.to_storage_form();
        let spec = self.bit_field_spec(words.len(), None, true);
        self.prim_write(path, &spec, None, Some(words.as_ptr().cast()))
    }

    /// Writes an opaque byte blob under a committed tagged type.
    pub fn write_opaque(&self, path: &str, tag: &str, data: &[u8]) -> Result<()> {
        let dtype = self.registry().opaque_type(self.file(), tag, 1, true)?;
        let spec = DatasetSpec {
            storage_type: dtype.id(),
            native_type: dtype.id(),
            dims: vec![data.len()],
            deflate: None,
            chunk: None,
            compact: false,
            elem_size: 1,
        };
        self.prim_write(path, &spec, None, Some(data.as_ptr().cast()))
    }

    // ------------------------------------------------------------------
    // Enumerations
    // ------------------------------------------------------------------

    /// The committed enumeration type `name`, created on first use.
    /// With `check` set and an existing committed type, the stored
    /// value list is verified member by member.
    pub fn enum_type(&self, name: &str, values: &[&str], check: bool) -> Result<EnumType> {
        let dtype = self.registry().enum_type(self.file(), name, values, check, true)?;
        EnumType::new(EnumDef::new(name, values), dtype)
    }

    fn committed_enum(&self, def: &EnumDef) -> Result<EnumType> {
        let values: Vec<&str> = def.values.iter().map(String::as_str).collect();
        self.enum_type(&def.name, &values, true)
    }

    /// Writes a scalar enumeration value.
    pub fn write_enum(&self, path: &str, value: &EnumValue) -> Result<()> {
        let etype = self.committed_enum(value.def())?;
        let spec = DatasetSpec {
            storage_type: etype.storage_id(),
            native_type: etype.native_id(),
            dims: vec![],
            deflate: None,
            chunk: None,
            compact: false,
            elem_size: value.def().storage_size() as usize,
        };
        let bytes = value.to_storage_bytes();
        self.prim_write(path, &spec, None, Some(bytes.as_ptr().cast()))
    }

    /// Writes an N-dimensional enumeration array.
    pub fn write_enum_array(&self, path: &str, data: &EnumArray) -> Result<()> {
        self.write_enum_array_impl(path, data, None, false)
    }

    pub fn write_enum_array_deflate(&self, path: &str, data: &EnumArray) -> Result<()> {
        self.write_enum_array_impl(path, data, Some(DEFAULT_DEFLATE_LEVEL), false)
    }

    /// Writes an enumeration array with a compact layout; only
    /// suitable for small data.
    pub fn write_enum_array_compact(&self, path: &str, data: &EnumArray) -> Result<()> {
        self.write_enum_array_impl(path, data, None, true)
    }

    fn write_enum_array_impl(
        &self, path: &str, data: &EnumArray, deflate: Option<u8>, compact: bool,
    ) -> Result<()> {
        use ezhdf5_types::OrdinalStorage;
        let etype = self.committed_enum(data.def())?;
        let spec = DatasetSpec {
            storage_type: etype.storage_id(),
            native_type: etype.native_id(),
            dims: data.dims().to_vec(),
            deflate,
            chunk: None,
            compact,
            elem_size: data.def().storage_size() as usize,
        };
        let ptr: *const c_void = match data.storage() {
            OrdinalStorage::I8(a) => a.as_slice().as_ptr().cast(),
            OrdinalStorage::I16(a) => a.as_slice().as_ptr().cast(),
            OrdinalStorage::I32(a) => a.as_slice().as_ptr().cast(),
        };
        self.prim_write(path, &spec, None, Some(ptr))
    }

    // ------------------------------------------------------------------
    // Compounds
    // ------------------------------------------------------------------

    /// The committed compound type `name` built from a member mapping;
    /// the packed layout is committed on first use.
    pub fn compound_type(&self, name: &str, members: &[MemberMapping]) -> Result<CompoundType> {
        self.compound_type_impl(name, members, None)
    }

    /// Like [`compound_type`](Self::compound_type), probing a
    /// field-bound record type for missing fields; members the record
    /// type lacks get dummy encoders that keep the on-disk layout.
    pub fn compound_type_bound<T: FieldAccess + Default>(
        &self, name: &str, members: &[MemberMapping],
    ) -> Result<CompoundType> {
        let prototype = ezhdf5_types::BoundRecord(T::default());
        self.compound_type_impl(name, members, Some(&prototype))
    }

    fn compound_type_impl(
        &self, name: &str, members: &[MemberMapping], prototype: Option<&dyn RecordAccess>,
    ) -> Result<CompoundType> {
        let layout = self.factories().create_encoders(prototype, members)?;
        let path = registry::data_type_path(COMPOUND_PREFIX, name);
        let desc = TypeDescriptor::Compound(layout.descriptor());
        let storage = self.registry().open_or_commit(self.file(), &path, &desc, true)?;
        CompoundType::with_storage(name, layout, storage)
    }

    fn compound_spec(
        &self, ctype: &CompoundType, dims: Vec<usize>, deflate: Option<u8>,
        chunk: Option<Vec<usize>>, compact: bool,
    ) -> DatasetSpec {
        DatasetSpec {
            storage_type: ctype.storage_id(),
            native_type: ctype.native_id(),
            dims,
            deflate,
            chunk,
            compact,
            elem_size: ctype.record_size(),
        }
    }

    /// Tags the dataset with the type variants of the compound members
    /// that carry one.
    fn write_member_variants(&self, path: &str, ctype: &CompoundType) -> Result<()> {
        for encoder in ctype.layout().encoders() {
            let variant = encoder.type_variant();
            if variant != TypeVariant::None {
                self.set_variant_attr(
                    path,
                    &registry::member_variant_attribute(encoder.member_name()),
                    variant,
                )?;
            }
        }
        Ok(())
    }

    /// Writes a scalar compound record.
    pub fn write_compound(
        &self, path: &str, ctype: &CompoundType, record: &dyn RecordAccess,
    ) -> Result<()> {
        let image = ctype.byteify(&[record])?;
        let spec = self.compound_spec(ctype, vec![], None, None, false);
        self.prim_write(path, &spec, None, Some(image.as_ptr().cast()))?;
        self.write_member_variants(path, ctype)
    }

    /// Writes a 1-D array of compound records.
    pub fn write_compound_array(
        &self, path: &str, ctype: &CompoundType, records: &[&dyn RecordAccess],
    ) -> Result<()> {
        let image = ctype.byteify(records)?;
        let spec = self.compound_spec(ctype, vec![records.len()], None, None, false);
        self.prim_write(path, &spec, None, Some(image.as_ptr().cast()))?;
        self.write_member_variants(path, ctype)
    }

    pub fn write_compound_array_deflate(
        &self, path: &str, ctype: &CompoundType, records: &[&dyn RecordAccess],
    ) -> Result<()> {
        let image = ctype.byteify(records)?;
        let spec = self.compound_spec(
            ctype,
            vec![records.len()],
            Some(DEFAULT_DEFLATE_LEVEL),
            None,
            false,
        );
        self.prim_write(path, &spec, None, Some(image.as_ptr().cast()))?;
        self.write_member_variants(path, ctype)
    }

    /// Creates an empty 1-D compound dataset for block-wise writing.
    pub fn create_compound_array(
        &self, path: &str, ctype: &CompoundType, size: usize, block_size: usize,
    ) -> Result<()> {
        let chunk = (block_size > 0).then(|| vec![block_size]);
        let spec = self.compound_spec(ctype, vec![size], None, chunk, false);
        self.prim_write(path, &spec, None, None)?;
        self.write_member_variants(path, ctype)
    }

    /// Writes records into an existing 1-D compound dataset at
    /// `offset`.
    pub fn write_compound_array_block_with_offset(
        &self, path: &str, ctype: &CompoundType, records: &[&dyn RecordAccess], offset: u64,
    ) -> Result<()> {
        let image = ctype.byteify(records)?;
        let spec = self.compound_spec(ctype, vec![records.len()], None, None, false);
        self.prim_write(
            path,
            &spec,
            Some((&[offset], &[records.len()])),
            Some(image.as_ptr().cast()),
        )
    }

    // ------------------------------------------------------------------
    // References
    // ------------------------------------------------------------------

    /// Writes a scalar object reference pointing at `target_path`.
    pub fn write_object_reference(&self, path: &str, target_path: &str) -> Result<()> {
        if !self.exists(target_path)? {
            fail!(Error::NoSuchObject(target_path.to_owned()));
        }
        let reference = links::create_reference(self.file().id(), target_path)?;
        let spec = DatasetSpec {
            storage_type: *H5T_STD_REF_OBJ,
            native_type: *H5T_STD_REF_OBJ,
            dims: vec![],
            deflate: None,
            chunk: None,
            compact: false,
            elem_size: std::mem::size_of::<hobj_ref_t>(),
        };
        self.prim_write(path, &spec, None, Some((&reference as *const hobj_ref_t).cast()))
    }

    // ------------------------------------------------------------------
    // Groups, links and deletion
    // ------------------------------------------------------------------

    /// Creates a group (and any missing intermediate groups).
    pub fn create_group(&self, path: &str) -> Result<()> {
        h5lock_s!({
            let arena = Arena::new();
            let lcpl = links::intermediate_lcpl(&arena)?;
            let cpath = to_cstring(path)?;
            arena.adopt(h5call!(H5Gcreate2(
                self.file().id(),
                cpath.as_ptr(),
                lcpl,
                H5P_DEFAULT,
                H5P_DEFAULT
            ))?)?;
            Ok(())
        })
    }

    /// Removes the object at the path.
    pub fn delete(&self, path: &str) -> Result<()> {
        if !self.exists(path)? {
            fail!(Error::NoSuchObject(path.to_owned()));
        }
        links::delete(self.file().id(), path)
    }

    pub fn create_hard_link(&self, target_path: &str, link_path: &str) -> Result<()> {
        links::create_hard(self.file().id(), target_path, link_path)
    }

    pub fn create_soft_link(&self, target_path: &str, link_path: &str) -> Result<()> {
        links::create_soft(self.file().id(), target_path, link_path)
    }

    /// Creates a soft link, replacing any existing link at the path.
    pub fn create_or_update_soft_link(&self, target_path: &str, link_path: &str) -> Result<()> {
        if self.exists(link_path)? {
            links::delete(self.file().id(), link_path)?;
        }
        self.create_soft_link(target_path, link_path)
    }

    /// Creates an external link `EXTERNAL::<file>::<path>`; requires
    /// the latest file format.
    pub fn create_external_link(
        &self, target_file: &str, target_path: &str, link_path: &str,
    ) -> Result<()> {
        ensure!(
            self.latest_format,
            Error::LayoutUnsupported(
                "external links require the latest file format".to_owned()
            )
        );
        links::create_external(self.file().id(), target_file, target_path, link_path)
    }

    pub fn create_or_update_external_link(
        &self, target_file: &str, target_path: &str, link_path: &str,
    ) -> Result<()> {
        if self.exists(link_path)? {
            links::delete(self.file().id(), link_path)?;
        }
        self.create_external_link(target_file, target_path, link_path)
    }

    // ------------------------------------------------------------------
    // Attributes
    // ------------------------------------------------------------------

    fn with_attr<R>(
        &self, path: &str, name: &str, type_id: hid_t, space: &Dataspace,
        f: impl FnOnce(hid_t) -> Result<R>,
    ) -> Result<R> {
        h5lock_s!({
            let arena = Arena::new();
            let obj_id = self.open_object(&arena, path)?;
            let attr_id = attribute::open_or_create(&arena, obj_id, name, type_id, space)?;
            f(attr_id)
        })
    }

    /// Adds or overwrites a scalar attribute.
    pub fn set_attr<T: PrimitiveKind>(&self, path: &str, name: &str, value: T) -> Result<()> {
        let space = Dataspace::try_new_scalar()?;
        self.with_attr(path, name, storage_primitive_id::<T>(), &space, |attr_id| {
            attribute::write_raw(attr_id, native_primitive_id::<T>(), (&value as *const T).cast())
        })
    }

    /// Adds or overwrites a 1-D array attribute.
    pub fn set_attr_array<T: PrimitiveKind>(
        &self, path: &str, name: &str, values: &[T],
    ) -> Result<()> {
        let space = Dataspace::try_new_simple(&[values.len()], None)?;
        self.with_attr(path, name, storage_primitive_id::<T>(), &space, |attr_id| {
            attribute::write_raw(attr_id, native_primitive_id::<T>(), values.as_ptr().cast())
        })
    }

    /// Adds or overwrites a fixed-length string attribute sized to the
    /// value.
    pub fn set_string_attr(&self, path: &str, name: &str, value: &str) -> Result<()> {
        let cell = value.len() + 1;
        let desc = TypeDescriptor::FixedString { len: cell, encoding: CharacterEncoding::Utf8 };
        let dtype = Datatype::from_descriptor(&desc)?;
        let space = Dataspace::try_new_scalar()?;
        let bytes = ezhdf5_types::string::to_padded_bytes(value, cell, CharacterEncoding::Utf8);
        self.with_attr(path, name, dtype.id(), &space, |attr_id| {
            attribute::write_raw(attr_id, dtype.id(), bytes.as_ptr().cast())
        })
    }

    /// Adds or overwrites a boolean attribute stored as the committed
    /// boolean enumeration.
    pub fn set_bool_attr(&self, path: &str, name: &str, value: bool) -> Result<()> {
        let dtype = self.registry().boolean_type(self.file(), true)?;
        let native = dtype.to_native()?;
        let space = Dataspace::try_new_scalar()?;
        let ordinal = value as i8;
        self.with_attr(path, name, dtype.id(), &space, |attr_id| {
            attribute::write_raw(attr_id, native.id(), (&ordinal as *const i8).cast())
        })
    }

    /// Adds or overwrites an enumeration attribute.
    pub fn set_enum_attr(&self, path: &str, name: &str, value: &EnumValue) -> Result<()> {
        let etype = self.committed_enum(value.def())?;
        let space = Dataspace::try_new_scalar()?;
        let bytes = value.to_storage_bytes();
        self.with_attr(path, name, etype.storage_id(), &space, |attr_id| {
            attribute::write_raw(attr_id, etype.native_id(), bytes.as_ptr().cast())
        })
    }

    /// Tags the object at the path with a type variant.
    pub fn set_type_variant(&self, path: &str, variant: TypeVariant) -> Result<()> {
        self.set_variant_attr(path, registry::TYPE_VARIANT_ATTRIBUTE, variant)
    }

    fn set_variant_attr(&self, path: &str, attr_name: &str, variant: TypeVariant) -> Result<()> {
        let dtype = self.registry().type_variant_type(self.file(), true)?;
        let native = dtype.to_native()?;
        let space = Dataspace::try_new_scalar()?;
        let ordinal = variant.ordinal() as i8;
        self.with_attr(path, attr_name, dtype.id(), &space, |attr_id| {
            attribute::write_raw(attr_id, native.id(), (&ordinal as *const i8).cast())
        })
    }

    /// Removes an attribute from the object at the path.
    pub fn delete_attr(&self, path: &str, name: &str) -> Result<()> {
        let arena = Arena::new();
        let obj_id = self.open_object(&arena, path)?;
        attribute::delete(obj_id, name)
    }
}

use std::fmt::{self, Debug};

use hdf5_sys::h5d::H5Dget_space;
use hdf5_sys::h5s::{
    H5S_seloper_t, H5Screate, H5Screate_simple, H5Sget_simple_extent_dims,
    H5Sget_simple_extent_ndims, H5Sselect_hyperslab, H5S_class_t,
};

use crate::internal_prelude::*;

/// Represents the HDF5 dataspace object.
#[repr(transparent)]
#[derive(Clone)]
pub struct Dataspace(Handle);

impl ObjectClass for Dataspace {
    const NAME: &'static str = "dataspace";
    const VALID_TYPES: &'static [H5I_type_t] = &[H5I_DATASPACE];

    fn from_handle(handle: Handle) -> Self {
        Self(handle)
    }

    fn handle(&self) -> &Handle {
        &self.0
    }

    fn short_repr(&self) -> Option<String> {
        Some(format!("{:?}", self.dims()))
    }
}

impl Debug for Dataspace {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.debug_fmt(f)
    }
}

impl Dataspace {
    /// Creates a scalar (rank 0) dataspace.
    pub fn try_new_scalar() -> Result<Self> {
        Self::from_id(h5call!(H5Screate(H5S_class_t::H5S_SCALAR))?)
    }

    /// Creates a simple dataspace; a `None` max size means unlimited.
    pub fn try_new_simple(dims: &[usize], max_dims: Option<&[Option<usize>]>) -> Result<Self> {
        if let Some(max_dims) = max_dims {
            ensure!(
                max_dims.len() == dims.len(),
                Error::ShapeMismatch(format!(
                    "max dims rank {} != dims rank {}",
                    max_dims.len(),
                    dims.len()
                ))
            );
        }
        let dims: Vec<hsize_t> = dims.iter().map(|&d| d as _).collect();
        let max_dims: Option<Vec<hsize_t>> = max_dims.map(|max_dims| {
            max_dims.iter().map(|d| d.map_or(H5S_UNLIMITED, |d| d as _)).collect()
        });
        let max_ptr = max_dims.as_ref().map_or(std::ptr::null(), |m| m.as_ptr());
        Self::from_id(h5call!(H5Screate_simple(dims.len() as _, dims.as_ptr(), max_ptr))?)
    }

    /// The dataspace of a dataset handle.
    pub(crate) fn from_dataset(dataset_id: hid_t) -> Result<Self> {
        Self::from_id(h5call!(H5Dget_space(dataset_id))?)
    }

    pub fn ndim(&self) -> usize {
        h5call!(H5Sget_simple_extent_ndims(self.id())).unwrap_or(0).max(0) as _
    }

    pub fn dims(&self) -> Vec<usize> {
        self.get_extents().0
    }

    /// Per-axis maximum sizes with `None` for unlimited axes.
    pub fn max_dims(&self) -> Vec<Option<usize>> {
        self.get_extents().1
    }

    pub fn size(&self) -> usize {
        self.dims().iter().product()
    }

    fn get_extents(&self) -> (Vec<usize>, Vec<Option<usize>>) {
        h5lock_s!({
            let ndim = self.ndim();
            let mut dims = vec![0 as hsize_t; ndim];
            let mut max_dims = vec![0 as hsize_t; ndim];
            let res = unsafe {
                H5Sget_simple_extent_dims(self.id(), dims.as_mut_ptr(), max_dims.as_mut_ptr())
            };
            if res < 0 {
                return (vec![], vec![]);
            }
            (
                dims.into_iter().map(|d| d as _).collect(),
                max_dims
                    .into_iter()
                    .map(|d| if d == H5S_UNLIMITED { None } else { Some(d as _) })
                    .collect(),
            )
        })
    }

    /// Selects a rectilinear hyperslab `(start, count)` on the space.
    pub fn select_hyperslab(&self, start: &[u64], count: &[usize]) -> Result<()> {
        ensure!(
            start.len() == count.len(),
            Error::ShapeMismatch(format!(
                "hyperslab start rank {} != count rank {}",
                start.len(),
                count.len()
            ))
        );
        let start: Vec<hsize_t> = start.iter().map(|&d| d as _).collect();
        let count: Vec<hsize_t> = count.iter().map(|&d| d as _).collect();
        h5call!(H5Sselect_hyperslab(
            self.id(),
            H5S_seloper_t::H5S_SELECT_SET,
            start.as_ptr(),
            std::ptr::null(),
            count.as_ptr(),
            std::ptr::null(),
        ))
        .and(Ok(()))
    }
}

/// The plan of one I/O request: the dimensions of the transferred
/// block, the memory/file dataspace selections (`None` stands for the
/// whole space) and the flat element count to allocate.
pub(crate) struct SpaceParams {
    pub dims: Vec<usize>,
    pub memory_space: Option<Dataspace>,
    pub file_space: Option<Dataspace>,
    pub block_size: usize,
}

impl SpaceParams {
    pub fn memory_space_id(&self) -> hid_t {
        self.memory_space.as_ref().map_or(H5S_ALL, |s| s.id())
    }

    pub fn file_space_id(&self) -> hid_t {
        self.file_space.as_ref().map_or(H5S_ALL, |s| s.id())
    }

    /// A full-extent transfer of the whole dataset.
    pub fn full(dataset_id: hid_t) -> Result<Self> {
        let space = Dataspace::from_dataset(dataset_id)?;
        let dims = space.dims();
        let block_size = dims.iter().product();
        Ok(Self { dims, memory_space: None, file_space: None, block_size })
    }

    /// A 1-D block `[offset, offset + block_size)`, clamped to the end
    /// of the dataset. Fails with `RankMismatch` for non-1-D datasets.
    pub fn slice_1d(dataset_id: hid_t, offset: u64, block_size: usize) -> Result<Self> {
        let file_space = Dataspace::from_dataset(dataset_id)?;
        let dims = file_space.dims();
        if dims.len() != 1 {
            fail!(Error::RankMismatch { expected: 1, actual: dims.len() });
        }
        let size = dims[0] as u64;
        let effective = block_size.min(size.saturating_sub(offset) as usize);
        file_space.select_hyperslab(&[offset.min(size)], &[effective])?;
        let memory_space = Dataspace::try_new_simple(&[effective], None)?;
        Ok(Self {
            dims: vec![effective],
            memory_space: Some(memory_space),
            file_space: Some(file_space),
            block_size: effective,
        })
    }

    /// An N-D block at `offset` of shape `block_dims`, clamped per axis
    /// to the dataset extent.
    pub fn block_nd(dataset_id: hid_t, offset: &[u64], block_dims: &[usize]) -> Result<Self> {
        let file_space = Dataspace::from_dataset(dataset_id)?;
        let dims = file_space.dims();
        if dims.len() != block_dims.len() || offset.len() != block_dims.len() {
            fail!(Error::RankMismatch { expected: dims.len(), actual: block_dims.len() });
        }
        let effective: Vec<usize> = (0..dims.len())
            .map(|i| block_dims[i].min((dims[i] as u64).saturating_sub(offset[i]) as usize))
            .collect();
        file_space.select_hyperslab(offset, &effective)?;
        let memory_space = Dataspace::try_new_simple(&effective, None)?;
        let block_size = effective.iter().product();
        Ok(Self {
            dims: effective,
            memory_space: Some(memory_space),
            file_space: Some(file_space),
            block_size,
        })
    }

    /// A transfer into a hyperslab of a caller-provided host array:
    /// the memory space selects `[mem_offset, mem_offset + e)` within
    /// `mem_dims`, the file space `[file_offset, file_offset + e)`,
    /// where `e` is clamped against both spaces.
    pub fn with_memory_offset(
        dataset_id: hid_t, mem_dims: &[usize], mem_offset: &[usize],
        file_block: Option<(&[u64], &[usize])>,
    ) -> Result<Self> {
        let file_space = Dataspace::from_dataset(dataset_id)?;
        let dims = file_space.dims();
        let rank = dims.len();
        if mem_dims.len() != rank || mem_offset.len() != rank {
            fail!(Error::RankMismatch { expected: rank, actual: mem_dims.len() });
        }
        for i in 0..rank {
            ensure!(
                mem_offset[i] <= mem_dims[i],
                Error::ShapeMismatch(format!(
                    "memory offset {:?} exceeds host array dims {:?}",
                    mem_offset, mem_dims
                ))
            );
        }
        let (file_offset, block_dims) = match file_block {
            Some((offset, block_dims)) => {
                if offset.len() != rank || block_dims.len() != rank {
                    fail!(Error::RankMismatch { expected: rank, actual: block_dims.len() });
                }
                (offset.to_vec(), block_dims.to_vec())
            }
            None => (vec![0; rank], dims.clone()),
        };
        let effective: Vec<usize> = (0..rank)
            .map(|i| {
                block_dims[i]
                    .min((dims[i] as u64).saturating_sub(file_offset[i]) as usize)
                    .min(mem_dims[i] - mem_offset[i])
            })
            .collect();
        file_space.select_hyperslab(&file_offset, &effective)?;
        let memory_space = Dataspace::try_new_simple(mem_dims, None)?;
        let mem_start: Vec<u64> = mem_offset.iter().map(|&d| d as _).collect();
        memory_space.select_hyperslab(&mem_start, &effective)?;
        let block_size = effective.iter().product();
        Ok(Self {
            dims: effective,
            memory_space: Some(memory_space),
            file_space: Some(file_space),
            block_size,
        })
    }
}

#[cfg(test)]
pub mod tests {
    use super::Dataspace;
    use crate::internal_prelude::*;

    #[test]
    pub fn test_scalar_space() {
        let space = Dataspace::try_new_scalar().unwrap();
        assert_eq!(space.ndim(), 0);
        assert_eq!(space.dims(), vec![]);
        assert_eq!(space.size(), 1);
    }

    #[test]
    pub fn test_simple_space() {
        let space = Dataspace::try_new_simple(&[3, 4], None).unwrap();
        assert_eq!(space.ndim(), 2);
        assert_eq!(space.dims(), vec![3, 4]);
        assert_eq!(space.max_dims(), vec![Some(3), Some(4)]);
        assert_eq!(space.size(), 12);
    }

    #[test]
    pub fn test_unlimited_axis() {
        let space = Dataspace::try_new_simple(&[10], Some(&[None])).unwrap();
        assert_eq!(space.max_dims(), vec![None]);
        let space = Dataspace::try_new_simple(&[2, 3], Some(&[Some(4), None])).unwrap();
        assert_eq!(space.max_dims(), vec![Some(4), None]);
    }

    #[test]
    pub fn test_hyperslab_rank_check() {
        let space = Dataspace::try_new_simple(&[10], None).unwrap();
        assert!(space.select_hyperslab(&[0, 0], &[1]).is_err());
        assert!(space.select_hyperslab(&[2], &[5]).is_ok());
    }
}

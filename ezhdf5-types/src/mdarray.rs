//! Dense row-major N-dimensional arrays with explicit dimension metadata.

use std::convert::TryFrom;
use std::error::Error as StdError;
use std::fmt;

use ndarray::{Array2, ArrayD, IxDyn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShapeError {
    /// Requested rank differs from the stored rank.
    RankMismatch { expected: usize, actual: usize },
    /// Flat data length does not match the product of the dimensions.
    SizeMismatch { expected: usize, actual: usize },
}

impl StdError for ShapeError {}

impl fmt::Display for ShapeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Self::RankMismatch { expected, actual } => {
                write!(f, "array is supposed to be of rank {expected}, but is of rank {actual}")
            }
            Self::SizeMismatch { expected, actual } => {
                write!(f, "flat array of length {actual} does not fit dimensions (size {expected})")
            }
        }
    }
}

/// A dense array of `T` with dimensions `d0, ..., d{n-1}`, stored
/// row-major: the flat index of `(i0, ..., i{n-1})` is
/// `i0·d1·…·d{n-1} + i1·d2·…·d{n-1} + … + i{n-1}`.
#[derive(Clone, Debug, PartialEq)]
pub struct MDArray<T> {
    data: Vec<T>,
    dims: Vec<usize>,
}

impl<T> MDArray<T> {
    /// Wraps a flat vector; fails if the length is not the product of the
    /// dimensions. A size of zero is permitted.
    pub fn new(data: Vec<T>, dims: impl Into<Vec<usize>>) -> Result<Self, ShapeError> {
        let dims = dims.into();
        let size: usize = dims.iter().product();
        if data.len() != size {
            return Err(ShapeError::SizeMismatch { expected: size, actual: data.len() });
        }
        Ok(Self { data, dims })
    }

    pub fn from_elem(elem: T, dims: impl Into<Vec<usize>>) -> Self
    where
        T: Clone,
    {
        let dims = dims.into();
        let size = dims.iter().product();
        Self { data: vec![elem; size], dims }
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    /// Computes the row-major flat index of a full coordinate tuple.
    pub fn flat_index(&self, index: &[usize]) -> Result<usize, ShapeError> {
        if index.len() != self.dims.len() {
            return Err(ShapeError::RankMismatch {
                expected: self.dims.len(),
                actual: index.len(),
            });
        }
        let mut flat = 0;
        for (&i, &d) in index.iter().zip(&self.dims) {
            debug_assert!(i < d);
            flat = flat * d + i;
        }
        Ok(flat)
    }

    pub fn get(&self, index: &[usize]) -> Option<&T> {
        self.flat_index(index).ok().and_then(|i| self.data.get(i))
    }

    pub fn set(&mut self, index: &[usize], value: T) -> Result<(), ShapeError> {
        let i = self.flat_index(index)?;
        self.data[i] = value;
        Ok(())
    }

    /// Reinterprets the array under new dimensions of the same size.
    pub fn reshape(self, dims: impl Into<Vec<usize>>) -> Result<Self, ShapeError> {
        Self::new(self.data, dims)
    }

    /// Converts a rank-2 array into nested rows; any other rank fails.
    pub fn to_matrix(&self) -> Result<Vec<Vec<T>>, ShapeError>
    where
        T: Clone,
    {
        if self.rank() != 2 {
            return Err(ShapeError::RankMismatch { expected: 2, actual: self.rank() });
        }
        let (ny, nx) = (self.dims[0], self.dims[1]);
        Ok((0..ny).map(|y| self.data[y * nx..(y + 1) * nx].to_vec()).collect())
    }

    pub fn from_matrix(rows: Vec<Vec<T>>) -> Result<Self, ShapeError> {
        let ny = rows.len();
        let nx = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(ny * nx);
        for row in rows {
            if row.len() != nx {
                return Err(ShapeError::SizeMismatch { expected: nx, actual: row.len() });
            }
            data.extend(row);
        }
        Ok(Self { data, dims: vec![ny, nx] })
    }

    pub fn map<U>(&self, f: impl FnMut(&T) -> U) -> MDArray<U> {
        MDArray { data: self.data.iter().map(f).collect(), dims: self.dims.clone() }
    }
}

impl<T> From<MDArray<T>> for ArrayD<T> {
    fn from(array: MDArray<T>) -> Self {
        let dims = IxDyn(&array.dims);
        Self::from_shape_vec(dims, array.data).expect("dims checked on construction")
    }
}

impl<T: Clone> From<ArrayD<T>> for MDArray<T> {
    fn from(array: ArrayD<T>) -> Self {
        let dims = array.shape().to_vec();
        let data = match array.as_slice() {
            Some(slice) => slice.to_vec(),
            None => array.iter().cloned().collect(),
        };
        Self { data, dims }
    }
}

impl<T> TryFrom<MDArray<T>> for Array2<T> {
    type Error = ShapeError;

    fn try_from(array: MDArray<T>) -> Result<Self, ShapeError> {
        if array.rank() != 2 {
            return Err(ShapeError::RankMismatch { expected: 2, actual: array.rank() });
        }
        let (ny, nx) = (array.dims[0], array.dims[1]);
        Ok(Self::from_shape_vec((ny, nx), array.data).expect("dims checked on construction"))
    }
}

impl<T: Clone> From<&Array2<T>> for MDArray<T> {
    fn from(array: &Array2<T>) -> Self {
        let dims = array.shape().to_vec();
        let data = match array.as_slice() {
            Some(slice) => slice.to_vec(),
            None => array.iter().cloned().collect(),
        };
        Self { data, dims }
    }
}

use ezhdf5_types::{TypeDescriptor, TypeVariant};

/// Basic kind of a stored object.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectKind {
    Group,
    Dataset,
    /// A committed named datatype.
    Datatype,
    Other,
}

/// Kind and target of a link.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LinkKind {
    Hard,
    Soft { target: String },
    External { file_name: String, object_path: String },
}

/// Storage layout of a dataset's raw data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageLayout {
    Compact,
    Contiguous,
    Chunked,
}

/// Shape, layout and type information of a dataset.
#[derive(Clone, Debug)]
pub struct DatasetInfo {
    pub dims: Vec<usize>,
    /// Per-axis maximum sizes; `None` means unlimited.
    pub max_dims: Vec<Option<usize>>,
    pub layout: StorageLayout,
    /// Chunk shape, when the layout is chunked.
    pub chunk: Option<Vec<usize>>,
    pub type_desc: TypeDescriptor,
    pub variant: TypeVariant,
}

impl DatasetInfo {
    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn size(&self) -> usize {
        self.dims.iter().product()
    }

    pub fn is_scalar(&self) -> bool {
        self.dims.is_empty()
    }

    /// The natural block shape: the chunk shape for chunked datasets,
    /// the full shape otherwise.
    pub fn natural_block_dims(&self) -> Vec<usize> {
        self.chunk.clone().unwrap_or_else(|| self.dims.clone())
    }
}

pub mod attribute;
pub mod blocks;
pub mod compound;
pub mod dataspace;
pub mod datatype;
pub mod enums;
pub mod file;
pub mod info;
pub mod links;
pub mod reader;
pub mod registry;
pub mod writer;

pub use self::{
    blocks::{DataBlock, MDDataBlock, NaturalBlockIndex, NaturalBlocks},
    compound::CompoundType,
    dataspace::Dataspace,
    datatype::Datatype,
    enums::EnumType,
    file::{File, FileBuilder, OpenMode},
    info::{DatasetInfo, LinkKind, ObjectKind, StorageLayout},
    reader::{ArrayBlocks, MDArrayBlocks, Reader},
    writer::{Writer, WriterBuilder},
};

//! Scalar and N-dimensional containers of enumeration values.

use std::error::Error as StdError;
use std::fmt;

use crate::h5type::{EnumDef, IntSize};
use crate::mdarray::MDArray;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EnumError {
    OrdinalOutOfRange { ordinal: i64, cardinality: usize },
    UnknownValue { value: String, type_name: String },
    NarrowingOverflow { ordinal: i64, target: IntSize },
}

impl StdError for EnumError {}

impl fmt::Display for EnumError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Self::OrdinalOutOfRange { ordinal, cardinality } => {
                write!(f, "ordinal {ordinal} out of range for enum with {cardinality} values")
            }
            Self::UnknownValue { ref value, ref type_name } => {
                write!(f, "value '{value}' is not allowed for type '{type_name}'")
            }
            Self::NarrowingOverflow { ordinal, target } => {
                write!(f, "ordinal {ordinal} does not fit into {}-byte storage", target as usize)
            }
        }
    }
}

/// The backing ordinal storage of an enum array: the smallest signed
/// integer class that holds `cardinality - 1`.
#[derive(Clone, Debug, PartialEq)]
pub enum OrdinalStorage {
    I8(MDArray<i8>),
    I16(MDArray<i16>),
    I32(MDArray<i32>),
}

impl OrdinalStorage {
    pub fn size(&self) -> usize {
        match self {
            Self::I8(a) => a.size(),
            Self::I16(a) => a.size(),
            Self::I32(a) => a.size(),
        }
    }

    pub fn dims(&self) -> &[usize] {
        match self {
            Self::I8(a) => a.dims(),
            Self::I16(a) => a.dims(),
            Self::I32(a) => a.dims(),
        }
    }

    pub fn storage_size(&self) -> IntSize {
        match self {
            Self::I8(_) => IntSize::U1,
            Self::I16(_) => IntSize::U2,
            Self::I32(_) => IntSize::U4,
        }
    }

    fn ordinal(&self, flat: usize) -> i64 {
        match self {
            Self::I8(a) => a.as_slice()[flat] as i64,
            Self::I16(a) => a.as_slice()[flat] as i64,
            Self::I32(a) => a.as_slice()[flat] as i64,
        }
    }
}

/// A scalar enumeration value: an ordinal paired with its definition.
#[derive(Clone, Debug, PartialEq)]
pub struct EnumValue {
    def: EnumDef,
    ordinal: usize,
}

impl EnumValue {
    pub fn new(def: EnumDef, ordinal: usize) -> Result<Self, EnumError> {
        if ordinal >= def.cardinality() {
            return Err(EnumError::OrdinalOutOfRange {
                ordinal: ordinal as i64,
                cardinality: def.cardinality(),
            });
        }
        Ok(Self { def, ordinal })
    }

    pub fn from_name(def: EnumDef, name: &str) -> Result<Self, EnumError> {
        match def.index_of(name) {
            Some(ordinal) => Ok(Self { def, ordinal }),
            None => Err(EnumError::UnknownValue {
                value: name.into(),
                type_name: def.name.clone(),
            }),
        }
    }

    pub fn def(&self) -> &EnumDef {
        &self.def
    }

    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    pub fn name(&self) -> &str {
        &self.def.values[self.ordinal]
    }

    /// The value as native-order bytes of the storage width.
    pub fn to_storage_bytes(&self) -> Vec<u8> {
        use crate::bytes::{i16_to_bytes, i32_to_bytes, ByteOrder};
        match self.def.storage_size() {
            IntSize::U1 => vec![self.ordinal as u8],
            IntSize::U2 => i16_to_bytes(&[self.ordinal as i16], ByteOrder::native()),
            _ => i32_to_bytes(&[self.ordinal as i32], ByteOrder::native()),
        }
    }
}

/// An N-dimensional array of enumeration values, stored as ordinals of
/// the smallest fitting signed width.
#[derive(Clone, Debug, PartialEq)]
pub struct EnumArray {
    def: EnumDef,
    storage: OrdinalStorage,
}

fn check_ordinals<T: Copy + Into<i64>>(
    array: &MDArray<T>, cardinality: usize,
) -> Result<(), EnumError> {
    for &v in array.as_slice() {
        let ordinal: i64 = v.into();
        if ordinal < 0 || ordinal >= cardinality as i64 {
            return Err(EnumError::OrdinalOutOfRange { ordinal, cardinality });
        }
    }
    Ok(())
}

impl EnumArray {
    /// Wraps an existing ordinal array, validating every ordinal against
    /// the definition.
    pub fn from_storage(def: EnumDef, storage: OrdinalStorage) -> Result<Self, EnumError> {
        match &storage {
            OrdinalStorage::I8(a) => check_ordinals(a, def.cardinality())?,
            OrdinalStorage::I16(a) => check_ordinals(a, def.cardinality())?,
            OrdinalStorage::I32(a) => check_ordinals(a, def.cardinality())?,
        }
        Ok(Self { def, storage })
    }

    pub fn from_ordinals_i8(def: EnumDef, array: MDArray<i8>) -> Result<Self, EnumError> {
        Self::from_storage(def, OrdinalStorage::I8(array))
    }

    pub fn from_ordinals_i16(def: EnumDef, array: MDArray<i16>) -> Result<Self, EnumError> {
        Self::from_storage(def, OrdinalStorage::I16(array))
    }

    pub fn from_ordinals_i32(def: EnumDef, array: MDArray<i32>) -> Result<Self, EnumError> {
        Self::from_storage(def, OrdinalStorage::I32(array))
    }

    /// Builds an array from value names; the storage width is chosen
    /// from the definition's cardinality.
    pub fn from_names(def: EnumDef, names: &MDArray<String>) -> Result<Self, EnumError> {
        let lookup = |name: &String| {
            def.index_of(name).ok_or_else(|| EnumError::UnknownValue {
                value: name.clone(),
                type_name: def.name.clone(),
            })
        };
        let dims = names.dims().to_vec();
        let storage = match def.storage_size() {
            IntSize::U1 => {
                let mut data = Vec::with_capacity(names.size());
                for name in names.as_slice() {
                    data.push(lookup(name)? as i8);
                }
                OrdinalStorage::I8(MDArray::new(data, dims).expect("same shape"))
            }
            IntSize::U2 => {
                let mut data = Vec::with_capacity(names.size());
                for name in names.as_slice() {
                    data.push(lookup(name)? as i16);
                }
                OrdinalStorage::I16(MDArray::new(data, dims).expect("same shape"))
            }
            _ => {
                let mut data = Vec::with_capacity(names.size());
                for name in names.as_slice() {
                    data.push(lookup(name)? as i32);
                }
                OrdinalStorage::I32(MDArray::new(data, dims).expect("same shape"))
            }
        };
        Ok(Self { def, storage })
    }

    pub fn def(&self) -> &EnumDef {
        &self.def
    }

    pub fn storage(&self) -> &OrdinalStorage {
        &self.storage
    }

    pub fn dims(&self) -> &[usize] {
        self.storage.dims()
    }

    pub fn rank(&self) -> usize {
        self.storage.dims().len()
    }

    pub fn size(&self) -> usize {
        self.storage.size()
    }

    pub fn ordinal(&self, flat: usize) -> usize {
        self.storage.ordinal(flat) as usize
    }

    pub fn name(&self, flat: usize) -> &str {
        &self.def.values[self.ordinal(flat)]
    }

    /// Converts back to an array of value names of the same shape.
    pub fn to_name_array(&self) -> MDArray<String> {
        let dims = self.dims().to_vec();
        let names =
            (0..self.size()).map(|i| self.name(i).to_owned()).collect::<Vec<_>>();
        MDArray::new(names, dims).expect("same shape")
    }

    /// Losslessly widens the ordinal storage to `target`; widening never
    /// fails, narrowing fails if any ordinal exceeds the target range.
    pub fn convert_storage(&self, target: IntSize) -> Result<Self, EnumError> {
        let dims = self.dims().to_vec();
        let max = match target {
            IntSize::U1 => i8::MAX as i64,
            IntSize::U2 => i16::MAX as i64,
            _ => i32::MAX as i64,
        };
        let mut ordinals = Vec::with_capacity(self.size());
        for i in 0..self.size() {
            let ordinal = self.storage.ordinal(i);
            if ordinal > max {
                return Err(EnumError::NarrowingOverflow { ordinal, target });
            }
            ordinals.push(ordinal);
        }
        let storage = match target {
            IntSize::U1 => OrdinalStorage::I8(
                MDArray::new(ordinals.iter().map(|&v| v as i8).collect(), dims)
                    .expect("same shape"),
            ),
            IntSize::U2 => OrdinalStorage::I16(
                MDArray::new(ordinals.iter().map(|&v| v as i16).collect(), dims)
                    .expect("same shape"),
            ),
            _ => OrdinalStorage::I32(
                MDArray::new(ordinals.iter().map(|&v| v as i32).collect(), dims)
                    .expect("same shape"),
            ),
        };
        Ok(Self { def: self.def.clone(), storage })
    }
}

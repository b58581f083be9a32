//! Committed enumeration types.

use crate::internal_prelude::*;

/// An enumeration type committed to a file, pairing the value
/// definition with its storage and native datatype objects.
#[derive(Clone, Debug)]
pub struct EnumType {
    def: EnumDef,
    storage: Datatype,
    native: Datatype,
}

impl EnumType {
    pub(crate) fn new(def: EnumDef, storage: Datatype) -> Result<Self> {
        let native = storage.to_native()?;
        Ok(Self { def, storage, native })
    }

    pub fn name(&self) -> &str {
        &self.def.name
    }

    pub fn values(&self) -> &[String] {
        &self.def.values
    }

    pub fn def(&self) -> &EnumDef {
        &self.def
    }

    /// A scalar value of this type by ordinal.
    pub fn value(&self, ordinal: usize) -> Result<EnumValue> {
        EnumValue::new(self.def.clone(), ordinal).map_err(Into::into)
    }

    /// A scalar value of this type by name.
    pub fn value_of(&self, name: &str) -> Result<EnumValue> {
        EnumValue::from_name(self.def.clone(), name).map_err(Into::into)
    }

    /// An array of this type from value names.
    pub fn array_from_names(&self, names: &MDArray<String>) -> Result<EnumArray> {
        EnumArray::from_names(self.def.clone(), names).map_err(Into::into)
    }

    pub(crate) fn storage_id(&self) -> hid_t {
        self.storage.id()
    }

    pub(crate) fn native_id(&self) -> hid_t {
        self.native.id()
    }
}

//! The per-file registry of committed named datatypes.

use std::cell::RefCell;
use std::collections::HashMap;

use hdf5_sys::h5t::{H5Tcommit2, H5Topen2};

use crate::hl::links;
use crate::internal_prelude::*;

/// Reserved group holding all committed datatypes of this library.
pub(crate) const DATATYPE_GROUP: &str = "/__DATATYPES__";
pub(crate) const ENUM_PREFIX: &str = "Enum_";
pub(crate) const OPAQUE_PREFIX: &str = "Opaque_";
pub(crate) const COMPOUND_PREFIX: &str = "Compound_";
pub(crate) const BOOLEAN_DATA_TYPE: &str = "/__DATATYPES__/Boolean";
pub(crate) const TYPE_VARIANT_DATA_TYPE: &str = "/__DATATYPES__/TypeVariant";
pub(crate) const VARIABLE_LENGTH_STRING_DATA_TYPE: &str = "/__DATATYPES__/String_VariableLength";

/// Name of the attribute holding a type-variant ordinal.
pub(crate) const TYPE_VARIANT_ATTRIBUTE: &str = "__TYPE_VARIANT__";

/// Safety cap for finding an unused type-variant path.
const MAX_TYPE_VARIANTS: usize = 1024;

pub(crate) fn data_type_path(prefix: &str, name: &str) -> String {
    format!("{DATATYPE_GROUP}/{prefix}{name}")
}

/// Name of the attribute holding the type variant of one compound
/// member.
pub(crate) fn member_variant_attribute(member_name: &str) -> String {
    format!("{TYPE_VARIANT_ATTRIBUTE}{member_name}__")
}

/// Caches committed datatypes by canonical path; entries are opened
/// lazily on first use and live as long as the file handle.
#[derive(Default)]
pub(crate) struct TypeRegistry {
    cache: RefCell<HashMap<String, Datatype>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a committed datatype at a canonical path, consulting the
    /// cache first.
    pub fn open(&self, file: &File, path: &str) -> Result<Option<Datatype>> {
        if let Some(dtype) = self.cache.borrow().get(path) {
            return Ok(Some(dtype.clone()));
        }
        if !links::exists(file.id(), path)? {
            return Ok(None);
        }
        let cpath = to_cstring(path)?;
        let dtype = Datatype::from_id(h5call!(H5Topen2(file.id(), cpath.as_ptr(), H5P_DEFAULT))?)?;
        self.cache.borrow_mut().insert(path.to_owned(), dtype.clone());
        Ok(Some(dtype))
    }

    /// Commits a datatype under a canonical path and caches it.
    pub fn commit(&self, file: &File, path: &str, dtype: &Datatype) -> Result<()> {
        let cpath = to_cstring(path)?;
        h5lock_s!({
            let arena = Arena::new();
            let lcpl = links::intermediate_lcpl(&arena)?;
            h5check(unsafe {
                H5Tcommit2(
                    file.id(),
                    cpath.as_ptr(),
                    dtype.id(),
                    lcpl,
                    H5P_DEFAULT,
                    H5P_DEFAULT,
                )
            })?;
            Ok::<_, Error>(())
        })?;
        self.cache.borrow_mut().insert(path.to_owned(), dtype.clone());
        Ok(())
    }

    /// Opens an existing committed datatype or, when `create` is set,
    /// builds and commits it from the descriptor.
    pub fn open_or_commit(
        &self, file: &File, path: &str, desc: &TypeDescriptor, create: bool,
    ) -> Result<Datatype> {
        if let Some(dtype) = self.open(file, path)? {
            return Ok(dtype);
        }
        ensure!(create, Error::NoSuchObject(path.to_owned()));
        let dtype = Datatype::from_descriptor(desc)?;
        self.commit(file, path, &dtype)?;
        Ok(dtype)
    }

    /// The committed boolean type: an enumeration `{FALSE, TRUE}` over
    /// a one-byte base.
    pub fn boolean_type(&self, file: &File, create: bool) -> Result<Datatype> {
        let desc = TypeDescriptor::Enumeration(EnumDef::new("Boolean", &["FALSE", "TRUE"]));
        self.open_or_commit(file, BOOLEAN_DATA_TYPE, &desc, create)
    }

    /// The committed variable-length string type.
    pub fn variable_string_type(&self, file: &File, create: bool) -> Result<Datatype> {
        let desc = TypeDescriptor::VariableString { encoding: CharacterEncoding::Utf8 };
        self.open_or_commit(file, VARIABLE_LENGTH_STRING_DATA_TYPE, &desc, create)
    }

    /// The committed opaque type for a tag.
    pub fn opaque_type(&self, file: &File, tag: &str, len: usize, create: bool) -> Result<Datatype> {
        let path = data_type_path(OPAQUE_PREFIX, tag);
        let desc = TypeDescriptor::Opaque { tag: tag.to_owned(), len };
        self.open_or_commit(file, &path, &desc, create)
    }

    /// The committed enumeration type `name`, creating it if requested.
    /// With `check` set and an existing type, the stored value list is
    /// compared member by member.
    pub fn enum_type(
        &self, file: &File, name: &str, values: &[&str], check: bool, create: bool,
    ) -> Result<Datatype> {
        let path = data_type_path(ENUM_PREFIX, name);
        if let Some(dtype) = self.open(file, &path)? {
            if check {
                check_enum_values(&dtype, name, values)?;
            }
            return Ok(dtype);
        }
        ensure!(create, Error::NoSuchObject(path));
        let desc = TypeDescriptor::Enumeration(EnumDef::new(name, values));
        let dtype = Datatype::from_descriptor(&desc)?;
        self.commit(file, &path, &dtype)?;
        Ok(dtype)
    }

    /// The committed type-variant enumeration. When the stored type
    /// has fewer members than the library currently knows, a new type
    /// is committed under `TypeVariant.<n>` and the `TypeVariant` soft
    /// link is repointed at it.
    pub fn type_variant_type(&self, file: &File, create: bool) -> Result<Datatype> {
        let names = TypeVariant::names();
        if let Some(dtype) = self.open(file, TYPE_VARIANT_DATA_TYPE)? {
            let members = match dtype.to_descriptor()? {
                TypeDescriptor::Enumeration(def) => def.cardinality(),
                _ => 0,
            };
            if members >= names.len() || !create {
                return Ok(dtype);
            }
        } else if !create {
            fail!(Error::NoSuchObject(TYPE_VARIANT_DATA_TYPE.to_owned()));
        }
        let desc = TypeDescriptor::Enumeration(EnumDef {
            name: "TypeVariant".into(),
            values: names.iter().map(|&n| n.to_owned()).collect(),
        });
        let dtype = Datatype::from_descriptor(&desc)?;
        let path = self.first_unused_variant_path(file)?;
        self.commit(file, &path, &dtype)?;
        // repoint the well-known name at the freshly committed type
        let relative = path.trim_start_matches(&format!("{DATATYPE_GROUP}/")).to_owned();
        if links::exists(file.id(), TYPE_VARIANT_DATA_TYPE)? {
            links::delete(file.id(), TYPE_VARIANT_DATA_TYPE)?;
        }
        links::create_soft(file.id(), &relative, TYPE_VARIANT_DATA_TYPE)?;
        self.cache.borrow_mut().insert(TYPE_VARIANT_DATA_TYPE.to_owned(), dtype.clone());
        Ok(dtype)
    }

    fn first_unused_variant_path(&self, file: &File) -> Result<String> {
        for number in 0..MAX_TYPE_VARIANTS {
            let path = format!("{TYPE_VARIANT_DATA_TYPE}.{number}");
            if !links::exists(file.id(), &path)? {
                return Ok(path);
            }
        }
        Err(Error::LayoutUnsupported(format!(
            "more than {MAX_TYPE_VARIANTS} committed type-variant datatypes"
        )))
    }
}

fn check_enum_values(dtype: &Datatype, name: &str, values: &[&str]) -> Result<()> {
    let stored = match dtype.to_descriptor()? {
        TypeDescriptor::Enumeration(def) => def.values,
        other => {
            fail!(Error::EnumIncompatible(format!(
                "'{name}' is committed as a non-enum type ({other:?})"
            )));
        }
    };
    if stored.len() != values.len() {
        fail!(Error::EnumIncompatible(format!(
            "enum '{name}' has {} stored values, {} requested",
            stored.len(),
            values.len()
        )));
    }
    for (i, (stored_value, &requested)) in stored.iter().zip(values).enumerate() {
        if stored_value != requested {
            fail!(Error::EnumIncompatible(format!(
                "enum '{name}' value {i} is '{stored_value}', requested '{requested}'"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::internal_prelude::*;

    #[test]
    pub fn test_data_type_path() {
        assert_eq!(data_type_path(ENUM_PREFIX, "Color"), "/__DATATYPES__/Enum_Color");
        assert_eq!(data_type_path(OPAQUE_PREFIX, "blob"), "/__DATATYPES__/Opaque_blob");
    }

    #[test]
    pub fn test_member_variant_attribute() {
        assert_eq!(member_variant_attribute("ts"), "__TYPE_VARIANT__ts__");
    }

    #[test]
    pub fn test_boolean_roundtrip() {
        with_tmp_file(|file| {
            let registry = TypeRegistry::new();
            let dtype = registry.boolean_type(&file, true).unwrap();
            assert_eq!(dtype.size(), 1);
            // idempotent: the second call opens the committed type
            let again = registry.boolean_type(&file, true).unwrap();
            assert_eq!(dtype, again);
        });
    }

    #[test]
    pub fn test_enum_compatibility() {
        with_tmp_file(|file| {
            let registry = TypeRegistry::new();
            registry
                .enum_type(&file, "Color", &["RED", "GREEN", "BLUE"], false, true)
                .unwrap();
            assert!(registry
                .enum_type(&file, "Color", &["RED", "GREEN", "BLUE"], true, true)
                .is_ok());
            let err = registry
                .enum_type(&file, "Color", &["RED", "BLUE", "GREEN"], true, true)
                .unwrap_err();
            assert!(matches!(err, Error::EnumIncompatible(_)));
            let err = registry
                .enum_type(&file, "Color", &["RED", "GREEN"], true, true)
                .unwrap_err();
            assert!(matches!(err, Error::EnumIncompatible(_)));
        });
    }

    #[test]
    pub fn test_type_variant_commit() {
        with_tmp_file(|file| {
            let registry = TypeRegistry::new();
            let dtype = registry.type_variant_type(&file, true).unwrap();
            match dtype.to_descriptor().unwrap() {
                TypeDescriptor::Enumeration(def) => {
                    assert_eq!(def.cardinality(), TypeVariant::names().len());
                }
                other => panic!("expected enum, got {other:?}"),
            }
            // the well-known soft link resolves to the committed type
            let reopened = registry.open(&file, TYPE_VARIANT_DATA_TYPE).unwrap();
            assert!(reopened.is_some());
        });
    }

    #[test]
    pub fn test_missing_type_read_only() {
        with_tmp_file(|file| {
            let registry = TypeRegistry::new();
            let err = registry.enum_type(&file, "Nope", &["A"], false, false).unwrap_err();
            assert!(matches!(err, Error::NoSuchObject(_)));
        });
    }
}

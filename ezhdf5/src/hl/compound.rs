//! Committed compound types and their record byteifyers.

use ezhdf5_types::{MemberFactoryRegistry, MemberKind, MemberMapping, RecordAccess};

use crate::internal_prelude::*;

/// A compound type bound to a file: the packed record layout produced
/// by the member byteifyer plus the storage and native datatypes
/// compiled from it.
#[derive(Clone, Debug)]
pub struct CompoundType {
    name: String,
    layout: CompoundLayout,
    storage: Datatype,
    native: Datatype,
}

impl CompoundType {
    pub(crate) fn from_layout(name: &str, layout: CompoundLayout) -> Result<Self> {
        let desc = TypeDescriptor::Compound(layout.descriptor());
        let storage = Datatype::from_descriptor(&desc)?;
        let native = Datatype::from_descriptor_native(&desc)?;
        Ok(Self { name: name.to_owned(), layout, storage, native })
    }

    pub(crate) fn with_storage(name: &str, layout: CompoundLayout, storage: Datatype) -> Result<Self> {
        let desc = TypeDescriptor::Compound(layout.descriptor());
        let native = Datatype::from_descriptor_native(&desc)?;
        Ok(Self { name: name.to_owned(), layout, storage, native })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Size in bytes of one packed record.
    pub fn record_size(&self) -> usize {
        self.layout.record_size()
    }

    pub fn member_names(&self) -> Vec<&str> {
        self.layout.encoders().iter().map(|e| e.member_name()).collect()
    }

    pub fn layout(&self) -> &CompoundLayout {
        &self.layout
    }

    pub(crate) fn storage_id(&self) -> hid_t {
        self.storage.id()
    }

    pub(crate) fn native_id(&self) -> hid_t {
        self.native.id()
    }

    /// Packs a sequence of records into one contiguous byte image.
    pub(crate) fn byteify(&self, records: &[&dyn RecordAccess]) -> Result<Vec<u8>> {
        self.layout.byteify_records(records).map_err(Into::into)
    }
}

/// Derives the member kind of an on-disk member type, letting the
/// factory registry override the default class mapping (e.g. an i64
/// with a timestamp variant becomes a date member).
pub(crate) fn member_kind_from_descriptor(
    registry: &MemberFactoryRegistry, ty: &TypeDescriptor, variant: TypeVariant,
) -> Result<MemberKind> {
    let overridden =
        registry.override_host_kind(ty.storage_class(), member_rank(ty), ty.size(), variant);
    if let Some(HostKind::Date) = overridden {
        return Ok(MemberKind::Timestamp);
    }
    match ty {
        TypeDescriptor::Integer { size: IntSize::U1, .. } => Ok(MemberKind::Int8),
        TypeDescriptor::Integer { size: IntSize::U2, .. } => Ok(MemberKind::Int16),
        TypeDescriptor::Integer { size: IntSize::U4, .. } => Ok(MemberKind::Int32),
        TypeDescriptor::Integer { size: IntSize::U8, .. } => Ok(MemberKind::Int64),
        TypeDescriptor::Float { size: FloatSize::U4, .. } => Ok(MemberKind::Float32),
        TypeDescriptor::Float { size: FloatSize::U8, .. } => Ok(MemberKind::Float64),
        TypeDescriptor::FixedString { len, .. } => Ok(MemberKind::String { len: *len }),
        TypeDescriptor::Enumeration(def) => {
            if def.values.len() == 2 && def.values[0] == "FALSE" && def.values[1] == "TRUE" {
                Ok(MemberKind::Bool)
            } else {
                Ok(MemberKind::Enum { def: def.clone() })
            }
        }
        TypeDescriptor::BitField { words } => Ok(MemberKind::BitField { words: *words }),
        TypeDescriptor::Opaque { tag, len } => {
            Ok(MemberKind::Opaque { tag: tag.clone(), len: *len })
        }
        other => Err(Error::TypeMismatch(format!(
            "compound member type {other:?} is not supported"
        ))),
    }
}

fn member_rank(ty: &TypeDescriptor) -> usize {
    match ty {
        TypeDescriptor::Array { dims, .. } => dims.len(),
        _ => 0,
    }
}

/// Builds member mappings for every member of an on-disk compound
/// descriptor, honoring per-member type variants.
pub(crate) fn mappings_from_compound(
    registry: &MemberFactoryRegistry, desc: &CompoundDesc,
    member_variant: impl Fn(&str) -> TypeVariant,
) -> Result<Vec<MemberMapping>> {
    desc.members
        .iter()
        .map(|member| {
            let kind =
                member_kind_from_descriptor(registry, &member.ty, member_variant(&member.name))?;
            Ok(MemberMapping::new(member.name.clone(), kind))
        })
        .collect()
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use ezhdf5_types::CompoundMemberDesc;

    #[test]
    pub fn test_member_kind_mapping() {
        let registry = MemberFactoryRegistry::new();
        let kind =
            member_kind_from_descriptor(&registry, &i32::type_descriptor(), TypeVariant::None)
                .unwrap();
        assert_eq!(kind, MemberKind::Int32);

        // an i64 tagged as a timestamp maps to a date member
        let kind = member_kind_from_descriptor(
            &registry,
            &i64::type_descriptor(),
            TypeVariant::TimestampMillisecondsSinceEpoch,
        )
        .unwrap();
        assert_eq!(kind, MemberKind::Timestamp);

        let kind = member_kind_from_descriptor(
            &registry,
            &TypeDescriptor::FixedString { len: 16, encoding: CharacterEncoding::Utf8 },
            TypeVariant::None,
        )
        .unwrap();
        assert_eq!(kind, MemberKind::String { len: 16 });
    }

    #[test]
    pub fn test_compound_type_layout() {
        let registry = MemberFactoryRegistry::new();
        let members = vec![
            MemberMapping::new("id", MemberKind::Int32),
            MemberMapping::new("name", MemberKind::String { len: 16 }),
            MemberMapping::new("ts", MemberKind::Timestamp),
        ];
        let layout = registry.create_encoders(None, &members).unwrap();
        let ctype = CompoundType::from_layout("Sample", layout).unwrap();
        assert_eq!(ctype.record_size(), 28);
        assert_eq!(ctype.member_names(), vec!["id", "name", "ts"]);
        assert_eq!(ctype.storage.size(), 28);
        assert_eq!(ctype.native.size(), 28);
    }

    #[test]
    pub fn test_mappings_from_compound() {
        let registry = MemberFactoryRegistry::new();
        let desc = CompoundDesc {
            members: vec![
                CompoundMemberDesc { name: "a".into(), offset: 0, ty: f64::type_descriptor() },
                CompoundMemberDesc { name: "ts".into(), offset: 8, ty: i64::type_descriptor() },
            ],
            size: 16,
        };
        let mappings = mappings_from_compound(&registry, &desc, |name| {
            if name == "ts" {
                TypeVariant::TimestampMillisecondsSinceEpoch
            } else {
                TypeVariant::None
            }
        })
        .unwrap();
        assert_eq!(mappings[0].kind, MemberKind::Float64);
        assert_eq!(mappings[1].kind, MemberKind::Timestamp);
    }
}

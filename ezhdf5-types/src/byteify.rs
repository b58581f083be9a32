//! The compound record byteifyer: per-member encoders translating
//! between record views and the packed on-disk byte image.

use std::error::Error as StdError;
use std::fmt;

use crate::bytes::{self, ByteOrder};
use crate::h5type::{
    CompoundDesc, CompoundMemberDesc, EnumDef, FloatSize, HostKind, IntSize, StorageClass,
    TypeDescriptor, TypeVariant,
};
use crate::record::{AccessMode, CompoundRecord, FieldValue, MemberSlot, RecordAccess};
use crate::string::{from_bytes_0term, to_padded_bytes, CharacterEncoding};
use crate::BitField;

#[derive(Clone, Debug, PartialEq)]
pub enum MemberError {
    /// The record has no value for a non-dummy member.
    MissingMember { member: String },
    /// The record's value cannot be stored in the member's slot.
    KindMismatch { member: String, expected: HostKind },
    /// No registered factory can handle the member's host kind.
    Unhandled { member: String, kind: HostKind },
    /// A decoded value is invalid for the member's type.
    InvalidValue { member: String, detail: String },
}

impl StdError for MemberError {}

impl fmt::Display for MemberError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::MissingMember { member } => {
                write!(f, "record has no value for member '{member}'")
            }
            Self::KindMismatch { member, expected } => {
                write!(f, "value for member '{member}' does not match {expected:?}")
            }
            Self::Unhandled { member, kind } => {
                write!(f, "member '{member}' of kind {kind:?} cannot be handled by any factory")
            }
            Self::InvalidValue { member, detail } => {
                write!(f, "invalid value for member '{member}': {detail}")
            }
        }
    }
}

/// The element kind of one compound member, as requested by the caller.
#[derive(Clone, Debug, PartialEq)]
pub enum MemberKind {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    /// Fixed-length string; `len` bytes including the NUL terminator.
    String { len: usize },
    Enum { def: EnumDef },
    BitField { words: usize },
    Opaque { tag: String, len: usize },
    /// i64 milliseconds since the Unix epoch, tagged with a timestamp
    /// type variant.
    Timestamp,
}

impl MemberKind {
    pub fn host_kind(&self) -> HostKind {
        match self {
            Self::Bool => HostKind::Bool,
            Self::Int8 => HostKind::I8,
            Self::Int16 => HostKind::I16,
            Self::Int32 => HostKind::I32,
            Self::Int64 => HostKind::I64,
            Self::Float32 => HostKind::F32,
            Self::Float64 => HostKind::F64,
            Self::String { .. } => HostKind::String,
            Self::Enum { .. } => HostKind::Enum,
            Self::BitField { .. } => HostKind::BitField,
            Self::Opaque { .. } => HostKind::Opaque,
            Self::Timestamp => HostKind::Date,
        }
    }

    pub fn byte_size(&self) -> usize {
        match self {
            Self::Bool | Self::Int8 => 1,
            Self::Int16 => 2,
            Self::Int32 | Self::Float32 => 4,
            Self::Int64 | Self::Float64 | Self::Timestamp => 8,
            Self::String { len } => *len,
            Self::Enum { def } => def.storage_size() as usize,
            Self::BitField { words } => words * 8,
            Self::Opaque { len, .. } => *len,
        }
    }

    /// The little-endian storage descriptor of the member.
    pub fn type_descriptor(&self) -> TypeDescriptor {
        let int = |size| TypeDescriptor::Integer {
            size,
            signed: true,
            order: ByteOrder::LittleEndian,
        };
        match self {
            Self::Bool => TypeDescriptor::Enumeration(EnumDef::new("Boolean", &["FALSE", "TRUE"])),
            Self::Int8 => int(IntSize::U1),
            Self::Int16 => int(IntSize::U2),
            Self::Int32 => int(IntSize::U4),
            Self::Int64 | Self::Timestamp => int(IntSize::U8),
            Self::Float32 => {
                TypeDescriptor::Float { size: FloatSize::U4, order: ByteOrder::LittleEndian }
            }
            Self::Float64 => {
                TypeDescriptor::Float { size: FloatSize::U8, order: ByteOrder::LittleEndian }
            }
            Self::String { len } => {
                TypeDescriptor::FixedString { len: *len, encoding: CharacterEncoding::Utf8 }
            }
            Self::Enum { def } => TypeDescriptor::Enumeration(def.clone()),
            Self::BitField { words } => TypeDescriptor::BitField { words: *words },
            Self::Opaque { tag, len } => TypeDescriptor::Opaque { tag: tag.clone(), len: *len },
        }
    }

    pub fn type_variant(&self) -> TypeVariant {
        match self {
            Self::Timestamp => TypeVariant::TimestampMillisecondsSinceEpoch,
            _ => TypeVariant::None,
        }
    }
}

/// A requested mapping of one record member onto an on-disk compound
/// member of the same name.
#[derive(Clone, Debug, PartialEq)]
pub struct MemberMapping {
    pub name: String,
    pub kind: MemberKind,
}

impl MemberMapping {
    pub fn new(name: impl Into<String>, kind: MemberKind) -> Self {
        Self { name: name.into(), kind }
    }
}

/// Encodes one member of a compound record to and from its byte slice
/// `[offset, offset + size)` within the packed record image.
///
/// A dummy encoder stands in for a field the bound record type does not
/// have: it writes zeroes and ignores reads, but still reports the true
/// member type so the on-disk layout is preserved.
#[derive(Clone, Debug)]
pub struct MemberEncoder {
    slot: MemberSlot,
    kind: MemberKind,
    offset: usize,
    size: usize,
    dummy: bool,
}

fn ordinal_from_value(value: &FieldValue) -> Option<i64> {
    match *value {
        FieldValue::Byte(v) => Some(v as i64),
        FieldValue::Short(v) => Some(v as i64),
        FieldValue::Int(v) => Some(v as i64),
        FieldValue::Long(v) => Some(v),
        _ => None,
    }
}

impl MemberEncoder {
    fn new(slot: MemberSlot, kind: MemberKind, offset: usize, dummy: bool) -> Self {
        let size = kind.byte_size();
        Self { slot, kind, offset, size, dummy }
    }

    pub fn member_name(&self) -> &str {
        &self.slot.name
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn size_in_bytes(&self) -> usize {
        self.size
    }

    pub fn kind(&self) -> &MemberKind {
        &self.kind
    }

    pub fn is_dummy(&self) -> bool {
        self.dummy
    }

    pub fn type_descriptor(&self) -> TypeDescriptor {
        self.kind.type_descriptor()
    }

    pub fn type_variant(&self) -> TypeVariant {
        self.kind.type_variant()
    }

    fn mismatch(&self) -> MemberError {
        MemberError::KindMismatch {
            member: self.slot.name.clone(),
            expected: self.kind.host_kind(),
        }
    }

    /// Writes the member's value into its slice of the record image.
    /// The byte image is in native order (it is handed to the binding
    /// under the native compound type).
    pub fn byteify(&self, record: &dyn RecordAccess, out: &mut [u8]) -> Result<(), MemberError> {
        let cell = &mut out[self.offset..self.offset + self.size];
        if self.dummy {
            cell.fill(0);
            return Ok(());
        }
        let value = record.get(&self.slot).ok_or_else(|| MemberError::MissingMember {
            member: self.slot.name.clone(),
        })?;
        let order = ByteOrder::native();
        match (&self.kind, &value) {
            (MemberKind::Bool, FieldValue::Bool(v)) => cell[0] = *v as u8,
            (MemberKind::Int8, FieldValue::Byte(v)) => cell[0] = *v as u8,
            (MemberKind::Int16, FieldValue::Short(v)) => {
                bytes::copy_i16_to_bytes(&[*v], cell, 0, order);
            }
            (MemberKind::Int32, FieldValue::Int(v)) => {
                bytes::copy_i32_to_bytes(&[*v], cell, 0, order);
            }
            (MemberKind::Int64, FieldValue::Long(v))
            | (MemberKind::Timestamp, FieldValue::Timestamp(v))
            | (MemberKind::Timestamp, FieldValue::Long(v)) => {
                bytes::copy_i64_to_bytes(&[*v], cell, 0, order);
            }
            (MemberKind::Float32, FieldValue::Float(v)) => {
                bytes::copy_f32_to_bytes(&[*v], cell, 0, order);
            }
            (MemberKind::Float64, FieldValue::Double(v)) => {
                bytes::copy_f64_to_bytes(&[*v], cell, 0, order);
            }
            (MemberKind::String { len }, FieldValue::Str(s)) => {
                cell.copy_from_slice(&to_padded_bytes(s, *len, CharacterEncoding::Utf8));
            }
            (MemberKind::Enum { def }, value) => {
                let ordinal = match value {
                    FieldValue::Enum(name) => {
                        def.index_of(name).ok_or_else(|| MemberError::InvalidValue {
                            member: self.slot.name.clone(),
                            detail: format!("value '{name}' is not allowed for '{}'", def.name),
                        })? as i64
                    }
                    other => ordinal_from_value(other).ok_or_else(|| self.mismatch())?,
                };
                if ordinal < 0 || ordinal >= def.cardinality() as i64 {
                    return Err(MemberError::InvalidValue {
                        member: self.slot.name.clone(),
                        detail: format!("ordinal {ordinal} out of range"),
                    });
                }
                match def.storage_size() {
                    IntSize::U1 => cell[0] = ordinal as u8,
                    IntSize::U2 => bytes::copy_i16_to_bytes(&[ordinal as i16], cell, 0, order),
                    _ => bytes::copy_i32_to_bytes(&[ordinal as i32], cell, 0, order),
                }
            }
            (MemberKind::BitField { words }, FieldValue::BitField(bs)) => {
                bytes::copy_u64_to_bytes(&bs.to_storage_form_padded(*words), cell, 0, order);
            }
            (MemberKind::Opaque { len, .. }, FieldValue::Opaque(data)) => {
                let n = data.len().min(*len);
                cell[..n].copy_from_slice(&data[..n]);
                cell[n..].fill(0);
            }
            _ => return Err(self.mismatch()),
        }
        Ok(())
    }

    /// Reads the member's value out of a record image and stores it in
    /// the record. A no-op for dummy encoders.
    pub fn set_from_bytes(
        &self, record: &mut dyn RecordAccess, bytes_in: &[u8],
    ) -> Result<(), MemberError> {
        if self.dummy {
            return Ok(());
        }
        let cell = &bytes_in[self.offset..self.offset + self.size];
        let order = ByteOrder::native();
        let value = match &self.kind {
            MemberKind::Bool => FieldValue::Bool(cell[0] != 0),
            MemberKind::Int8 => FieldValue::Byte(cell[0] as i8),
            MemberKind::Int16 => {
                let mut v = [0i16];
                bytes::copy_i16_from_bytes(cell, 0, &mut v, order);
                FieldValue::Short(v[0])
            }
            MemberKind::Int32 => {
                let mut v = [0i32];
                bytes::copy_i32_from_bytes(cell, 0, &mut v, order);
                FieldValue::Int(v[0])
            }
            MemberKind::Int64 => {
                let mut v = [0i64];
                bytes::copy_i64_from_bytes(cell, 0, &mut v, order);
                FieldValue::Long(v[0])
            }
            MemberKind::Timestamp => {
                let mut v = [0i64];
                bytes::copy_i64_from_bytes(cell, 0, &mut v, order);
                FieldValue::Timestamp(v[0])
            }
            MemberKind::Float32 => {
                let mut v = [0f32];
                bytes::copy_f32_from_bytes(cell, 0, &mut v, order);
                FieldValue::Float(v[0])
            }
            MemberKind::Float64 => {
                let mut v = [0f64];
                bytes::copy_f64_from_bytes(cell, 0, &mut v, order);
                FieldValue::Double(v[0])
            }
            MemberKind::String { .. } => {
                FieldValue::Str(from_bytes_0term(cell, CharacterEncoding::Utf8))
            }
            MemberKind::Enum { def } => {
                let ordinal = match def.storage_size() {
                    IntSize::U1 => cell[0] as i8 as i64,
                    IntSize::U2 => {
                        let mut v = [0i16];
                        bytes::copy_i16_from_bytes(cell, 0, &mut v, order);
                        v[0] as i64
                    }
                    _ => {
                        let mut v = [0i32];
                        bytes::copy_i32_from_bytes(cell, 0, &mut v, order);
                        v[0] as i64
                    }
                };
                let name = usize::try_from(ordinal)
                    .ok()
                    .and_then(|i| def.values.get(i))
                    .ok_or_else(|| MemberError::InvalidValue {
                        member: self.slot.name.clone(),
                        detail: format!("stored ordinal {ordinal} out of range"),
                    })?;
                FieldValue::Enum(name.clone())
            }
            MemberKind::BitField { words } => {
                let mut w = vec![0u64; *words];
                bytes::copy_u64_from_bytes(cell, 0, &mut w, order);
                FieldValue::BitField(BitField::from_storage_form(&w))
            }
            MemberKind::Opaque { .. } => FieldValue::Opaque(cell.to_vec()),
        };
        record.set(&self.slot, value);
        Ok(())
    }
}

/// A factory contributing encoders for one or more host kinds, plus an
/// optional mapping from on-disk classes back to host kinds.
pub trait MemberFactory {
    fn can_handle(&self, kind: &HostKind) -> bool;

    fn create_encoder(
        &self, slot: MemberSlot, mapping: &MemberMapping, offset: usize, dummy: bool,
    ) -> MemberEncoder {
        MemberEncoder::new(slot, mapping.kind.clone(), offset, dummy)
    }

    /// Maps an on-disk class back to a host kind, when this factory
    /// knows a better answer than the default; the first factory
    /// returning `Some` wins.
    fn override_host_kind(
        &self, _class: StorageClass, _rank: usize, _elem_size: usize, _variant: TypeVariant,
    ) -> Option<HostKind> {
        None
    }
}

macro_rules! simple_factory {
    ($name:ident, $($kind:pat_param)|+) => {
        struct $name;

        impl MemberFactory for $name {
            fn can_handle(&self, kind: &HostKind) -> bool {
                matches!(kind, $($kind)|+)
            }
        }
    };
}

simple_factory!(BoolFactory, HostKind::Bool);
simple_factory!(IntFactory, HostKind::I32);
simple_factory!(LongFactory, HostKind::I64);
simple_factory!(ShortFactory, HostKind::I16);
simple_factory!(ByteFactory, HostKind::I8);
simple_factory!(FloatFactory, HostKind::F32);
simple_factory!(DoubleFactory, HostKind::F64);
simple_factory!(EnumFactory, HostKind::Enum);
simple_factory!(OpaqueFactory, HostKind::Opaque);

struct StringFactory;

impl MemberFactory for StringFactory {
    fn can_handle(&self, kind: &HostKind) -> bool {
        matches!(kind, HostKind::String)
    }

    fn override_host_kind(
        &self, class: StorageClass, rank: usize, _elem_size: usize, _variant: TypeVariant,
    ) -> Option<HostKind> {
        (class == StorageClass::String && rank == 0).then_some(HostKind::String)
    }
}

struct BitFieldFactory;

impl MemberFactory for BitFieldFactory {
    fn can_handle(&self, kind: &HostKind) -> bool {
        matches!(kind, HostKind::BitField)
    }

    fn override_host_kind(
        &self, class: StorageClass, _rank: usize, _elem_size: usize, _variant: TypeVariant,
    ) -> Option<HostKind> {
        (class == StorageClass::BitField).then_some(HostKind::BitField)
    }
}

struct DateFactory;

impl MemberFactory for DateFactory {
    fn can_handle(&self, kind: &HostKind) -> bool {
        matches!(kind, HostKind::Date)
    }

    fn override_host_kind(
        &self, class: StorageClass, rank: usize, elem_size: usize, variant: TypeVariant,
    ) -> Option<HostKind> {
        (class == StorageClass::Integer
            && rank == 0
            && elem_size == 8
            && variant == TypeVariant::TimestampMillisecondsSinceEpoch)
            .then_some(HostKind::Date)
    }
}

/// The priority-ordered list of member factories; the first factory
/// whose `can_handle` answers positively wins, in registration order.
pub struct MemberFactoryRegistry {
    factories: Vec<Box<dyn MemberFactory>>,
}

impl Default for MemberFactoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MemberFactoryRegistry {
    pub fn new() -> Self {
        let factories: Vec<Box<dyn MemberFactory>> = vec![
            Box::new(BoolFactory),
            Box::new(IntFactory),
            Box::new(LongFactory),
            Box::new(ShortFactory),
            Box::new(ByteFactory),
            Box::new(FloatFactory),
            Box::new(DoubleFactory),
            Box::new(StringFactory),
            Box::new(BitFieldFactory),
            Box::new(DateFactory),
            Box::new(EnumFactory),
            Box::new(OpaqueFactory),
        ];
        Self { factories }
    }

    /// Appends a custom factory; it is consulted after the built-in
    /// ones.
    pub fn register(&mut self, factory: Box<dyn MemberFactory>) {
        self.factories.push(factory);
    }

    fn find(&self, kind: &HostKind) -> Option<&dyn MemberFactory> {
        self.factories.iter().map(Box::as_ref).find(|f| f.can_handle(kind))
    }

    /// Maps an on-disk class back to a host kind; the first factory
    /// returning a non-`None` answer wins.
    pub fn override_host_kind(
        &self, class: StorageClass, rank: usize, elem_size: usize, variant: TypeVariant,
    ) -> Option<HostKind> {
        self.factories
            .iter()
            .find_map(|f| f.override_host_kind(class, rank, elem_size, variant))
    }

    /// Builds the ordered encoder list for a member mapping. Offsets are
    /// cumulative member sizes. A member missing from a field-bound
    /// `prototype` becomes a dummy encoder.
    pub fn create_encoders(
        &self, prototype: Option<&dyn RecordAccess>, members: &[MemberMapping],
    ) -> Result<CompoundLayout, MemberError> {
        let mut encoders = Vec::with_capacity(members.len());
        let mut offset = 0;
        for (index, mapping) in members.iter().enumerate() {
            let kind = mapping.kind.host_kind();
            let factory = self.find(&kind).ok_or_else(|| MemberError::Unhandled {
                member: mapping.name.clone(),
                kind: kind.clone(),
            })?;
            let slot = MemberSlot { name: mapping.name.clone(), index };
            let dummy = prototype.map_or(false, |p| {
                p.mode() == AccessMode::Field && p.get(&slot).is_none()
            });
            let encoder = factory.create_encoder(slot, mapping, offset, dummy);
            offset += encoder.size_in_bytes();
            encoders.push(encoder);
        }
        Ok(CompoundLayout { encoders, size: offset })
    }
}

/// The full packed layout of a compound record: the ordered encoders
/// plus the total record size.
#[derive(Clone, Debug)]
pub struct CompoundLayout {
    encoders: Vec<MemberEncoder>,
    size: usize,
}

impl CompoundLayout {
    pub fn encoders(&self) -> &[MemberEncoder] {
        &self.encoders
    }

    pub fn member_count(&self) -> usize {
        self.encoders.len()
    }

    /// Size in bytes of one packed record.
    pub fn record_size(&self) -> usize {
        self.size
    }

    /// The storage descriptor of the packed compound type.
    pub fn descriptor(&self) -> CompoundDesc {
        let members = self
            .encoders
            .iter()
            .map(|e| CompoundMemberDesc {
                name: e.member_name().to_owned(),
                offset: e.offset(),
                ty: e.type_descriptor(),
            })
            .collect();
        CompoundDesc { members, size: self.size }
    }

    /// Packs one record into `out`, which must be exactly one record
    /// long.
    pub fn byteify(&self, record: &dyn RecordAccess, out: &mut [u8]) -> Result<(), MemberError> {
        debug_assert_eq!(out.len(), self.size);
        for encoder in &self.encoders {
            encoder.byteify(record, out)?;
        }
        Ok(())
    }

    /// Packs a sequence of records into one contiguous image.
    pub fn byteify_records(
        &self, records: &[&dyn RecordAccess],
    ) -> Result<Vec<u8>, MemberError> {
        let mut out = vec![0; self.size * records.len()];
        for (record, chunk) in records.iter().zip(out.chunks_exact_mut(self.size)) {
            self.byteify(*record, chunk)?;
        }
        Ok(out)
    }

    /// Fills a record from one packed record image.
    pub fn read_into(
        &self, record: &mut dyn RecordAccess, bytes: &[u8],
    ) -> Result<(), MemberError> {
        for encoder in &self.encoders {
            encoder.set_from_bytes(record, bytes)?;
        }
        Ok(())
    }

    pub fn read_record<R: CompoundRecord>(&self, bytes: &[u8]) -> Result<R, MemberError> {
        let mut record = R::empty(self.member_count());
        self.read_into(&mut record, bytes)?;
        Ok(record)
    }

    /// Unpacks `count` consecutive records from a contiguous image.
    pub fn read_records<R: CompoundRecord>(
        &self, bytes: &[u8], count: usize,
    ) -> Result<Vec<R>, MemberError> {
        let mut out = Vec::with_capacity(count);
        for i in 0..count {
            out.push(self.read_record(&bytes[i * self.size..(i + 1) * self.size])?);
        }
        Ok(out)
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::record::{BoundRecord, MappedRecord};
    use crate::{field_access, EnumDef};

    fn sample_members() -> Vec<MemberMapping> {
        vec![
            MemberMapping::new("id", MemberKind::Int32),
            MemberMapping::new("name", MemberKind::String { len: 16 }),
            MemberMapping::new("ts", MemberKind::Timestamp),
        ]
    }

    #[test]
    pub fn test_layout_offsets() {
        let registry = MemberFactoryRegistry::new();
        let layout = registry.create_encoders(None, &sample_members()).unwrap();
        let offsets: Vec<_> = layout.encoders().iter().map(MemberEncoder::offset).collect();
        assert_eq!(offsets, vec![0, 4, 20]);
        assert_eq!(layout.record_size(), 28);
        let desc = layout.descriptor();
        assert_eq!(desc.size, 28);
        assert_eq!(desc.members[2].offset, 20);
    }

    #[test]
    pub fn test_mapped_roundtrip() {
        let registry = MemberFactoryRegistry::new();
        let layout = registry.create_encoders(None, &sample_members()).unwrap();
        let record = MappedRecord::new()
            .with("id", FieldValue::Int(17))
            .with("name", FieldValue::Str("sensor-1".into()))
            .with("ts", FieldValue::Timestamp(1_234_567));
        let mut image = vec![0; layout.record_size()];
        layout.byteify(&record, &mut image).unwrap();
        let back: MappedRecord = layout.read_record(&image).unwrap();
        assert_eq!(back.value("id"), Some(&FieldValue::Int(17)));
        assert_eq!(back.value("name"), Some(&FieldValue::Str("sensor-1".into())));
        assert_eq!(back.value("ts"), Some(&FieldValue::Timestamp(1_234_567)));
    }

    #[derive(Clone, Debug, Default, PartialEq)]
    struct Partial {
        id: i32,
        ts: i64,
    }

    field_access!(Partial { id => Int, ts => Timestamp });

    #[test]
    pub fn test_dummy_member_preserves_layout() {
        let registry = MemberFactoryRegistry::new();
        let prototype = BoundRecord(Partial::default());
        let layout = registry.create_encoders(Some(&prototype), &sample_members()).unwrap();
        // the 'name' slot stays in the layout but is a dummy
        assert!(layout.encoders()[1].is_dummy());
        assert_eq!(layout.record_size(), 28);

        let record = BoundRecord(Partial { id: 3, ts: 99 });
        let mut image = vec![0xau8; layout.record_size()];
        layout.byteify(&record, &mut image).unwrap();
        assert!(image[4..20].iter().all(|&b| b == 0));

        let full_layout = registry.create_encoders(None, &sample_members()).unwrap();
        let full: MappedRecord = full_layout.read_record(&image).unwrap();
        assert_eq!(full.value("id"), Some(&FieldValue::Int(3)));
        assert_eq!(full.value("name"), Some(&FieldValue::Str(String::new())));
    }

    #[test]
    pub fn test_missing_member_fails() {
        let registry = MemberFactoryRegistry::new();
        let layout = registry.create_encoders(None, &sample_members()).unwrap();
        let record = MappedRecord::new().with("id", FieldValue::Int(1));
        let mut image = vec![0; layout.record_size()];
        assert_eq!(
            layout.byteify(&record, &mut image).unwrap_err(),
            MemberError::MissingMember { member: "name".into() }
        );
    }

    #[test]
    pub fn test_enum_and_bitfield_members() {
        let registry = MemberFactoryRegistry::new();
        let members = vec![
            MemberMapping::new(
                "color",
                MemberKind::Enum { def: EnumDef::new("Color", &["RED", "GREEN", "BLUE"]) },
            ),
            MemberMapping::new("flags", MemberKind::BitField { words: 2 }),
        ];
        let layout = registry.create_encoders(None, &members).unwrap();
        assert_eq!(layout.record_size(), 1 + 16);

        let record = MappedRecord::new()
            .with("color", FieldValue::Enum("BLUE".into()))
            .with("flags", FieldValue::BitField(BitField::from_bits([0, 5, 64])));
        let mut image = vec![0; layout.record_size()];
        layout.byteify(&record, &mut image).unwrap();
        assert_eq!(image[0], 2);

        let back: MappedRecord = layout.read_record(&image).unwrap();
        assert_eq!(back.value("color"), Some(&FieldValue::Enum("BLUE".into())));
        assert_eq!(
            back.value("flags"),
            Some(&FieldValue::BitField(BitField::from_bits([0, 5, 64])))
        );
    }

    #[test]
    pub fn test_unknown_enum_value() {
        let registry = MemberFactoryRegistry::new();
        let members = vec![MemberMapping::new(
            "color",
            MemberKind::Enum { def: EnumDef::new("Color", &["RED"]) },
        )];
        let layout = registry.create_encoders(None, &members).unwrap();
        let record = MappedRecord::new().with("color", FieldValue::Enum("PINK".into()));
        let mut image = vec![0; layout.record_size()];
        assert!(matches!(
            layout.byteify(&record, &mut image),
            Err(MemberError::InvalidValue { .. })
        ));
    }

    #[test]
    pub fn test_override_host_kind() {
        let registry = MemberFactoryRegistry::new();
        assert_eq!(
            registry.override_host_kind(
                StorageClass::Integer,
                0,
                8,
                TypeVariant::TimestampMillisecondsSinceEpoch,
            ),
            Some(HostKind::Date)
        );
        assert_eq!(
            registry.override_host_kind(StorageClass::Integer, 0, 8, TypeVariant::None),
            None
        );
        assert_eq!(
            registry.override_host_kind(StorageClass::BitField, 1, 8, TypeVariant::None),
            Some(HostKind::BitField)
        );
    }

    #[test]
    pub fn test_string_truncation() {
        let registry = MemberFactoryRegistry::new();
        let members = vec![MemberMapping::new("s", MemberKind::String { len: 4 })];
        let layout = registry.create_encoders(None, &members).unwrap();
        let record = MappedRecord::new().with("s", FieldValue::Str("overflowing".into()));
        let mut image = vec![0; 4];
        layout.byteify(&record, &mut image).unwrap();
        let back: MappedRecord = layout.read_record(&image).unwrap();
        assert_eq!(back.value("s"), Some(&FieldValue::Str("ove".into())));
    }
}

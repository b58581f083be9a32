//! End-to-end scenarios exercising the full reader/writer surface
//! against real files.

use std::path::PathBuf;

use ndarray::arr2;

use ezhdf5::types::{
    BitField, EnumDef, FieldValue, MDArray, MappedRecord, MemberKind, MemberMapping, TypeVariant,
};
use ezhdf5::{field_access, Error, Reader, StorageLayout, Writer};

fn with_tmp_writer<F: Fn(PathBuf, Writer)>(func: F) {
    let dir = tempfile::Builder::new().prefix("ezhdf5-").tempdir().unwrap();
    let path = dir.path().join("scenario.h5");
    let writer = Writer::open(&path).unwrap();
    func(path, writer);
}

#[test]
fn chunked_array_block_reads() {
    // create /x of shape [10] with chunk [4] and stream it back
    with_tmp_writer(|_, writer| {
        let data: Vec<i64> = (0..10).collect();
        writer.create_array::<i64>("/x", 10, 4).unwrap();
        writer.write_block_with_offset("/x", &data, 0).unwrap();

        let info = writer.dataset_info("/x").unwrap();
        assert_eq!(info.layout, StorageLayout::Chunked);
        assert_eq!(info.chunk, Some(vec![4]));

        assert_eq!(writer.read_array::<i64>("/x").unwrap(), data);
        // a block overlapping the end is clamped
        let block = writer.read_array_block_with_offset::<i64>("/x", 5, 3).unwrap();
        assert_eq!(block, vec![3, 4, 5, 6, 7]);

        let blocks: Vec<_> =
            writer.natural_blocks::<i64>("/x").unwrap().map(|b| b.unwrap()).collect();
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].data, vec![0, 1, 2, 3]);
        assert_eq!(blocks[1].data, vec![4, 5, 6, 7]);
        assert_eq!(blocks[2].data, vec![8, 9]);
        assert_eq!(blocks[2].offset, 8);
    });
}

#[test]
fn block_tiling_concatenates_to_full_array() {
    with_tmp_writer(|_, writer| {
        let data: Vec<i32> = (0..23).collect();
        writer.write_array("/tiles", &data).unwrap();
        let block_size = 5;
        let mut tiled = Vec::new();
        for i in 0..(data.len() + block_size - 1) / block_size {
            tiled.extend(writer.read_array_block::<i32>("/tiles", block_size, i as u64).unwrap());
        }
        assert_eq!(tiled, data);
    });
}

#[test]
fn enum_commit_and_incompatibility() {
    with_tmp_writer(|_, writer| {
        let color = writer.enum_type("Color", &["RED", "GREEN", "BLUE"], true).unwrap();
        writer.write_enum("/c", &color.value_of("GREEN").unwrap()).unwrap();

        assert_eq!(writer.read_enum("/c").unwrap().ordinal(), 1);
        assert_eq!(writer.read_enum_as_string("/c").unwrap(), "GREEN");
        // the committed name round-trips through the registry path
        assert_eq!(writer.read_enum("/c").unwrap().def().name, "Color");

        // re-committing with reordered values must fail the check
        let err = writer.enum_type("Color", &["RED", "BLUE", "GREEN"], true).unwrap_err();
        assert!(matches!(err, Error::EnumIncompatible(_)));
        // without the check the committed type is simply reused
        assert!(writer.enum_type("Color", &["RED", "BLUE", "GREEN"], false).is_ok());
    });
}

#[test]
fn enum_array_roundtrip() {
    with_tmp_writer(|_, writer| {
        let def = EnumDef::new("State", &["OFF", "ON", "UNKNOWN"]);
        let names = MDArray::new(
            ["ON", "OFF", "UNKNOWN", "ON"].iter().map(|s| s.to_string()).collect(),
            vec![2, 2],
        )
        .unwrap();
        let array = ezhdf5::types::EnumArray::from_names(def, &names).unwrap();
        writer.write_enum_array("/states", &array).unwrap();

        let back = writer.read_enum_array("/states").unwrap();
        assert_eq!(back.dims(), &[2, 2]);
        assert_eq!(back.to_name_array(), names);
    });
}

#[test]
fn matrix_blocks_and_md_roundtrip() {
    with_tmp_writer(|_, writer| {
        let m = arr2(&[[1.0, 2.0], [3.0, 4.0]]);
        writer.write_matrix("/m", &m).unwrap();

        let block = writer.read_matrix_block_with_offset::<f64>("/m", 1, 2, 1, 0).unwrap();
        assert_eq!(block, arr2(&[[3.0, 4.0]]));

        let md = writer.read_md_array::<f64>("/m").unwrap();
        assert_eq!(md.to_matrix().unwrap(), vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
        assert_eq!(writer.read_matrix::<f64>("/m").unwrap(), m);

        // rank coercion of a 1-D dataset into a matrix must fail
        writer.write_array("/flat", &[1.0f64, 2.0]).unwrap();
        assert!(matches!(
            writer.read_matrix::<f64>("/flat"),
            Err(Error::RankMismatch { expected: 2, actual: 1 })
        ));
    });
}

#[test]
fn md_natural_blocks_cover_the_space() {
    with_tmp_writer(|_, writer| {
        let data = MDArray::new((0..30).collect::<Vec<i32>>(), vec![5, 6]).unwrap();
        writer.create_md_array::<i32>("/grid", &[5, 6], &[2, 4]).unwrap();
        writer.write_md_array_block_with_offset("/grid", &data, &[0, 0]).unwrap();

        let mut seen = vec![false; 30];
        for block in writer.md_natural_blocks::<i32>("/grid").unwrap() {
            let block = block.unwrap();
            for y in 0..block.data.dims()[0] {
                for x in 0..block.data.dims()[1] {
                    let value = *block.data.get(&[y, x]).unwrap() as usize;
                    assert!(!seen[value], "block overlap at element {value}");
                    seen[value] = true;
                    let expected =
                        (block.offset[0] as usize + y) * 6 + block.offset[1] as usize + x;
                    assert_eq!(value, expected);
                }
            }
        }
        assert!(seen.iter().all(|&v| v), "natural blocks did not cover the space");
    });
}

#[test]
fn bit_field_storage_form() {
    with_tmp_writer(|_, writer| {
        let bits = BitField::from_bits([0, 5, 64]);
        assert_eq!(bits.to_storage_form(), vec![0x21, 0x01]);
        writer.write_bit_field("/bits", &bits).unwrap();
        assert_eq!(writer.read_bit_field("/bits").unwrap(), bits);

        // no bits beyond 63 => single word on disk
        let small = BitField::from_bits([1, 63]);
        writer.write_bit_field("/small", &small).unwrap();
        assert_eq!(writer.dataset_info("/small").unwrap().dims, vec![1]);
        assert_eq!(writer.read_bit_field("/small").unwrap(), small);
    });
}

#[derive(Clone, Debug, Default, PartialEq)]
struct Measurement {
    id: i32,
    name: String,
    ts: i64,
}

field_access!(Measurement { id => Int, name => Str, ts => Timestamp });

#[derive(Clone, Debug, Default, PartialEq)]
struct MeasurementNoScore {
    id: i32,
    name: String,
    ts: i64,
}

field_access!(MeasurementNoScore { id => Int, name => Str, ts => Timestamp });

fn measurement_members() -> Vec<MemberMapping> {
    vec![
        MemberMapping::new("id", MemberKind::Int32),
        MemberMapping::new("name", MemberKind::String { len: 16 }),
        MemberMapping::new("ts", MemberKind::Timestamp),
    ]
}

#[test]
fn compound_layout_and_roundtrip() {
    with_tmp_writer(|_, writer| {
        let ctype = writer.compound_type("Measurement", &measurement_members()).unwrap();
        assert_eq!(ctype.record_size(), 28);
        let offsets: Vec<_> = ctype.layout().encoders().iter().map(|e| e.offset()).collect();
        assert_eq!(offsets, vec![0, 4, 20]);

        let record = MappedRecord::new()
            .with("id", FieldValue::Int(7))
            .with("name", FieldValue::Str("probe".into()))
            .with("ts", FieldValue::Timestamp(1_700_000_000_000));
        writer.write_compound("/rec", &ctype, &record).unwrap();

        let back: MappedRecord = writer.read_compound("/rec", &ctype).unwrap();
        assert_eq!(back.value("id"), Some(&FieldValue::Int(7)));
        assert_eq!(back.value("name"), Some(&FieldValue::Str("probe".into())));
        assert_eq!(back.value("ts"), Some(&FieldValue::Timestamp(1_700_000_000_000)));

        // the timestamp member is tagged with its type variant
        let reopened = writer.compound_type_for_dataset("/rec").unwrap();
        let kinds: Vec<_> =
            reopened.layout().encoders().iter().map(|e| e.kind().clone()).collect();
        assert_eq!(kinds[2], MemberKind::Timestamp);
    });
}

#[test]
fn compound_schema_superset_reads_into_smaller_model() {
    with_tmp_writer(|_, writer| {
        // file schema: {id, name, ts, score}
        let mut members = measurement_members();
        members.push(MemberMapping::new("score", MemberKind::Float32));
        let full = writer.compound_type("Scored", &members).unwrap();
        assert_eq!(full.record_size(), 32);

        let record = MappedRecord::new()
            .with("id", FieldValue::Int(1))
            .with("name", FieldValue::Str("a".into()))
            .with("ts", FieldValue::Timestamp(42))
            .with("score", FieldValue::Float(0.5));
        writer.write_compound("/scored", &full, &record).unwrap();

        // model omitting 'score': the slot becomes a dummy, reads
        // succeed and the extra bytes are discarded
        let partial =
            writer.compound_type_bound::<MeasurementNoScore>("ScoredPartial", &members).unwrap();
        assert!(partial.layout().encoders()[3].is_dummy());
        assert_eq!(partial.record_size(), 32);

        let back: ezhdf5::types::BoundRecord<MeasurementNoScore> =
            writer.read_compound("/scored", &partial).unwrap();
        assert_eq!(
            back.into_inner(),
            MeasurementNoScore { id: 1, name: "a".into(), ts: 42 }
        );
    });
}

#[test]
fn compound_array_blocks() {
    with_tmp_writer(|_, writer| {
        let ctype = writer.compound_type("Measurement", &measurement_members()).unwrap();
        writer.create_compound_array("/recs", &ctype, 4, 2).unwrap();
        for i in 0..4i32 {
            let record = MappedRecord::new()
                .with("id", FieldValue::Int(i))
                .with("name", FieldValue::Str(format!("r{i}")))
                .with("ts", FieldValue::Timestamp(i as i64 * 10));
            writer
                .write_compound_array_block_with_offset("/recs", &ctype, &[&record], i as u64)
                .unwrap();
        }
        let records: Vec<MappedRecord> = writer.read_compound_array("/recs", &ctype).unwrap();
        assert_eq!(records.len(), 4);
        assert_eq!(records[3].value("id"), Some(&FieldValue::Int(3)));
        assert_eq!(records[2].value("name"), Some(&FieldValue::Str("r2".into())));
    });
}

#[test]
fn overwrite_extends_in_place_or_replaces() {
    with_tmp_writer(|_, writer| {
        // chunked datasets get unlimited max dims: growing extends
        let data: Vec<i32> = (0..10).collect();
        writer.create_array::<i32>("/x", 10, 4).unwrap();
        writer.write_block_with_offset("/x", &data, 0).unwrap();

        let grown: Vec<i32> = (0..15).collect();
        writer.write_array("/x", &grown).unwrap();
        assert_eq!(writer.read_array::<i32>("/x").unwrap(), grown);
        assert_eq!(writer.dataset_info("/x").unwrap().layout, StorageLayout::Chunked);

        // shrinking replaces the dataset
        let shrunk: Vec<i32> = (0..5).collect();
        writer.write_array("/x", &shrunk).unwrap();
        assert_eq!(writer.read_array::<i32>("/x").unwrap(), shrunk);

    });
}

#[test]
fn contiguous_overwrite_beyond_bounds_fails() {
    let dir = tempfile::Builder::new().prefix("ezhdf5-").tempdir().unwrap();
    let path = dir.path().join("fixed.h5");
    let writer = Writer::with_options().dont_use_extendable_datasets().open(&path).unwrap();

    // a contiguous dataset with fixed max dims cannot grow in place
    let fixed: Vec<f64> = (0..100).map(|v| v as f64).collect();
    writer.write_array("/y", &fixed).unwrap();
    assert_eq!(writer.dataset_info("/y").unwrap().layout, StorageLayout::Contiguous);
    let bigger: Vec<f64> = (0..200).map(|v| v as f64).collect();
    assert!(matches!(writer.write_array("/y", &bigger), Err(Error::ShapeMismatch(_))));

    // rewriting in place (same shape) goes through the flush workaround
    let replacement: Vec<f64> = (0..100).map(|v| -(v as f64)).collect();
    writer.write_array("/y", &replacement).unwrap();
    assert_eq!(writer.read_array::<f64>("/y").unwrap(), replacement);
}

#[test]
fn overwrite_beyond_bounds_with_latest_format_replaces() {
    let dir = tempfile::Builder::new().prefix("ezhdf5-").tempdir().unwrap();
    let path = dir.path().join("latest.h5");
    let writer = Writer::with_options()
        .latest_format()
        .dont_use_extendable_datasets()
        .open(&path)
        .unwrap();
    let fixed: Vec<f64> = (0..100).map(|v| v as f64).collect();
    writer.write_array("/y", &fixed).unwrap();
    let bigger: Vec<f64> = (0..200).map(|v| v as f64).collect();
    writer.write_array("/y", &bigger).unwrap();
    assert_eq!(writer.read_array::<f64>("/y").unwrap(), bigger);
}

#[test]
fn primitive_scalar_roundtrips() {
    with_tmp_writer(|_, writer| {
        writer.write("/i8", -3i8).unwrap();
        writer.write("/i16", -300i16).unwrap();
        writer.write("/i32", 70_000i32).unwrap();
        writer.write("/i64", 5_000_000_000i64).unwrap();
        writer.write("/f32", 0.25f32).unwrap();
        writer.write("/f64", -1.5e300f64).unwrap();
        assert_eq!(writer.read::<i8>("/i8").unwrap(), -3);
        assert_eq!(writer.read::<i16>("/i16").unwrap(), -300);
        assert_eq!(writer.read::<i32>("/i32").unwrap(), 70_000);
        assert_eq!(writer.read::<i64>("/i64").unwrap(), 5_000_000_000);
        assert_eq!(writer.read::<f32>("/f32").unwrap(), 0.25);
        assert_eq!(writer.read::<f64>("/f64").unwrap(), -1.5e300);
    });
}

#[test]
fn string_roundtrips() {
    with_tmp_writer(|_, writer| {
        writer.write_string("/s", "hello world").unwrap();
        assert_eq!(writer.read_string("/s").unwrap(), "hello world");

        writer.write_string_fixed("/cut", "overflowing", 4).unwrap();
        assert_eq!(writer.read_string("/cut").unwrap(), "over");

        writer.write_string_var("/vl", "variable length").unwrap();
        assert_eq!(writer.read_string("/vl").unwrap(), "variable length");

        writer.write_string_array("/arr", &["a", "bc", "def"], 8).unwrap();
        assert_eq!(writer.read_string_array("/arr").unwrap(), vec!["a", "bc", "def"]);
    });
}

#[test]
fn bool_and_opaque_roundtrips() {
    with_tmp_writer(|_, writer| {
        writer.write_bool("/flag", true).unwrap();
        assert!(writer.read_bool("/flag").unwrap());
        writer.write_bool("/flag2", false).unwrap();
        assert!(!writer.read_bool("/flag2").unwrap());

        let blob = vec![0xde, 0xad, 0xbe, 0xef];
        writer.write_opaque("/blob", "test/blob", &blob).unwrap();
        let (tag, data) = writer.read_opaque("/blob").unwrap();
        assert_eq!(tag, "test/blob");
        assert_eq!(data, blob);
    });
}

#[test]
fn attributes_are_idempotent() {
    with_tmp_writer(|_, writer| {
        writer.write("/obj", 1i32).unwrap();
        writer.set_attr("/obj", "version", 1i32).unwrap();
        writer.set_attr("/obj", "version", 2i32).unwrap();
        assert_eq!(writer.attr::<i32>("/obj", "version").unwrap(), 2);

        writer.set_string_attr("/obj", "unit", "meters").unwrap();
        assert_eq!(writer.string_attr("/obj", "unit").unwrap(), "meters");
        // overwriting with a longer value recreates the attribute
        writer.set_string_attr("/obj", "unit", "millimeters").unwrap();
        assert_eq!(writer.string_attr("/obj", "unit").unwrap(), "millimeters");

        writer.set_bool_attr("/obj", "valid", true).unwrap();
        assert!(writer.bool_attr("/obj", "valid").unwrap());

        writer.set_attr_array("/obj", "shape", &[2i64, 3]).unwrap();
        assert_eq!(writer.attr_array::<i64>("/obj", "shape").unwrap(), vec![2, 3]);

        let mut names = writer.attr_names("/obj").unwrap();
        names.sort();
        assert_eq!(names, vec!["shape", "unit", "valid", "version"]);

        writer.delete_attr("/obj", "shape").unwrap();
        assert!(!writer.has_attr("/obj", "shape").unwrap());

        // attributes on missing objects fail fast
        assert!(matches!(
            writer.set_attr("/missing", "a", 1i32),
            Err(Error::NoSuchObject(_))
        ));
    });
}

#[test]
fn type_variant_tagging() {
    with_tmp_writer(|_, writer| {
        writer.write("/ts", 1_700_000_000_000i64).unwrap();
        writer
            .set_type_variant("/ts", TypeVariant::TimestampMillisecondsSinceEpoch)
            .unwrap();
        assert_eq!(
            writer.type_variant("/ts").unwrap(),
            TypeVariant::TimestampMillisecondsSinceEpoch
        );
        // untagged objects answer the none variant
        writer.write("/plain", 1i64).unwrap();
        assert_eq!(writer.type_variant("/plain").unwrap(), TypeVariant::None);
    });
}

#[test]
fn groups_links_and_members() {
    with_tmp_writer(|_, writer| {
        writer.create_group("/a/b").unwrap();
        writer.write("/a/b/x", 1i32).unwrap();
        writer.write("/a/y", 2i32).unwrap();
        writer.create_soft_link("/a/b/x", "/a/link").unwrap();

        assert!(writer.exists("/a/b/x").unwrap());
        assert!(!writer.exists("/a/missing/deep").unwrap());
        assert!(writer.is_group("/a").unwrap());
        assert!(matches!(writer.object_kind("/a/y"), Ok(ezhdf5::ObjectKind::Dataset)));

        let mut members = writer.group_members("/a").unwrap();
        members.sort();
        assert_eq!(members, vec!["b", "link", "y"]);

        match writer.link_info("/a/link").unwrap() {
            ezhdf5::LinkKind::Soft { target } => assert_eq!(target, "/a/b/x"),
            other => panic!("expected soft link, got {other:?}"),
        }

        // internal bookkeeping groups are filtered from the root listing
        writer.write_bool("/flag", true).unwrap();
        let members = writer.group_members("/").unwrap();
        assert!(!members.iter().any(|m| m.starts_with("__")));
        let all = writer.all_group_members("/").unwrap();
        assert!(all.iter().any(|m| m == "__DATATYPES__"));

        writer.delete("/a/y").unwrap();
        assert!(!writer.exists("/a/y").unwrap());
        assert!(matches!(writer.delete("/a/y"), Err(Error::NoSuchObject(_))));
    });
}

#[test]
fn external_links_require_latest_format() {
    with_tmp_writer(|_, writer| {
        writer.write("/x", 1i32).unwrap();
        assert!(matches!(
            writer.create_external_link("other.h5", "/data", "/ext"),
            Err(Error::LayoutUnsupported(_))
        ));
    });
}

#[test]
fn object_references_resolve_to_paths() {
    with_tmp_writer(|_, writer| {
        writer.write("/target", 42i32).unwrap();
        writer.write_object_reference("/ref", "/target").unwrap();

        assert_eq!(writer.read_object_reference("/ref", true).unwrap(), "/target");
        let encoded = writer.read_object_reference("/ref", false).unwrap();
        assert!(encoded.starts_with('\0'));

        // a plain dataset is not a reference
        assert!(matches!(
            writer.read_object_reference("/target", true),
            Err(Error::NotAReference(_))
        ));
    });
}

#[test]
fn deflate_roundtrip() {
    with_tmp_writer(|_, writer| {
        let data: Vec<f64> = (0..10_000).map(|v| (v % 17) as f64).collect();
        writer.write_array_deflate("/compressed", &data).unwrap();
        assert_eq!(writer.dataset_info("/compressed").unwrap().layout, StorageLayout::Chunked);
        assert_eq!(writer.read_array::<f64>("/compressed").unwrap(), data);
    });
}

#[test]
fn compact_threshold_selects_layout() {
    let dir = tempfile::Builder::new().prefix("ezhdf5-").tempdir().unwrap();
    let path = dir.path().join("layout.h5");
    let writer = Writer::with_options().dont_use_extendable_datasets().open(&path).unwrap();

    // 31 doubles = 248 bytes < 256 => compact
    let small: Vec<f64> = (0..31).map(|v| v as f64).collect();
    writer.write_array("/small", &small).unwrap();
    assert_eq!(writer.dataset_info("/small").unwrap().layout, StorageLayout::Compact);

    // 32 doubles = 256 bytes => contiguous
    let larger: Vec<f64> = (0..32).map(|v| v as f64).collect();
    writer.write_array("/larger", &larger).unwrap();
    assert_eq!(writer.dataset_info("/larger").unwrap().layout, StorageLayout::Contiguous);

    // extendable writers chunk everything above the compact threshold
    let default_writer = Writer::open(dir.path().join("default.h5")).unwrap();
    default_writer.write_array("/larger", &larger).unwrap();
    assert_eq!(
        default_writer.dataset_info("/larger").unwrap().layout,
        StorageLayout::Chunked
    );
}

#[test]
fn reader_surface_is_read_only() {
    with_tmp_writer(|path, writer| {
        writer.write_array("/data", &[1i32, 2, 3]).unwrap();
        writer.flush().unwrap();
        drop(writer);

        let reader = Reader::open(&path).unwrap();
        assert!(reader.file().is_read_only());
        assert_eq!(reader.read_array::<i32>("/data").unwrap(), vec![1, 2, 3]);
        assert!(matches!(reader.read::<i32>("/missing"), Err(Error::NoSuchObject(_))));
    });
}

#[test]
fn widening_reads_convert_element_size() {
    with_tmp_writer(|_, writer| {
        // data stored as i16 can be read back widened into i64
        writer.write_array("/narrow", &[1i16, -2, 300]).unwrap();
        assert_eq!(writer.read_array::<i64>("/narrow").unwrap(), vec![1, -2, 300]);
        // and floats widen from f32 to f64
        writer.write_array("/f", &[0.5f32, 1.5]).unwrap();
        assert_eq!(writer.read_array::<f64>("/f").unwrap(), vec![0.5, 1.5]);
    });
}

#[test]
fn read_into_host_array_with_memory_offset() {
    with_tmp_writer(|_, writer| {
        writer.write_array("/src", &[1i32, 2, 3, 4]).unwrap();
        let mut host = MDArray::from_elem(0i32, vec![8]);
        let dims = writer.read_to_md_array_with_offset("/src", &mut host, &[2]).unwrap();
        assert_eq!(dims, vec![4]);
        assert_eq!(host.as_slice(), &[0, 0, 1, 2, 3, 4, 0, 0]);

        // rank mismatch between host and dataset fails fast
        let mut bad = MDArray::from_elem(0i32, vec![2, 4]);
        assert!(matches!(
            writer.read_to_md_array_with_offset("/src", &mut bad, &[0, 0]),
            Err(Error::RankMismatch { .. })
        ));
    });
}

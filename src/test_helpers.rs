//! # Test Helpers - *Arrow IPC Fixtures*
//!
//! Real Arrow IPC bytes produced by the `arrow-ipc` writers, plus hand-built
//! FlatBuffers frames for inputs no conforming writer would emit.
//!
//! - `*_fixture` builders return a schema and its batches.
//! - `stream_bytes`, `legacy_bytes` and `file_bytes` serialise a fixture in the
//!   three supported layouts.
//! - `batch_frame` and `dictionary_frame` encode a single stream-framed message
//!   from raw field nodes and buffer regions.

use std::sync::{Arc, Once};

use arrow_array::{
    ArrayRef, BooleanArray, Date32Array, Decimal128Array, DictionaryArray, Float32Array,
    Int32Array, Int64Array, RecordBatch as ArrowBatch, StringArray, TimestampMicrosecondArray,
    UInt8Array, types::Int32Type,
};
use arrow_ipc::writer::{FileWriter, IpcWriteOptions, StreamWriter};
use arrow_ipc::{
    Buffer, DictionaryBatchBuilder, FieldNode, MessageBuilder, MessageHeader, MetadataVersion,
    RecordBatchBuilder,
};
use arrow_schema::{DataType, Field as ArrowField, Schema as ArrowSchema, SchemaRef, TimeUnit};
use flatbuffers::{FlatBufferBuilder, UnionWIPOffset, WIPOffset};
use tracing_subscriber::EnvFilter;

/// A schema plus the batches written under it.
pub(crate) struct Fixture {
    pub schema: SchemaRef,
    pub batches: Vec<ArrowBatch>,
}

/// Installs a test-writer subscriber once per process.
pub(crate) fn init_tracing() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let filter = EnvFilter::from_default_env().add_directive("tablestream=debug".parse().unwrap());

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

// -------------------- Fixtures -------------------- //

/// One nullable `Int64` column `n`, counting up across batches of the given sizes.
pub(crate) fn int_fixture(sizes: &[usize]) -> Fixture {
    let schema = Arc::new(ArrowSchema::new(vec![ArrowField::new(
        "n",
        DataType::Int64,
        true,
    )]));
    let mut next = 0i64;
    let batches = sizes
        .iter()
        .map(|size| {
            let values: Vec<i64> = (next..next + *size as i64).collect();
            next += *size as i64;
            ArrowBatch::try_new(
                schema.clone(),
                vec![Arc::new(Int64Array::from(values)) as ArrayRef],
            )
            .unwrap()
        })
        .collect();
    Fixture { schema, batches }
}

/// Four rows over every primitive family, with nulls in each column.
pub(crate) fn mixed_fixture() -> Fixture {
    let schema = Arc::new(ArrowSchema::new(vec![
        ArrowField::new("i32", DataType::Int32, true),
        ArrowField::new("u8", DataType::UInt8, true),
        ArrowField::new("f32", DataType::Float32, true),
        ArrowField::new("flag", DataType::Boolean, true),
        ArrowField::new("day", DataType::Date32, true),
        ArrowField::new("ts", DataType::Timestamp(TimeUnit::Microsecond, None), true),
        ArrowField::new("dec", DataType::Decimal128(10, 2), true),
        ArrowField::new("s", DataType::Utf8, true),
    ]));
    let columns: Vec<ArrayRef> = vec![
        Arc::new(Int32Array::from(vec![Some(1), None, Some(3), Some(-4)])),
        Arc::new(UInt8Array::from(vec![Some(255), Some(0), None, Some(7)])),
        Arc::new(Float32Array::from(vec![Some(1.5), Some(-0.25), Some(2.0), None])),
        Arc::new(BooleanArray::from(vec![Some(true), Some(false), None, Some(true)])),
        // 2019-02-01 .. 2019-02-04
        Arc::new(Date32Array::from(vec![Some(17928), None, Some(17930), Some(17931)])),
        Arc::new(TimestampMicrosecondArray::from(vec![
            Some(1_549_011_600_000_000),
            Some(-1_500),
            None,
            Some(1_549_011_600_123_999),
        ])),
        Arc::new(
            Decimal128Array::from(vec![Some(12_345), Some(-12_399), None, Some(0)])
                .with_precision_and_scale(10, 2)
                .unwrap(),
        ),
        Arc::new(StringArray::from(vec![Some("a"), None, Some(""), Some("δέλτα")])),
    ];
    let batch = ArrowBatch::try_new(schema.clone(), columns).unwrap();
    Fixture {
        schema,
        batches: vec![batch],
    }
}

/// A single dictionary-encoded column `d` of `[a, b, b, null]`.
#[allow(deprecated)]
pub(crate) fn dict_fixture() -> Fixture {
    let dict_type = DataType::Dictionary(Box::new(DataType::Int32), Box::new(DataType::Utf8));
    let schema = Arc::new(ArrowSchema::new(vec![ArrowField::new_dict(
        "d", dict_type, true, 0, false,
    )]));
    let keys = Int32Array::from(vec![Some(0), Some(1), Some(1), None]);
    let values: ArrayRef = Arc::new(StringArray::from(vec!["a", "b"]));
    let dict = DictionaryArray::<Int32Type>::try_new(keys, values).unwrap();
    let batch = ArrowBatch::try_new(schema.clone(), vec![Arc::new(dict) as ArrayRef]).unwrap();
    Fixture {
        schema,
        batches: vec![batch],
    }
}

// -------------------- Writers -------------------- //

fn write_stream(f: &Fixture, options: IpcWriteOptions) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut writer = StreamWriter::try_new_with_options(&mut buf, &f.schema, options).unwrap();
        for batch in &f.batches {
            writer.write(batch).unwrap();
        }
        writer.finish().unwrap();
    }
    buf
}

/// Current stream framing, terminated by the 8-byte EOS marker.
pub(crate) fn stream_bytes(f: &Fixture) -> Vec<u8> {
    write_stream(f, IpcWriteOptions::default())
}

/// Pre-0.15 framing with no continuation markers.
pub(crate) fn legacy_bytes(f: &Fixture) -> Vec<u8> {
    write_stream(
        f,
        IpcWriteOptions::try_new(8, true, MetadataVersion::V4).unwrap(),
    )
}

/// Arrow file container: magic, stream, footer, magic.
pub(crate) fn file_bytes(f: &Fixture) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut writer = FileWriter::try_new(&mut buf, &f.schema).unwrap();
        for batch in &f.batches {
            writer.write(batch).unwrap();
        }
        writer.finish().unwrap();
    }
    buf
}

/// Stream-framed schema message for `schema`, with no EOS.
pub(crate) fn schema_frame(schema: &SchemaRef) -> Vec<u8> {
    let mut bytes = stream_bytes(&Fixture {
        schema: schema.clone(),
        batches: vec![],
    });
    bytes.truncate(bytes.len() - 8);
    bytes
}

// -------------------- Hand-built frames -------------------- //

fn record_batch_header<'f>(
    fbb: &mut FlatBufferBuilder<'f>,
    length: i64,
    nodes: &[(i64, i64)],
    buffers: &[(i64, i64)],
) -> WIPOffset<arrow_ipc::RecordBatch<'f>> {
    let nodes: Vec<FieldNode> = nodes.iter().map(|(l, n)| FieldNode::new(*l, *n)).collect();
    let buffers: Vec<Buffer> = buffers.iter().map(|(o, l)| Buffer::new(*o, *l)).collect();
    let nodes = fbb.create_vector(&nodes);
    let buffers = fbb.create_vector(&buffers);
    let mut rb = RecordBatchBuilder::new(fbb);
    rb.add_length(length);
    rb.add_nodes(nodes);
    rb.add_buffers(buffers);
    rb.finish()
}

fn finish_frame(
    mut fbb: FlatBufferBuilder<'_>,
    header_type: MessageHeader,
    header: WIPOffset<UnionWIPOffset>,
    body: &[u8],
) -> Vec<u8> {
    let mut mb = MessageBuilder::new(&mut fbb);
    mb.add_version(MetadataVersion::V5);
    mb.add_header_type(header_type);
    mb.add_bodyLength(body.len() as i64);
    mb.add_header(header);
    let root = mb.finish();
    fbb.finish(root, None);

    let mut meta = fbb.finished_data().to_vec();
    meta.resize(meta.len().div_ceil(8) * 8, 0);

    let mut out = Vec::with_capacity(8 + meta.len() + body.len());
    out.extend_from_slice(&0xFFFF_FFFFu32.to_le_bytes());
    out.extend_from_slice(&(meta.len() as i32).to_le_bytes());
    out.extend_from_slice(&meta);
    out.extend_from_slice(body);
    out
}

/// A stream-framed record batch message over raw `(length, null_count)` nodes
/// and `(offset, length)` buffer regions.
pub(crate) fn batch_frame(
    length: i64,
    nodes: &[(i64, i64)],
    buffers: &[(i64, i64)],
    body: &[u8],
) -> Vec<u8> {
    let mut fbb = FlatBufferBuilder::new();
    let rb = record_batch_header(&mut fbb, length, nodes, buffers);
    finish_frame(fbb, MessageHeader::RecordBatch, rb.as_union_value(), body)
}

/// A stream-framed dictionary batch message.
pub(crate) fn dictionary_frame(
    id: i64,
    is_delta: bool,
    length: i64,
    nodes: &[(i64, i64)],
    buffers: &[(i64, i64)],
    body: &[u8],
) -> Vec<u8> {
    let mut fbb = FlatBufferBuilder::new();
    let rb = record_batch_header(&mut fbb, length, nodes, buffers);
    let mut db = DictionaryBatchBuilder::new(&mut fbb);
    db.add_id(id);
    db.add_data(rb);
    db.add_isDelta(is_delta);
    let db = db.finish();
    finish_frame(fbb, MessageHeader::DictionaryBatch, db.as_union_value(), body)
}

/// Little-endian `i32` offsets followed by the concatenated bytes, padded to 8.
pub(crate) fn utf8_body(values: &[&str]) -> (Vec<u8>, usize, usize) {
    let mut offsets = Vec::with_capacity((values.len() + 1) * 4);
    let mut data = Vec::new();
    offsets.extend_from_slice(&0i32.to_le_bytes());
    for v in values {
        data.extend_from_slice(v.as_bytes());
        offsets.extend_from_slice(&(data.len() as i32).to_le_bytes());
    }
    let offsets_len = offsets.len();
    let data_len = data.len();
    let mut body = offsets;
    body.resize(body.len().div_ceil(8) * 8, 0);
    body.extend_from_slice(&data);
    body.resize(body.len().div_ceil(8) * 8, 0);
    (body, offsets_len, data_len)
}

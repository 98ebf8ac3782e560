//! Shared fixtures for the integration tests.
//!
//! Conforming inputs come from the `arrow-ipc` writers; malformed ones are
//! encoded by hand with the generated FlatBuffers builders.

#![allow(dead_code)]

use std::sync::Arc;

use arrow_array::{ArrayRef, RecordBatch};
use arrow_ipc::writer::{FileWriter, IpcWriteOptions, StreamWriter};
use arrow_ipc::{
    Buffer, FieldNode, MessageBuilder, MessageHeader, MetadataVersion, RecordBatchBuilder,
};
use arrow_schema::{Field, Schema, SchemaRef};
use flatbuffers::FlatBufferBuilder;

/// Builds a batch from named columns, nullable fields typed after each array.
pub fn batch(columns: Vec<(&str, ArrayRef)>) -> RecordBatch {
    let fields: Vec<Field> = columns
        .iter()
        .map(|(name, arr)| Field::new(*name, arr.data_type().clone(), true))
        .collect();
    let schema = Arc::new(Schema::new(fields));
    RecordBatch::try_new(schema, columns.into_iter().map(|(_, a)| a).collect()).unwrap()
}

fn write(schema: &SchemaRef, batches: &[RecordBatch], options: IpcWriteOptions) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut writer = StreamWriter::try_new_with_options(&mut buf, schema, options).unwrap();
        for b in batches {
            writer.write(b).unwrap();
        }
        writer.finish().unwrap();
    }
    buf
}

pub fn stream_bytes(batches: &[RecordBatch]) -> Vec<u8> {
    write(&batches[0].schema(), batches, IpcWriteOptions::default())
}

pub fn legacy_bytes(batches: &[RecordBatch]) -> Vec<u8> {
    write(
        &batches[0].schema(),
        batches,
        IpcWriteOptions::try_new(8, true, MetadataVersion::V4).unwrap(),
    )
}

pub fn file_bytes(batches: &[RecordBatch]) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut writer = FileWriter::try_new(&mut buf, &batches[0].schema()).unwrap();
        for b in batches {
            writer.write(b).unwrap();
        }
        writer.finish().unwrap();
    }
    buf
}

/// Both framings of the same batches, labelled for assertion messages.
pub fn both_framings(batches: &[RecordBatch]) -> [(&'static str, Vec<u8>); 2] {
    [
        ("stream", stream_bytes(batches)),
        ("legacy", legacy_bytes(batches)),
    ]
}

/// Stream-framed schema message alone, no EOS.
pub fn schema_frame(schema: &SchemaRef) -> Vec<u8> {
    let mut bytes = write(schema, &[], IpcWriteOptions::default());
    bytes.truncate(bytes.len() - 8);
    bytes
}

pub const STREAM_EOS: [u8; 8] = [0xFF, 0xFF, 0xFF, 0xFF, 0, 0, 0, 0];

/// A stream-framed record batch over raw `(length, null_count)` nodes and
/// `(offset, length)` buffers.
pub fn batch_frame(length: i64, nodes: &[(i64, i64)], buffers: &[(i64, i64)], body: &[u8]) -> Vec<u8> {
    let mut fbb = FlatBufferBuilder::new();
    let nodes: Vec<FieldNode> = nodes.iter().map(|(l, n)| FieldNode::new(*l, *n)).collect();
    let buffers: Vec<Buffer> = buffers.iter().map(|(o, l)| Buffer::new(*o, *l)).collect();
    let nodes = fbb.create_vector(&nodes);
    let buffers = fbb.create_vector(&buffers);

    let mut rb = RecordBatchBuilder::new(&mut fbb);
    rb.add_length(length);
    rb.add_nodes(nodes);
    rb.add_buffers(buffers);
    let rb = rb.finish();

    let mut mb = MessageBuilder::new(&mut fbb);
    mb.add_version(MetadataVersion::V5);
    mb.add_header_type(MessageHeader::RecordBatch);
    mb.add_bodyLength(body.len() as i64);
    mb.add_header(rb.as_union_value());
    let root = mb.finish();
    fbb.finish(root, None);

    let mut meta = fbb.finished_data().to_vec();
    meta.resize(meta.len().div_ceil(8) * 8, 0);
    let mut out = Vec::new();
    out.extend_from_slice(&0xFFFF_FFFFu32.to_le_bytes());
    out.extend_from_slice(&(meta.len() as i32).to_le_bytes());
    out.extend_from_slice(&meta);
    out.extend_from_slice(body);
    out
}

/// Splits writer output into its individual stream frames (EOS excluded).
pub fn split_frames(bytes: &[u8]) -> Vec<Vec<u8>> {
    let mut frames = Vec::new();
    let mut pos = 0;
    while pos + 8 <= bytes.len() {
        let len = i32::from_le_bytes(bytes[pos + 4..pos + 8].try_into().unwrap()) as usize;
        if len == 0 {
            break;
        }
        let meta = &bytes[pos + 8..pos + 8 + len];
        let message = arrow_ipc::root_as_message(meta).unwrap();
        let end = pos + 8 + len + message.bodyLength() as usize;
        frames.push(bytes[pos..end].to_vec());
        pos = end;
    }
    frames
}

//! # Arrow IPC Table Stream Decoder
//!
//! Drives the frame reader through the message sequence of one IPC buffer and
//! yields decoded [`RecordBatch`] values in arrival order.
//!
//! - The first message must be a Schema. It is decoded once and held for the rest
//!   of the stream.
//! - DictionaryBatch messages are registered with the [`DictionaryResolver`].
//! - RecordBatch messages are decoded against the schema, and their dictionary
//!   columns are resolved when the dictionary is already known.
//!
//! Framing differences stop at the [`FrameReader`]; everything here is shared.

use std::sync::Arc;

use tracing::debug;

use crate::constants::LOG_TARGET;
use crate::enums::{BatchState, IPCContainer, IPCFraming, MessageType};
use crate::error::{IngestError, Result};
use crate::models::decoders::ipc::dictionary::DictionaryResolver;
use crate::models::decoders::ipc::parser::decode_record_batch;
use crate::models::decoders::ipc::protocol::FrameReader;
use crate::models::decoders::ipc::schema::{SchemaPlan, decode_schema};
use crate::models::types::logical::Schema;
use crate::models::types::record_batch::RecordBatch;
use crate::options::ReadOptions;

/// Decodes the record batches of an in-memory Arrow IPC buffer.
///
/// Implements `Iterator<Item = Result<RecordBatch>>`. The first error ends
/// iteration.
pub struct TableStreamDecoder<'a> {
    frames: FrameReader<'a>,
    plan: Option<SchemaPlan>,
    dictionaries: DictionaryResolver,
    state: BatchState,
    batch_index: usize,
    parallel: bool,
}

impl<'a> TableStreamDecoder<'a> {
    pub fn new(buf: &'a [u8], options: &ReadOptions) -> Self {
        Self {
            frames: FrameReader::new(buf, options),
            plan: None,
            dictionaries: DictionaryResolver::new(),
            state: BatchState::NeedSchema,
            batch_index: 0,
            parallel: options.use_parallel(),
        }
    }

    /// The stream's schema, reading the Schema message if it has not been read yet.
    pub fn schema(&mut self) -> Result<Arc<Schema>> {
        if self.state == BatchState::NeedSchema {
            self.read_schema()?;
        }
        self.plan
            .as_ref()
            .map(|p| p.schema.clone())
            .ok_or_else(|| IngestError::Protocol("stream has no schema".into()))
    }

    pub fn plan(&self) -> Option<&SchemaPlan> {
        self.plan.as_ref()
    }

    pub fn dictionaries(&self) -> &DictionaryResolver {
        &self.dictionaries
    }

    pub fn framing(&self) -> Option<IPCFraming> {
        self.frames.framing()
    }

    pub fn container(&self) -> IPCContainer {
        self.frames.container()
    }

    /// Record batches yielded so far.
    pub fn batches_read(&self) -> usize {
        self.batch_index
    }

    fn read_schema(&mut self) -> Result<()> {
        let frame = self.frames.next_frame()?.ok_or_else(|| {
            IngestError::Protocol("stream ended before a Schema message".into())
        })?;
        self.plan = Some(decode_schema(&frame)?);
        self.state = BatchState::Ready;
        Ok(())
    }

    fn step(&mut self) -> Result<Option<RecordBatch>> {
        loop {
            match self.state {
                BatchState::NeedSchema => self.read_schema()?,
                BatchState::Done => return Ok(None),
                BatchState::Ready => {
                    let Some(frame) = self.frames.next_frame()? else {
                        self.state = BatchState::Done;
                        debug!(
                            target: LOG_TARGET,
                            batches = self.batch_index,
                            dictionaries = self.dictionaries.len(),
                            "stream finished"
                        );
                        return Ok(None);
                    };
                    let plan = self
                        .plan
                        .as_ref()
                        .ok_or_else(|| IngestError::Protocol("stream has no schema".into()))?;
                    match frame.kind {
                        MessageType::Schema => {
                            return Err(IngestError::Protocol(format!(
                                "unexpected second Schema message at index {}",
                                frame.index
                            )));
                        }
                        MessageType::DictionaryBatch => {
                            self.dictionaries.ingest(plan, &frame)?;
                        }
                        MessageType::RecordBatch => {
                            let mut batch =
                                decode_record_batch(plan, &frame, self.batch_index, self.parallel)?;
                            self.dictionaries.try_resolve(&mut batch)?;
                            debug!(
                                target: LOG_TARGET,
                                batch = self.batch_index,
                                rows = batch.n_rows,
                                resolved = batch.is_resolved(),
                                "record batch"
                            );
                            self.batch_index += 1;
                            return Ok(Some(batch));
                        }
                    }
                }
            }
        }
    }

    /// Decodes the next record batch, or `Ok(None)` at end of stream.
    pub fn next_batch(&mut self) -> Result<Option<RecordBatch>> {
        let out = self.step();
        if out.is_err() {
            self.state = BatchState::Done;
        }
        out
    }
}

impl<'a> Iterator for TableStreamDecoder<'a> {
    type Item = Result<RecordBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_batch().transpose()
    }
}

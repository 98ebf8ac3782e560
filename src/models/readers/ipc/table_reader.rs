//! # Table Reader
//!
//! Entry point for ingesting an in-memory Arrow IPC buffer, in either framing,
//! into a [`Table`].

use std::sync::Arc;

use crate::constants::DEFAULT_TABLE_NAME;
use crate::enums::IPCFraming;
use crate::error::Result;
use crate::models::decoders::ipc::dictionary::DictionaryResolver;
use crate::models::decoders::ipc::table_stream::TableStreamDecoder;
use crate::models::sinks::table_assembler::TableAssembler;
use crate::models::types::logical::Schema;
use crate::models::types::record_batch::RecordBatch;
use crate::models::types::table::Table;
use crate::options::ReadOptions;

/// Reads one Arrow IPC buffer batch by batch or all at once.
pub struct TableReader<'a> {
    decoder: TableStreamDecoder<'a>,
    name: String,
}

impl<'a> TableReader<'a> {
    pub fn new(bytes: &'a [u8], options: ReadOptions) -> Self {
        Self {
            decoder: TableStreamDecoder::new(bytes, &options),
            name: options
                .table_name
                .unwrap_or_else(|| DEFAULT_TABLE_NAME.to_string()),
        }
    }

    /// Schema of the stream.
    pub fn schema(&mut self) -> Result<Arc<Schema>> {
        self.decoder.schema()
    }

    /// Framing detected (or hinted) for this buffer, once the first message is read.
    pub fn framing(&self) -> Option<IPCFraming> {
        self.decoder.framing()
    }

    /// Dictionaries registered so far.
    pub fn dictionaries(&self) -> &DictionaryResolver {
        self.decoder.dictionaries()
    }

    /// Next record batch, or `None` at end of stream.
    pub fn read_next(&mut self) -> Result<Option<RecordBatch>> {
        self.decoder.next_batch()
    }

    /// Every remaining record batch, in arrival order.
    ///
    /// Batches may still hold pending dictionary columns; fold them through a
    /// [`TableAssembler`] with [`Self::dictionaries`] to resolve them.
    pub fn read_all_batches(&mut self) -> Result<Vec<RecordBatch>> {
        let mut batches = Vec::new();
        while let Some(batch) = self.read_next()? {
            batches.push(batch);
        }
        Ok(batches)
    }

    /// Reads the remaining stream and assembles it into one table.
    pub fn combine_to_table(mut self) -> Result<Table> {
        let schema = self.schema()?;
        let mut assembler = TableAssembler::with_schema(self.name.clone(), schema);
        while let Some(batch) = self.read_next()? {
            assembler.push(batch)?;
        }
        assembler.finish(self.decoder.dictionaries())
    }
}

/// Decodes an Arrow IPC buffer, stream or legacy framing, into a table.
pub fn read_table(bytes: &[u8]) -> Result<Table> {
    read_table_with_options(bytes, &ReadOptions::default())
}

/// [`read_table`] with explicit options.
pub fn read_table_with_options(bytes: &[u8], options: &ReadOptions) -> Result<Table> {
    TableReader::new(bytes, options.clone()).combine_to_table()
}

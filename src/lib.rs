//! # tablestream
//!
//! Arrow IPC ingestion into typed, nullable columnar tables.
//!
//! Accepts a complete in-memory buffer in the current stream framing, the pre-0.15
//! legacy framing, or the Arrow file container, and decodes it into a [`Table`]
//! whose columns use a small set of [`LogicalType`]s.
//!
//! ```ignore
//! let table = tablestream::read_table(&bytes)?;
//! let prices = table.column("price").unwrap();
//! ```

pub mod models {
    pub mod decoders {
        pub mod ipc {
            pub mod dictionary;
            pub mod parser;
            pub mod protocol;
            pub mod schema;
            pub mod table_stream;
            pub mod type_map;
        }
    }
    pub mod frames {
        pub mod ipc_message;
    }
    pub mod readers {
        pub mod ipc {
            pub mod table_reader;
        }
    }
    pub mod sinks {
        pub mod table_assembler;
    }
    pub mod types {
        pub mod column;
        pub mod logical;
        pub mod record_batch;
        pub mod table;
        pub mod wire;
    }
}

pub mod constants;
pub mod enums;
pub mod error;
pub mod options;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use crate::enums::{IPCContainer, IPCFraming, MessageType};
pub use crate::error::{IngestError, Result};
pub use crate::models::decoders::ipc::dictionary::DictionaryResolver;
pub use crate::models::decoders::ipc::table_stream::TableStreamDecoder;
pub use crate::models::readers::ipc::table_reader::{
    TableReader, read_table, read_table_with_options,
};
pub use crate::models::sinks::table_assembler::TableAssembler;
pub use crate::models::types::column::{Column, ColumnData, StringArena, Value};
pub use crate::models::types::logical::{Field, LogicalType, Schema};
pub use crate::models::types::record_batch::RecordBatch;
pub use crate::models::types::table::Table;
pub use crate::options::ReadOptions;

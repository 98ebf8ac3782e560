// --- Constants for IPC format ---

pub const ARROW_MAGIC_NUMBER: &[u8] = b"ARROW1"; // closing magic
pub const ARROW_MAGIC_NUMBER_PADDED: &[u8] = b"ARROW1\0\0"; // opening magic
pub const FILE_OPENING_MAGIC_LEN: usize = 8;
pub const FOOTER_SIZE_PREFIX: usize = 4; // 4 bytes - <footer_size: int32>, before the closing magic
pub const MESSAGE_ALIGNMENT: usize = 8;
pub const CONTINUATION_MARKER_LEN: usize = 4; // 4 bytes - <continuation: 0xFFFFFFFF>
pub const CONTINUATION_SENTINEL: u32 = 0xFFFF_FFFF;
pub const METADATA_SIZE_PREFIX: usize = 4; // 4 bytes - <metadata_size: int32>

// --- Value conversion ---

pub const MILLIS_PER_SECOND: i64 = 1_000;
pub const MILLIS_PER_DAY: i64 = 86_400_000;
pub const MICROS_PER_MILLI: i64 = 1_000;
pub const NANOS_PER_MILLI: i64 = 1_000_000;

/// Default name given to assembled tables.
pub const DEFAULT_TABLE_NAME: &str = "ArrowTable";

/// `tracing` target for all decoder logs.
pub const LOG_TARGET: &str = "tablestream::ipc";

/// Arrow IPC message framing.
///
/// Both variants carry the same FlatBuffers metadata and body layout. They only
/// differ in the prefix written before each message's metadata length, in line
/// with the [Apache Arrow IPC specification](https://arrow.apache.org/docs/format/Columnar.html#encapsulated-message-format).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IPCFraming {
    /// Current stream framing: `0xFFFFFFFF` continuation marker, then an `int32` length.
    Stream,

    /// Pre-0.15 framing: a bare `int32` length with no continuation marker.
    Legacy,
}

/// Outer container of the input buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IPCContainer {
    /// A bare message stream.
    Stream,

    /// An Arrow file: `ARROW1\0\0` magic, an embedded stream, then a footer.
    File,
}

/// Arrow message types this decoder accepts.
///
/// Maps directly to message headers defined by the Arrow IPC specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    /// Schema definition message.
    Schema,

    /// Record batch payload.
    RecordBatch,

    /// Dictionary batch payload.
    DictionaryBatch,
}

/// State machine for stream message batching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    /// Schema has not yet been received.
    NeedSchema,

    /// Ready to emit batches.
    Ready,

    /// End of stream reached.
    Done,
}

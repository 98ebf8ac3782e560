//! # IPC Frame Structures
//!
//! One encapsulated Arrow IPC message as located by the
//! [`FrameReader`](crate::models::decoders::ipc::protocol::FrameReader).
//!
//! - [`IpcFrame`] borrows the FlatBuffers metadata block and the body buffer
//!   straight from the input, with no copy.
//! - [`FramePrefix`] records how many prefix bytes preceded the metadata, which
//!   differs between the stream and legacy framings.

use arrow_ipc::{Message, root_as_message};

use crate::enums::{IPCFraming, MessageType};
use crate::error::{IngestError, Result};

/// Prefix accounting for a single frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramePrefix {
    /// Continuation marker bytes: 4 for stream framing, 0 for legacy.
    pub marker_len: usize,
    /// Metadata length prefix bytes, always 4.
    pub size_len: usize,
}

impl FramePrefix {
    pub fn for_framing(framing: IPCFraming) -> Self {
        match framing {
            IPCFraming::Stream => Self {
                marker_len: 4,
                size_len: 4,
            },
            IPCFraming::Legacy => Self {
                marker_len: 0,
                size_len: 4,
            },
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.marker_len + self.size_len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An Arrow IPC message component of the input.
///
/// Wraps both the FlatBuffers-encoded message and its body payload.
#[derive(Debug, Clone, Copy)]
pub struct IpcFrame<'a> {
    /// FlatBuffers-encoded Arrow `Message`, already verified.
    pub metadata: &'a [u8],
    /// Columnar body payload, exactly `bodyLength` bytes.
    pub body: &'a [u8],
    pub kind: MessageType,
    pub prefix: FramePrefix,
    /// Byte offset of the frame's first prefix byte in the input.
    pub offset: usize,
    /// Zero-based message position in the stream.
    pub index: usize,
}

impl<'a> IpcFrame<'a> {
    /// Parses the metadata block into the generated `Message` view.
    pub fn message(&self) -> Result<Message<'a>> {
        root_as_message(self.metadata).map_err(|e| {
            IngestError::framing(
                self.offset + self.prefix.len(),
                format!("invalid message metadata: {e}"),
            )
        })
    }

    /// Total bytes this frame occupies in the input.
    pub fn frame_len(&self) -> usize {
        self.prefix.len() + self.metadata.len() + self.body.len()
    }
}

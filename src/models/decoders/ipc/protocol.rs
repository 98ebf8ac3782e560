//! Arrow IPC Frame Reader
//!
//! Splits an in-memory Arrow IPC buffer into encapsulated messages, as defined by the
//! [Apache Arrow Columnar IPC specification](https://arrow.apache.org/docs/format/Columnar.html#encapsulated-message-format).
//!
//! # Overview
//!
//! - **Stream framing**: every message starts with the `0xFFFFFFFF` continuation marker
//!   followed by an `int32` metadata length.
//! - **Legacy framing**: pre-0.15 writers emit the `int32` length with no marker.
//! - **File container**: the footer is read first. The Schema message sits after the
//!   padded `ARROW1` magic; dictionary and record batch messages are then visited at the
//!   block offsets the footer lists, with the same prefix handling as a stream.
//!
//! The framing is chosen once, from the first message prefix, and held for the rest of the
//! buffer.

use std::collections::VecDeque;

use arrow_ipc::{MessageHeader, root_as_footer, root_as_message};
use tracing::{debug, trace};

use crate::constants::{
    ARROW_MAGIC_NUMBER, ARROW_MAGIC_NUMBER_PADDED, CONTINUATION_MARKER_LEN,
    CONTINUATION_SENTINEL, FILE_OPENING_MAGIC_LEN, FOOTER_SIZE_PREFIX, LOG_TARGET,
    MESSAGE_ALIGNMENT, METADATA_SIZE_PREFIX,
};
use crate::enums::{IPCContainer, IPCFraming, MessageType};
use crate::error::{IngestError, Result};
use crate::models::frames::ipc_message::{FramePrefix, IpcFrame};
use crate::options::ReadOptions;
use crate::utils::{le_array, read_u32_le};

/// Iterates the messages of an Arrow IPC buffer.
///
/// Yields `Err` at most once; iteration ends after the first error.
pub struct FrameReader<'a> {
    buf: &'a [u8],
    pos: usize,
    framing: Option<IPCFraming>,
    container: IPCContainer,
    require_eos: bool,
    index: usize,
    saw_eos: bool,
    finished: bool,
    /// Footer blocks still to visit, file container only. `None` until the footer is read.
    blocks: Option<VecDeque<(usize, MessageType)>>,
}

impl<'a> FrameReader<'a> {
    pub fn new(buf: &'a [u8], options: &ReadOptions) -> Self {
        let (container, pos) = if Self::has_opening_file_magic(buf) {
            (IPCContainer::File, FILE_OPENING_MAGIC_LEN)
        } else {
            (IPCContainer::Stream, 0)
        };
        Self {
            buf,
            pos,
            framing: options.framing,
            container,
            require_eos: options.require_eos,
            index: 0,
            saw_eos: false,
            finished: false,
            blocks: None,
        }
    }

    /// Framing in effect, once known.
    pub fn framing(&self) -> Option<IPCFraming> {
        self.framing
    }

    pub fn container(&self) -> IPCContainer {
        self.container
    }

    /// Byte offset of the next unread frame.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// True once an end-of-stream marker has been read.
    pub fn saw_eos(&self) -> bool {
        self.saw_eos
    }

    #[inline]
    fn has_opening_file_magic(buf: &[u8]) -> bool {
        buf.len() >= FILE_OPENING_MAGIC_LEN
            && &buf[..FILE_OPENING_MAGIC_LEN] == ARROW_MAGIC_NUMBER_PADDED
    }

    #[inline]
    fn has_continuation_sentinel(buf: &[u8]) -> bool {
        buf.len() >= CONTINUATION_MARKER_LEN && read_u32_le(buf) == CONTINUATION_SENTINEL
    }

    /// Locks in the framing from the first prefix, unless a hint was given.
    fn resolve_framing(&mut self, rest: &[u8]) -> IPCFraming {
        if let Some(f) = self.framing {
            return f;
        }
        let framing = if Self::has_continuation_sentinel(rest) {
            IPCFraming::Stream
        } else {
            IPCFraming::Legacy
        };
        debug!(
            target: LOG_TARGET,
            ?framing,
            container = ?self.container,
            "detected IPC framing"
        );
        self.framing = Some(framing);
        framing
    }

    /// Reads the next frame. `Ok(None)` marks the end of the stream.
    pub fn next_frame(&mut self) -> Result<Option<IpcFrame<'a>>> {
        if self.finished {
            return Ok(None);
        }
        match self.container {
            IPCContainer::Stream => self.read_frame(),
            IPCContainer::File => self.next_file_frame(),
        }
    }

    fn next_file_frame(&mut self) -> Result<Option<IpcFrame<'a>>> {
        if self.blocks.is_none() {
            let blocks = self.read_footer()?;
            self.blocks = Some(blocks);
            self.pos = Self::skip_magic_padding(self.buf);
            return self.read_frame();
        }
        let Some((offset, expected)) = self.blocks.as_mut().and_then(VecDeque::pop_front) else {
            self.saw_eos = true;
            self.finished = true;
            trace!(target: LOG_TARGET, messages = self.index, "file blocks exhausted");
            return Ok(None);
        };
        self.pos = offset;
        let frame = self.read_frame()?.ok_or_else(|| {
            IngestError::framing(offset, "footer block does not point at a message")
        })?;
        if frame.kind != expected {
            return Err(IngestError::framing(
                offset,
                format!(
                    "footer lists a {expected:?} block, found a {:?} message",
                    frame.kind
                ),
            ));
        }
        Ok(Some(frame))
    }

    /// Parses the file footer and narrows the buffer to the message region before it.
    fn read_footer(&mut self) -> Result<VecDeque<(usize, MessageType)>> {
        let buf = self.buf;
        let len = buf.len();
        let tail = ARROW_MAGIC_NUMBER.len() + FOOTER_SIZE_PREFIX;
        if len < FILE_OPENING_MAGIC_LEN + tail
            || &buf[len - ARROW_MAGIC_NUMBER.len()..] != ARROW_MAGIC_NUMBER
        {
            return Err(IngestError::framing(
                len,
                "file container is missing its closing magic",
            ));
        }
        let size_at = len - tail;
        let footer_len = i32::from_le_bytes(le_array::<4>(&buf[size_at..]));
        let footer_start = usize::try_from(footer_len)
            .ok()
            .and_then(|n| size_at.checked_sub(n))
            .filter(|start| *start >= FILE_OPENING_MAGIC_LEN)
            .ok_or_else(|| {
                IngestError::framing(size_at, format!("footer length {footer_len} out of bounds"))
            })?;
        let footer = root_as_footer(&buf[footer_start..size_at]).map_err(|e| {
            IngestError::framing(footer_start, format!("invalid file footer: {e}"))
        })?;

        let mut blocks = VecDeque::new();
        for (list, kind) in [
            (footer.dictionaries(), MessageType::DictionaryBatch),
            (footer.recordBatches(), MessageType::RecordBatch),
        ] {
            for block in list.into_iter().flat_map(|v| v.iter()) {
                let offset = usize::try_from(block.offset())
                    .ok()
                    .filter(|o| *o < footer_start)
                    .ok_or_else(|| {
                        IngestError::framing(
                            footer_start,
                            format!("{kind:?} block offset {} out of bounds", block.offset()),
                        )
                    })?;
                blocks.push_back((offset, kind));
            }
        }
        debug!(
            target: LOG_TARGET,
            footer_start,
            blocks = blocks.len(),
            "read file footer"
        );
        self.buf = &buf[..footer_start];
        Ok(blocks)
    }

    /// First message position after the opening magic and its zero padding.
    fn skip_magic_padding(buf: &[u8]) -> usize {
        let mut pos = FILE_OPENING_MAGIC_LEN;
        while buf.len() >= pos + MESSAGE_ALIGNMENT
            && buf[pos..pos + MESSAGE_ALIGNMENT].iter().all(|b| *b == 0)
        {
            pos += MESSAGE_ALIGNMENT;
        }
        pos
    }

    /// Parses one frame at the current position.
    fn read_frame(&mut self) -> Result<Option<IpcFrame<'a>>> {
        let buf = self.buf;
        let start = self.pos;
        let rest = &buf[start..];

        if rest.is_empty() {
            self.finished = true;
            if self.require_eos {
                return Err(IngestError::framing(
                    start,
                    "buffer ended without an end-of-stream marker",
                ));
            }
            trace!(target: LOG_TARGET, offset = start, "buffer ended on a message boundary");
            return Ok(None);
        }
        if rest.len() < METADATA_SIZE_PREFIX {
            return Err(IngestError::framing(start, "truncated length prefix"));
        }

        let framing = self.resolve_framing(rest);
        let prefix = FramePrefix::for_framing(framing);
        let mut cursor = start;
        if framing == IPCFraming::Stream {
            if !Self::has_continuation_sentinel(rest) {
                return Err(IngestError::framing(
                    start,
                    "missing continuation marker in stream framing",
                ));
            }
            cursor += CONTINUATION_MARKER_LEN;
            if buf.len() - cursor < METADATA_SIZE_PREFIX {
                return Err(IngestError::framing(cursor, "truncated length prefix"));
            }
        }

        let meta_len = i32::from_le_bytes(le_array::<4>(&buf[cursor..]));
        cursor += METADATA_SIZE_PREFIX;
        if meta_len < 0 {
            return Err(IngestError::framing(
                start,
                format!("negative metadata length {meta_len}"),
            ));
        }
        if meta_len == 0 {
            self.saw_eos = true;
            self.finished = true;
            self.pos = cursor;
            trace!(target: LOG_TARGET, offset = start, messages = self.index, "end of stream");
            return Ok(None);
        }

        let meta_len = meta_len as usize;
        let meta_end = cursor + meta_len;
        if meta_end > buf.len() {
            return Err(IngestError::framing(
                cursor,
                format!(
                    "metadata of {meta_len} bytes truncated, {} available",
                    buf.len() - cursor
                ),
            ));
        }
        let metadata = &buf[cursor..meta_end];
        let message = root_as_message(metadata).map_err(|e| {
            IngestError::framing(cursor, format!("invalid message metadata: {e}"))
        })?;

        let kind = match message.header_type() {
            MessageHeader::Schema => MessageType::Schema,
            MessageHeader::RecordBatch => MessageType::RecordBatch,
            MessageHeader::DictionaryBatch => MessageType::DictionaryBatch,
            other => {
                return Err(IngestError::framing(
                    cursor,
                    format!("unrecognized message type {other:?}"),
                ));
            }
        };

        let body_len = message.bodyLength();
        if body_len < 0 {
            return Err(IngestError::framing(
                cursor,
                format!("negative body length {body_len}"),
            ));
        }
        let body_len = body_len as usize;
        let available = buf.len() - meta_end;
        if body_len > available {
            return Err(IngestError::framing(
                meta_end,
                format!("body of {body_len} bytes truncated, {available} available"),
            ));
        }
        let body = &buf[meta_end..meta_end + body_len];

        let frame = IpcFrame {
            metadata,
            body,
            kind,
            prefix,
            offset: start,
            index: self.index,
        };
        trace!(
            target: LOG_TARGET,
            index = self.index,
            offset = start,
            ?kind,
            body_len,
            "read frame"
        );
        self.pos = meta_end + body_len;
        self.index += 1;
        Ok(Some(frame))
    }
}

impl<'a> Iterator for FrameReader<'a> {
    type Item = Result<IpcFrame<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_frame() {
            Ok(Some(frame)) => Some(Ok(frame)),
            Ok(None) => None,
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{dict_fixture, file_bytes, int_fixture, legacy_bytes, stream_bytes};

    fn frames(buf: &[u8], options: &ReadOptions) -> Result<Vec<MessageType>> {
        FrameReader::new(buf, options)
            .map(|f| f.map(|f| f.kind))
            .collect()
    }

    #[test]
    fn test_stream_framing_detected() {
        let bytes = stream_bytes(&int_fixture(&[3]));
        let mut reader = FrameReader::new(&bytes, &ReadOptions::default());
        let kinds: Vec<_> = reader.by_ref().map(|f| f.unwrap().kind).collect();
        assert_eq!(kinds, vec![MessageType::Schema, MessageType::RecordBatch]);
        assert_eq!(reader.framing(), Some(IPCFraming::Stream));
        assert!(reader.saw_eos());
        assert_eq!(reader.position(), bytes.len());
    }

    #[test]
    fn test_legacy_framing_detected() {
        let bytes = legacy_bytes(&int_fixture(&[2, 2]));
        let mut reader = FrameReader::new(&bytes, &ReadOptions::default());
        let frames: Vec<_> = reader.by_ref().collect::<Result<_>>().unwrap();
        assert_eq!(frames.len(), 3);
        assert!(frames.iter().all(|f| f.prefix.marker_len == 0));
        assert_eq!(frames[2].index, 2);
        assert_eq!(reader.framing(), Some(IPCFraming::Legacy));
    }

    #[test]
    fn test_file_container_skips_magic_and_footer() {
        let bytes = file_bytes(&int_fixture(&[3]));
        // opening magic is padded past its 8 bytes
        assert_eq!(&bytes[..8], ARROW_MAGIC_NUMBER_PADDED);
        let reader = FrameReader::new(&bytes, &ReadOptions::default());
        assert_eq!(reader.container(), IPCContainer::File);
        assert_eq!(
            frames(&bytes, &ReadOptions::default()).unwrap(),
            vec![MessageType::Schema, MessageType::RecordBatch]
        );
    }

    #[test]
    fn test_file_container_follows_footer_blocks() {
        let bytes = file_bytes(&dict_fixture());
        let mut reader = FrameReader::new(&bytes, &ReadOptions::default());
        let frames: Vec<_> = reader.by_ref().collect::<Result<_>>().unwrap();
        assert_eq!(
            frames.iter().map(|f| f.kind).collect::<Vec<_>>(),
            vec![
                MessageType::Schema,
                MessageType::DictionaryBatch,
                MessageType::RecordBatch
            ]
        );
        assert!(frames[0].offset >= 8);
        assert!(frames.windows(2).all(|w| w[0].offset < w[1].offset));
        assert!(reader.saw_eos());

        let bytes = file_bytes(&int_fixture(&[1, 2, 3]));
        assert_eq!(self::frames(&bytes, &ReadOptions::default()).unwrap().len(), 4);
    }

    #[test]
    fn test_file_container_without_footer() {
        let bytes = file_bytes(&int_fixture(&[3]));
        let cut = &bytes[..bytes.len() - 3];
        assert!(matches!(
            frames(cut, &ReadOptions::default()),
            Err(IngestError::Framing { .. })
        ));

        // footer length pointing before the opening magic
        let mut bad = bytes.clone();
        let at = bad.len() - 10;
        bad[at..at + 4].copy_from_slice(&i32::MAX.to_le_bytes());
        assert!(matches!(
            frames(&bad, &ReadOptions::default()),
            Err(IngestError::Framing { offset, .. }) if offset == at
        ));
    }

    #[test]
    fn test_eos_only_buffers() {
        // stream EOS
        let stream_eos = [0xFF, 0xFF, 0xFF, 0xFF, 0, 0, 0, 0];
        assert!(frames(&stream_eos, &ReadOptions::default()).unwrap().is_empty());
        // legacy EOS
        assert!(frames(&[0, 0, 0, 0], &ReadOptions::default()).unwrap().is_empty());
        // bytes after EOS are ignored
        let mut trailing = stream_eos.to_vec();
        trailing.extend_from_slice(b"footer");
        assert!(frames(&trailing, &ReadOptions::default()).unwrap().is_empty());
    }

    #[test]
    fn test_missing_eos_policy() {
        let mut bytes = stream_bytes(&int_fixture(&[3]));
        bytes.truncate(bytes.len() - 8);
        assert_eq!(frames(&bytes, &ReadOptions::default()).unwrap().len(), 2);

        let strict = ReadOptions::default().with_require_eos(true);
        assert!(matches!(
            frames(&bytes, &strict),
            Err(IngestError::Framing { .. })
        ));
        assert!(matches!(
            frames(&[], &strict),
            Err(IngestError::Framing { offset: 0, .. })
        ));
    }

    #[test]
    fn test_truncation_is_framing_error() {
        let bytes = stream_bytes(&int_fixture(&[3]));
        for cut in [2, 6, 20, bytes.len() - 12] {
            let err = frames(&bytes[..cut], &ReadOptions::default()).unwrap_err();
            assert!(
                matches!(err, IngestError::Framing { .. }),
                "cut at {cut}: {err}"
            );
        }
    }

    #[test]
    fn test_negative_length_and_hint_mismatch() {
        // legacy hint on stream bytes reads the marker as length -1
        let bytes = stream_bytes(&int_fixture(&[1]));
        let legacy = ReadOptions::default().with_framing(IPCFraming::Legacy);
        assert!(matches!(
            frames(&bytes, &legacy),
            Err(IngestError::Framing { offset: 0, .. })
        ));

        let bytes = legacy_bytes(&int_fixture(&[1]));
        let stream = ReadOptions::default().with_framing(IPCFraming::Stream);
        assert!(matches!(
            frames(&bytes, &stream),
            Err(IngestError::Framing { .. })
        ));
    }

    #[test]
    fn test_garbage_metadata_is_framing_error() {
        let mut bytes = vec![0xFF, 0xFF, 0xFF, 0xFF, 8, 0, 0, 0];
        bytes.extend_from_slice(&[0xAB; 8]);
        assert!(matches!(
            frames(&bytes, &ReadOptions::default()),
            Err(IngestError::Framing { offset: 8, .. })
        ));
    }

    #[test]
    fn test_iterator_stops_after_error() {
        let mut reader = FrameReader::new(&[1, 2], &ReadOptions::default());
        assert!(reader.next().unwrap().is_err());
        assert!(reader.next().is_none());
    }
}

//! Raw traffic recording.

use std::sync::{Mutex, PoisonError};

use bytes::Bytes;
use mysql_codec::PacketObserver;

/// Which way a chunk travelled, from the client's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Received from the server.
    Read,
    /// Sent to the server.
    Write,
}

/// One observed transport operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedChunk {
    /// Direction of the bytes.
    pub direction: Direction,
    /// The bytes as they crossed the transport.
    pub data: Bytes,
}

/// [`PacketObserver`] that keeps everything it sees.
///
/// Chunks follow transport operations, not packet boundaries. Use
/// [`PacketRecorder::bytes`] to reassemble one direction.
#[derive(Debug, Default)]
pub struct PacketRecorder {
    chunks: Mutex<Vec<RecordedChunk>>,
}

impl PacketRecorder {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, direction: Direction, bytes: &[u8]) {
        self.chunks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedChunk {
                direction,
                data: Bytes::copy_from_slice(bytes),
            });
    }

    /// Snapshot of the recorded chunks.
    #[must_use]
    pub fn chunks(&self) -> Vec<RecordedChunk> {
        self.chunks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// All bytes seen in one direction, concatenated.
    #[must_use]
    pub fn bytes(&self, direction: Direction) -> Vec<u8> {
        self.chunks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|c| c.direction == direction)
            .flat_map(|c| c.data.iter().copied())
            .collect()
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        self.chunks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl PacketObserver for PacketRecorder {
    fn on_read(&self, bytes: &[u8]) {
        self.push(Direction::Read, bytes);
    }

    fn on_write(&self, bytes: &[u8]) {
        self.push(Direction::Write, bytes);
    }
}

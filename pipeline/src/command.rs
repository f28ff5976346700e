//! Serialized command storage for one frame slot.
//!
//! A [`CommandBuffer`] holds one frame's worth of serialized render
//! commands as raw bytes. Each command is framed with a fixed
//! [`CommandHeader`] followed by an opaque payload; the pipeline never
//! interprets payload bytes. Buffers are cleared and reused across frames,
//! preserving their allocation so steady-state frames do not reallocate.

use std::fmt;

use bytemuck::{Pod, Zeroable};
use static_assertions::const_assert_eq;

/// Framing header preceding every command payload in a buffer.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct CommandHeader {
    /// Opaque command type identifier, chosen by the rendering subsystem.
    pub kind: u32,
    /// Payload length in bytes.
    pub len: u32,
}

// The reader assumes a fixed 8-byte header when walking the byte stream.
const_assert_eq!(std::mem::size_of::<CommandHeader>(), 8);

const HEADER_SIZE: usize = std::mem::size_of::<CommandHeader>();

/// A command's capacity request could not be satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityError {
    /// Total buffer capacity in bytes that the write required.
    pub requested: usize,
}

impl fmt::Display for CapacityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "command buffer growth to {} bytes failed",
            self.requested
        )
    }
}

impl std::error::Error for CapacityError {}

/// Growable byte buffer holding serialized commands for one frame slot.
///
/// Exclusively owned by whichever role (fill or process) currently holds
/// the slot; the ring transfers ownership at frame boundaries, so a buffer
/// is never concurrently read and written. Grows on overflow and never
/// shrinks; [`CommandBuffer::clear`] keeps the allocation for reuse.
#[derive(Debug, Default)]
pub struct CommandBuffer {
    data: Vec<u8>,
    commands: usize,
    max_capacity: Option<usize>,
}

impl CommandBuffer {
    /// Create a buffer with the given initial capacity.
    ///
    /// `max_capacity` bounds growth; writes that would exceed it fail with
    /// [`CapacityError`]. `None` leaves growth bounded only by the
    /// allocator.
    pub fn with_capacity(initial: usize, max_capacity: Option<usize>) -> Self {
        Self {
            data: Vec::with_capacity(initial),
            commands: 0,
            max_capacity,
        }
    }

    /// Append one command.
    ///
    /// Fails only when the required capacity exceeds the configured cap or
    /// the allocator refuses the growth; the caller treats that as fatal.
    pub fn push(&mut self, kind: u32, payload: &[u8]) -> Result<(), CapacityError> {
        let required = self
            .data
            .len()
            .saturating_add(HEADER_SIZE)
            .saturating_add(payload.len());
        if let Some(cap) = self.max_capacity {
            if required > cap {
                return Err(CapacityError {
                    requested: required,
                });
            }
        }
        if required > self.data.capacity() {
            self.data
                .try_reserve(required - self.data.len())
                .map_err(|_| CapacityError {
                    requested: required,
                })?;
        }

        let header = CommandHeader {
            kind,
            len: payload.len() as u32,
        };
        self.data.extend_from_slice(bytemuck::bytes_of(&header));
        self.data.extend_from_slice(payload);
        self.commands += 1;
        Ok(())
    }

    /// Used length in bytes (headers plus payloads).
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the buffer holds no commands.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of commands currently stored.
    pub fn command_count(&self) -> usize {
        self.commands
    }

    /// Current capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    /// Clear the buffer, preserving its allocation.
    pub fn clear(&mut self) {
        self.data.clear();
        self.commands = 0;
    }

    /// Iterate stored commands in enqueue order.
    pub fn reader(&self) -> CommandReader<'_> {
        CommandReader {
            data: &self.data,
            offset: 0,
        }
    }
}

/// Iterator over `(kind, payload)` pairs in a [`CommandBuffer`].
///
/// Yields commands strictly in enqueue order.
#[derive(Debug)]
pub struct CommandReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Iterator for CommandReader<'a> {
    type Item = (u32, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        let remaining = &self.data[self.offset..];
        if remaining.len() < HEADER_SIZE {
            return None;
        }
        let header: CommandHeader = bytemuck::pod_read_unaligned(&remaining[..HEADER_SIZE]);
        let len = header.len as usize;
        if remaining.len() < HEADER_SIZE + len {
            // Truncated tail; a correctly framed buffer never hits this.
            return None;
        }
        let payload = &remaining[HEADER_SIZE..HEADER_SIZE + len];
        self.offset += HEADER_SIZE + len;
        Some((header.kind, payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_and_read_back_in_order() {
        let mut buffer = CommandBuffer::with_capacity(64, None);
        buffer.push(1, b"alpha").unwrap();
        buffer.push(2, b"").unwrap();
        buffer.push(3, b"gamma").unwrap();

        let commands: Vec<_> = buffer.reader().collect();
        assert_eq!(
            commands,
            vec![(1, b"alpha".as_slice()), (2, b"".as_slice()), (3, b"gamma".as_slice())]
        );
        assert_eq!(buffer.command_count(), 3);
    }

    #[test]
    fn byte_total_matches_framing() {
        let mut buffer = CommandBuffer::with_capacity(0, None);
        buffer.push(7, &[0xAB; 10]).unwrap();
        buffer.push(8, &[0xCD; 3]).unwrap();
        assert_eq!(buffer.len(), 2 * HEADER_SIZE + 13);

        let payload_total: usize = buffer.reader().map(|(_, p)| p.len()).sum();
        assert_eq!(payload_total, 13);
    }

    #[test]
    fn grows_past_initial_capacity() {
        let mut buffer = CommandBuffer::with_capacity(8, None);
        buffer.push(1, &[0u8; 128]).unwrap();
        assert!(buffer.capacity() >= 128 + HEADER_SIZE);
    }

    #[test]
    fn clear_keeps_allocation() {
        let mut buffer = CommandBuffer::with_capacity(0, None);
        buffer.push(1, &[0u8; 256]).unwrap();
        let capacity = buffer.capacity();
        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.command_count(), 0);
        assert_eq!(buffer.capacity(), capacity);
    }

    #[test]
    fn capacity_cap_rejects_growth() {
        let mut buffer = CommandBuffer::with_capacity(16, Some(16));
        buffer.push(1, &[0u8; 4]).unwrap();
        let err = buffer.push(2, &[0u8; 32]).unwrap_err();
        assert_eq!(err.requested, HEADER_SIZE + 4 + HEADER_SIZE + 32);
        // The failed push must not corrupt existing contents.
        assert_eq!(buffer.command_count(), 1);
        assert_eq!(buffer.reader().count(), 1);
    }

    #[test]
    fn empty_buffer_reads_nothing() {
        let buffer = CommandBuffer::with_capacity(0, None);
        assert_eq!(buffer.reader().count(), 0);
    }
}

//! Reassembly of the sorted LED color buffer from offset-keyed fragments.

use std::collections::BTreeMap;

use ambient_shared::BYTES_PER_LED;

/// Largest buffer accepted from the wire: every LED a `u16` index can
/// address.
pub const MAX_BUFFER_BYTES: usize = u16::MAX as usize * BYTES_PER_LED;

/// Latest fragment per byte offset, plus the buffer they reassemble into.
#[derive(Debug, Clone)]
pub struct ColorReassembler {
    fragments: BTreeMap<usize, Vec<u8>>,
    buffer: Vec<u8>,
    max_bytes: usize,
}

impl Default for ColorReassembler {
    fn default() -> Self {
        Self::with_limit(MAX_BUFFER_BYTES)
    }
}

impl ColorReassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// A reassembler that rejects fragments reaching past `max_bytes`.
    pub fn with_limit(max_bytes: usize) -> Self {
        Self {
            fragments: BTreeMap::new(),
            buffer: Vec::new(),
            max_bytes,
        }
    }

    /// Store `fragment` at `offset` (replacing any fragment already there)
    /// and return the rebuilt buffer.
    ///
    /// The buffer is `max(offset + len)` bytes long, zero where no fragment
    /// covers it. Fragments are copied in ascending offset order, so where
    /// two overlap the one with the higher offset wins.
    ///
    /// A fragment ending past the limit is logged and dropped; the buffer
    /// is returned unchanged.
    pub fn ingest(&mut self, offset: usize, fragment: Vec<u8>) -> &[u8] {
        let in_range = match offset.checked_add(fragment.len()) {
            Some(end) => end <= self.max_bytes,
            None => false,
        };
        if !in_range {
            tracing::warn!(
                offset,
                len = fragment.len(),
                max_bytes = self.max_bytes,
                "dropping LED color fragment outside the buffer"
            );
            return &self.buffer;
        }
        self.fragments.insert(offset, fragment);

        let len = self
            .fragments
            .iter()
            .map(|(offset, bytes)| offset + bytes.len())
            .max()
            .unwrap_or(0);

        self.buffer.clear();
        self.buffer.resize(len, 0);
        for (&offset, bytes) in &self.fragments {
            self.buffer[offset..offset + bytes.len()].copy_from_slice(bytes);
        }
        &self.buffer
    }

    /// The current buffer, untruncated.
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// The current buffer cut to at most `max_leds` LEDs. Never reassembles.
    pub fn truncated(&self, max_leds: usize) -> &[u8] {
        let cap = max_leds.saturating_mul(BYTES_PER_LED);
        &self.buffer[..self.buffer.len().min(cap)]
    }

    pub fn fragment_count(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn clear(&mut self) {
        self.fragments.clear();
        self.buffer.clear();
    }
}

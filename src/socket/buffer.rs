//! The fixed-size read-ahead buffer from `spec.md` §3 ("readBuffer: a
//! fixed-size byte array... with `len` and `offset`; when `len > 0`, reads
//! return from the buffer first before touching the underlying
//! transport").
//!
//! A `recv`/`brecv` call is rarely asked for exactly the number of bytes
//! the kernel handed back in one `read(2)`; this buffer lets a caller ask
//! for "give me one line" or "give me N bytes" without the socket losing
//! whatever came after the requested slice in the same packet.

const DEFAULT_CAPACITY: usize = 4096;

/// Bytes read ahead of what's been consumed, with a capacity fixed at
/// construction time (`spec.md`'s default is 4096; `Socket::new` may size
/// it differently for UNIX sockets carrying large datagrams).
pub struct ReadBuffer {
    data: Vec<u8>,
    offset: usize,
    len: usize,
}

impl ReadBuffer {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        ReadBuffer {
            data: vec![0u8; capacity],
            offset: 0,
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Bytes currently buffered and not yet consumed.
    pub fn available(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The unconsumed slice, for callers that want to scan it (e.g. for a
    /// line terminator) without consuming anything yet.
    pub fn peek(&self) -> &[u8] {
        &self.data[self.offset..self.offset + self.len]
    }

    /// Consume up to `n` bytes from the front of the buffer into `out`,
    /// returning how many were actually taken (at most `available()`).
    pub fn take(&mut self, out: &mut Vec<u8>, n: usize) -> usize {
        let take_n = n.min(self.len);
        out.extend_from_slice(&self.data[self.offset..self.offset + take_n]);
        self.offset += take_n;
        self.len -= take_n;
        if self.len == 0 {
            self.offset = 0;
        }
        take_n
    }

    /// Discard `n` already-peeked bytes without copying them anywhere
    /// (used once a line terminator has been located via `peek`).
    pub fn consume(&mut self, n: usize) {
        let n = n.min(self.len);
        self.offset += n;
        self.len -= n;
        if self.len == 0 {
            self.offset = 0;
        }
    }

    /// The empty tail of the backing array available for a fresh
    /// `read(2)`, compacting first if the consumed prefix is in the way.
    pub fn spare_capacity_mut(&mut self) -> &mut [u8] {
        if self.offset > 0 {
            self.data.copy_within(self.offset..self.offset + self.len, 0);
            self.offset = 0;
        }
        &mut self.data[self.len..]
    }

    /// Record that `n` freshly read bytes landed in the spare capacity
    /// returned by [`Self::spare_capacity_mut`].
    pub fn fill(&mut self, n: usize) {
        self.len += n;
        debug_assert!(self.offset + self.len <= self.data.len());
    }
}

impl Default for ReadBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_consumes_front_and_reports_actual_count() {
        let mut buf = ReadBuffer::with_capacity(16);
        let spare = buf.spare_capacity_mut();
        spare[..5].copy_from_slice(b"hello");
        buf.fill(5);

        let mut out = Vec::new();
        let n = buf.take(&mut out, 3);
        assert_eq!(n, 3);
        assert_eq!(out, b"hel");
        assert_eq!(buf.available(), 2);

        let mut rest = Vec::new();
        let n2 = buf.take(&mut rest, 10);
        assert_eq!(n2, 2);
        assert_eq!(rest, b"lo");
        assert!(buf.is_empty());
    }

    #[test]
    fn peek_then_consume_does_not_copy() {
        let mut buf = ReadBuffer::with_capacity(16);
        let spare = buf.spare_capacity_mut();
        spare[..4].copy_from_slice(b"ABCD");
        buf.fill(4);

        assert_eq!(buf.peek(), b"ABCD");
        buf.consume(2);
        assert_eq!(buf.peek(), b"CD");
    }

    #[test]
    fn spare_capacity_compacts_after_partial_consume() {
        let mut buf = ReadBuffer::with_capacity(8);
        let spare = buf.spare_capacity_mut();
        spare[..6].copy_from_slice(b"ABCDEF");
        buf.fill(6);
        let mut out = Vec::new();
        buf.take(&mut out, 4);

        // two bytes ("EF") remain; spare_capacity_mut should compact them
        // to the front, exposing 6 bytes of room rather than 2.
        let spare2 = buf.spare_capacity_mut();
        assert_eq!(spare2.len(), 6);
        assert_eq!(buf.peek(), b"EF");
    }
}

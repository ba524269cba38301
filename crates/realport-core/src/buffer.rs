//! Owned outbound buffer with an unsent cursor.

/// Holds one packet read from the device while it is offered to the
/// network.
///
/// A send may accept only part of the packet.  The cursor records how much
/// has been accepted so the next attempt offers exactly the remainder; a
/// send that would block leaves the cursor where it is.
#[derive(Debug, Clone, Default)]
pub struct SendBuffer {
    data: Vec<u8>,
    sent: usize,
}

impl SendBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            sent: 0,
        }
    }

    /// Replaces the contents with `bytes` and rewinds the cursor.
    pub fn load(&mut self, bytes: &[u8]) {
        self.data.clear();
        self.data.extend_from_slice(bytes);
        self.sent = 0;
    }

    /// The bytes not yet accepted by the network.
    pub fn remaining(&self) -> &[u8] {
        &self.data[self.sent..]
    }

    /// Marks `n` more bytes as accepted.  Clamped to the packet length.
    pub fn advance(&mut self, n: usize) {
        self.sent = (self.sent + n).min(self.data.len());
    }

    pub fn is_drained(&self) -> bool {
        self.sent >= self.data.len()
    }

    /// First byte of the loaded packet, regardless of the cursor.
    pub fn first_byte(&self) -> Option<u8> {
        self.data.first().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_sends_walk_the_cursor() {
        // Arrange
        let mut buf = SendBuffer::with_capacity(16);
        buf.load(b"abcdef");

        // Act
        buf.advance(2);
        let after_first = buf.remaining().to_vec();
        buf.advance(3);
        let after_second = buf.remaining().to_vec();
        buf.advance(1);

        // Assert
        assert_eq!(after_first, b"cdef");
        assert_eq!(after_second, b"f");
        assert!(buf.is_drained());
    }

    #[test]
    fn test_advance_is_clamped() {
        let mut buf = SendBuffer::with_capacity(4);
        buf.load(b"ab");
        buf.advance(10);
        assert!(buf.is_drained());
        assert!(buf.remaining().is_empty());
    }

    #[test]
    fn test_load_rewinds() {
        let mut buf = SendBuffer::with_capacity(4);
        buf.load(b"xyz");
        buf.advance(3);

        buf.load(b"12");

        assert_eq!(buf.remaining(), b"12");
        assert_eq!(buf.first_byte(), Some(b'1'));
    }

    #[test]
    fn test_empty_buffer_is_drained() {
        let buf = SendBuffer::default();
        assert!(buf.is_drained());
        assert!(buf.remaining().is_empty());
        assert_eq!(buf.first_byte(), None);
    }
}

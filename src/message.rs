//! Byte collections with efficient operations for protocols.
//!
//! This module implements the [`Message`] collection.

use std::fmt::Display;

/// Bytes reserved in front of a new message body so that every layer can
/// prepend its header without reallocating. The full header chain is
/// 14 (Ethernet) + 20 (IPv4) + 8 (UDP) = 42 bytes.
const HEADROOM: usize = 64;

/// A byte region with efficient operations for implementing protocols.
///
/// When writing a networking protocol, it is standard to prepend headers,
/// strip headers, pad frames, and split payloads into fragments. A message
/// provides these operations over a single owned allocation with headroom on
/// both ends. Header insertion and removal are symmetric: a layer that
/// prepends `n` bytes on the send path is matched by the same layer removing
/// `n` bytes on the receive path.
///
/// Cloning a message deep-copies its contents, which is what a protocol needs
/// when a buffer has to outlive the caller, such as when it is queued while
/// waiting for address resolution.
#[derive(Debug, Clone, Default)]
pub struct Message {
    data: Vec<u8>,
    start: usize,
    end: usize,
}

impl Message {
    /// Creates a new message with the given body content.
    ///
    /// # Examples
    ///
    /// ```
    /// # use lanstack::Message;
    /// let message = Message::new(b"Body");
    /// ```
    pub fn new(body: impl AsRef<[u8]>) -> Self {
        let body = body.as_ref();
        let mut data = vec![0u8; HEADROOM + body.len()];
        data[HEADROOM..].copy_from_slice(body);
        Self {
            data,
            start: HEADROOM,
            end: HEADROOM + body.len(),
        }
    }

    /// Prepends the given header bytes.
    ///
    /// # Examples
    ///
    /// ```
    /// # use lanstack::Message;
    /// let mut message = Message::new(b"Body");
    /// message.header(b"Header");
    /// assert_eq!(message.as_slice(), b"HeaderBody");
    /// ```
    pub fn header(&mut self, header: impl AsRef<[u8]>) {
        let header = header.as_ref();
        self.expand_front(header.len());
        self.data[self.start..self.start + header.len()].copy_from_slice(header);
    }

    /// Grows the message backward by `len` bytes without writing them. The
    /// revealed bytes keep whatever the backing store holds, so a layer that
    /// previously called [`Message::remove_front`] on this same message gets
    /// its stripped header back intact.
    pub fn expand_front(&mut self, len: usize) {
        if len <= self.start {
            self.start -= len;
        } else {
            let extra = len - self.start;
            let mut data = vec![0u8; self.data.len() + extra];
            data[extra..].copy_from_slice(&self.data);
            self.data = data;
            self.end += extra;
            self.start = 0;
        }
    }

    /// Removes the first `len` bytes of the message.
    pub fn remove_front(&mut self, len: usize) {
        assert!(len <= self.len());
        self.start += len;
    }

    /// Appends `len` zero bytes to the tail of the message.
    pub fn pad(&mut self, len: usize) {
        if self.end + len <= self.data.len() {
            self.data[self.end..self.end + len].fill(0);
        } else {
            self.data.resize(self.end + len, 0);
        }
        self.end += len;
    }

    /// Removes the last `len` bytes of the message, undoing padding once an
    /// inner length field has revealed the true size.
    pub fn trim_back(&mut self, len: usize) {
        assert!(len <= self.len());
        self.end -= len;
    }

    /// Removes the first `len` bytes from the message and returns them as a
    /// new message.
    pub fn cut(&mut self, len: usize) -> Self {
        assert!(len <= self.len());
        let cut = Self::new(&self.data[self.start..self.start + len]);
        self.start += len;
        cut
    }

    /// The length of the message.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether the message contains no bytes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The current logical contents of the message.
    pub fn as_slice(&self) -> &[u8] {
        &self.data[self.start..self.end]
    }

    /// Returns an iterator over the bytes of the message.
    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        self.as_slice().iter().copied()
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.as_slice().to_vec()
    }
}

impl Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for byte in self.iter() {
            write!(f, "{byte:x} ")?;
        }
        Ok(())
    }
}

impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl Eq for Message {}

impl From<Vec<u8>> for Message {
    fn from(val: Vec<u8>) -> Self {
        Message::new(val)
    }
}

impl From<&[u8]> for Message {
    fn from(val: &[u8]) -> Self {
        Message::new(val)
    }
}

impl<const L: usize> From<[u8; L]> for Message {
    fn from(val: [u8; L]) -> Self {
        Message::new(val)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_message() {
        let body = b"body";
        let message = Message::new(body);
        assert_eq!(message.len(), body.len());
        assert_eq!(&message.to_vec(), body);
    }

    #[test]
    fn header() {
        let mut message = Message::new(b"body");
        message.header("header");
        let expected = b"headerbody";
        assert_eq!(message.len(), expected.len());
        assert_eq!(&message.to_vec(), expected);
    }

    #[test]
    fn remove_headers() {
        let expected = b"body";
        let mut message = Message::new(expected);
        message.header(b"ipv4");
        message.header(b"udp");
        message.remove_front(3);
        message.remove_front(4);
        assert_eq!(message.len(), expected.len());
        assert_eq!(&message.to_vec(), expected);
    }

    #[test]
    fn expand_front_restores_stripped_header() {
        let mut message = Message::new(b"payload");
        message.header(b"inner header");
        message.remove_front(12);
        assert_eq!(message.as_slice(), b"payload");
        message.expand_front(12);
        assert_eq!(message.as_slice(), b"inner headerpayload");
    }

    #[test]
    fn expand_front_past_headroom() {
        let mut message = Message::new(b"x");
        message.expand_front(HEADROOM + 10);
        assert_eq!(message.len(), HEADROOM + 11);
    }

    #[test]
    fn padding_round_trip() {
        let mut message = Message::new(b"short");
        message.pad(41);
        assert_eq!(message.len(), 46);
        assert!(message.iter().skip(5).all(|byte| byte == 0));
        message.trim_back(41);
        assert_eq!(message.as_slice(), b"short");
    }

    #[test]
    fn cut() {
        let mut a = Message::new("Hello, world");
        let b = a.cut(5);
        assert_eq!(a, Message::new(", world"));
        assert_eq!(b, Message::new("Hello"));
    }

    #[test]
    fn cut_keeps_headroom() {
        let mut a = Message::new("Hello, world");
        let mut b = a.cut(5);
        b.header(b"hdr");
        assert_eq!(b.as_slice(), b"hdrHello");
    }

    #[test]
    fn clone_is_deep() {
        let mut a = Message::new(b"original");
        let b = a.clone();
        a.remove_front(3);
        assert_eq!(b.as_slice(), b"original");
    }

    #[test]
    fn empty_message() {
        let message = Message::new("");
        assert!(message.is_empty());
        assert_eq!(&message.to_vec(), b"");
    }
}

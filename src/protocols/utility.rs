//! Contains utilities for implementing protocols.

use super::ipv4::Ipv4Address;
use crate::network::Mac;

/// A calculator for the one's complement checksum used by the UDP and IP
/// protocols. Byte slices that are logically but not physically contiguous,
/// such as the UDP pseudo header followed by the real header and payload, can
/// be folded into the accumulator one piece at a time without ever being
/// copied next to each other.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Checksum(u16);

impl Checksum {
    /// Creates a new checksum calculator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a `u16` to the checksum value.
    pub fn add_u16(&mut self, value: u16) {
        let (sum, carry) = self.0.overflowing_add(value);
        self.0 = sum + carry as u16;
    }

    /// Adds a `u16` formed by two `u8`s to the checksum value.
    pub fn add_u8(&mut self, a: u8, b: u8) {
        self.add_u16(u16::from_be_bytes([a, b]));
    }

    /// Adds two `u16`s to the checksum value by splitting a `u32` in half.
    pub fn add_u32(&mut self, value: [u8; 4]) {
        self.add_u8(value[0], value[1]);
        self.add_u8(value[2], value[3]);
    }

    /// Repeatedly gets the next two bytes as a `u16` from a byte iterator. If
    /// the `payload` contains an odd number of bytes, the last `u8` will be
    /// paired with a zero byte.
    pub fn accumulate_remainder(&mut self, mut payload: impl Iterator<Item = u8>) {
        while let Some(a) = payload.next() {
            self.add_u8(a, payload.next().unwrap_or(0));
        }
    }

    /// Computes the final checksum value.
    pub fn as_u16(&self) -> u16 {
        match self.0 {
            // Use that there are two one's complement representations of zero
            // and pick the nonzero one to differentiate from an unused
            // checksum.
            0xffff => 0xffff,
            sum => !sum,
        }
    }
}

/// A host-and-port pair identifying one end of a UDP exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Endpoint {
    pub address: Ipv4Address,
    pub port: u16,
}

impl Endpoint {
    pub const fn new(address: Ipv4Address, port: u16) -> Self {
        Self { address, port }
    }
}

/// An extension trait for `Iterator<Item = u8>` that reads fixed-width
/// big-endian fields through a bounds-checked cursor. Parsers get a decode
/// failure on truncated input instead of undefined behavior.
///
/// # Example
///
/// ```ignore
/// let arr = [0xFF, 0x01, 0x09, 0x69];
/// let mut iter = arr.iter().cloned();
/// assert_eq!(iter.next_u16_be(), Some(0xFF01));
/// assert_eq!(iter.next_u8(), Some(0x09));
/// assert_eq!(iter.next_u32_be(), None); // not enough bytes left
/// ```
pub trait BytesExt: Iterator<Item = u8> {
    /// Advances the iterator and returns the next value.
    /// Functions identically to `Iterator<Item = u8>::next`.
    fn next_u8(&mut self) -> Option<u8> {
        self.next()
    }

    /// Advances the iterator by 2 bytes.
    /// Combines these 2 bytes in big-endian order into a u16.
    /// Returns None if there were fewer than 2 bytes left in the iterator.
    fn next_u16_be(&mut self) -> Option<u16> {
        let arr = [self.next()?, self.next()?];
        Some(u16::from_be_bytes(arr))
    }

    /// Advances the iterator by 4 bytes.
    /// Combines these 4 bytes in big-endian order into a u32.
    /// Returns None if there were fewer than 4 bytes left in the iterator.
    fn next_u32_be(&mut self) -> Option<u32> {
        let arr = [self.next()?, self.next()?, self.next()?, self.next()?];
        Some(u32::from_be_bytes(arr))
    }

    /// Advances the iterator by 4 bytes and combines them into an
    /// [`Ipv4Address`].
    fn next_ipv4addr(&mut self) -> Option<Ipv4Address> {
        self.next_u32_be().map(Ipv4Address::from)
    }

    /// Advances the iterator by 6 bytes and combines them into a [`Mac`].
    fn next_mac(&mut self) -> Option<Mac> {
        self.next_n::<6>().map(Mac::new)
    }

    /// Collects the next `N` items of the iterator into an array.
    /// Returns `None` if there were fewer than `N` bytes left in the iterator.
    fn next_n<const N: usize>(&mut self) -> Option<[u8; N]> {
        let mut result = [0; N];
        for element in &mut result {
            *element = self.next()?
        }
        Some(result)
    }
}

impl<T: Iterator<Item = u8>> BytesExt for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_ext() {
        let arr = [0xFF, 0x01, 0x09, 0x69];
        let mut iter = arr.iter().cloned();
        assert_eq!(iter.next_u16_be(), Some(0xFF01));
        assert_eq!(iter.next_u8(), Some(0x09));
        assert_eq!(iter.next_u32_be(), None);
    }

    #[test]
    fn bytes_ext_mac() {
        let arr = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07];
        let mut iter = arr.iter().cloned();
        assert_eq!(
            iter.next_mac(),
            Some(Mac::new([0x01, 0x02, 0x03, 0x04, 0x05, 0x06]))
        );
        assert_eq!(iter.next_mac(), None);
    }

    #[test]
    fn checksum_validates_its_own_output() {
        // A verifier that re-adds every word of a checksummed region along
        // with the transmitted checksum must come out with the same value it
        // would compute with the field zeroed.
        let words = [0x4500u16, 0x0054, 0xbeef, 0x4000, 0x4011];
        let mut build = Checksum::new();
        for word in words {
            build.add_u16(word);
        }
        let transmitted = build.as_u16();

        let mut verify = Checksum::new();
        for word in words {
            verify.add_u16(word);
        }
        assert_eq!(verify.as_u16(), transmitted);
    }

    #[test]
    fn checksum_odd_remainder() {
        let mut even = Checksum::new();
        even.add_u8(0xab, 0x00);
        let mut odd = Checksum::new();
        odd.accumulate_remainder([0xab].into_iter());
        assert_eq!(even.as_u16(), odd.as_u16());
    }
}

use std::io::{self, ErrorKind};

use bitcoin::consensus::{encode, Decodable, Encodable};
use serde::{Deserialize, Serialize};

// Upper bound on what a length prefix alone may make us allocate up front.
const MAX_PREALLOCATION: usize = 1024;

/// Sequence prefixed by its CompactSize element count.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct CompactVec<T>(Vec<T>);

impl<T> CompactVec<T> {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.0.iter()
    }

    pub fn into_inner(self) -> Vec<T> {
        self.0
    }
}

impl<T: Encodable> Encodable for CompactVec<T> {
    fn consensus_encode<W: io::Write + ?Sized>(&self, w: &mut W) -> Result<usize, io::Error> {
        let mut len = encode::VarInt(self.0.len() as u64).consensus_encode(w)?;
        for item in self.0.iter() {
            len += item.consensus_encode(w)?;
        }
        Ok(len)
    }
}

impl<T: Decodable> Decodable for CompactVec<T> {
    fn consensus_decode<R: io::Read + ?Sized>(r: &mut R) -> Result<Self, encode::Error> {
        let len = encode::VarInt::consensus_decode(r)?.0;
        let capacity = usize::try_from(len)
            .unwrap_or(MAX_PREALLOCATION)
            .min(MAX_PREALLOCATION);
        let mut ret = Vec::with_capacity(capacity);
        for _ in 0..len {
            ret.push(Decodable::consensus_decode(r)?);
        }
        Ok(CompactVec(ret))
    }
}

impl<T> From<Vec<T>> for CompactVec<T> {
    fn from(v: Vec<T>) -> Self {
        Self(v)
    }
}

impl<T> AsRef<Vec<T>> for CompactVec<T> {
    fn as_ref(&self) -> &Vec<T> {
        &self.0
    }
}

impl<'a, T> IntoIterator for &'a CompactVec<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Variable-length unsigned integer laid out like the Bitcoin Core `VARINT`:
/// base-128, most significant group first, every continuation group offset by one
/// so that each value has exactly one encoding.
///
/// This is not the CompactSize prefix that rust-bitcoin calls `VarInt`
/// (see [issue #1016](https://github.com/rust-bitcoin/rust-bitcoin/issues/1016)).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VarInt(pub u64);

impl Encodable for VarInt {
    fn consensus_encode<W: io::Write + ?Sized>(&self, writer: &mut W) -> Result<usize, io::Error> {
        let mut n = self.0;
        let mut tmp = [0u8; 10];
        let mut len = 0;

        loop {
            tmp[len] = ((n & 0x7F) | if len > 0 { 0x80 } else { 0x00 }) as u8;
            len += 1;
            if n <= 0x7F {
                break;
            }
            n = (n >> 7) - 1;
        }

        tmp[..len].reverse();
        writer.write_all(&tmp[..len])?;
        Ok(len)
    }
}

impl Decodable for VarInt {
    fn consensus_decode<R: io::Read + ?Sized>(reader: &mut R) -> Result<Self, encode::Error> {
        let mut n = 0u64;

        loop {
            let mut buf = [0u8; 1];
            reader.read_exact(&mut buf)?;
            let ch_data = buf[0];
            if n > (u64::MAX >> 7) {
                return Err(encode::Error::Io(io::Error::new(
                    ErrorKind::InvalidInput,
                    "VarInt: size too large",
                )));
            }
            n = (n << 7) | (ch_data & 0x7F) as u64;
            if ch_data & 0x80 != 0 {
                if n == u64::MAX {
                    return Err(encode::Error::Io(io::Error::new(
                        ErrorKind::InvalidInput,
                        "VarInt: size too large",
                    )));
                }
                n += 1;
            } else {
                break;
            }
        }

        Ok(VarInt(n))
    }
}

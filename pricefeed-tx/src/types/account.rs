use std::{fmt, io, str::FromStr};

use bitcoin::{
    consensus::{encode, Decodable, Encodable},
    hashes::{hash160, Hash},
};
use serde::{Deserialize, Serialize};

/// 20-byte key id of an account: hash160 of the owner's serialized public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct AccountId(pub [u8; 20]);

impl AccountId {
    pub fn from_pubkey(pubkey: &[u8]) -> Self {
        Self(hash160::Hash::hash(pubkey).to_byte_array())
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl Encodable for AccountId {
    fn consensus_encode<W: io::Write + ?Sized>(&self, w: &mut W) -> Result<usize, io::Error> {
        w.write_all(&self.0)?;
        Ok(self.0.len())
    }
}

impl Decodable for AccountId {
    fn consensus_decode<R: io::Read + ?Sized>(r: &mut R) -> Result<Self, encode::Error> {
        let mut buf = [0u8; 20];
        r.read_exact(&mut buf)?;
        Ok(Self(buf))
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for AccountId {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut buf = [0u8; 20];
        hex::decode_to_slice(s, &mut buf)?;
        Ok(Self(buf))
    }
}

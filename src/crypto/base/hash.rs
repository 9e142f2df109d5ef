use crate::{
    error::{Error, Result},
    util::ser::{self, Binary},
};
#[cfg(test)]
use rand::{rngs::OsRng, RngCore};
use rasn::{AsnType, Decode, Decoder, Encode, Encoder};
use serde_derive::{Deserialize, Serialize};
use std::ops::Deref;

/// A cryptographic hash. By defining this as an enum, we allow expansion of
/// hash algorithms in the future.
///
/// When stringified, the hash is in the format `base64([<hash bytes>|<u8 tag>])`
/// where the `tag` is the specific hash algorithm we use. This allows the hash
/// to shine on its own without the tag getting in the way.
#[derive(Clone, Debug, PartialEq, Eq, AsnType, Encode, Decode, Serialize, Deserialize)]
#[rasn(choice)]
pub enum Hash {
    /// Blake3 256bit hash
    #[rasn(tag(explicit(0)))]
    Blake3(Binary<32>),
}

impl Hash {
    /// Create a new blake3 (256 bit) hash from a message
    pub fn new_blake3(message: &[u8]) -> Result<Self> {
        let hash = blake3::hash(message);
        Ok(Self::Blake3(Binary::new(*hash.as_bytes())))
    }

    #[cfg(test)]
    pub(crate) fn random_blake3() -> Self {
        let mut randbuf = [0u8; 32];
        OsRng.fill_bytes(&mut randbuf);
        Self::Blake3(Binary::new(randbuf))
    }

    /// Return the byte slice representing this hash.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Blake3(bin) => bin.deref(),
        }
    }

    /// The string form: base64 of the hash bytes with the algorithm tag
    /// appended.
    pub fn as_string(&self) -> String {
        let mut bytes = Vec::from(self.as_bytes());
        let tag: u8 = match self {
            Hash::Blake3(..) => 0,
        };
        bytes.push(tag);
        ser::base64_encode(&bytes[..])
    }
}

impl TryFrom<&Hash> for String {
    type Error = Error;

    fn try_from(hash: &Hash) -> std::result::Result<Self, Self::Error> {
        Ok(hash.as_string())
    }
}

impl TryFrom<&str> for Hash {
    type Error = Error;

    fn try_from(string: &str) -> std::result::Result<Self, Self::Error> {
        let mut bytes = ser::base64_decode(string.as_bytes())?;
        let tag = bytes.pop().ok_or(Error::BadLength)?;
        match tag {
            _ => {
                let arr: [u8; 32] = bytes.as_slice().try_into().map_err(|_| Error::BadLength)?;
                Ok(Self::Blake3(Binary::new(arr)))
            }
        }
    }
}

impl std::fmt::Display for Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_string())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    #[test]
    fn hash_blake3() {
        let msg = b"that kid rode his bike through my flower bed again";
        let hash = Hash::new_blake3(msg).unwrap();
        assert_eq!(hash.as_bytes().len(), 32);
        let hash2 = Hash::new_blake3(msg).unwrap();
        assert_eq!(hash, hash2);
        let hash3 = Hash::new_blake3(b"some other message").unwrap();
        assert!(hash != hash3);
    }

    #[test]
    fn hash_to_from_string() {
        let hash = Hash::new_blake3(b"get a job").unwrap();
        let string = String::try_from(&hash).unwrap();
        let hash2 = Hash::try_from(string.as_str()).unwrap();
        assert_eq!(hash, hash2);
    }
}

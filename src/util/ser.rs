//! Serialization tools.
//!
//! Everything that goes over the wire or gets content-addressed runs through
//! the DER encoder here, so ids and signatures are stable across platforms.
//! The human-readable path (yaml) is for display/export only and never feeds
//! back into id computation.

use crate::error::{Error, Result};
use rasn::{
    types::{constraints::Constraints, Identifier, OctetString, Tag},
    AsnType, Decode, Decoder, Encode, Encoder,
};
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize, Serializer};
use std::ops::Deref;

/// Serialize an object into its canonical DER form.
pub(crate) fn serialize<T: Encode>(obj: &T) -> Result<Vec<u8>> {
    rasn::der::encode(obj).map_err(|_| Error::ASNSerialize)
}

/// Deserialize an object from its canonical DER form.
pub(crate) fn deserialize<T: Decode>(bytes: &[u8]) -> Result<T> {
    rasn::der::decode(bytes).map_err(|_| Error::ASNDeserialize)
}

/// Serialize an object into yaml, for display or export.
pub(crate) fn serialize_text<T: Serialize>(obj: &T) -> Result<String> {
    Ok(serde_yaml::to_string(obj)?)
}

/// Deserialize an object from yaml.
#[allow(dead_code)]
pub(crate) fn deserialize_text<T: DeserializeOwned>(text: &str) -> Result<T> {
    Ok(serde_yaml::from_str(text)?)
}

/// Convert bytes to base64 (url-safe, no padding).
pub fn base64_encode<T: AsRef<[u8]>>(bytes: T) -> String {
    use base64::Engine;
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes.as_ref())
}

/// Convert base64 to bytes (url-safe, no padding).
pub fn base64_decode<T: AsRef<[u8]>>(bytes: T) -> Result<Vec<u8>> {
    use base64::Engine;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(bytes.as_ref())?)
}

/// A default implementation for (de)serializing an object to or from binary
/// format.
pub trait SerdeBinary: Encode + Decode + Sized {
    /// Serialize this message
    fn serialize_binary(&self) -> Result<Vec<u8>> {
        serialize(self)
    }

    /// Deserialize this message
    fn deserialize_binary(slice: &[u8]) -> Result<Self> {
        deserialize(slice)
    }
}

/// Serialize an object into a human-readable format (yaml).
pub trait SerText: Serialize + Sized {
    /// Serialize this object as text
    fn serialize_text(&self) -> Result<String> {
        serialize_text(self)
    }
}

/// A fixed-length byte container that knows how to encode/decode itself as an
/// ASN.1 octet string and renders as base64 when serialized human-readably.
#[derive(Debug, Clone)]
pub struct Binary<const N: usize>([u8; N]);

impl<const N: usize> Binary<N> {
    /// Create a new fixed-length byte container.
    pub fn new(bytes: [u8; N]) -> Self {
        Self(bytes)
    }
}

impl<const N: usize> Deref for Binary<N> {
    type Target = [u8; N];
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<const N: usize> AsRef<[u8]> for Binary<N> {
    fn as_ref(&self) -> &[u8] {
        &self.0[..]
    }
}

impl<const N: usize> PartialEq for Binary<N> {
    fn eq(&self, other: &Self) -> bool {
        self.0[..] == other.0[..]
    }
}

impl<const N: usize> Eq for Binary<N> {}

impl<const N: usize> std::hash::Hash for Binary<N> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0[..].hash(state);
    }
}

impl<const N: usize> TryFrom<&[u8]> for Binary<N> {
    type Error = Error;
    fn try_from(slice: &[u8]) -> std::result::Result<Self, Self::Error> {
        let arr: [u8; N] = slice.try_into().map_err(|_| Error::BadLength)?;
        Ok(Self(arr))
    }
}

impl<const N: usize> AsnType for Binary<N> {
    const TAG: Tag = Tag::OCTET_STRING;
}

impl<const N: usize> Encode for Binary<N> {
    fn encode_with_tag_and_constraints<'encoder, E: Encoder<'encoder>>(
        &self,
        encoder: &mut E,
        tag: Tag,
        constraints: Constraints,
        identifier: Identifier,
    ) -> std::result::Result<(), E::Error> {
        OctetString::copy_from_slice(&self.0[..]).encode_with_tag_and_constraints(encoder, tag, constraints, identifier)
    }
}

impl<const N: usize> Decode for Binary<N> {
    fn decode_with_tag_and_constraints<D: Decoder>(
        decoder: &mut D,
        tag: Tag,
        constraints: Constraints,
    ) -> std::result::Result<Self, D::Error> {
        let bytes = OctetString::decode_with_tag_and_constraints(decoder, tag, constraints)?;
        let arr: [u8; N] = bytes.as_ref().try_into().map_err(|_| {
            rasn::de::Error::no_valid_choice("octet string of unexpected length", rasn::Codec::Der)
        })?;
        Ok(Self(arr))
    }
}

/// A serde visitor that accepts bytes (or a sequence of bytes, for formats
/// that encode byte strings as sequences).
struct BytesVisitor;

impl<'de> serde::de::Visitor<'de> for BytesVisitor {
    type Value = Vec<u8>;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        formatter.write_str("a byte array")
    }

    fn visit_bytes<E: serde::de::Error>(self, bytes: &[u8]) -> std::result::Result<Self::Value, E> {
        Ok(Vec::from(bytes))
    }

    fn visit_byte_buf<E: serde::de::Error>(self, bytes: Vec<u8>) -> std::result::Result<Self::Value, E> {
        Ok(bytes)
    }

    fn visit_seq<A: serde::de::SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<Self::Value, A::Error> {
        let mut bytes = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(byte) = seq.next_element::<u8>()? {
            bytes.push(byte);
        }
        Ok(bytes)
    }
}

impl<const N: usize> Serialize for Binary<N> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&base64_encode(&self.0[..]))
        } else {
            serializer.serialize_bytes(&self.0[..])
        }
    }
}

impl<'de, const N: usize> Deserialize<'de> for Binary<N> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let vec = if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            base64_decode(s).map_err(serde::de::Error::custom)?
        } else {
            deserializer.deserialize_bytes(BytesVisitor)?
        };
        let arr: [u8; N] = vec.as_slice().try_into().map_err(|_| serde::de::Error::custom("bad slice length"))?;
        Ok(Self(arr))
    }
}

/// A variable-length byte container with the same encoding behavior as
/// [`Binary`].
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
pub struct BinaryVec(Vec<u8>);

impl BinaryVec {
    /// Consume this container, returning the bytes within.
    #[allow(dead_code)]
    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }
}

impl Deref for BinaryVec {
    type Target = Vec<u8>;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<[u8]> for BinaryVec {
    fn as_ref(&self) -> &[u8] {
        self.0.as_slice()
    }
}

impl From<Vec<u8>> for BinaryVec {
    fn from(vec: Vec<u8>) -> Self {
        Self(vec)
    }
}

impl AsnType for BinaryVec {
    const TAG: Tag = Tag::OCTET_STRING;
}

impl Encode for BinaryVec {
    fn encode_with_tag_and_constraints<'encoder, E: Encoder<'encoder>>(
        &self,
        encoder: &mut E,
        tag: Tag,
        constraints: Constraints,
        identifier: Identifier,
    ) -> std::result::Result<(), E::Error> {
        OctetString::copy_from_slice(self.0.as_slice()).encode_with_tag_and_constraints(encoder, tag, constraints, identifier)
    }
}

impl Decode for BinaryVec {
    fn decode_with_tag_and_constraints<D: Decoder>(
        decoder: &mut D,
        tag: Tag,
        constraints: Constraints,
    ) -> std::result::Result<Self, D::Error> {
        let bytes = OctetString::decode_with_tag_and_constraints(decoder, tag, constraints)?;
        Ok(Self(bytes.to_vec()))
    }
}

impl Serialize for BinaryVec {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&base64_encode(self.0.as_slice()))
        } else {
            serializer.serialize_bytes(self.0.as_slice())
        }
    }
}

impl<'de> Deserialize<'de> for BinaryVec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            let vec = base64_decode(s).map_err(serde::de::Error::custom)?;
            Ok(Self(vec))
        } else {
            Ok(Self(deserializer.deserialize_bytes(BytesVisitor)?))
        }
    }
}

/// A fixed-length secret byte container. Zeroed on drop, no serde, no Debug
/// output of its contents. It only ever hits the wire inside a sealed
/// (encrypted) object, which is why it still carries the ASN.1 impls.
pub struct BinarySecret<const N: usize>([u8; N]);

impl<const N: usize> BinarySecret<N> {
    /// Create a new secret container.
    pub fn new(bytes: [u8; N]) -> Self {
        Self(bytes)
    }

    /// Grab the secret bytes. Don't wave them around.
    pub fn expose_secret(&self) -> &[u8; N] {
        &self.0
    }
}

impl<const N: usize> std::fmt::Debug for BinarySecret<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BinarySecret<{}>(..)", N)
    }
}

impl<const N: usize> Clone for BinarySecret<N> {
    fn clone(&self) -> Self {
        Self(self.0)
    }
}

impl<const N: usize> Drop for BinarySecret<N> {
    fn drop(&mut self) {
        use zeroize::Zeroize;
        self.0.zeroize();
    }
}

impl<const N: usize> AsnType for BinarySecret<N> {
    const TAG: Tag = Tag::OCTET_STRING;
}

impl<const N: usize> Encode for BinarySecret<N> {
    fn encode_with_tag_and_constraints<'encoder, E: Encoder<'encoder>>(
        &self,
        encoder: &mut E,
        tag: Tag,
        constraints: Constraints,
        identifier: Identifier,
    ) -> std::result::Result<(), E::Error> {
        OctetString::copy_from_slice(&self.0[..]).encode_with_tag_and_constraints(encoder, tag, constraints, identifier)
    }
}

impl<const N: usize> Decode for BinarySecret<N> {
    fn decode_with_tag_and_constraints<D: Decoder>(
        decoder: &mut D,
        tag: Tag,
        constraints: Constraints,
    ) -> std::result::Result<Self, D::Error> {
        let bytes = OctetString::decode_with_tag_and_constraints(decoder, tag, constraints)?;
        let arr: [u8; N] = bytes.as_ref().try_into().map_err(|_| {
            rasn::de::Error::no_valid_choice("octet string of unexpected length", rasn::Codec::Der)
        })?;
        Ok(Self(arr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base64_encode_decode() {
        let bytes = vec![37, 80, 103, 0, 255, 2];
        let enc = base64_encode(&bytes);
        assert_eq!(enc, "JVBnAP8C");
        let dec = base64_decode(enc.as_bytes()).unwrap();
        assert_eq!(dec, bytes);
    }

    #[test]
    fn binary_der_roundtrip() {
        let bin = Binary::new([5u8; 32]);
        let ser = serialize(&bin).unwrap();
        let des: Binary<32> = deserialize(&ser).unwrap();
        assert_eq!(bin, des);
        // wrong length must refuse to decode
        let res: Result<Binary<16>> = deserialize(&ser);
        assert_eq!(res.err(), Some(Error::ASNDeserialize));
    }

    #[test]
    fn binaryvec_der_roundtrip() {
        let bin = BinaryVec::from(vec![1, 2, 3, 4, 5, 6, 7]);
        let ser = serialize(&bin).unwrap();
        let des: BinaryVec = deserialize(&ser).unwrap();
        assert_eq!(bin, des);
    }

    #[test]
    fn binarysecret_debug_hides_contents() {
        let secret = BinarySecret::new([42u8; 32]);
        let dbg = format!("{:?}", secret);
        assert!(!dbg.contains("42"));
    }
}

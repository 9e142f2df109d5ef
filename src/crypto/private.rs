//! The private module locks data away via a [`SecretKey`]
//! while never storing or serializing or displaying the locked (private) data.
//! It can only be retrieved via the [open](crate::crypto::private::Private::open)
//! method, given the correct unlocking key.
//!
//! This is how credential private key halves are stored at rest: the public
//! credential structure is fully visible, and the private halves within it
//! are sealed blobs.

use crate::{
    crypto::base::{Sealed, SecretKey},
    error::{Error, Result},
    util::ser,
};
use rand::{CryptoRng, RngCore};
use rasn::{
    types::{constraints::Constraints, Identifier, Tag},
    AsnType, Decode, Decoder, Encode, Encoder,
};
use serde_derive::{Deserialize, Serialize};
use std::marker::PhantomData;

/// Holds private data, which can only be opened if you have the special key.
#[derive(Debug, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Private<T> {
    /// Allows us to cast this container to T without this container ever
    /// actually storing any T value (because it's encrypted).
    #[serde(skip)]
    _phantom: PhantomData<T>,
    /// The encrypted data stored in this container.
    sealed: Sealed,
}

impl<T: Encode + Decode> Private<T> {
    /// Create a new Private container from a given serializable data object
    /// and an encrypting key.
    pub fn seal<R: RngCore + CryptoRng>(rng: &mut R, seal_key: &SecretKey, data: &T) -> Result<Self> {
        let serialized = ser::serialize(data)?;
        let sealed = seal_key.seal(rng, &serialized)?;
        Ok(Self {
            _phantom: PhantomData,
            sealed,
        })
    }

    /// Open a Private container with a decrypting key.
    pub fn open(&self, seal_key: &SecretKey) -> Result<T> {
        let open_bytes = seal_key.open(&self.sealed).map_err(|_| Error::CryptoOpenFailed)?;
        let obj: T = ser::deserialize(&open_bytes[..])?;
        Ok(obj)
    }

    /// Re-encrypt the contents of this container with a new key.
    pub fn reencrypt<R: RngCore + CryptoRng>(self, rng: &mut R, previous_seal_key: &SecretKey, new_seal_key: &SecretKey) -> Result<Self> {
        let serialized = previous_seal_key.open(&self.sealed).map_err(|_| Error::CryptoOpenFailed)?;
        let sealed = new_seal_key.seal(rng, &serialized)?;
        Ok(Self {
            _phantom: PhantomData,
            sealed,
        })
    }
}

impl<T> Clone for Private<T> {
    fn clone(&self) -> Self {
        Self {
            _phantom: PhantomData,
            sealed: self.sealed.clone(),
        }
    }
}

impl<T> PartialEq for Private<T> {
    fn eq(&self, other: &Self) -> bool {
        self.sealed == other.sealed
    }
}

impl<T> AsnType for Private<T> {
    const TAG: Tag = Tag::SEQUENCE;
}

impl<T> Encode for Private<T> {
    fn encode_with_tag_and_constraints<'encoder, E: Encoder<'encoder>>(
        &self,
        encoder: &mut E,
        tag: Tag,
        constraints: Constraints,
        identifier: Identifier,
    ) -> std::result::Result<(), E::Error> {
        self.sealed.encode_with_tag_and_constraints(encoder, tag, constraints, identifier)
    }
}

impl<T> Decode for Private<T> {
    fn decode_with_tag_and_constraints<D: Decoder>(
        decoder: &mut D,
        tag: Tag,
        constraints: Constraints,
    ) -> std::result::Result<Self, D::Error> {
        let sealed = Sealed::decode_with_tag_and_constraints(decoder, tag, constraints)?;
        Ok(Self {
            _phantom: PhantomData,
            sealed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::ser::BinarySecret;

    #[test]
    fn private_seal_open() {
        let mut rng = crate::util::test::rng();
        let seal_key = SecretKey::new_xchacha20poly1305(&mut rng).unwrap();
        let secret = BinarySecret::new([9u8; 32]);
        let private = Private::seal(&mut rng, &seal_key, &secret).unwrap();
        let opened: BinarySecret<32> = private.open(&seal_key).unwrap();
        assert_eq!(opened.expose_secret(), secret.expose_secret());

        let fake_key = SecretKey::new_xchacha20poly1305(&mut rng).unwrap();
        let res: Result<BinarySecret<32>> = private.open(&fake_key);
        assert_eq!(res.err(), Some(Error::CryptoOpenFailed));
    }

    #[test]
    fn private_reencrypt() {
        let mut rng = crate::util::test::rng();
        let key1 = SecretKey::new_xchacha20poly1305(&mut rng).unwrap();
        let key2 = SecretKey::new_xchacha20poly1305(&mut rng).unwrap();
        let secret = BinarySecret::new([44u8; 32]);
        let private = Private::seal(&mut rng, &key1, &secret).unwrap();
        let private = private.reencrypt(&mut rng, &key1, &key2).unwrap();
        let opened: BinarySecret<32> = private.open(&key2).unwrap();
        assert_eq!(opened.expose_secret(), secret.expose_secret());
        let res: Result<BinarySecret<32>> = private.open(&key1);
        assert_eq!(res.err(), Some(Error::CryptoOpenFailed));
    }
}

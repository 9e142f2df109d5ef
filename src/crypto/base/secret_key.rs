use crate::{
    error::{Error, Result},
    util::ser::{Binary, BinarySecret, BinaryVec, SerdeBinary},
};
use chacha20poly1305::aead::{Aead, KeyInit};
use rand::{CryptoRng, RngCore};
use rasn::{AsnType, Decode, Decoder, Encode, Encoder};
use serde_derive::{Deserialize, Serialize};
use std::ops::Deref;

/// A self-describing, encrypted object that can be opened with the right key.
#[derive(
    Debug, Clone, PartialEq, AsnType, Encode, Decode, Serialize, Deserialize, getset::Getters, getset::MutGetters, getset::Setters,
)]
#[getset(get = "pub", get_mut = "pub(crate)", set = "pub(crate)")]
pub struct Sealed {
    /// Our heroic nonce
    #[rasn(tag(explicit(0)))]
    nonce: SecretKeyNonce,
    /// The ciphertext
    #[rasn(tag(explicit(1)))]
    ciphertext: BinaryVec,
}

impl Sealed {
    fn new(nonce: SecretKeyNonce, ciphertext: Vec<u8>) -> Self {
        Self {
            nonce,
            ciphertext: BinaryVec::from(ciphertext),
        }
    }
}

impl SerdeBinary for Sealed {}

/// A symmetric encryption key nonce
#[derive(Debug, Clone, PartialEq, AsnType, Encode, Decode, Serialize, Deserialize)]
#[rasn(choice)]
pub enum SecretKeyNonce {
    #[rasn(tag(explicit(0)))]
    XChaCha20Poly1305(Binary<24>),
}

/// A symmetric encryption key
#[derive(Debug, AsnType, Encode, Decode)]
#[rasn(choice)]
pub enum SecretKey {
    #[rasn(tag(explicit(0)))]
    XChaCha20Poly1305(BinarySecret<32>),
}

impl SecretKey {
    /// Create a new xchacha20poly1305 key
    pub fn new_xchacha20poly1305<R: RngCore + CryptoRng>(rng: &mut R) -> Result<Self> {
        let mut randbuf = [0u8; 32];
        rng.fill_bytes(&mut randbuf);
        Ok(Self::XChaCha20Poly1305(BinarySecret::new(randbuf)))
    }

    /// Create a SecretKey from raw key bytes
    pub fn new_xchacha20poly1305_from_bytes(secret_bytes: [u8; 32]) -> Result<Self> {
        Ok(Self::XChaCha20Poly1305(BinarySecret::new(secret_bytes)))
    }

    /// Create a nonce for use with this secret key
    pub fn gen_nonce<R: RngCore + CryptoRng>(&self, rng: &mut R) -> Result<SecretKeyNonce> {
        match self {
            SecretKey::XChaCha20Poly1305(_) => {
                let mut randbuf = [0u8; 24];
                rng.fill_bytes(&mut randbuf);
                Ok(SecretKeyNonce::XChaCha20Poly1305(Binary::new(randbuf)))
            }
        }
    }

    /// Encrypt a value with this key, returning a self-describing [`Sealed`]
    /// object.
    pub fn seal<R: RngCore + CryptoRng>(&self, rng: &mut R, data: &[u8]) -> Result<Sealed> {
        match self {
            SecretKey::XChaCha20Poly1305(ref key) => {
                let nonce = self.gen_nonce(rng)?;
                let nonce_bin = match nonce {
                    SecretKeyNonce::XChaCha20Poly1305(ref bin) => bin.deref(),
                };
                let cipher = chacha20poly1305::XChaCha20Poly1305::new(key.expose_secret().into());
                let enc = cipher
                    .encrypt(chacha20poly1305::XNonce::from_slice(nonce_bin.as_slice()), data)
                    .map_err(|_| Error::CryptoSealFailed)?;
                Ok(Sealed::new(nonce, enc))
            }
        }
    }

    /// Decrypt a sealed value with this key.
    pub fn open(&self, sealed: &Sealed) -> Result<Vec<u8>> {
        match (self, sealed.nonce()) {
            (SecretKey::XChaCha20Poly1305(ref key), SecretKeyNonce::XChaCha20Poly1305(ref nonce)) => {
                let cipher = chacha20poly1305::XChaCha20Poly1305::new(chacha20poly1305::Key::from_slice(key.expose_secret().as_slice()));
                let dec = cipher
                    .decrypt(chacha20poly1305::XNonce::from_slice(nonce.as_slice()), sealed.ciphertext().deref().as_slice())
                    .map_err(|_| Error::CryptoOpenFailed)?;
                Ok(dec)
            }
        }
    }
}

impl Clone for SecretKey {
    fn clone(&self) -> Self {
        match self {
            Self::XChaCha20Poly1305(secret) => Self::XChaCha20Poly1305(BinarySecret::new(*secret.expose_secret())),
        }
    }
}

impl AsRef<[u8]> for SecretKey {
    fn as_ref(&self) -> &[u8] {
        match self {
            Self::XChaCha20Poly1305(ref key) => key.expose_secret().as_ref(),
        }
    }
}

#[cfg(test)]
impl PartialEq for SecretKey {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (SecretKey::XChaCha20Poly1305(inner1), SecretKey::XChaCha20Poly1305(inner2)) => {
                inner1.expose_secret() == inner2.expose_secret()
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    #[test]
    fn secretkey_xchacha20poly1305_enc_dec() {
        let mut rng = crate::util::test::rng();
        let key = SecretKey::new_xchacha20poly1305(&mut rng).unwrap();
        let val = String::from("get a job");
        let enc = key.seal(&mut rng, val.as_bytes()).unwrap();
        let dec_bytes = key.open(&enc).unwrap();
        let dec = String::from_utf8(dec_bytes).unwrap();
        assert_eq!(dec, String::from("get a job"));
    }

    #[test]
    fn secretkey_xchacha20poly1305_wrong_key_fails() {
        let mut rng = crate::util::test::rng();
        let key = SecretKey::new_xchacha20poly1305(&mut rng).unwrap();
        let key2 = SecretKey::new_xchacha20poly1305(&mut rng).unwrap();
        assert!(key != key2);
        let enc = key.seal(&mut rng, b"you will never guess my bank pin").unwrap();
        let dec = key2.open(&enc);
        assert_eq!(dec.err(), Some(Error::CryptoOpenFailed));
    }

    #[test]
    fn secretkey_sealed_der_roundtrip() {
        let mut rng = crate::util::test::rng();
        let key = SecretKey::new_xchacha20poly1305(&mut rng).unwrap();
        let sealed = key.seal(&mut rng, b"marty, you gotta come back with me").unwrap();
        let ser = sealed.serialize_binary().unwrap();
        let sealed2 = Sealed::deserialize_binary(&ser).unwrap();
        assert_eq!(sealed, sealed2);
        assert_eq!(key.open(&sealed2).unwrap().as_slice(), b"marty, you gotta come back with me".as_slice());
    }
}

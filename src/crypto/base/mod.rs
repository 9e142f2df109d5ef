//! The crypto base wraps a set of algorithms for encryption and decryption
//! (both symmetric and asymmetric) as well as cryptographic signing and
//! hashing of data.
//!
//! The idea here is that specific algorithms are wrapped in descriptive
//! interfaces that allow high-level use of the encapsulated cryptographic
//! algorithms without needing to know the details of those algorithms. A
//! `SignKeypair` has a standard interface but can describe any number of
//! signing algorithms, which lets credentials fall back across algorithms
//! without the credential layer knowing curve math from a hole in the ground.

use crate::{
    error::{Error, Result},
    util::ser::BinarySecret,
};
use rand::{rngs::OsRng, RngCore, SeedableRng};
use rasn::{AsnType, Decode, Encode};
use serde_derive::{Deserialize, Serialize};

mod crypto_key;
mod hash;
mod secret_key;
mod sign_key;

pub use crypto_key::*;
pub use hash::*;
pub use secret_key::*;
pub use sign_key::*;

/// A constant that provides a default for CPU difficulty for interactive key derivation
pub const KDF_OPS_INTERACTIVE: u32 = 2;
/// A constant that provides a default for mem difficulty for interactive key derivation
pub const KDF_MEM_INTERACTIVE: u32 = 65536;

/// A constant that provides a default for CPU difficulty for moderate key derivation
pub const KDF_OPS_MODERATE: u32 = 3;
/// A constant that provides a default for mem difficulty for moderate key derivation
pub const KDF_MEM_MODERATE: u32 = 262144;

/// The asymmetric key algorithms this system recognizes.
///
/// Recognizing an algorithm and being able to generate keys for it are two
/// different things: the active provider covers secp256k1 and ed25519, and
/// generation requests for RSA return [`Error::CryptoAlgoUnsupported`] so the
/// credential layer can run its fallback order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsnType, Encode, Decode, Serialize, Deserialize)]
#[rasn(enumerated)]
pub enum KeyAlgo {
    /// secp256k1 (ECDSA signing, ECDH agreement)
    Secp256k1,
    /// Ed25519 signing (curve25519 for agreement)
    Ed25519,
    /// RSA. Recognized for wire compatibility; not generated by this provider.
    Rsa,
}

impl KeyAlgo {
    /// The fixed order we walk when the requested algorithm cannot generate
    /// keys: secp256k1, then ed25519, then rsa.
    pub const FALLBACK_ORDER: [KeyAlgo; 3] = [KeyAlgo::Secp256k1, KeyAlgo::Ed25519, KeyAlgo::Rsa];
}

/// A convenience function that returns a ChaCha20 CSRNG seeded with OS random
/// bytes. Use this if you want a nice, strong random number generator, you
/// don't want to wire one up yourself, and your platform provides good
/// entropy.
pub fn rng_chacha20() -> rand_chacha::ChaCha20Rng {
    let mut seed_bytes = [0u8; 32];
    OsRng.fill_bytes(&mut seed_bytes);
    rand_chacha::ChaCha20Rng::from_seed(seed_bytes)
}

/// Generate a secret key from a passphrase/salt
pub fn derive_secret_key(passphrase: &[u8], salt_bytes: &[u8], ops: u32, mem: u32) -> Result<SecretKey> {
    const LEN: usize = 32;
    let salt: &[u8; 16] = salt_bytes[0..16].try_into().map_err(|_| Error::CryptoBadSalt)?;
    let mut key = [0u8; 32];
    let argon2_ctx = argon2::Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        argon2::Params::new(mem, ops, 1, Some(LEN)).map_err(|_| Error::CryptoKDFFailed)?,
    );
    argon2_ctx
        .hash_password_into(passphrase, salt, &mut key)
        .map_err(|_| Error::CryptoKDFFailed)?;
    Ok(SecretKey::XChaCha20Poly1305(BinarySecret::new(key)))
}

/// Given the bytes from a secret (a shared ECDH secret, a wallet seed, ...),
/// derive some other key of N length in a secure manner.
pub fn stretch_key<const N: usize>(input: &[u8], output: &mut [u8; N], info: Option<&[u8]>, salt: Option<&[u8]>) -> Result<()> {
    let hkdf = hkdf::SimpleHkdf::<blake3::Hasher>::new(salt, input);
    hkdf.expand(info.unwrap_or(b"nym/hkdf"), output).map_err(|_| Error::CryptoHKDFFailed)?;
    Ok(())
}

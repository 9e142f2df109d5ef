//! Key credentials hold the actual key material of an authority: three
//! role-scoped keypairs (authentication, encryption, signing), each
//! independently versioned. The master credential and every secondary
//! credential are key credentials.

use crate::{
    crypto::base::{stretch_key, CryptoKeypair, KeyAlgo, SecretKey, SignKeypair, SignKeypairSignature},
    error::{Error, Result},
    identity::credential::{CredentialCommon, CredentialID, CredentialMode, CredentialRole},
    util::Public,
};
use rand::{CryptoRng, RngCore};
use rasn::{AsnType, Decode, Decoder, Encode, Encoder};
use serde_derive::{Deserialize, Serialize};

/// The three roles a keypair can play inside a key credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsnType, Encode, Decode, Serialize, Deserialize)]
#[rasn(enumerated)]
pub enum KeyRole {
    /// Authenticates sessions.
    Auth,
    /// Encrypts/decrypts (and negotiates sessions via ECDH).
    Encrypt,
    /// Signs.
    Sign,
}

/// A keypair tagged with its own format version, so each of a credential's
/// keys can upgrade independently.
#[derive(
    Debug, Clone, PartialEq, AsnType, Encode, Decode, Serialize, Deserialize, getset::Getters, getset::MutGetters, getset::Setters,
)]
#[getset(get = "pub", get_mut = "pub(crate)", set = "pub(crate)")]
pub struct VersionedKey<T> {
    /// The key's format version.
    #[rasn(tag(explicit(0)))]
    version: u32,
    /// The key itself.
    #[rasn(tag(explicit(1)))]
    key: T,
}

impl<T> VersionedKey<T> {
    fn new(version: u32, key: T) -> Self {
        Self { version, key }
    }
}

impl<T: Public> Public for VersionedKey<T> {
    fn strip_private(&self) -> Self {
        Self {
            version: self.version,
            key: self.key.strip_private(),
        }
    }

    fn has_private(&self) -> bool {
        self.key.has_private()
    }
}

/// The current version stamped onto newly generated keys.
const KEY_VERSION_DEFAULT: u32 = 1;

/// Parameters for deterministic (HD) key derivation: the wallet seed, its
/// fingerprint, and the credential's slot index. Legacy credentials skip this
/// and generate random keys.
#[derive(Debug, Clone, getset::Getters)]
#[getset(get = "pub")]
pub struct KeyDerivation {
    /// The wallet seed bytes.
    seed: Vec<u8>,
    /// A printable fingerprint identifying the seed.
    fingerprint: String,
    /// The credential slot index being derived.
    index: u32,
}

impl KeyDerivation {
    /// Set up an HD derivation.
    pub fn new(seed: Vec<u8>, fingerprint: String, index: u32) -> Self {
        Self { seed, fingerprint, index }
    }

    /// Stretch a 32-byte key seed out of the wallet seed for one key role.
    fn key_seed(&self, role: &str) -> Result<[u8; 32]> {
        let info = format!("nym/hd/{}/{}/{}", self.fingerprint, self.index, role);
        let mut out = [0u8; 32];
        stretch_key(&self.seed, &mut out, Some(info.as_bytes()), None)?;
        Ok(out)
    }
}

/// An authentication, encryption, and signing keypair, bundled.
#[derive(
    Debug, Clone, PartialEq, AsnType, Encode, Decode, Serialize, Deserialize, getset::Getters, getset::MutGetters, getset::Setters,
)]
#[getset(get = "pub", get_mut = "pub(crate)", set = "pub(crate)")]
pub struct Keyset {
    /// The authentication keypair.
    #[rasn(tag(explicit(0)))]
    auth: VersionedKey<SignKeypair>,
    /// The encryption keypair.
    #[rasn(tag(explicit(1)))]
    encrypt: VersionedKey<CryptoKeypair>,
    /// The signing keypair.
    #[rasn(tag(explicit(2)))]
    sign: VersionedKey<SignKeypair>,
}

impl Keyset {
    /// Generate a full keyset for one algorithm, either at random or from an
    /// HD derivation.
    pub fn generate<R: RngCore + CryptoRng>(
        rng: &mut R,
        seal_key: &SecretKey,
        algo: KeyAlgo,
        derivation: Option<&KeyDerivation>,
    ) -> Result<Self> {
        let (auth, encrypt, sign) = match derivation {
            Some(derivation) => (
                SignKeypair::new_from_seed(rng, algo, seal_key, derivation.key_seed("auth")?)?,
                CryptoKeypair::new_from_seed(rng, algo, seal_key, derivation.key_seed("encrypt")?)?,
                SignKeypair::new_from_seed(rng, algo, seal_key, derivation.key_seed("sign")?)?,
            ),
            None => (
                SignKeypair::new(rng, algo, seal_key)?,
                CryptoKeypair::new(rng, algo, seal_key)?,
                SignKeypair::new(rng, algo, seal_key)?,
            ),
        };
        Ok(Self {
            auth: VersionedKey::new(KEY_VERSION_DEFAULT, auth),
            encrypt: VersionedKey::new(KEY_VERSION_DEFAULT, encrypt),
            sign: VersionedKey::new(KEY_VERSION_DEFAULT, sign),
        })
    }
}

impl Public for Keyset {
    fn strip_private(&self) -> Self {
        Self {
            auth: self.auth.strip_private(),
            encrypt: self.encrypt.strip_private(),
            sign: self.sign.strip_private(),
        }
    }

    fn has_private(&self) -> bool {
        self.auth.has_private() || self.encrypt.has_private() || self.sign.has_private()
    }
}

/// An enum that holds either kind of keypair, returned by role-based key
/// lookups.
#[derive(Debug, Clone)]
pub enum Key {
    /// A signing key.
    Sign(SignKeypair),
    /// An asymmetric crypto key.
    Crypto(CryptoKeypair),
}

impl Key {
    /// Returns the `SignKeypair` if this is a signing key.
    pub fn sign(&self) -> Option<SignKeypair> {
        match self {
            Self::Sign(ref x) => Some(x.clone()),
            _ => None,
        }
    }

    /// Returns the `CryptoKeypair` if this is a crypto key.
    pub fn crypto(&self) -> Option<CryptoKeypair> {
        match self {
            Self::Crypto(ref x) => Some(x.clone()),
            _ => None,
        }
    }
}

/// The shared core of the master and secondary credentials: the common block,
/// the algorithm the keys were generated with, and the keyset itself.
#[derive(
    Debug, Clone, PartialEq, AsnType, Encode, Decode, Serialize, Deserialize, getset::Getters, getset::MutGetters, getset::Setters,
)]
#[getset(get = "pub", get_mut = "pub(crate)", set = "pub(crate)")]
pub struct KeyCredential {
    /// The fields every credential shares.
    #[rasn(tag(explicit(0)))]
    common: CredentialCommon,
    /// The algorithm this credential's keys were generated with.
    #[rasn(tag(explicit(1)))]
    algo: KeyAlgo,
    /// The keys.
    #[rasn(tag(explicit(2)))]
    keys: Keyset,
}

impl KeyCredential {
    /// Generate a key credential, walking the algorithm fallback order: the
    /// requested algorithm is tried first, then secp256k1, ed25519, and rsa
    /// in turn, until one generates. If none can, construction fails with
    /// [`Error::CredentialNoSupportedAlgorithm`].
    pub fn generate<R: RngCore + CryptoRng>(
        rng: &mut R,
        seal_key: &SecretKey,
        requested: KeyAlgo,
        version: u32,
        role: CredentialRole,
        master_id: Option<CredentialID>,
        derivation: Option<&KeyDerivation>,
    ) -> Result<Self> {
        let mut algos = vec![requested];
        for algo in KeyAlgo::FALLBACK_ORDER {
            if algo != requested {
                algos.push(algo);
            }
        }
        for algo in algos {
            match Keyset::generate(rng, seal_key, algo, derivation) {
                Ok(keys) => {
                    return Ok(Self {
                        common: CredentialCommon::new(version, role, CredentialMode::Private, master_id),
                        algo,
                        keys,
                    });
                }
                Err(Error::CryptoAlgoUnsupported) => {
                    tracing::debug!(?algo, "key credential generation: algorithm unsupported, falling back");
                    continue;
                }
                Err(err) => return Err(err),
            }
        }
        Err(Error::CredentialNoSupportedAlgorithm)
    }

    /// Grab the keypair for a role.
    pub fn keypair(&self, role: KeyRole) -> Key {
        match role {
            KeyRole::Auth => Key::Sign(self.keys.auth().key().clone()),
            KeyRole::Encrypt => Key::Crypto(self.keys.encrypt().key().clone()),
            KeyRole::Sign => Key::Sign(self.keys.sign().key().clone()),
        }
    }

    /// Sign data with one of this credential's signing-capable keys. Fails
    /// with [`Error::KeypairNotFound`] for roles that cannot sign.
    pub fn sign(&self, seal_key: &SecretKey, role: KeyRole, data: &[u8]) -> Result<SignKeypairSignature> {
        match role {
            KeyRole::Auth => self.keys.auth().key().sign(seal_key, data),
            KeyRole::Sign => self.keys.sign().key().sign(seal_key, data),
            KeyRole::Encrypt => Err(Error::KeypairNotFound),
        }
    }
}

impl Public for KeyCredential {
    fn strip_private(&self) -> Self {
        let mut common = self.common.clone();
        common.set_mode(CredentialMode::Public);
        Self {
            common,
            algo: self.algo,
            keys: self.keys.strip_private(),
        }
    }

    fn has_private(&self) -> bool {
        self.keys.has_private()
    }
}

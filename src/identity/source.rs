//! An identity source defines how a nym's canonical identifier is derived and
//! proven. A source is created alongside the first master credential and
//! never changes for the life of the nym.
//!
//! Two kinds of source exist: a self-signed public key (the identifier is a
//! digest of the key itself, and the master credential proves the linkage by
//! being signed with that exact key), and a payment code (the identifier
//! derives from the code, and the master carries an external signature made
//! with the code's notification key).

use crate::{
    crypto::base::{SecretKey, SignKeypair, SignKeypairPublic, SignKeypairSignature},
    error::{Error, Result},
    identity::credential::primary::PrimaryCredential,
    util::{
        ser::{self, Binary, SerdeBinary},
        Public,
    },
};
use rand::{CryptoRng, RngCore};
use rasn::{AsnType, Decode, Decoder, Encode, Encoder};
use serde_derive::{Deserialize, Serialize};

object_id! {
    /// A unique identifier for a nym, derived from its source.
    NymID
}

/// The version byte prepended to a payment code's base58check string form.
const PAYMENT_CODE_BASE58_VERSION: u8 = 0x47;

/// A payment code: a secp256k1 notification key plus a chain code, usable as
/// an externally provable identity root. The string form is base58check with
/// a fixed version byte, so codes are recognizable at a glance.
#[derive(
    Debug, Clone, PartialEq, AsnType, Encode, Decode, Serialize, Deserialize, getset::Getters, getset::MutGetters, getset::Setters,
)]
#[getset(get = "pub", get_mut = "pub(crate)", set = "pub(crate)")]
pub struct PaymentCode {
    /// The payment code format version.
    #[rasn(tag(explicit(0)))]
    version: u32,
    /// The notification keypair. Always secp256k1; the private half is present
    /// only for codes we own.
    #[rasn(tag(explicit(1)))]
    key: SignKeypair,
    /// The chain code bound into the string form.
    #[rasn(tag(explicit(2)))]
    chain_code: Binary<32>,
}

impl PaymentCode {
    /// Generate a new payment code.
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R, seal_key: &SecretKey, version: u32) -> Result<Self> {
        let key = SignKeypair::new_secp256k1(rng, seal_key)?;
        let mut chain_code = [0u8; 32];
        rng.fill_bytes(&mut chain_code);
        Ok(Self {
            version,
            key,
            chain_code: Binary::new(chain_code),
        })
    }

    /// Derive a payment code from a wallet seed. The notification key and the
    /// chain code are both stretched out of the seed, so the same seed always
    /// yields the same code.
    pub fn from_seed<R: RngCore + CryptoRng>(rng: &mut R, seal_key: &SecretKey, version: u32, seed: &[u8]) -> Result<Self> {
        let mut key_seed = [0u8; 32];
        crate::crypto::base::stretch_key(seed, &mut key_seed, Some(b"nym/payment-code/key"), None)?;
        let key = SignKeypair::new_secp256k1_from_seed(rng, seal_key, key_seed)?;
        let mut chain_code = [0u8; 32];
        crate::crypto::base::stretch_key(seed, &mut chain_code, Some(b"nym/payment-code/chain"), None)?;
        Ok(Self {
            version,
            key,
            chain_code: Binary::new(chain_code),
        })
    }

    /// Sign a value with the code's notification key. Only possible for codes
    /// we hold the private half of.
    pub fn sign(&self, seal_key: &SecretKey, data: &[u8]) -> Result<SignKeypairSignature> {
        self.key.sign(seal_key, data)
    }

    /// Verify a signature against the code's notification key.
    pub fn verify(&self, signature: &SignKeypairSignature, data: &[u8]) -> bool {
        self.key.verify(signature, data).is_ok()
    }

    /// The base58check string form of this code.
    pub fn to_base58(&self) -> String {
        let mut payload = Vec::with_capacity(66);
        payload.push(self.version as u8);
        payload.extend_from_slice(SignKeypairPublic::from(self.key.clone()).as_bytes());
        payload.extend_from_slice(self.chain_code.as_ref());
        bs58::encode(payload).with_check_version(PAYMENT_CODE_BASE58_VERSION).into_string()
    }

    /// Parse a payment code from its base58check string form. The resulting
    /// code is public-only.
    pub fn from_base58(string: &str) -> Result<Self> {
        let bytes = bs58::decode(string)
            .with_check(Some(PAYMENT_CODE_BASE58_VERSION))
            .into_vec()
            .map_err(|_| Error::ASNDeserialize)?;
        // version byte + format version + 33-byte pubkey + 32-byte chain code
        if bytes.len() != 67 {
            Err(Error::BadLength)?;
        }
        let version = bytes[1] as u32;
        let public: [u8; 33] = bytes[2..35].try_into().map_err(|_| Error::BadLength)?;
        let chain_code: [u8; 32] = bytes[35..67].try_into().map_err(|_| Error::BadLength)?;
        Ok(Self {
            version,
            key: SignKeypair::Secp256k1 {
                public: Binary::new(public),
                secret: None,
            },
            chain_code: Binary::new(chain_code),
        })
    }
}

impl Public for PaymentCode {
    fn strip_private(&self) -> Self {
        Self {
            version: self.version,
            key: self.key.strip_private(),
            chain_code: self.chain_code.clone(),
        }
    }

    fn has_private(&self) -> bool {
        self.key.has_private()
    }
}

impl SerdeBinary for PaymentCode {}

/// How a nym's identifier is derived and proven.
#[derive(Debug, Clone, PartialEq, AsnType, Encode, Decode, Serialize, Deserialize)]
#[rasn(choice)]
pub enum NymSource {
    /// The identifier is a digest of a public signing key; the master
    /// credential proves linkage by carrying a self-signature made with that
    /// exact key.
    #[rasn(tag(explicit(0)))]
    PubKey {
        #[rasn(tag(explicit(0)))]
        version: u32,
        #[rasn(tag(explicit(1)))]
        key: SignKeypairPublic,
    },
    /// The identifier derives from a payment code; the master credential
    /// carries an external signature made with the code's notification key.
    #[rasn(tag(explicit(1)))]
    Bip47 {
        #[rasn(tag(explicit(0)))]
        version: u32,
        #[rasn(tag(explicit(1)))]
        code: PaymentCode,
    },
}

impl NymSource {
    /// Create a new public-key source.
    pub fn new_pubkey(version: u32, key: SignKeypairPublic) -> Self {
        Self::PubKey { version, key }
    }

    /// Create a new payment-code source.
    pub fn new_bip47(version: u32, code: PaymentCode) -> Self {
        Self::Bip47 { version, code }
    }

    /// The source format version.
    pub fn version(&self) -> u32 {
        match self {
            Self::PubKey { version, .. } => *version,
            Self::Bip47 { version, .. } => *version,
        }
    }

    /// Derive the nym identifier for this source: a digest of the source's
    /// canonical public serialized form. Pure and deterministic.
    pub fn derive_id(&self) -> Result<NymID> {
        let serialized = ser::serialize(&self.strip_private())?;
        Ok(NymID::from(crate::crypto::base::Hash::new_blake3(&serialized)?))
    }

    /// Verify that the given master credential was legitimately produced by
    /// this source. Structural mismatches return `false`, never an error;
    /// routine failure is the whole point of verification.
    pub fn verify(&self, master: &PrimaryCredential, source_signature: Option<&SignKeypairSignature>) -> bool {
        let preimage = match master.serialize_public_unsigned() {
            Ok(bytes) => bytes,
            Err(_) => return false,
        };
        match self {
            Self::PubKey { key, .. } => {
                // the master's signing key must be bit-identical to ours, and
                // its self-signature must verify under it
                let master_sign_pub = SignKeypairPublic::from(master.keyset().sign().key().clone());
                if &master_sign_pub != key {
                    return false;
                }
                let self_sig = match master.self_signature() {
                    Some(sig) => sig,
                    None => return false,
                };
                key.verify(self_sig.signature(), &preimage).is_ok()
            }
            Self::Bip47 { code, .. } => match source_signature {
                Some(sig) => code.verify(sig, &preimage),
                None => false,
            },
        }
    }

    /// Produce the external source signature over a master credential. Only
    /// payment-code sources can do this; public-key sources prove linkage via
    /// the master's own self-signature and fail here loudly.
    pub fn sign(&self, seal_key: &SecretKey, master: &PrimaryCredential) -> Result<SignKeypairSignature> {
        match self {
            Self::PubKey { .. } => Err(Error::SourceSignatureNotSupported),
            Self::Bip47 { code, .. } => {
                let preimage = master.serialize_public_unsigned()?;
                code.sign(seal_key, &preimage)
            }
        }
    }
}

impl Public for NymSource {
    fn strip_private(&self) -> Self {
        match self {
            Self::PubKey { version, key } => Self::PubKey {
                version: *version,
                key: key.clone(),
            },
            Self::Bip47 { version, code } => Self::Bip47 {
                version: *version,
                code: code.strip_private(),
            },
        }
    }

    fn has_private(&self) -> bool {
        match self {
            Self::PubKey { .. } => false,
            Self::Bip47 { code, .. } => code.has_private(),
        }
    }
}

impl SerdeBinary for NymSource {}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    #[test]
    fn payment_code_base58_roundtrip() {
        let mut rng = crate::util::test::rng();
        let seal_key = SecretKey::new_xchacha20poly1305(&mut rng).unwrap();
        let code = PaymentCode::generate(&mut rng, &seal_key, 1).unwrap();
        let string = code.to_base58();
        let code2 = PaymentCode::from_base58(&string).unwrap();
        assert_eq!(code.strip_private(), code2);
        assert!(!code2.has_private());
        // flipping a character breaks the checksum
        let mut broken = string.clone();
        let swap = if broken.ends_with('a') { 'b' } else { 'a' };
        broken.pop();
        broken.push(swap);
        assert!(PaymentCode::from_base58(&broken).is_err());
    }

    #[test]
    fn payment_code_from_seed_determinism() {
        let mut rng = crate::util::test::rng();
        let seal_key = SecretKey::new_xchacha20poly1305(&mut rng).unwrap();
        let code1 = PaymentCode::from_seed(&mut rng, &seal_key, 1, b"one seed to rule them all").unwrap();
        let code2 = PaymentCode::from_seed(&mut rng, &seal_key, 1, b"one seed to rule them all").unwrap();
        assert_eq!(code1.strip_private(), code2.strip_private());
        let code3 = PaymentCode::from_seed(&mut rng, &seal_key, 1, b"a different seed").unwrap();
        assert!(code1.strip_private() != code3.strip_private());
    }

    #[test]
    fn payment_code_sign_verify() {
        let mut rng = crate::util::test::rng();
        let seal_key = SecretKey::new_xchacha20poly1305(&mut rng).unwrap();
        let code = PaymentCode::generate(&mut rng, &seal_key, 1).unwrap();
        let sig = code.sign(&seal_key, b"notify me").unwrap();
        assert!(code.verify(&sig, b"notify me"));
        assert!(!code.verify(&sig, b"notify someone else"));
        // a public-only code cannot sign
        let public = code.strip_private();
        assert_eq!(public.sign(&seal_key, b"notify me").err(), Some(Error::CryptoKeyMissing));
    }

    #[test]
    fn source_derive_id_deterministic() {
        let mut rng = crate::util::test::rng();
        let seal_key = SecretKey::new_xchacha20poly1305(&mut rng).unwrap();
        let keypair = SignKeypair::new_ed25519(&mut rng, &seal_key).unwrap();
        let source = NymSource::new_pubkey(1, SignKeypairPublic::from(keypair));
        let id1 = source.derive_id().unwrap();
        let id2 = source.derive_id().unwrap();
        assert_eq!(id1, id2);

        let code = PaymentCode::generate(&mut rng, &seal_key, 1).unwrap();
        let source2 = NymSource::new_bip47(1, code.clone());
        let id3 = source2.derive_id().unwrap();
        assert!(id1 != id3);
        // stripping the private half must not change the id
        let source2_pub = source2.strip_private();
        assert_eq!(source2_pub.derive_id().unwrap(), id3);
    }
}

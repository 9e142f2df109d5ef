use crate::{
    crypto::{
        base::{KeyAlgo, SecretKey},
        private::Private,
    },
    error::{Error, Result},
    util::{
        ser::{Binary, BinarySecret},
        Public,
    },
};
use k256::{
    ecdsa::signature::{Signer, Verifier},
    elliptic_curve::sec1::ToEncodedPoint,
};
use rand::{CryptoRng, RngCore};
use rasn::{AsnType, Decode, Decoder, Encode, Encoder};
use serde_derive::{Deserialize, Serialize};
use std::ops::Deref;

/// A signature derived from a signing keypair.
#[derive(Debug, Clone, PartialEq, Eq, AsnType, Encode, Decode, Serialize, Deserialize)]
#[rasn(choice)]
pub enum SignKeypairSignature {
    #[rasn(tag(explicit(0)))]
    Ed25519(Binary<64>),
    #[rasn(tag(explicit(1)))]
    Secp256k1(Binary<64>),
}

impl AsRef<[u8]> for SignKeypairSignature {
    fn as_ref(&self) -> &[u8] {
        match self {
            Self::Ed25519(sig) => sig.as_ref(),
            Self::Secp256k1(sig) => sig.as_ref(),
        }
    }
}

/// An asymmetric signing keypair.
#[derive(Debug, Serialize, Deserialize, AsnType, Encode, Decode)]
#[rasn(choice)]
pub enum SignKeypair {
    /// Ed25519 signing keypair
    #[rasn(tag(explicit(0)))]
    Ed25519 {
        #[rasn(tag(explicit(0)))]
        public: Binary<32>,
        #[rasn(tag(explicit(1)))]
        secret: Option<Private<BinarySecret<32>>>,
    },
    /// secp256k1 ECDSA signing keypair
    #[rasn(tag(explicit(1)))]
    Secp256k1 {
        #[rasn(tag(explicit(0)))]
        public: Binary<33>,
        #[rasn(tag(explicit(1)))]
        secret: Option<Private<BinarySecret<32>>>,
    },
}

impl Clone for SignKeypair {
    fn clone(&self) -> Self {
        match self {
            Self::Ed25519 { public, secret } => Self::Ed25519 {
                public: public.clone(),
                secret: secret.as_ref().cloned(),
            },
            Self::Secp256k1 { public, secret } => Self::Secp256k1 {
                public: public.clone(),
                secret: secret.as_ref().cloned(),
            },
        }
    }
}

impl SignKeypair {
    fn new_ed25519_from_secret<R: RngCore + CryptoRng>(
        rng: &mut R,
        seal_key: &SecretKey,
        secret: ed25519_consensus::SigningKey,
    ) -> Result<Self> {
        let public = secret.verification_key();
        Ok(Self::Ed25519 {
            public: Binary::new(public.to_bytes()),
            secret: Some(Private::seal(rng, seal_key, &BinarySecret::new(secret.to_bytes()))?),
        })
    }

    fn new_secp256k1_from_secret<R: RngCore + CryptoRng>(
        rng: &mut R,
        seal_key: &SecretKey,
        secret: k256::ecdsa::SigningKey,
    ) -> Result<Self> {
        let public = secret.verifying_key().to_encoded_point(true);
        let public_bytes: [u8; 33] = public.as_bytes().try_into().map_err(|_| Error::BadLength)?;
        let secret_bytes: [u8; 32] = secret.to_bytes().into();
        Ok(Self::Secp256k1 {
            public: Binary::new(public_bytes),
            secret: Some(Private::seal(rng, seal_key, &BinarySecret::new(secret_bytes))?),
        })
    }

    /// Create a new ed25519 keypair
    pub fn new_ed25519<R: RngCore + CryptoRng>(rng: &mut R, seal_key: &SecretKey) -> Result<Self> {
        let mut randbuf = [0u8; 32];
        rng.fill_bytes(&mut randbuf);
        let secret = ed25519_consensus::SigningKey::from(randbuf);
        Self::new_ed25519_from_secret(rng, seal_key, secret)
    }

    /// Create a new ed25519 keypair from a cryptographic seed
    pub fn new_ed25519_from_seed<R: RngCore + CryptoRng>(rng: &mut R, seal_key: &SecretKey, seed: [u8; 32]) -> Result<Self> {
        let secret = ed25519_consensus::SigningKey::from(seed);
        Self::new_ed25519_from_secret(rng, seal_key, secret)
    }

    /// Create a new secp256k1 keypair
    pub fn new_secp256k1<R: RngCore + CryptoRng>(rng: &mut R, seal_key: &SecretKey) -> Result<Self> {
        let secret = k256::ecdsa::SigningKey::random(rng);
        Self::new_secp256k1_from_secret(rng, seal_key, secret)
    }

    /// Create a new secp256k1 keypair from a cryptographic seed
    pub fn new_secp256k1_from_seed<R: RngCore + CryptoRng>(rng: &mut R, seal_key: &SecretKey, seed: [u8; 32]) -> Result<Self> {
        let secret = k256::ecdsa::SigningKey::from_slice(&seed[..]).map_err(|_| Error::CryptoBadSeed)?;
        Self::new_secp256k1_from_secret(rng, seal_key, secret)
    }

    /// Create a new keypair of the given algorithm. Algorithms the provider
    /// recognizes but cannot generate return [`Error::CryptoAlgoUnsupported`],
    /// which lets callers run their fallback logic.
    pub fn new<R: RngCore + CryptoRng>(rng: &mut R, algo: KeyAlgo, seal_key: &SecretKey) -> Result<Self> {
        match algo {
            KeyAlgo::Ed25519 => Self::new_ed25519(rng, seal_key),
            KeyAlgo::Secp256k1 => Self::new_secp256k1(rng, seal_key),
            KeyAlgo::Rsa => Err(Error::CryptoAlgoUnsupported),
        }
    }

    /// Create a new keypair of the given algorithm from a cryptographic seed.
    pub fn new_from_seed<R: RngCore + CryptoRng>(rng: &mut R, algo: KeyAlgo, seal_key: &SecretKey, seed: [u8; 32]) -> Result<Self> {
        match algo {
            KeyAlgo::Ed25519 => Self::new_ed25519_from_seed(rng, seal_key, seed),
            KeyAlgo::Secp256k1 => Self::new_secp256k1_from_seed(rng, seal_key, seed),
            KeyAlgo::Rsa => Err(Error::CryptoAlgoUnsupported),
        }
    }

    /// Which algorithm this keypair speaks.
    pub fn algo(&self) -> KeyAlgo {
        match self {
            Self::Ed25519 { .. } => KeyAlgo::Ed25519,
            Self::Secp256k1 { .. } => KeyAlgo::Secp256k1,
        }
    }

    /// Sign a value with our secret signing key.
    ///
    /// Must be unlocked via our seal key.
    pub fn sign(&self, seal_key: &SecretKey, data: &[u8]) -> Result<SignKeypairSignature> {
        match self {
            Self::Ed25519 { secret: ref sec_locked_opt, .. } => {
                let sec_locked = sec_locked_opt.as_ref().ok_or(Error::CryptoKeyMissing)?;
                let sec_bytes: [u8; 32] = *sec_locked.open(seal_key)?.expose_secret();
                let seckey = ed25519_consensus::SigningKey::from(sec_bytes);
                let sig = seckey.sign(data);
                Ok(SignKeypairSignature::Ed25519(Binary::new(sig.to_bytes())))
            }
            Self::Secp256k1 { secret: ref sec_locked_opt, .. } => {
                let sec_locked = sec_locked_opt.as_ref().ok_or(Error::CryptoKeyMissing)?;
                let sec_bytes: [u8; 32] = *sec_locked.open(seal_key)?.expose_secret();
                let seckey = k256::ecdsa::SigningKey::from_slice(&sec_bytes[..]).map_err(|_| Error::CryptoBadSeed)?;
                let sig: k256::ecdsa::Signature = seckey.sign(data);
                let sig_bytes: [u8; 64] = sig.to_bytes().into();
                Ok(SignKeypairSignature::Secp256k1(Binary::new(sig_bytes)))
            }
        }
    }

    /// Verify a value with a detached signature given the public key of the
    /// signer.
    pub fn verify(&self, signature: &SignKeypairSignature, data: &[u8]) -> Result<()> {
        match (self, signature) {
            (Self::Ed25519 { public: ref pubkey_bytes, .. }, SignKeypairSignature::Ed25519(ref sig_bytes)) => {
                let pubkey = ed25519_consensus::VerificationKey::try_from(*pubkey_bytes.deref())
                    .map_err(|_| Error::CryptoSignatureVerificationFailed)?;
                let sig = ed25519_consensus::Signature::from(*sig_bytes.deref());
                pubkey.verify(&sig, data).map_err(|_| Error::CryptoSignatureVerificationFailed)?;
                Ok(())
            }
            (Self::Secp256k1 { public: ref pubkey_bytes, .. }, SignKeypairSignature::Secp256k1(ref sig_bytes)) => {
                let pubkey = k256::ecdsa::VerifyingKey::from_sec1_bytes(pubkey_bytes.as_ref())
                    .map_err(|_| Error::CryptoSignatureVerificationFailed)?;
                let sig = k256::ecdsa::Signature::from_slice(sig_bytes.as_ref())
                    .map_err(|_| Error::CryptoSignatureVerificationFailed)?;
                pubkey.verify(data, &sig).map_err(|_| Error::CryptoSignatureVerificationFailed)?;
                Ok(())
            }
            _ => Err(Error::CryptoAlgoMismatch),
        }
    }

    /// Re-encrypt this signing keypair with a new seal key.
    pub fn reencrypt<R: RngCore + CryptoRng>(self, rng: &mut R, previous_seal_key: &SecretKey, new_seal_key: &SecretKey) -> Result<Self> {
        match self {
            Self::Ed25519 { public, secret: Some(private) } => Ok(Self::Ed25519 {
                public,
                secret: Some(private.reencrypt(rng, previous_seal_key, new_seal_key)?),
            }),
            Self::Secp256k1 { public, secret: Some(private) } => Ok(Self::Secp256k1 {
                public,
                secret: Some(private.reencrypt(rng, previous_seal_key, new_seal_key)?),
            }),
            _ => Err(Error::CryptoKeyMissing),
        }
    }
}

impl Public for SignKeypair {
    fn strip_private(&self) -> Self {
        match self {
            Self::Ed25519 { public, .. } => Self::Ed25519 {
                public: public.clone(),
                secret: None,
            },
            Self::Secp256k1 { public, .. } => Self::Secp256k1 {
                public: public.clone(),
                secret: None,
            },
        }
    }

    fn has_private(&self) -> bool {
        match self {
            Self::Ed25519 { secret, .. } => secret.is_some(),
            Self::Secp256k1 { secret, .. } => secret.is_some(),
        }
    }
}

impl PartialEq for SignKeypair {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Ed25519 { public: public1, .. }, Self::Ed25519 { public: public2, .. }) => public1 == public2,
            (Self::Secp256k1 { public: public1, .. }, Self::Secp256k1 { public: public2, .. }) => public1 == public2,
            _ => false,
        }
    }
}

/// An asymmetric signing public key.
#[derive(Debug, Clone, PartialEq, Eq, AsnType, Encode, Decode, Serialize, Deserialize)]
#[rasn(choice)]
pub enum SignKeypairPublic {
    /// Ed25519 signing public key
    #[rasn(tag(explicit(0)))]
    Ed25519(Binary<32>),
    /// secp256k1 signing public key (SEC1 compressed)
    #[rasn(tag(explicit(1)))]
    Secp256k1(Binary<33>),
}

impl SignKeypairPublic {
    /// Verify a value with a detached signature given the public key of the
    /// signer.
    pub fn verify(&self, signature: &SignKeypairSignature, data: &[u8]) -> Result<()> {
        // this clone()s, but at least we aren't duplicating code
        let keypair = match self {
            Self::Ed25519(public) => SignKeypair::Ed25519 {
                public: public.clone(),
                secret: None,
            },
            Self::Secp256k1(public) => SignKeypair::Secp256k1 {
                public: public.clone(),
                secret: None,
            },
        };
        keypair.verify(signature, data)
    }

    /// Which algorithm this key speaks.
    pub fn algo(&self) -> KeyAlgo {
        match self {
            Self::Ed25519(..) => KeyAlgo::Ed25519,
            Self::Secp256k1(..) => KeyAlgo::Secp256k1,
        }
    }

    /// The raw public key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Ed25519(bin) => bin.as_ref(),
            Self::Secp256k1(bin) => bin.as_ref(),
        }
    }
}

impl From<SignKeypair> for SignKeypairPublic {
    fn from(kp: SignKeypair) -> Self {
        match kp {
            SignKeypair::Ed25519 { public, .. } => Self::Ed25519(public),
            SignKeypair::Secp256k1 { public, .. } => Self::Secp256k1(public),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    #[test]
    fn signkeypair_ed25519_sign_verify() {
        let mut rng = crate::util::test::rng();
        let seal_key = SecretKey::new_xchacha20poly1305(&mut rng).unwrap();
        let our_keypair = SignKeypair::new_ed25519(&mut rng, &seal_key).unwrap();

        let msg_real = String::from("the old man leaned back in his chair, his face weathered by the ceaseless march of time");
        let msg_fake = String::from("the old man leaned back in his chair, his face weathered by the ceaseless march of NATUREFRESH MILK");
        let sig = our_keypair.sign(&seal_key, msg_real.as_bytes()).unwrap();
        assert_eq!(our_keypair.verify(&sig, msg_real.as_bytes()), Ok(()));
        assert_eq!(
            our_keypair.verify(&sig, msg_fake.as_bytes()),
            Err(Error::CryptoSignatureVerificationFailed)
        );
    }

    #[test]
    fn signkeypair_secp256k1_sign_verify() {
        let mut rng = crate::util::test::rng();
        let seal_key = SecretKey::new_xchacha20poly1305(&mut rng).unwrap();
        let our_keypair = SignKeypair::new_secp256k1(&mut rng, &seal_key).unwrap();

        let msg_real = String::from("septic tank pumping service: we're number one in the number two business");
        let msg_fake = String::from("septic tank pumping service: we're number two in the number one business");
        let sig = our_keypair.sign(&seal_key, msg_real.as_bytes()).unwrap();
        assert_eq!(our_keypair.verify(&sig, msg_real.as_bytes()), Ok(()));
        assert_eq!(
            our_keypair.verify(&sig, msg_fake.as_bytes()),
            Err(Error::CryptoSignatureVerificationFailed)
        );
    }

    #[test]
    fn signkeypair_seed_determinism() {
        let mut rng = crate::util::test::rng();
        let seal_key = SecretKey::new_xchacha20poly1305(&mut rng).unwrap();
        let seed = [14u8; 32];
        let kp1 = SignKeypair::new_ed25519_from_seed(&mut rng, &seal_key, seed).unwrap();
        let kp2 = SignKeypair::new_ed25519_from_seed(&mut rng, &seal_key, seed).unwrap();
        assert_eq!(kp1, kp2);

        let kp3 = SignKeypair::new_secp256k1_from_seed(&mut rng, &seal_key, seed).unwrap();
        let kp4 = SignKeypair::new_secp256k1_from_seed(&mut rng, &seal_key, seed).unwrap();
        assert_eq!(kp3, kp4);
        assert!(SignKeypairPublic::from(kp1) != SignKeypairPublic::from(kp3));
    }

    #[test]
    fn signkeypair_rsa_unsupported() {
        let mut rng = crate::util::test::rng();
        let seal_key = SecretKey::new_xchacha20poly1305(&mut rng).unwrap();
        let res = SignKeypair::new(&mut rng, KeyAlgo::Rsa, &seal_key);
        assert_eq!(res.err(), Some(Error::CryptoAlgoUnsupported));
    }

    #[test]
    fn signkeypair_algo_mismatch() {
        let mut rng = crate::util::test::rng();
        let seal_key = SecretKey::new_xchacha20poly1305(&mut rng).unwrap();
        let ed = SignKeypair::new_ed25519(&mut rng, &seal_key).unwrap();
        let secp = SignKeypair::new_secp256k1(&mut rng, &seal_key).unwrap();
        let sig = ed.sign(&seal_key, b"hi my name is butch").unwrap();
        assert_eq!(secp.verify(&sig, b"hi my name is butch"), Err(Error::CryptoAlgoMismatch));
    }

    #[test]
    fn signkeypair_strip_has_private() {
        let mut rng = crate::util::test::rng();
        let seal_key = SecretKey::new_xchacha20poly1305(&mut rng).unwrap();
        let keypair = SignKeypair::new_secp256k1(&mut rng, &seal_key).unwrap();
        assert!(keypair.has_private());
        let keypair_pub = keypair.strip_private();
        assert!(!keypair_pub.has_private());
        let res = keypair_pub.sign(&seal_key, b"please");
        assert_eq!(res.err(), Some(Error::CryptoKeyMissing));
    }

    #[test]
    fn signkeypair_reencrypt() {
        let mut rng = crate::util::test::rng();
        let seal_key1 = SecretKey::new_xchacha20poly1305(&mut rng).unwrap();
        let seal_key2 = SecretKey::new_xchacha20poly1305(&mut rng).unwrap();
        assert!(seal_key1 != seal_key2);
        let keypair = SignKeypair::new_ed25519(&mut rng, &seal_key1).unwrap();
        let data = vec![1, 2, 3, 4, 5];
        let sig1 = keypair.sign(&seal_key1, data.as_slice()).unwrap();
        let keypair = keypair.reencrypt(&mut rng, &seal_key1, &seal_key2).unwrap();
        let sig2 = keypair.sign(&seal_key2, data.as_slice()).unwrap();
        assert_eq!(sig1, sig2);
        let res = keypair.sign(&seal_key1, data.as_slice());
        assert_eq!(res.err(), Some(Error::CryptoOpenFailed));
    }
}

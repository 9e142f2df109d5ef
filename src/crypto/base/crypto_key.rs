use crate::{
    crypto::{
        base::{stretch_key, KeyAlgo, SecretKey},
        private::Private,
    },
    error::{Error, Result},
    util::{
        ser::{Binary, BinarySecret, SerdeBinary},
        Public,
    },
};
use chacha20poly1305::aead::Aead;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use rand::{CryptoRng, RngCore};
use rasn::{AsnType, Decode, Decoder, Encode, Encoder};
use serde_derive::{Deserialize, Serialize};
use std::ops::Deref;

/// An ECDH-derived short value used to identify which of several candidate
/// keys was used to encrypt a symmetric key. Comparison is constant-time.
#[derive(Debug, Clone, AsnType, Encode, Decode, Serialize, Deserialize)]
#[rasn(delegate)]
pub struct SessionTag(Binary<32>);

impl SessionTag {
    /// Compare two tags without leaking where they diverge.
    pub fn verify(&self, other: &SessionTag) -> bool {
        use subtle::ConstantTimeEq;
        self.0.as_ref().ct_eq(other.0.as_ref()).into()
    }
}

impl SerdeBinary for SessionTag {}

/// An asymmetric encryption keypair.
///
/// Beyond sealing/opening messages, these keys drive the session negotiation
/// protocol: a sender computes a [`SessionTag`] from an ECDH exchange with one
/// of our public keys, and we try our candidate keys until one reproduces the
/// tag (see [Authority::unlock][crate::identity::authority::Authority::unlock]).
#[derive(Debug, AsnType, Encode, Decode, Serialize, Deserialize)]
#[rasn(choice)]
pub enum CryptoKeypair {
    /// Curve25519 agreement + XChaCha20Poly1305, paired with ed25519 signing
    /// credentials.
    #[rasn(tag(explicit(0)))]
    Curve25519XChaCha20Poly1305 {
        #[rasn(tag(explicit(0)))]
        public: Binary<32>,
        #[rasn(tag(explicit(1)))]
        secret: Option<Private<BinarySecret<32>>>,
    },
    /// secp256k1 ECDH + XChaCha20Poly1305, paired with secp256k1 signing
    /// credentials.
    #[rasn(tag(explicit(1)))]
    Secp256k1XChaCha20Poly1305 {
        #[rasn(tag(explicit(0)))]
        public: Binary<33>,
        #[rasn(tag(explicit(1)))]
        secret: Option<Private<BinarySecret<32>>>,
    },
}

impl Clone for CryptoKeypair {
    fn clone(&self) -> Self {
        match self {
            Self::Curve25519XChaCha20Poly1305 { public, secret } => Self::Curve25519XChaCha20Poly1305 {
                public: public.clone(),
                secret: secret.as_ref().cloned(),
            },
            Self::Secp256k1XChaCha20Poly1305 { public, secret } => Self::Secp256k1XChaCha20Poly1305 {
                public: public.clone(),
                secret: secret.as_ref().cloned(),
            },
        }
    }
}

impl CryptoKeypair {
    /// Create a new curve25519/xchacha20poly1305 keypair
    pub fn new_curve25519xchacha20poly1305<R: RngCore + CryptoRng>(rng: &mut R, seal_key: &SecretKey) -> Result<Self> {
        let mut seed = [0u8; 32];
        rng.fill_bytes(&mut seed);
        Self::new_curve25519xchacha20poly1305_from_seed(rng, seal_key, seed)
    }

    /// Create a new curve25519/xchacha20poly1305 keypair from a seed
    pub fn new_curve25519xchacha20poly1305_from_seed<R: RngCore + CryptoRng>(
        rng: &mut R,
        seal_key: &SecretKey,
        seed: [u8; 32],
    ) -> Result<Self> {
        let secret = x25519_dalek::StaticSecret::from(seed);
        let public = x25519_dalek::PublicKey::from(&secret);
        Ok(Self::Curve25519XChaCha20Poly1305 {
            public: Binary::new(public.to_bytes()),
            secret: Some(Private::seal(rng, seal_key, &BinarySecret::new(secret.to_bytes()))?),
        })
    }

    /// Create a new secp256k1/xchacha20poly1305 keypair
    pub fn new_secp256k1xchacha20poly1305<R: RngCore + CryptoRng>(rng: &mut R, seal_key: &SecretKey) -> Result<Self> {
        let secret = k256::SecretKey::random(rng);
        Self::new_secp256k1_from_secret(rng, seal_key, secret)
    }

    /// Create a new secp256k1/xchacha20poly1305 keypair from a seed
    pub fn new_secp256k1xchacha20poly1305_from_seed<R: RngCore + CryptoRng>(
        rng: &mut R,
        seal_key: &SecretKey,
        seed: [u8; 32],
    ) -> Result<Self> {
        let secret = k256::SecretKey::from_slice(&seed[..]).map_err(|_| Error::CryptoBadSeed)?;
        Self::new_secp256k1_from_secret(rng, seal_key, secret)
    }

    fn new_secp256k1_from_secret<R: RngCore + CryptoRng>(rng: &mut R, seal_key: &SecretKey, secret: k256::SecretKey) -> Result<Self> {
        let public = secret.public_key().to_encoded_point(true);
        let public_bytes: [u8; 33] = public.as_bytes().try_into().map_err(|_| Error::BadLength)?;
        let secret_bytes: [u8; 32] = secret.to_bytes().into();
        Ok(Self::Secp256k1XChaCha20Poly1305 {
            public: Binary::new(public_bytes),
            secret: Some(Private::seal(rng, seal_key, &BinarySecret::new(secret_bytes))?),
        })
    }

    /// Create a new keypair of the given algorithm.
    pub fn new<R: RngCore + CryptoRng>(rng: &mut R, algo: KeyAlgo, seal_key: &SecretKey) -> Result<Self> {
        match algo {
            KeyAlgo::Ed25519 => Self::new_curve25519xchacha20poly1305(rng, seal_key),
            KeyAlgo::Secp256k1 => Self::new_secp256k1xchacha20poly1305(rng, seal_key),
            KeyAlgo::Rsa => Err(Error::CryptoAlgoUnsupported),
        }
    }

    /// Create a new keypair of the given algorithm from a cryptographic seed.
    pub fn new_from_seed<R: RngCore + CryptoRng>(rng: &mut R, algo: KeyAlgo, seal_key: &SecretKey, seed: [u8; 32]) -> Result<Self> {
        match algo {
            KeyAlgo::Ed25519 => Self::new_curve25519xchacha20poly1305_from_seed(rng, seal_key, seed),
            KeyAlgo::Secp256k1 => Self::new_secp256k1xchacha20poly1305_from_seed(rng, seal_key, seed),
            KeyAlgo::Rsa => Err(Error::CryptoAlgoUnsupported),
        }
    }

    /// Which algorithm family this keypair belongs to.
    pub fn algo(&self) -> KeyAlgo {
        match self {
            Self::Curve25519XChaCha20Poly1305 { .. } => KeyAlgo::Ed25519,
            Self::Secp256k1XChaCha20Poly1305 { .. } => KeyAlgo::Secp256k1,
        }
    }

    /// Anonymously encrypt a message using the recipient's public key. The
    /// ephemeral public key rides along in front of the ciphertext.
    pub fn seal_anonymous<R: RngCore + CryptoRng>(&self, rng: &mut R, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::Curve25519XChaCha20Poly1305 { public: ref pubkey, .. } => {
                let ephemeral_secret = crypto_box::SecretKey::generate(rng);
                let ephemeral_pubkey = ephemeral_secret.public_key();
                let cardboard_box = crypto_box::ChaChaBox::new(&crypto_box::PublicKey::from(*pubkey.deref()), &ephemeral_secret);
                let nonce_hash = blake3::hash(&[&ephemeral_pubkey.as_bytes()[..], &pubkey.deref()[..]].concat());
                let nonce_arr: [u8; 24] = nonce_hash.as_bytes()[0..24].try_into().map_err(|_| Error::CryptoSealFailed)?;
                let mut enc = cardboard_box
                    .encrypt(&nonce_arr.into(), data)
                    .map_err(|_| Error::CryptoSealFailed)?;
                let mut out = Vec::from(&ephemeral_pubkey.as_bytes()[..]);
                out.append(&mut enc);
                Ok(out)
            }
            Self::Secp256k1XChaCha20Poly1305 { public: ref pubkey, .. } => {
                let ephemeral_secret = k256::SecretKey::random(rng);
                let ephemeral_pubkey = ephemeral_secret.public_key().to_encoded_point(true);
                let recipient = k256::PublicKey::from_sec1_bytes(pubkey.as_ref()).map_err(|_| Error::CryptoSealFailed)?;
                let shared = k256::ecdh::diffie_hellman(ephemeral_secret.to_nonzero_scalar(), recipient.as_affine());
                let mut key_bytes = [0u8; 32];
                stretch_key(shared.raw_secret_bytes().as_slice(), &mut key_bytes, Some(b"nym/seal"), None)?;
                let key = SecretKey::new_xchacha20poly1305_from_bytes(key_bytes)?;
                let sealed = key.seal(rng, data)?;
                let mut out = Vec::from(ephemeral_pubkey.as_bytes());
                out.append(&mut sealed.serialize_binary()?);
                Ok(out)
            }
        }
    }

    /// Open an anonymous message encrypted with our public key. Requires our
    /// seal key to unlock our private key.
    pub fn open_anonymous(&self, seal_key: &SecretKey, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::Curve25519XChaCha20Poly1305 {
                public: ref pubkey,
                secret: ref seckey_opt,
            } => {
                if data.len() < 32 {
                    Err(Error::CryptoOpenFailed)?;
                }
                let seckey_sealed = seckey_opt.as_ref().ok_or(Error::CryptoKeyMissing)?;
                let seckey = crypto_box::SecretKey::from(*seckey_sealed.open(seal_key)?.expose_secret());
                let ephemeral_pubkey_arr: [u8; 32] = data[0..32].try_into().map_err(|_| Error::CryptoOpenFailed)?;
                let ephemeral_pubkey = crypto_box::PublicKey::from(ephemeral_pubkey_arr);
                let cardboard_box = crypto_box::ChaChaBox::new(&ephemeral_pubkey, &seckey);
                let nonce_hash = blake3::hash(&[&ephemeral_pubkey.as_bytes()[..], &pubkey.deref()[..]].concat());
                let nonce_arr: [u8; 24] = nonce_hash.as_bytes()[0..24].try_into().map_err(|_| Error::CryptoOpenFailed)?;
                cardboard_box
                    .decrypt(&nonce_arr.into(), &data[32..])
                    .map_err(|_| Error::CryptoOpenFailed)
            }
            Self::Secp256k1XChaCha20Poly1305 { secret: ref seckey_opt, .. } => {
                if data.len() < 33 {
                    Err(Error::CryptoOpenFailed)?;
                }
                let seckey_sealed = seckey_opt.as_ref().ok_or(Error::CryptoKeyMissing)?;
                let seckey = k256::SecretKey::from_slice(&seckey_sealed.open(seal_key)?.expose_secret()[..])
                    .map_err(|_| Error::CryptoOpenFailed)?;
                let ephemeral_pubkey = k256::PublicKey::from_sec1_bytes(&data[0..33]).map_err(|_| Error::CryptoOpenFailed)?;
                let shared = k256::ecdh::diffie_hellman(seckey.to_nonzero_scalar(), ephemeral_pubkey.as_affine());
                let mut key_bytes = [0u8; 32];
                stretch_key(shared.raw_secret_bytes().as_slice(), &mut key_bytes, Some(b"nym/seal"), None)?;
                let key = SecretKey::new_xchacha20poly1305_from_bytes(key_bytes)?;
                let sealed = crate::crypto::base::Sealed::deserialize_binary(&data[33..]).map_err(|_| Error::CryptoOpenFailed)?;
                key.open(&sealed)
            }
        }
    }

    /// Compute the raw ECDH shared secret between our private key and the
    /// given public DH key. Fails with [`Error::CryptoAlgoMismatch`] when the
    /// two keys live on different curves.
    fn shared_secret(&self, seal_key: &SecretKey, dh_key: &CryptoKeypairPublic) -> Result<[u8; 32]> {
        match (self, dh_key) {
            (
                Self::Curve25519XChaCha20Poly1305 { secret: ref seckey_opt, .. },
                CryptoKeypairPublic::Curve25519XChaCha20Poly1305(ref their_pub),
            ) => {
                let seckey_sealed = seckey_opt.as_ref().ok_or(Error::CryptoKeyMissing)?;
                let seckey = x25519_dalek::StaticSecret::from(*seckey_sealed.open(seal_key)?.expose_secret());
                let shared = seckey.diffie_hellman(&x25519_dalek::PublicKey::from(*their_pub.deref()));
                Ok(*shared.as_bytes())
            }
            (
                Self::Secp256k1XChaCha20Poly1305 { secret: ref seckey_opt, .. },
                CryptoKeypairPublic::Secp256k1XChaCha20Poly1305(ref their_pub),
            ) => {
                let seckey_sealed = seckey_opt.as_ref().ok_or(Error::CryptoKeyMissing)?;
                let seckey = k256::SecretKey::from_slice(&seckey_sealed.open(seal_key)?.expose_secret()[..])
                    .map_err(|_| Error::CryptoBadSeed)?;
                let their_pub = k256::PublicKey::from_sec1_bytes(their_pub.as_ref()).map_err(|_| Error::CryptoBadSeed)?;
                let shared = k256::ecdh::diffie_hellman(seckey.to_nonzero_scalar(), their_pub.as_affine());
                let arr: [u8; 32] = (*shared.raw_secret_bytes()).into();
                Ok(arr)
            }
            _ => Err(Error::CryptoAlgoMismatch),
        }
    }

    /// Derive the session tag for a DH exchange with this key, bound to the
    /// given context (we use the owning authority's master id). Both sides of
    /// the exchange arrive at the same tag without revealing which key was
    /// used.
    pub fn session_tag(&self, seal_key: &SecretKey, dh_key: &CryptoKeypairPublic, context: &[u8]) -> Result<SessionTag> {
        let shared = self.shared_secret(seal_key, dh_key)?;
        let mut tag = [0u8; 32];
        stretch_key(&shared[..], &mut tag, Some(b"nym/session-tag"), Some(context))?;
        Ok(SessionTag(Binary::new(tag)))
    }

    /// Derive the session key for a DH exchange with this key. Whoever holds
    /// the matching tag can derive the same key and seal a payload to it.
    pub fn session_key(&self, seal_key: &SecretKey, dh_key: &CryptoKeypairPublic) -> Result<SecretKey> {
        let shared = self.shared_secret(seal_key, dh_key)?;
        let mut key_bytes = [0u8; 32];
        stretch_key(&shared[..], &mut key_bytes, Some(b"nym/session-key"), None)?;
        SecretKey::new_xchacha20poly1305_from_bytes(key_bytes)
    }

    /// Re-encrypt this keypair with a new seal key.
    pub fn reencrypt<R: RngCore + CryptoRng>(self, rng: &mut R, previous_seal_key: &SecretKey, new_seal_key: &SecretKey) -> Result<Self> {
        match self {
            Self::Curve25519XChaCha20Poly1305 { public, secret: Some(private) } => Ok(Self::Curve25519XChaCha20Poly1305 {
                public,
                secret: Some(private.reencrypt(rng, previous_seal_key, new_seal_key)?),
            }),
            Self::Secp256k1XChaCha20Poly1305 { public, secret: Some(private) } => Ok(Self::Secp256k1XChaCha20Poly1305 {
                public,
                secret: Some(private.reencrypt(rng, previous_seal_key, new_seal_key)?),
            }),
            _ => Err(Error::CryptoKeyMissing),
        }
    }
}

impl Public for CryptoKeypair {
    fn strip_private(&self) -> Self {
        match self {
            Self::Curve25519XChaCha20Poly1305 { public, .. } => Self::Curve25519XChaCha20Poly1305 {
                public: public.clone(),
                secret: None,
            },
            Self::Secp256k1XChaCha20Poly1305 { public, .. } => Self::Secp256k1XChaCha20Poly1305 {
                public: public.clone(),
                secret: None,
            },
        }
    }

    fn has_private(&self) -> bool {
        match self {
            Self::Curve25519XChaCha20Poly1305 { secret, .. } => secret.is_some(),
            Self::Secp256k1XChaCha20Poly1305 { secret, .. } => secret.is_some(),
        }
    }
}

impl PartialEq for CryptoKeypair {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Curve25519XChaCha20Poly1305 { public: p1, .. }, Self::Curve25519XChaCha20Poly1305 { public: p2, .. }) => p1 == p2,
            (Self::Secp256k1XChaCha20Poly1305 { public: p1, .. }, Self::Secp256k1XChaCha20Poly1305 { public: p2, .. }) => p1 == p2,
            _ => false,
        }
    }
}

/// An asymmetric encryption public key.
#[derive(Debug, Clone, PartialEq, Eq, AsnType, Encode, Decode, Serialize, Deserialize)]
#[rasn(choice)]
pub enum CryptoKeypairPublic {
    /// Public key for Curve25519XChaCha20Poly1305
    #[rasn(tag(explicit(0)))]
    Curve25519XChaCha20Poly1305(Binary<32>),
    /// Public key for Secp256k1XChaCha20Poly1305 (SEC1 compressed)
    #[rasn(tag(explicit(1)))]
    Secp256k1XChaCha20Poly1305(Binary<33>),
}

impl CryptoKeypairPublic {
    /// Which algorithm family this key belongs to.
    pub fn algo(&self) -> KeyAlgo {
        match self {
            Self::Curve25519XChaCha20Poly1305(..) => KeyAlgo::Ed25519,
            Self::Secp256k1XChaCha20Poly1305(..) => KeyAlgo::Secp256k1,
        }
    }
}

impl From<CryptoKeypair> for CryptoKeypairPublic {
    fn from(kp: CryptoKeypair) -> Self {
        match kp {
            CryptoKeypair::Curve25519XChaCha20Poly1305 { public, .. } => Self::Curve25519XChaCha20Poly1305(public),
            CryptoKeypair::Secp256k1XChaCha20Poly1305 { public, .. } => Self::Secp256k1XChaCha20Poly1305(public),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    #[test]
    fn cryptokeypair_curve25519_anonymous_enc_dec() {
        let mut rng = crate::util::test::rng();
        let seal_key = SecretKey::new_xchacha20poly1305(&mut rng).unwrap();
        let our_keypair = CryptoKeypair::new_curve25519xchacha20poly1305(&mut rng, &seal_key).unwrap();
        let fake_keypair = CryptoKeypair::new_curve25519xchacha20poly1305(&mut rng, &seal_key).unwrap();

        let message = String::from("HI JERRY I'M BUTCH");
        let sealed = our_keypair.seal_anonymous(&mut rng, message.as_bytes()).unwrap();
        let opened = our_keypair.open_anonymous(&seal_key, &sealed).unwrap();
        assert_eq!(&opened[..], message.as_bytes());

        let opened2 = fake_keypair.open_anonymous(&seal_key, &sealed);
        assert_eq!(opened2.err(), Some(Error::CryptoOpenFailed));
    }

    #[test]
    fn cryptokeypair_secp256k1_anonymous_enc_dec() {
        let mut rng = crate::util::test::rng();
        let seal_key = SecretKey::new_xchacha20poly1305(&mut rng).unwrap();
        let our_keypair = CryptoKeypair::new_secp256k1xchacha20poly1305(&mut rng, &seal_key).unwrap();
        let fake_keypair = CryptoKeypair::new_secp256k1xchacha20poly1305(&mut rng, &seal_key).unwrap();

        let message = String::from("HI JERRY I'M BUTCH");
        let sealed = our_keypair.seal_anonymous(&mut rng, message.as_bytes()).unwrap();
        let opened = our_keypair.open_anonymous(&seal_key, &sealed).unwrap();
        assert_eq!(&opened[..], message.as_bytes());

        let opened2 = fake_keypair.open_anonymous(&seal_key, &sealed);
        assert_eq!(opened2.err(), Some(Error::CryptoOpenFailed));
    }

    #[test]
    fn cryptokeypair_session_tag_agreement() {
        let mut rng_a = crate::util::test::rng();
        let mut rng_b = crate::util::test::rng_seeded(99);
        let seal_key_a = SecretKey::new_xchacha20poly1305(&mut rng_a).unwrap();
        let seal_key_b = SecretKey::new_xchacha20poly1305(&mut rng_b).unwrap();
        let keypair_a = CryptoKeypair::new_secp256k1xchacha20poly1305(&mut rng_a, &seal_key_a).unwrap();
        let keypair_b = CryptoKeypair::new_secp256k1xchacha20poly1305(&mut rng_b, &seal_key_b).unwrap();
        let pub_a = CryptoKeypairPublic::from(keypair_a.clone());
        let pub_b = CryptoKeypairPublic::from(keypair_b.clone());

        let context = b"some authority master id";
        let tag_a = keypair_a.session_tag(&seal_key_a, &pub_b, context).unwrap();
        let tag_b = keypair_b.session_tag(&seal_key_b, &pub_a, context).unwrap();
        assert!(tag_a.verify(&tag_b));

        // different context, different tag
        let tag_c = keypair_b.session_tag(&seal_key_b, &pub_a, b"some other master id").unwrap();
        assert!(!tag_a.verify(&tag_c));

        // session keys agree too
        let mut rng = crate::util::test::rng_seeded(3);
        let key_a = keypair_a.session_key(&seal_key_a, &pub_b).unwrap();
        let key_b = keypair_b.session_key(&seal_key_b, &pub_a).unwrap();
        let sealed = key_a.seal(&mut rng, b"an extremely secret plan").unwrap();
        assert_eq!(key_b.open(&sealed).unwrap().as_slice(), b"an extremely secret plan".as_slice());
    }

    #[test]
    fn cryptokeypair_session_tag_curve25519() {
        let mut rng_a = crate::util::test::rng();
        let mut rng_b = crate::util::test::rng_seeded(42);
        let seal_key_a = SecretKey::new_xchacha20poly1305(&mut rng_a).unwrap();
        let seal_key_b = SecretKey::new_xchacha20poly1305(&mut rng_b).unwrap();
        let keypair_a = CryptoKeypair::new_curve25519xchacha20poly1305(&mut rng_a, &seal_key_a).unwrap();
        let keypair_b = CryptoKeypair::new_curve25519xchacha20poly1305(&mut rng_b, &seal_key_b).unwrap();
        let pub_a = CryptoKeypairPublic::from(keypair_a.clone());
        let pub_b = CryptoKeypairPublic::from(keypair_b.clone());

        let tag_a = keypair_a.session_tag(&seal_key_a, &pub_b, b"ctx").unwrap();
        let tag_b = keypair_b.session_tag(&seal_key_b, &pub_a, b"ctx").unwrap();
        assert!(tag_a.verify(&tag_b));
    }

    #[test]
    fn cryptokeypair_session_cross_algo_fails() {
        let mut rng = crate::util::test::rng();
        let seal_key = SecretKey::new_xchacha20poly1305(&mut rng).unwrap();
        let curve = CryptoKeypair::new_curve25519xchacha20poly1305(&mut rng, &seal_key).unwrap();
        let secp = CryptoKeypair::new_secp256k1xchacha20poly1305(&mut rng, &seal_key).unwrap();
        let secp_pub = CryptoKeypairPublic::from(secp);
        let res = curve.session_tag(&seal_key, &secp_pub, b"ctx");
        assert_eq!(res.err(), Some(Error::CryptoAlgoMismatch));
    }

    #[test]
    fn cryptokeypair_strip_has_private() {
        let mut rng = crate::util::test::rng();
        let seal_key = SecretKey::new_xchacha20poly1305(&mut rng).unwrap();
        let keypair = CryptoKeypair::new_secp256k1xchacha20poly1305(&mut rng, &seal_key).unwrap();
        assert!(keypair.has_private());
        let keypair_pub = keypair.strip_private();
        assert!(!keypair_pub.has_private());
        let res = keypair_pub.open_anonymous(&seal_key, &[0u8; 64]);
        assert_eq!(res.err(), Some(Error::CryptoKeyMissing));
    }
}

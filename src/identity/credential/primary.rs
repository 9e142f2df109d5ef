//! The primary (master) credential: the root of an authority's trust
//! hierarchy. A key credential with no parent, which additionally proves its
//! linkage to the nym's identity source.

use crate::{
    crypto::base::{KeyAlgo, SecretKey, SignKeypairPublic},
    error::Result,
    identity::{
        credential::{
            id_for_preimage, key::{Key, KeyCredential, KeyDerivation, KeyRole, Keyset},
            serialize_form, CredentialCommon, CredentialID, CredentialMode, CredentialMut, CredentialRole, CredentialSignature,
            SignatureRole,
        },
        source::NymSource,
    },
    util::{ser::SerdeBinary, Public},
};
use rand::{CryptoRng, RngCore};
use rasn::{AsnType, Decode, Decoder, Encode, Encoder};
use serde_derive::{Deserialize, Serialize};

/// A boolean permission gated on a specific keypair's capability flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// The master may sign child credentials. Precondition for every
    /// credential-adding operation on the owning authority.
    SignChildCredentials,
}

/// How a master credential proves it was produced by its identity source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsnType, Encode, Decode, Serialize, Deserialize)]
#[rasn(enumerated)]
pub enum SourceProofType {
    /// The master's own self-signature is the proof (public-key sources: the
    /// signing key *is* the source key).
    SelfSignature,
    /// An external signature by the source rides in the signature list with
    /// the [Source][SignatureRole::Source] role (payment-code sources).
    Signature,
}

/// The master credential of an authority.
#[derive(
    Debug, Clone, PartialEq, AsnType, Encode, Decode, Serialize, Deserialize, getset::Getters, getset::MutGetters, getset::Setters,
)]
#[getset(get = "pub", get_mut = "pub(crate)", set = "pub(crate)")]
pub struct PrimaryCredential {
    /// The key credential core.
    #[rasn(tag(explicit(0)))]
    base: KeyCredential,
    /// How this credential proves linkage to its source.
    #[rasn(tag(explicit(1)))]
    proof_type: SourceProofType,
}

impl PrimaryCredential {
    /// Generate a new master credential (with algorithm fallback) and
    /// self-sign it.
    pub fn generate<R: RngCore + CryptoRng>(
        rng: &mut R,
        seal_key: &SecretKey,
        requested: KeyAlgo,
        version: u32,
        proof_type: SourceProofType,
        derivation: Option<&KeyDerivation>,
    ) -> Result<Self> {
        let base = KeyCredential::generate(rng, seal_key, requested, version, CredentialRole::MasterKey, None, derivation)?;
        let mut cred = Self { base, proof_type };
        cred.self_sign(seal_key)?;
        Ok(cred)
    }

    /// The fields every credential shares.
    pub fn common(&self) -> &CredentialCommon {
        self.base.common()
    }

    /// This credential's keyset.
    pub fn keyset(&self) -> &Keyset {
        self.base.keys()
    }

    /// The algorithm this credential's keys were generated with.
    pub fn algo(&self) -> &KeyAlgo {
        self.base.algo()
    }

    /// Grab the keypair for a role.
    pub fn keypair(&self, role: KeyRole) -> Key {
        self.base.keypair(role)
    }

    /// This credential's content-derived id.
    pub fn id(&self) -> Result<CredentialID> {
        id_for_preimage(&self.serialize_public_unsigned()?)
    }

    /// Serialize this credential in one of its canonical forms.
    pub fn serialize(&self, as_private: bool, as_signed: bool) -> Result<Vec<u8>> {
        serialize_form(self, as_private, as_signed)
    }

    /// The id/signature preimage: the public unsigned form.
    pub fn serialize_public_unsigned(&self) -> Result<Vec<u8>> {
        self.serialize(false, false)
    }

    /// Produce the self-signature(s): a public self-signature always, plus a
    /// private one when the credential carries private key halves.
    fn self_sign(&mut self, seal_key: &SecretKey) -> Result<()> {
        let id = self.id()?;
        let preimage = self.serialize_public_unsigned()?;
        let sig = self.base.sign(seal_key, KeyRole::Sign, &preimage)?;
        self.base
            .common_mut()
            .push_signature(CredentialSignature::new(SignatureRole::PublicSelf, id.clone(), sig));
        if self.common().mode() == &CredentialMode::Private {
            let preimage_private = self.serialize(true, false)?;
            let sig_private = self.base.sign(seal_key, KeyRole::Sign, &preimage_private)?;
            self.base
                .common_mut()
                .push_signature(CredentialSignature::new(SignatureRole::PrivateSelf, id, sig_private));
        }
        Ok(())
    }

    /// The public self-signature, if present.
    pub fn self_signature(&self) -> Option<&CredentialSignature> {
        self.common().signature_for(SignatureRole::PublicSelf)
    }

    /// The external source signature, if present.
    pub fn source_signature(&self) -> Option<&CredentialSignature> {
        self.common().signature_for(SignatureRole::Source)
    }

    /// Attach the external source signature (payment-code proof).
    pub(crate) fn attach_source_signature(&mut self, signature: CredentialSignature) {
        self.base.common_mut().push_signature(signature);
    }

    /// Run this credential's validation state machine: syntax, then the self
    /// signature(s). Source linkage is checked separately by
    /// [`verify_against_source`][Self::verify_against_source]. Never errors;
    /// any mismatch is `false`.
    pub fn validate(&self) -> bool {
        if self.common().version() == &0 {
            return false;
        }
        if self.common().role() != &CredentialRole::MasterKey || self.common().master_id().is_some() {
            return false;
        }
        if (self.common().mode() == &CredentialMode::Private) != self.has_private() {
            return false;
        }
        let id = match self.id() {
            Ok(id) => id,
            Err(_) => return false,
        };
        let preimage = match self.serialize_public_unsigned() {
            Ok(bytes) => bytes,
            Err(_) => return false,
        };
        let sign_pub = SignKeypairPublic::from(self.keyset().sign().key().clone());
        if !self.common().verify_self_signature(SignatureRole::PublicSelf, &id, &sign_pub, &preimage) {
            return false;
        }
        if self.common().mode() == &CredentialMode::Private {
            let preimage_private = match self.serialize(true, false) {
                Ok(bytes) => bytes,
                Err(_) => return false,
            };
            if !self.common().verify_self_signature(SignatureRole::PrivateSelf, &id, &sign_pub, &preimage_private) {
                return false;
            }
        }
        true
    }

    /// Verify this credential was legitimately produced by the given source:
    /// the proof type must match the source kind, and the source must accept
    /// the proof.
    pub fn verify_against_source(&self, source: &NymSource) -> bool {
        match (self.proof_type(), source) {
            (SourceProofType::SelfSignature, NymSource::PubKey { .. }) => source.verify(self, None),
            (SourceProofType::Signature, NymSource::Bip47 { .. }) => {
                let sig = match self.source_signature() {
                    Some(sig) => sig,
                    None => return false,
                };
                source.verify(self, Some(sig.signature()))
            }
            _ => false,
        }
    }

    /// Whether this master grants a capability. `SignChildCredentials` is
    /// granted only when the signing keypair holds its private half.
    pub fn has_capability(&self, capability: Capability) -> bool {
        match capability {
            Capability::SignChildCredentials => self.keyset().sign().has_private(),
        }
    }
}

impl CredentialMut for PrimaryCredential {
    fn common_mut(&mut self) -> &mut CredentialCommon {
        self.base.common_mut()
    }
}

impl Public for PrimaryCredential {
    fn strip_private(&self) -> Self {
        Self {
            base: self.base.strip_private(),
            proof_type: self.proof_type,
        }
    }

    fn has_private(&self) -> bool {
        self.base.has_private()
    }
}

impl SerdeBinary for PrimaryCredential {}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::crypto::base::SignKeypair;
    use crate::error::Error;
    use crate::identity::source::PaymentCode;
    use crate::util::ser::SerdeBinary;

    pub(crate) fn make_master(rng: &mut rand_chacha::ChaCha20Rng, seal_key: &SecretKey, proof_type: SourceProofType) -> PrimaryCredential {
        PrimaryCredential::generate(rng, seal_key, KeyAlgo::Ed25519, 1, proof_type, None).unwrap()
    }

    #[test]
    fn primary_validates_after_generate() {
        let mut rng = crate::util::test::rng();
        let seal_key = SecretKey::new_xchacha20poly1305(&mut rng).unwrap();
        let master = make_master(&mut rng, &seal_key, SourceProofType::SelfSignature);
        assert!(master.validate());
        assert!(master.self_signature().is_some());
        // the private self-signature rode along
        assert!(master.common().signature_for(SignatureRole::PrivateSelf).is_some());
    }

    #[test]
    fn primary_id_stable_across_strip() {
        let mut rng = crate::util::test::rng();
        let seal_key = SecretKey::new_xchacha20poly1305(&mut rng).unwrap();
        let master = make_master(&mut rng, &seal_key, SourceProofType::SelfSignature);
        let stripped = master.strip_private();
        assert_eq!(master.id().unwrap(), stripped.id().unwrap());
        // the stripped (public) credential still validates its public self-sig
        assert!(stripped.validate());
    }

    #[test]
    fn primary_tamper_breaks_validation() {
        let mut rng = crate::util::test::rng();
        let seal_key = SecretKey::new_xchacha20poly1305(&mut rng).unwrap();
        let master = make_master(&mut rng, &seal_key, SourceProofType::SelfSignature);
        let mut tampered = master.clone();
        let other_key = SignKeypair::new_ed25519(&mut rng, &seal_key).unwrap();
        tampered.base_mut().keys_mut().sign_mut().set_key(other_key);
        assert!(!tampered.validate());
    }

    #[test]
    fn primary_source_proof_pubkey() {
        let mut rng = crate::util::test::rng();
        let seal_key = SecretKey::new_xchacha20poly1305(&mut rng).unwrap();
        let master = make_master(&mut rng, &seal_key, SourceProofType::SelfSignature);
        let source = NymSource::new_pubkey(1, SignKeypairPublic::from(master.keyset().sign().key().clone()));
        assert!(master.verify_against_source(&source));
        // a source with someone else's key refuses the master
        let foreign = SignKeypair::new_ed25519(&mut rng, &seal_key).unwrap();
        let source_foreign = NymSource::new_pubkey(1, SignKeypairPublic::from(foreign));
        assert!(!master.verify_against_source(&source_foreign));
    }

    #[test]
    fn primary_source_proof_bip47() {
        let mut rng = crate::util::test::rng();
        let seal_key = SecretKey::new_xchacha20poly1305(&mut rng).unwrap();
        let mut master = make_master(&mut rng, &seal_key, SourceProofType::Signature);
        let code = PaymentCode::generate(&mut rng, &seal_key, 1).unwrap();
        let source = NymSource::new_bip47(1, code);
        // not proven yet
        assert!(!master.verify_against_source(&source));
        let id = master.id().unwrap();
        let sig = source.sign(&seal_key, &master).unwrap();
        master.attach_source_signature(CredentialSignature::new(SignatureRole::Source, id, sig));
        assert!(master.verify_against_source(&source));
        // proof type / source kind mismatch is a hard no
        let pubkey_source = NymSource::new_pubkey(1, SignKeypairPublic::from(master.keyset().sign().key().clone()));
        assert!(!master.verify_against_source(&pubkey_source));
    }

    #[test]
    fn primary_pubkey_source_cannot_sign() {
        let mut rng = crate::util::test::rng();
        let seal_key = SecretKey::new_xchacha20poly1305(&mut rng).unwrap();
        let master = make_master(&mut rng, &seal_key, SourceProofType::SelfSignature);
        let source = NymSource::new_pubkey(1, SignKeypairPublic::from(master.keyset().sign().key().clone()));
        let res = source.sign(&seal_key, &master);
        assert_eq!(res.err(), Some(Error::SourceSignatureNotSupported));
    }

    #[test]
    fn primary_capability_follows_private_half() {
        let mut rng = crate::util::test::rng();
        let seal_key = SecretKey::new_xchacha20poly1305(&mut rng).unwrap();
        let master = make_master(&mut rng, &seal_key, SourceProofType::SelfSignature);
        assert!(master.has_capability(Capability::SignChildCredentials));
        let stripped = master.strip_private();
        assert!(!stripped.has_capability(Capability::SignChildCredentials));
    }

    #[test]
    fn primary_der_roundtrip() {
        let mut rng = crate::util::test::rng();
        let seal_key = SecretKey::new_xchacha20poly1305(&mut rng).unwrap();
        let master = make_master(&mut rng, &seal_key, SourceProofType::SelfSignature);
        let ser = master.serialize_binary().unwrap();
        let master2 = PrimaryCredential::deserialize_binary(&ser).unwrap();
        assert_eq!(master, master2);
        assert!(master2.validate());
    }
}

//! Secondary credentials: slot-indexed child key credentials, signed by the
//! authority's master. They carry additional signing/encryption/
//! authentication material beyond the master's own keys.

use crate::{
    crypto::base::{KeyAlgo, SecretKey, SignKeypairPublic},
    error::Result,
    identity::credential::{
        id_for_preimage, key::{Key, KeyCredential, KeyDerivation, KeyRole, Keyset},
        serialize_form, CredentialCommon, CredentialID, CredentialMode, CredentialMut, CredentialRole, CredentialSignature,
        SignatureRole,
    },
    util::{ser::SerdeBinary, Public},
};
use rand::{CryptoRng, RngCore};
use rasn::{AsnType, Decode, Decoder, Encode, Encoder};
use serde_derive::{Deserialize, Serialize};

/// A child key credential, occupying one slot (`cred_index`) within its
/// authority.
#[derive(
    Debug, Clone, PartialEq, AsnType, Encode, Decode, Serialize, Deserialize, getset::Getters, getset::MutGetters, getset::Setters,
)]
#[getset(get = "pub", get_mut = "pub(crate)", set = "pub(crate)")]
pub struct SecondaryCredential {
    /// The key credential core.
    #[rasn(tag(explicit(0)))]
    base: KeyCredential,
    /// This credential's slot index within its authority.
    #[rasn(tag(explicit(1)))]
    cred_index: u32,
}

impl SecondaryCredential {
    /// Generate a new secondary credential (with algorithm fallback) and
    /// self-sign it. The master signature is attached by the authority.
    pub fn generate<R: RngCore + CryptoRng>(
        rng: &mut R,
        seal_key: &SecretKey,
        requested: KeyAlgo,
        version: u32,
        master_id: CredentialID,
        cred_index: u32,
        derivation: Option<&KeyDerivation>,
    ) -> Result<Self> {
        let base = KeyCredential::generate(rng, seal_key, requested, version, CredentialRole::ChildKey, Some(master_id), derivation)?;
        let mut cred = Self { base, cred_index };
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

    /// Attach the master's signature over this credential's preimage.
    pub(crate) fn attach_master_signature(&mut self, signature: CredentialSignature) {
        self.base.common_mut().push_signature(signature);
    }

    /// Run this credential's validation state machine against its declared
    /// master: syntax, self signature(s), then master linkage.
    pub fn validate(&self, master_id: &CredentialID, master_key: &SignKeypairPublic) -> bool {
        if self.common().version() == &0 {
            return false;
        }
        if self.common().role() != &CredentialRole::ChildKey {
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
        self.common().verify_master_signature(master_id, master_key, &preimage)
    }
}

impl CredentialMut for SecondaryCredential {
    fn common_mut(&mut self) -> &mut CredentialCommon {
        self.base.common_mut()
    }
}

impl Public for SecondaryCredential {
    fn strip_private(&self) -> Self {
        Self {
            base: self.base.strip_private(),
            cred_index: self.cred_index,
        }
    }

    fn has_private(&self) -> bool {
        self.base.has_private()
    }
}

impl SerdeBinary for SecondaryCredential {}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::identity::credential::primary::{tests::make_master, SourceProofType};

    #[test]
    fn secondary_master_signature_lifecycle() {
        let mut rng = crate::util::test::rng();
        let seal_key = SecretKey::new_xchacha20poly1305(&mut rng).unwrap();
        let master = make_master(&mut rng, &seal_key, SourceProofType::SelfSignature);
        let master_id = master.id().unwrap();
        let master_sign_pub = SignKeypairPublic::from(master.keyset().sign().key().clone());

        let mut secondary =
            SecondaryCredential::generate(&mut rng, &seal_key, KeyAlgo::Secp256k1, 1, master_id.clone(), 1, None).unwrap();
        // no master signature yet: not valid
        assert!(!secondary.validate(&master_id, &master_sign_pub));

        let preimage = secondary.serialize_public_unsigned().unwrap();
        let sig = master.keyset().sign().key().sign(&seal_key, &preimage).unwrap();
        secondary.attach_master_signature(CredentialSignature::new(SignatureRole::Master, master_id.clone(), sig));
        assert!(secondary.validate(&master_id, &master_sign_pub));

        // a different master refuses it
        let mut rng2 = crate::util::test::rng_seeded(7);
        let other_master = make_master(&mut rng2, &seal_key, SourceProofType::SelfSignature);
        let other_id = other_master.id().unwrap();
        let other_pub = SignKeypairPublic::from(other_master.keyset().sign().key().clone());
        assert!(!secondary.validate(&other_id, &other_pub));
    }

    #[test]
    fn secondary_der_roundtrip() {
        let mut rng = crate::util::test::rng();
        let seal_key = SecretKey::new_xchacha20poly1305(&mut rng).unwrap();
        let master = make_master(&mut rng, &seal_key, SourceProofType::SelfSignature);
        let master_id = master.id().unwrap();
        let secondary = SecondaryCredential::generate(&mut rng, &seal_key, KeyAlgo::Ed25519, 1, master_id, 1, None).unwrap();
        let ser = secondary.serialize_binary().unwrap();
        let secondary2 = SecondaryCredential::deserialize_binary(&ser).unwrap();
        assert_eq!(secondary, secondary2);
        assert_eq!(secondary.id().unwrap(), secondary2.id().unwrap());
    }
}
